//! Lock-in pattern registry: the ordered, versioned catalogue of detection
//! rules every other stage consumes.
//!
//! Rules come in two matcher kinds: **path rules** (anchored regex over the
//! tree-relative path, e.g. vendor workspace directories) and **content
//! rules** (re-entrant compiled regex applied line by line). Registry order
//! defines tie-break precedence: the first matching rule wins a single-span
//! rewrite, while every matching rule still records an issue.

#![allow(missing_docs)]

use regex::Regex;

/// Registry schema version, stamped into reports and the liberation manifest.
pub const REGISTRY_VERSION: &str = "1";

/// High-level issue category used by reports and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCategory {
    Branding,
    Analytics,
    Telemetry,
    HardcodedCredential,
    VendorSdkImport,
    VendorCdnUrl,
    VendorConfigFlag,
}

impl RuleCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Branding => "branding",
            Self::Analytics => "analytics",
            Self::Telemetry => "telemetry",
            Self::HardcodedCredential => "hardcoded-credential",
            Self::VendorSdkImport => "vendor-sdk-import",
            Self::VendorCdnUrl => "vendor-cdn-url",
            Self::VendorConfigFlag => "vendor-config-flag",
        }
    }
}

/// Issue severity. Critical issues dominate the sovereignty score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Critical,
    Major,
    Minor,
}

impl RuleSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

/// What the Cleaner does when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteStrategy {
    /// Drop the whole file from the output tree.
    RemoveFile,
    /// Delete the matching line (source) or the matched span (plain text).
    DropLine,
    /// Replace the matched span with the rule's neutral replacement.
    Replace,
    /// Rewrite vendor client construction to the generated local polyfill.
    StubClient,
    /// Informational only; the Cleaner never rewrites for this rule and the
    /// issue may persist on a re-scan of cleaned output.
    Advisory,
}

/// Where a rule's matcher applies.
#[derive(Debug, Clone)]
pub enum RuleMatcher {
    /// Applied once per file against the tree-relative path.
    Path(Regex),
    /// Applied per line of text content. Compiled `Regex` is re-entrant, so
    /// one instance serves every worker thread without shared match state.
    Content(Regex),
}

/// One immutable detection rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub id: &'static str,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub matcher: RuleMatcher,
    pub suggestion: &'static str,
    pub rewrite: RewriteStrategy,
    /// Replacement text for `Replace` rules. Must never re-match the rule's
    /// own pattern (enforced by a registry test).
    pub replacement: Option<&'static str>,
}

impl PatternRule {
    #[must_use]
    pub const fn is_path_rule(&self) -> bool {
        matches!(self.matcher, RuleMatcher::Path(_))
    }

    /// Whether the Cleaner has a rewrite for this rule.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        !matches!(self.rewrite, RewriteStrategy::Advisory)
    }
}

/// Process-wide registry of built-in rules. Loaded once, read-only for the
/// run's duration; no run may mutate it.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    rules: Vec<PatternRule>,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternRegistry {
    /// The built-in rule catalogue, in precedence order.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    /// All rules in stable registry order.
    #[must_use]
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Look up one rule by id.
    #[must_use]
    pub fn rule(&self, id: &str) -> Option<&PatternRule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Path rules only.
    pub fn path_rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().filter(|rule| rule.is_path_rule())
    }

    /// Content rules only.
    pub fn content_rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().filter(|rule| !rule.is_path_rule())
    }
}

fn content(pattern: &str) -> RuleMatcher {
    RuleMatcher::Content(compile(pattern))
}

fn path(pattern: &str) -> RuleMatcher {
    RuleMatcher::Path(compile(pattern))
}

fn compile(pattern: &str) -> Regex {
    // The builtin table is static and covered by the registry tests; a
    // non-compiling pattern cannot reach a release build.
    Regex::new(pattern).expect("builtin rule pattern must compile")
}

#[allow(clippy::too_many_lines)]
fn builtin_rules() -> Vec<PatternRule> {
    vec![
        PatternRule {
            id: "vendor-workspace-dir",
            category: RuleCategory::VendorConfigFlag,
            severity: RuleSeverity::Critical,
            matcher: path(r"^(?:\.lovable|\.gpt_engineer|\.base44)(?:/|$)"),
            suggestion: "delete the platform workspace directory; it only feeds the hosted editor",
            rewrite: RewriteStrategy::RemoveFile,
            replacement: None,
        },
        PatternRule {
            id: "vendor-ci-workflow",
            category: RuleCategory::VendorConfigFlag,
            severity: RuleSeverity::Major,
            matcher: path(r"^\.github/workflows/(?:lovable|base44)[^/]*\.ya?ml$"),
            suggestion: "remove the platform-managed CI workflow and own your pipeline",
            rewrite: RewriteStrategy::RemoveFile,
            replacement: None,
        },
        PatternRule {
            id: "vendor-editor-dir",
            category: RuleCategory::VendorConfigFlag,
            severity: RuleSeverity::Minor,
            matcher: path(r"^(?:\.bolt|\.v0)(?:/|$)"),
            suggestion: "delete the hosted-editor scratch directory",
            rewrite: RewriteStrategy::RemoveFile,
            replacement: None,
        },
        PatternRule {
            id: "sdk-import",
            category: RuleCategory::VendorSdkImport,
            severity: RuleSeverity::Critical,
            matcher: content(r#"from\s+["']@base44/sdk[^"']*["']|require\(\s*["']@base44/sdk[^"']*["']\s*\)"#),
            suggestion: "import the generated local client instead of the platform SDK",
            rewrite: RewriteStrategy::StubClient,
            replacement: None,
        },
        PatternRule {
            id: "sdk-client-init",
            category: RuleCategory::VendorSdkImport,
            severity: RuleSeverity::Critical,
            matcher: content(r"\bcreateClient\s*\("),
            suggestion: "construct the local client; the hosted backend is gone after liberation",
            rewrite: RewriteStrategy::StubClient,
            replacement: None,
        },
        PatternRule {
            id: "cdn-loader-script",
            category: RuleCategory::VendorCdnUrl,
            severity: RuleSeverity::Critical,
            matcher: content(r"cdn\.gpteng\.co"),
            suggestion: "drop the platform loader script; it phones home on every page view",
            rewrite: RewriteStrategy::DropLine,
            replacement: None,
        },
        PatternRule {
            id: "cdn-asset-url",
            category: RuleCategory::VendorCdnUrl,
            severity: RuleSeverity::Major,
            matcher: content(r#"https?://[^\s"']*(?:lovable-uploads|cdn\.base44\.com)[^\s"']*|/lovable-uploads/[^\s"']*"#),
            suggestion: "self-host the asset; platform CDN buckets disappear with the subscription",
            rewrite: RewriteStrategy::Replace,
            replacement: Some("/assets/placeholder.svg"),
        },
        PatternRule {
            id: "branding-badge",
            category: RuleCategory::Branding,
            severity: RuleSeverity::Major,
            matcher: content(r"(?i)(?:built|made|edit(?:ed)?)\s+with\s+(?:lovable|base44)"),
            suggestion: "remove the platform badge",
            rewrite: RewriteStrategy::DropLine,
            replacement: None,
        },
        PatternRule {
            id: "branding-project-url",
            category: RuleCategory::Branding,
            severity: RuleSeverity::Major,
            matcher: content(r"https?://(?:www\.)?lovable\.dev/projects/[A-Za-z0-9-]+"),
            suggestion: "point project links at your own domain",
            rewrite: RewriteStrategy::Replace,
            replacement: Some("https://example.com"),
        },
        PatternRule {
            id: "branding-og-image",
            category: RuleCategory::Branding,
            severity: RuleSeverity::Major,
            matcher: content(r#"https?://(?:www\.)?lovable\.dev/opengraph[^\s"']*"#),
            suggestion: "replace the platform social-preview image with your own",
            rewrite: RewriteStrategy::Replace,
            replacement: Some("/assets/placeholder.svg"),
        },
        PatternRule {
            id: "analytics-beacon",
            category: RuleCategory::Analytics,
            severity: RuleSeverity::Major,
            matcher: content(r#"https?://(?:events|analytics)\.base44\.com[^\s"']*"#),
            suggestion: "remove the platform analytics beacon",
            rewrite: RewriteStrategy::DropLine,
            replacement: None,
        },
        PatternRule {
            id: "telemetry-init",
            category: RuleCategory::Telemetry,
            severity: RuleSeverity::Major,
            matcher: content(r"__LOVABLE_TELEMETRY__|base44\.telemetry|\breportToPlatform\s*\("),
            suggestion: "delete the platform telemetry hook",
            rewrite: RewriteStrategy::DropLine,
            replacement: None,
        },
        PatternRule {
            id: "credential-app-id",
            category: RuleCategory::HardcodedCredential,
            severity: RuleSeverity::Critical,
            matcher: content(r#"appId:\s*["'][0-9a-f]{16,}["']"#),
            suggestion: "the platform app id identifies the hosted tenant; replace it",
            rewrite: RewriteStrategy::Replace,
            replacement: Some(r#"appId: "local""#),
        },
        PatternRule {
            id: "credential-env-app-id",
            category: RuleCategory::HardcodedCredential,
            severity: RuleSeverity::Critical,
            matcher: content(r"VITE_BASE44_APP_ID=\S+"),
            suggestion: "clear the platform tenant id from the environment file",
            rewrite: RewriteStrategy::Replace,
            replacement: Some("VITE_BASE44_APP_ID="),
        },
        PatternRule {
            id: "credential-platform-key",
            category: RuleCategory::HardcodedCredential,
            severity: RuleSeverity::Critical,
            matcher: content(r#"["']b44_[A-Za-z0-9]{24,}["']"#),
            suggestion: "revoke the embedded platform API key and move secrets out of source",
            rewrite: RewriteStrategy::Replace,
            replacement: Some(r#""""#),
        },
        PatternRule {
            id: "config-tagger-plugin",
            category: RuleCategory::VendorConfigFlag,
            severity: RuleSeverity::Major,
            matcher: content(r"lovable-tagger|componentTagger"),
            suggestion: "remove the editor tagging plugin from the build config",
            rewrite: RewriteStrategy::DropLine,
            replacement: None,
        },
        PatternRule {
            id: "config-manifest-field",
            category: RuleCategory::VendorConfigFlag,
            severity: RuleSeverity::Minor,
            matcher: content(r#""(?:lovable|base44)"\s*:"#),
            suggestion: "drop the platform manifest field",
            rewrite: RewriteStrategy::DropLine,
            replacement: None,
        },
        PatternRule {
            id: "doc-platform-mention",
            category: RuleCategory::Branding,
            severity: RuleSeverity::Minor,
            matcher: content(r"(?i)\b(?:lovable|base44)\s+platform\b"),
            suggestion: "documentation still references the originating platform",
            rewrite: RewriteStrategy::Advisory,
            replacement: None,
        },
    ]
}
