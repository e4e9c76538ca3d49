//! Line-oriented rewrite passes shared by the source deep clean, the
//! build-config transform, and the light text substitution pass.
//!
//! Every pass is content-idempotent: a replacement never re-matches the rule
//! that produced it (enforced by registry tests), dropped lines stay dropped,
//! and the blank-line collapse is a fixpoint after one application.

#![allow(missing_docs)]

use std::sync::LazyLock;

use regex::Regex;

use crate::scanner::patterns::{PatternRegistry, RewriteStrategy, RuleMatcher};

/// Tree-relative path of the generated neutral client.
pub const POLYFILL_PATH: &str = "src/lib/local-client.js";

/// Import line substituted for removed platform SDK imports.
pub const POLYFILL_IMPORT: &str = "import { createLocalClient } from \"@/lib/local-client\";";

/// Neutral replacement preserving the platform client's call surface:
/// every method resolves to `null` instead of calling the hosted backend.
#[must_use]
pub fn polyfill_source() -> &'static str {
    r#"// Neutral stand-in for the removed platform SDK client.
// Every call resolves to null; wire real backends in as needed.
const respond = () => Promise.resolve(null);

const collection = () => ({
  list: respond,
  get: respond,
  create: respond,
  update: respond,
  delete: respond,
});

export function createLocalClient() {
  return {
    auth: { me: respond, login: respond, logout: respond },
    entities: new Proxy({}, { get: collection }),
    integrations: new Proxy({}, { get: () => respond }),
  };
}
"#
}

/// Full client-construction call with a balanced, paren-free argument list.
static CLIENT_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bcreateClient\s*\(\s*[^()]*\)").expect("client call pattern must compile")
});

/// Outcome of one rewrite pass over a file's text.
#[derive(Debug, Clone, Default)]
pub struct PassResult {
    /// New content when anything changed; `None` means byte-identical.
    pub content: Option<String>,
    /// Human-readable description of each transform applied.
    pub changes: Vec<String>,
    /// Whether the client stub rewrite fired (the caller then ensures the
    /// polyfill file exists in the output tree).
    pub used_stub: bool,
}

/// How SDK import lines are handled by [`clean_lines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportMode {
    /// Replace the import with the polyfill import (application source).
    Substitute,
    /// Drop the import line entirely (build configs never need the client).
    Drop,
}

/// Generic deep-clean pass for application source files.
#[must_use]
pub fn deep_clean(text: &str, registry: &PatternRegistry) -> PassResult {
    clean_lines(text, registry, ImportMode::Substitute)
}

/// Build-config variant: vendor imports are dropped rather than substituted.
#[must_use]
pub fn clean_build_config(text: &str, registry: &PatternRegistry) -> PassResult {
    clean_lines(text, registry, ImportMode::Drop)
}

fn clean_lines(text: &str, registry: &PatternRegistry, import_mode: ImportMode) -> PassResult {
    let mut out_lines: Vec<String> = Vec::new();
    let mut changes = Vec::new();
    let mut used_stub = false;

    'lines: for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let mut current = line.to_string();

        for rule in registry.content_rules() {
            let RuleMatcher::Content(regex) = &rule.matcher else {
                continue;
            };
            if !regex.is_match(&current) {
                continue;
            }
            match rule.rewrite {
                RewriteStrategy::Advisory | RewriteStrategy::RemoveFile => {}
                RewriteStrategy::DropLine => {
                    changes.push(format!("dropped line {line_number} ({})", rule.id));
                    continue 'lines;
                }
                RewriteStrategy::Replace => {
                    let replacement = rule.replacement.unwrap_or_default();
                    let next = regex.replace_all(&current, replacement).into_owned();
                    if next != current {
                        changes.push(format!("rewrote line {line_number} ({})", rule.id));
                        current = next;
                    }
                }
                RewriteStrategy::StubClient => {
                    used_stub = true;
                    if rule.id == "sdk-import" {
                        changes.push(format!(
                            "replaced platform SDK import on line {line_number}"
                        ));
                        match import_mode {
                            ImportMode::Substitute => {
                                // One polyfill import per file is enough.
                                if !out_lines.iter().any(|l| l == POLYFILL_IMPORT) {
                                    out_lines.push(POLYFILL_IMPORT.to_string());
                                }
                            }
                            ImportMode::Drop => {}
                        }
                        continue 'lines;
                    }
                    let next = CLIENT_CALL
                        .replace_all(&current, "createLocalClient()")
                        .into_owned();
                    current = if next == current {
                        // Argument list spans lines; rename the call and let
                        // the credential rules neutralize the remainder.
                        current.replace("createClient(", "createLocalClient(")
                    } else {
                        next
                    };
                    changes.push(format!(
                        "stubbed client construction on line {line_number}"
                    ));
                }
            }
        }

        out_lines.push(current);
    }

    let collapsed = collapse_blank_runs(out_lines, &mut changes);
    finish(text, &collapsed, changes, used_stub)
}

/// Light substitution pass for env files, markdown, and shell scripts:
/// vendor tokens and URLs come out, lines stay.
#[must_use]
pub fn light_clean(text: &str, registry: &PatternRegistry) -> PassResult {
    let mut out_lines: Vec<String> = Vec::new();
    let mut changes = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let mut current = line.to_string();

        for rule in registry.content_rules() {
            let RuleMatcher::Content(regex) = &rule.matcher else {
                continue;
            };
            if !regex.is_match(&current) {
                continue;
            }
            match rule.rewrite {
                RewriteStrategy::Replace => {
                    let replacement = rule.replacement.unwrap_or_default();
                    let next = regex.replace_all(&current, replacement).into_owned();
                    if next != current {
                        changes.push(format!("rewrote line {line_number} ({})", rule.id));
                        current = next;
                    }
                }
                RewriteStrategy::DropLine => {
                    let next = regex.replace_all(&current, "").into_owned();
                    if next != current {
                        changes.push(format!(
                            "removed vendor token on line {line_number} ({})",
                            rule.id
                        ));
                        current = next;
                    }
                }
                RewriteStrategy::Advisory
                | RewriteStrategy::RemoveFile
                | RewriteStrategy::StubClient => {}
            }
        }

        out_lines.push(current);
    }

    finish(text, &out_lines, changes, false)
}

/// Cap runs of blank lines at two.
fn collapse_blank_runs(lines: Vec<String>, changes: &mut Vec<String>) -> Vec<String> {
    let mut collapsed = Vec::with_capacity(lines.len());
    let mut blank_run = 0usize;
    let mut dropped = 0usize;
    for line in lines {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                dropped += 1;
                continue;
            }
        } else {
            blank_run = 0;
        }
        collapsed.push(line);
    }
    if dropped > 0 {
        changes.push(format!("collapsed {dropped} excess blank line(s)"));
    }
    collapsed
}

fn finish(
    original: &str,
    lines: &[String],
    changes: Vec<String>,
    used_stub: bool,
) -> PassResult {
    let mut rebuilt = lines.join("\n");
    if original.ends_with('\n') && !rebuilt.is_empty() {
        rebuilt.push('\n');
    }
    if rebuilt == original {
        PassResult {
            content: None,
            changes,
            used_stub,
        }
    } else {
        PassResult {
            content: Some(rebuilt),
            changes,
            used_stub,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PatternRegistry {
        PatternRegistry::builtin()
    }

    #[test]
    fn sdk_import_becomes_polyfill_import() {
        let input = "import { createClient } from \"@base44/sdk\";\n\nconst client = createClient({ appId: \"0123456789abcdef01234567\" });\n";
        let result = deep_clean(input, &registry());
        let cleaned = result.content.expect("changed");
        assert!(cleaned.contains(POLYFILL_IMPORT));
        assert!(cleaned.contains("createLocalClient()"));
        assert!(!cleaned.contains("@base44/sdk"));
        assert!(!cleaned.contains("appId"));
        assert!(result.used_stub);
    }

    #[test]
    fn multiline_client_construction_is_renamed_and_neutralized() {
        let input = "const client = createClient({\n  appId: \"0123456789abcdef01234567\",\n});\n";
        let result = deep_clean(input, &registry());
        let cleaned = result.content.expect("changed");
        assert!(cleaned.contains("createLocalClient({"));
        assert!(cleaned.contains("appId: \"local\""));
    }

    #[test]
    fn dropped_lines_do_not_leave_long_blank_runs() {
        let input = "const a = 1;\n\n\nwindow.__LOVABLE_TELEMETRY__.send();\n\n\n\nconst b = 2;\n";
        let result = deep_clean(input, &registry());
        let cleaned = result.content.expect("changed");
        assert!(!cleaned.contains("__LOVABLE_TELEMETRY__"));
        assert!(!cleaned.contains("\n\n\n\n"));
    }

    #[test]
    fn cdn_urls_are_replaced_with_placeholder() {
        let input = "const img = \"https://storage.lovable-uploads.example/abc.png\";\n";
        let result = deep_clean(input, &registry());
        let cleaned = result.content.expect("changed");
        assert!(cleaned.contains("/assets/placeholder.svg"));
        assert!(!cleaned.contains("lovable-uploads"));
    }

    #[test]
    fn clean_source_is_untouched() {
        let input = "export function add(a, b) {\n  return a + b;\n}\n";
        let result = deep_clean(input, &registry());
        assert!(result.content.is_none());
        assert!(result.changes.is_empty());
    }

    #[test]
    fn deep_clean_is_idempotent_on_content() {
        let input = "import { createClient } from \"@base44/sdk\";\nconst c = createClient({ appId: \"0123456789abcdef01234567\" });\n\n\n\nconst keep = true;\n";
        let once = deep_clean(input, &registry());
        let first = once.content.expect("changed");
        let twice = deep_clean(&first, &registry());
        assert!(
            twice.content.is_none(),
            "second pass changed content: {:?}",
            twice.content
        );
    }

    #[test]
    fn build_config_drops_vendor_imports_instead_of_substituting() {
        let input = "import { componentTagger } from \"lovable-tagger\";\nimport react from \"@vitejs/plugin-react\";\n\nexport default {\n  plugins: [react(), componentTagger()],\n};\n";
        let result = clean_build_config(input, &registry());
        let cleaned = result.content.expect("changed");
        assert!(!cleaned.contains("componentTagger"));
        assert!(!cleaned.contains("lovable-tagger"));
        assert!(!cleaned.contains(POLYFILL_IMPORT));
        assert!(cleaned.contains("plugin-react"));
    }

    #[test]
    fn light_clean_removes_tokens_but_keeps_lines() {
        let input = "# My App\n\nBuilt with Lovable and shipped daily.\nVITE_BASE44_APP_ID=abc123def\n";
        let result = light_clean(input, &registry());
        let cleaned = result.content.expect("changed");
        assert!(!cleaned.to_lowercase().contains("built with lovable"));
        assert!(cleaned.contains("and shipped daily."));
        assert!(cleaned.contains("VITE_BASE44_APP_ID=\n"));
        assert_eq!(cleaned.lines().count(), input.lines().count());
    }

    #[test]
    fn light_clean_is_idempotent_on_content() {
        let input = "badge: Built with Lovable\nurl: https://lovable.dev/projects/my-app-1234\n";
        let first = light_clean(input, &registry()).content.expect("changed");
        assert!(light_clean(&first, &registry()).content.is_none());
    }

    #[test]
    fn polyfill_source_is_clean_under_the_registry() {
        let result = deep_clean(polyfill_source(), &registry());
        assert!(result.content.is_none(), "polyfill must not trip any rule");
    }
}
