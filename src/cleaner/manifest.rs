//! Category-specific transforms for structured manifests: package manifests,
//! markup entry points, stylesheets, and type/build configuration.
//!
//! Each transform must leave the remaining structure syntactically valid.
//! JSON manifests go through value-level surgery (`serde_json` with
//! `preserve_order`, so untouched keys keep their positions); markup and
//! stylesheets go through block-aware line surgery. A manifest that fails to
//! parse is left for the caller to copy through unchanged with a warning.

#![allow(missing_docs)]

use serde_json::Value;

use crate::cleaner::source::PassResult;
use crate::core::errors::{PlhError, Result};
use crate::scanner::patterns::{PatternRegistry, RewriteStrategy, RuleMatcher};

/// Substrings identifying vendor-owned packages, scripts, and selectors.
const VENDOR_TOKENS: [&str; 3] = ["lovable", "base44", "gpteng"];

/// npm packages owned by the platform.
fn is_vendor_package(name: &str) -> bool {
    name == "lovable-tagger" || name.starts_with("@base44/") || name.starts_with("@lovable/")
}

fn contains_vendor_token(text: &str) -> bool {
    let lower = text.to_lowercase();
    VENDOR_TOKENS.iter().any(|token| lower.contains(token))
}

/// Strip vendor fields, dependencies, and scripts from `package.json`.
///
/// Returns `Err` when the manifest does not parse; the caller falls back to
/// a pass-through copy and records the warning.
pub fn clean_package_json(text: &str) -> Result<PassResult> {
    let mut value: Value = serde_json::from_str(text).map_err(|err| PlhError::Serialization {
        context: "package.json",
        details: err.to_string(),
    })?;
    let mut changes = Vec::new();

    if let Value::Object(map) = &mut value {
        for key in ["lovable", "base44"] {
            if map.shift_remove(key).is_some() {
                changes.push(format!("removed \"{key}\" manifest field"));
            }
        }

        for section in ["dependencies", "devDependencies"] {
            if let Some(Value::Object(deps)) = map.get_mut(section) {
                let vendor: Vec<String> = deps
                    .keys()
                    .filter(|name| is_vendor_package(name))
                    .cloned()
                    .collect();
                for name in vendor {
                    deps.shift_remove(&name);
                    changes.push(format!("removed {section} entry {name}"));
                }
            }
        }

        if let Some(Value::Object(scripts)) = map.get_mut("scripts") {
            let vendor: Vec<String> = scripts
                .iter()
                .filter(|(_, command)| {
                    command.as_str().is_some_and(contains_vendor_token)
                })
                .map(|(name, _)| name.clone())
                .collect();
            for name in vendor {
                scripts.shift_remove(&name);
                changes.push(format!("removed platform script \"{name}\""));
            }
        }
    }

    if changes.is_empty() {
        return Ok(PassResult::default());
    }
    let mut rebuilt = serde_json::to_string_pretty(&value)?;
    rebuilt.push('\n');
    Ok(PassResult {
        content: (rebuilt != text).then_some(rebuilt),
        changes,
        used_stub: false,
    })
}

/// Strip vendor language-service plugins and vendor `extends` presets from
/// a `tsconfig*.json`. Parse failure is the caller's fallback path (tsconfig
/// files legally carry comments, which plain JSON parsing rejects).
pub fn clean_tsconfig(text: &str) -> Result<PassResult> {
    let mut value: Value = serde_json::from_str(text).map_err(|err| PlhError::Serialization {
        context: "tsconfig",
        details: err.to_string(),
    })?;
    let mut changes = Vec::new();

    if let Value::Object(map) = &mut value {
        if map
            .get("extends")
            .and_then(Value::as_str)
            .is_some_and(contains_vendor_token)
        {
            map.shift_remove("extends");
            changes.push("removed vendor \"extends\" preset".to_string());
        }

        if let Some(Value::Object(options)) = map.get_mut("compilerOptions")
            && let Some(Value::Array(plugins)) = options.get_mut("plugins")
        {
            let before = plugins.len();
            plugins.retain(|plugin| {
                !plugin
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(contains_vendor_token)
            });
            if plugins.len() != before {
                changes.push("removed vendor language-service plugin".to_string());
            }
        }
    }

    if changes.is_empty() {
        return Ok(PassResult::default());
    }
    let mut rebuilt = serde_json::to_string_pretty(&value)?;
    rebuilt.push('\n');
    Ok(PassResult {
        content: (rebuilt != text).then_some(rebuilt),
        changes,
        used_stub: false,
    })
}

/// Remove vendor script/link elements and rewrite vendor asset URLs in a
/// markup entry point. Script elements are dropped as whole blocks so the
/// document stays well-formed even when the vendor snippet spans lines.
#[must_use]
pub fn clean_html(text: &str, registry: &PatternRegistry) -> PassResult {
    let lines: Vec<&str> = text.lines().collect();
    let mut out_lines: Vec<String> = Vec::new();
    let mut changes = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];

        // Whole <script> blocks: drop the block when any line inside trips
        // a line-dropping rule.
        if line.contains("<script") && !line.contains("</script>") {
            let end = lines[index..]
                .iter()
                .position(|l| l.contains("</script>"))
                .map_or(lines.len(), |offset| index + offset + 1);
            let block_is_vendor = lines[index..end]
                .iter()
                .any(|block_line| matches_drop_rule(block_line, registry));
            if block_is_vendor {
                changes.push(format!(
                    "removed vendor script block at lines {}..{}",
                    index + 1,
                    end
                ));
                index = end;
                continue;
            }
        }

        if matches_drop_rule(line, registry) {
            changes.push(format!("removed vendor element on line {}", index + 1));
            index += 1;
            continue;
        }

        out_lines.push(apply_replace_rules(line, registry, index + 1, &mut changes));
        index += 1;
    }

    rebuild(text, out_lines, changes)
}

/// Delete vendor-only rule blocks and rewrite vendor URLs in a stylesheet.
/// Brace depth tracking keeps the remaining sheet balanced.
#[must_use]
pub fn clean_stylesheet(text: &str, registry: &PatternRegistry) -> PassResult {
    let mut out_lines: Vec<String> = Vec::new();
    let mut changes = Vec::new();
    let mut skipping_depth = 0usize;

    for (index, line) in text.lines().enumerate() {
        if skipping_depth > 0 {
            skipping_depth = skipping_depth
                .saturating_add(line.matches('{').count())
                .saturating_sub(line.matches('}').count());
            continue;
        }

        if contains_vendor_token(line) && line.contains('{') {
            changes.push(format!("removed vendor rule block at line {}", index + 1));
            skipping_depth = line
                .matches('{')
                .count()
                .saturating_sub(line.matches('}').count());
            continue;
        }

        let rewritten = apply_replace_rules(line, registry, index + 1, &mut changes);
        if contains_vendor_token(&rewritten) {
            changes.push(format!("removed vendor declaration on line {}", index + 1));
            continue;
        }
        out_lines.push(rewritten);
    }

    rebuild(text, out_lines, changes)
}

fn matches_drop_rule(line: &str, registry: &PatternRegistry) -> bool {
    registry.content_rules().any(|rule| {
        rule.rewrite == RewriteStrategy::DropLine
            && matches!(&rule.matcher, RuleMatcher::Content(regex) if regex.is_match(line))
    })
}

fn apply_replace_rules(
    line: &str,
    registry: &PatternRegistry,
    line_number: usize,
    changes: &mut Vec<String>,
) -> String {
    let mut current = line.to_string();
    for rule in registry.content_rules() {
        if rule.rewrite != RewriteStrategy::Replace {
            continue;
        }
        let RuleMatcher::Content(regex) = &rule.matcher else {
            continue;
        };
        if regex.is_match(&current) {
            let replacement = rule.replacement.unwrap_or_default();
            let next = regex.replace_all(&current, replacement).into_owned();
            if next != current {
                changes.push(format!("rewrote line {line_number} ({})", rule.id));
                current = next;
            }
        }
    }
    current
}

fn rebuild(original: &str, lines: Vec<String>, changes: Vec<String>) -> PassResult {
    let mut rebuilt = lines.join("\n");
    if original.ends_with('\n') && !rebuilt.is_empty() {
        rebuilt.push('\n');
    }
    PassResult {
        content: (rebuilt != original).then_some(rebuilt),
        changes,
        used_stub: false,
    }
}
