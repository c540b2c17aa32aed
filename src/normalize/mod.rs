use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::{Category, Finding, ReviewRecord};

/// Raised only when no structured payload can be located at all. Field-level
/// defects inside a parsable payload never reach this: bad entries are
/// dropped and the rest of the record survives.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no structured payload found in model response")]
    MalformedResponse {
        /// The full raw model text, kept for diagnostics.
        raw: String,
    },
}

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("valid fence regex"));

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"));

/// Convert raw model text into a validated [`ReviewRecord`].
///
/// The model may wrap the payload in prose or markdown fences, omit keys,
/// emit extra keys, or produce individually broken entries. All of that is
/// tolerated; only a response with no parsable JSON object anywhere fails.
pub fn normalize_response(raw: &str) -> Result<ReviewRecord, NormalizeError> {
    let malformed = || NormalizeError::MalformedResponse {
        raw: raw.to_string(),
    };

    let candidate = strip_fences(raw);
    let span = extract_json_span(candidate).ok_or_else(malformed)?;
    let repaired = repair_json(span);
    let value: Value = serde_json::from_str(&repaired).map_err(|_| malformed())?;
    let object = value.as_object().ok_or_else(malformed)?;

    let mut record = ReviewRecord::default();
    for category in Category::ALL {
        let entries = match object.get(category.key()).and_then(|v| v.as_array()) {
            Some(entries) => entries,
            // Missing (or non-array) key is an empty category, not an error
            None => continue,
        };
        let findings = record.findings_mut(category);
        for entry in entries {
            if let Some(finding) = validate_finding(entry) {
                findings.push(finding);
            }
        }
    }

    drop_comment_nitpicks(&mut record);

    for category in Category::ALL {
        // Stable sort: equal line numbers keep the model's emission order
        record.findings_mut(category).sort_by_key(|f| f.line);
    }

    Ok(record)
}

/// Prefer the contents of a ``` fence when it holds an object; the model is
/// asked to fence its payload, but plenty of responses forget.
fn strip_fences(raw: &str) -> &str {
    if let Some(captures) = FENCE_RE.captures(raw) {
        if let Some(inner) = captures.get(1) {
            if inner.as_str().contains('{') {
                return inner.as_str();
            }
        }
    }
    raw
}

/// Locate the first balanced-brace region, skipping braces inside JSON
/// strings. A response whose braces never balance (e.g. cut off by the
/// token budget) has no locatable payload.
fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let tail = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in tail.char_indices() {
        match c {
            '\\' if in_string && !escaped => {
                escaped = true;
                continue;
            }
            '"' if !escaped => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&tail[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
        escaped = false;
    }

    None
}

/// Scrub the defects local models produce most often: smart quotes, stray
/// control characters and trailing commas.
fn repair_json(span: &str) -> String {
    let cleaned: String = span
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    TRAILING_COMMA_RE.replace_all(&cleaned, "$1").into_owned()
}

/// Soft per-entry validation: a usable line number plus non-empty code and
/// description, or the entry is dropped.
fn validate_finding(entry: &Value) -> Option<Finding> {
    let line = coerce_line(entry.get("line").or_else(|| entry.get("line_number")))?;
    let code = non_empty_string(entry.get("code"))?;
    let description = non_empty_string(entry.get("description"))?;
    let fix = entry
        .get("fix")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    Some(Finding {
        line,
        code,
        description,
        fix,
    })
}

/// Line numbers arrive as JSON numbers or numeric strings; anything that
/// does not coerce to a positive integer disqualifies the entry.
fn coerce_line(value: Option<&Value>) -> Option<u32> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok().filter(|n| *n > 0);
    }
    if let Some(s) = value.as_str() {
        return s.trim().parse::<u32>().ok().filter(|n| *n > 0);
    }
    None
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// The reviewer is told not to nitpick comments or docstrings; models do it
/// anyway. Quality issues and suggestions whose snippet is a comment, or
/// whose description is about comments, are filtered out.
fn drop_comment_nitpicks(record: &mut ReviewRecord) {
    for category in [Category::Quality, Category::Suggestions] {
        record.findings_mut(category).retain(|f| !is_comment_nitpick(f));
    }
}

fn is_comment_nitpick(finding: &Finding) -> bool {
    let code = finding.code.trim_start();
    code.starts_with("//")
        || code.starts_with("/*")
        || code.starts_with("\"\"\"")
        || code.starts_with("'''")
        || finding.description.to_lowercase().contains("comment")
}
