use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Category, Finding, ReviewRecord};

/// Render the human-readable review. Fixed section headers, one block per
/// finding with `Line N`, `Code`, `Description` and an optional `Fix`, in
/// that order.
pub fn render_review_text(file_name: &str, record: &ReviewRecord) -> String {
    let mut output = format!(
        "\n=== Code Review for {} ===\n\n{}\n",
        file_name,
        "-".repeat(80)
    );

    for (i, category) in Category::ALL.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        output.push_str(category.header());
        output.push('\n');

        let findings = record.findings(*category);
        if findings.is_empty() {
            output.push_str("\n  None\n");
            continue;
        }
        for finding in findings {
            output.push_str(&render_finding(finding));
        }
    }

    output.push_str(&format!("\n{}\n", "=".repeat(80)));
    output
}

fn render_finding(finding: &Finding) -> String {
    let mut block = format!("\n  Line {}:\n", finding.line);
    block.push_str(&format!("    Code       : {}\n", finding.code));
    block.push_str(&format!("    Description: {}\n", finding.description));
    if let Some(fix) = &finding.fix {
        block.push_str(&format!("    Fix        : {}\n", fix));
    }
    block
}

/// The JSON artifact mirrors the record schema exactly: four named arrays
/// of finding objects.
pub fn record_to_json(record: &ReviewRecord) -> Result<String> {
    serde_json::to_string_pretty(record).context("Failed to serialize review record")
}

/// Write both artifacts for one file: `{stem}_review.json` and
/// `{stem}_review.txt` under the output directory.
pub fn save_review(
    output_dir: &Path,
    file_name: &str,
    record: &ReviewRecord,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    let json_path = output_dir.join(format!("{}_review.json", stem));
    let txt_path = output_dir.join(format!("{}_review.txt", stem));

    fs::write(&json_path, record_to_json(record)?)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    fs::write(&txt_path, render_review_text(file_name, record))
        .with_context(|| format!("Failed to write {}", txt_path.display()))?;

    Ok((json_path, txt_path))
}

/// Fixed color per category for the terminal rendering.
fn colored_header(category: Category) -> String {
    match category {
        Category::Bugs => category.header().red().to_string(),
        Category::Quality => category.header().yellow().to_string(),
        Category::Suggestions => category.header().cyan().to_string(),
        Category::Security => category.header().magenta().to_string(),
    }
}

fn colored_count(category: Category, count: usize) -> String {
    let label = format!("{} {}", count, category.key());
    match category {
        Category::Bugs => label.red().to_string(),
        Category::Quality => label.yellow().to_string(),
        Category::Suggestions => label.cyan().to_string(),
        Category::Security => label.magenta().to_string(),
    }
}

/// Print the full review to the terminal with color-differentiated section
/// headers.
pub fn print_review(file_name: &str, record: &ReviewRecord) {
    println!("\n=== Code Review for {} ===", file_name.bold());

    for category in Category::ALL {
        println!("\n{}", colored_header(category));
        let findings = record.findings(category);
        if findings.is_empty() {
            println!("  None");
            continue;
        }
        for finding in findings {
            print!("{}", render_finding(finding));
        }
    }
    println!();
}

/// One-line colored per-file summary with the four category counts.
pub fn print_file_summary(file_name: &str, record: &ReviewRecord, from_cache: bool) {
    let counts: Vec<String> = Category::ALL
        .iter()
        .map(|c| colored_count(*c, record.findings(*c).len()))
        .collect();
    let cache_note = if from_cache { " (cached)" } else { "" };
    println!("{}{}: {}", file_name.bold(), cache_note, counts.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeter_record() -> ReviewRecord {
        let mut record = ReviewRecord::default();
        record.bugs.push(Finding {
            line: 2,
            code: "print(\"Hello, \" + name)".into(),
            description: "name may not be a string".into(),
            fix: None,
        });
        record.suggestions.push(Finding {
            line: 2,
            code: "print(\"Hello, \" + name)".into(),
            description: "prefer an f-string".into(),
            fix: Some("print(f\"Hello, {name}\")".into()),
        });
        record
    }

    #[test]
    fn rendering_has_all_four_headers_in_order() {
        let text = render_review_text("greet.py", &greeter_record());
        let bugs = text.find("Bugs:").unwrap();
        let quality = text.find("Quality Issues:").unwrap();
        let suggestions = text.find("Suggestions:").unwrap();
        let security = text.find("Security Concerns:").unwrap();
        assert!(bugs < quality && quality < suggestions && suggestions < security);
    }

    #[test]
    fn empty_categories_render_none() {
        let text = render_review_text("greet.py", &greeter_record());
        assert_eq!(text.matches("  None").count(), 2);
    }

    #[test]
    fn fields_appear_in_fixed_order_with_optional_fix() {
        let text = render_review_text("greet.py", &greeter_record());
        let code = text.find("Code       : print(\"Hello, \" + name)").unwrap();
        let desc = text.find("Description: prefer an f-string").unwrap();
        let fix = text.find("Fix        : print(f\"Hello, {name}\")").unwrap();
        assert!(code < desc && desc < fix);
    }

    #[test]
    fn json_artifact_has_exactly_the_four_arrays() {
        let json = record_to_json(&greeter_record()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 4);
        for key in ["bugs", "quality_issues", "suggestions", "security_concerns"] {
            assert!(object[key].is_array(), "missing {}", key);
        }
        assert_eq!(object["bugs"][0]["line"], 2);
        // No fix key when the finding has none
        assert!(object["bugs"][0].get("fix").is_none());
    }

    #[test]
    fn save_review_writes_both_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let (json_path, txt_path) =
            save_review(temp.path(), "greet.py", &greeter_record()).unwrap();
        assert!(json_path.ends_with("greet_review.json"));
        assert!(txt_path.ends_with("greet_review.txt"));
        assert!(json_path.exists() && txt_path.exists());
    }
}
