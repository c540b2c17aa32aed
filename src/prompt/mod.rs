use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::language::SupportedLanguage;

/// Everything needed to review one file. Immutable once built; the
/// fingerprint keys the review cache, so construction must be
/// deterministic for identical file content.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub file_path: PathBuf,
    pub language: SupportedLanguage,
    /// First `limit` lines of the file, joined with '\n'.
    pub source: String,
    /// Number of lines actually included.
    pub line_count: usize,
    /// SHA-256 hex digest of `source`.
    pub fingerprint: String,
    /// Whether the file had more lines than the window.
    pub truncated: bool,
}

impl ReviewRequest {
    pub fn new(path: &Path, contents: &str, limit: usize) -> Self {
        let (source, line_count, truncated) = truncate_to_lines(contents, limit);
        let fingerprint = fingerprint(&source);
        Self {
            file_path: path.to_path_buf(),
            language: SupportedLanguage::from_path(path),
            source,
            line_count,
            fingerprint,
            truncated,
        }
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }
}

/// Keep only the first `limit` lines. Files longer than the window are
/// silently partial-reviewed; nothing downstream reports the cut.
fn truncate_to_lines(contents: &str, limit: usize) -> (String, usize, bool) {
    let mut lines: Vec<&str> = contents.lines().collect();
    let total = lines.len();
    let truncated = total > limit;
    if truncated {
        lines.truncate(limit);
    }
    (lines.join("\n"), lines.len(), truncated)
}

/// SHA-256 hex digest used as the cache key.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the single instruction string sent to the model. Pure: an
/// identical request always yields an identical prompt.
pub fn build_review_prompt(request: &ReviewRequest) -> String {
    let language = request.language.name();
    let file_name = request.file_name();

    format!(
        r#"You are an expert code reviewer for {language} code. Review the following code from file '{file_name}' and provide a structured review in **valid JSON format** (double quotes, no trailing commas). Include exactly these keys:
- "bugs": Array of potential bugs or errors (up to 5, e.g., type errors, null/undefined handling). Each entry must have "line" (line number, 1-based), "code" (exact code snippet), and "description" (issue explanation).
- "quality_issues": Array of code quality issues (up to 5, e.g., readability, structure). Each entry must have "line", "code", and "description". Do not overlap with bugs.
- "suggestions": Array of actionable improvements (up to 5). Each entry must have "line", "code", "description", and "fix" (example fix).
- "security_concerns": Array of security concerns (up to 5, e.g., input validation issues). Each entry must have "line", "code", and "description".

Rules:
- Do not suggest adding, removing, or modifying comments or docstrings unless they are factually incorrect.
- Avoid suggesting renames unless the current name is misleading.
- Prefer modern language features (e.g., f-strings and type hints for Python, template literals and JSDoc for JavaScript).
- For Python, suggest removing an explicit 'return None' when unnecessary.
- Include input validation suggestions where applicable.
- Issues must not overlap across categories.
- Use accurate 1-based line numbers and exact code snippets.
- Return empty arrays if no issues are found.
- Ensure valid JSON with no trailing commas or syntax errors.

Code:
```
{source}
```
Return the JSON object enclosed in ```json ``` markers."#,
        language = language,
        file_name = file_name,
        source = request.source,
    )
}
