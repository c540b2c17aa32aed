use serde::{Deserialize, Serialize};

/// Core data model and helpers for the local code reviewer.

/// Review categories, in the fixed order used by prompts, reports and the
/// terminal summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Bugs,
    Quality,
    Suggestions,
    Security,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Bugs,
        Category::Quality,
        Category::Suggestions,
        Category::Security,
    ];

    /// JSON key used in model responses, artifacts and the cache.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Bugs => "bugs",
            Category::Quality => "quality_issues",
            Category::Suggestions => "suggestions",
            Category::Security => "security_concerns",
        }
    }

    /// Section header in the human-readable rendering.
    pub fn header(&self) -> &'static str {
        match self {
            Category::Bugs => "Bugs:",
            Category::Quality => "Quality Issues:",
            Category::Suggestions => "Suggestions:",
            Category::Security => "Security Concerns:",
        }
    }
}

/// One reviewer observation tied to a line of the reviewed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based line number into the (possibly truncated) source listing.
    pub line: u32,
    /// Exact code snippet the observation refers to.
    pub code: String,
    /// Explanation of the issue or improvement.
    pub description: String,
    /// Example fix, when the model provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

/// The complete validated review for one file: four ordered categories of
/// findings. Any or all categories may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReviewRecord {
    /// Display name of the reviewed file. Not part of the serialized
    /// document; the JSON artifact carries exactly the four arrays.
    #[serde(skip)]
    pub source_file: String,
    pub bugs: Vec<Finding>,
    pub quality_issues: Vec<Finding>,
    pub suggestions: Vec<Finding>,
    pub security_concerns: Vec<Finding>,
}

impl ReviewRecord {
    pub fn empty(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            ..Default::default()
        }
    }

    pub fn findings(&self, category: Category) -> &[Finding] {
        match category {
            Category::Bugs => &self.bugs,
            Category::Quality => &self.quality_issues,
            Category::Suggestions => &self.suggestions,
            Category::Security => &self.security_concerns,
        }
    }

    pub fn findings_mut(&mut self, category: Category) -> &mut Vec<Finding> {
        match category {
            Category::Bugs => &mut self.bugs,
            Category::Quality => &mut self.quality_issues,
            Category::Suggestions => &mut self.suggestions,
            Category::Security => &mut self.security_concerns,
        }
    }

    pub fn total_findings(&self) -> usize {
        Category::ALL.iter().map(|c| self.findings(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_findings() == 0
    }

    /// Drop findings that point past the reviewed listing. Line numbers
    /// reference the truncated source, so anything beyond it cannot refer
    /// to text the model was shown.
    pub fn retain_lines_within(&mut self, max_line: u32) {
        for category in Category::ALL {
            self.findings_mut(category).retain(|f| f.line <= max_line);
        }
    }
}

/// Safely truncate a UTF-8 string to a maximum number of characters.
pub fn truncate_utf8_safe(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}

/// Typed error kinds for per-file processing
pub mod error;

/// Language tags for prompt phrasing
pub mod language;

/// Configuration loaded from environment and optional config file
pub mod config;

/// File discovery under the configured codebase root
pub mod scan;

/// Review request construction and prompt building
pub mod prompt;

/// Normalization of raw model text into validated review records
pub mod normalize;

/// Model invocation boundary (local inference servers)
pub mod providers;

/// Fingerprint-keyed persisted review cache
pub mod cache;

/// Output artifacts and terminal rendering
pub mod report;

/// Per-file review orchestration
pub mod review;

// Re-export commonly used types for convenience
pub use cache::ReviewCache;
pub use config::ReviewConfig;
pub use error::ReviewError;
pub use language::SupportedLanguage;
pub use normalize::{normalize_response, NormalizeError};
pub use prompt::{build_review_prompt, ReviewRequest};
pub use providers::{ModelBackend, ModelHandle, StubModel};
pub use review::{FileOutcome, ReviewSession};
