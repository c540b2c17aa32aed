use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::providers::ModelBackend;

/// Runtime configuration with validation and type safety.
///
/// Values come from the environment (a `.env` file is honored when present),
/// then an optional JSON config file (`REVIEW_CONFIG_FILE` or
/// `.review-config.json` in the working directory) overrides them. The CLI
/// applies its own flags last.
#[derive(Clone)]
pub struct ReviewConfig {
    /// Root directory holding the files to review
    pub codebase_dir: PathBuf,
    /// Directory review artifacts and the cache file are written to
    pub output_dir: PathBuf,
    /// Extension allow-set, lowercase with leading dot (".py", ".js", ...)
    pub extensions: BTreeSet<String>,
    /// Optional glob patterns for paths to skip entirely
    pub ignore_globs: Option<GlobSet>,

    pub backend: ModelBackend,
    pub model: String,
    pub base_url: String,

    pub max_tokens: u32,
    pub temperature: f32,
    /// Only the first this-many lines of a file are sent for review
    pub truncate_lines: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,

    /// Canned response for the stub backend
    pub stub_response_file: Option<PathBuf>,
}

const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".cpp", ".java", ".ts", ".html", ".css", ".go",
];

impl ReviewConfig {
    pub fn from_env() -> Result<Self> {
        // Pick up a .env next to the working directory when present
        let _ = dotenvy::dotenv();

        let backend_str =
            std::env::var("REVIEW_BACKEND").unwrap_or_else(|_| "llama-cpp".to_string());
        let backend = backend_str.parse::<ModelBackend>().with_context(|| {
            format!(
                "Invalid REVIEW_BACKEND: {}. Supported: llama-cpp, ollama, stub",
                backend_str
            )
        })?;

        let max_tokens = std::env::var("REVIEW_MAX_TOKENS")
            .unwrap_or_else(|_| "1024".to_string())
            .parse::<u32>()
            .unwrap_or(1024)
            .clamp(64, 32_000);

        let temperature = std::env::var("REVIEW_TEMPERATURE")
            .unwrap_or_else(|_| "0.3".to_string())
            .parse::<f32>()
            .unwrap_or(0.3)
            .clamp(0.0, 2.0);

        let truncate_lines = std::env::var("REVIEW_TRUNCATE_LINES")
            .unwrap_or_else(|_| "200".to_string())
            .parse::<usize>()
            .unwrap_or(200)
            .clamp(1, 10_000);

        let request_timeout_secs = std::env::var("REVIEW_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse::<u64>()
            .unwrap_or(120)
            .clamp(10, 600);

        let connect_timeout_secs = std::env::var("REVIEW_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .unwrap_or(10)
            .clamp(1, 120);

        let extensions = std::env::var("REVIEW_EXTENSIONS")
            .map(|val| parse_extension_list(&val))
            .ok()
            .filter(|set: &BTreeSet<String>| !set.is_empty())
            .unwrap_or_else(default_extensions);

        let ignore_globs = std::env::var("REVIEW_IGNORE_GLOBS")
            .ok()
            .and_then(|val| build_glob_set(val.split(',')));

        let mut config = ReviewConfig {
            codebase_dir: PathBuf::from(
                std::env::var("REVIEW_CODEBASE_DIR").unwrap_or_else(|_| ".".to_string()),
            ),
            output_dir: PathBuf::from(
                std::env::var("REVIEW_OUTPUT_DIR")
                    .unwrap_or_else(|_| "./code_reviews".to_string()),
            ),
            extensions,
            ignore_globs,
            backend,
            model: std::env::var("REVIEW_MODEL")
                .unwrap_or_else(|_| "qwen2.5-coder-7b-instruct".to_string()),
            base_url: std::env::var("REVIEW_BASE_URL")
                .unwrap_or_else(|_| backend.default_base_url().to_string()),
            max_tokens,
            temperature,
            truncate_lines,
            request_timeout_secs,
            connect_timeout_secs,
            stub_response_file: std::env::var("REVIEW_STUB_RESPONSE_FILE")
                .ok()
                .map(PathBuf::from),
        };

        config.apply_config_file()?;
        Ok(config)
    }

    /// Overlay values from an optional JSON config file. Path comes from
    /// REVIEW_CONFIG_FILE, falling back to .review-config.json in CWD.
    fn apply_config_file(&mut self) -> Result<()> {
        let cfg_path = std::env::var("REVIEW_CONFIG_FILE")
            .unwrap_or_else(|_| ".review-config.json".to_string());
        let text = match std::fs::read_to_string(&cfg_path) {
            Ok(text) => text,
            Err(_) => return Ok(()),
        };
        let json: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in config file {}", cfg_path))?;

        if let Some(model) = json.get("model").and_then(|v| v.as_str()) {
            self.model = model.to_string();
        }
        if let Some(backend) = json.get("backend").and_then(|v| v.as_str()) {
            self.backend = backend.parse::<ModelBackend>()?;
            self.base_url = self.backend.default_base_url().to_string();
        }
        if let Some(url) = json.get("base_url").and_then(|v| v.as_str()) {
            self.base_url = url.to_string();
        }
        if let Some(list) = json.get("extensions").and_then(|v| v.as_array()) {
            let set: BTreeSet<String> = list
                .iter()
                .filter_map(|v| v.as_str())
                .map(normalize_extension)
                .collect();
            if !set.is_empty() {
                self.extensions = set;
            }
        }
        if let Some(globs) = json.get("ignore_globs").and_then(|v| v.as_array()) {
            let patterns = globs.iter().filter_map(|v| v.as_str());
            if let Some(set) = build_glob_set(patterns) {
                self.ignore_globs = Some(set);
            }
        }
        Ok(())
    }

    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow::anyhow!("model name cannot be empty"));
        }
        if self.extensions.is_empty() {
            return Err(anyhow::anyhow!("extension allow-set cannot be empty"));
        }
        if self.backend != ModelBackend::Stub && self.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "base_url cannot be empty for backend {}",
                self.backend
            ));
        }
        if self.max_tokens == 0 || self.max_tokens > 100_000 {
            return Err(anyhow::anyhow!("max_tokens must be between 1 and 100,000"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow::anyhow!("temperature must be between 0.0 and 2.0"));
        }
        if self.truncate_lines == 0 {
            return Err(anyhow::anyhow!("truncate_lines must be positive"));
        }
        Ok(())
    }

    /// Whether a path's extension is in the allow-set.
    pub fn allows_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&normalize_extension(e)))
            .unwrap_or(false)
    }
}

fn default_extensions() -> BTreeSet<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn parse_extension_list(val: &str) -> BTreeSet<String> {
    val.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(normalize_extension)
        .collect()
}

fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    format!(".{}", trimmed.to_ascii_lowercase())
}

fn build_glob_set<'a, I: Iterator<Item = &'a str>>(patterns: I) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for pat in patterns.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if let Ok(glob) = Glob::new(pat) {
            builder.add(glob);
            any = true;
        }
    }
    if !any {
        return None;
    }
    builder.build().ok()
}
