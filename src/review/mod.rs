use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::ReviewCache;
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::normalize::{normalize_response, NormalizeError};
use crate::prompt::{build_review_prompt, ReviewRequest};
use crate::providers::ModelHandle;
use crate::{truncate_utf8_safe, ReviewRecord};

/// Name of the persisted cache file inside the output directory.
pub const CACHE_FILE: &str = ".review_cache.json";

/// Result of reviewing one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub record: ReviewRecord,
    /// Served from the cache without a model invocation.
    pub from_cache: bool,
    /// The model response had no locatable payload; the record is empty.
    pub malformed: bool,
}

/// Sequential per-file review driver: read → request → cache lookup →
/// invoke → normalize → cache store. One instance per run; files are
/// processed one at a time, so the cache needs no locking.
pub struct ReviewSession {
    config: ReviewConfig,
    model: ModelHandle,
    cache: ReviewCache,
    cache_path: PathBuf,
    cache_dirty: bool,
}

impl ReviewSession {
    /// Build a session, loading the persisted cache best-effort: a missing
    /// cache file starts empty, a corrupt one is logged and ignored.
    pub fn new(config: ReviewConfig, model: ModelHandle) -> Self {
        let cache_path = config.output_dir.join(CACHE_FILE);
        let cache = match ReviewCache::load(&cache_path) {
            Ok(Some(cache)) => {
                info!("loaded review cache with {} entries", cache.len());
                cache
            }
            Ok(None) => ReviewCache::default(),
            Err(err) => {
                warn!("ignoring unreadable review cache: {}", err);
                ReviewCache::default()
            }
        };
        Self {
            config,
            model,
            cache,
            cache_path,
            cache_dirty: false,
        }
    }

    /// Review one file. Errors here mean the file is skipped; a malformed
    /// model response is not an error and yields an empty record instead.
    pub async fn review_file(&mut self, path: &Path) -> Result<FileOutcome, ReviewError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ReviewError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let request = ReviewRequest::new(path, &contents, self.config.truncate_lines);
        let file_name = request.file_name();
        if request.truncated {
            debug!(
                "{}: reviewing first {} lines only",
                file_name, request.line_count
            );
        }

        if let Some(cached) = self.cache.get(&request.fingerprint) {
            debug!("{}: cache hit for {}", file_name, request.fingerprint);
            let mut record = cached.clone();
            record.source_file = file_name;
            return Ok(FileOutcome {
                record,
                from_cache: true,
                malformed: false,
            });
        }

        let prompt = build_review_prompt(&request);
        let raw = self
            .model
            .complete(&prompt, self.config.max_tokens)
            .await
            .map_err(|err| ReviewError::ModelInvocation {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        match normalize_response(&raw) {
            Ok(mut record) => {
                record.source_file = file_name;
                record.retain_lines_within(request.line_count as u32);
                self.cache
                    .put(request.fingerprint.clone(), record.clone());
                self.cache_dirty = true;
                Ok(FileOutcome {
                    record,
                    from_cache: false,
                    malformed: false,
                })
            }
            Err(NormalizeError::MalformedResponse { raw }) => {
                warn!(
                    "{}: unparsable model response:\n{}",
                    file_name,
                    truncate_utf8_safe(&raw, 2000)
                );
                Ok(FileOutcome {
                    record: ReviewRecord::empty(file_name),
                    from_cache: false,
                    malformed: true,
                })
            }
        }
    }

    /// Persist the cache if anything changed. Best-effort: failures are
    /// logged and the run still counts as complete.
    pub fn persist_cache(&self) {
        if !self.cache_dirty {
            return;
        }
        if let Err(err) = self.cache.save(&self.cache_path) {
            warn!(
                "failed to persist review cache to {}: {}",
                self.cache_path.display(),
                err
            );
        }
    }
}
