use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use local_code_reviewer::providers::{ModelBackend, ModelHandle};
use local_code_reviewer::report;
use local_code_reviewer::scan::{self, ScanConfig};
use local_code_reviewer::{ReviewConfig, ReviewSession};

/// Review every eligible source file under a directory with a
/// locally-hosted language model.
#[derive(Parser)]
#[command(name = "review", version, about)]
struct Cli {
    /// Root directory of the codebase to review
    root: Option<PathBuf>,

    /// Directory review artifacts are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Inference backend: llama-cpp, ollama or stub
    #[arg(long)]
    backend: Option<String>,

    /// Model name passed to the backend
    #[arg(long)]
    model: Option<String>,

    /// Print one summary line per file instead of the full review
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ReviewConfig::from_env().context("Failed to load configuration")?;
    if let Some(root) = cli.root {
        config.codebase_dir = root;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(backend) = cli.backend.as_deref() {
        config.backend = backend.parse::<ModelBackend>()?;
        if std::env::var("REVIEW_BASE_URL").is_err() {
            config.base_url = config.backend.default_base_url().to_string();
        }
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    config.validate().context("Configuration validation failed")?;

    let scan_config = ScanConfig::from_review_config(&config);
    let files = match scan::collect_files(&scan_config) {
        Ok(files) => files,
        Err(err) => {
            error!("{}", err);
            return Ok(());
        }
    };
    if files.is_empty() {
        info!(
            "no reviewable files under {}",
            config.codebase_dir.display()
        );
        return Ok(());
    }
    info!(
        "reviewing {} files with backend {}",
        files.len(),
        config.backend
    );

    let model = ModelHandle::from_config(&config).context("Failed to create model client")?;
    let output_dir = config.output_dir.clone();
    let mut session = ReviewSession::new(config, model);

    let mut reviewed = 0usize;
    let mut cache_hits = 0usize;
    let mut malformed = 0usize;
    let mut skipped = 0usize;

    for path in &files {
        info!("reviewing {}", path.display());
        let outcome = match session.review_file(path).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("skipping {}: {}", path.display(), err);
                skipped += 1;
                continue;
            }
        };

        let file_name = outcome.record.source_file.clone();
        if let Err(err) = report::save_review(&output_dir, &file_name, &outcome.record) {
            warn!("failed to save review for {}: {}", file_name, err);
        }

        if cli.quiet {
            report::print_file_summary(&file_name, &outcome.record, outcome.from_cache);
        } else {
            report::print_review(&file_name, &outcome.record);
        }

        reviewed += 1;
        if outcome.from_cache {
            cache_hits += 1;
        }
        if outcome.malformed {
            malformed += 1;
        }
    }

    session.persist_cache();

    info!(
        "done: {} reviewed ({} cached, {} unparsable), {} skipped",
        reviewed, cache_hits, malformed, skipped
    );
    Ok(())
}
