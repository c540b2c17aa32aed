use anyhow::{Context, Result};
use globset::GlobSet;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ReviewConfig;

/// What the directory walk should pick up. Built once at startup from the
/// loaded configuration and handed to the walker; discovery has no other
/// knobs.
#[derive(Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub extensions: BTreeSet<String>,
    pub ignore_globs: Option<GlobSet>,
}

/// Directories that never hold reviewable sources.
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "vendor",
];

impl ScanConfig {
    pub fn from_review_config(config: &ReviewConfig) -> Self {
        Self {
            root: config.codebase_dir.clone(),
            extensions: config.extensions.clone(),
            ignore_globs: config.ignore_globs.clone(),
        }
    }

    fn allows(&self, path: &Path) -> bool {
        let by_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let normalized = format!(".{}", e.to_ascii_lowercase());
                self.extensions.contains(&normalized)
            })
            .unwrap_or(false);
        if !by_extension {
            return false;
        }
        !self.is_ignored(path)
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_globs
            .as_ref()
            .map(|set| {
                let relative = path.strip_prefix(&self.root).unwrap_or(path);
                set.is_match(relative)
            })
            .unwrap_or(false)
    }
}

/// Collect every eligible regular file under the root, sorted for a
/// deterministic processing order.
pub fn collect_files(config: &ScanConfig) -> Result<Vec<PathBuf>> {
    if !config.root.exists() {
        return Err(anyhow::anyhow!(
            "codebase directory {} does not exist",
            config.root.display()
        ));
    }

    let mut files = Vec::new();
    walk_dir(&config.root, config, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, config: &ScanConfig, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = match fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))
    {
        Ok(entries) => entries,
        Err(err) => {
            // Unreadable subtree: skip it, the rest of the walk continues
            tracing::warn!("{}", err);
            return Ok(());
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("skipping unreadable entry in {}: {}", dir.display(), err);
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_ref()) || name.starts_with('.') {
                continue;
            }
            walk_dir(&path, config, out)?;
        } else if path.is_file() && config.allows(&path) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::{Glob, GlobSetBuilder};

    fn scan_config(root: &Path) -> ScanConfig {
        ScanConfig {
            root: root.to_path_buf(),
            extensions: [".py", ".js"].iter().map(|s| s.to_string()).collect(),
            ignore_globs: None,
        }
    }

    #[test]
    fn collects_only_allowed_extensions() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("app.py"), "print('hi')\n").unwrap();
        fs::write(root.join("index.js"), "console.log(1)\n").unwrap();
        fs::write(root.join("notes.txt"), "skip me\n").unwrap();

        let files = collect_files(&scan_config(root)).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| {
            let ext = p.extension().unwrap().to_str().unwrap();
            ext == "py" || ext == "js"
        }));
    }

    #[test]
    fn skips_vendor_and_hidden_directories() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("node_modules/pkg/x.js"), "1\n").unwrap();
        fs::write(root.join(".hidden/y.py"), "2\n").unwrap();
        fs::write(root.join("src/z.py"), "3\n").unwrap();

        let files = collect_files(&scan_config(root)).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/z.py"));
    }

    #[test]
    fn ignore_globs_prune_matching_paths() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("generated/gen.py"), "1\n").unwrap();
        fs::write(root.join("main.py"), "2\n").unwrap();

        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("generated/**").unwrap());
        let mut cfg = scan_config(root);
        cfg.ignore_globs = Some(builder.build().unwrap());

        let files = collect_files(&cfg).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.py"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let cfg = scan_config(Path::new("/definitely/not/here"));
        assert!(collect_files(&cfg).is_err());
    }

    #[test]
    fn results_are_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("b.py"), "1\n").unwrap();
        fs::write(root.join("a.py"), "2\n").unwrap();
        fs::write(root.join("c.py"), "3\n").unwrap();

        let files = collect_files(&scan_config(root)).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py", "c.py"]);
    }
}
