//! Input discovery: expand the command-line paths into log files.
//!
//! A directory contributes every `*.log` entry directly inside it (no
//! recursion), in sorted order; hidden `.*.log` files are skipped. Anything
//! else is taken as a file as-is, so a missing path surfaces later as a read
//! error naming it.

use std::path::{Path, PathBuf};

pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = log_files_in(path)?;
            tracing::debug!(dir = %path.display(), count = found.len(), "expanded directory");
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn log_files_in(dir: &Path) -> Result<Vec<PathBuf>, DiscoverError> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{escaped}/*.log");
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..Default::default()
    };
    let entries = glob::glob_with(&pattern, options).map_err(|e| DiscoverError::Pattern {
        pattern: pattern.clone(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DiscoverError::Glob { source: e })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug)]
pub enum DiscoverError {
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
    Glob {
        source: glob::GlobError,
    },
}

impl std::fmt::Display for DiscoverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoverError::Pattern { pattern, source } => {
                write!(f, "invalid search pattern {pattern:?}: {source}")
            }
            DiscoverError::Glob { source } => write!(f, "failed to list log files: {source}"),
        }
    }
}

impl std::error::Error for DiscoverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoverError::Pattern { source, .. } => Some(source),
            DiscoverError::Glob { source } => Some(source),
        }
    }
}
