//! One batch: discover inputs, ingest them in order, print the tables.

use crate::config::ReportConfig;
use crate::discover::{self, DiscoverError};
use crate::ingest::{Aggregator, IngestError, ResultsTable};
use crate::persist::{self, PersistError};
use crate::report::{self, format_general};
use crate::stats::Describe;
use std::io::Write;
use std::path::PathBuf;

/// Process `paths` with `cfg`, writing summary lines and both tables to `out`.
///
/// Stops at the first file that fails; nothing is rendered in that case.
pub fn run(
    paths: &[PathBuf],
    cfg: &ReportConfig,
    out: &mut impl Write,
) -> Result<ResultsTable, RunError> {
    let files = discover::discover(paths).map_err(RunError::Discover)?;
    tracing::info!(files = files.len(), "processing log files");

    let persist_dir = if cfg.persist.enabled {
        std::fs::create_dir_all(&cfg.persist.dir).map_err(|e| RunError::Io {
            context: format!("create {}", cfg.persist.dir.display()),
            source: e,
        })?;
        Some(cfg.persist.dir.clone())
    } else {
        None
    };

    let aggregator = Aggregator {
        filter: cfg.filter.fit_filter(),
        tag_offset: cfg.models.tag_offset,
        persist_dir,
    };

    let mut results = ResultsTable::new();
    for file in &files {
        tracing::debug!(file = %file.display(), "reading");
        let summaries = aggregator.ingest(file, &mut results).map_err(RunError::Ingest)?;
        for summary in &summaries {
            writeln!(out, "{summary}").map_err(write_err)?;
        }
    }

    let hidden: Vec<&str> = results
        .models()
        .filter(|m| !cfg.models.order.iter().any(|o| o.as_str() == *m))
        .collect();
    if !hidden.is_empty() {
        tracing::info!(models = ?hidden, "models outside the display order are not tabulated");
    }

    writeln!(out, "Generating LaTeX table...").map_err(write_err)?;
    write!(out, "{}", report::render(&results, &cfg.models.order)).map_err(write_err)?;
    out.flush().map_err(write_err)?;

    tracing::info!(models = results.len(), "done");
    Ok(results)
}

/// Print one line per saved group artifact: its key, origin and bound spread.
pub fn inspect(artifacts: &[PathBuf], out: &mut impl Write) -> Result<(), RunError> {
    for path in artifacts {
        let subset = persist::load_subset(path).map_err(RunError::Persist)?;
        let bnd = Describe::of(subset.samples.iter().map(|s| s.bnd));
        writeln!(
            out,
            "{}: model = {}, info = {}, bnd_norm = {}, source = {}, saved = {}, Nimg = {}, bnd_avg = {}, bnd_min = {}, bnd_max = {}",
            path.display(),
            subset.model,
            subset.strategy,
            subset.norm,
            subset.source.display(),
            subset.created.format("%Y-%m-%dT%H:%M:%SZ"),
            bnd.count,
            format_general(bnd.mean, 5),
            format_general(bnd.min, 5),
            format_general(bnd.max, 5),
        )
        .map_err(write_err)?;
    }
    Ok(())
}

fn write_err(source: std::io::Error) -> RunError {
    RunError::Io {
        context: "write report".to_string(),
        source,
    }
}

#[derive(Debug)]
pub enum RunError {
    Discover(DiscoverError),
    Ingest(IngestError),
    Persist(PersistError),
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Discover(e) => write!(f, "{e}"),
            RunError::Ingest(e) => write!(f, "{e}"),
            RunError::Persist(e) => write!(f, "{e}"),
            RunError::Io { context, source } => write!(f, "failed to {context}: {source}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        // Wrapped errors are displayed as-is, so skip straight to their cause.
        match self {
            RunError::Discover(e) => std::error::Error::source(e),
            RunError::Ingest(e) => std::error::Error::source(e),
            RunError::Persist(e) => std::error::Error::source(e),
            RunError::Io { source, .. } => Some(source),
        }
    }
}
