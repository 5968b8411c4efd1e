/// Sample-line extraction: scan a log file and collect every
/// `[DEBUG][L1]` line into a columnar [`RecordTable`].
use crate::schema::{Field, SENTINEL};
use crate::table::RecordTable;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Read `path` and return the values of every sample line, in file order.
///
/// Lines whose first field does not carry the sentinel key are skipped.
/// A sentinel line that does not decompose into the twelve known fields is
/// a format error; nothing from such a file is returned.
pub fn extract(path: &Path) -> Result<RecordTable, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    let reader = std::io::BufReader::new(file);

    let mut table = RecordTable::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if !is_sample_line(&line) {
            continue;
        }
        let row = parse_sample_line(&line).map_err(|reason| ExtractError::Format {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        })?;
        table.push_row(row);
    }

    tracing::debug!(file = %path.display(), records = table.len(), "extracted sample lines");
    Ok(table)
}

/// True when the first `,`-separated field of the trimmed line has the sentinel key.
pub fn is_sample_line(line: &str) -> bool {
    let first = line.trim().split(',').next().unwrap_or_default();
    first.split('=').next() == Some(SENTINEL)
}

/// Split a sentinel line into its twelve values, ordered as [`Field::ALL`].
pub fn parse_sample_line(line: &str) -> Result<[String; 12], String> {
    let mut values: [Option<String>; 12] = Default::default();

    for (pos, part) in line.trim().split(',').enumerate() {
        let mut kv = part.split('=');
        let (key, value) = match (kv.next(), kv.next(), kv.next()) {
            (Some(k), Some(v), None) => (k.trim(), v.trim()),
            (_, None, _) => return Err(format!("field {} has no `=`: {:?}", pos + 1, part.trim())),
            _ => {
                return Err(format!(
                    "field {} has more than one `=`: {:?}",
                    pos + 1,
                    part.trim()
                ))
            }
        };

        let field = Field::from_key(key).ok_or_else(|| format!("unknown field `{key}`"))?;
        let slot = &mut values[field.index()];
        if slot.is_some() {
            return Err(format!("duplicate field `{key}`"));
        }
        *slot = Some(value.to_string());
    }

    let missing: Vec<&str> = Field::ALL
        .iter()
        .filter(|f| values[f.index()].is_none())
        .map(|f| f.key())
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing field(s): {}", missing.join(", ")));
    }

    Ok(values.map(Option::unwrap_or_default))
}

#[derive(Debug)]
pub enum ExtractError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Format {
        path: PathBuf,
        /// One-based line number.
        line: usize,
        reason: String,
    },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ExtractError::Format { path, line, reason } => {
                write!(f, "malformed sample line {}:{line}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io { source, .. } => Some(source),
            ExtractError::Format { .. } => None,
        }
    }
}
