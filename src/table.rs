//! Columnar record set produced by the extractor, and its typed form.

use crate::schema::{Field, FieldKind};
use serde::{Deserialize, Serialize};
use std::num::ParseFloatError;

/// Raw values of every recognised line in one file, stored per field.
///
/// All columns always have the same length: rows are appended whole.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    columns: Vec<Vec<String>>,
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordTable {
    pub fn new() -> Self {
        Self {
            columns: vec![Vec::new(); Field::ALL.len()],
        }
    }

    /// Append one complete row, values ordered as [`Field::ALL`].
    pub fn push_row(&mut self, row: [String; 12]) {
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    /// Values of a single field, in file order.
    pub fn column(&self, field: Field) -> &[String] {
        &self.columns[field.index()]
    }

    /// Number of recognised lines.
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    /// Convert to typed rows, parsing every numeric column as `f64`.
    pub fn coerce(&self) -> Result<SampleTable, CoerceError> {
        let text = |field: Field, row: usize| self.column(field)[row].clone();
        let num = |field: Field, row: usize| -> Result<f64, CoerceError> {
            debug_assert_eq!(field.kind(), FieldKind::Numeric);
            let value = &self.column(field)[row];
            value.parse().map_err(|source| CoerceError {
                field,
                row,
                value: value.clone(),
                source,
            })
        };

        let mut samples = Vec::with_capacity(self.len());
        for row in 0..self.len() {
            samples.push(Sample {
                id: text(Field::Id, row),
                true_label: text(Field::TrueLabel, row),
                target_label: text(Field::TargetLabel, row),
                info: text(Field::Info, row),
                bnd_norm: text(Field::BndNorm, row),
                bnd: num(Field::Bnd, row)?,
                ks: num(Field::Ks, row)?,
                p_val: num(Field::PVal, row)?,
                shape: num(Field::Shape, row)?,
                loc: num(Field::Loc, row)?,
                scale: num(Field::Scale, row)?,
                g_x0: num(Field::GX0, row)?,
            });
        }

        Ok(SampleTable { samples })
    }
}

/// One typed sample line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub true_label: String,
    pub target_label: String,
    /// Target-selection strategy as written in the log.
    pub info: String,
    /// Norm as written in the log.
    pub bnd_norm: String,
    pub bnd: f64,
    pub ks: f64,
    #[serde(rename = "pVal")]
    pub p_val: f64,
    /// Weibull fit parameters.
    pub shape: f64,
    pub loc: f64,
    pub scale: f64,
    pub g_x0: f64,
}

/// Typed rows of one file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    pub samples: Vec<Sample>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Rows whose `info` and `bnd_norm` equal the given text.
    pub fn select(&self, info: &str, bnd_norm: &str) -> Vec<&Sample> {
        self.samples
            .iter()
            .filter(|s| s.info == info && s.bnd_norm == bnd_norm)
            .collect()
    }
}

/// A numeric field held text that does not parse as a float.
#[derive(Debug)]
pub struct CoerceError {
    pub field: Field,
    /// Zero-based index among the recognised lines.
    pub row: usize,
    pub value: String,
    pub source: ParseFloatError,
}

impl std::fmt::Display for CoerceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "field `{}` of record {} is not numeric: {:?} ({})",
            self.field, self.row, self.value, self.source
        )
    }
}

impl std::error::Error for CoerceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
