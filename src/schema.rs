//! Fixed schema of the `[DEBUG][L1]` sample lines.
//!
//! Every recognised line carries exactly these twelve `key=value` fields.
//! The first field's key is the sentinel itself (`[DEBUG][L1] id`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the first field (everything before its `=`) that marks a line as a sample.
/// The trailing space is significant.
pub const SENTINEL: &str = "[DEBUG][L1] id ";

/// How a field's text is interpreted once a line has been recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Carried through untouched, never consumed by aggregation.
    Opaque,
    /// Grouping dimension, compared as text.
    Categorical,
    /// Coerced to `f64`.
    Numeric,
}

/// One of the twelve fields of a sample line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Id,
    TrueLabel,
    TargetLabel,
    Info,
    BndNorm,
    Bnd,
    Ks,
    PVal,
    Shape,
    Loc,
    Scale,
    GX0,
}

impl Field {
    /// All fields in the order they appear on a sample line.
    pub const ALL: [Field; 12] = [
        Field::Id,
        Field::TrueLabel,
        Field::TargetLabel,
        Field::Info,
        Field::BndNorm,
        Field::Bnd,
        Field::Ks,
        Field::PVal,
        Field::Shape,
        Field::Loc,
        Field::Scale,
        Field::GX0,
    ];

    /// The key text as it appears on the line, after trimming.
    pub fn key(self) -> &'static str {
        match self {
            Field::Id => "[DEBUG][L1] id",
            Field::TrueLabel => "true_label",
            Field::TargetLabel => "target_label",
            Field::Info => "info",
            Field::BndNorm => "bnd_norm",
            Field::Bnd => "bnd",
            Field::Ks => "ks",
            Field::PVal => "pVal",
            Field::Shape => "shape",
            Field::Loc => "loc",
            Field::Scale => "scale",
            Field::GX0 => "g_x0",
        }
    }

    /// Look up a field by its trimmed key.
    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Id | Field::TrueLabel | Field::TargetLabel => FieldKind::Opaque,
            Field::Info | Field::BndNorm => FieldKind::Categorical,
            Field::Bnd
            | Field::Ks
            | Field::PVal
            | Field::Shape
            | Field::Loc
            | Field::Scale
            | Field::GX0 => FieldKind::Numeric,
        }
    }

    /// Position in [`Field::ALL`], used to index columnar storage.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Target-selection method used to generate an adversarial example (`info` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Least,
    Random,
    Top2,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Least, Strategy::Random, Strategy::Top2];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Least => "least",
            Strategy::Random => "random",
            Strategy::Top2 => "top2",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance metric of a bound (`bnd_norm` field). `I` is the infinity norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Norm {
    #[serde(rename = "1")]
    L1,
    #[serde(rename = "2")]
    L2,
    #[serde(rename = "i")]
    I,
}

impl Norm {
    pub const ALL: [Norm; 3] = [Norm::L1, Norm::L2, Norm::I];

    /// Norms that appear as columns in the rendered tables.
    pub const REPORTED: [Norm; 2] = [Norm::L2, Norm::I];

    pub fn as_str(self) -> &'static str {
        match self {
            Norm::L1 => "1",
            Norm::L2 => "2",
            Norm::I => "i",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Norm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
