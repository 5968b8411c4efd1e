//! LaTeX-ready tables of the aggregated results.
//!
//! Rows are `model & value & value &` with tab padding so the output can be
//! pasted into a `tabular` environment. Only the 2-norm and infinity-norm
//! columns are rendered, and only models listed in the display order appear.

use crate::ingest::{Cell, ResultsTable};
use crate::schema::{Norm, Strategy};

/// Separator between cells, as it appears in the table source.
const DELIM: &str = " &\t";

/// Which half of each cell a table shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportVariant {
    /// Mean bound of the usable samples, 3 decimals.
    Bounds,
    /// Usable percentage, 1 decimal.
    UsablePct,
}

impl ReportVariant {
    pub const ALL: [ReportVariant; 2] = [ReportVariant::Bounds, ReportVariant::UsablePct];

    pub fn precision(self) -> usize {
        match self {
            ReportVariant::Bounds => 3,
            ReportVariant::UsablePct => 1,
        }
    }

    pub fn banner(self) -> &'static str {
        match self {
            ReportVariant::Bounds => "%%% Table for bounds %%%",
            ReportVariant::UsablePct => "%%% Table for p-values %%%",
        }
    }

    fn pick(self, cell: Cell) -> f64 {
        match self {
            ReportVariant::Bounds => cell.bound,
            ReportVariant::UsablePct => cell.usable_pct,
        }
    }
}

/// Both tables, each preceded by a blank line and its banner.
pub fn render(results: &ResultsTable, order: &[String]) -> String {
    let mut out = String::new();
    for variant in ReportVariant::ALL {
        out.push('\n');
        out.push_str(variant.banner());
        out.push('\n');
        out.push_str(&render_variant(results, order, variant));
    }
    out
}

/// One table: a header plus one row per known model, for each strategy.
pub fn render_variant(results: &ResultsTable, order: &[String], variant: ReportVariant) -> String {
    let mut out = String::new();
    for strategy in Strategy::ALL {
        out.push_str(&format!("{:<15}", strategy.as_str()));
        for norm in Norm::REPORTED {
            out.push_str(&format!("{DELIM}{:<7}", norm.as_str()));
        }
        out.push_str(" &\n");

        for model in order {
            let Some(entry) = results.get(model) else {
                continue;
            };
            out.push_str(&format!("{model:<15}{DELIM}"));
            for norm in Norm::REPORTED {
                let value = variant.pick(entry.get(strategy, norm));
                out.push_str(&format_fixed(value, 7, variant.precision()));
                out.push_str(DELIM);
            }
            out.push('\n');
        }
    }
    out
}

/// Right-aligned fixed-point number; non-finite values print as `nan`/`inf`/`-inf`.
pub fn format_fixed(value: f64, width: usize, precision: usize) -> String {
    match non_finite(value) {
        Some(text) => format!("{text:>width$}"),
        None => format!("{value:>width$.precision$}"),
    }
}

/// C-style `%.{sig}g`: `sig` significant digits, trailing zeros removed,
/// scientific notation when the exponent is below -4 or at least `sig`.
pub fn format_general(value: f64, sig: usize) -> String {
    if let Some(text) = non_finite(value) {
        return text.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sig = sig.max(1);
    // Round once in scientific form so the exponent reflects the rounding.
    let sci = format!("{:.*e}", sig - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= sig as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (sig as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn non_finite(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("nan")
    } else if value == f64::INFINITY {
        Some("inf")
    } else if value == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}
