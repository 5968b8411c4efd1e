//! Descriptive statistics over a numeric column and the Weibull-fit filter.

use crate::table::Sample;

/// Count, mean, sample standard deviation, min and max of a column.
///
/// Every statistic except `count` is NaN for an empty column; `std` is NaN
/// for a single value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Describe {
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.into_iter().collect();
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if count > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Self {
            count,
            mean,
            std,
            min,
            max,
        }
    }
}

/// Keeps samples whose fit is trustworthy: `pVal > p_value_min` and `shape < shape_max`.
///
/// Both comparisons are strict, so NaN values never pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitFilter {
    pub p_value_min: f64,
    pub shape_max: f64,
}

impl Default for FitFilter {
    fn default() -> Self {
        Self {
            p_value_min: 0.05,
            shape_max: 1000.0,
        }
    }
}

impl FitFilter {
    pub fn accepts(&self, sample: &Sample) -> bool {
        sample.p_val > self.p_value_min && sample.shape < self.shape_max
    }

    pub fn apply<'a>(&self, samples: &[&'a Sample]) -> Vec<&'a Sample> {
        samples.iter().copied().filter(|s| self.accepts(s)).collect()
    }
}
