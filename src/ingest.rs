/// Per-file aggregation: extract a log, coerce it, and fold each
/// (strategy, norm) group's statistics into the run's [`ResultsTable`].
use crate::extract::{self, ExtractError};
use crate::persist::{self, PersistError, PersistedSubset};
use crate::report::format_general;
use crate::schema::{Norm, Strategy};
use crate::stats::{Describe, FitFilter};
use crate::table::{CoerceError, Sample, SampleTable};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Datasets whose model name spans two file-name tags (`mnist_distilled`).
const TWO_TAG_DATASETS: [&str; 2] = ["cifar", "mnist"];

/// Derive the model name from a log file's base name.
///
/// The name is split on `_` and read from tag `tag_offset` on. For `cifar`
/// and `mnist` the model is `{tag}_{next tag}` with the next tag cut at its
/// first `.`; otherwise it is the tag alone. A tag that ends the name loses
/// its extension.
pub fn model_name(path: &Path, tag_offset: usize) -> Result<String, IngestError> {
    let err = || IngestError::ModelName {
        path: path.to_path_buf(),
    };
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(err)?;
    let tags: Vec<&str> = base.split('_').collect();
    let strip_ext = |tag: &str| tag.split('.').next().unwrap_or_default().to_string();

    let raw = *tags.get(tag_offset).ok_or_else(err)?;
    let tag1 = if tag_offset + 1 == tags.len() {
        strip_ext(raw)
    } else {
        raw.to_string()
    };
    let name = if TWO_TAG_DATASETS.contains(&tag1.as_str()) {
        let tag2 = *tags.get(tag_offset + 1).ok_or_else(err)?;
        format!("{tag1}_{}", strip_ext(tag2))
    } else {
        tag1
    };

    if name.is_empty() || name.ends_with('_') {
        return Err(err());
    }
    Ok(name)
}

/// Table entry for one (strategy, norm) of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Mean bound over the samples passing the fit filter.
    pub bound: f64,
    /// Share of samples passing the fit filter, in percent.
    pub usable_pct: f64,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        bound: f64::NAN,
        usable_pct: f64::NAN,
    };
}

/// All 3 × 3 cells of one model, NaN until a group fills them.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResults {
    cells: [[Cell; 3]; 3],
}

impl Default for ModelResults {
    fn default() -> Self {
        Self {
            cells: [[Cell::EMPTY; 3]; 3],
        }
    }
}

impl ModelResults {
    pub fn get(&self, strategy: Strategy, norm: Norm) -> Cell {
        self.cells[strategy.index()][norm.index()]
    }

    pub fn set(&mut self, strategy: Strategy, norm: Norm, cell: Cell) {
        self.cells[strategy.index()][norm.index()] = cell;
    }
}

/// Results of a whole run, keyed by model name. Owned by the caller and
/// threaded through every [`Aggregator::ingest`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    models: BTreeMap<String, ModelResults>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The model's entry, created all-NaN on first use.
    pub fn entry(&mut self, model: &str) -> &mut ModelResults {
        self.models.entry(model.to_string()).or_default()
    }

    pub fn get(&self, model: &str) -> Option<&ModelResults> {
        self.models.get(model)
    }

    /// Model names in sorted order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

/// Statistics of one non-empty group of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub model: String,
    pub strategy: Strategy,
    pub norm: Norm,
    /// Bound statistics over every sample in the group.
    pub all: Describe,
    /// Bound statistics over the samples passing the fit filter.
    pub usable: Describe,
    pub filter: FitFilter,
}

impl GroupSummary {
    /// Percentage of the group passing the fit filter.
    pub fn usable_pct(&self) -> f64 {
        self.usable.count as f64 * 100.0 / self.all.count as f64
    }

    pub fn cell(&self) -> Cell {
        Cell {
            bound: self.usable.mean,
            usable_pct: self.usable_pct(),
        }
    }

    /// Identifier shared with the group's persisted artifact.
    pub fn name(&self) -> String {
        persist::artifact_name(&self.model, self.strategy, self.norm)
    }
}

impl std::fmt::Display for GroupSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[L0] model = {}, Nimg = {}, bnd_avg = {}, pVal>{} & shape<{} gives Nimg = {}, bnd_avg = {}, useable = {:.1} %",
            self.name(),
            self.all.count,
            format_general(self.all.mean, 5),
            self.filter.p_value_min,
            self.filter.shape_max,
            self.usable.count,
            format_general(self.usable.mean, 5),
            self.usable_pct(),
        )
    }
}

/// Folds log files into a [`ResultsTable`].
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    pub filter: FitFilter,
    pub tag_offset: usize,
    /// Where group artifacts go; `None` disables persistence.
    pub persist_dir: Option<PathBuf>,
}

impl Aggregator {
    /// Extract `path`, update `results` with every non-empty group, and
    /// return the groups' summaries in strategy-major order.
    pub fn ingest(
        &self,
        path: &Path,
        results: &mut ResultsTable,
    ) -> Result<Vec<GroupSummary>, IngestError> {
        let records = extract::extract(path).map_err(IngestError::Extract)?;
        let table = records.coerce().map_err(|e| IngestError::Coerce {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model = model_name(path, self.tag_offset)?;
        tracing::debug!(file = %path.display(), model = %model, rows = table.len(), "ingesting");

        self.aggregate(path, &model, &table, results)
    }

    /// Group already-typed rows of `source` under `model`.
    pub fn aggregate(
        &self,
        source: &Path,
        model: &str,
        table: &SampleTable,
        results: &mut ResultsTable,
    ) -> Result<Vec<GroupSummary>, IngestError> {
        results.entry(model);

        let mut summaries = Vec::new();
        for strategy in Strategy::ALL {
            for norm in Norm::ALL {
                let group = table.select(strategy.as_str(), norm.as_str());
                if group.is_empty() {
                    tracing::debug!(model, %strategy, %norm, "no samples for group");
                    continue;
                }

                let summary = self.summarize(model, strategy, norm, &group);
                if summary.usable.count == 0 {
                    tracing::warn!(
                        model,
                        %strategy,
                        %norm,
                        samples = summary.all.count,
                        "no sample passes the fit filter"
                    );
                }
                tracing::debug!(
                    group = %summary.name(),
                    std = summary.all.std,
                    min = summary.all.min,
                    max = summary.all.max,
                    "bound spread"
                );
                results.entry(model).set(strategy, norm, summary.cell());

                if let Some(dir) = &self.persist_dir {
                    let subset = PersistedSubset {
                        model: model.to_string(),
                        strategy,
                        norm,
                        source: source.to_path_buf(),
                        created: chrono::Utc::now(),
                        samples: group.iter().map(|s| (*s).clone()).collect(),
                    };
                    persist::save_subset(dir, &subset).map_err(IngestError::Persist)?;
                }

                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    fn summarize(
        &self,
        model: &str,
        strategy: Strategy,
        norm: Norm,
        group: &[&Sample],
    ) -> GroupSummary {
        let usable = self.filter.apply(group);
        GroupSummary {
            model: model.to_string(),
            strategy,
            norm,
            all: Describe::of(group.iter().map(|s| s.bnd)),
            usable: Describe::of(usable.iter().map(|s| s.bnd)),
            filter: self.filter,
        }
    }
}

#[derive(Debug)]
pub enum IngestError {
    Extract(ExtractError),
    Coerce {
        path: PathBuf,
        source: CoerceError,
    },
    ModelName {
        path: PathBuf,
    },
    Persist(PersistError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Extract(e) => write!(f, "{e}"),
            IngestError::Coerce { path, source } => {
                write!(f, "bad value in {}: {source}", path.display())
            }
            IngestError::ModelName { path } => write!(
                f,
                "cannot derive a model name from file name {}",
                path.display()
            ),
            IngestError::Persist(e) => write!(f, "failed to save group subset: {e}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            // Displayed as-is above.
            IngestError::Extract(e) => std::error::Error::source(e),
            IngestError::Coerce { source, .. } => Some(source),
            IngestError::ModelName { .. } => None,
            IngestError::Persist(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::{sample_line, write_log};
    use tempfile::TempDir;

    fn is_unset(cell: Cell) -> bool {
        cell.bound.is_nan() && cell.usable_pct.is_nan()
    }

    fn model(name: &str) -> String {
        model_name(Path::new(name), 0).unwrap()
    }

    #[test]
    fn model_name_two_tag_datasets() {
        assert_eq!(model("mnist_2-layer_foo.log"), "mnist_2-layer");
        assert_eq!(model("cifar_normal_bar.log"), "cifar_normal");
        assert_eq!(model("mnist_distilled.log"), "mnist_distilled");
    }

    #[test]
    fn model_name_single_tag() {
        assert_eq!(model("inception_x.log"), "inception");
        assert_eq!(model("resnet_50_run3.log"), "resnet");
        assert_eq!(model("mobilenet.log"), "mobilenet");
    }

    #[test]
    fn model_name_uses_base_name_only() {
        assert_eq!(model("/data/cifar_runs/mnist_brelu_1.log"), "mnist_brelu");
    }

    #[test]
    fn model_name_with_prefix_offset() {
        let path = Path::new("logs/clever_mnist_2-layer.log");
        assert_eq!(model_name(path, 1).unwrap(), "mnist_2-layer");
        let path = Path::new("logs/clever_inception_0.log");
        assert_eq!(model_name(path, 1).unwrap(), "inception");
    }

    #[test]
    fn model_name_errors() {
        assert!(matches!(
            model_name(Path::new("mnist.log"), 0),
            Err(IngestError::ModelName { .. })
        ));
        assert!(model_name(Path::new("run.log"), 1).is_err());
        assert!(model_name(Path::new("_x.log"), 0).is_err());
        assert!(model_name(Path::new("cifar_.log"), 0).is_err());
    }

    #[test]
    fn new_model_starts_all_nan() {
        let mut results = ResultsTable::new();
        let entry = results.entry("resnet");
        for strategy in Strategy::ALL {
            for norm in Norm::ALL {
                assert!(is_unset(entry.get(strategy, norm)));
            }
        }
        assert!(results.get("resnet").is_some());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn end_to_end_single_group() {
        let dir = TempDir::new().unwrap();
        let lines = vec![
            sample_line(0, "least", "2", 0.10, 0.01, 3.0),
            sample_line(1, "least", "2", 0.20, 0.30, 3.0),
            sample_line(2, "least", "2", 0.30, 0.50, 5000.0),
            sample_line(3, "least", "2", 0.40, 0.80, 10.0),
        ];
        let path = write_log(dir.path(), "mnist_normal_run.log", &lines);

        let mut results = ResultsTable::new();
        let summaries = Aggregator::default().ingest(&path, &mut results).unwrap();

        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.model, "mnist_normal");
        assert_eq!(s.all.count, 4);
        assert!((s.all.mean - 0.25).abs() < 1e-12);
        assert_eq!(s.usable.count, 2);
        assert!((s.usable.mean - 0.30).abs() < 1e-12);
        assert_eq!(s.usable_pct(), 50.0);

        let cell = results
            .get("mnist_normal")
            .unwrap()
            .get(Strategy::Least, Norm::L2);
        assert!((cell.bound - 0.30).abs() < 1e-12);
        assert_eq!(cell.usable_pct, 50.0);
        assert!(is_unset(
            results
                .get("mnist_normal")
                .unwrap()
                .get(Strategy::Least, Norm::I)
        ));
    }

    #[test]
    fn summary_line_format() {
        let dir = TempDir::new().unwrap();
        let lines = vec![
            sample_line(0, "least", "2", 0.10, 0.01, 3.0),
            sample_line(1, "least", "2", 0.20, 0.30, 3.0),
            sample_line(2, "least", "2", 0.30, 0.50, 5000.0),
            sample_line(3, "least", "2", 0.40, 0.80, 10.0),
        ];
        let path = write_log(dir.path(), "mnist_normal_run.log", &lines);
        let mut results = ResultsTable::new();
        let summaries = Aggregator::default().ingest(&path, &mut results).unwrap();

        assert_eq!(
            summaries[0].to_string(),
            "[L0] model = pickle_mnist_normal_least_norm2, Nimg = 4, bnd_avg = 0.25, \
             pVal>0.05 & shape<1000 gives Nimg = 2, bnd_avg = 0.3, useable = 50.0 %"
        );
    }

    #[test]
    fn nine_groups_cover_every_row() {
        let dir = TempDir::new().unwrap();
        let mut lines = Vec::new();
        let mut id = 0;
        for (k, strategy) in ["least", "random", "top2"].iter().enumerate() {
            for (j, norm) in ["1", "2", "i"].iter().enumerate() {
                for _ in 0..(k + j + 1) {
                    lines.push(sample_line(id, strategy, norm, 0.1, 0.5, 3.0));
                    id += 1;
                }
            }
        }
        let path = write_log(dir.path(), "resnet_all.log", &lines);

        let mut results = ResultsTable::new();
        let summaries = Aggregator::default().ingest(&path, &mut results).unwrap();
        assert_eq!(summaries.len(), 9);
        let total: usize = summaries.iter().map(|s| s.all.count).sum();
        assert_eq!(total, lines.len());
        assert_eq!(summaries[0].strategy, Strategy::Least);
        assert_eq!(summaries[0].norm, Norm::L1);
        assert_eq!(summaries[8].strategy, Strategy::Top2);
        assert_eq!(summaries[8].norm, Norm::I);
    }

    #[test]
    fn unknown_categories_are_not_grouped() {
        let dir = TempDir::new().unwrap();
        let lines = vec![
            sample_line(0, "most", "2", 0.1, 0.5, 3.0),
            sample_line(1, "least", "inf", 0.1, 0.5, 3.0),
            sample_line(2, "least", "i", 0.1, 0.5, 3.0),
        ];
        let path = write_log(dir.path(), "resnet_odd.log", &lines);
        let mut results = ResultsTable::new();
        let summaries = Aggregator::default().ingest(&path, &mut results).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].all.count, 1);
    }

    #[test]
    fn empty_group_leaves_previous_value() {
        let dir = TempDir::new().unwrap();
        let first = write_log(
            dir.path(),
            "inception_a.log",
            &[sample_line(0, "top2", "i", 0.7, 0.5, 3.0)],
        );
        let second = write_log(
            dir.path(),
            "inception_b.log",
            &[sample_line(0, "least", "2", 0.2, 0.5, 3.0)],
        );

        let agg = Aggregator::default();
        let mut results = ResultsTable::new();
        agg.ingest(&first, &mut results).unwrap();
        let before = results.get("inception").unwrap().get(Strategy::Top2, Norm::I);
        agg.ingest(&second, &mut results).unwrap();

        let entry = results.get("inception").unwrap();
        assert_eq!(entry.get(Strategy::Top2, Norm::I), before);
        assert!((entry.get(Strategy::Top2, Norm::I).bound - 0.7).abs() < 1e-12);
        assert!((entry.get(Strategy::Least, Norm::L2).bound - 0.2).abs() < 1e-12);
    }

    #[test]
    fn later_file_overwrites_same_group() {
        let dir = TempDir::new().unwrap();
        let first = write_log(
            dir.path(),
            "resnet_a.log",
            &[
                sample_line(0, "random", "2", 0.1, 0.5, 3.0),
                sample_line(1, "random", "2", 0.3, 0.5, 3.0),
            ],
        );
        let second = write_log(
            dir.path(),
            "resnet_b.log",
            &[sample_line(0, "random", "2", 0.9, 0.01, 3.0)],
        );

        let agg = Aggregator::default();
        let mut results = ResultsTable::new();
        agg.ingest(&first, &mut results).unwrap();
        agg.ingest(&second, &mut results).unwrap();

        let cell = results.get("resnet").unwrap().get(Strategy::Random, Norm::L2);
        assert!(cell.bound.is_nan());
        assert_eq!(cell.usable_pct, 0.0);
    }

    #[test]
    fn file_without_samples_still_registers_model() {
        let dir = TempDir::new().unwrap();
        let path = write_log(dir.path(), "mobilenet_empty.log", &["# nothing".to_string()]);
        let mut results = ResultsTable::new();
        let summaries = Aggregator::default().ingest(&path, &mut results).unwrap();
        assert!(summaries.is_empty());
        assert!(results.get("mobilenet").is_some());
    }

    #[test]
    fn custom_filter_is_applied() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            dir.path(),
            "resnet_f.log",
            &[
                sample_line(0, "least", "i", 0.1, 0.2, 3.0),
                sample_line(1, "least", "i", 0.3, 0.6, 3.0),
            ],
        );
        let agg = Aggregator {
            filter: FitFilter {
                p_value_min: 0.5,
                shape_max: 1000.0,
            },
            ..Default::default()
        };
        let mut results = ResultsTable::new();
        let summaries = agg.ingest(&path, &mut results).unwrap();
        assert_eq!(summaries[0].usable.count, 1);
        assert_eq!(summaries[0].usable_pct(), 50.0);
        assert!(summaries[0].to_string().contains("pVal>0.5 & shape<1000"));
    }

    #[test]
    fn coercion_failure_names_file() {
        let dir = TempDir::new().unwrap();
        let line = sample_line(0, "least", "2", 0.1, 0.5, 3.0).replace("ks = 0.0421", "ks = n/a");
        let path = write_log(dir.path(), "resnet_bad.log", &[line]);
        let mut results = ResultsTable::new();
        let err = Aggregator::default().ingest(&path, &mut results).unwrap_err();
        assert!(matches!(err, IngestError::Coerce { .. }));
        assert!(err.to_string().contains("resnet_bad.log"), "{err}");
        assert_eq!(results.len(), 0);
    }

    #[test]
    fn persist_writes_one_artifact_per_group() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let path = write_log(
            dir.path(),
            "cifar_brelu_x.log",
            &[
                sample_line(0, "least", "2", 0.1, 0.5, 3.0),
                sample_line(1, "least", "2", 0.2, 0.01, 3.0),
                sample_line(2, "top2", "1", 0.3, 0.5, 3.0),
            ],
        );
        let agg = Aggregator {
            persist_dir: Some(out.path().to_path_buf()),
            ..Default::default()
        };
        let mut results = ResultsTable::new();
        agg.ingest(&path, &mut results).unwrap();

        let saved = persist::load_subset(&out.path().join("pickle_cifar_brelu_least_norm2")).unwrap();
        assert_eq!(saved.model, "cifar_brelu");
        assert_eq!(saved.source, path);
        assert_eq!(saved.samples.len(), 2);
        assert!(out.path().join("pickle_cifar_brelu_top2_norm1").exists());
        assert!(!out.path().join("pickle_cifar_brelu_random_norm2").exists());
    }
}
