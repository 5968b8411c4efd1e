use crate::stats::FitFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Model display order of the rendered tables. Models outside this list are
/// aggregated but never rendered.
pub const DEFAULT_MODEL_ORDER: [&str; 11] = [
    "mnist_2-layer",
    "mnist_normal",
    "mnist_distilled",
    "mnist_brelu",
    "cifar_2-layer",
    "cifar_normal",
    "cifar_distilled",
    "cifar_brelu",
    "inception",
    "resnet",
    "mobilenet",
];

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "bound-report.toml";

/// Top-level configuration loaded from bound-report.toml.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ReportConfig {
    pub filter: FilterConfig,
    pub models: ModelsConfig,
    pub persist: PersistConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub p_value_min: f64,
    pub shape_max: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub order: Vec<String>,
    /// Index of the first model tag in the `_`-split file name.
    pub tag_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

// --- Default implementations ---

impl Default for FilterConfig {
    fn default() -> Self {
        let f = FitFilter::default();
        Self {
            p_value_min: f.p_value_min,
            shape_max: f.shape_max,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_MODEL_ORDER.iter().map(|m| m.to_string()).collect(),
            tag_offset: 0,
        }
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("."),
        }
    }
}

impl FilterConfig {
    pub fn fit_filter(&self) -> FitFilter {
        FitFilter {
            p_value_min: self.p_value_min,
            shape_max: self.shape_max,
        }
    }
}

impl ReportConfig {
    /// Load configuration from `path`.
    ///
    /// With `required == false` a missing file yields the defaults; any other
    /// read or parse failure is an error.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(file = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let cfg = Self::parse(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::debug!(file = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.filter.p_value_min.is_finite() || !self.filter.shape_max.is_finite() {
            return Err(ConfigError::Invalid(
                "filter thresholds must be finite numbers".to_string(),
            ));
        }
        if self.models.order.is_empty() {
            return Err(ConfigError::Invalid(
                "models.order must list at least one model".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = ReportConfig::default();
        assert_eq!(cfg.filter.p_value_min, 0.05);
        assert_eq!(cfg.filter.shape_max, 1000.0);
        assert_eq!(cfg.models.order.len(), 11);
        assert_eq!(cfg.models.order[0], "mnist_2-layer");
        assert_eq!(cfg.models.order[10], "mobilenet");
        assert_eq!(cfg.models.tag_offset, 0);
        assert!(!cfg.persist.enabled);
        assert_eq!(cfg.persist.dir, PathBuf::from("."));
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(ReportConfig::parse("").unwrap(), ReportConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ReportConfig::parse(
            r#"
[filter]
shape_max = 250.0

[models]
tag_offset = 1
"#,
        )
        .unwrap();
        assert_eq!(cfg.filter.p_value_min, 0.05);
        assert_eq!(cfg.filter.shape_max, 250.0);
        assert_eq!(cfg.models.tag_offset, 1);
        assert_eq!(cfg.models.order.len(), 11);
    }

    #[test]
    fn custom_order_and_persist() {
        let cfg = ReportConfig::parse(
            r#"
[models]
order = ["resnet", "inception"]

[persist]
enabled = true
dir = "out/pickles"
"#,
        )
        .unwrap();
        assert_eq!(cfg.models.order, vec!["resnet", "inception"]);
        assert!(cfg.persist.enabled);
        assert_eq!(cfg.persist.dir, PathBuf::from("out/pickles"));
    }

    #[test]
    fn empty_order_rejected() {
        let err = ReportConfig::parse("[models]\norder = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn non_finite_threshold_rejected() {
        let err = ReportConfig::parse("[filter]\nshape_max = inf\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_toml_rejected() {
        let err = ReportConfig::parse("[filter\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_missing_optional_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = ReportConfig::load(&dir.path().join("bound-report.toml"), false).unwrap();
        assert_eq!(cfg, ReportConfig::default());
    }

    #[test]
    fn load_missing_required_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = ReportConfig::load(&dir.path().join("custom.toml"), true).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bound-report.toml");
        std::fs::write(&path, "filter = 3\n").unwrap();
        let err = ReportConfig::load(&path, false).unwrap_err();
        assert!(err.to_string().contains("bound-report.toml"), "{err}");
    }

    #[test]
    fn fit_filter_from_config() {
        let cfg = ReportConfig::parse("[filter]\np_value_min = 0.1\n").unwrap();
        let f = cfg.filter.fit_filter();
        assert_eq!(f.p_value_min, 0.1);
        assert_eq!(f.shape_max, 1000.0);
    }
}
