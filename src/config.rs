use crate::error::{AppError, Result};
use crate::ml::models::{ForestConfig, PipelineConfig, VectorizerConfig};
use crate::ml::search::{ParameterGrid, Scoring};
use crate::text::TokenFilter;
use serde::{Deserialize, Serialize};
use validator::Validate;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Data source configuration
    #[serde(default)]
    pub data: DataConfig,

    /// Train/test split configuration
    #[serde(default)]
    pub split: SplitConfig,

    /// Hyperparameter search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Settings shared by every forest
    #[serde(default)]
    pub forest: ForestSettings,

    /// Vectorizer settings outside the searched grid
    #[serde(default)]
    pub vectorizer: VectorizerSettings,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("DR_CONFIG").unwrap_or_else(|_| "config/train.toml".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: DR__)
            .add_source(
                config::Environment::with_prefix("DR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Embedded defaults overridden by a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.split.validate()?;
        self.search.validate()?;
        self.logging.validate()?;

        if self.search.grid.is_empty() {
            return Err(AppError::Configuration(
                "search.grid has an empty hyperparameter list".to_string(),
            ));
        }
        for candidate in self.search.grid.candidates(&self.base_pipeline()) {
            candidate
                .validate()
                .map_err(|e| AppError::Configuration(format!("search.grid: {}", e)))?;
        }
        Ok(())
    }

    /// Pipeline configuration the grid is applied on top of
    pub fn base_pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            tokenizer: self.search.tokenizer,
            vectorizer: VectorizerConfig {
                min_df: self.vectorizer.min_df,
                max_features: self.vectorizer.max_features,
                normalize: self.vectorizer.normalize,
                ..Default::default()
            },
            forest: ForestConfig {
                max_depth: self.forest.max_depth,
                max_features: self.forest.max_features,
                seed: self.forest.seed,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataConfig {
    /// Table holding the labeled messages
    #[serde(default = "default_table")]
    #[validate(length(min = 1))]
    pub table: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SplitConfig {
    /// Fraction of messages held out for evaluation
    #[serde(default = "default_test_size")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_size: f64,

    /// Shuffle seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    /// Cross-validation folds
    #[serde(default = "default_folds")]
    #[validate(range(min = 2, max = 20))]
    pub folds: usize,

    /// Candidate scoring
    #[serde(default)]
    pub scoring: Scoring,

    /// Search worker threads (0 = one per core)
    #[serde(default)]
    pub threads: usize,

    /// Token policy for every candidate
    #[serde(default)]
    pub tokenizer: TokenFilter,

    /// Searched hyperparameter values
    #[serde(default)]
    pub grid: ParameterGrid,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            folds: default_folds(),
            scoring: Scoring::default(),
            threads: 0,
            tokenizer: TokenFilter::default(),
            grid: ParameterGrid::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestSettings {
    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<u16>,

    /// Features tried per split (all when absent)
    #[serde(default)]
    pub max_features: Option<usize>,

    /// Forest seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ForestSettings {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_features: None,
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerSettings {
    /// Minimum document frequency
    #[serde(default = "default_min_df")]
    pub min_df: usize,

    /// Vocabulary size cap
    #[serde(default)]
    pub max_features: Option<usize>,

    /// L2-normalize document vectors
    #[serde(default = "default_true")]
    pub normalize: bool,
}

impl Default for VectorizerSettings {
    fn default() -> Self {
        Self {
            min_df: default_min_df(),
            max_features: None,
            normalize: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write `<model>.report.json` next to the model
    #[serde(default = "default_true")]
    pub write_report: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { write_report: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1))]
    pub level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_table() -> String {
    "DisasterResponse".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_folds() -> usize {
    3
}

fn default_min_df() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.data.table, "DisasterResponse");
        assert_eq!(config.split.test_size, 0.2);
        assert_eq!(config.search.folds, 3);
        assert_eq!(config.search.scoring, Scoring::SubsetAccuracy);
        assert_eq!(config.search.grid, ParameterGrid::default());
        assert_eq!(config.vectorizer.max_features, Some(2000));
        assert!(config.output.write_report);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_toml(
            r#"
            [search]
            folds = 5
            scoring = "macro_f1"

            [search.grid]
            ngram_range = [[1, 2]]
            n_trees = [10]

            [forest]
            max_depth = 8
            max_features = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.search.folds, 5);
        assert_eq!(config.search.scoring, Scoring::MacroF1);
        assert_eq!(config.search.grid.ngram_range, vec![(1, 2)]);
        assert_eq!(config.search.grid.n_trees, vec![10]);
        assert_eq!(config.search.grid.max_df, vec![0.75, 1.0]);

        let base = config.base_pipeline();
        assert_eq!(base.forest.max_depth, Some(8));
        assert_eq!(base.forest.max_features, Some(40));
        assert_eq!(base.vectorizer.max_features, Some(2000));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_toml("[split]\ntest_size = 1.5").is_err());
        assert!(Config::from_toml("[search]\nfolds = 1").is_err());
        assert!(Config::from_toml("[search.grid]\nmax_df = [0.0]").is_err());
        assert!(Config::from_toml("[search.grid]\nn_trees = []").is_err());
    }

    #[test]
    fn test_default_struct_matches_code_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_pipeline().vectorizer.max_features, None);
        assert_eq!(config.logging.level, "info");
    }
}
