use crate::error::{AppError, Result};
use crate::text::TokenFilter;
use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// N-gram range (min, max), in tokens
    pub ngram_range: (usize, usize),

    /// Drop terms appearing in more than this fraction of documents
    pub max_df: f64,

    /// Drop terms appearing in fewer than this many documents
    pub min_df: usize,

    /// Keep only the most frequent terms
    pub max_features: Option<usize>,

    /// Re-weight counts by smoothed inverse document frequency
    pub use_idf: bool,

    /// L2-normalize each document vector
    pub normalize: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_range: (1, 1),
            max_df: 1.0,
            min_df: 1,
            max_features: None,
            use_idf: true,
            normalize: true,
        }
    }
}

impl VectorizerConfig {
    pub fn validate(&self) -> Result<()> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(AppError::Validation(format!(
                "invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(AppError::Validation(format!(
                "max_df must be in (0, 1], got {}",
                self.max_df
            )));
        }
        if self.min_df == 0 {
            return Err(AppError::Validation("min_df must be at least 1".to_string()));
        }
        if self.max_features == Some(0) {
            return Err(AppError::Validation(
                "max_features must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Random forest configuration, applied to every category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees per forest
    pub n_trees: u16,

    /// Minimum number of samples required to split a node
    pub min_samples_split: usize,

    /// Maximum tree depth
    pub max_depth: Option<u16>,

    /// Features considered at each split; every feature when absent
    #[serde(default)]
    pub max_features: Option<usize>,

    /// Seed for bootstrap sampling and feature selection
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            min_samples_split: 2,
            max_depth: None,
            max_features: None,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(AppError::Validation("n_trees must be greater than 0".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(AppError::Validation(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.max_features == Some(0) {
            return Err(AppError::Validation(
                "forest max_features must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// One complete pipeline configuration: tokenizer policy, vectorizer and
/// classifier hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    pub tokenizer: TokenFilter,
    pub vectorizer: VectorizerConfig,
    pub forest: ForestConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.vectorizer.validate()?;
        self.forest.validate()
    }

    /// Flat name/value view of the searched hyperparameters
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        let v = &self.vectorizer;
        let f = &self.forest;
        [
            ("vect__ngram_range", format!("({}, {})", v.ngram_range.0, v.ngram_range.1)),
            ("vect__max_df", v.max_df.to_string()),
            ("tfidf__use_idf", v.use_idf.to_string()),
            ("clf__n_estimators", f.n_trees.to_string()),
            ("clf__min_samples_split", f.min_samples_split.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .hyperparameters()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{}", params)
    }
}

/// Binary label matrix (n_samples × n_categories) with its ordered
/// category names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMatrix {
    categories: Vec<String>,
    values: Array2<u8>,
}

impl LabelMatrix {
    /// Create a label matrix, checking the category set and that every
    /// value is 0 or 1
    pub fn new(categories: Vec<String>, values: Array2<u8>) -> Result<Self> {
        if categories.is_empty() {
            return Err(AppError::Shape("category set is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for category in &categories {
            if !seen.insert(category.as_str()) {
                return Err(AppError::Shape(format!(
                    "duplicate category '{}'",
                    category
                )));
            }
        }
        if values.ncols() != categories.len() {
            return Err(AppError::Shape(format!(
                "label matrix has {} columns but the category set has {}",
                values.ncols(),
                categories.len()
            )));
        }
        if let Some(((row, col), value)) = values.indexed_iter().find(|(_, v)| **v > 1) {
            return Err(AppError::Shape(format!(
                "label '{}' has non-binary value {} in row {}",
                categories[col], value, row
            )));
        }

        Ok(Self { categories, values })
    }

    /// Build from row vectors
    pub fn from_rows(categories: Vec<String>, rows: Vec<Vec<u8>>) -> Result<Self> {
        let n_cols = categories.len();
        let n_rows = rows.len();
        let mut flat = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(AppError::Shape(format!(
                    "row {} has {} labels, expected {}",
                    i,
                    row.len(),
                    n_cols
                )));
            }
            flat.extend(row);
        }
        let values = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| AppError::Shape(e.to_string()))?;
        Self::new(categories, values)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn values(&self) -> &Array2<u8> {
        &self.values
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_categories(&self) -> usize {
        self.categories.len()
    }

    /// Labels of one category
    pub fn column(&self, index: usize) -> ArrayView1<'_, u8> {
        self.values.column(index)
    }

    /// Label matrix restricted to the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> LabelMatrix {
        LabelMatrix {
            categories: self.categories.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Number of positive labels per category
    pub fn positive_counts(&self) -> Vec<usize> {
        self.values
            .columns()
            .into_iter()
            .map(|column| column.iter().filter(|&&v| v == 1).count())
            .collect()
    }

    /// Fail unless `categories` is exactly this matrix's category set, in
    /// the same order
    pub fn ensure_categories(&self, categories: &[String]) -> Result<()> {
        if self.categories.as_slice() != categories {
            return Err(AppError::Shape(format!(
                "category mismatch: expected [{}], got [{}]",
                categories.join(", "),
                self.categories.join(", ")
            )));
        }
        Ok(())
    }
}

/// Message texts paired row-for-row with their labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTexts {
    pub texts: Vec<String>,
    pub labels: LabelMatrix,
}

impl LabeledTexts {
    pub fn new(texts: Vec<String>, labels: LabelMatrix) -> Result<Self> {
        if texts.len() != labels.n_samples() {
            return Err(AppError::Shape(format!(
                "{} texts but {} label rows",
                texts.len(),
                labels.n_samples()
            )));
        }
        Ok(Self { texts, labels })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn categories(&self) -> &[String] {
        self.labels.categories()
    }

    /// Subset with the given rows, in the given order
    pub fn select(&self, rows: &[usize]) -> LabeledTexts {
        LabeledTexts {
            texts: rows.iter().map(|&i| self.texts[i].clone()).collect(),
            labels: self.labels.select_rows(rows),
        }
    }

    /// Shuffle rows with a seeded RNG and hold out `ceil(n * test_size)`
    /// of them. Both sides must end up non-empty.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(LabeledTexts, LabeledTexts)> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(AppError::Validation(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        let n_samples = self.len();
        let n_test = (n_samples as f64 * test_size).ceil() as usize;
        if n_test == 0 || n_test >= n_samples {
            return Err(AppError::Validation(format!(
                "cannot split {} samples with test_size {}",
                n_samples, test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok((self.select(train_idx), self.select(test_idx)))
    }
}

/// Per-category evaluation metrics for the positive class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub category: String,
    pub precision: f64,
    pub recall: f64,
    pub f_score: f64,
    pub support: usize,
}

/// Evaluation report, one row per category in category order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rows: Vec<CategoryMetrics>,

    /// Unweighted mean over categories
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f_score: f64,

    /// Number of evaluated messages
    pub n_samples: usize,
}

impl EvaluationReport {
    pub fn from_rows(rows: Vec<CategoryMetrics>, n_samples: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let macro_precision = rows.iter().map(|r| r.precision).sum::<f64>() / n;
        let macro_recall = rows.iter().map(|r| r.recall).sum::<f64>() / n;
        let macro_f_score = rows.iter().map(|r| r.f_score).sum::<f64>() / n;
        Self {
            rows,
            macro_precision,
            macro_recall,
            macro_f_score,
            n_samples,
        }
    }

    pub fn get(&self, category: &str) -> Option<&CategoryMetrics> {
        self.rows.iter().find(|r| r.category == category)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.category.len())
            .max()
            .unwrap_or(0)
            .max("macro avg".len());

        writeln!(
            f,
            "{:<width$} {:>10} {:>10} {:>10} {:>10}",
            "category", "precision", "recall", "f-score", "support"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                row.category, row.precision, row.recall, row.f_score, row.support
            )?;
        }
        write!(
            f,
            "{:<width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f_score, self.n_samples
        )
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Training run identifier
    pub run_id: uuid::Uuid,

    /// Crate version that produced the model
    pub version: String,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Configuration the model was fitted with
    pub config: PipelineConfig,

    /// Mean cross-validation score of that configuration, when searched
    pub cv_score: Option<f64>,
}

impl ModelMetadata {
    pub fn new(config: PipelineConfig, n_training_samples: usize, n_features: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: chrono::Utc::now(),
            n_training_samples,
            n_features,
            config,
            cv_score: None,
        }
    }
}

/// Prediction for one message: 0/1 per category, in category order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPrediction {
    pub labels: Vec<(String, u8)>,
}

impl CategoryPrediction {
    pub fn get(&self, category: &str) -> Option<u8> {
        self.labels
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, value)| *value)
    }

    /// Categories predicted positive
    pub fn positives(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, value)| *value == 1)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// JSON object keyed by category name
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .labels
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::from(*value)))
            .collect();
        serde_json::Value::Object(map)
    }
}
