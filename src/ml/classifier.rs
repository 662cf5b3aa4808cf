use crate::error::{AppError, Result};
use crate::ml::models::{ForestConfig, LabelMatrix};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;
use tracing::debug;

type Forest = RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Fitted binary model for one category
#[derive(Serialize, Deserialize)]
pub enum CategoryModel {
    /// Every training label had this value; no forest can be fitted
    Constant(u8),

    /// Random forest over the TF-IDF features
    Forest {
        /// Feature columns in the order the forest was fitted on
        columns: Vec<usize>,
        forest: Box<Forest>,
    },
}

impl CategoryModel {
    fn fit(features: &Array2<f64>, y: Vec<i32>, config: &ForestConfig, seed: u64) -> Result<Self> {
        match y.first() {
            Some(&first) if y.iter().all(|&label| label == first) => {
                Ok(CategoryModel::Constant(first as u8))
            }
            Some(_) => {
                let columns = rank_features(features, &y);
                let x = ndarray_to_densematrix(features, &columns);
                let forest = Forest::fit(&x, &y, forest_parameters(config, columns.len(), seed))?;
                Ok(CategoryModel::Forest {
                    columns,
                    forest: Box::new(forest),
                })
            }
            None => Err(AppError::Shape("no training samples".to_string())),
        }
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<u8>> {
        match self {
            CategoryModel::Constant(value) => Ok(vec![*value; features.nrows()]),
            CategoryModel::Forest { columns, forest } => {
                let x = ndarray_to_densematrix(features, columns);
                Ok(forest
                    .predict(&x)?
                    .into_iter()
                    .map(|label| u8::from(label > 0))
                    .collect())
            }
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, CategoryModel::Constant(_))
    }

    /// Feature indices from most to least informative for this category
    pub fn feature_order(&self) -> Option<&[usize]> {
        match self {
            CategoryModel::Constant(_) => None,
            CategoryModel::Forest { columns, .. } => Some(columns.as_slice()),
        }
    }
}

impl fmt::Debug for CategoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryModel::Constant(value) => write!(f, "Constant({})", value),
            CategoryModel::Forest { columns, .. } => write!(f, "Forest({} features)", columns.len()),
        }
    }
}

/// One independent random forest per category, all sharing the same
/// feature matrix and hyperparameters
#[derive(Debug, Serialize, Deserialize)]
pub struct MultiLabelClassifier {
    /// Category names, in column order
    categories: Vec<String>,

    /// Fitted model per category
    models: Vec<CategoryModel>,

    /// Hyperparameters every forest was fitted with
    config: ForestConfig,

    /// Feature count seen at fit time
    n_features: usize,
}

impl MultiLabelClassifier {
    /// Fit one forest per category. Categories are fitted in parallel.
    pub fn fit(features: &Array2<f64>, labels: &LabelMatrix, config: &ForestConfig) -> Result<Self> {
        config.validate()?;
        if features.nrows() != labels.n_samples() {
            return Err(AppError::Shape(format!(
                "feature matrix has {} rows but label matrix has {}",
                features.nrows(),
                labels.n_samples()
            )));
        }
        if features.nrows() == 0 {
            return Err(AppError::Shape("cannot fit on zero samples".to_string()));
        }

        let models = (0..labels.n_categories())
            .into_par_iter()
            .map(|j| {
                let y: Vec<i32> = labels.column(j).iter().map(|&v| i32::from(v)).collect();
                let seed = config.seed.wrapping_add(j as u64);
                CategoryModel::fit(features, y, config, seed).map_err(|e| match e {
                    AppError::Model(msg) => AppError::Model(format!(
                        "category '{}': {}",
                        labels.categories()[j],
                        msg
                    )),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let constant = models.iter().filter(|m| m.is_constant()).count();
        debug!(
            categories = models.len(),
            constant,
            n_trees = config.n_trees,
            "Multi-label classifier fitted"
        );

        Ok(Self {
            categories: labels.categories().to_vec(),
            models,
            config: config.clone(),
            n_features: features.ncols(),
        })
    }

    /// Predict an (n_samples × n_categories) 0/1 matrix
    pub fn predict(&self, features: &Array2<f64>) -> Result<Array2<u8>> {
        if features.ncols() != self.n_features {
            return Err(AppError::Shape(format!(
                "expected {} features, got {}",
                self.n_features,
                features.ncols()
            )));
        }

        let n_samples = features.nrows();
        let mut predictions = Array2::zeros((n_samples, self.categories.len()));
        if n_samples == 0 {
            return Ok(predictions);
        }

        let columns = self
            .models
            .par_iter()
            .map(|model| model.predict(features))
            .collect::<Result<Vec<_>>>()?;

        for (j, column) in columns.into_iter().enumerate() {
            for (i, value) in column.into_iter().enumerate() {
                predictions[[i, j]] = value;
            }
        }
        Ok(predictions)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn model(&self, category: &str) -> Option<&CategoryModel> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|idx| &self.models[idx])
    }
}

/// smartcore splits a node only when it holds more than `min_samples_split`
/// samples, so the threshold is shifted down by one.
fn forest_parameters(config: &ForestConfig, n_features: usize, seed: u64) -> RandomForestClassifierParameters {
    let m = config
        .max_features
        .map_or(n_features, |max| max.min(n_features))
        .max(1);
    let params = RandomForestClassifierParameters::default()
        .with_n_trees(config.n_trees)
        .with_min_samples_split(config.min_samples_split.saturating_sub(1).max(1))
        .with_m(m)
        .with_seed(seed);
    match config.max_depth {
        Some(depth) => params.with_max_depth(depth),
        None => params,
    }
}

/// Order feature columns by the Gini gain of splitting on presence
/// (`x > 0`) over the whole training column, highest first. Ties keep
/// vocabulary order.
///
/// Trees keep the first of several equally good split candidates, so this
/// order decides which feature wins a tie.
fn rank_features(features: &Array2<f64>, y: &[i32]) -> Vec<usize> {
    let n = y.len();
    let positives = y.iter().filter(|&&label| label > 0).count();
    let parent = gini(positives, n);

    let gains: Vec<f64> = features
        .columns()
        .into_iter()
        .map(|column| {
            let (present, present_positive) = column
                .iter()
                .zip(y)
                .filter(|&(&value, _)| value > 0.0)
                .fold((0, 0), |(count, pos), (_, &label)| {
                    (count + 1, pos + usize::from(label > 0))
                });
            let absent = n - present;
            parent
                - present as f64 / n as f64 * gini(present_positive, present)
                - absent as f64 / n as f64 * gini(positives - present_positive, absent)
        })
        .collect();

    let mut columns: Vec<usize> = (0..gains.len()).collect();
    columns.sort_by(|&a, &b| gains[b].total_cmp(&gains[a]));
    columns
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

/// Row-major copy of `arr` with its columns taken in `columns` order
fn ndarray_to_densematrix(arr: &Array2<f64>, columns: &[usize]) -> DenseMatrix<f64> {
    let mut data = Vec::with_capacity(arr.nrows() * columns.len());
    for row in arr.rows() {
        data.extend(columns.iter().map(|&c| row[c]));
    }
    DenseMatrix::new(arr.nrows(), columns.len(), data, false)
}
