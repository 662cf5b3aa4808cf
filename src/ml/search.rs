use crate::error::{AppError, Result};
use crate::ml::evaluation::{evaluate_predictions, label_accuracy, subset_accuracy};
use crate::ml::models::{LabelMatrix, LabeledTexts, PipelineConfig};
use crate::ml::pipeline::ClassifierPipeline;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a candidate's validation predictions are scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Fraction of messages whose whole label row is predicted exactly
    #[default]
    SubsetAccuracy,

    /// Fraction of individual labels predicted correctly
    LabelAccuracy,

    /// Unweighted mean of per-category F-scores
    MacroF1,
}

impl Scoring {
    pub fn score(&self, actual: &LabelMatrix, predicted: &Array2<u8>) -> Result<f64> {
        if predicted.dim() != actual.values().dim() {
            return Err(AppError::Shape(format!(
                "predictions are {:?} but labels are {:?}",
                predicted.dim(),
                actual.values().dim()
            )));
        }
        Ok(match self {
            Scoring::SubsetAccuracy => subset_accuracy(predicted, actual.values()),
            Scoring::LabelAccuracy => label_accuracy(predicted, actual.values()),
            Scoring::MacroF1 => evaluate_predictions(actual, predicted)?.macro_f_score,
        })
    }
}

/// Candidate values per searched hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    #[serde(default = "default_ngram_ranges")]
    pub ngram_range: Vec<(usize, usize)>,

    #[serde(default = "default_max_df")]
    pub max_df: Vec<f64>,

    #[serde(default = "default_use_idf")]
    pub use_idf: Vec<bool>,

    #[serde(default = "default_n_trees")]
    pub n_trees: Vec<u16>,

    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: Vec<usize>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            ngram_range: default_ngram_ranges(),
            max_df: default_max_df(),
            use_idf: default_use_idf(),
            n_trees: default_n_trees(),
            min_samples_split: default_min_samples_split(),
        }
    }
}

fn default_ngram_ranges() -> Vec<(usize, usize)> {
    vec![(1, 1), (1, 2)]
}

fn default_max_df() -> Vec<f64> {
    vec![0.75, 1.0]
}

fn default_use_idf() -> Vec<bool> {
    vec![true, false]
}

fn default_n_trees() -> Vec<u16> {
    vec![100, 200]
}

fn default_min_samples_split() -> Vec<usize> {
    vec![3, 4]
}

impl ParameterGrid {
    /// Grid with a single point: the given configuration
    pub fn single(config: &PipelineConfig) -> Self {
        Self {
            ngram_range: vec![config.vectorizer.ngram_range],
            max_df: vec![config.vectorizer.max_df],
            use_idf: vec![config.vectorizer.use_idf],
            n_trees: vec![config.forest.n_trees],
            min_samples_split: vec![config.forest.min_samples_split],
        }
    }

    pub fn len(&self) -> usize {
        self.ngram_range.len()
            * self.max_df.len()
            * self.use_idf.len()
            * self.n_trees.len()
            * self.min_samples_split.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product of the grid applied on top of `base`. The last
    /// hyperparameter varies fastest.
    pub fn candidates(&self, base: &PipelineConfig) -> Vec<PipelineConfig> {
        let mut out = Vec::with_capacity(self.len());
        for &ngram_range in &self.ngram_range {
            for &max_df in &self.max_df {
                for &use_idf in &self.use_idf {
                    for &n_trees in &self.n_trees {
                        for &min_samples_split in &self.min_samples_split {
                            let mut config = base.clone();
                            config.vectorizer.ngram_range = ngram_range;
                            config.vectorizer.max_df = max_df;
                            config.vectorizer.use_idf = use_idf;
                            config.forest.n_trees = n_trees;
                            config.forest.min_samples_split = min_samples_split;
                            out.push(config);
                        }
                    }
                }
            }
        }
        out
    }
}

/// One cross-validation fold, as row indices into the training split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Unshuffled k-fold splitter. Folds are contiguous; the first
/// `n % k` folds get one extra sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Result<Self> {
        if n_splits < 2 {
            return Err(AppError::Validation(format!(
                "k-fold needs at least 2 splits, got {}",
                n_splits
            )));
        }
        Ok(Self { n_splits })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if n_samples < self.n_splits {
            return Err(AppError::Validation(format!(
                "cannot make {} folds from {} samples",
                self.n_splits, n_samples
            )));
        }

        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for k in 0..self.n_splits {
            let size = base + usize::from(k < extra);
            let end = start + size;
            folds.push(Fold {
                train: (0..start).chain(end..n_samples).collect(),
                validation: (start..end).collect(),
            });
            start = end;
        }
        Ok(folds)
    }
}

/// Fit `config` on `train` and score it on `validation`
pub fn evaluate_candidate(
    config: &PipelineConfig,
    train: &LabeledTexts,
    validation: &LabeledTexts,
    scoring: Scoring,
) -> Result<f64> {
    let pipeline = ClassifierPipeline::fit(config, &train.texts, &train.labels)?;
    let predicted = pipeline.predict(&validation.texts)?;
    scoring.score(&validation.labels, &predicted)
}

/// Cross-validation outcome of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Position in grid order
    pub index: usize,
    pub config: PipelineConfig,
    pub fold_scores: Vec<f64>,
    pub mean_score: Option<f64>,
    pub std_score: Option<f64>,

    /// First fold error, if any fold failed
    pub error: Option<String>,
}

impl CandidateResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Winning pipeline, refit on the full training split, with the full
/// result table
#[derive(Debug)]
pub struct SearchOutcome {
    pub pipeline: ClassifierPipeline,
    pub best_index: usize,
    pub best_score: f64,
    pub results: Vec<CandidateResult>,
}

impl SearchOutcome {
    pub fn best(&self) -> &CandidateResult {
        &self.results[self.best_index]
    }
}

/// Grid search over pipeline configurations with k-fold cross-validation.
///
/// Every (candidate, fold) pair is an independent task on a rayon pool;
/// workers share the training split read-only and return only a score.
#[derive(Debug, Clone)]
pub struct SearchController {
    grid: ParameterGrid,
    base: PipelineConfig,
    k_fold: KFold,
    scoring: Scoring,
    threads: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl SearchController {
    /// Controller with 3 folds, subset accuracy and the default thread count
    pub fn new(grid: ParameterGrid, base: PipelineConfig) -> Self {
        Self {
            grid,
            base,
            k_fold: KFold { n_splits: 3 },
            scoring: Scoring::default(),
            threads: 0,
            cancel: None,
        }
    }

    pub fn with_folds(mut self, n_splits: usize) -> Result<Self> {
        self.k_fold = KFold::new(n_splits)?;
        Ok(self)
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// Worker count; 0 lets rayon decide
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Abandon the search once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn n_candidates(&self) -> usize {
        self.grid.len()
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    pub fn run(&self, train: &LabeledTexts) -> Result<SearchOutcome> {
        if self.grid.is_empty() {
            return Err(AppError::Validation("parameter grid is empty".to_string()));
        }

        let candidates = self.grid.candidates(&self.base);
        let folds: Vec<(LabeledTexts, LabeledTexts)> = self
            .k_fold
            .split(train.len())?
            .into_iter()
            .map(|fold| (train.select(&fold.train), train.select(&fold.validation)))
            .collect();

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        info!(
            candidates = candidates.len(),
            folds = folds.len(),
            fits = tasks.len(),
            scoring = ?self.scoring,
            "🔍 Starting hyperparameter search"
        );
        let started = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build search pool: {}", e)))?;

        let scores: Vec<Option<Result<f64>>> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| {
                    if self.cancelled() {
                        return None;
                    }
                    let (fold_train, fold_validation) = &folds[f];
                    let score =
                        evaluate_candidate(&candidates[c], fold_train, fold_validation, self.scoring);
                    debug!(candidate = c, fold = f, ok = score.is_ok(), "Fold evaluated");
                    Some(score)
                })
                .collect()
        });

        if self.cancelled() || scores.iter().any(Option::is_none) {
            warn!("Hyperparameter search cancelled");
            return Err(AppError::Cancelled);
        }

        let mut scores = scores.into_iter().flatten();
        let results: Vec<CandidateResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, config)| {
                let fold_results: Vec<Result<f64>> = scores.by_ref().take(folds.len()).collect();
                summarize(index, config, fold_results)
            })
            .collect();

        for result in &results {
            match (&result.error, result.mean_score) {
                (None, Some(mean)) => info!(
                    candidate = result.index,
                    mean_score = mean,
                    std_score = result.std_score.unwrap_or(0.0),
                    params = %result.config,
                    "Candidate scored"
                ),
                (Some(error), _) => warn!(
                    candidate = result.index,
                    error = %error,
                    params = %result.config,
                    "Candidate failed, excluded from selection"
                ),
                _ => {}
            }
        }

        let (best_index, best_score) = select_best(&results).ok_or_else(|| {
            AppError::Search(format!("all {} candidates failed", results.len()))
        })?;

        info!(
            best_index,
            best_score,
            params = %results[best_index].config,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✅ Hyperparameter search complete"
        );

        if self.cancelled() {
            return Err(AppError::Cancelled);
        }
        let pipeline = ClassifierPipeline::fit(&results[best_index].config, &train.texts, &train.labels)?
            .with_cv_score(best_score);

        Ok(SearchOutcome {
            pipeline,
            best_index,
            best_score,
            results,
        })
    }
}

fn summarize(index: usize, config: PipelineConfig, fold_results: Vec<Result<f64>>) -> CandidateResult {
    let mut fold_scores = Vec::with_capacity(fold_results.len());
    let mut error = None;
    for result in fold_results {
        match result {
            Ok(score) => fold_scores.push(score),
            Err(e) => {
                error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    let (mean_score, std_score) = if error.is_none() && !fold_scores.is_empty() {
        let n = fold_scores.len() as f64;
        let mean = fold_scores.iter().sum::<f64>() / n;
        let variance = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        (Some(mean), Some(variance.sqrt()))
    } else {
        (None, None)
    };

    CandidateResult {
        index,
        config,
        fold_scores,
        mean_score,
        std_score,
        error,
    }
}

/// Highest mean score among successful candidates; ties go to the
/// earliest candidate
fn select_best(results: &[CandidateResult]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for result in results.iter().filter(|r| r.succeeded()) {
        if let Some(score) = result.mean_score {
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((result.index, score));
            }
        }
    }
    best
}
