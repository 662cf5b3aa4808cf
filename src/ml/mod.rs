/// Machine learning pipeline for multi-label message classification
///
/// This module provides:
/// - TF-IDF feature extraction over tokenized messages
/// - One random forest per category
/// - Grid search with k-fold cross-validation
/// - Per-category evaluation
/// - Pipeline persistence

pub mod classifier;
pub mod evaluation;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod search;

pub use classifier::{CategoryModel, MultiLabelClassifier};
pub use evaluation::{evaluate, evaluate_predictions};
pub use features::FeatureExtractor;
pub use models::{
    CategoryMetrics, CategoryPrediction, EvaluationReport, ForestConfig, LabelMatrix,
    LabeledTexts, ModelMetadata, PipelineConfig, VectorizerConfig,
};
pub use pipeline::ClassifierPipeline;
pub use search::{
    evaluate_candidate, CandidateResult, KFold, ParameterGrid, Scoring, SearchController,
    SearchOutcome,
};
