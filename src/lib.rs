//! Multi-label classification of disaster response messages.
//!
//! Training reads labeled messages from SQLite, searches a grid of
//! TF-IDF and random forest settings with cross-validation, evaluates the
//! winner on a held-out split and persists it. Serving loads the persisted
//! pipeline and predicts the categories of a single message.

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod ml;
pub mod text;
pub mod training;

pub use config::Config;
pub use error::{AppError, Result};
pub use ml::{CategoryPrediction, ClassifierPipeline, EvaluationReport};
pub use training::{TrainingOrchestrator, TrainingRun};
