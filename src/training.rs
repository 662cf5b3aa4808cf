use crate::config::Config;
use crate::data::{CorpusSummary, DataSource, SqliteSource};
use crate::error::Result;
use crate::ml::evaluation::evaluate;
use crate::ml::models::EvaluationReport;
use crate::ml::search::{CandidateResult, SearchController};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Outcome of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub run_id: uuid::Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    pub database: PathBuf,
    pub model_path: PathBuf,
    pub corpus: CorpusSummary,
    pub n_train: usize,
    pub n_test: usize,
    pub best_candidate: usize,
    pub best_score: f64,

    /// Cross-validation results of every candidate, in grid order
    pub search: Vec<CandidateResult>,

    /// Held-out evaluation of the saved pipeline
    pub report: EvaluationReport,
}

impl TrainingRun {
    pub fn best(&self) -> &CandidateResult {
        &self.search[self.best_candidate]
    }
}

/// Path of the JSON report written next to a model file
pub fn report_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("report.json")
}

/// Load, split, search, evaluate and persist.
pub struct TrainingOrchestrator {
    config: Config,
    cancel: Option<Arc<AtomicBool>>,
    console: bool,
}

impl TrainingOrchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: None,
            console: false,
        }
    }

    /// Print stage banners and the report table to stdout
    pub fn with_console_output(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn stage(&self, banner: &str) {
        if self.console {
            println!("{}", banner);
        }
    }

    /// Train from the SQLite database at `database` and save the winning
    /// pipeline to `model_path`
    pub fn run(&self, database: &Path, model_path: &Path) -> Result<TrainingRun> {
        let source = SqliteSource::new(database, self.config.data.table.clone());
        self.run_with_source(&source, database, model_path)
    }

    pub fn run_with_source(
        &self,
        source: &dyn DataSource,
        database: &Path,
        model_path: &Path,
    ) -> Result<TrainingRun> {
        let run_id = uuid::Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let started = Instant::now();
        info!(run_id = %run_id, database = %database.display(), "🚀 Training run started");

        self.stage(&format!("Loading data...\n    DATABASE: {}", database.display()));
        let corpus = source.load()?;
        let summary = corpus.summary();
        let data = corpus.labeled_texts()?;
        let (train, test) = data.train_test_split(self.config.split.test_size, self.config.split.seed)?;
        info!(
            messages = corpus.len(),
            categories = corpus.categories().len(),
            n_train = train.len(),
            n_test = test.len(),
            "Split corpus"
        );

        self.stage("Building model...");
        let mut controller =
            SearchController::new(self.config.search.grid.clone(), self.config.base_pipeline())
                .with_folds(self.config.search.folds)?
                .with_scoring(self.config.search.scoring)
                .with_threads(self.config.search.threads);
        if let Some(flag) = &self.cancel {
            controller = controller.with_cancel_flag(flag.clone());
        }

        self.stage("Training model...");
        let outcome = controller.run(&train)?;

        self.stage("Evaluating model...");
        let report = evaluate(&outcome.pipeline, &test.texts, &test.labels)?;
        if self.console {
            println!("{}", report);
        }
        info!(
            macro_precision = report.macro_precision,
            macro_recall = report.macro_recall,
            macro_f_score = report.macro_f_score,
            "Held-out evaluation"
        );

        self.stage(&format!("Saving model...\n    MODEL: {}", model_path.display()));
        outcome.pipeline.save(model_path)?;

        let run = TrainingRun {
            run_id,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            database: database.to_path_buf(),
            model_path: model_path.to_path_buf(),
            corpus: summary,
            n_train: train.len(),
            n_test: test.len(),
            best_candidate: outcome.best_index,
            best_score: outcome.best_score,
            search: outcome.results,
            report,
        };

        if self.config.output.write_report {
            let path = report_path(model_path);
            let writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(writer, &run)?;
            info!(path = %path.display(), "Report written");
        }

        self.stage("Trained model saved!");
        info!(
            run_id = %run.run_id,
            duration_ms = run.duration_ms,
            best_score = run.best_score,
            "✅ Training run complete"
        );
        Ok(run)
    }
}
