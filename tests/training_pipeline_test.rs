/// Integration tests for the training pipeline
///
/// These tests verify:
/// - Loading labeled messages from SQLite
/// - Fitting and predicting with the full pipeline
/// - Model persistence
/// - The training run end to end
mod common;

use disaster_response::{
    config::Config,
    data::{DataSource, SqliteSource},
    ml::{
        evaluate, ClassifierPipeline, ForestConfig, LabelMatrix, PipelineConfig,
    },
    training::{report_path, TrainingOrchestrator},
    AppError,
};

fn forest(n_trees: u16) -> PipelineConfig {
    PipelineConfig {
        forest: ForestConfig {
            n_trees,
            min_samples_split: 2,
            max_depth: None,
            max_features: None,
            seed: 5,
        },
        ..Default::default()
    }
}

fn four_message_corpus() -> ([&'static str; 4], LabelMatrix) {
    let texts = [
        "need water urgently",
        "house on fire",
        "water and food needed",
        "unrelated chatter",
    ];
    let labels = LabelMatrix::from_rows(
        vec!["water".to_string(), "fire".to_string()],
        vec![vec![1, 0], vec![0, 1], vec![1, 0], vec![0, 0]],
    )
    .unwrap();
    (texts, labels)
}

#[test]
fn test_four_message_corpus() {
    let (texts, labels) = four_message_corpus();

    let pipeline = ClassifierPipeline::fit(&PipelineConfig::default(), &texts, &labels).unwrap();
    let prediction = pipeline.predict_message("water shortage").unwrap();

    assert_eq!(prediction.get("water"), Some(1));
    assert_eq!(prediction.get("fire"), Some(0));
}

#[test]
fn test_four_message_corpus_every_grid_candidate() {
    let (texts, labels) = four_message_corpus();
    let config = Config::from_toml("").unwrap();

    let mut bases = vec![PipelineConfig::default(), config.base_pipeline()];
    bases.push(forest(10));
    for base in &bases {
        for candidate in config.search.grid.candidates(base) {
            let pipeline = ClassifierPipeline::fit(&candidate, &texts, &labels).unwrap();
            let prediction = pipeline.predict_message("water shortage").unwrap();

            assert_eq!(prediction.get("water"), Some(1), "{}", candidate);
            assert_eq!(prediction.get("fire"), Some(0), "{}", candidate);
        }
    }
}

#[test]
fn test_load_and_fit_from_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::create_message_db(dir.path(), "messages.db", &common::sample_rows());

    let corpus = SqliteSource::new(&db, "DisasterResponse").load().unwrap();
    assert_eq!(corpus.categories(), common::CATEGORIES);
    assert_eq!(corpus.len(), 22);

    let data = corpus.labeled_texts().unwrap();
    let pipeline = ClassifierPipeline::fit(&forest(20), &data.texts, &data.labels).unwrap();

    // child_alone never occurs, so it is always predicted 0
    let predictions = pipeline.predict(&data.texts).unwrap();
    assert_eq!(predictions.dim(), (22, 4));
    assert!(predictions.column(3).iter().all(|&v| v == 0));

    let prediction = pipeline.predict_message("we need clean drinking water").unwrap();
    assert_eq!(prediction.get("water"), Some(1));
    assert_eq!(prediction.get("fire"), Some(0));
}

#[test]
fn test_saved_model_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::create_message_db(dir.path(), "messages.db", &common::sample_rows());
    let data = SqliteSource::new(&db, "DisasterResponse")
        .load()
        .unwrap()
        .labeled_texts()
        .unwrap();

    let pipeline = ClassifierPipeline::fit(&forest(20), &data.texts, &data.labels).unwrap();
    let model_path = dir.path().join("classifier.bin");
    pipeline.save(&model_path).unwrap();
    let loaded = ClassifierPipeline::load(&model_path).unwrap();

    let sample = [
        "is there water available",
        "the fire is out of control",
        "",
        "unrelated chatter about football",
        "water water water fire",
    ];
    assert_eq!(pipeline.predict(&sample).unwrap(), loaded.predict(&sample).unwrap());
    for text in sample {
        assert_eq!(
            pipeline.predict_message(text).unwrap(),
            loaded.predict_message(text).unwrap()
        );
    }
}

#[test]
fn test_evaluate_rejects_other_categories() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::create_message_db(dir.path(), "messages.db", &common::sample_rows());
    let data = SqliteSource::new(&db, "DisasterResponse")
        .load()
        .unwrap()
        .labeled_texts()
        .unwrap();
    let pipeline = ClassifierPipeline::fit(&forest(10), &data.texts, &data.labels).unwrap();

    let reordered = LabelMatrix::from_rows(
        vec![
            "water".to_string(),
            "related".to_string(),
            "fire".to_string(),
            "child_alone".to_string(),
        ],
        vec![vec![1, 1, 0, 0]],
    )
    .unwrap();
    let err = evaluate(&pipeline, &["need water"], &reordered).unwrap_err();
    assert!(matches!(err, AppError::Shape(_)));
}

#[test]
fn test_training_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::create_message_db(dir.path(), "messages.db", &common::sample_rows());
    let model_path = dir.path().join("models").join("classifier.bin");

    let config = Config::from_toml(common::FAST_CONFIG).unwrap();
    let run = TrainingOrchestrator::new(config).run(&db, &model_path).unwrap();

    // Every category reported exactly once, in schema order
    let reported: Vec<&str> = run.report.rows.iter().map(|r| r.category.as_str()).collect();
    assert_eq!(reported, common::CATEGORIES);
    assert_eq!(run.search.len(), 2);
    assert_eq!(run.n_train + run.n_test, 22);

    let child_alone = run.report.get("child_alone").unwrap();
    assert_eq!(child_alone.support, 0);
    assert_eq!(child_alone.precision, 0.0);
    assert_eq!(child_alone.f_score, 0.0);

    let pipeline = ClassifierPipeline::load(&model_path).unwrap();
    assert_eq!(pipeline.categories(), common::CATEGORIES);
    assert_eq!(pipeline.metadata().cv_score, Some(run.best_score));
    assert!(report_path(&model_path).exists());
}

#[test]
fn test_training_run_rejects_null_labels() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::create_message_db(dir.path(), "messages.db", &common::sample_rows());
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute("UPDATE DisasterResponse SET water = NULL WHERE id = 3", [])
        .unwrap();
    drop(conn);

    let model_path = dir.path().join("classifier.bin");
    let config = Config::from_toml(common::FAST_CONFIG).unwrap();
    let err = TrainingOrchestrator::new(config)
        .run(&db, &model_path)
        .unwrap_err();

    assert!(err.is_input_error());
    assert!(!model_path.exists());
}
