use crate::error::{AppError, Result};
use crate::ml::models::{CategoryMetrics, EvaluationReport, LabelMatrix};
use crate::ml::pipeline::ClassifierPipeline;
use ndarray::{Array2, ArrayView1};
use tracing::debug;

/// Score a fitted pipeline on held-out messages. Predicts once for the
/// whole batch.
pub fn evaluate<S>(pipeline: &ClassifierPipeline, texts: &[S], labels: &LabelMatrix) -> Result<EvaluationReport>
where
    S: AsRef<str> + Sync,
{
    labels.ensure_categories(pipeline.categories())?;
    if texts.len() != labels.n_samples() {
        return Err(AppError::Shape(format!(
            "{} texts but {} label rows",
            texts.len(),
            labels.n_samples()
        )));
    }

    let predicted = pipeline.predict(texts)?;
    let report = evaluate_predictions(labels, &predicted)?;
    debug!(
        n_samples = report.n_samples,
        macro_f_score = report.macro_f_score,
        "Evaluation complete"
    );
    Ok(report)
}

/// Per-category precision, recall, F-score and support of the positive
/// class, comparing predictions against true labels.
///
/// Every ratio with a zero denominator is reported as 0.0.
pub fn evaluate_predictions(actual: &LabelMatrix, predicted: &Array2<u8>) -> Result<EvaluationReport> {
    if predicted.dim() != actual.values().dim() {
        return Err(AppError::Shape(format!(
            "predictions are {:?} but labels are {:?}",
            predicted.dim(),
            actual.values().dim()
        )));
    }

    let rows = actual
        .categories()
        .iter()
        .enumerate()
        .map(|(j, category)| category_metrics(category, predicted.column(j), actual.column(j)))
        .collect();

    Ok(EvaluationReport::from_rows(rows, actual.n_samples()))
}

fn category_metrics(category: &str, predicted: ArrayView1<u8>, actual: ArrayView1<u8>) -> CategoryMetrics {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&p, &a) in predicted.iter().zip(actual.iter()) {
        match (p == 1, a == 1) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    CategoryMetrics {
        category: category.to_string(),
        precision,
        recall,
        f_score,
        support: tp + fn_,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Fraction of samples whose every label is predicted correctly
pub fn subset_accuracy(predicted: &Array2<u8>, actual: &Array2<u8>) -> f64 {
    let n = predicted.nrows();
    if n == 0 {
        return 0.0;
    }
    let exact = predicted
        .rows()
        .into_iter()
        .zip(actual.rows())
        .filter(|(p, a)| p == a)
        .count();
    exact as f64 / n as f64
}

/// Fraction of individual labels predicted correctly
pub fn label_accuracy(predicted: &Array2<u8>, actual: &Array2<u8>) -> f64 {
    let total = predicted.len();
    if total == 0 {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(actual.iter())
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / total as f64
}
