use crate::error::{AppError, Result};
use crate::ml::classifier::MultiLabelClassifier;
use crate::ml::features::FeatureExtractor;
use crate::ml::models::{CategoryPrediction, LabelMatrix, ModelMetadata, PipelineConfig};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

const MAGIC: [u8; 4] = *b"DRPL";

/// Bumped whenever the serialized layout of the pipeline changes
pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    format_version: u32,
}

/// Fitted text-to-categories pipeline: vectorizer, per-category forests
/// and the metadata of the run that produced them.
///
/// Immutable once fitted. Safe to share across threads for concurrent
/// prediction.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifierPipeline {
    extractor: FeatureExtractor,
    classifier: MultiLabelClassifier,
    metadata: ModelMetadata,
}

impl ClassifierPipeline {
    /// Fit the vectorizer and one forest per category on the given messages
    pub fn fit<S>(config: &PipelineConfig, texts: &[S], labels: &LabelMatrix) -> Result<Self>
    where
        S: AsRef<str> + Sync,
    {
        config.validate()?;
        if texts.len() != labels.n_samples() {
            return Err(AppError::Shape(format!(
                "{} texts but {} label rows",
                texts.len(),
                labels.n_samples()
            )));
        }

        let extractor = FeatureExtractor::fit(&config.vectorizer, config.tokenizer, texts)?;
        let features = extractor.transform(texts);
        let classifier = MultiLabelClassifier::fit(&features, labels, &config.forest)?;
        let metadata = ModelMetadata::new(config.clone(), texts.len(), extractor.vocab_size());

        Ok(Self {
            extractor,
            classifier,
            metadata,
        })
    }

    /// Record the cross-validation score the configuration was selected with
    pub fn with_cv_score(mut self, score: f64) -> Self {
        self.metadata.cv_score = Some(score);
        self
    }

    /// Predict an (n_texts × n_categories) 0/1 matrix
    pub fn predict<S>(&self, texts: &[S]) -> Result<Array2<u8>>
    where
        S: AsRef<str> + Sync,
    {
        let features = self.extractor.transform(texts);
        self.classifier.predict(&features)
    }

    /// Predict the categories of one message
    pub fn predict_message(&self, text: &str) -> Result<CategoryPrediction> {
        let predictions = self.predict(&[text])?;
        let labels = self
            .categories()
            .iter()
            .cloned()
            .zip(predictions.row(0).iter().copied())
            .collect();
        Ok(CategoryPrediction { labels })
    }

    pub fn categories(&self) -> &[String] {
        self.classifier.categories()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.metadata.config
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Persist the pipeline. The file is written to a temporary sibling
    /// and renamed into place, so readers never see a partial model.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            let header = Header {
                magic: MAGIC,
                format_version: FORMAT_VERSION,
            };
            bincode::serialize_into(&mut writer, &header)?;
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| AppError::Io(e.error))?;

        info!(
            path = %path.display(),
            run_id = %self.metadata.run_id,
            categories = self.categories().len(),
            "Model saved"
        );
        Ok(())
    }

    /// Load a pipeline written by [`ClassifierPipeline::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let header: Header = bincode::deserialize_from(&mut reader).map_err(|_| {
            AppError::Serialization(format!("{} is not a model file", path.display()))
        })?;
        if header.magic != MAGIC {
            return Err(AppError::Serialization(format!(
                "{} is not a model file",
                path.display()
            )));
        }
        if header.format_version != FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "unsupported model format version {} (expected {})",
                header.format_version, FORMAT_VERSION
            )));
        }

        let pipeline: ClassifierPipeline = bincode::deserialize_from(&mut reader)?;
        info!(
            path = %path.display(),
            run_id = %pipeline.metadata.run_id,
            "Model loaded"
        );
        Ok(pipeline)
    }
}
