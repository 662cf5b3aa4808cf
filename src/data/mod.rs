/// Labeled message data
///
/// - `DataSource` seam and its SQLite implementation
/// - In-memory corpus with the ordered category set
/// - Aggregate counts for serving dashboards

pub mod sqlite;

pub use sqlite::SqliteSource;

use crate::error::{AppError, Result};
use crate::ml::models::{LabelMatrix, LabeledTexts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Columns that describe a message rather than label it
pub const METADATA_COLUMNS: &[&str] = &["id", "message", "original", "genre"];

/// Genre reported for messages without one
pub const UNKNOWN_GENRE: &str = "unknown";

/// Source of labeled messages
pub trait DataSource {
    /// Load every message with its labels and the ordered category set
    fn load(&self) -> Result<MessageCorpus>;
}

/// One labeled message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Option<i64>,
    pub text: String,
    pub genre: Option<String>,

    /// One 0/1 value per category, in category order
    pub labels: Vec<u8>,
}

/// Ordered labeled messages sharing one category set
#[derive(Debug, Clone)]
pub struct MessageCorpus {
    ids: Vec<Option<i64>>,
    texts: Vec<String>,
    genres: Vec<Option<String>>,
    labels: LabelMatrix,
}

impl MessageCorpus {
    /// Build a corpus, checking every record against the category set
    pub fn from_records(categories: Vec<String>, records: Vec<MessageRecord>) -> Result<Self> {
        let mut ids = Vec::with_capacity(records.len());
        let mut texts = Vec::with_capacity(records.len());
        let mut genres = Vec::with_capacity(records.len());
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            ids.push(record.id);
            texts.push(record.text);
            genres.push(record.genre);
            rows.push(record.labels);
        }
        let labels = LabelMatrix::from_rows(categories, rows)?;

        Ok(Self {
            ids,
            texts,
            genres,
            labels,
        })
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

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn ids(&self) -> &[Option<i64>] {
        &self.ids
    }

    pub fn labels(&self) -> &LabelMatrix {
        &self.labels
    }

    /// Texts and labels, for training
    pub fn labeled_texts(&self) -> Result<LabeledTexts> {
        if self.is_empty() {
            return Err(AppError::Validation("corpus has no messages".to_string()));
        }
        LabeledTexts::new(self.texts.clone(), self.labels.clone())
    }

    /// Message count per genre and positive count per category
    pub fn summary(&self) -> CorpusSummary {
        let mut genre_counts = BTreeMap::new();
        for genre in &self.genres {
            let name = genre.as_deref().unwrap_or(UNKNOWN_GENRE).to_string();
            *genre_counts.entry(name).or_insert(0) += 1;
        }

        let category_counts = self
            .categories()
            .iter()
            .cloned()
            .zip(self.labels.positive_counts())
            .collect();

        CorpusSummary {
            n_messages: self.len(),
            genre_counts,
            category_counts,
        }
    }
}

/// Aggregate corpus counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub n_messages: usize,
    pub genre_counts: BTreeMap<String, usize>,

    /// Positive labels per category, in category order
    pub category_counts: Vec<(String, usize)>,
}

impl CorpusSummary {
    pub fn to_json(&self) -> serde_json::Value {
        let categories: serde_json::Map<String, serde_json::Value> = self
            .category_counts
            .iter()
            .map(|(name, count)| (name.clone(), serde_json::Value::from(*count)))
            .collect();
        serde_json::json!({
            "messages": self.n_messages,
            "genres": self.genre_counts,
            "categories": categories,
        })
    }
}
