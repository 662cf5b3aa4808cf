use crate::error::{AppError, Result};
use crate::ml::models::VectorizerConfig;
use crate::text::{TokenFilter, Tokenizer};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Bag-of-n-grams TF-IDF vectorizer over tokenized messages.
///
/// The vocabulary is learned once by [`FeatureExtractor::fit`] and never
/// changes afterwards; terms unseen at fit time are ignored by
/// [`FeatureExtractor::transform`]. Column `j` of every produced matrix
/// is the `j`-th vocabulary term in lexicographic order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureExtractor {
    /// Configuration
    config: VectorizerConfig,

    /// Token policy the vocabulary was built with
    filter: TokenFilter,

    /// Vocabulary terms, sorted
    terms: Vec<String>,

    /// Vocabulary mapping (term -> column)
    vocabulary: HashMap<String, usize>,

    /// Smoothed inverse document frequency per column
    idf: Vec<f64>,
}

impl FeatureExtractor {
    /// Learn the vocabulary and IDF weights from a training corpus
    pub fn fit<S>(config: &VectorizerConfig, filter: TokenFilter, corpus: &[S]) -> Result<Self>
    where
        S: AsRef<str> + Sync,
    {
        config.validate()?;
        if corpus.is_empty() {
            return Err(AppError::Validation(
                "cannot fit a vectorizer on an empty corpus".to_string(),
            ));
        }

        let tokenizer = Tokenizer::english(filter);
        let documents: Vec<Vec<String>> = corpus
            .par_iter()
            .map(|text| ngrams(&tokenizer.tokenize(text.as_ref()), config.ngram_range))
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for document in &documents {
            let mut seen = HashSet::new();
            for term in document {
                *term_freq.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        let n_docs = documents.len();
        let max_doc_count = config.max_df * n_docs as f64;
        let mut kept: Vec<&str> = doc_freq
            .iter()
            .filter(|&(_, &df)| df >= config.min_df && df as f64 <= max_doc_count)
            .map(|(term, _)| *term)
            .collect();
        kept.sort_unstable();

        if let Some(limit) = config.max_features {
            if kept.len() > limit {
                // Stable sort keeps lexicographic order among equal counts
                kept.sort_by(|a, b| term_freq[b].cmp(&term_freq[a]));
                kept.truncate(limit);
                kept.sort_unstable();
            }
        }

        if kept.is_empty() {
            return Err(AppError::Validation(format!(
                "empty vocabulary after pruning {} candidate terms (max_df={}, min_df={})",
                doc_freq.len(),
                config.max_df,
                config.min_df
            )));
        }

        let idf = kept
            .iter()
            .map(|term| smoothed_idf(n_docs, doc_freq[term]))
            .collect();
        let terms: Vec<String> = kept.into_iter().map(str::to_string).collect();
        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();

        debug!(
            n_docs,
            vocab_size = terms.len(),
            candidates = doc_freq.len(),
            "Vectorizer fitted"
        );

        Ok(Self {
            config: config.clone(),
            filter,
            terms,
            vocabulary,
            idf,
        })
    }

    /// Map texts to an (n_texts × vocab_size) feature matrix
    pub fn transform<S>(&self, texts: &[S]) -> Array2<f64>
    where
        S: AsRef<str> + Sync,
    {
        let rows: Vec<Array1<f64>> = texts
            .par_iter()
            .map(|text| self.transform_one(text.as_ref()))
            .collect();

        let mut matrix = Array2::zeros((texts.len(), self.vocab_size()));
        for (i, row) in rows.into_iter().enumerate() {
            matrix.row_mut(i).assign(&row);
        }
        matrix
    }

    /// Feature vector of a single text
    pub fn transform_one(&self, text: &str) -> Array1<f64> {
        let tokenizer = Tokenizer::english(self.filter);
        let mut row = Array1::<f64>::zeros(self.vocab_size());

        for term in ngrams(&tokenizer.tokenize(text), self.config.ngram_range) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                row[idx] += 1.0;
            }
        }

        if self.config.use_idf {
            for (value, idf) in row.iter_mut().zip(&self.idf) {
                *value *= idf;
            }
        }

        if self.config.normalize {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row /= norm;
            }
        }

        row
    }

    pub fn vocab_size(&self) -> usize {
        self.terms.len()
    }

    /// Vocabulary terms in column order
    pub fn feature_names(&self) -> &[String] {
        &self.terms
    }

    pub fn filter(&self) -> TokenFilter {
        self.filter
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// IDF weight of a vocabulary term
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&idx| self.idf[idx])
    }
}

/// Contiguous token windows of every length in `range`, joined by a space
fn ngrams(tokens: &[String], (min_n, max_n): (usize, usize)) -> Vec<String> {
    let mut out = Vec::new();
    for n in min_n..=max_n {
        if n == 0 || n > tokens.len() {
            continue;
        }
        out.extend(tokens.windows(n).map(|window| window.join(" ")));
    }
    out
}

/// `ln((1 + n) / (1 + df)) + 1`
fn smoothed_idf(n_docs: usize, doc_freq: usize) -> f64 {
    ((1.0 + n_docs as f64) / (1.0 + doc_freq as f64)).ln() + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<&'static str> {
        vec![
            "We need water and food",
            "Fire in the building",
            "Water is running out, need water",
            "The fire spread to nearby houses",
        ]
    }

    fn fit_default(config: VectorizerConfig) -> FeatureExtractor {
        FeatureExtractor::fit(&config, TokenFilter::Alphabetic, &corpus()).unwrap()
    }

    #[test]
    fn test_vocabulary_sorted() {
        let extractor = fit_default(VectorizerConfig::default());
        let names = extractor.feature_names();

        let mut sorted = names.to_vec();
        sorted.sort();
        assert_eq!(names, sorted.as_slice());
        assert!(names.contains(&"water".to_string()));
        assert!(names.contains(&"house".to_string()));
    }

    #[test]
    fn test_transform_shape_and_normalization() {
        let extractor = fit_default(VectorizerConfig::default());
        let matrix = extractor.transform(&corpus());

        assert_eq!(matrix.dim(), (4, extractor.vocab_size()));
        for row in matrix.rows() {
            let norm = row.dot(&row).sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_terms_yield_zero_row() {
        let extractor = fit_default(VectorizerConfig::default());
        let row = extractor.transform_one("zebra xylophone");

        assert!(row.iter().all(|&v| v == 0.0));
        assert_eq!(extractor.transform::<&str>(&[]).dim(), (0, extractor.vocab_size()));
    }

    #[test]
    fn test_smoothed_idf_values() {
        let extractor = fit_default(VectorizerConfig::default());

        // "water" appears in 2 of 4 documents, "building" in 1
        let expected_water = (5.0f64 / 3.0).ln() + 1.0;
        let expected_building = (5.0f64 / 2.0).ln() + 1.0;
        assert!((extractor.idf("water").unwrap() - expected_water).abs() < 1e-12);
        assert!((extractor.idf("building").unwrap() - expected_building).abs() < 1e-12);
        assert!(extractor.idf("zebra").is_none());
    }

    #[test]
    fn test_raw_counts_without_idf_or_norm() {
        let config = VectorizerConfig {
            use_idf: false,
            normalize: false,
            ..Default::default()
        };
        let extractor = fit_default(config);
        let row = extractor.transform_one("water water fire");
        let names = extractor.feature_names();

        let water = names.iter().position(|t| t == "water").unwrap();
        let fire = names.iter().position(|t| t == "fire").unwrap();
        assert_eq!(row[water], 2.0);
        assert_eq!(row[fire], 1.0);
    }

    #[test]
    fn test_bigrams() {
        let config = VectorizerConfig {
            ngram_range: (1, 2),
            ..Default::default()
        };
        let extractor = fit_default(config);

        assert!(extractor.feature_names().contains(&"need water".to_string()));
        assert!(extractor.feature_names().contains(&"need".to_string()));
    }

    #[test]
    fn test_max_df_prunes_common_terms() {
        let config = VectorizerConfig {
            max_df: 0.4,
            ..Default::default()
        };
        let extractor = fit_default(config);

        // "water", "fire", "the" and "need" each occur in half the documents
        assert!(!extractor.feature_names().contains(&"water".to_string()));
        assert!(!extractor.feature_names().contains(&"the".to_string()));
        assert!(extractor.feature_names().contains(&"building".to_string()));
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let config = VectorizerConfig {
            max_features: Some(1),
            ..Default::default()
        };
        let extractor = fit_default(config);

        // "water" occurs three times, more than any other term
        assert_eq!(extractor.feature_names(), ["water".to_string()]);
    }

    #[test]
    fn test_empty_vocabulary_is_error() {
        let config = VectorizerConfig::default();
        let result = FeatureExtractor::fit(&config, TokenFilter::Alphabetic, &["123 !!!", "456"]);
        assert!(matches!(result, Err(AppError::Validation(_))));

        let empty: [&str; 0] = [];
        assert!(FeatureExtractor::fit(&config, TokenFilter::Alphabetic, &empty).is_err());
    }

    #[test]
    fn test_filter_policy_is_kept() {
        let config = VectorizerConfig::default();
        let extractor =
            FeatureExtractor::fit(&config, TokenFilter::Unfiltered, &["help!", "help now"]).unwrap();

        assert_eq!(extractor.filter(), TokenFilter::Unfiltered);
        assert!(extractor.feature_names().contains(&"!".to_string()));
    }

    #[test]
    fn test_ngrams_helper() {
        let tokens: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ngrams(&tokens, (1, 1)), vec!["a", "b", "c"]);
        assert_eq!(ngrams(&tokens, (2, 3)), vec!["a b", "b c", "a b c"]);
        assert!(ngrams(&tokens, (4, 4)).is_empty());
    }
}
