use crate::text::lexicon::Lexicon;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Which tokens survive normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenFilter {
    /// Keep only purely alphabetic tokens (drops numerals and punctuation)
    #[default]
    Alphabetic,

    /// Keep every token, punctuation included
    Unfiltered,
}

impl TokenFilter {
    fn keep(&self, token: &str) -> bool {
        match self {
            TokenFilter::Alphabetic => {
                !token.is_empty() && token.chars().all(char::is_alphabetic)
            }
            TokenFilter::Unfiltered => !token.is_empty(),
        }
    }
}

/// Trailing clitics split off their host word, checked in order
const CLITICS: &[&str] = &["n't", "'s", "'re", "'ll", "'ve", "'d", "'m"];

/// Normalizes raw message text into a sequence of base word forms.
///
/// Segments on Unicode word boundaries, lowercases, splits trailing clitics
/// (`children's` becomes `children` + `'s`), lemmatizes against the
/// borrowed [`Lexicon`] and trims. Cheap to construct; holds no state of
/// its own besides the filter policy.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer<'a> {
    lexicon: &'a Lexicon,
    filter: TokenFilter,
}

impl Tokenizer<'static> {
    /// Tokenizer over the shared English lexicon
    pub fn english(filter: TokenFilter) -> Self {
        Self::new(Lexicon::english(), filter)
    }
}

impl<'a> Tokenizer<'a> {
    pub fn new(lexicon: &'a Lexicon, filter: TokenFilter) -> Self {
        Self { lexicon, filter }
    }

    pub fn filter(&self) -> TokenFilter {
        self.filter
    }

    /// Tokenize a text. Empty or whitespace-only input yields no tokens.
    ///
    /// Under [`TokenFilter::Alphabetic`] every word yields at most one
    /// token, since clitics are never alphabetic.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_word_bounds()
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .flat_map(|segment| {
                let lowered = segment.to_lowercase().replace('\u{2019}', "'");
                let (word, clitic) = split_clitic(&lowered);
                let mut pieces = vec![self.lexicon.lemmatize(word).trim().to_string()];
                pieces.extend(clitic.map(str::to_string));
                pieces
            })
            .filter(|token| self.filter.keep(token))
            .collect()
    }
}

fn split_clitic(word: &str) -> (&str, Option<&str>) {
    CLITICS
        .iter()
        .find(|clitic| word.len() > clitic.len() && word.ends_with(*clitic))
        .map_or((word, None), |clitic| {
            let (host, tail) = word.split_at(word.len() - clitic.len());
            (host, Some(tail))
        })
}
