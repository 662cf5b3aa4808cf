/// Text normalization for disaster messages
///
/// - Unicode word segmentation
/// - Lowercasing and noun lemmatization against a shared lexicon
/// - Training-time (alphabetic only) and unfiltered token policies

pub mod lexicon;
pub mod tokenizer;

pub use lexicon::Lexicon;
pub use tokenizer::{TokenFilter, Tokenizer};
