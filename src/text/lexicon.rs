use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Irregular plural forms mapped to their base form
const NOUN_EXCEPTIONS: &[(&str, &str)] = &[
    ("analyses", "analysis"),
    ("buses", "bus"),
    ("calves", "calf"),
    ("children", "child"),
    ("cookies", "cookie"),
    ("crises", "crisis"),
    ("criteria", "criterion"),
    ("data", "datum"),
    ("diagnoses", "diagnosis"),
    ("dies", "die"),
    ("feet", "foot"),
    ("gases", "gas"),
    ("geese", "goose"),
    ("halves", "half"),
    ("headaches", "headache"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("lice", "louse"),
    ("lies", "lie"),
    ("lives", "life"),
    ("loaves", "loaf"),
    ("matrices", "matrix"),
    ("men", "man"),
    ("mice", "mouse"),
    ("movies", "movie"),
    ("oxen", "ox"),
    ("phenomena", "phenomenon"),
    ("pies", "pie"),
    ("selves", "self"),
    ("series", "series"),
    ("shelves", "shelf"),
    ("species", "species"),
    ("teeth", "tooth"),
    ("thieves", "thief"),
    ("ties", "tie"),
    ("wives", "wife"),
    ("wolves", "wolf"),
    ("women", "woman"),
];

/// Words that end like a plural but are already base forms
const NOUN_INVARIANTS: &[&str] = &[
    "abdomen", "amen", "always", "atlas", "bias", "canvas", "chaos", "diabetes", "gas",
    "lens", "measles", "news", "omen", "perhaps", "physics", "rabies", "semen",
    "specimen", "stamen", "whereas", "yes",
];

/// Detachment rules for nouns, longest suffix first
const NOUN_RULES: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("ies", "y"),
    ("xes", "x"),
    ("zzes", "zz"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("s", ""),
];

/// Suffixes that mark a singular word ending in `s`
const SINGULAR_ENDINGS: &[&str] = &["ss", "us", "is", "ous"];

/// Shortest word the suffix rules are applied to
const MIN_RULE_LENGTH: usize = 4;

static ENGLISH: Lazy<Lexicon> = Lazy::new(Lexicon::english_builtin);

/// Lexical resource used to reduce words to their dictionary base form.
///
/// Loaded once per process and shared read-only; tokenizers only ever
/// borrow it.
#[derive(Debug, Clone)]
pub struct Lexicon {
    exceptions: HashMap<String, String>,
    invariants: HashSet<String>,
}

impl Lexicon {
    /// The process-wide English lexicon
    pub fn english() -> &'static Lexicon {
        &ENGLISH
    }

    fn english_builtin() -> Self {
        let exceptions = NOUN_EXCEPTIONS
            .iter()
            .map(|(inflected, base)| (inflected.to_string(), base.to_string()))
            .collect();
        let invariants = NOUN_INVARIANTS
            .iter()
            .map(|word| word.to_string())
            .collect();
        Self {
            exceptions,
            invariants,
        }
    }

    /// Reduce a lowercase word to its noun base form.
    ///
    /// Words the rules do not apply to are returned unchanged, so the
    /// result is always a fixed point: `lemmatize(lemmatize(w)) == lemmatize(w)`.
    pub fn lemmatize(&self, word: &str) -> String {
        let mut current = self.lemmatize_once(word);
        loop {
            let next = self.lemmatize_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn lemmatize_once(&self, word: &str) -> String {
        if let Some(base) = self.exceptions.get(word) {
            return base.clone();
        }
        if self.invariants.contains(word) || !Self::rules_apply(word) {
            return word.to_string();
        }

        for (suffix, replacement) in NOUN_RULES {
            if let Some(stem) = word.strip_suffix(suffix) {
                if stem.chars().count() < 2 {
                    continue;
                }
                if *suffix == "men" && stem.chars().count() < 3 {
                    continue;
                }
                return format!("{stem}{replacement}");
            }
        }

        word.to_string()
    }

    fn rules_apply(word: &str) -> bool {
        word.chars().count() >= MIN_RULE_LENGTH
            && word.chars().all(char::is_alphabetic)
            && !SINGULAR_ENDINGS.iter().any(|ending| word.ends_with(ending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_plurals() {
        let lexicon = Lexicon::english();
        assert_eq!(lexicon.lemmatize("houses"), "house");
        assert_eq!(lexicon.lemmatize("supplies"), "supply");
        assert_eq!(lexicon.lemmatize("boxes"), "box");
        assert_eq!(lexicon.lemmatize("churches"), "church");
        assert_eq!(lexicon.lemmatize("dishes"), "dish");
        assert_eq!(lexicon.lemmatize("glasses"), "glass");
        assert_eq!(lexicon.lemmatize("firemen"), "fireman");
        assert_eq!(lexicon.lemmatize("tents"), "tent");
    }

    #[test]
    fn test_irregular_plurals() {
        let lexicon = Lexicon::english();
        assert_eq!(lexicon.lemmatize("children"), "child");
        assert_eq!(lexicon.lemmatize("women"), "woman");
        assert_eq!(lexicon.lemmatize("feet"), "foot");
        assert_eq!(lexicon.lemmatize("lives"), "life");
    }

    #[test]
    fn test_singular_words_untouched() {
        let lexicon = Lexicon::english();
        for word in ["water", "fire", "virus", "crisis", "famous", "bus", "was", "news", "help"] {
            assert_eq!(lexicon.lemmatize(word), word, "changed {word}");
        }
    }

    #[test]
    fn test_non_alphabetic_untouched() {
        let lexicon = Lexicon::english();
        assert_eq!(lexicon.lemmatize("1990s"), "1990s");
        assert_eq!(lexicon.lemmatize("!"), "!");
        assert_eq!(lexicon.lemmatize(""), "");
    }

    #[test]
    fn test_exception_targets_are_fixed_points() {
        let lexicon = Lexicon::english();
        for (_, base) in NOUN_EXCEPTIONS {
            assert_eq!(lexicon.lemmatize(base), *base, "{base} is not a fixed point");
        }
    }

    #[test]
    fn test_lemmatize_idempotent() {
        let lexicon = Lexicon::english();
        for word in [
            "houses", "lenses", "buses", "classes", "series", "families", "bodies",
            "watches", "runnings", "policemen", "cities", "people",
        ] {
            let once = lexicon.lemmatize(word);
            assert_eq!(lexicon.lemmatize(&once), once, "{word} -> {once}");
        }
    }

    #[test]
    fn test_shared_instance() {
        let a = Lexicon::english() as *const Lexicon;
        let b = Lexicon::english() as *const Lexicon;
        assert_eq!(a, b);
        assert!(!Lexicon::english().exceptions.is_empty());
    }
}
