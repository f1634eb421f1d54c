//! Tokenization for the inverted index (spec §4.5: "lowercase, Unicode
//! word-boundary split of title + author + ISBN").

use std::collections::HashSet;

/// Splits `text` on non-alphanumeric boundaries, lowercases, and drops empty
/// tokens. No stemming or stopword removal — the spec's index is a literal
/// token set, not a relevance-ranked one (ranking is an explicit Non-goal).
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_whitespace() {
        let tokens = tokenize("The Hobbit: There and Back Again");
        assert!(tokens.contains("the"));
        assert!(tokens.contains("hobbit"));
        assert!(tokens.contains("back"));
        assert!(!tokens.contains(":"));
    }

    #[test]
    fn lowercases_and_dedupes() {
        let tokens = tokenize("Rust RUST rust");
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("rust"));
    }

    #[test]
    fn empty_input_yields_empty_set() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }
}
