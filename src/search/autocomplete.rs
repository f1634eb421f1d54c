//! Autocomplete prefix index (spec §4.5: "for each indexed term, write all
//! prefixes of length ≥ 2 into `autocomplete:{prefix}` sorted sets scored by
//! popularity; ties break lexicographically ascending").

use redis::AsyncCommands;

use crate::error::AppError;

use super::keys;

pub struct Autocomplete {
    client: redis::Client,
}

impl Autocomplete {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Registers `title` under every prefix (length >= 2) of each of its
    /// words, incrementing that prefix's popularity score for `title`. A
    /// query for "dun" should surface "Dune" and "Dune Messiah" (both
    /// contain a word starting "dun") but not "Duma Key" — so prefixes are
    /// built per word, while the value stored is the whole title.
    pub async fn index_title(&self, title: &str) -> Result<(), AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        for word in crate::search::tokenizer::tokenize(title) {
            let chars: Vec<char> = word.chars().collect();
            for len in 2..=chars.len() {
                let prefix: String = chars[..len].iter().collect();
                let _: f64 = conn
                    .zincr(keys::autocomplete(&prefix), title, 1.0)
                    .await
                    .map_err(|e| AppError::transient(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Top `limit` completions for `prefix`, highest popularity first, with
    /// lexicographically ascending tie-break.
    pub async fn complete(&self, prefix: &str, limit: isize) -> Result<Vec<String>, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let prefix = prefix.to_lowercase();
        let raw: Vec<(String, f64)> = conn
            .zrevrange_withscores(keys::autocomplete(&prefix), 0, (limit.max(1) * 4) - 1)
            .await
            .map_err(|e| AppError::transient(e.to_string()))?;

        let mut entries = raw;
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        entries.truncate(limit.max(0) as usize);
        Ok(entries.into_iter().map(|(term, _)| term).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::keys::autocomplete;

    #[test]
    fn prefix_key_is_namespaced() {
        assert_eq!(autocomplete("ru"), "autocomplete:ru");
    }
}

#[cfg(test)]
mod scenario_tests {
    // Pure-logic check of the per-word prefix fan-out described in spec §8
    // scenario 5, without requiring a live Redis connection: "dun" is a
    // prefix of "dune" (from both "Dune" and "Dune Messiah") but not of
    // "duma" (from "Duma Key").
    fn word_prefixes(title: &str) -> std::collections::HashSet<String> {
        crate::search::tokenizer::tokenize(title)
            .into_iter()
            .flat_map(|word| {
                let chars: Vec<char> = word.chars().collect();
                (2..=chars.len())
                    .map(move |len| chars[..len].iter().collect::<String>())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn dun_prefix_matches_dune_titles_but_not_duma() {
        assert!(word_prefixes("Dune").contains("dun"));
        assert!(word_prefixes("Dune Messiah").contains("dun"));
        assert!(!word_prefixes("Duma Key").contains("dun"));
    }

    #[test]
    fn du_prefix_matches_all_three_titles() {
        assert!(word_prefixes("Dune").contains("du"));
        assert!(word_prefixes("Dune Messiah").contains("du"));
        assert!(word_prefixes("Duma Key").contains("du"));
    }
}
