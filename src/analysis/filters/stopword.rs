use std::collections::HashSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Drops configured stop words. Runs after lowercasing, so the set is kept lowercase.
pub struct StopWordFilter {
    pub stop_words: HashSet<String>,
}

impl StopWordFilter {
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StopWordFilter {
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter()
            .filter(|token| !self.stop_words.contains(&token.text))
            .collect()
    }

    fn name(&self) -> &str {
        "stop_words"
    }
}
