use std::collections::HashMap;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Expands each word with its configured synonyms. Expansions keep the position
/// of the word they came from, so a match on either counts once.
pub struct SynonymFilter {
    pub synonyms: HashMap<String, Vec<String>>,
}

impl SynonymFilter {
    pub fn new(synonyms: &HashMap<String, Vec<String>>) -> Self {
        let synonyms = synonyms
            .iter()
            .map(|(word, expansions)| {
                let expansions = expansions.iter().map(|e| e.to_lowercase()).collect();
                (word.to_lowercase(), expansions)
            })
            .collect();

        SynonymFilter { synonyms }
    }
}

impl TokenFilter for SynonymFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut expanded = Vec::with_capacity(tokens.len());

        for token in tokens {
            let synonyms = self.synonyms.get(&token.text);
            if let Some(synonyms) = synonyms {
                for synonym in synonyms {
                    if *synonym != token.text {
                        expanded.push(token.synonym_of(synonym.clone()));
                    }
                }
            }
            expanded.push(token);
        }

        expanded
    }

    fn name(&self) -> &str {
        "synonyms"
    }
}
