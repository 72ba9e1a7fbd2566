use rust_stemmers::{Algorithm, Stemmer};
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;
use crate::core::error::{Error, Result};

pub struct StemmerFilter {
    pub algorithm: Algorithm,
}

impl StemmerFilter {
    pub fn new(algorithm: Algorithm) -> Self {
        StemmerFilter { algorithm }
    }

    pub fn for_language(language: &str) -> Result<Self> {
        let algorithm = match language.to_ascii_lowercase().as_str() {
            "english" | "en" => Algorithm::English,
            "french" | "fr" => Algorithm::French,
            "german" | "de" => Algorithm::German,
            "spanish" | "es" => Algorithm::Spanish,
            "italian" | "it" => Algorithm::Italian,
            "dutch" | "nl" => Algorithm::Dutch,
            "portuguese" | "pt" => Algorithm::Portuguese,
            other => {
                return Err(Error::configuration(format!("No stemmer for language '{}'", other)));
            }
        };
        Ok(StemmerFilter::new(algorithm))
    }
}

impl TokenFilter for StemmerFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        let stemmer = Stemmer::create(self.algorithm);

        tokens.into_iter()
            .map(|mut token| {
                token.text = stemmer.stem(&token.text).to_string();
                token
            })
            .collect()
    }

    fn name(&self) -> &str {
        "stemmer"
    }
}
