use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Unicode word tokenizer: punctuation is dropped, whitespace separates words.
#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (offset, word) in text.unicode_word_indices() {
            if word.len() <= self.max_token_length {
                tokens.push(Token::new(word.to_string(), position, offset));
                position += 1;
            }
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }
}
