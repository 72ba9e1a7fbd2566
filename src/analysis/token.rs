use serde::{Serialize, Deserialize};

/// Token representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,      // The token text
    pub position: u32,     // Source word position; synonyms share their origin's
    pub offset: usize,     // Byte offset in original text
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Word,
    Synonym,
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize) -> Self {
        Token {
            text,
            position,
            offset,
            token_type: TokenType::Word,
        }
    }

    pub fn synonym_of(&self, text: String) -> Self {
        Token {
            text,
            position: self.position,
            offset: self.offset,
            token_type: TokenType::Synonym,
        }
    }
}
