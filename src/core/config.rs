use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::mvcc::controller::IsolationLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Model normalization
    pub rule_base: String,                       // Named rule set consulted by the fact base
    pub strict_references: bool,                 // Dangling refs / type errors become fatal
    pub fail_on_non_finalized: bool,             // Iterating an open value set is an error

    // Transactional index
    pub isolation_level: IsolationLevel,
    pub lock_timeout_ms: u64,

    // Text analysis
    pub stop_words: Vec<String>,
    pub synonyms: HashMap<String, Vec<String>>,
    pub stemming: Option<String>,                // e.g. "english"; off by default
    pub max_token_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rule_base: "default".to_string(),
            strict_references: false,
            fail_on_non_finalized: false,

            isolation_level: IsolationLevel::ReadCommitted,
            lock_timeout_ms: 5_000,

            stop_words: Vec::new(),
            synonyms: HashMap::new(),
            stemming: None,
            max_token_length: 255,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
