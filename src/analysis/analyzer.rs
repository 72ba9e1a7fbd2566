use std::collections::{BTreeMap, BTreeSet};
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::filters::synonym::SynonymFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};
use crate::core::error::Result;

/// Distinct analyzed terms of one record.
pub type TermSet = BTreeSet<String>;

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Analyze text for indexing: the distinct terms it contributes.
    pub fn terms(&self, text: &str) -> TermSet {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }

    /// Analyze a query: one group per surviving source word, holding the word
    /// and its synonym expansions.
    pub fn query_groups(&self, query: &str) -> Vec<TermSet> {
        let mut groups: BTreeMap<u32, TermSet> = BTreeMap::new();
        for token in self.analyze(query) {
            groups.entry(token.position).or_default().insert(token.text);
        }
        groups.into_values().collect()
    }

    /// Lowercase only; the pipeline before any stop words or synonyms are configured.
    pub fn plain() -> Self {
        Analyzer::new("plain".to_string(), Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
    }

    /// Standard pipeline: tokenize, lowercase, synonyms, stop words, optional stemming.
/// Synonym expansions that are stop words are dropped like any other stop word.
    pub fn from_parts(
        stop_words: &[String],
        synonyms: &std::collections::HashMap<String, Vec<String>>,
        stemming: Option<&str>,
        max_token_length: usize,
    ) -> Result<Self> {
        let tokenizer = StandardTokenizer { max_token_length };
        let mut analyzer = Analyzer::new("standard".to_string(), Box::new(tokenizer))
            .add_filter(Box::new(LowercaseFilter));

        if !synonyms.is_empty() {
            analyzer = analyzer.add_filter(Box::new(SynonymFilter::new(synonyms)));
        }
        if !stop_words.is_empty() {
            analyzer = analyzer.add_filter(Box::new(StopWordFilter::new(stop_words)));
        }
        if let Some(language) = stemming {
            analyzer = analyzer.add_filter(Box::new(StemmerFilter::for_language(language)?));
        }

        Ok(analyzer)
    }
}
