use std::collections::HashMap;
use std::sync::Arc;
use crate::analysis::analyzer::{Analyzer, TermSet};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::Record;
use crate::schema::mapping::{Extraction, IndexMapping, MappingRegistry};
use crate::scoring::scorer::{MatchDegreeScorer, Relevance, Scorer};

/// Analyzer inputs that may be changed until the first record is indexed.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub stop_words: Vec<String>,
    pub synonyms: HashMap<String, Vec<String>>,
    pub stemming: Option<String>,
    pub max_token_length: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            stop_words: Vec::new(),
            synonyms: HashMap::new(),
            stemming: None,
            max_token_length: 255,
        }
    }
}

impl AnalysisSettings {
    pub fn from_config(config: &Config) -> Self {
        AnalysisSettings {
            stop_words: config.stop_words.clone(),
            synonyms: config.synonyms.clone(),
            stemming: config.stemming.clone(),
            max_token_length: config.max_token_length,
        }
    }

    fn build(&self) -> Result<Analyzer> {
        Analyzer::from_parts(
            &self.stop_words,
            &self.synonyms,
            self.stemming.as_deref(),
            self.max_token_length,
        )
    }
}

/// Everything between a record and its postings: mappings, analysis, scoring.
/// Shared by the plain and the transactional index.
pub struct IndexPipeline {
    settings: AnalysisSettings,
    analyzer: Arc<Analyzer>,
    mappings: MappingRegistry,
    scorer: Arc<dyn Scorer>,
}

impl IndexPipeline {
    pub fn new(settings: AnalysisSettings) -> Result<Self> {
        let analyzer = settings.build()?;
        Ok(Self::with_analyzer(settings, analyzer))
    }

    fn with_analyzer(settings: AnalysisSettings, analyzer: Analyzer) -> Self {
        IndexPipeline {
            settings,
            analyzer: Arc::new(analyzer),
            mappings: MappingRegistry::new(),
            scorer: Arc::new(MatchDegreeScorer::default()),
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn register_mapping(&mut self, record_type: impl Into<String>, mapping: IndexMapping) {
        self.mappings.register(record_type, mapping);
    }

    pub fn register_supertype(&mut self, record_type: impl Into<String>, supertype: impl Into<String>) {
        self.mappings.register_supertype(record_type, supertype);
    }

    pub fn set_scorer(&mut self, scorer: Arc<dyn Scorer>) {
        self.scorer = scorer;
    }

    /// Swap analysis settings. Callers guarantee nothing has been indexed yet.
    pub fn reconfigure(&mut self, settings: AnalysisSettings) -> Result<()> {
        self.analyzer = Arc::new(settings.build()?);
        self.settings = settings;
        Ok(())
    }

    pub fn extract(&self, record: &dyn Record) -> Result<Extraction> {
        self.mappings.extract(record, &self.analyzer)
    }

    pub fn query(&self, query: &str) -> Vec<TermSet> {
        self.analyzer.query_groups(query)
    }

    pub fn score<E: Record>(
        &self,
        query: &[TermSet],
        terms: &TermSet,
        entry: &E,
        rating_field: Option<&str>,
    ) -> Option<Relevance> {
        self.scorer.score(query, terms, rating_of(entry, rating_field))
    }
}

impl Default for IndexPipeline {
    fn default() -> Self {
        // No stop words, synonyms or stemmer: the plain pipeline.
        Self::with_analyzer(AnalysisSettings::default(), Analyzer::plain())
    }
}

/// Rating read live from the summary entry, so summary-only updates reorder results.
pub fn rating_of<E: Record>(entry: &E, rating_field: Option<&str>) -> f64 {
    rating_field
        .and_then(|field| entry.field(field))
        .and_then(|value| value.as_number())
        .unwrap_or(0.0)
}
