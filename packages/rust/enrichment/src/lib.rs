//! Context Enricher adapters: supplementary context for candidate records.
//!
//! This crate provides:
//! - [`ContextEnricher`], the adapter trait the enrich stage calls per record
//! - [`Enrichment`], the enricher's output, and its merge into an [`EnrichedRecord`]
//! - [`SearchEnricher`], a web-search backed implementation
//! - [`LlmKeywordExtractor`], expertise keywords from search context

pub mod enricher;
pub mod keywords;
pub mod search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use outreach_shared::{CandidateRecord, EnrichedRecord, Reference, Result};

pub use enricher::SearchEnricher;
pub use keywords::LlmKeywordExtractor;
pub use search::{SearchHit, SerperClient};

/// Context found for one candidate record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Research topics confirmed or discovered for the record.
    pub topics: Vec<String>,
    /// Expertise keywords.
    pub keywords: Vec<String>,
    /// Academic profile links.
    pub links: Vec<String>,
    /// Publication-like references.
    pub references: Vec<Reference>,
    /// Short excerpt of the context the keywords were derived from.
    pub excerpt: Option<String>,
}

impl Enrichment {
    /// Merge into `record`, producing an [`EnrichedRecord`] with its
    /// confidence computed from the populated fields.
    ///
    /// Topics not already among the record's research areas are appended.
    pub fn apply(self, record: CandidateRecord) -> EnrichedRecord {
        let mut enriched = EnrichedRecord::degraded(record);
        for topic in self.topics {
            let topic = topic.trim();
            if topic.is_empty() {
                continue;
            }
            let known = enriched
                .record
                .research_areas
                .iter()
                .any(|t| t.eq_ignore_ascii_case(topic));
            if !known {
                enriched.record.research_areas.push(topic.to_string());
            }
        }
        enriched.keywords = self.keywords;
        enriched.links = self.links;
        enriched.references = self.references;
        enriched.excerpt = self.excerpt.filter(|e| !e.trim().is_empty());
        enriched.refresh_confidence();
        enriched
    }
}

/// Supplies external context for one candidate record at a time.
#[async_trait]
pub trait ContextEnricher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Check that the capability can be used at all (credentials present,
    /// service configured). Called once per run before any `enrich`.
    async fn ensure_available(&self) -> Result<()>;

    /// Find context for one record. May fail transiently.
    async fn enrich(&self, record: &CandidateRecord) -> Result<Enrichment>;
}
