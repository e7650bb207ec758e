//! Web-search backed Context Enricher.
//!
//! Per record: a general query, a publications query, a scholar-profile query
//! and, when the record has research areas, a topic-targeted query. Links are
//! kept only for academic profile domains; references are taken from the
//! publications results.
//!
//! Search hits confirm a record's research areas but never add new ones, so
//! [`Enrichment::topics`] is always empty here. Expertise found in the search
//! context is reported as keywords instead.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use outreach_shared::{AppConfig, CandidateRecord, OutreachError, Reference, Result};

use crate::keywords::LlmKeywordExtractor;
use crate::search::{SearchHit, SerperClient};
use crate::{ContextEnricher, Enrichment};

/// Domains whose links count as academic profile links.
pub const ACADEMIC_DOMAINS: &[&str] = &[
    "scholar.google.com",
    "dblp.org",
    "researchgate.net",
    "orcid.org",
    "semanticscholar.org",
];

/// References kept per record.
pub const MAX_REFERENCES: usize = 5;

/// A publication result becomes a reference only if its title is longer than this.
const MIN_REFERENCE_TITLE_CHARS: usize = 10;

const SCHOLAR_RESULTS: u32 = 2;
const TOPIC_RESULTS: u32 = 2;
const SNIPPET_CHARS: usize = 300;
const EXCERPT_CHARS: usize = 600;

/// Search results grouped by the query that produced them.
#[derive(Debug, Default)]
struct SearchResults {
    general: Vec<SearchHit>,
    publications: Vec<SearchHit>,
    scholar: Vec<SearchHit>,
}

impl SearchResults {
    fn categories(&self) -> [(&'static str, &[SearchHit]); 3] {
        [
            ("general", self.general.as_slice()),
            ("publications", self.publications.as_slice()),
            ("scholar", self.scholar.as_slice()),
        ]
    }

    fn all(&self) -> impl Iterator<Item = &SearchHit> {
        self.general
            .iter()
            .chain(&self.publications)
            .chain(&self.scholar)
    }
}

/// Context Enricher built on a [`SerperClient`] plus an optional keyword extractor.
#[derive(Debug, Clone)]
pub struct SearchEnricher {
    search: SerperClient,
    key_env: String,
    results_per_query: u32,
    institution: String,
    keywords: Option<LlmKeywordExtractor>,
}

impl SearchEnricher {
    pub fn new(search: SerperClient) -> Self {
        Self {
            search,
            key_env: "SERPER_API_KEY".into(),
            results_per_query: 3,
            institution: String::new(),
            keywords: None,
        }
    }

    /// Build from the `[search]` config section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut enricher = Self::new(SerperClient::from_config(&config.search)?)
            .with_results_per_query(config.search.results_per_query)
            .with_institution(&config.search.institution);
        enricher.key_env = config.search.api_key_env.clone();
        Ok(enricher)
    }

    pub fn with_results_per_query(mut self, n: u32) -> Self {
        self.results_per_query = n.max(1);
        self
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = institution.into();
        self
    }

    pub fn with_keywords(mut self, extractor: LlmKeywordExtractor) -> Self {
        self.keywords = Some(extractor);
        self
    }

    async fn run_queries(&self, record: &CandidateRecord) -> Result<SearchResults> {
        let name = record.name.trim();
        let general_query = [name, self.institution.trim(), record.department.trim()]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let mut results = SearchResults {
            general: self.search.search(&general_query, self.results_per_query).await?,
            publications: self
                .search
                .search(
                    &format!("{name} publications research papers"),
                    self.results_per_query,
                )
                .await?,
            scholar: self
                .search
                .search(&format!("{name} Google Scholar"), SCHOLAR_RESULTS)
                .await?,
        };

        if !record.research_areas.is_empty() {
            let areas: Vec<&str> = record
                .research_areas
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            let topic_query = format!("{name} {}", areas.join(" "));
            results
                .general
                .extend(self.search.search(&topic_query, TOPIC_RESULTS).await?);
        }

        Ok(results)
    }

    async fn keywords_for(&self, record: &CandidateRecord, context: &str) -> Vec<String> {
        let Some(extractor) = &self.keywords else {
            return record.research_areas.clone();
        };
        match extractor.extract(record, context).await {
            Ok(keywords) => keywords,
            Err(e) => {
                warn!(name = %record.name, error = %e, "keyword extraction failed, using research areas");
                record.research_areas.clone()
            }
        }
    }
}

#[async_trait]
impl ContextEnricher for SearchEnricher {
    fn name(&self) -> &str {
        "search"
    }

    async fn ensure_available(&self) -> Result<()> {
        if self.search.has_key() {
            Ok(())
        } else {
            Err(OutreachError::unavailable(format!(
                "web search is not configured; set the {} environment variable",
                self.key_env
            )))
        }
    }

    #[instrument(skip_all, fields(name = %record.name))]
    async fn enrich(&self, record: &CandidateRecord) -> Result<Enrichment> {
        let results = self.run_queries(record).await?;
        let context = format_context(&results);
        let keywords = self.keywords_for(record, &context).await;

        let enrichment = Enrichment {
            // Listed research areas stay authoritative.
            topics: Vec::new(),
            keywords,
            links: academic_links(&results),
            references: references(&results),
            excerpt: (!context.is_empty()).then(|| truncate_chars(&context, EXCERPT_CHARS)),
        };
        debug!(
            links = enrichment.links.len(),
            references = enrichment.references.len(),
            keywords = enrichment.keywords.len(),
            "record enriched"
        );
        Ok(enrichment)
    }
}

/// Top two hits per category as `[category] title: snippet` paragraphs.
fn format_context(results: &SearchResults) -> String {
    let mut parts = Vec::new();
    for (category, hits) in results.categories() {
        for hit in hits.iter().take(2) {
            parts.push(format!(
                "[{category}] {}: {}",
                hit.title.trim(),
                truncate_chars(hit.snippet.trim(), SNIPPET_CHARS)
            ));
        }
    }
    parts.join("\n\n")
}

fn academic_links(results: &SearchResults) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for hit in results.all() {
        let academic = ACADEMIC_DOMAINS.iter().any(|d| hit.url.contains(d));
        if academic && !links.contains(&hit.url) {
            links.push(hit.url.clone());
        }
    }
    links
}

fn references(results: &SearchResults) -> Vec<Reference> {
    results
        .publications
        .iter()
        .take(MAX_REFERENCES)
        .filter(|hit| hit.title.trim().chars().count() > MIN_REFERENCE_TITLE_CHARS)
        .map(|hit| Reference {
            title: hit.title.trim().to_string(),
            url: (!hit.url.is_empty()).then(|| hit.url.clone()),
        })
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use outreach_llm::ChatModel;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        fn model_id(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Err(OutreachError::llm("boom", false))
        }
    }

    struct KeywordModel;

    #[async_trait]
    impl ChatModel for KeywordModel {
        fn model_id(&self) -> &str {
            "keywords"
        }
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            assert!(prompt.contains("[publications] Deep learning for segmentation"));
            Ok(r#"{"keywords": ["image segmentation", "PyTorch"]}"#.into())
        }
    }

    fn record() -> CandidateRecord {
        CandidateRecord {
            name: "Ada Lovelace".into(),
            profile_url: "https://example.edu/ada".into(),
            department: "CS".into(),
            designation: "Professor".into(),
            email: None,
            phone: None,
            personal_webpage: None,
            research_areas: vec!["Computer Vision".into()],
            bio: Some("Works on vision.".into()),
        }
    }

    async fn mount_search(server: &MockServer) {
        let reply = |hits: serde_json::Value| {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "organic": hits }))
        };
        Mock::given(method("POST"))
            .and(body_partial_json(
                serde_json::json!({ "q": "Ada Lovelace IIT Kharagpur CS" }),
            ))
            .respond_with(reply(serde_json::json!([
                { "title": "Ada Lovelace - CSE", "link": "https://example.edu/ada", "snippet": "Faculty page" },
                { "title": "Ada on DBLP", "link": "https://dblp.org/pid/12/345", "snippet": "Publications" }
            ])))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(
                serde_json::json!({ "q": "Ada Lovelace publications research papers" }),
            ))
            .respond_with(reply(serde_json::json!([
                { "title": "Deep learning for segmentation", "link": "https://arxiv.org/abs/1", "snippet": "We propose" },
                { "title": "Short", "link": "https://arxiv.org/abs/2", "snippet": "tiny" }
            ])))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "q": "Ada Lovelace Google Scholar" })))
            .respond_with(reply(serde_json::json!([
                { "title": "Ada Lovelace - Google Scholar", "link": "https://scholar.google.com/citations?user=ada", "snippet": "Cited by 100" },
                { "title": "Ada on DBLP", "link": "https://dblp.org/pid/12/345", "snippet": "dup" }
            ])))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "q": "Ada Lovelace Computer Vision" })))
            .respond_with(reply(serde_json::json!([])))
            .expect(1)
            .mount(server)
            .await;
    }

    fn enricher_for(server: &MockServer) -> SearchEnricher {
        SearchEnricher::new(SerperClient::new(server.uri(), Some("k".into())).unwrap())
            .with_institution("IIT Kharagpur")
    }

    #[tokio::test]
    async fn enrich_collects_links_references_and_keywords() {
        let server = MockServer::start().await;
        mount_search(&server).await;

        let enricher = enricher_for(&server).with_keywords(LlmKeywordExtractor::new(Arc::new(KeywordModel)));
        let enrichment = enricher.enrich(&record()).await.expect("enrich");

        assert_eq!(
            enrichment.links,
            vec![
                "https://dblp.org/pid/12/345",
                "https://scholar.google.com/citations?user=ada"
            ]
        );
        assert_eq!(enrichment.references.len(), 1);
        assert_eq!(enrichment.references[0].title, "Deep learning for segmentation");
        assert_eq!(enrichment.keywords, vec!["image segmentation", "PyTorch"]);
        assert!(enrichment.excerpt.is_some());
        assert!(enrichment.topics.is_empty());

        let enriched = enrichment.apply(record());
        assert_eq!(enriched.record.research_areas, record().research_areas);
        assert!((enriched.confidence - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn keyword_failure_falls_back_to_research_areas() {
        let server = MockServer::start().await;
        mount_search(&server).await;

        let enricher = enricher_for(&server).with_keywords(LlmKeywordExtractor::new(Arc::new(FailingModel)));
        let enrichment = enricher.enrich(&record()).await.expect("enrich");
        assert_eq!(enrichment.keywords, vec!["Computer Vision"]);
    }

    #[tokio::test]
    async fn search_outage_fails_the_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = enricher_for(&server).enrich(&record()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unavailable_without_key() {
        let enricher = SearchEnricher::new(SerperClient::new("http://127.0.0.1:9", None).unwrap());
        assert!(matches!(
            enricher.ensure_available().await,
            Err(OutreachError::Unavailable { .. })
        ));
    }
}
