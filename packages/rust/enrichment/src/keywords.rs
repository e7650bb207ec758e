//! Expertise keyword extraction with a chat model.

use std::sync::Arc;

use serde::Deserialize;
use tracing::instrument;

use outreach_llm::prompts::system_prompt;
use outreach_llm::{ChatModel, complete_json};
use outreach_shared::{CandidateRecord, OutreachError, Result};

/// Upper bound on keywords kept from one reply.
pub const MAX_KEYWORDS: usize = 10;

const ROLE: &str = "You are an expert at analyzing academic profiles.";

/// Accepts `["a", "b"]` as well as `{"keywords": ["a", "b"]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeywordReply {
    List(Vec<String>),
    Object { keywords: Vec<String> },
}

/// Asks a chat model for 5-10 technical expertise keywords.
#[derive(Clone)]
pub struct LlmKeywordExtractor {
    model: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for LlmKeywordExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmKeywordExtractor")
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl LlmKeywordExtractor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    #[instrument(skip_all, fields(name = %record.name))]
    pub async fn extract(&self, record: &CandidateRecord, context: &str) -> Result<Vec<String>> {
        let prompt = build_prompt(record, context);
        let reply: KeywordReply =
            complete_json(self.model.as_ref(), &system_prompt(ROLE), &prompt).await?;
        let raw = match reply {
            KeywordReply::List(list) | KeywordReply::Object { keywords: list } => list,
        };

        let mut keywords: Vec<String> = Vec::new();
        for kw in raw {
            let kw = kw.trim();
            if !kw.is_empty() && !keywords.iter().any(|k| k.eq_ignore_ascii_case(kw)) {
                keywords.push(kw.to_string());
            }
        }
        keywords.truncate(MAX_KEYWORDS);

        if keywords.is_empty() {
            return Err(OutreachError::malformed("keyword extraction returned no keywords"));
        }
        Ok(keywords)
    }
}

fn build_prompt(record: &CandidateRecord, context: &str) -> String {
    let areas = if record.research_areas.is_empty() {
        "Not specified".to_string()
    } else {
        record.research_areas.join(", ")
    };
    format!(
        "Given the following professor information, extract key expertise keywords \
         that would be useful for matching with prospective research interns.\n\n\
         Professor Name: {name}\n\
         Department: {department}\n\
         Research Areas: {areas}\n\
         Bio: {bio}\n\n\
         Publications/Projects found from web search:\n{context}\n\n\
         Extract 5-10 specific, technical keywords: technologies and tools, research \
         methodologies, application domains.\n\
         Respond as {{\"keywords\": [\"...\"]}}.",
        name = record.name,
        department = record.department,
        bio = record.bio.as_deref().unwrap_or("Not available"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl ChatModel for Canned {
        fn model_id(&self) -> &str {
            "canned"
        }
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            assert!(prompt.contains("Ada Lovelace"));
            Ok(self.0.to_string())
        }
    }

    fn record() -> CandidateRecord {
        CandidateRecord {
            name: "Ada Lovelace".into(),
            profile_url: "https://example.edu/ada".into(),
            department: "CS".into(),
            designation: String::new(),
            email: None,
            phone: None,
            personal_webpage: None,
            research_areas: vec![],
            bio: None,
        }
    }

    #[tokio::test]
    async fn accepts_object_and_array_replies() {
        let obj = LlmKeywordExtractor::new(Arc::new(Canned(
            r#"{"keywords": ["PyTorch", "pytorch", " Computer Vision "]}"#,
        )));
        assert_eq!(
            obj.extract(&record(), "ctx").await.unwrap(),
            vec!["PyTorch", "Computer Vision"]
        );

        let arr = LlmKeywordExtractor::new(Arc::new(Canned(r#"["graph mining"]"#)));
        assert_eq!(arr.extract(&record(), "ctx").await.unwrap(), vec!["graph mining"]);
    }

    #[tokio::test]
    async fn empty_or_invalid_reply_is_malformed() {
        let empty = LlmKeywordExtractor::new(Arc::new(Canned(r#"{"keywords": []}"#)));
        assert!(matches!(
            empty.extract(&record(), "ctx").await,
            Err(OutreachError::MalformedOutput { .. })
        ));

        let prose = LlmKeywordExtractor::new(Arc::new(Canned("machine learning, vision")));
        assert!(matches!(
            prose.extract(&record(), "ctx").await,
            Err(OutreachError::MalformedOutput { .. })
        ));
    }

    #[tokio::test]
    async fn keywords_are_capped() {
        let many = LlmKeywordExtractor::new(Arc::new(Canned(
            r#"["a1","a2","a3","a4","a5","a6","a7","a8","a9","a10","a11","a12"]"#,
        )));
        assert_eq!(many.extract(&record(), "ctx").await.unwrap().len(), MAX_KEYWORDS);
    }
}
