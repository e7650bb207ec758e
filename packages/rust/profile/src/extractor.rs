use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use outreach_llm::ChatModel;
use outreach_llm::complete_json;
use outreach_llm::prompts::system_prompt;
use outreach_shared::{RequesterProfile, Result};

use crate::cv::{CvDocument, parse_profile_json};
use crate::document::{DocumentKind, extract_text, read_bytes};
use crate::sections::parse_sections;
use crate::{ProfileExtractor, ProfileSource};

/// Longest CV text sent to a model, in characters.
pub const MAX_PROMPT_CHARS: usize = 8000;

const ROLE: &str = "You are an expert CV/resume parser for university students.";

/// Extracts profiles from JSON, text, Markdown and PDF documents.
///
/// JSON is deserialized directly. Other formats are reduced to text and then
/// structured by the chat model when one is configured, or by the
/// deterministic section parser otherwise.
#[derive(Clone, Default)]
pub struct DocumentProfileExtractor {
    model: Option<Arc<dyn ChatModel>>,
}

impl std::fmt::Debug for DocumentProfileExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProfileExtractor")
            .field("model", &self.model.as_ref().map(|m| m.model_id()))
            .finish()
    }
}

impl DocumentProfileExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    async fn structure_with_model(
        &self,
        model: &dyn ChatModel,
        text: &str,
    ) -> Result<RequesterProfile> {
        let prompt = build_prompt(text);
        let cv: CvDocument = complete_json(model, &system_prompt(ROLE), &prompt).await?;
        Ok(cv.into_profile())
    }
}

#[async_trait]
impl ProfileExtractor for DocumentProfileExtractor {
    #[instrument(skip_all, fields(source = %source.filename_hint()))]
    async fn extract(&self, source: &ProfileSource) -> Result<RequesterProfile> {
        let kind = DocumentKind::detect(source)?;
        let data = read_bytes(source).await?;
        let text = extract_text(kind, data).await?;

        let profile = match (kind, &self.model) {
            (DocumentKind::Json, _) => parse_profile_json(&text)?,
            (_, Some(model)) => self.structure_with_model(model.as_ref(), &text).await?,
            (_, None) => parse_sections(&text),
        };

        profile.validate()?;
        info!(
            name = %profile.name,
            capabilities = profile.capabilities().len(),
            experience = profile.experience.len(),
            "extracted requester profile"
        );
        Ok(profile)
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        "Extract structured information from the following student CV.\n\n\
         CV TEXT:\n{cv}\n\n\
         Return a JSON object with these fields:\n\
         - student_name (string)\n\
         - email, phone, department (string or null)\n\
         - education: [{{degree, institution, field, year}}]\n\
         - internships: [{{title, organization, duration, objective, highlights: []}}]\n\
         - projects: [{{title, type, duration, objective, technologies: [], highlights: []}}]\n\
         - competitions: [{{name, achievement, duration, objective, highlights: []}}]\n\
         - research_experience: [{{title, organization, duration, objective, highlights: []}}]\n\
         - skills: {{core_skills: [], programming_languages: [], frameworks: [], tools: []}}\n\
         - interests: [] (research interests stated or clearly implied by the CV)\n\
         - publications: []\n\n\
         Only include information present in the CV text. Use empty arrays for \
         missing sections.",
        cv = truncate_chars(text, MAX_PROMPT_CHARS),
    )
}
