//! Content generation: the outreach message and the cover letter.
//!
//! Generators see a [`GroundingFacts`] value only. The template generator
//! assembles text from fact texts; the model-backed generator must cite a
//! fact for every paragraph it writes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use outreach_llm::prompts::{GROUNDING_INSTRUCTION, system_prompt};
use outreach_llm::{ChatModel, complete_json};
use outreach_shared::{OutreachError, OutreachMessage, Result};

use super::grounding::{FactKind, GroundingFacts};

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub message: OutreachMessage,
    pub document: String,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generator identifier recorded in generation metadata.
    fn name(&self) -> &str;

    async fn generate(&self, facts: &GroundingFacts) -> Result<GeneratedContent>;
}

// ---------------------------------------------------------------------------
// TemplateContentGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContentGenerator;

impl TemplateContentGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Render without going through the trait. Never fails.
    pub fn render(&self, facts: &GroundingFacts) -> GeneratedContent {
        let requester = facts.first(FactKind::RequesterName).unwrap_or("A prospective intern");
        let candidate = facts.first(FactKind::CandidateName).unwrap_or("Professor");
        let department = facts.first(FactKind::CandidateDepartment);
        let topics = texts(facts, FactKind::CandidateTopic, 3);
        let matches = texts(facts, FactKind::Match, 3);
        let skills = texts(facts, FactKind::RequesterSkill, 5);
        let education = facts.first(FactKind::RequesterEducation);
        let experience = texts(facts, FactKind::RequesterExperience, 2);

        let area = topics.first().copied().or(department).unwrap_or("your research");
        let subject = format!("Research Internship Inquiry - {area}");

        let mut body = vec![format!("Dear {candidate},")];
        let mut intro = format!("My name is {requester}");
        if let Some(edu) = education {
            intro.push_str(&format!(" ({edu})"));
        }
        intro.push('.');
        if !topics.is_empty() {
            intro.push_str(&format!(
                " I am writing about research internship opportunities related to your work on {}.",
                join_list(&topics)
            ));
        } else {
            intro.push_str(" I am writing about research internship opportunities in your group.");
        }
        body.push(intro);
        if !matches.is_empty() {
            body.push(format!("Relevant overlap: {}.", matches.join("; ")));
        }
        body.push(format!("Best regards,\n{requester}"));

        let mut letter = vec![format!("Dear {candidate},")];
        let mut opening = format!("I am {requester}");
        if let Some(edu) = education {
            opening.push_str(&format!(", {edu}"));
        }
        opening.push_str(", and I would like to apply for a research internship");
        if let Some(dept) = department {
            opening.push_str(&format!(" in {dept}"));
        }
        opening.push('.');
        letter.push(opening);
        if !skills.is_empty() {
            letter.push(format!("My skills include {}.", join_list(&skills)));
        }
        if !experience.is_empty() {
            letter.push(format!("My experience includes {}.", join_list(&experience)));
        }
        if !matches.is_empty() {
            letter.push(format!(
                "These connect to your research as follows: {}.",
                matches.join("; ")
            ));
        }
        letter.push(format!(
            "Thank you for considering my application.\n\nSincerely,\n{requester}"
        ));

        GeneratedContent {
            message: OutreachMessage {
                subject,
                body: body.join("\n\n"),
            },
            document: letter.join("\n\n"),
        }
    }
}

fn texts(facts: &GroundingFacts, kind: FactKind, max: usize) -> Vec<&str> {
    facts.of_kind(kind).take(max).map(|f| f.text.as_str()).collect()
}

fn join_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[async_trait]
impl ContentGenerator for TemplateContentGenerator {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, facts: &GroundingFacts) -> Result<GeneratedContent> {
        Ok(self.render(facts))
    }
}

// ---------------------------------------------------------------------------
// LlmContentGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Paragraph {
    text: String,
    fact_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ContentReply {
    subject: String,
    message: Vec<Paragraph>,
    cover_letter: Vec<Paragraph>,
}

const ROLE: &str =
    "You write professional, personalized cold emails and cover letters for research internships.";

/// Model-backed generator. Each paragraph of the reply carries the ids of
/// the facts it relies on; missing or unknown citations reject the reply.
#[derive(Clone)]
pub struct LlmContentGenerator {
    model: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for LlmContentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmContentGenerator")
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl LlmContentGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

fn assemble(facts: &GroundingFacts, paragraphs: Vec<Paragraph>, what: &str) -> Result<String> {
    if paragraphs.is_empty() {
        return Err(OutreachError::malformed(format!("{what} has no paragraphs")));
    }
    let mut out = Vec::with_capacity(paragraphs.len());
    for p in paragraphs {
        facts
            .verify_citations(&p.fact_ids)
            .map_err(|e| OutreachError::malformed(format!("{what}: {e}")))?;
        let text = p.text.trim();
        if text.is_empty() {
            return Err(OutreachError::malformed(format!("{what} has an empty paragraph")));
        }
        out.push(text.to_string());
    }
    Ok(out.join("\n\n"))
}

#[async_trait]
impl ContentGenerator for LlmContentGenerator {
    fn name(&self) -> &str {
        self.model.model_id()
    }

    async fn generate(&self, facts: &GroundingFacts) -> Result<GeneratedContent> {
        let prompt = format!(
            "Write a cold email (150-200 words) and a cover letter (300-350 words) from the \
             student to the professor, requesting a research internship.\n\n\
             FACTS:\n{facts}\n\n\
             {GROUNDING_INSTRUCTION}\n\n\
             Return {{\"subject\": \"...\", \
             \"message\": [{{\"text\": \"paragraph\", \"fact_ids\": [\"F1\"]}}], \
             \"cover_letter\": [{{\"text\": \"paragraph\", \"fact_ids\": [\"F2\"]}}]}}. \
             Every paragraph must list at least one fact id.",
            facts = facts.render(),
        );
        let reply: ContentReply =
            complete_json(self.model.as_ref(), &system_prompt(ROLE), &prompt).await?;

        let subject = reply.subject.trim().to_string();
        if subject.is_empty() {
            return Err(OutreachError::malformed("message subject is empty"));
        }
        Ok(GeneratedContent {
            message: OutreachMessage {
                subject,
                body: assemble(facts, reply.message, "message")?,
            },
            document: assemble(facts, reply.cover_letter, "cover letter")?,
        })
    }
}
