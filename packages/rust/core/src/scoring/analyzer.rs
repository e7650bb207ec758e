//! Match analysis: discrete correspondences between a requester profile and
//! one enriched record.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use outreach_llm::prompts::system_prompt;
use outreach_llm::{ChatModel, complete_json};
use outreach_shared::{
    EnrichedRecord, MatchAnnotation, MatchCategory, OutreachError, RequesterProfile, Result,
};

use crate::text::{contains_phrase, content_tokens, jaccard, sentence_containing, shared_tokens};

const EXACT_WEIGHT: f32 = 1.0;
const CONTAINMENT_WEIGHT: f32 = 0.75;
const OVERLAP_THRESHOLD: f32 = 0.34;
const OVERLAP_CAP: f32 = 0.8;
const PROJECT_WEIGHT: f32 = 0.6;
const BIO_WEIGHT: f32 = 0.5;

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// One requester experience entry, flattened for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceItem {
    pub title: String,
    pub description: String,
}

/// The comparison pools one scoring call works on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchPools {
    pub capabilities: Vec<String>,
    /// Interests not already listed as capabilities.
    pub interests: Vec<String>,
    pub experience: Vec<ExperienceItem>,
    pub publications: Vec<String>,
    /// Research areas followed by derived keywords, deduplicated.
    pub topics: Vec<String>,
    pub references: Vec<String>,
    pub bio: Option<String>,
}

impl MatchPools {
    pub fn build(profile: &RequesterProfile, record: &EnrichedRecord) -> Self {
        let capabilities = profile.capabilities();
        let interests = profile
            .interests
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .filter(|i| !capabilities.iter().any(|c| c.eq_ignore_ascii_case(i)))
            .map(String::from)
            .collect();

        let mut topics: Vec<String> = Vec::new();
        for topic in record.record.research_areas.iter().chain(&record.keywords) {
            let topic = topic.trim();
            if !topic.is_empty() && !topics.iter().any(|t| t.eq_ignore_ascii_case(topic)) {
                topics.push(topic.to_string());
            }
        }

        Self {
            capabilities,
            interests,
            experience: profile
                .experience
                .iter()
                .map(|e| ExperienceItem {
                    title: e.title.clone(),
                    description: e.description.clone(),
                })
                .collect(),
            publications: profile.publications.clone(),
            topics,
            references: record.references.iter().map(|r| r.title.clone()).collect(),
            bio: record
                .record
                .bio
                .clone()
                .filter(|b| !b.trim().is_empty()),
        }
    }

    /// The requester pool entry `item` names, in the pool's own spelling.
    fn resolve_requester_item(&self, item: &str) -> Option<&str> {
        let item = item.trim();
        let entries = || {
            self.capabilities
                .iter()
                .chain(&self.interests)
                .chain(&self.publications)
                .chain(self.experience.iter().map(|e| &e.title))
                .map(|x| x.trim())
        };
        entries()
            .find(|x| *x == item)
            .or_else(|| entries().find(|x| x.eq_ignore_ascii_case(item)))
    }

    /// The candidate pool entry `item` names. A topic or reference resolves to
    /// its own spelling; otherwise `item` must be a whole-word phrase copied
    /// from the biography.
    fn resolve_candidate_item(&self, item: &str) -> Option<String> {
        let item = item.trim();
        if item.is_empty() {
            return None;
        }
        let entries = || self.topics.iter().chain(&self.references).map(|x| x.trim());
        if let Some(entry) = entries()
            .find(|x| *x == item)
            .or_else(|| entries().find(|x| x.eq_ignore_ascii_case(item)))
        {
            return Some(entry.to_string());
        }
        let bio = self.bio.as_deref()?;
        let verbatim = bio.contains(item)
            && !content_tokens(item).is_empty()
            && contains_phrase(bio, item);
        verbatim.then(|| item.to_string())
    }
}

/// Finds correspondences between the two sides of a [`MatchPools`].
#[async_trait]
pub trait MatchAnalyzer: Send + Sync {
    /// Backend name recorded in generation metadata.
    fn name(&self) -> &str;

    /// Annotations in no particular order; weights are clamped afterwards.
    async fn analyze(&self, pools: &MatchPools) -> Result<Vec<MatchAnnotation>>;
}

/// Clamp weights, sort by descending weight (stable) and cap the count.
pub fn finalize(mut annotations: Vec<MatchAnnotation>, max: usize) -> Vec<MatchAnnotation> {
    for a in &mut annotations {
        a.weight = if a.weight.is_nan() {
            0.0
        } else {
            a.weight.clamp(0.0, 1.0)
        };
    }
    annotations.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    annotations.truncate(max);
    annotations
}

// ---------------------------------------------------------------------------
// KeywordMatchAnalyzer
// ---------------------------------------------------------------------------

/// Deterministic phrase and token-overlap matcher.
///
/// For each requester item only the strongest correspondence is kept:
/// exact equality (1.0), whole-phrase containment (0.75), or token overlap
/// with Jaccard `j >= 0.34` (`0.4 + 0.4j`, at most 0.8). Skills and interests
/// with no topic match fall back to a mention in the biography (0.5).
/// Experience entries that mention a candidate topic count as project
/// matches (0.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatchAnalyzer;

impl KeywordMatchAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn best_topic_match(
        &self,
        category: MatchCategory,
        item: &str,
        candidates: &[String],
    ) -> Option<MatchAnnotation> {
        let mut best: Option<MatchAnnotation> = None;
        for candidate in candidates {
            let Some((weight, why)) = compare(item, candidate) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| weight > b.weight) {
                best = Some(MatchAnnotation {
                    category,
                    requester_item: item.to_string(),
                    candidate_item: candidate.clone(),
                    weight,
                    justification: Some(why),
                });
            }
        }
        best
    }

    fn bio_match(&self, category: MatchCategory, item: &str, bio: Option<&str>) -> Option<MatchAnnotation> {
        let sentence = sentence_containing(bio?, item)?;
        Some(MatchAnnotation {
            category,
            requester_item: item.to_string(),
            candidate_item: sentence.to_string(),
            weight: BIO_WEIGHT,
            justification: Some(format!("\"{item}\" is mentioned in the biography")),
        })
    }
}

/// Weight and justification for one pair, if they correspond at all.
fn compare(item: &str, candidate: &str) -> Option<(f32, String)> {
    if item.trim().eq_ignore_ascii_case(candidate.trim()) {
        return Some((EXACT_WEIGHT, "exact match".into()));
    }
    if contains_phrase(candidate, item) {
        return Some((CONTAINMENT_WEIGHT, format!("\"{candidate}\" includes \"{item}\"")));
    }
    if contains_phrase(item, candidate) {
        return Some((CONTAINMENT_WEIGHT, format!("\"{item}\" includes \"{candidate}\"")));
    }
    let j = jaccard(item, candidate);
    if j >= OVERLAP_THRESHOLD {
        let shared = shared_tokens(item, candidate).join(", ");
        return Some(((0.4 + 0.4 * j).min(OVERLAP_CAP), format!("shared terms: {shared}")));
    }
    None
}

#[async_trait]
impl MatchAnalyzer for KeywordMatchAnalyzer {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn analyze(&self, pools: &MatchPools) -> Result<Vec<MatchAnnotation>> {
        let mut out = Vec::new();
        let bio = pools.bio.as_deref();

        for skill in &pools.capabilities {
            let found = self
                .best_topic_match(MatchCategory::Skill, skill, &pools.topics)
                .or_else(|| self.bio_match(MatchCategory::Skill, skill, bio));
            out.extend(found);
        }

        for interest in &pools.interests {
            let found = self
                .best_topic_match(MatchCategory::ResearchArea, interest, &pools.topics)
                .or_else(|| self.bio_match(MatchCategory::ResearchArea, interest, bio));
            out.extend(found);
        }

        for exp in &pools.experience {
            let text = format!("{} {}", exp.title, exp.description);
            let topic = pools.topics.iter().find(|t| contains_phrase(&text, t));
            if let Some(topic) = topic {
                out.push(MatchAnnotation {
                    category: MatchCategory::Project,
                    requester_item: exp.title.clone(),
                    candidate_item: topic.clone(),
                    weight: PROJECT_WEIGHT,
                    justification: Some(format!("experience involves \"{topic}\"")),
                });
            }
        }

        for publication in &pools.publications {
            let found = self
                .best_topic_match(MatchCategory::Publication, publication, &pools.references)
                .or_else(|| {
                    self.best_topic_match(MatchCategory::Publication, publication, &pools.topics)
                });
            out.extend(found);
        }

        debug!(matches = out.len(), "keyword analysis");
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// LlmMatchAnalyzer
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AnalysisReply {
    matches: Vec<ReplyMatch>,
}

#[derive(Debug, Deserialize)]
struct ReplyMatch {
    category: String,
    requester_item: String,
    candidate_item: String,
    weight: f32,
    #[serde(default)]
    justification: Option<String>,
}

const ROLE: &str =
    "You are an expert at matching student profiles with professor research interests.";

/// Chat-model analyzer with a strict reply contract: every match must use a
/// known category, a weight in `[0, 1]`, and items copied verbatim from the
/// pools. Any violation rejects the whole reply as malformed.
#[derive(Clone)]
pub struct LlmMatchAnalyzer {
    model: Arc<dyn ChatModel>,
}

impl std::fmt::Debug for LlmMatchAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmMatchAnalyzer")
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl LlmMatchAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl MatchAnalyzer for LlmMatchAnalyzer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn analyze(&self, pools: &MatchPools) -> Result<Vec<MatchAnnotation>> {
        let reply: AnalysisReply =
            complete_json(self.model.as_ref(), &system_prompt(ROLE), &build_prompt(pools)).await?;

        reply
            .matches
            .into_iter()
            .map(|m| {
                let category: MatchCategory = m.category.parse()?;
                if !(0.0..=1.0).contains(&m.weight) {
                    return Err(OutreachError::malformed(format!(
                        "match weight {} outside [0, 1]",
                        m.weight
                    )));
                }
                let requester_item = pools.resolve_requester_item(&m.requester_item).ok_or_else(|| {
                    OutreachError::malformed(format!(
                        "'{}' is not an item of the requester profile",
                        m.requester_item
                    ))
                })?;
                let candidate_item = pools.resolve_candidate_item(&m.candidate_item).ok_or_else(|| {
                    OutreachError::malformed(format!(
                        "'{}' is not an item of the candidate record",
                        m.candidate_item
                    ))
                })?;
                Ok(MatchAnnotation {
                    category,
                    requester_item: requester_item.to_string(),
                    candidate_item,
                    weight: m.weight,
                    justification: m.justification.filter(|j| !j.trim().is_empty()),
                })
            })
            .collect()
    }
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "None listed".into()
    } else {
        items.join(", ")
    }
}

fn build_prompt(pools: &MatchPools) -> String {
    let experience = if pools.experience.is_empty() {
        "None listed".to_string()
    } else {
        pools
            .experience
            .iter()
            .map(|e| format!("- {}: {}", e.title, e.description))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Analyze the overlap between the student's background and the professor's research.\n\n\
         STUDENT\n\
         Skills: {skills}\n\
         Interests: {interests}\n\
         Experience:\n{experience}\n\
         Publications: {publications}\n\n\
         PROFESSOR\n\
         Research topics: {topics}\n\
         Publications: {references}\n\
         Bio: {bio}\n\n\
         Return {{\"matches\": [{{\"category\": \"skill|project|research_area|publication\", \
         \"requester_item\": \"...\", \"candidate_item\": \"...\", \"weight\": 0.0-1.0, \
         \"justification\": \"...\"}}]}}.\n\
         requester_item must be copied exactly from the student's skills, interests, \
         experience titles or publications. candidate_item must be copied exactly from the \
         professor's topics or publications, or be a verbatim phrase from the bio. \
         Only include genuine, specific matches; an empty list is a valid answer.",
        skills = list(&pools.capabilities),
        interests = list(&pools.interests),
        publications = list(&pools.publications),
        topics = list(&pools.topics),
        references = list(&pools.references),
        bio = pools.bio.as_deref().unwrap_or("Not available"),
    )
}
