//! Core domain types: candidate records, enriched records, match annotations
//! and ranked outputs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OutreachError, Result};

/// Confidence contributed by each populated enrichment field.
pub const CONFIDENCE_STEP: f32 = 0.2;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// CandidateRecord
// ---------------------------------------------------------------------------

/// One directory entry before enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Full name.
    pub name: String,
    /// Unique profile locator (the profile page URL).
    pub profile_url: String,
    /// Department name or code.
    pub department: String,
    /// Academic designation (Professor, Associate Professor, ...).
    #[serde(default)]
    pub designation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_webpage: Option<String>,
    /// Topic tags ("research areas").
    #[serde(default)]
    pub research_areas: Vec<String>,
    /// Free-text biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl CandidateRecord {
    /// Check the required identity fields at the adapter boundary.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OutreachError::malformed(format!(
                "candidate record without a name ({})",
                self.profile_url
            )));
        }
        if self.profile_url.trim().is_empty() {
            return Err(OutreachError::malformed(format!(
                "candidate record '{}' has no profile locator",
                self.name
            )));
        }
        if self.department.trim().is_empty() {
            return Err(OutreachError::malformed(format!(
                "candidate record '{}' has no department",
                self.name
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EnrichedRecord
// ---------------------------------------------------------------------------

/// A publication-like reference found during enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A candidate record plus externally derived context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: CandidateRecord,
    /// Topic keywords derived from external context.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// External reference links (scholar profiles, DBLP, ...).
    #[serde(default)]
    pub links: Vec<String>,
    /// Publication-like references.
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Short excerpt of the external context, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// How much supplementary data was actually found, in `[0, 1]`.
    #[serde(default)]
    pub confidence: f32,
}

impl EnrichedRecord {
    /// A degraded record: base fields only, nothing external, zero confidence.
    pub fn degraded(record: CandidateRecord) -> Self {
        Self {
            record,
            keywords: Vec::new(),
            links: Vec::new(),
            references: Vec::new(),
            excerpt: None,
            confidence: 0.0,
        }
    }

    /// Recompute [`Self::confidence`] from the populated fields.
    pub fn refresh_confidence(&mut self) {
        self.confidence = self.computed_confidence();
    }

    /// Each non-empty field among bio, topics, keywords, links and references
    /// adds [`CONFIDENCE_STEP`], capped at 1.0.
    pub fn computed_confidence(&self) -> f32 {
        let has_bio = self
            .record
            .bio
            .as_deref()
            .is_some_and(|b| !b.trim().is_empty());
        let populated = [
            has_bio,
            !self.record.research_areas.is_empty(),
            !self.keywords.is_empty(),
            !self.links.is_empty(),
            !self.references.is_empty(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count();

        (populated as f32 * CONFIDENCE_STEP).min(1.0)
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}

// ---------------------------------------------------------------------------
// MatchAnnotation
// ---------------------------------------------------------------------------

/// The kind of correspondence a [`MatchAnnotation`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCategory {
    Skill,
    Project,
    ResearchArea,
    Publication,
}

impl MatchCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Project => "project",
            Self::ResearchArea => "research_area",
            Self::Publication => "publication",
        }
    }
}

impl fmt::Display for MatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchCategory {
    type Err = OutreachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "skill" => Ok(Self::Skill),
            "project" => Ok(Self::Project),
            "research_area" => Ok(Self::ResearchArea),
            "publication" => Ok(Self::Publication),
            other => Err(OutreachError::malformed(format!(
                "unknown match category '{other}'"
            ))),
        }
    }
}

/// One discrete correspondence between a requester item and a candidate item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAnnotation {
    pub category: MatchCategory,
    /// The requester-profile item, verbatim.
    pub requester_item: String,
    /// The candidate-record item, verbatim.
    pub candidate_item: String,
    /// Strength of the correspondence, in `[0, 1]`.
    pub weight: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

// ---------------------------------------------------------------------------
// RankedOutput
// ---------------------------------------------------------------------------

/// A short outreach message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachMessage {
    pub subject: String,
    pub body: String,
}

/// How the content of a [`RankedOutput`] was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMeta {
    pub generated_at: DateTime<Utc>,
    /// "template" or the model identifier.
    pub generator: String,
    /// Match analyzer backend ("keyword" | "llm").
    pub analyzer: String,
    /// True when the neutral fallback replaced the regular result.
    #[serde(default)]
    pub fallback: bool,
}

/// One candidate's final scored result bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOutput {
    pub candidate_name: String,
    pub profile_url: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_email: Option<String>,
    pub annotations: Vec<MatchAnnotation>,
    pub overall_score: f32,
    pub message: OutreachMessage,
    /// The longer structured document (cover letter).
    pub document: String,
    pub meta: GenerationMeta,
}
