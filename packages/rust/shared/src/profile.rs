//! The requester profile: the structured representation of the party
//! initiating outreach, usually parsed from a CV.

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, Result};

/// Categorized capability lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skills {
    /// General skills ("Machine Learning", "Web Development").
    #[serde(default)]
    pub general: Vec<String>,
    /// Specific competencies: languages, frameworks, methods.
    #[serde(default)]
    pub specific: Vec<String>,
    /// Tooling ("Docker", "Git").
    #[serde(default)]
    pub tooling: Vec<String>,
}

/// One prior-experience entry (internship, project, research position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Educational qualification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

/// Structured requester profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequesterProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Skills,
    /// Legacy flat skill list, kept for older profile files.
    #[serde(default)]
    pub skills_list: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub publications: Vec<String>,
}

impl RequesterProfile {
    /// An otherwise empty profile with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            department: None,
            education: Vec::new(),
            skills: Skills::default(),
            skills_list: Vec::new(),
            experience: Vec::new(),
            interests: Vec::new(),
            publications: Vec::new(),
        }
    }

    /// The flattened capability list: categorized lists plus the legacy flat
    /// list, deduplicated case-insensitively, first occurrence wins.
    ///
    /// Always recomputed; never stored.
    pub fn capabilities(&self) -> Vec<String> {
        dedup_preserving_order(
            self.skills
                .general
                .iter()
                .chain(&self.skills.specific)
                .chain(&self.skills.tooling)
                .chain(&self.skills_list),
        )
    }

    /// Capabilities followed by stated interests, deduplicated.
    pub fn keywords(&self) -> Vec<String> {
        let capabilities = self.capabilities();
        dedup_preserving_order(capabilities.iter().chain(&self.interests))
    }

    /// Check that the profile is usable for matching.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OutreachError::malformed("requester profile has no name"));
        }
        if self.capabilities().is_empty() && self.interests.is_empty() && self.experience.is_empty()
        {
            return Err(OutreachError::malformed(format!(
                "requester profile '{}' lists no skills, interests or experience",
                self.name
            )));
        }
        Ok(())
    }
}

fn dedup_preserving_order<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .map(String::from)
        .collect()
}
