//! CV-shaped JSON and skill normalization.
//!
//! Two JSON layouts are accepted: the [`RequesterProfile`] shape itself and
//! the student CV layout ([`CvDocument`]) produced by model-assisted
//! extraction, recognized by its `student_name` key.

use serde::{Deserialize, Serialize};

use outreach_shared::{Education, Experience, OutreachError, RequesterProfile, Result, Skills};

// ---------------------------------------------------------------------------
// Skill normalization
// ---------------------------------------------------------------------------

const SKILL_ABBREVIATIONS: &[(&str, &str)] = &[
    ("ml", "Machine Learning"),
    ("dl", "Deep Learning"),
    ("ai", "Artificial Intelligence"),
    ("nlp", "Natural Language Processing"),
    ("cv", "Computer Vision"),
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("py", "Python"),
    ("cpp", "C++"),
    ("tf", "TensorFlow"),
    ("pytorch", "PyTorch"),
    ("aws", "Amazon Web Services"),
    ("gcp", "Google Cloud Platform"),
    ("k8s", "Kubernetes"),
    ("sql", "SQL"),
    ("nosql", "NoSQL"),
    ("dsa", "Data Structures and Algorithms"),
    ("oops", "Object Oriented Programming"),
    ("mlops", "MLOps"),
];

/// Expand a known abbreviation to its canonical name; other skills are
/// returned trimmed.
pub fn normalize_skill(skill: &str) -> String {
    let trimmed = skill.trim();
    let lower = trimmed.to_ascii_lowercase();
    SKILL_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == lower)
        .map(|(_, full)| (*full).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Normalize, drop blanks and deduplicate case-insensitively.
pub(crate) fn normalize_all<'a>(skills: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for skill in skills {
        let normalized = normalize_skill(skill);
        if !normalized.is_empty() && !out.iter().any(|s| s.eq_ignore_ascii_case(&normalized)) {
            out.push(normalized);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// CvDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvSkills {
    #[serde(default)]
    pub core_skills: Vec<String>,
    #[serde(default)]
    pub programming_languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvEducation {
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvInternship {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvProject {
    #[serde(default)]
    pub title: String,
    /// "Research Project", "Self Project", ...
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvCompetition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub achievement: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// A student CV in its extraction layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvDocument {
    pub student_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub education: Vec<CvEducation>,
    #[serde(default)]
    pub internships: Vec<CvInternship>,
    #[serde(default)]
    pub projects: Vec<CvProject>,
    #[serde(default)]
    pub competitions: Vec<CvCompetition>,
    #[serde(default)]
    pub research_experience: Vec<CvInternship>,
    #[serde(default)]
    pub skills: CvSkills,
    #[serde(default)]
    pub skills_list: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub publications: Vec<String>,
}

impl CvDocument {
    /// Convert to the matching shape: internships, research positions,
    /// projects and competitions all become [`Experience`] entries; skills
    /// are normalized.
    pub fn into_profile(self) -> RequesterProfile {
        let mut experience = Vec::new();

        for entry in self.internships.into_iter().chain(self.research_experience) {
            if entry.title.trim().is_empty() {
                continue;
            }
            experience.push(Experience {
                title: entry.title,
                organization: entry.organization,
                description: describe(entry.objective, &entry.highlights, &[]),
                duration: entry.duration,
            });
        }

        for project in self.projects {
            if project.title.trim().is_empty() {
                continue;
            }
            experience.push(Experience {
                title: project.title,
                organization: project.kind.unwrap_or_default(),
                description: describe(project.objective, &project.highlights, &project.technologies),
                duration: project.duration,
            });
        }

        for comp in self.competitions {
            if comp.name.trim().is_empty() {
                continue;
            }
            experience.push(Experience {
                title: comp.name,
                organization: comp.achievement.unwrap_or_default(),
                description: describe(comp.objective, &comp.highlights, &[]),
                duration: comp.duration,
            });
        }

        let specific = normalize_all(
            self.skills
                .programming_languages
                .iter()
                .chain(&self.skills.frameworks),
        );

        RequesterProfile {
            name: self.student_name.trim().to_string(),
            email: self.email.filter(|s| !s.trim().is_empty()),
            phone: self.phone.filter(|s| !s.trim().is_empty()),
            department: self.department.filter(|s| !s.trim().is_empty()),
            education: self
                .education
                .into_iter()
                .filter(|e| !e.degree.trim().is_empty())
                .map(|e| Education {
                    degree: e.degree,
                    institution: e.institution,
                    field: e.field,
                    year: e.year,
                })
                .collect(),
            skills: Skills {
                general: normalize_all(&self.skills.core_skills),
                specific,
                tooling: normalize_all(&self.skills.tools),
            },
            skills_list: normalize_all(&self.skills_list),
            experience,
            interests: self
                .interests
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            publications: self.publications,
        }
    }
}

fn describe(objective: Option<String>, highlights: &[String], technologies: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(objective) = objective.filter(|o| !o.trim().is_empty()) {
        parts.push(objective.trim().to_string());
    }
    parts.extend(
        highlights
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty()),
    );
    if !technologies.is_empty() {
        parts.push(format!("Technologies: {}", technologies.join(", ")));
    }
    parts.join("; ")
}

/// Parse a JSON profile in either accepted layout. The result is not yet
/// validated.
pub fn parse_profile_json(text: &str) -> Result<RequesterProfile> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| OutreachError::malformed(format!("profile JSON: {e}")))?;

    if value.get("student_name").is_some() {
        let cv: CvDocument = serde_json::from_value(value)
            .map_err(|e| OutreachError::malformed(format!("CV JSON: {e}")))?;
        return Ok(cv.into_profile());
    }

    let mut profile: RequesterProfile = serde_json::from_value(value)
        .map_err(|e| OutreachError::malformed(format!("profile JSON: {e}")))?;
    profile.skills.general = normalize_all(&profile.skills.general);
    profile.skills.specific = normalize_all(&profile.skills.specific);
    profile.skills.tooling = normalize_all(&profile.skills.tooling);
    profile.skills_list = normalize_all(&profile.skills_list);
    Ok(profile)
}
