//! Grounding facts: the only material content generators may draw on.
//!
//! Every fact is a literal field of the requester profile, the candidate
//! record, or a match annotation between them, numbered `F1`, `F2`, ...
//! Generators receive a [`GroundingFacts`] value and nothing else, and model
//! output must cite fact ids that [`GroundingFacts::verify_citations`] accepts.

use outreach_shared::{EnrichedRecord, MatchAnnotation, OutreachError, RequesterProfile, Result};

const MAX_SKILL_FACTS: usize = 10;
const MAX_EXPERIENCE_FACTS: usize = 4;
const MAX_TOPIC_FACTS: usize = 8;
const MAX_REFERENCE_FACTS: usize = 3;
const MAX_MATCH_FACTS: usize = 5;

/// What a fact states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    RequesterName,
    RequesterEducation,
    RequesterSkill,
    RequesterExperience,
    RequesterInterest,
    CandidateName,
    CandidateDesignation,
    CandidateDepartment,
    CandidateTopic,
    CandidateReference,
    Match,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub id: String,
    pub kind: FactKind,
    pub text: String,
}

/// Numbered facts about both parties.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroundingFacts {
    facts: Vec<Fact>,
}

impl GroundingFacts {
    pub fn build(
        profile: &RequesterProfile,
        record: &EnrichedRecord,
        annotations: &[MatchAnnotation],
    ) -> Self {
        let mut facts = Self::default();
        let candidate = &record.record;

        facts.push(FactKind::RequesterName, &profile.name);
        for edu in &profile.education {
            let mut text = edu.degree.clone();
            if let Some(field) = &edu.field {
                text.push_str(&format!(" in {field}"));
            }
            if !edu.institution.is_empty() {
                text.push_str(&format!(", {}", edu.institution));
            }
            if let Some(year) = &edu.year {
                text.push_str(&format!(" ({year})"));
            }
            facts.push(FactKind::RequesterEducation, &text);
        }
        for skill in profile.capabilities().iter().take(MAX_SKILL_FACTS) {
            facts.push(FactKind::RequesterSkill, skill);
        }
        for exp in profile.experience.iter().take(MAX_EXPERIENCE_FACTS) {
            let text = if exp.organization.is_empty() {
                exp.title.clone()
            } else {
                format!("{} ({})", exp.title, exp.organization)
            };
            facts.push(FactKind::RequesterExperience, &text);
        }
        for interest in &profile.interests {
            facts.push(FactKind::RequesterInterest, interest);
        }

        facts.push(FactKind::CandidateName, &candidate.name);
        facts.push(FactKind::CandidateDesignation, &candidate.designation);
        facts.push(FactKind::CandidateDepartment, &candidate.department);
        let topics = candidate.research_areas.iter().chain(&record.keywords);
        for topic in topics.take(MAX_TOPIC_FACTS) {
            facts.push(FactKind::CandidateTopic, topic);
        }
        for reference in record.references.iter().take(MAX_REFERENCE_FACTS) {
            facts.push(FactKind::CandidateReference, &reference.title);
        }

        for a in annotations.iter().take(MAX_MATCH_FACTS) {
            let text = format!("{} relates to {}", a.requester_item, a.candidate_item);
            facts.push(FactKind::Match, &text);
        }
        facts
    }

    fn push(&mut self, kind: FactKind, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let id = format!("F{}", self.facts.len() + 1);
        self.facts.push(Fact {
            id,
            kind,
            text: text.to_string(),
        });
    }

    pub fn all(&self) -> &[Fact] {
        &self.facts
    }

    pub fn get(&self, id: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.id == id)
    }

    /// Facts of one kind, in order.
    pub fn of_kind(&self, kind: FactKind) -> impl Iterator<Item = &Fact> {
        self.facts.iter().filter(move |f| f.kind == kind)
    }

    /// Text of the first fact of `kind`.
    pub fn first(&self, kind: FactKind) -> Option<&str> {
        self.of_kind(kind).next().map(|f| f.text.as_str())
    }

    /// `F1: ...` lines for prompts.
    pub fn render(&self) -> String {
        self.facts
            .iter()
            .map(|f| format!("{}: {}", f.id, f.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// A passage is grounded only when it cites at least one fact and every
    /// cited id exists.
    pub fn verify_citations(&self, cited: &[String]) -> Result<()> {
        if cited.is_empty() {
            return Err(OutreachError::malformed("passage cites no facts"));
        }
        for id in cited {
            if self.get(id.trim()).is_none() {
                return Err(OutreachError::malformed(format!("unknown fact id '{id}'")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_shared::{CandidateRecord, Education, MatchCategory};

    fn record() -> EnrichedRecord {
        let mut rec = EnrichedRecord::degraded(CandidateRecord {
            name: "Dr. Jane Doe".into(),
            profile_url: "https://example.edu/jane".into(),
            department: "CS".into(),
            designation: String::new(),
            email: None,
            phone: None,
            personal_webpage: None,
            research_areas: vec!["Computer Vision".into()],
            bio: None,
        });
        rec.keywords = vec!["segmentation".into()];
        rec
    }

    fn profile() -> RequesterProfile {
        let mut p = RequesterProfile::named("Ravi");
        p.education.push(Education {
            degree: "B.Tech".into(),
            institution: "IIT Kharagpur".into(),
            field: Some("Computer Science".into()),
            year: None,
        });
        p.skills.general = vec!["Computer Vision".into()];
        p
    }

    #[test]
    fn facts_are_numbered_and_skip_blanks() {
        let annotations = vec![MatchAnnotation {
            category: MatchCategory::Skill,
            requester_item: "Computer Vision".into(),
            candidate_item: "Computer Vision".into(),
            weight: 1.0,
            justification: None,
        }];
        let facts = GroundingFacts::build(&profile(), &record(), &annotations);
        let ids: Vec<_> = facts.all().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8"]);

        assert_eq!(facts.first(FactKind::RequesterName), Some("Ravi"));
        assert_eq!(
            facts.first(FactKind::RequesterEducation),
            Some("B.Tech in Computer Science, IIT Kharagpur")
        );
        // Empty designation is not a fact.
        assert_eq!(facts.first(FactKind::CandidateDesignation), None);
        assert_eq!(
            facts.first(FactKind::Match),
            Some("Computer Vision relates to Computer Vision")
        );
        assert!(facts.render().starts_with("F1: Ravi\nF2: B.Tech"));
    }

    #[test]
    fn citations_must_exist_and_be_present() {
        let facts = GroundingFacts::build(&profile(), &record(), &[]);
        assert!(facts.verify_citations(&["F1".into(), " F2 ".into()]).is_ok());
        assert!(matches!(
            facts.verify_citations(&[]),
            Err(OutreachError::MalformedOutput { .. })
        ));
        assert!(facts.verify_citations(&["F99".into()]).is_err());
    }
}
