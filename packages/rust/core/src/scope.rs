//! Auto-scoping: deriving directory scope filters from a requester profile.
//!
//! Each profile keyword is compared against a fixed keyword → department
//! table. Every department a matching keyword maps to gains one point; the
//! profile's own department gains [`OWN_DEPARTMENT_BONUS`]. The top scopes by
//! score become the filter, ties broken by first appearance.

use tracing::debug;

use outreach_directory::department_code;
use outreach_shared::{RequesterProfile, ScopeConfig};

use crate::text::contains_phrase;

/// Points added for the department named in the profile itself.
pub const OWN_DEPARTMENT_BONUS: usize = 3;

/// Keyword → department codes, many-to-many.
pub const KEYWORD_SCOPES: &[(&str, &[&str])] = &[
    ("Machine Learning", &["CS", "EC", "EE"]),
    ("Deep Learning", &["CS", "EC", "EE"]),
    ("Artificial Intelligence", &["CS", "EC"]),
    ("Natural Language Processing", &["CS"]),
    ("Computer Vision", &["CS", "EC"]),
    ("Data Science", &["CS", "MA"]),
    ("Algorithms", &["CS", "MA"]),
    ("Data Structures", &["CS"]),
    ("Web Development", &["CS"]),
    ("Python", &["CS", "EC", "EE"]),
    ("C++", &["CS", "EC"]),
    ("JavaScript", &["CS"]),
    ("React", &["CS"]),
    ("Next.js", &["CS"]),
    ("Software Engineering", &["CS"]),
    ("MLOps", &["CS"]),
    ("DevOps", &["CS"]),
    ("Cloud Computing", &["CS"]),
    ("Amazon Web Services", &["CS"]),
    ("Docker", &["CS"]),
    ("Kubernetes", &["CS"]),
    ("Electronics", &["EC", "EE"]),
    ("VLSI", &["EC", "EE"]),
    ("Embedded Systems", &["EC", "EE", "CS"]),
    ("Signal Processing", &["EC", "EE"]),
    ("Control Systems", &["EE", "EC"]),
    ("Power Systems", &["EE"]),
    ("FPGA", &["EC", "EE", "CS"]),
    ("IoT", &["EC", "EE", "CS"]),
    ("Blockchain", &["CS", "EC"]),
    ("Cryptography", &["CS", "MA"]),
    ("Solidity", &["CS"]),
    ("Smart Contracts", &["CS"]),
    ("Quantitative Finance", &["MA", "CS", "IM"]),
    ("Financial Engineering", &["MA", "IM"]),
    ("Trading", &["MA", "CS"]),
    ("Time Series", &["MA", "CS"]),
    ("Robotics", &["ME", "EC", "CS"]),
    ("Automation", &["ME", "EC", "EE"]),
    ("CAD", &["ME"]),
    ("CFD", &["ME", "AE"]),
    ("Fluid Mechanics", &["ME", "AE", "CH"]),
    ("Process Engineering", &["CH"]),
    ("Thermodynamics", &["CH", "ME"]),
    ("Reaction Engineering", &["CH"]),
    ("Materials Science", &["MT"]),
    ("Nanotechnology", &["MT", "CY", "PH"]),
    ("Structural Engineering", &["CE"]),
    ("Construction", &["CE"]),
    ("Architecture", &["AR"]),
    ("Mathematics", &["MA"]),
    ("Statistics", &["MA"]),
    ("Probability", &["MA"]),
    ("Physics", &["PH"]),
    ("Quantum Computing", &["CS", "PH"]),
    ("Competitive Programming", &["CS", "MA"]),
];

/// Auto-scoping limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeOptions {
    pub max_scopes: usize,
    /// Used when no keyword matches.
    pub fallback: String,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            max_scopes: 5,
            fallback: "CS".into(),
        }
    }
}

impl From<&ScopeConfig> for ScopeOptions {
    fn from(config: &ScopeConfig) -> Self {
        Self {
            max_scopes: config.max_scopes.max(1),
            fallback: config.fallback.clone(),
        }
    }
}

/// Score every scope the profile's keywords touch, in first-seen order.
pub fn score_scopes(profile: &RequesterProfile) -> Vec<(String, usize)> {
    let mut scores: Vec<(String, usize)> = Vec::new();
    let mut bump = |code: &str, points: usize| match scores.iter_mut().find(|(c, _)| c == code) {
        Some((_, score)) => *score += points,
        None => scores.push((code.to_string(), points)),
    };

    if let Some(code) = profile.department.as_deref().and_then(department_code) {
        bump(code, OWN_DEPARTMENT_BONUS);
    }

    for keyword in profile.keywords() {
        for (mapped, codes) in KEYWORD_SCOPES {
            if contains_phrase(&keyword, mapped) || contains_phrase(mapped, &keyword) {
                for code in *codes {
                    bump(code, 1);
                }
            }
        }
    }
    scores
}

/// Top scopes for `profile`, or the fallback when nothing matches.
pub fn derive_scopes(profile: &RequesterProfile, options: &ScopeOptions) -> Vec<String> {
    let mut scores = score_scopes(profile);
    // Stable: equal scores keep first-seen order.
    scores.sort_by(|a, b| b.1.cmp(&a.1));
    debug!(?scores, "scope scores");

    let scopes: Vec<String> = scores
        .into_iter()
        .filter(|(_, score)| *score > 0)
        .take(options.max_scopes.max(1))
        .map(|(code, _)| code)
        .collect();

    if scopes.is_empty() {
        vec![options.fallback.clone()]
    } else {
        scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(skills: &[&str]) -> RequesterProfile {
        let mut p = RequesterProfile::named("Ravi");
        p.skills.general = skills.iter().map(|s| s.to_string()).collect();
        p
    }

    #[test]
    fn counts_accumulate_across_keywords() {
        let p = profile(&["Machine Learning", "Computer Vision", "Python"]);
        let scores = score_scopes(&p);
        assert_eq!(
            scores,
            vec![("CS".into(), 3), ("EC".into(), 3), ("EE".into(), 2)]
        );
        assert_eq!(derive_scopes(&p, &ScopeOptions::default()), vec!["CS", "EC", "EE"]);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let p = profile(&["Robotics"]);
        assert_eq!(derive_scopes(&p, &ScopeOptions::default()), vec!["ME", "EC", "CS"]);
    }

    #[test]
    fn matching_is_phrase_based_both_ways() {
        // Longer skill containing a table keyword.
        let p = profile(&["Statistics for Data Analysis"]);
        assert_eq!(derive_scopes(&p, &ScopeOptions::default()), vec!["MA"]);
        // Short tokens do not match inside unrelated words.
        let p = profile(&["R"]);
        assert_eq!(derive_scopes(&p, &ScopeOptions::default()), vec!["CS"]);
    }

    #[test]
    fn own_department_and_limit() {
        let mut p = profile(&["Python"]);
        p.department = Some("Mechanical Engineering".into());
        let options = ScopeOptions {
            max_scopes: 2,
            fallback: "CS".into(),
        };
        assert_eq!(derive_scopes(&p, &options), vec!["ME", "CS"]);
    }

    #[test]
    fn fallback_when_nothing_matches() {
        let mut p = profile(&["Pottery"]);
        p.interests = vec!["Poetry".into()];
        let options = ScopeOptions {
            max_scopes: 5,
            fallback: "EE".into(),
        };
        assert_eq!(derive_scopes(&p, &options), vec!["EE"]);
    }

    #[test]
    fn derivation_is_deterministic() {
        let p = profile(&["Deep Learning", "VLSI", "Statistics", "Robotics"]);
        let first = derive_scopes(&p, &ScopeOptions::default());
        for _ in 0..5 {
            assert_eq!(derive_scopes(&p, &ScopeOptions::default()), first);
        }
    }
}
