//! Deterministic section parser for plain-text and Markdown CVs.
//!
//! Recognizes headed sections by their title, either on a line of their own
//! (`Skills`, `## Experience`, `TOOLS:`) or inline (`Languages: Rust, Go`).
//! Used when no chat model is configured.

use std::sync::LazyLock;

use regex::Regex;

use outreach_shared::{Education, Experience, RequesterProfile};

use crate::cv::normalize_all;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s-]{8,}\d").expect("valid regex"));

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*\d[^()]*)\)\s*$").expect("valid regex"));

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    General,
    Specific,
    Tooling,
    Experience,
    Education,
    Interests,
    Publications,
    Other,
}

fn section_for(title: &str) -> Option<Section> {
    let t = title.trim().to_ascii_lowercase();
    let section = match t.as_str() {
        "skills" | "core skills" | "technical skills" | "skills and expertise" | "expertise" => {
            Section::General
        }
        "languages" | "programming languages" | "frameworks" | "libraries"
        | "libraries/frameworks" | "frameworks and libraries" => Section::Specific,
        "tools" | "tooling" | "tools/ides" | "developer tools" => Section::Tooling,
        "experience" | "work experience" | "internships" | "internship" | "projects"
        | "research experience" | "competitions" | "positions" => Section::Experience,
        "education" | "academic details" | "academics" => Section::Education,
        "interests" | "research interests" | "areas of interest" => Section::Interests,
        "publications" | "papers" => Section::Publications,
        "achievements" | "awards" | "extracurricular" | "extra-curricular activities"
        | "coursework" | "references" | "contact" | "summary" | "objective" => Section::Other,
        _ => return None,
    };
    Some(section)
}

/// Returns the section and any inline content for a heading line.
fn heading(line: &str) -> Option<(Section, &str)> {
    let line = line.trim().trim_start_matches('#').trim();
    let line = line.trim_matches('*').trim();
    if let Some(section) = section_for(line.trim_end_matches(':')) {
        return Some((section, ""));
    }
    let (title, rest) = line.split_once(':')?;
    section_for(title.trim_matches('*')).map(|s| (s, rest.trim()))
}

fn strip_bullet(line: &str) -> &str {
    let t = line.trim();
    for marker in ["- ", "* ", "• ", "· ", "+ "] {
        if let Some(rest) = t.strip_prefix(marker) {
            return rest.trim();
        }
    }
    t
}

fn split_items(text: &str) -> impl Iterator<Item = String> + '_ {
    strip_bullet(text)
        .split([',', ';', '|'])
        .map(|s| s.trim().trim_end_matches('.').trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_experience_header(line: &str) -> Experience {
    let mut text = strip_bullet(line).to_string();
    let mut duration = None;

    if text.contains('|') {
        let parts: Vec<&str> = text.split('|').map(str::trim).collect();
        return Experience {
            title: parts[0].to_string(),
            organization: parts.get(1).copied().unwrap_or_default().to_string(),
            description: String::new(),
            duration: parts
                .get(2)
                .map(|s| s.to_string())
                .filter(|s| !s.is_empty()),
        };
    }

    if let Some(caps) = DURATION_RE.captures(&text) {
        duration = Some(caps[1].trim().to_string());
        let start = caps.get(0).map_or(text.len(), |m| m.start());
        text.truncate(start);
    }
    let text = text.trim();

    let (title, organization) = if let Some((t, o)) = text.split_once(" at ") {
        (t, o)
    } else if let Some((t, o)) = text.split_once(", ") {
        (t, o)
    } else if let Some((t, o)) = text.split_once(" - ") {
        (t, o)
    } else {
        (text, "")
    };

    Experience {
        title: title.trim().to_string(),
        organization: organization.trim().to_string(),
        description: String::new(),
        duration,
    }
}

fn parse_education_line(line: &str) -> Education {
    let text = strip_bullet(line);
    let parts: Vec<&str> = text
        .split([',', '|'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let year = YEAR_RE.find(text).map(|m| m.as_str().to_string());
    Education {
        degree: parts.first().copied().unwrap_or_default().to_string(),
        institution: parts
            .get(1)
            .filter(|p| !YEAR_RE.is_match(p))
            .copied()
            .unwrap_or_default()
            .to_string(),
        field: None,
        year,
    }
}

/// Build a profile from CV text. The result is not yet validated.
pub fn parse_sections(text: &str) -> RequesterProfile {
    let mut profile = RequesterProfile::named("");
    let mut general = Vec::new();
    let mut specific = Vec::new();
    let mut tooling = Vec::new();
    let mut section: Option<Section> = None;

    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }

        if profile.email.is_none() {
            profile.email = EMAIL_RE.find(raw).map(|m| m.as_str().to_string());
        }
        if profile.phone.is_none() {
            profile.phone = PHONE_RE.find(raw).map(|m| m.as_str().trim().to_string());
        }

        if let Some((next, inline)) = heading(raw) {
            section = Some(next);
            if inline.is_empty() {
                continue;
            }
            push_items(next, inline, &mut general, &mut specific, &mut tooling, &mut profile);
            continue;
        }

        match section {
            None => {
                // Preamble: the first plain line is the name.
                let line = raw.trim().trim_start_matches('#').trim();
                if profile.name.is_empty() && !line.contains('@') && !PHONE_RE.is_match(line) {
                    profile.name = line.to_string();
                }
            }
            Some(Section::Experience) => {
                let indented = raw.starts_with(' ') || raw.starts_with('\t');
                if !indented || profile.experience.is_empty() {
                    profile.experience.push(parse_experience_header(raw));
                } else if let Some(current) = profile.experience.last_mut() {
                    let detail = strip_bullet(raw);
                    if !current.description.is_empty() {
                        current.description.push_str("; ");
                    }
                    current.description.push_str(detail);
                }
            }
            Some(Section::Education) => {
                if !(raw.starts_with(' ') || raw.starts_with('\t')) {
                    profile.education.push(parse_education_line(raw));
                }
            }
            Some(Section::Publications) => {
                let title = strip_bullet(raw).to_string();
                profile.publications.push(title);
            }
            Some(other) => {
                push_items(other, raw, &mut general, &mut specific, &mut tooling, &mut profile)
            }
        }
    }

    profile.skills.general = normalize_all(&general);
    profile.skills.specific = normalize_all(&specific);
    profile.skills.tooling = normalize_all(&tooling);
    profile.experience.retain(|e| !e.title.is_empty());
    profile.education.retain(|e| !e.degree.is_empty());
    profile
}

fn push_items(
    section: Section,
    text: &str,
    general: &mut Vec<String>,
    specific: &mut Vec<String>,
    tooling: &mut Vec<String>,
    profile: &mut RequesterProfile,
) {
    let target = match section {
        Section::General => general,
        Section::Specific => specific,
        Section::Tooling => tooling,
        Section::Interests => &mut profile.interests,
        Section::Publications => &mut profile.publications,
        Section::Experience => {
            profile.experience.push(parse_experience_header(text));
            return;
        }
        Section::Education => {
            profile.education.push(parse_education_line(text));
            return;
        }
        Section::Other => return,
    };
    target.extend(split_items(text));
}
