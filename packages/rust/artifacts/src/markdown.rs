//! Markdown rendering of ranked outputs.

use outreach_shared::RankedOutput;

/// Render one ranked output as a Markdown file with YAML frontmatter.
pub fn render_output(rank: usize, output: &RankedOutput) -> String {
    let mut md = String::from("---\n");
    md.push_str(&format!("rank: {rank}\n"));
    md.push_str(&format!("candidate: \"{}\"\n", escape_yaml_string(&output.candidate_name)));
    md.push_str(&format!("department: \"{}\"\n", escape_yaml_string(&output.department)));
    md.push_str(&format!("profile_url: \"{}\"\n", escape_yaml_string(&output.profile_url)));
    if let Some(email) = &output.candidate_email {
        md.push_str(&format!("email: \"{}\"\n", escape_yaml_string(email)));
    }
    md.push_str(&format!("score: {:.2}\n", output.overall_score));
    md.push_str(&format!("generator: \"{}\"\n", escape_yaml_string(&output.meta.generator)));
    md.push_str(&format!("generated_at: \"{}\"\n", output.meta.generated_at.to_rfc3339()));
    if output.meta.fallback {
        md.push_str("fallback: true\n");
    }
    md.push_str("---\n\n");

    md.push_str(&format!("# {}\n\n", output.candidate_name));

    md.push_str("## Matches\n\n");
    if output.annotations.is_empty() {
        md.push_str("_No specific matches found._\n\n");
    } else {
        md.push_str("| Category | Requester | Candidate | Weight |\n");
        md.push_str("|---|---|---|---|\n");
        for a in &output.annotations {
            md.push_str(&format!(
                "| {} | {} | {} | {:.2} |\n",
                a.category,
                escape_cell(&a.requester_item),
                escape_cell(&a.candidate_item),
                a.weight
            ));
        }
        md.push('\n');
    }

    md.push_str("## Message\n\n");
    md.push_str(&format!("**Subject:** {}\n\n", output.message.subject));
    md.push_str(output.message.body.trim_end());
    md.push_str("\n\n## Cover letter\n\n");
    md.push_str(output.document.trim_end());
    md.push('\n');
    md
}

/// File stem for a ranked output: `03-jane-doe`.
pub fn file_stem(rank: usize, candidate_name: &str) -> String {
    let slug = slugify(candidate_name);
    if slug.is_empty() {
        format!("{rank:02}")
    } else {
        format!("{rank:02}-{slug}")
    }
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use outreach_shared::{GenerationMeta, MatchAnnotation, MatchCategory, OutreachMessage};

    fn output() -> RankedOutput {
        RankedOutput {
            candidate_name: "Dr. Jane \"JD\" Doe".into(),
            profile_url: "https://example.edu/jane".into(),
            department: "CS".into(),
            candidate_email: Some("jane@example.edu".into()),
            annotations: vec![MatchAnnotation {
                category: MatchCategory::Skill,
                requester_item: "Computer Vision".into(),
                candidate_item: "Vision | Graphics".into(),
                weight: 0.75,
                justification: None,
            }],
            overall_score: 0.75,
            message: OutreachMessage {
                subject: "Internship inquiry".into(),
                body: "Dear Dr. Doe,\n\nHello.\n".into(),
            },
            document: "Cover letter text.".into(),
            meta: GenerationMeta {
                generated_at: Utc::now(),
                generator: "template".into(),
                analyzer: "keyword".into(),
                fallback: false,
            },
        }
    }

    #[test]
    fn renders_frontmatter_and_sections() {
        let md = render_output(1, &output());
        assert!(md.starts_with("---\nrank: 1\n"));
        assert!(md.contains("candidate: \"Dr. Jane \\\"JD\\\" Doe\""));
        assert!(md.contains("score: 0.75"));
        assert!(md.contains("| skill | Computer Vision | Vision \\| Graphics | 0.75 |"));
        assert!(md.contains("**Subject:** Internship inquiry"));
        assert!(md.ends_with("Cover letter text.\n"));
        assert!(!md.contains("fallback"));
    }

    #[test]
    fn empty_annotations_are_noted() {
        let mut out = output();
        out.annotations.clear();
        out.meta.fallback = true;
        let md = render_output(2, &out);
        assert!(md.contains("_No specific matches found._"));
        assert!(md.contains("fallback: true"));
    }

    #[test]
    fn file_stems_are_slugged() {
        assert_eq!(file_stem(3, "Dr. Jane Doe"), "03-dr-jane-doe");
        assert_eq!(file_stem(12, "***"), "12");
    }
}
