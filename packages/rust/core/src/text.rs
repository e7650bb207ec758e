//! Token-level text comparison used by auto-scoping and keyword matching.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "based", "for", "from", "in", "into", "of", "on", "the", "to", "using",
    "via", "with",
];

/// Lowercased tokens; `+`, `#` and `.` inside a word are kept so "C++",
/// "C#" and "Next.js" survive.
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')))
        .map(|t| t.trim_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Tokens minus stopwords.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokens(text)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Whether `needle` occurs in `haystack` as a contiguous run of whole tokens.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = tokens(needle);
    if needle.is_empty() || needle.iter().all(|t| STOPWORDS.contains(&t.as_str())) {
        return false;
    }
    let haystack = tokens(haystack);
    haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Jaccard similarity of the content-token sets, in `[0, 1]`.
pub fn jaccard(a: &str, b: &str) -> f32 {
    let a: HashSet<String> = content_tokens(a).into_iter().collect();
    let b: HashSet<String> = content_tokens(b).into_iter().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    let union = a.union(&b).count();
    shared as f32 / union as f32
}

/// Content tokens the two strings have in common, in `a`'s order.
pub fn shared_tokens(a: &str, b: &str) -> Vec<String> {
    let b: HashSet<String> = content_tokens(b).into_iter().collect();
    let mut seen = HashSet::new();
    content_tokens(a)
        .into_iter()
        .filter(|t| b.contains(t) && seen.insert(t.clone()))
        .collect()
}

/// The sentence of `text` that contains `needle` as a phrase.
pub fn sentence_containing<'a>(text: &'a str, needle: &str) -> Option<&'a str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty() && contains_phrase(s, needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_keep_language_names() {
        assert_eq!(tokens("C++, Next.js and C#."), vec!["c++", "next.js", "and", "c#"]);
    }

    #[test]
    fn phrase_matching_is_whole_word() {
        assert!(contains_phrase("Deep Learning for Computer Vision", "computer vision"));
        assert!(!contains_phrase("Computational Visionaries", "vision"));
        assert!(!contains_phrase("Robotics", "R"));
        assert!(!contains_phrase("anything", "and the"));
    }

    #[test]
    fn jaccard_ignores_stopwords() {
        assert!((jaccard("Graph Neural Networks", "Networks of Graph Models") - 0.5).abs() < 1e-6);
        assert_eq!(jaccard("", "x"), 0.0);
        assert_eq!(shared_tokens("Graph Neural Networks", "networks of graphs"), vec!["networks"]);
    }

    #[test]
    fn sentences_are_found() {
        let bio = "She leads the robotics lab. Her group studies Computer Vision for drones!";
        assert_eq!(
            sentence_containing(bio, "computer vision"),
            Some("Her group studies Computer Vision for drones")
        );
        assert_eq!(sentence_containing(bio, "compilers"), None);
    }
}
