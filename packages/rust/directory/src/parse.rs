//! HTML field extraction for faculty directory pages.
//!
//! Three page shapes are understood:
//! - the faculty index (`/faclistbydepartment`): a table of name, department, designation
//! - a department page (`/department/{code}`): one card per faculty member
//! - a faculty profile page: bio, research areas, contact links

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use outreach_shared::CandidateRecord;

/// Bio text is truncated to this many characters.
pub const MAX_BIO_CHARS: usize = 2000;

/// At most this many research areas are read from a profile page.
pub const MAX_RESEARCH_AREAS: usize = 10;

static FACULTY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="/faculty/"]"#).expect("valid selector"));
static NAME_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.hndg").expect("valid selector"));
static ANY_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("valid selector"));
static DESIGNATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.tx22 i").expect("valid selector"));
static TABLE_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h4, h3").expect("valid selector"));
static MAILTO: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href^="mailto:"]"#).expect("valid selector"));
static TEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href^="tel:"]"#).expect("valid selector"));
static BIO: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#biosketch, .bio-sketch, .tab-pane.active").expect("valid selector")
});
static RESEARCH_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[class*="research"]"#).expect("valid selector"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid regex")
});
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\b").expect("valid regex"));
static RESEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Research Area\(s\)\s*:\s*(.+)").expect("valid regex"));
static DEPT_IN_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/department/([A-Za-z]{2})(?:/|$)").expect("valid regex"));

// ---------------------------------------------------------------------------
// Department page
// ---------------------------------------------------------------------------

/// Parse the faculty cards of one department page.
///
/// Cards are `<a>` elements linking to `/faculty/` pages. Cards without a
/// usable name are skipped; duplicate profile links keep the first card.
pub fn parse_department_listing(html: &str, base: &Url, code: &str) -> Vec<CandidateRecord> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for card in doc.select(&FACULTY_LINK) {
        let Some(profile_url) = card.value().attr("href").and_then(|h| resolve(base, h)) else {
            continue;
        };
        let Some(name) = card_name(card) else {
            continue;
        };
        if !seen.insert(profile_url.clone()) {
            continue;
        }

        let text = card.text().collect::<Vec<_>>().join("\n");
        let designation = card
            .select(&DESIGNATION)
            .next()
            .map(element_text)
            .unwrap_or_default();

        records.push(CandidateRecord {
            name,
            profile_url,
            department: code.to_string(),
            designation,
            email: EMAIL_RE.find(&text).map(|m| m.as_str().to_string()),
            phone: PHONE_RE.find(&text).map(|m| m.as_str().to_string()),
            personal_webpage: None,
            research_areas: research_areas_from_text(&text),
            bio: None,
        });
    }

    records
}

fn card_name(card: ElementRef<'_>) -> Option<String> {
    let name = card
        .select(&NAME_SPAN)
        .next()
        .map(element_text)
        .or_else(|| {
            card.select(&ANY_SPAN)
                .map(element_text)
                .find(|t| t.chars().count() > 3 && !t.contains('@'))
        })
        .unwrap_or_else(|| element_text(card));

    (name.chars().count() >= 2 && !name.contains('@')).then_some(name)
}

fn research_areas_from_text(text: &str) -> Vec<String> {
    RESEARCH_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| split_areas(m.as_str()))
        .unwrap_or_default()
}

fn split_areas(line: &str) -> Vec<String> {
    line.split(';')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Faculty index
// ---------------------------------------------------------------------------

/// Parse the faculty index table (`name | department | designation`).
///
/// The department code is read from the profile link path
/// (`/department/{code}/faculty/...`).
pub fn parse_index(html: &str, base: &Url) -> Vec<CandidateRecord> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for row in doc.select(&TABLE_ROW) {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        let Some(first) = cells.first() else {
            continue;
        };
        let Some(link) = first.select(&LINK).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(code) = department_from_path(href) else {
            continue;
        };
        let Some(profile_url) = resolve(base, href) else {
            continue;
        };
        let name = element_text(link);
        if name.is_empty() || !seen.insert(profile_url.clone()) {
            continue;
        }

        records.push(CandidateRecord {
            name,
            profile_url,
            department: code,
            designation: cells.get(2).map(|c| element_text(*c)).unwrap_or_default(),
            email: None,
            phone: None,
            personal_webpage: None,
            research_areas: Vec::new(),
            bio: None,
        });
    }

    records
}

/// Extract the upper-cased department code from a `/department/{code}/...` path.
pub fn department_from_path(href: &str) -> Option<String> {
    DEPT_IN_PATH_RE
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Profile page
// ---------------------------------------------------------------------------

/// Fields read from a faculty profile page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub research_areas: Vec<String>,
    pub personal_webpage: Option<String>,
}

impl ProfileDetails {
    /// Fill the fields `record` is missing. Listing data wins over page data.
    pub fn merge_into(self, record: &mut CandidateRecord) {
        if record.name.trim().is_empty() {
            if let Some(name) = self.name {
                record.name = name;
            }
        }
        if record.email.is_none() {
            record.email = self.email;
        }
        if record.phone.is_none() {
            record.phone = self.phone;
        }
        if record.bio.is_none() {
            record.bio = self.bio;
        }
        if record.research_areas.is_empty() {
            record.research_areas = self.research_areas;
        }
        if record.personal_webpage.is_none() {
            record.personal_webpage = self.personal_webpage;
        }
    }
}

/// Parse a faculty profile page.
pub fn parse_profile_page(html: &str, page_url: &Url) -> ProfileDetails {
    let doc = Html::parse_document(html);

    let name = doc
        .select(&HEADING)
        .map(element_text)
        .find(|t| !t.is_empty());

    let email = doc
        .select(&MAILTO)
        .filter_map(|a| a.value().attr("href"))
        .map(|h| h.trim_start_matches("mailto:").trim().to_string())
        .find(|e| e.contains('@'));

    let phone = doc
        .select(&TEL)
        .filter_map(|a| a.value().attr("href"))
        .map(|h| h.trim_start_matches("tel:").trim().to_string())
        .find(|p| !p.is_empty());

    let bio = doc
        .select(&BIO)
        .map(element_text)
        .find(|t| !t.is_empty())
        .map(|t| truncate_chars(&t, MAX_BIO_CHARS));

    let mut research_areas: Vec<String> = Vec::new();
    for area in doc.select(&RESEARCH_LINK).map(element_text) {
        if !area.is_empty() && !research_areas.contains(&area) {
            research_areas.push(area);
        }
        if research_areas.len() == MAX_RESEARCH_AREAS {
            break;
        }
    }

    let personal_webpage = doc
        .select(&LINK)
        .find(|a| element_text(*a).contains("Personal Webpage"))
        .and_then(|a| a.value().attr("href"))
        .and_then(|h| resolve(page_url, h));

    ProfileDetails {
        name,
        email,
        phone,
        bio,
        research_areas,
        personal_webpage,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Element text with whitespace collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
