//! Partition a report at `##` / `###` headings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Generic report titles that carry no content of their own.
const BOILERPLATE_TITLES: &[&str] = &[
    "blood gas analysis report",
    "blood gas interpretation",
    "arterial blood gas interpretation",
];

static SECTION_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{2,3}(?:\s+|$)").unwrap());

/// A titled slice of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

/// Split `text` into titled sections.
///
/// Text before the first header has no title and is dropped, as are
/// boilerplate title sections and sections whose title or body is empty.
pub fn split_sections(text: &str) -> Vec<ReportSection> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(m) = SECTION_HEADER_RE.find(trimmed) {
            if let Some((title, body)) = current.take() {
                push_section(&mut sections, title, &body);
            }
            current = Some((clean_title(&trimmed[m.end()..]), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((title, body)) = current {
        push_section(&mut sections, title, &body);
    }

    sections
}

fn push_section(sections: &mut Vec<ReportSection>, title: String, body: &[&str]) {
    let body = body.join("\n").trim().to_string();
    if title.is_empty() || body.is_empty() || is_boilerplate(&title) {
        return;
    }
    sections.push(ReportSection { title, body });
}

/// Strip emphasis markup and a trailing colon from a header title.
pub(crate) fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '_')
        .trim()
        .trim_end_matches(':')
        .trim_matches(|c: char| c == '*' || c == '_')
        .trim()
        .to_string()
}

fn is_boilerplate(title: &str) -> bool {
    let lower = title.to_lowercase();
    BOILERPLATE_TITLES.iter().any(|b| lower == *b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sections() {
        let text = "Preamble line\n\
                    ## **Blood Gas Interpretation**\n\
                    Generic intro\n\
                    ## **Acid-Base Status**\n\
                    Metabolic acidosis.\n\
                    ### Oxygenation:\n\
                    Hypoxemia present.\n\
                    Needs O2.\n\
                    ## Empty\n\
                    \n\
                    ## \n\
                    orphan body";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Acid-Base Status");
        assert_eq!(sections[0].body, "Metabolic acidosis.");
        assert_eq!(sections[1].title, "Oxygenation");
        assert_eq!(sections[1].body, "Hypoxemia present.\nNeeds O2.");
    }

    #[test]
    fn test_single_and_deep_hashes_do_not_split() {
        let sections = split_sections("## Plan\n# Not a split\n#### Nor this\nbody");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].body, "# Not a split\n#### Nor this\nbody");
    }

    #[test]
    fn test_no_headers() {
        assert!(split_sections("just text\nmore text").is_empty());
        assert!(split_sections("").is_empty());
    }
}
