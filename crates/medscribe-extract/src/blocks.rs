//! Line-oriented block parser for generated report text.
//!
//! Greedy and stateless: each non-blank line is classified on its own,
//! in input order, with no look-ahead and no merging. Blank lines are
//! dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Heading level for report titles (vendor banners, "Patient Report").
pub const TITLE_LEVEL: u8 = 1;
/// Heading level for section headings ending in `:`.
pub const SECTION_LEVEL: u8 = 2;

/// Words that turn a `Something:` line into a section heading.
const SECTION_VOCABULARY: &[&str] = &["parameters", "values", "status", "report", "analysis"];

/// Lines longer than this that end in `:` are headings, not keys.
const HEADING_MIN_CHARS: usize = 15;

/// Substrings marking a report title line.
const TITLE_MARKERS: &[&str] = &["Radiometer", "Patient Report", "Blood Gas Analysis Report"];

const BULLET_MARKER: &str = "- ";

/// One classified line of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentBlock {
    Heading {
        level: u8,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    KeyValue {
        key: String,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference_range: Option<String>,
    },
    BulletParameter {
        label: String,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        measurement: Option<Measurement>,
    },
    Paragraph {
        text: String,
    },
}

/// A value decomposed as `<number><unit> [reference range]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub numeric: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
}

static MEASUREMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([-+]?\d+(?:\.\d+)?)\s*([A-Za-z%/°µμ][^\[\(]*?)?\s*(?:[\[\(]([^\]\)]*)[\]\)])?$",
    )
    .unwrap()
});

static RANGE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:ref(?:erence)?(?:\s+range)?|normal(?:\s+range)?)\s*:?\s*").unwrap());

/// Parse report text into display blocks.
pub fn parse(text: &str) -> Vec<DocumentBlock> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(classify_line)
        .collect()
}

fn classify_line(line: &str) -> DocumentBlock {
    let bulleted = line.starts_with(BULLET_MARKER);

    if !bulleted && line.ends_with(':') && is_section_heading(line) {
        return DocumentBlock::Heading {
            level: SECTION_LEVEL,
            text: line.trim_end_matches(':').trim().to_string(),
        };
    }

    if let Some(rest) = line.strip_prefix(BULLET_MARKER) {
        let rest = rest.trim();
        return match rest.split_once(':') {
            Some((label, value)) => {
                let value = value.trim();
                DocumentBlock::BulletParameter {
                    label: label.trim().to_string(),
                    value: value.to_string(),
                    measurement: parse_measurement(value),
                }
            }
            None => DocumentBlock::Paragraph {
                text: rest.to_string(),
            },
        };
    }

    if let Some((key, value)) = line.split_once(':') {
        let value = value.trim();
        let measurement = parse_measurement(value);
        return DocumentBlock::KeyValue {
            key: key.trim().to_string(),
            value: value.to_string(),
            unit: measurement.as_ref().and_then(|m| m.unit.clone()),
            reference_range: measurement.and_then(|m| m.reference_range),
        };
    }

    if is_title(line) {
        return DocumentBlock::Heading {
            level: TITLE_LEVEL,
            text: line.to_string(),
        };
    }

    DocumentBlock::Paragraph {
        text: line.to_string(),
    }
}

fn is_section_heading(line: &str) -> bool {
    let lower = line.to_lowercase();
    SECTION_VOCABULARY.iter().any(|w| lower.contains(w))
        || line.chars().count() > HEADING_MIN_CHARS
}

fn is_title(line: &str) -> bool {
    let all_caps = line.chars().any(char::is_alphabetic) && !line.chars().any(char::is_lowercase);
    all_caps || TITLE_MARKERS.iter().any(|m| line.contains(m))
}

/// Decompose `"7.35 mmHg [7.35-7.45]"` style values.
///
/// Returns `None` when the value does not start with a number.
pub fn parse_measurement(value: &str) -> Option<Measurement> {
    let caps = MEASUREMENT_RE.captures(value.trim())?;
    let numeric = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .filter(|u| !u.is_empty());
    let reference_range = caps
        .get(3)
        .map(|m| RANGE_PREFIX_RE.replace(m.as_str().trim(), "").trim().to_string())
        .filter(|r| !r.is_empty());

    Some(Measurement {
        numeric,
        unit,
        reference_range,
    })
}
