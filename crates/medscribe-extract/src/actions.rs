//! Action-item extraction cascade.
//!
//! Generated plans do not follow a stable format, so extraction tries a
//! fixed sequence of strategies and keeps the first one that yields any
//! item. The last tier always yields four generic items, which makes
//! every non-empty input produce usable output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::sections::clean_title;

/// Numbered and bulleted tiers keep at most this many matches.
pub const LIST_ITEM_CAP: usize = 5;
/// The generic-heading tier keeps at most this many matches.
pub const HEADING_CAP: usize = 8;

const LIST_TEXT_CHARS: (usize, usize) = (10, 100);
const HEADING_TEXT_CHARS: (usize, usize) = (5, 80);
const HEADING_MIN_TITLE_CHARS: usize = 6;
const HEADING_EXCLUDED: &[&str] = &["summary", "action plan"];

const SEVERITY_GLYPHS: &str = r"(?:🔴|🟠|🟡|⚠\x{FE0F}?|❗|‼\x{FE0F}?|🚨)";

static SEVERITY_HEADED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?im)^[ \t]*#{{1,6}}[ \t]*{}[ \t]*\**[ \t]*Issue[ \t]+\d+[ \t]*:[ \t]*(.+)$",
        SEVERITY_GLYPHS
    ))
    .unwrap()
});

static SEVERITY_BARE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?im)^[ \t]*{}[ \t]*\**[ \t]*Issue[ \t]+\d+[ \t]*:[ \t]*(.+)$",
        SEVERITY_GLYPHS
    ))
    .unwrap()
});

static PLAIN_ISSUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\**Issue[ \t]+\d+[ \t]*:[ \t]*(.+)$").unwrap());

static HEADED_ISSUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*#{1,6}[ \t]*\**[ \t]*Issue[^:\n]*:[ \t]*(.+)$").unwrap());

static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+(.+)$").unwrap());

static BULLETED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*•]\s+(.+)$").unwrap());

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Immediate,
    Monitoring,
    Medication,
    Diagnostic,
    Followup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Critical,
    High,
    Medium,
    Low,
}

/// A discrete, categorized step derived from free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionItem {
    /// Positional ID, stable for identical input.
    pub id: String,
    pub title: String,
    pub category: ActionCategory,
    pub priority: ActionPriority,
    pub content: String,
}

/// Which cascade tier produced the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CascadeTier {
    SeverityHeadedIssue,
    SeverityIssue,
    PlainIssue,
    HeadedIssue,
    NumberedList,
    BulletedList,
    Headings,
    Fallback,
}

/// Cascade result with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub items: Vec<ActionItem>,
    /// `None` only for empty input.
    pub tier: Option<CascadeTier>,
    /// A capped tier dropped matches past its cap.
    pub truncated: bool,
}

/// Extract action items from `text`.
pub fn extract(text: &str) -> Vec<ActionItem> {
    extract_with_report(text).items
}

/// Extract action items and report which tier fired.
pub fn extract_with_report(text: &str) -> Extraction {
    if text.trim().is_empty() {
        return Extraction {
            items: Vec::new(),
            tier: None,
            truncated: false,
        };
    }

    let issue_tiers: [(CascadeTier, &Regex); 4] = [
        (CascadeTier::SeverityHeadedIssue, &*SEVERITY_HEADED_RE),
        (CascadeTier::SeverityIssue, &*SEVERITY_BARE_RE),
        (CascadeTier::PlainIssue, &*PLAIN_ISSUE_RE),
        (CascadeTier::HeadedIssue, &*HEADED_ISSUE_RE),
    ];
    for (tier, re) in issue_tiers {
        let items = issue_items(text, re);
        if !items.is_empty() {
            return finish(tier, items, false);
        }
    }

    let (items, truncated) = list_items(text, &NUMBERED_RE, "numbered", ActionPriority::High);
    if !items.is_empty() {
        return finish(CascadeTier::NumberedList, items, truncated);
    }

    let (items, truncated) = list_items(text, &BULLETED_RE, "bullet", ActionPriority::Medium);
    if !items.is_empty() {
        return finish(CascadeTier::BulletedList, items, truncated);
    }

    let (items, truncated) = heading_items(text);
    if !items.is_empty() {
        return finish(CascadeTier::Headings, items, truncated);
    }

    finish(CascadeTier::Fallback, fallback_items(), false)
}

fn finish(tier: CascadeTier, items: Vec<ActionItem>, truncated: bool) -> Extraction {
    debug!(
        "Action cascade: tier={:?}, items={}, truncated={}",
        tier,
        items.len(),
        truncated
    );
    Extraction {
        items,
        tier: Some(tier),
        truncated,
    }
}

fn issue_items(text: &str, re: &Regex) -> Vec<ActionItem> {
    re.captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| clean_title(m.as_str())))
        .filter(|title| !title.is_empty())
        .enumerate()
        .map(|(i, title)| ActionItem {
            id: format!("issue-{}", i + 1),
            content: format!(
                "Address {} with immediate interventions and monitoring",
                title.to_lowercase()
            ),
            title,
            category: ActionCategory::Immediate,
            priority: ActionPriority::Critical,
        })
        .collect()
}

fn list_items(
    text: &str,
    re: &Regex,
    prefix: &str,
    priority: ActionPriority,
) -> (Vec<ActionItem>, bool) {
    let matches: Vec<String> = text
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|t| char_len_within(t, LIST_TEXT_CHARS))
        .collect();
    let truncated = matches.len() > LIST_ITEM_CAP;

    let items = matches
        .into_iter()
        .take(LIST_ITEM_CAP)
        .enumerate()
        .map(|(i, title)| ActionItem {
            id: format!("{}-{}", prefix, i + 1),
            content: title.clone(),
            title,
            category: ActionCategory::Immediate,
            priority,
        })
        .collect();
    (items, truncated)
}

fn heading_items(text: &str) -> (Vec<ActionItem>, bool) {
    let matches: Vec<String> = text
        .lines()
        .filter_map(|line| HEADING_RE.captures(line.trim()))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|t| char_len_within(t, HEADING_TEXT_CHARS))
        .collect();
    let truncated = matches.len() > HEADING_CAP;

    let items = matches
        .into_iter()
        .take(HEADING_CAP)
        .map(|raw| clean_title(&raw))
        .filter(|title| {
            let lower = title.to_lowercase();
            title.chars().count() >= HEADING_MIN_TITLE_CHARS
                && !HEADING_EXCLUDED.iter().any(|x| lower.contains(x))
        })
        .enumerate()
        .map(|(i, title)| {
            let (category, priority) = if i < 2 {
                (ActionCategory::Immediate, ActionPriority::High)
            } else {
                (ActionCategory::Monitoring, ActionPriority::Medium)
            };
            ActionItem {
                id: format!("heading-{}", i + 1),
                content: title.clone(),
                title,
                category,
                priority,
            }
        })
        .collect();
    (items, truncated)
}

fn fallback_items() -> Vec<ActionItem> {
    let fixed = [
        (
            "Review blood gas interpretation",
            "Review the interpretation and correlate with the clinical picture",
            ActionCategory::Diagnostic,
            ActionPriority::High,
        ),
        (
            "Implement treatment plan",
            "Start the interventions recommended in the report",
            ActionCategory::Immediate,
            ActionPriority::High,
        ),
        (
            "Monitoring and follow-up",
            "Repeat measurements and reassess the patient at defined intervals",
            ActionCategory::Monitoring,
            ActionPriority::Medium,
        ),
        (
            "Assess complications and risks",
            "Screen for complications and escalate care when risk increases",
            ActionCategory::Immediate,
            ActionPriority::High,
        ),
    ];
    fixed
        .iter()
        .enumerate()
        .map(|(i, (title, content, category, priority))| ActionItem {
            id: format!("fallback-{}", i + 1),
            title: title.to_string(),
            category: *category,
            priority: *priority,
            content: content.to_string(),
        })
        .collect()
}

fn char_len_within(s: &str, (min, max): (usize, usize)) -> bool {
    let n = s.chars().count();
    n >= min && n <= max
}
