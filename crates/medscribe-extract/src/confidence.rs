//! Completeness score for an extracted blood-gas document.
//!
//! Starts from 0.5 and adds bonuses for reference parameters, numeric
//! density, measurement units and key/value structure. Always in `[0, 1]`.

use once_cell::sync::Lazy;
use regex::Regex;

const BASE_SCORE: f64 = 0.5;
const KEY_PARAM_WEIGHT: f64 = 0.3;
const BONUS: f64 = 0.1;
const MIN_NUMERIC_TOKENS: usize = 5;

static KEY_PARAMS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"\bpH\b", r"\bpCO2\b", r"\bpO2\b", r"\bHCO3", r"\bbicarbonate\b", r"\bbase\s+excess\b"]
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
});

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

static UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+(?:\.\d+)?\s+(?:mmHg|kPa|mEq|mmol)").unwrap());

static KEY_VALUE_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\w[\w\s]*:\s*\d").unwrap());

/// Score how complete `text` looks as a blood-gas extraction.
pub fn estimate(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut score = BASE_SCORE;

    let found = KEY_PARAMS.iter().filter(|re| re.is_match(text)).count();
    score += KEY_PARAM_WEIGHT * (found as f64 / KEY_PARAMS.len() as f64);

    if NUMBER_RE.find_iter(text).count() > MIN_NUMERIC_TOKENS {
        score += BONUS;
    }
    if UNIT_RE.is_match(text) {
        score += BONUS;
    }
    if text.contains(':') || text.contains('=') || KEY_VALUE_LINE_RE.is_match(text) {
        score += BONUS;
    }

    score.clamp(0.0, 1.0)
}
