//! Positional placeholder substitution.
//!
//! The sentinel token is identical at every occurrence, so a field is
//! addressed by its ordinal (0-based order of appearance). Every edit is
//! computed against the original text: replacing one field must never
//! shift the ordinals of the others.

use std::collections::BTreeMap;

use serde::Serialize;

/// Accumulated field edits: ordinal → replacement value.
pub type FieldEditSet = BTreeMap<usize, String>;

/// One occurrence of the sentinel inside a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderField {
    pub ordinal: usize,
    /// Byte offset of the sentinel in the source text.
    pub offset: usize,
    /// Key written just before the sentinel (`"Na"` in `"Na: <sentinel>"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Number of sentinel occurrences in `text`.
pub fn count_placeholders(text: &str, sentinel: &str) -> usize {
    if sentinel.is_empty() {
        return 0;
    }
    text.matches(sentinel).count()
}

/// Replace the `ordinal`-th sentinel in `original` with `value`.
///
/// Out-of-range ordinals return `original` unchanged.
pub fn replace_field(original: &str, sentinel: &str, ordinal: usize, value: &str) -> String {
    if sentinel.is_empty() {
        return original.to_string();
    }
    let segments: Vec<&str> = original.split(sentinel).collect();
    if ordinal + 1 >= segments.len() {
        return original.to_string();
    }

    let mut out = String::with_capacity(original.len() + value.len());
    out.push_str(&segments[..=ordinal].join(sentinel));
    out.push_str(value);
    out.push_str(&segments[ordinal + 1..].join(sentinel));
    out
}

/// Apply every edit in `edits` to `original` in a single pass.
///
/// Ordinals without an edit keep their sentinel; ordinals past the last
/// occurrence are ignored.
pub fn replace_all(original: &str, sentinel: &str, edits: &FieldEditSet) -> String {
    if sentinel.is_empty() || edits.is_empty() {
        return original.to_string();
    }
    let segments: Vec<&str> = original.split(sentinel).collect();

    let mut out = String::with_capacity(original.len());
    out.push_str(segments[0]);
    for (ordinal, segment) in segments[1..].iter().enumerate() {
        match edits.get(&ordinal) {
            Some(value) => out.push_str(value),
            None => out.push_str(sentinel),
        }
        out.push_str(segment);
    }
    out
}

/// Locate every sentinel with its offset and the label preceding it.
pub fn locate(text: &str, sentinel: &str) -> Vec<PlaceholderField> {
    if sentinel.is_empty() {
        return Vec::new();
    }
    text.match_indices(sentinel)
        .enumerate()
        .map(|(ordinal, (offset, _))| PlaceholderField {
            ordinal,
            offset,
            label: label_before(&text[..offset]),
        })
        .collect()
}

/// Pull the key out of `"..., K: "` style prefixes on the current line.
fn label_before(prefix: &str) -> Option<String> {
    let line = prefix.rsplit('\n').next().unwrap_or(prefix);
    let clause = line
        .rsplit(|c: char| c == ',' || c == ';')
        .next()
        .unwrap_or(line);
    let (key, _) = clause.rsplit_once(':')?;
    let key = key
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
        .trim()
        .trim_matches('*')
        .trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S: &str = "Value_to_be_filled";
    const ELECTROLYTES: &str = "Na: Value_to_be_filled mmol/L, K: Value_to_be_filled mmol/L";

    fn edits(pairs: &[(usize, &str)]) -> FieldEditSet {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_replace_single_field() {
        assert_eq!(
            replace_field(ELECTROLYTES, S, 0, "140"),
            "Na: 140 mmol/L, K: Value_to_be_filled mmol/L"
        );
        assert_eq!(
            replace_field(ELECTROLYTES, S, 1, "4.0"),
            "Na: Value_to_be_filled mmol/L, K: 4.0 mmol/L"
        );
    }

    #[test]
    fn test_replace_all_against_original() {
        let out = replace_all(ELECTROLYTES, S, &edits(&[(0, "140"), (1, "4.0")]));
        assert_eq!(out, "Na: 140 mmol/L, K: 4.0 mmol/L");
    }

    #[test]
    fn test_out_of_range_ordinal_is_noop() {
        assert_eq!(replace_field(ELECTROLYTES, S, 2, "x"), ELECTROLYTES);
        assert_eq!(replace_all(ELECTROLYTES, S, &edits(&[(7, "x")])), ELECTROLYTES);
        assert_eq!(replace_field("no fields here", S, 0, "x"), "no fields here");
    }

    #[test]
    fn test_empty_edit_set_is_noop() {
        assert_eq!(replace_all(ELECTROLYTES, S, &FieldEditSet::new()), ELECTROLYTES);
    }

    #[test]
    fn test_sequential_edits_against_output_drift() {
        let text = "a=Value_to_be_filled b=Value_to_be_filled c=Value_to_be_filled";
        let combined = replace_all(text, S, &edits(&[(0, "1"), (1, "2")]));
        assert_eq!(combined, "a=1 b=2 c=Value_to_be_filled");

        // Editing the already-edited output shifts ordinal 1 onto `c`.
        let drifted = replace_field(&replace_field(text, S, 0, "1"), S, 1, "2");
        assert_eq!(drifted, "a=1 b=Value_to_be_filled c=2");
        assert_ne!(drifted, combined);
    }

    #[test]
    fn test_value_containing_sentinel() {
        let text = "a=Value_to_be_filled b=Value_to_be_filled c=Value_to_be_filled";
        let out = replace_all(text, S, &edits(&[(0, "Value_to_be_filled!"), (2, "3")]));
        assert_eq!(out, "a=Value_to_be_filled! b=Value_to_be_filled c=3");
    }

    #[test]
    fn test_order_independence() {
        let text = "x: Value_to_be_filled, y: Value_to_be_filled, z: Value_to_be_filled";
        let forward: FieldEditSet = edits(&[(1, "2"), (0, "1")]);
        let backward: FieldEditSet = edits(&[(0, "1"), (1, "2")]);
        assert_eq!(replace_all(text, S, &forward), replace_all(text, S, &backward));
        assert_eq!(
            replace_all(text, S, &forward),
            "x: 1, y: 2, z: Value_to_be_filled"
        );
    }

    #[test]
    fn test_fully_filled_reapply_is_idempotent() {
        let all = edits(&[(0, "140"), (1, "4.0")]);
        let once = replace_all(ELECTROLYTES, S, &all);
        assert_eq!(replace_all(&once, S, &all), once);
    }

    #[test]
    fn test_unicode_boundaries() {
        let text = "pO₂ → Value_to_be_filled kPa; Sättigung: Value_to_be_filled %";
        assert_eq!(
            replace_field(text, S, 1, "97"),
            "pO₂ → Value_to_be_filled kPa; Sättigung: 97 %"
        );
    }

    #[test]
    fn test_locate_labels() {
        let fields = locate(ELECTROLYTES, S);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].label.as_deref(), Some("Na"));
        assert_eq!(fields[1].label.as_deref(), Some("K"));
        assert_eq!(fields[0].offset, 4);

        let bulleted = locate("- **pH**: Value_to_be_filled\nValue_to_be_filled", S);
        assert_eq!(bulleted[0].label.as_deref(), Some("pH"));
        assert_eq!(bulleted[1].label, None);
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders(ELECTROLYTES, S), 2);
        assert_eq!(count_placeholders("", S), 0);
        assert_eq!(count_placeholders(ELECTROLYTES, ""), 0);
    }
}
