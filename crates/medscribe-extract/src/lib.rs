//! Medscribe Extract: structure recovery for generated clinical reports.
//!
//! Pure, total functions over text: placeholder replacement, block
//! parsing, sectioning, action-item extraction and confidence scoring.
//! None of them fail; empty input yields empty output.

pub mod actions;
pub mod blocks;
pub mod confidence;
pub mod placeholder;
pub mod sections;

use serde::Serialize;

pub use actions::{
    extract, extract_with_report, ActionCategory, ActionItem, ActionPriority, CascadeTier,
    Extraction,
};
pub use blocks::{parse, parse_measurement, DocumentBlock, Measurement};
pub use confidence::estimate;
pub use placeholder::{
    count_placeholders, locate, replace_all, replace_field, FieldEditSet, PlaceholderField,
};
pub use sections::{split_sections, ReportSection};

/// Every projection of one report text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub blocks: Vec<DocumentBlock>,
    pub sections: Vec<ReportSection>,
    pub action_items: Vec<ActionItem>,
    pub cascade_tier: Option<CascadeTier>,
    pub truncated: bool,
    pub confidence: f64,
    pub placeholders: Vec<PlaceholderField>,
}

/// Run all projections on `text`.
pub fn analyze_all(text: &str, sentinel: &str) -> Analysis {
    let extraction = extract_with_report(text);
    Analysis {
        blocks: parse(text),
        sections: split_sections(text),
        action_items: extraction.items,
        cascade_tier: extraction.tier,
        truncated: extraction.truncated,
        confidence: estimate(text),
        placeholders: locate(text, sentinel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_all() {
        let text = "## Acid-Base Status\npH: 7.28\n- pCO2: Value_to_be_filled mmHg\n## Issue 1: Acidosis";
        let analysis = analyze_all(text, "Value_to_be_filled");
        assert_eq!(analysis.blocks.len(), 4);
        assert_eq!(analysis.sections.len(), 1);
        assert_eq!(analysis.action_items[0].title, "Acidosis");
        assert_eq!(analysis.cascade_tier, Some(CascadeTier::HeadedIssue));
        assert_eq!(analysis.placeholders.len(), 1);
        assert_eq!(analysis.placeholders[0].label.as_deref(), Some("pCO2"));
        assert!(analysis.confidence > 0.5);
    }

    #[test]
    fn test_analyze_empty() {
        let analysis = analyze_all("", "Value_to_be_filled");
        assert!(analysis.blocks.is_empty());
        assert!(analysis.action_items.is_empty());
        assert_eq!(analysis.confidence, 0.0);
    }
}
