use crate::types::{ElementInfo, LocatorKind};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Where a suggested locator was derived from, in descending stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Id,
    DataAttribute,
    Role,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSuggestion {
    pub locator: String,
    pub kind: LocatorKind,
    /// Lower ranks are more stable.
    pub rank: u8,
    pub source: SuggestionSource,
    pub note: String,
}

/// Attributes treated as test hooks, preferred over arbitrary data ones.
const TEST_ATTRIBUTES: &[&str] = &["data-testid", "data-test", "data-qa", "data-cy"];

const MAX_TEXT_NEEDLE: usize = 40;

/// Propose more stable locator candidates for a drifting element, ordered
/// id-based > data-attribute > role-based > text-based. Candidates are for a
/// human to review and promote into the selector registry.
pub fn suggest_selectors(info: &ElementInfo) -> Vec<SelectorSuggestion> {
    let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("static regex");
    let mut suggestions = Vec::new();

    if let Some(id) = info.element_id.as_deref().filter(|id| ident.is_match(id)) {
        push_css(
            &mut suggestions,
            format!("#{}", id),
            1,
            SuggestionSource::Id,
            "unique id, most stable",
        );
    }

    // Test-hook attributes first, then any remaining data-* attribute
    for attr in TEST_ATTRIBUTES {
        if let Some(value) = info.attributes.get(*attr) {
            push_css(
                &mut suggestions,
                format!("{}[{}=\"{}\"]", info.tag_name, attr, escape_value(value)),
                2,
                SuggestionSource::DataAttribute,
                "test hook attribute",
            );
        }
    }
    for (attr, value) in &info.attributes {
        if attr.starts_with("data-") && !TEST_ATTRIBUTES.contains(&attr.as_str()) {
            push_css(
                &mut suggestions,
                format!("{}[{}=\"{}\"]", info.tag_name, attr, escape_value(value)),
                2,
                SuggestionSource::DataAttribute,
                "data attribute",
            );
        }
    }

    if let Some(role) = info.attributes.get("role") {
        let mut locator = format!("{}[role=\"{}\"]", info.tag_name, escape_value(role));
        if let Some(label) = info.attributes.get("aria-label") {
            locator = format!(
                "{}[role=\"{}\"][aria-label=\"{}\"]",
                info.tag_name,
                escape_value(role),
                escape_value(label)
            );
        }
        push_css(
            &mut suggestions,
            locator,
            3,
            SuggestionSource::Role,
            "role-based, survives class churn",
        );
    } else if let Some(label) = info.attributes.get("aria-label") {
        push_css(
            &mut suggestions,
            format!("{}[aria-label=\"{}\"]", info.tag_name, escape_value(label)),
            3,
            SuggestionSource::Role,
            "aria label",
        );
    }

    if let Some(text) = info
        .text_content
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        let needle: String = text.chars().take(MAX_TEXT_NEEDLE).collect();
        suggestions.push(SelectorSuggestion {
            locator: format!(
                "//{}[normalize-space(text())=\"{}\"]",
                info.tag_name,
                needle.replace('"', "\\\"")
            ),
            kind: LocatorKind::XPath,
            rank: 4,
            source: SuggestionSource::Text,
            note: "text-based, least stable".to_string(),
        });
    }

    suggestions.sort_by_key(|s| s.rank);
    suggestions
}

fn push_css(
    suggestions: &mut Vec<SelectorSuggestion>,
    locator: String,
    rank: u8,
    source: SuggestionSource,
    note: &str,
) {
    // Only emit candidates scraper can actually parse
    if scraper::Selector::parse(&locator).is_ok() {
        suggestions.push(SelectorSuggestion {
            locator,
            kind: LocatorKind::Css,
            rank,
            source,
            note: note.to_string(),
        });
    }
}

fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button() -> ElementInfo {
        let mut info = ElementInfo::new("button");
        info.element_id = Some("submit-order".to_string());
        info.attributes
            .insert("data-testid".to_string(), "submit".to_string());
        info.attributes
            .insert("role".to_string(), "button".to_string());
        info.text_content = Some("Submit Order".to_string());
        info
    }

    #[test]
    fn stability_order_id_data_role_text() {
        let suggestions = suggest_selectors(&button());
        let sources: Vec<SuggestionSource> = suggestions.iter().map(|s| s.source).collect();
        assert_eq!(
            sources,
            vec![
                SuggestionSource::Id,
                SuggestionSource::DataAttribute,
                SuggestionSource::Role,
                SuggestionSource::Text,
            ]
        );
        assert_eq!(suggestions[0].locator, "#submit-order");
        assert_eq!(suggestions[1].locator, "button[data-testid=\"submit\"]");
    }

    #[test]
    fn invalid_id_is_skipped() {
        let mut info = button();
        info.element_id = Some("123 bad id".to_string());
        let suggestions = suggest_selectors(&info);
        assert!(suggestions.iter().all(|s| s.source != SuggestionSource::Id));
    }

    #[test]
    fn text_suggestion_is_xpath() {
        let suggestions = suggest_selectors(&button());
        let text = suggestions
            .iter()
            .find(|s| s.source == SuggestionSource::Text)
            .unwrap();
        assert_eq!(text.kind, LocatorKind::XPath);
        assert!(text.locator.contains("Submit Order"));
    }

    #[test]
    fn bare_element_yields_nothing() {
        let info = ElementInfo::new("div");
        assert!(suggest_selectors(&info).is_empty());
    }
}
