//! Wire contract for extraction replies.
//!
//! The model is instructed to return strict JSON, but real replies wander:
//! markdown fences, prose around the object, missing arrays, nulls. Parsing
//! tolerates all of those; anything worse degrades to an empty extraction
//! for the page rather than an error.

use serde::Deserialize;

/// Entities extracted from one logical page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageExtraction {
    pub skaters: Vec<ExtractedSkater>,
    pub spots: Vec<ExtractedSpot>,
    pub photographers: Vec<ExtractedPhotographer>,
    pub brands: Vec<ExtractedBrand>,
    pub tricks: Vec<ExtractedTrick>,
    pub events: Vec<ExtractedEvent>,
    pub locations: Vec<ExtractedLocation>,
}

impl PageExtraction {
    /// Total number of extracted items across all entity kinds.
    pub fn len(&self) -> usize {
        self.skaters.len()
            + self.spots.len()
            + self.photographers.len()
            + self.brands.len()
            + self.tricks.len()
            + self.events.len()
            + self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedSkater {
    pub name: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedSpot {
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "type")]
    pub spot_type: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedPhotographer {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedBrand {
    pub name: String,
    pub category: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedTrick {
    pub name: String,
    #[serde(rename = "performedBy", alias = "performed_by")]
    pub performed_by: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedEvent {
    pub name: String,
    pub date: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedLocation {
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Parse a raw model reply into a page extraction.
///
/// Strips a surrounding markdown code fence, then falls back to the
/// outermost brace span when the reply wraps the object in prose.
/// Returns `None` when no valid JSON object can be recovered.
pub fn parse_extraction(raw: &str) -> Option<PageExtraction> {
    let body = strip_code_fence(raw);
    if let Ok(parsed) = serde_json::from_str(body) {
        return Some(parsed);
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

/// Strip a surrounding ``` or ```json fence if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let raw = r#"{"skaters": [{"name": "Tony Hawk", "context": "feature"}]}"#;
        let parsed = parse_extraction(raw).unwrap();
        assert_eq!(parsed.skaters.len(), 1);
        assert_eq!(parsed.skaters[0].name, "Tony Hawk");
        assert_eq!(parsed.skaters[0].context.as_deref(), Some("feature"));
        // Missing arrays parse as empty
        assert!(parsed.spots.is_empty());
        assert!(parsed.tricks.is_empty());
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"photographers\": [{\"name\": \"Grant Brittain\"}]}\n```";
        let parsed = parse_extraction(raw).unwrap();
        assert_eq!(parsed.photographers.len(), 1);
        assert_eq!(parsed.photographers[0].name, "Grant Brittain");
    }

    #[test]
    fn test_parse_bare_fence() {
        let raw = "```\n{\"brands\": [{\"name\": \"Powell Peralta\", \"category\": \"decks\"}]}\n```";
        let parsed = parse_extraction(raw).unwrap();
        assert_eq!(parsed.brands[0].category.as_deref(), Some("decks"));
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let raw = "Here are the entities I found:\n{\"spots\": [{\"name\": \"EMB\", \"city\": \"San Francisco\"}]}\nLet me know if you need more.";
        let parsed = parse_extraction(raw).unwrap();
        assert_eq!(parsed.spots.len(), 1);
        assert_eq!(parsed.spots[0].city.as_deref(), Some("San Francisco"));
    }

    #[test]
    fn test_parse_malformed_returns_none() {
        assert!(parse_extraction("not json at all").is_none());
        assert!(parse_extraction("{\"skaters\": [").is_none());
        assert!(parse_extraction("").is_none());
    }

    #[test]
    fn test_parse_camel_case_trick_fields() {
        let raw = r#"{"tricks": [{"name": "kickflip", "performedBy": "Mark Gonzales", "location": "EMB"}]}"#;
        let parsed = parse_extraction(raw).unwrap();
        assert_eq!(parsed.tricks[0].performed_by.as_deref(), Some("Mark Gonzales"));
    }

    #[test]
    fn test_parse_nulls_and_type_rename() {
        let raw = r#"{"locations": [{"name": "San Francisco", "type": "city", "city": null, "state": "CA", "country": null}]}"#;
        let parsed = parse_extraction(raw).unwrap();
        let loc = &parsed.locations[0];
        assert_eq!(loc.location_type.as_deref(), Some("city"));
        assert!(loc.city.is_none());
        assert_eq!(loc.state.as_deref(), Some("CA"));
    }

    #[test]
    fn test_extraction_len() {
        let raw = r#"{"skaters": [{"name": "a"}, {"name": "b"}], "events": [{"name": "Tampa Pro"}]}"#;
        let parsed = parse_extraction(raw).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(!parsed.is_empty());
        assert!(PageExtraction::default().is_empty());
    }
}
