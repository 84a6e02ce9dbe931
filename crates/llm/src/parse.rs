use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use wb_domain::model::ParsingMethod;

/// The schema a structured-output provider is asked to fill in.
#[derive(Debug, Deserialize)]
struct StructuredChoice {
    intuition: String,
    chosen_concept_id: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

fn strict_click_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)NEXT_CLICK:\s*(CONCEPT_\d+)").unwrap())
}

fn bare_concept_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"CONCEPT_\d+").unwrap())
}

fn concept_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^CONCEPT_\d+$").unwrap())
}

/// The result of reducing a model's free-text reply to a single concept id.
pub struct ParsedChoice {
    pub intuition: Option<String>,
    pub concept_id: Option<String>,
    pub confidence: f64,
    pub method: ParsingMethod,
}

/// Try, in order: a schema-validated JSON object embedded in the reply, the
/// strict `NEXT_CLICK: CONCEPT_NN` marker, and finally a bare `CONCEPT_NN`
/// scan. Each tier requires the recovered id to be one of `available_concepts`
/// — an id that isn't on the page is as good as no id at all.
pub fn parse_response(content: &str, available_concepts: &HashMap<String, String>) -> ParsedChoice {
    if let Some(choice) = try_parse_structured(content) {
        if available_concepts.contains_key(&choice.chosen_concept_id) {
            return ParsedChoice {
                intuition: Some(choice.intuition),
                concept_id: Some(choice.chosen_concept_id),
                confidence: choice.confidence.clamp(0.0, 1.0),
                method: ParsingMethod::Structured,
            };
        }
    }

    if let Some(caps) = strict_click_re().captures(content) {
        let id = caps[1].to_uppercase();
        if available_concepts.contains_key(&id) {
            return ParsedChoice {
                intuition: Some(content.trim().to_string()),
                concept_id: Some(id),
                confidence: default_confidence(),
                method: ParsingMethod::Regex,
            };
        }
    }

    if let Some(id) = bare_concept_re()
        .find_iter(content)
        .map(|m| m.as_str().to_uppercase())
        .find(|id| available_concepts.contains_key(id))
    {
        return ParsedChoice {
            intuition: Some(content.trim().to_string()),
            concept_id: Some(id),
            confidence: default_confidence(),
            method: ParsingMethod::LegacyRegex,
        };
    }

    ParsedChoice {
        intuition: Some(content.trim().to_string()),
        concept_id: None,
        confidence: 0.0,
        method: ParsingMethod::Failed,
    }
}

/// Scan `content` for the first syntactically balanced `{...}` object and
/// attempt to deserialize it as a [`StructuredChoice`]. Providers routinely
/// wrap their JSON in prose or markdown fences, so a naive
/// `serde_json::from_str(content)` would fail far more often than it should.
fn try_parse_structured(content: &str) -> Option<StructuredChoice> {
    let bytes = content.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{')?;

    let mut depth = 0i32;
    let mut end = None;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;

    let candidate = &content[start..=end];
    let mut choice: StructuredChoice = serde_json::from_str(candidate).ok()?;
    choice.chosen_concept_id = choice.chosen_concept_id.to_uppercase();

    if !concept_id_re().is_match(&choice.chosen_concept_id) {
        return None;
    }
    Some(choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concepts() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("CONCEPT_00".into(), "Rust (programming language)".into());
        m.insert("CONCEPT_01".into(), "Mozilla".into());
        m
    }

    #[test]
    fn structured_json_wins_over_everything_else() {
        let content = r#"I'll go with this one.
        {"intuition": "Mozilla funds Rust", "chosen_concept_id": "CONCEPT_01", "confidence": 0.9}
        NEXT_CLICK: CONCEPT_00"#;
        let parsed = parse_response(content, &concepts());
        assert_eq!(parsed.method, ParsingMethod::Structured);
        assert_eq!(parsed.concept_id.as_deref(), Some("CONCEPT_01"));
        assert!((parsed.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_strict_regex_when_json_is_unusable() {
        let content = "My intuition is that Mozilla is related.\nNEXT_CLICK: CONCEPT_01";
        let parsed = parse_response(content, &concepts());
        assert_eq!(parsed.method, ParsingMethod::Regex);
        assert_eq!(parsed.concept_id.as_deref(), Some("CONCEPT_01"));
    }

    #[test]
    fn falls_back_to_bare_scan_when_marker_missing() {
        let content = "I think CONCEPT_00 is the best next step.";
        let parsed = parse_response(content, &concepts());
        assert_eq!(parsed.method, ParsingMethod::LegacyRegex);
        assert_eq!(parsed.concept_id.as_deref(), Some("CONCEPT_00"));
    }

    #[test]
    fn unknown_concept_id_is_rejected_at_every_tier() {
        let content = "NEXT_CLICK: CONCEPT_99";
        let parsed = parse_response(content, &concepts());
        assert_eq!(parsed.method, ParsingMethod::Failed);
        assert!(parsed.concept_id.is_none());
    }

    #[test]
    fn structured_json_with_unknown_id_falls_through() {
        let content = r#"{"intuition": "x", "chosen_concept_id": "CONCEPT_99", "confidence": 0.5} NEXT_CLICK: CONCEPT_00"#;
        let parsed = parse_response(content, &concepts());
        assert_eq!(parsed.method, ParsingMethod::Regex);
    }
}
