use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

const BOILERPLATE_SECTIONS: &[&str] = &[
    "References",
    "External links",
    "Further reading",
    "See also",
    "Notes",
];

/// Strip trailing boilerplate sections (`== References ==` and friends) and
/// replace every outgoing link with a `[CONCEPT_NN: Title]` marker.
///
/// Concept ids are assigned in first-occurrence (dedup) order — the first
/// link title encountered in `links` gets `CONCEPT_00`, the next new one
/// `CONCEPT_01`, and so on — so the ids a model sees are stable across runs
/// regardless of title length. Substitution itself walks the unique titles
/// longest-first so a short title (e.g. "Rust") can't clobber a substring of
/// a longer one that contains it (e.g. "Rust (programming language)") before
/// the longer one gets its turn.
pub fn anonymize(extract: &str, links: &[String]) -> (String, HashMap<String, String>) {
    let mut cleaned = extract.to_string();
    for section in BOILERPLATE_SECTIONS {
        cleaned = section_re(section).replace(&cleaned, "").into_owned();
    }

    let mut seen = std::collections::HashSet::new();
    let mut unique_links: Vec<String> = Vec::new();
    for link in links {
        if seen.insert(link.clone()) {
            unique_links.push(link.clone());
        }
    }

    let mapping: HashMap<String, String> = unique_links
        .iter()
        .enumerate()
        .map(|(i, title)| (format!("CONCEPT_{i:02}"), title.clone()))
        .collect();

    let mut substitution_order = unique_links.clone();
    substitution_order.sort_by_key(|b| std::cmp::Reverse(b.len()));

    let title_to_id: HashMap<&str, &str> = mapping
        .iter()
        .map(|(id, title)| (title.as_str(), id.as_str()))
        .collect();

    let mut anonymized = cleaned;
    for title in &substitution_order {
        let concept_id = title_to_id[title.as_str()];
        let pattern = word_boundary_re(title);
        let replacement = format!("[{concept_id}: {title}]");
        anonymized = pattern.replace_all(&anonymized, replacement.as_str()).into_owned();
    }

    (anonymized, mapping)
}

fn section_re(section: &str) -> Regex {
    RegexBuilder::new(&format!(r"== {} ==.*", regex::escape(section)))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("static boilerplate pattern always compiles")
}

fn word_boundary_re(title: &str) -> Regex {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(title)))
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|_| fallback_re())
}

fn fallback_re() -> Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?!x)x").unwrap()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_ids_follow_first_occurrence_not_length() {
        let links = vec![
            "Rust".to_string(),
            "Rust (programming language)".to_string(),
        ];
        let (_, mapping) = anonymize("irrelevant", &links);
        assert_eq!(mapping["CONCEPT_00"], "Rust");
        assert_eq!(mapping["CONCEPT_01"], "Rust (programming language)");
    }

    #[test]
    fn longer_title_substituted_before_its_substring() {
        let extract = "See Rust (programming language) for details, or just Rust.";
        let links = vec![
            "Rust".to_string(),
            "Rust (programming language)".to_string(),
        ];
        let (anonymized, _) = anonymize(extract, &links);
        assert!(anonymized.contains("[CONCEPT_01: Rust (programming language)]"));
        assert!(anonymized.contains("[CONCEPT_00: Rust]"));
        // The longer title must not have been chopped up by the shorter one.
        assert!(!anonymized.contains("[CONCEPT_00: Rust] (programming language)"));
    }

    #[test]
    fn duplicate_links_collapse_to_one_concept_id() {
        let extract = "Rust and Rust again.";
        let links = vec!["Rust".to_string(), "Rust".to_string()];
        let (anonymized, mapping) = anonymize(extract, &links);
        assert_eq!(mapping.len(), 1);
        assert_eq!(anonymized.matches("CONCEPT_00").count(), 2);
    }

    #[test]
    fn boilerplate_sections_are_stripped() {
        let extract = "Body text.\n== References ==\nSome citation.\n== External links ==\nmore junk";
        let (anonymized, _) = anonymize(extract, &[]);
        assert!(anonymized.starts_with("Body text."));
        assert!(!anonymized.contains("citation"));
    }

    #[test]
    fn case_insensitive_match() {
        let extract = "visit RUST today";
        let links = vec!["Rust".to_string()];
        let (anonymized, _) = anonymize(extract, &links);
        assert!(anonymized.contains("[CONCEPT_00: Rust]"));
    }
}
