use wb_domain::model::WikiPage;

use crate::types::ChatMessage;

/// Build the message list for one model turn.
///
/// `history_titles` is the ordered list of page titles visited this run,
/// oldest first, ending with the current page (bounded to the engine's
/// history window). Only the titles *before* the current page are ever
/// rendered — the current page is already shown in full below.
pub fn build_messages(
    target_page: &str,
    page: &WikiPage,
    history_titles: &[String],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt(target_page))];

    if history_titles.len() > 1 {
        let preceding = &history_titles[..history_titles.len() - 1];
        messages.push(ChatMessage::system(format!(
            "Pages visited so far: {}",
            preceding.join(" -> ")
        )));
    }

    messages.push(ChatMessage::user(user_prompt(page)));

    messages
}

/// Flatten a built message list into one string for archival — the step
/// trace records what was actually sent, not just the pieces.
pub fn render_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("[{:?}] {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn system_prompt(target_page: &str) -> String {
    format!(
        "You are playing the Wiki Game. Your goal is to navigate from the \
         current Wikipedia page to the page titled \"{target_page}\" by \
         clicking links, one at a time.\n\n\
         Every link on the page has been replaced with a concept id in the \
         form CONCEPT_00, CONCEPT_01, and so on. You must choose exactly one \
         concept id to click next from the ones listed on the current page. \
         Never invent a concept id that wasn't listed.\n\n\
         Think briefly about why each candidate link moves you closer to or \
         further from the target, then commit to one.",
    )
}

fn user_prompt(page: &WikiPage) -> String {
    let mut concept_ids: Vec<&String> = page.mapping.keys().collect();
    concept_ids.sort();

    let concept_list = concept_ids
        .iter()
        .map(|id| format!("- {}: {}", id, page.mapping[*id]))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Current page: {}\n\n{}\n\nAvailable links on this page:\n{}\n\n\
         Reply with your intuition, then end your message with a line of the \
         exact form:\nNEXT_CLICK: CONCEPT_NN",
        page.title, page.extract, concept_list
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_page() -> WikiPage {
        let mut mapping = HashMap::new();
        mapping.insert("CONCEPT_00".to_string(), "Rust (programming language)".to_string());
        mapping.insert("CONCEPT_01".to_string(), "Mozilla".to_string());
        WikiPage {
            title: "Rust".to_string(),
            extract: "Rust is [CONCEPT_00: Rust (programming language)], backed by [CONCEPT_01: Mozilla].".to_string(),
            links: vec!["Rust (programming language)".into(), "Mozilla".into()],
            mapping,
        }
    }

    #[test]
    fn single_history_entry_is_not_rendered() {
        let page = sample_page();
        let messages = build_messages("Mozilla", &page, &["Rust".to_string()]);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn multi_history_adds_a_system_message() {
        let page = sample_page();
        let messages = build_messages(
            "Mozilla",
            &page,
            &["Start".to_string(), "Rust".to_string()],
        );
        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.contains("Pages visited so far: Start"));
        assert!(!messages[1].content.contains("Start -> Rust"));
    }

    #[test]
    fn user_prompt_lists_every_concept() {
        let page = sample_page();
        let msg = user_prompt(&page);
        assert!(msg.contains("CONCEPT_00: Rust (programming language)"));
        assert!(msg.contains("CONCEPT_01: Mozilla"));
    }
}
