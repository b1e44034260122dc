//! Match semantics: does a normalised event satisfy a rule's conditions.

use super::model::{ChatKindFilter, CompiledRule, TextMode};
use crate::store::ChatKind;

/// The event shape the engine matches against, built by the webhook
/// ingestor (or the test-only path) from a provider event.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub event_kind: String,
    pub chat_id: String,
    pub chat_kind: ChatKind,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub text: String,
    pub provider_message_id: Option<String>,
}

impl NormalizedEvent {
    pub fn new(event_kind: impl Into<String>, chat_id: impl Into<String>, sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        let chat_id = chat_id.into();
        let chat_kind = ChatKind::from_chat_id(&chat_id);
        Self {
            event_kind: event_kind.into(),
            chat_id,
            chat_kind,
            sender_id: sender_id.into(),
            sender_name: None,
            text: text.into(),
            provider_message_id: None,
        }
    }

    /// The numeric part of `sender_id`, i.e. everything before the `@`.
    pub fn sender_number(&self) -> &str {
        self.sender_id.split('@').next().unwrap_or(&self.sender_id)
    }
}

/// Whether `rule` matches `event`, per spec match semantics 1-6.
pub fn rule_matches(rule: &CompiledRule, event: &NormalizedEvent) -> bool {
    // 1. event kind
    if !rule.events.is_empty() && !rule.events.iter().any(|k| k == &event.event_kind) {
        return false;
    }

    // 2. chat kind
    if let Some(kind) = rule.chat_kind {
        let expected = match kind {
            ChatKindFilter::Group => ChatKind::Group,
            ChatKindFilter::Direct => ChatKind::Direct,
        };
        if expected != event.chat_kind {
            return false;
        }
    }

    // 3. chat ids
    if !rule.chat_ids.is_empty() && !rule.chat_ids.iter().any(|id| id == &event.chat_id) {
        return false;
    }

    // 4. sender ids / numbers (AND when both configured)
    if !rule.sender_ids.is_empty() && !rule.sender_ids.iter().any(|id| id == &event.sender_id) {
        return false;
    }
    if !rule.sender_numbers.is_empty()
        && !rule.sender_numbers.iter().any(|n| n == event.sender_number())
    {
        return false;
    }

    // 5. text
    if let Some(text_match) = &rule.text_match {
        if event.text.is_empty() {
            return false;
        }
        let trimmed = event.text.trim();
        let lower = trimmed.to_ascii_lowercase();

        let matched = match text_match.mode {
            TextMode::Contains => text_match
                .patterns
                .iter()
                .any(|p| lower.contains(&p.trim().to_ascii_lowercase())),
            TextMode::StartsWith => text_match
                .patterns
                .iter()
                .any(|p| lower.starts_with(&p.trim().to_ascii_lowercase())),
            TextMode::Regex => text_match.regexes.iter().any(|r| r.is_match(trimmed)),
        };

        if !matched {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{ChatKindFilter, CompiledRule, TextMode};

    fn base_rule() -> CompiledRule {
        CompiledRule {
            id: "r1".to_string(),
            name: "test rule".to_string(),
            enabled: true,
            priority: 0,
            stop_on_match: true,
            events: Vec::new(),
            chat_kind: None,
            chat_ids: Vec::new(),
            sender_ids: Vec::new(),
            sender_numbers: Vec::new(),
            text_match: None,
            actions: Vec::new(),
            cooldown_seconds: None,
        }
    }

    #[test]
    fn rule_with_no_conditions_matches_everything() {
        let rule = base_rule();
        let event = NormalizedEvent::new("MESSAGES_UPSERT", "1@g.us", "1@g.us", "anything");
        assert!(rule_matches(&rule, &event));
    }

    #[test]
    fn event_kind_filter_excludes_mismatched_kinds() {
        let mut rule = base_rule();
        rule.events = vec!["CONNECTION_UPDATE".to_string()];
        let event = NormalizedEvent::new("MESSAGES_UPSERT", "1@g.us", "1@g.us", "hi");
        assert!(!rule_matches(&rule, &event));
    }

    #[test]
    fn chat_kind_filter_only_matches_groups() {
        let mut rule = base_rule();
        rule.chat_kind = Some(ChatKindFilter::Group);
        let direct_event = NormalizedEvent::new("MESSAGES_UPSERT", "1@s.whatsapp.net", "1", "hi");
        let group_event = NormalizedEvent::new("MESSAGES_UPSERT", "1@g.us", "1", "hi");
        assert!(!rule_matches(&rule, &direct_event));
        assert!(rule_matches(&rule, &group_event));
    }

    #[test]
    fn sender_ids_and_numbers_are_anded_when_both_set() {
        let mut rule = base_rule();
        rule.sender_ids = vec!["999@g.us".to_string()];
        rule.sender_numbers = vec!["555".to_string()];

        let wrong_number = NormalizedEvent::new("MESSAGES_UPSERT", "chat@g.us", "999@g.us", "hi");
        assert!(!rule_matches(&rule, &wrong_number));

        let mut event = NormalizedEvent::new("MESSAGES_UPSERT", "chat@g.us", "999@g.us", "hi");
        event.sender_id = "555@s.whatsapp.net".to_string();
        // sender_id no longer matches sender_ids ("999@g.us"), so AND logic still fails
        assert!(!rule_matches(&rule, &event));
    }

    #[test]
    fn text_contains_is_case_insensitive_and_trims() {
        let mut rule = base_rule();
        rule.text_match = Some(crate::engine::model::CompiledTextMatch {
            mode: TextMode::Contains,
            patterns: vec!["goodnight".to_string()],
            regexes: Vec::new(),
        });

        let event = NormalizedEvent::new("MESSAGES_UPSERT", "1@g.us", "1", "  Say GOODNIGHT please  ");
        assert!(rule_matches(&rule, &event));
    }

    #[test]
    fn text_match_fails_on_empty_text() {
        let mut rule = base_rule();
        rule.text_match = Some(crate::engine::model::CompiledTextMatch {
            mode: TextMode::Contains,
            patterns: vec!["hi".to_string()],
            regexes: Vec::new(),
        });

        let event = NormalizedEvent::new("MESSAGES_UPSERT", "1@g.us", "1", "");
        assert!(!rule_matches(&rule, &event));
    }

    #[test]
    fn regex_mode_matches_compiled_pattern() {
        let mut rule = base_rule();
        rule.text_match = Some(
            crate::engine::model::compile_text_match(&crate::engine::model::TextMatchDocument {
                mode: "regex".to_string(),
                patterns: vec![r"^\d{3}-\d{4}$".to_string()],
            })
            .unwrap(),
        );

        let matching = NormalizedEvent::new("MESSAGES_UPSERT", "1@g.us", "1", "555-1234");
        let not_matching = NormalizedEvent::new("MESSAGES_UPSERT", "1@g.us", "1", "hello");
        assert!(rule_matches(&rule, &matching));
        assert!(!rule_matches(&rule, &not_matching));
    }
}
