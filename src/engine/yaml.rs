//! Strict YAML parsing and schema validation for operator-authored rule sets.

use std::collections::HashSet;

use serde::Serialize;

use super::model::{
    compile_text_match, ActionDocument, ChatKindFilter, CompiledRule, MatchClauseDocument,
    ParsedRuleSet, RuleDocument, RuleSetDocument,
};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub rule_count: usize,
    pub normalised_yaml: Option<String>,
}

/// Parse `yaml` strictly and schema-validate it. On success, `normalised_yaml`
/// holds the round-tripped canonical form (what `get_ruleset_yaml` will
/// return after a save).
pub fn validate_yaml(yaml: &str) -> ValidationOutcome {
    let document: RuleSetDocument = match serde_yaml::from_str(yaml) {
        Ok(doc) => doc,
        Err(err) => {
            let line = err.location().map(|l| l.line());
            return ValidationOutcome {
                valid: false,
                errors: vec![ValidationError {
                    path: String::new(),
                    message: err.to_string(),
                    line,
                }],
                rule_count: 0,
                normalised_yaml: None,
            };
        }
    };

    let errors = schema_validate(&document);
    if !errors.is_empty() {
        return ValidationOutcome {
            valid: false,
            errors,
            rule_count: document.rules.len(),
            normalised_yaml: None,
        };
    }

    let normalised_yaml = serde_yaml::to_string(&document).unwrap_or_default();

    ValidationOutcome {
        valid: true,
        errors: Vec::new(),
        rule_count: document.rules.len(),
        normalised_yaml: Some(normalised_yaml),
    }
}

fn schema_validate(document: &RuleSetDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for (idx, rule) in document.rules.iter().enumerate() {
        let base = format!("rules[{idx}]");

        if rule.id.trim().is_empty() {
            errors.push(ValidationError {
                path: format!("{base}.id"),
                message: "rule id must not be empty".to_string(),
                line: None,
            });
        } else if !seen_ids.insert(rule.id.as_str()) {
            errors.push(ValidationError {
                path: format!("{base}.id"),
                message: format!("duplicate rule id '{}'", rule.id),
                line: None,
            });
        }

        if rule.name.trim().is_empty() {
            errors.push(ValidationError {
                path: format!("{base}.name"),
                message: "rule name must not be empty".to_string(),
                line: None,
            });
        }

        if rule.actions.is_empty() {
            errors.push(ValidationError {
                path: format!("{base}.actions"),
                message: "a rule must have at least one action".to_string(),
                line: None,
            });
        }

        for (aidx, action) in rule.actions.iter().enumerate() {
            let apath = format!("{base}.actions[{aidx}]");
            match action {
                ActionDocument::HaService { service, .. } => {
                    if service.trim().is_empty() {
                        errors.push(ValidationError {
                            path: apath,
                            message: "ha_service action requires a non-empty 'service'".to_string(),
                            line: None,
                        });
                    }
                }
                ActionDocument::ReplyWhatsapp { text } => {
                    if text.trim().is_empty() {
                        errors.push(ValidationError {
                            path: apath,
                            message: "reply_whatsapp action requires a non-empty 'text'".to_string(),
                            line: None,
                        });
                    }
                }
            }
        }

        if let Some(text) = &rule.match_clause.text {
            if !matches!(text.mode.as_str(), "contains" | "starts_with" | "regex") {
                errors.push(ValidationError {
                    path: format!("{base}.match.text.mode"),
                    message: format!(
                        "unknown text match mode '{}' (expected contains, starts_with, or regex)",
                        text.mode
                    ),
                    line: None,
                });
            } else if text.patterns.is_empty() {
                errors.push(ValidationError {
                    path: format!("{base}.match.text.patterns"),
                    message: "text match requires at least one pattern".to_string(),
                    line: None,
                });
            } else if text.mode == "regex" {
                for pattern in &text.patterns {
                    if let Err(e) = regex::RegexBuilder::new(pattern).case_insensitive(true).build() {
                        errors.push(ValidationError {
                            path: format!("{base}.match.text.patterns"),
                            message: format!("invalid regex '{pattern}': {e}"),
                            line: None,
                        });
                    }
                }
            }
        }

        if let Some(chat) = &rule.match_clause.chat {
            if let Some(kind) = &chat.kind {
                if !matches!(kind.as_str(), "group" | "direct" | "any") {
                    errors.push(ValidationError {
                        path: format!("{base}.match.chat.kind"),
                        message: format!("unknown chat kind '{kind}' (expected group, direct, or any)"),
                        line: None,
                    });
                }
            }
        }
    }

    errors
}

/// Compile an already-validated document into the engine's runtime
/// representation. Panics only on internal inconsistency (a regex that
/// `validate_yaml` already accepted failing to compile again), which should
/// never happen since both paths use the same builder.
pub fn compile(document: RuleSetDocument, version: i64) -> ParsedRuleSet {
    let rules = document
        .rules
        .into_iter()
        .filter_map(|r| compile_rule(r).ok())
        .collect();

    ParsedRuleSet { version, rules }
}

fn compile_rule(doc: RuleDocument) -> Result<CompiledRule, String> {
    let MatchClauseDocument {
        events,
        chat,
        sender,
        text,
    } = doc.match_clause;

    let chat_kind = chat.as_ref().and_then(|c| match c.kind.as_deref() {
        Some("group") => Some(ChatKindFilter::Group),
        Some("direct") => Some(ChatKindFilter::Direct),
        _ => None,
    });
    let chat_ids = chat.map(|c| c.ids).unwrap_or_default();
    let (sender_ids, sender_numbers) = sender
        .map(|s| (s.ids, s.numbers))
        .unwrap_or((Vec::new(), Vec::new()));
    let text_match = text.as_ref().map(compile_text_match).transpose()?;

    Ok(CompiledRule {
        id: doc.id,
        name: doc.name,
        enabled: doc.enabled,
        priority: doc.priority,
        stop_on_match: doc.stop_on_match,
        events,
        chat_kind,
        chat_ids,
        sender_ids,
        sender_numbers,
        text_match,
        actions: doc.actions,
        cooldown_seconds: doc.cooldown_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_syntax_errors() {
        let result = validate_yaml("rules: [this is not valid yaml");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn requires_non_empty_id_and_actions() {
        let yaml = r#"
rules:
  - id: ""
    name: "test"
    actions: []
"#;
        let result = validate_yaml(yaml);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.path.ends_with(".id")));
        assert!(result.errors.iter().any(|e| e.path.ends_with(".actions")));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = r#"
rules:
  - id: "a"
    name: "one"
    actions:
      - type: reply_whatsapp
        text: "hi"
  - id: "a"
    name: "two"
    actions:
      - type: reply_whatsapp
        text: "hi"
"#;
        let result = validate_yaml(yaml);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn accepts_well_formed_ruleset() {
        let yaml = r#"
rules:
  - id: "goodnight"
    name: "Goodnight routine"
    priority: 10
    match:
      events: ["MESSAGES_UPSERT"]
      text:
        mode: contains
        patterns: ["goodnight"]
    actions:
      - type: ha_service
        service: "script.turn_on"
        target:
          entity_id: "script.goodnight"
"#;
        let result = validate_yaml(yaml);
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.rule_count, 1);
        assert!(result.normalised_yaml.is_some());
    }
}
