//! Typed representation of a parsed, validated rule set.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RuleSetDocument {
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleDocument {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub stop_on_match: bool,
    #[serde(rename = "match", default)]
    pub match_clause: MatchClauseDocument,
    #[serde(default)]
    pub actions: Vec<ActionDocument>,
    pub cooldown_seconds: Option<i64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MatchClauseDocument {
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub chat: Option<ChatMatchDocument>,
    #[serde(default)]
    pub sender: Option<SenderMatchDocument>,
    #[serde(default)]
    pub text: Option<TextMatchDocument>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ChatMatchDocument {
    pub kind: Option<String>,
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SenderMatchDocument {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub numbers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TextMatchDocument {
    pub mode: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ActionDocument {
    #[serde(rename = "ha_service")]
    HaService {
        service: String,
        #[serde(default)]
        target: serde_json::Value,
        #[serde(default)]
        data: serde_json::Value,
    },
    #[serde(rename = "reply_whatsapp")]
    ReplyWhatsapp { text: String },
}

/// A rule after schema validation: conditions are compiled (regexes built
/// once) so the hot webhook path never recompiles a pattern per event.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub priority: i64,
    pub stop_on_match: bool,
    pub events: Vec<String>,
    pub chat_kind: Option<ChatKindFilter>,
    pub chat_ids: Vec<String>,
    pub sender_ids: Vec<String>,
    pub sender_numbers: Vec<String>,
    pub text_match: Option<CompiledTextMatch>,
    pub actions: Vec<ActionDocument>,
    pub cooldown_seconds: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKindFilter {
    Group,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Contains,
    StartsWith,
    Regex,
}

#[derive(Debug, Clone)]
pub struct CompiledTextMatch {
    pub mode: TextMode,
    pub patterns: Vec<String>,
    pub regexes: Vec<regex::Regex>,
}

#[derive(Debug, Clone)]
pub struct ParsedRuleSet {
    pub version: i64,
    pub rules: Vec<CompiledRule>,
}

impl ParsedRuleSet {
    pub fn empty() -> Self {
        Self {
            version: 0,
            rules: Vec::new(),
        }
    }

    /// Rules sorted stably by priority ascending, enabled-only — the order
    /// the engine iterates in for every incoming event.
    pub fn active_rules_in_priority_order(&self) -> Vec<&CompiledRule> {
        let mut rules: Vec<&CompiledRule> = self.rules.iter().filter(|r| r.enabled).collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }
}

pub fn compile_text_match(doc: &TextMatchDocument) -> Result<CompiledTextMatch, String> {
    let mode = match doc.mode.as_str() {
        "contains" => TextMode::Contains,
        "starts_with" => TextMode::StartsWith,
        "regex" => TextMode::Regex,
        other => return Err(format!("unknown text match mode '{other}'")),
    };

    let regexes = if mode == TextMode::Regex {
        doc.patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| format!("invalid regex '{p}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    Ok(CompiledTextMatch {
        mode,
        patterns: doc.patterns.clone(),
        regexes,
    })
}
