//! Rule engine: parses and validates YAML rule sets, caches the current
//! parsed set, matches incoming normalised events against it, executes
//! ordered actions per matched rule, enforces cooldowns, and records
//! rule-fire outcomes.

pub mod matcher;
pub mod model;
pub mod yaml;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::GatewayError;
use crate::orchestrator::OrchestratorClient;
use crate::provider::ProviderClient;
use crate::store::{self, DbPool};

pub use matcher::NormalizedEvent;
pub use model::ParsedRuleSet;
use model::ActionDocument;

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub description: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedRule {
    pub rule_id: String,
    pub rule_name: String,
    pub matched: bool,
    pub skipped_reason: Option<String>,
    pub action_results: Vec<ActionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestMessageResult {
    pub evaluated_rules: Vec<EvaluatedRule>,
}

pub struct Engine {
    pool: DbPool,
    cache: RwLock<Arc<ParsedRuleSet>>,
    provider: Arc<ProviderClient>,
    orchestrator: Arc<OrchestratorClient>,
    default_instance: String,
    allowed_services: Vec<String>,
}

impl Engine {
    pub fn new(
        pool: DbPool,
        provider: Arc<ProviderClient>,
        orchestrator: Arc<OrchestratorClient>,
        default_instance: String,
        allowed_services: Vec<String>,
    ) -> Self {
        Self {
            pool,
            cache: RwLock::new(Arc::new(ParsedRuleSet::empty())),
            provider,
            orchestrator,
            default_instance,
            allowed_services,
        }
    }

    /// Atomic pointer swap: readers always observe either the old or the new
    /// set, never a partially updated one.
    pub fn current(&self) -> Arc<ParsedRuleSet> {
        self.cache.read().clone()
    }

    /// Reload the parsed cache from the Store's canonical YAML.
    pub async fn reload(&self) -> Result<(), GatewayError> {
        let yaml_text = store::rules::get_ruleset_yaml(&self.pool).await?;
        let version = store::rules::get_ruleset_version(&self.pool).await?;

        if yaml_text.trim().is_empty() {
            *self.cache.write() = Arc::new(ParsedRuleSet::empty());
            return Ok(());
        }

        let document: model::RuleSetDocument = serde_yaml::from_str(&yaml_text)
            .map_err(|e| GatewayError::Internal(format!("stored rule set failed to parse: {e}")))?;
        let compiled = yaml::compile(document, version);
        *self.cache.write() = Arc::new(compiled);

        Ok(())
    }

    /// Validate and persist a new rule set, then reload the cache from it.
    pub async fn save_ruleset(&self, yaml_text: &str) -> Result<yaml::ValidationOutcome, GatewayError> {
        let outcome = yaml::validate_yaml(yaml_text);
        if !outcome.valid {
            return Ok(outcome);
        }

        let canonical = outcome.normalised_yaml.clone().unwrap_or_else(|| yaml_text.to_string());
        let document: model::RuleSetDocument = serde_yaml::from_str(&canonical)
            .map_err(|e| GatewayError::Internal(format!("re-parse of normalised yaml failed: {e}")))?;
        let parsed_json = serde_json::to_value(&document)
            .map_err(|e| GatewayError::Internal(format!("failed to serialise parsed rule set: {e}")))?;

        let version = store::rules::put_ruleset(&self.pool, &canonical, &parsed_json).await?;
        let compiled = yaml::compile(document, version);
        *self.cache.write() = Arc::new(compiled);

        Ok(outcome)
    }

    /// Process a normalised event against the cached rule set: matches,
    /// enforces cooldowns, dispatches actions, and persists rule-fire rows.
    /// `message_id` is the triggering Message row's id, when one exists.
    pub async fn process_event(
        &self,
        event: &NormalizedEvent,
        message_id: Option<i64>,
    ) -> Result<(), GatewayError> {
        if let Err(e) = store::cooldowns::sweep_expired_cooldowns(&self.pool).await {
            warn!("cooldown sweep failed: {e}");
        }

        let ruleset = self.current();

        for rule in ruleset.active_rules_in_priority_order() {
            if !matcher::rule_matches(rule, event) {
                continue;
            }

            let on_cooldown = store::cooldowns::is_on_cooldown(&self.pool, &rule.id, &event.chat_id)
                .await
                .unwrap_or(false);

            if on_cooldown {
                info!(rule_id = %rule.id, chat_id = %event.chat_id, "rule skipped: cooldown active");
                continue;
            }

            let (action_results, success) = self.execute_actions(&rule.actions, event).await;

            let matched_text = if event.text.is_empty() {
                None
            } else {
                Some(store::rule_fires::truncate_chars(&event.text, 500))
            };

            let error_message = if success {
                None
            } else {
                let joined = action_results
                    .iter()
                    .filter_map(|r| r.error.clone())
                    .collect::<Vec<_>>()
                    .join("; ");
                Some(joined)
            };

            let action_results_json = serde_json::to_value(&action_results).unwrap_or_default();

            if let Err(e) = store::rule_fires::insert_rule_fire(
                &self.pool,
                store::rule_fires::NewRuleFire {
                    rule_id: &rule.id,
                    rule_name: &rule.name,
                    message_id,
                    chat_id: &event.chat_id,
                    sender_id: &event.sender_id,
                    matched_text: matched_text.as_deref(),
                    action_results: action_results_json,
                    success,
                    error_message,
                },
            )
            .await
            {
                error!("failed to record rule fire for rule {}: {e}", rule.id);
            }
            metrics::counter!("rule_fires_total", 1, "success" => success.to_string());

            if success {
                if let Some(seconds) = rule.cooldown_seconds {
                    if seconds > 0 {
                        if let Err(e) =
                            store::cooldowns::set_cooldown(&self.pool, &rule.id, &event.chat_id, seconds).await
                        {
                            warn!("failed to set cooldown for rule {}: {e}", rule.id);
                        }
                    }
                }
            }

            if rule.stop_on_match {
                break;
            }
        }

        Ok(())
    }

    /// Test-only path: runs matching but never executes actions or touches
    /// cooldowns/Store state (P3).
    pub fn test_message(&self, event: &NormalizedEvent) -> TestMessageResult {
        let ruleset = self.current();
        let mut evaluated_rules = Vec::new();

        for rule in ruleset.active_rules_in_priority_order() {
            let matched = matcher::rule_matches(rule, event);
            if !matched {
                continue;
            }

            let action_results = rule
                .actions
                .iter()
                .map(|a| ActionResult {
                    description: describe_action(a),
                    success: true,
                    error: None,
                })
                .collect();

            evaluated_rules.push(EvaluatedRule {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                matched: true,
                skipped_reason: None,
                action_results,
            });

            if rule.stop_on_match {
                break;
            }
        }

        TestMessageResult { evaluated_rules }
    }

    async fn execute_actions(
        &self,
        actions: &[ActionDocument],
        event: &NormalizedEvent,
    ) -> (Vec<ActionResult>, bool) {
        let mut results = Vec::with_capacity(actions.len());
        let mut overall_success = true;

        for action in actions {
            let description = describe_action(action);
            let result = match action {
                ActionDocument::HaService { service, target, data } => {
                    let target = (!target.is_null()).then(|| target.clone());
                    let data = (!data.is_null()).then(|| data.clone());
                    match self
                        .orchestrator
                        .call_service(service, target, data, &self.allowed_services)
                        .await
                    {
                        Ok(()) => ActionResult {
                            description,
                            success: true,
                            error: None,
                        },
                        Err(e) => ActionResult {
                            description,
                            success: false,
                            error: Some(e.to_string()),
                        },
                    }
                }
                ActionDocument::ReplyWhatsapp { text } => {
                    match self
                        .provider
                        .send_text(&self.default_instance, &event.chat_id, text)
                        .await
                    {
                        Ok(_message_id) => ActionResult {
                            description,
                            success: true,
                            error: None,
                        },
                        Err(e) => ActionResult {
                            description,
                            success: false,
                            error: Some(e.to_string()),
                        },
                    }
                }
            };

            if !result.success {
                overall_success = false;
            }
            results.push(result);
        }

        (results, overall_success)
    }
}

fn describe_action(action: &ActionDocument) -> String {
    match action {
        ActionDocument::HaService { service, .. } => format!("call orchestrator service '{service}'"),
        ActionDocument::ReplyWhatsapp { text } => {
            let preview: String = text.chars().take(40).collect();
            format!("reply via WhatsApp: \"{preview}\"")
        }
    }
}
