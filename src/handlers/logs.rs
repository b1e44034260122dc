use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::GatewayError;
use crate::store::{self, EventFilters, EventLogRow, Message, MessageFilters, Paged, Pagination, RuleFireFilters, RuleFireRow};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub chat_id: Option<String>,
}

pub async fn messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Paged<Message>>, GatewayError> {
    let page = store::messages::list_messages(
        &state.pool,
        MessageFilters { chat_id: query.chat_id },
        Pagination::new(query.page, query.limit),
    )
    .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct RuleFiresQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub rule_id: Option<String>,
}

pub async fn rule_fires(
    State(state): State<AppState>,
    Query(query): Query<RuleFiresQuery>,
) -> Result<Json<Paged<RuleFireRow>>, GatewayError> {
    let page = store::rule_fires::list_rule_fires(
        &state.pool,
        RuleFireFilters { rule_id: query.rule_id },
        Pagination::new(query.page, query.limit),
    )
    .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub event_type: Option<String>,
}

pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Paged<EventLogRow>>, GatewayError> {
    let page = store::events::list_events(
        &state.pool,
        EventFilters { event_kind: query.event_type },
        Pagination::new(query.page, query.limit),
    )
    .await?;
    Ok(Json(page))
}
