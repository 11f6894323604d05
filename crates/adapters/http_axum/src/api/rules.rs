//! JSON REST handlers for automation rules.

use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use hrmail_app::automation_engine::RebuildReport;
use hrmail_app::ports::{RecordRepository, RuleRepository, TemplateRepository};
use hrmail_domain::automation::{AutomationRule, AutomationRuleBuilder, Condition, Trigger};
use hrmail_domain::id::{RuleId, TemplateId};
use hrmail_domain::schema::ModelKey;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating or replacing a rule.
///
/// `condition` uses the querystring form, e.g.
/// `path=status&operator=equal&value=closed`.
#[derive(Deserialize)]
pub struct RuleRequest {
    pub title: String,
    pub target_model: ModelKey,
    pub trigger: Trigger,
    #[serde(default)]
    pub condition: Condition,
    pub recipient_paths: Vec<String>,
    #[serde(default)]
    pub also_sent_to: Vec<String>,
    pub template_id: TemplateId,
    #[serde(default)]
    pub attachment_template_ids: BTreeSet<TemplateId>,
    pub active: Option<bool>,
}

impl RuleRequest {
    fn into_builder(self) -> AutomationRuleBuilder {
        let mut builder = AutomationRule::builder(self.target_model)
            .title(self.title)
            .trigger(self.trigger)
            .condition(self.condition)
            .template(self.template_id);
        if let Some(active) = self.active {
            builder = builder.active(active);
        }
        for path in self.recipient_paths {
            builder = builder.recipient(path);
        }
        for address in self.also_sent_to {
            builder = builder.also_sent_to(address);
        }
        for id in self.attachment_template_ids {
            builder = builder.attachment(id);
        }
        builder
    }
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<AutomationRule>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get and update endpoints.
pub enum GetResponse {
    Ok(Json<AutomationRule>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<AutomationRule>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/rules` — list all rules.
pub async fn list<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
) -> Result<ListResponse, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let rules = state.rule_service.list_rules().await?;
    Ok(ListResponse::Ok(Json(rules)))
}

/// `GET /api/rules/{id}` — get a rule by ID.
pub async fn get<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let rule_id = RuleId::parse(&id)?;
    let rule = state.rule_service.get_rule(rule_id).await?;
    Ok(GetResponse::Ok(Json(rule)))
}

/// `POST /api/rules` — create a rule and rebind.
pub async fn create<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Json(req): Json<RuleRequest>,
) -> Result<CreateResponse, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let rule = req.into_builder().build()?;
    let created = state.rule_service.create_rule(rule).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /api/rules/{id}` — replace an existing rule and rebind.
pub async fn update<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(id): Path<String>,
    Json(req): Json<RuleRequest>,
) -> Result<GetResponse, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let rule_id = RuleId::parse(&id)?;
    let rule = req.into_builder().id(rule_id).build()?;
    let updated = state.rule_service.update_rule(rule).await?;
    Ok(GetResponse::Ok(Json(updated)))
}

/// `DELETE /api/rules/{id}` — delete a rule and rebind.
pub async fn delete<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let rule_id = RuleId::parse(&id)?;
    state.rule_service.delete_rule(rule_id).await?;
    Ok(DeleteResponse::NoContent)
}

/// `POST /api/rules/rebuild` — rebind every active rule.
pub async fn rebuild<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
) -> Result<Json<RebuildReport>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let report = state.rule_service.rebuild().await?;
    Ok(Json(report))
}
