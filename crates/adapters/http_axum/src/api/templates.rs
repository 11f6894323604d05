//! JSON REST handlers for mail templates.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use hrmail_app::ports::{RecordRepository, RuleRepository, TemplateRepository};
use hrmail_domain::id::TemplateId;
use hrmail_domain::template::MailTemplate;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating or replacing a template.
#[derive(Deserialize)]
pub struct TemplateRequest {
    pub title: String,
    pub subject: Option<String>,
    pub body: String,
}

impl TemplateRequest {
    fn into_template(self) -> MailTemplate {
        MailTemplate {
            subject: self.subject,
            ..MailTemplate::new(self.title, self.body)
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<MailTemplate>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `GET /api/templates` — list all templates.
pub async fn list<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
) -> Result<Json<Vec<MailTemplate>>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let templates = state.template_service.list_templates().await?;
    Ok(Json(templates))
}

/// `GET /api/templates/{id}` — get a template by ID.
pub async fn get<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(id): Path<String>,
) -> Result<Json<MailTemplate>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let template_id = TemplateId::parse(&id)?;
    let template = state.template_service.get_template(template_id).await?;
    Ok(Json(template))
}

/// `POST /api/templates` — create a template.
pub async fn create<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Json(req): Json<TemplateRequest>,
) -> Result<CreateResponse, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let created = state
        .template_service
        .create_template(req.into_template())
        .await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /api/templates/{id}` — replace a template.
pub async fn update<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(id): Path<String>,
    Json(req): Json<TemplateRequest>,
) -> Result<Json<MailTemplate>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let template_id = TemplateId::parse(&id)?;
    let template = MailTemplate {
        id: template_id,
        ..req.into_template()
    };
    let updated = state.template_service.update_template(template).await?;
    Ok(Json(updated))
}

/// `DELETE /api/templates/{id}` — delete a template.
pub async fn delete<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let template_id = TemplateId::parse(&id)?;
    state.template_service.delete_template(template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
