//! JSON REST handlers for records of registered models.
//!
//! Mutations run through the record service, so every write fires the
//! automation hooks. Handlers answer as soon as the mails are queued; the
//! workers send them in the background. `?wait=true` holds the response
//! until every queued mail has an outcome.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use hrmail_app::context::{MutationContext, Notice, NoticeSink};
use hrmail_app::dispatcher::{DispatchOutcome, DispatchTicket};
use hrmail_app::ports::{RecordRepository, RuleRepository, TemplateRepository};
use hrmail_app::services::Mutation;
use hrmail_domain::id::{RecordId, RuleId};
use hrmail_domain::record::{FieldValue, Record};
use hrmail_domain::schema::ModelKey;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating or replacing a record.
#[derive(Deserialize)]
pub struct RecordRequest {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Request body for a bulk update. Without `ids` every record of the model
/// is updated.
#[derive(Deserialize)]
pub struct BulkUpdateRequest {
    pub ids: Option<Vec<RecordId>>,
    pub changes: BTreeMap<String, FieldValue>,
}

/// Query parameters shared by the mutating endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct MutationQuery {
    /// Wait for the queued mails and report their outcomes.
    #[serde(default)]
    pub wait: bool,
}

/// What happened to one queued mail.
#[derive(Serialize)]
pub struct Dispatch {
    pub rule_id: RuleId,
    pub record_id: RecordId,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// Body of every mutating record endpoint.
#[derive(Serialize)]
pub struct MutationResponse<T> {
    #[serde(flatten)]
    pub value: T,
    pub queued: Vec<RuleId>,
    /// Only present when the caller asked to wait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatches: Option<Vec<Dispatch>>,
    pub notices: Vec<Notice>,
}

/// A single record under the `record` key.
#[derive(Serialize)]
pub struct One {
    pub record: Record,
}

/// Several records under the `records` key.
#[derive(Serialize)]
pub struct Many {
    pub records: Vec<Record>,
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<MutationResponse<One>>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Build the response body. Without `wait` the tickets are dropped and the
/// mails keep going; only notices raised so far are reported.
async fn respond<T>(
    value: T,
    tickets: Vec<DispatchTicket>,
    sink: &NoticeSink,
    wait: bool,
) -> MutationResponse<T> {
    let queued = tickets.iter().map(DispatchTicket::rule_id).collect();
    let dispatches = if wait {
        let mut dispatches = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let (rule_id, record_id) = (ticket.rule_id(), ticket.record_id());
            dispatches.push(Dispatch {
                rule_id,
                record_id,
                outcome: ticket.outcome().await,
            });
        }
        Some(dispatches)
    } else {
        None
    };
    MutationResponse {
        value,
        queued,
        dispatches,
        notices: sink.drain(),
    }
}

fn context() -> (MutationContext, NoticeSink) {
    let sink = NoticeSink::default();
    (MutationContext::new().with_notices(sink.clone()), sink)
}

/// `GET /api/records/{model}` — list records of a model.
pub async fn list<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(model): Path<String>,
) -> Result<Json<Vec<Record>>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let model = ModelKey::parse(&model)?;
    let records = state.record_service.list(&model).await?;
    Ok(Json(records))
}

/// `GET /api/records/{model}/{id}` — get one record.
pub async fn get<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path((model, id)): Path<(String, String)>,
) -> Result<Json<Record>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let model = ModelKey::parse(&model)?;
    let id = RecordId::parse(&id)?;
    let record = state.record_service.get(&model, id).await?;
    Ok(Json(record))
}

/// `POST /api/records/{model}` — create a record and run the create rules.
pub async fn create<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(model): Path<String>,
    Query(query): Query<MutationQuery>,
    Json(req): Json<RecordRequest>,
) -> Result<CreateResponse, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let model = ModelKey::parse(&model)?;
    let record = Record {
        fields: req.fields,
        ..Record::new(model)
    };
    let (mut ctx, sink) = context();
    let Mutation { value, tickets } = state.record_service.create(record, &mut ctx).await?;
    let body = respond(One { record: value }, tickets, &sink, query.wait).await;
    Ok(CreateResponse::Created(Json(body)))
}

/// `PUT /api/records/{model}/{id}` — replace a record's fields and run the
/// update rules.
pub async fn update<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path((model, id)): Path<(String, String)>,
    Query(query): Query<MutationQuery>,
    Json(req): Json<RecordRequest>,
) -> Result<Json<MutationResponse<One>>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let model = ModelKey::parse(&model)?;
    let id = RecordId::parse(&id)?;
    let record = Record {
        model,
        id,
        fields: req.fields,
    };
    let (mut ctx, sink) = context();
    let Mutation { value, tickets } = state.record_service.update(record, &mut ctx).await?;
    Ok(Json(respond(One { record: value }, tickets, &sink, query.wait).await))
}

/// `PUT /api/records/{model}` — apply the same changes to many records and
/// run the bulk update rules.
pub async fn bulk_update<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path(model): Path<String>,
    Query(query): Query<MutationQuery>,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<Json<MutationResponse<Many>>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let model = ModelKey::parse(&model)?;
    let (mut ctx, sink) = context();
    let Mutation { value, tickets } = state
        .record_service
        .bulk_update(&model, req.ids.as_deref(), req.changes, &mut ctx)
        .await?;
    Ok(Json(respond(Many { records: value }, tickets, &sink, query.wait).await))
}

/// `DELETE /api/records/{model}/{id}` — delete a record and run the delete
/// rules.
pub async fn delete<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Path((model, id)): Path<(String, String)>,
    Query(query): Query<MutationQuery>,
) -> Result<Json<MutationResponse<One>>, ApiError>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let model = ModelKey::parse(&model)?;
    let id = RecordId::parse(&id)?;
    let (mut ctx, sink) = context();
    let Mutation { value, tickets } = state.record_service.delete(&model, id, &mut ctx).await?;
    Ok(Json(respond(One { record: value }, tickets, &sink, query.wait).await))
}
