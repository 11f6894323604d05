//! JSON REST handler for recently sent mail.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use hrmail_app::ports::{RecordRepository, RuleRepository, TemplateRepository};
use hrmail_domain::mail::OutgoingMail;

use crate::state::AppState;

/// Query parameters for the outbox listing.
#[derive(Deserialize)]
pub struct OutboxQuery {
    pub limit: Option<usize>,
}

/// `GET /api/outbox` — recently sent mail, newest first.
pub async fn list<RR, TR, DR>(
    State(state): State<AppState<RR, TR, DR>>,
    Query(query): Query<OutboxQuery>,
) -> Json<Vec<OutgoingMail>>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    let mut mails = state.outbox.recent();
    if let Some(limit) = query.limit {
        mails.truncate(limit);
    }
    Json(mails)
}
