//! JSON REST handler for the model registry.

use axum::Json;
use axum::extract::State;

use hrmail_app::ports::{RecordRepository, RuleRepository, TemplateRepository};
use hrmail_domain::schema::ModelSchema;

use crate::state::AppState;

/// `GET /api/models` — list the models rules may target.
pub async fn list<RR, TR, DR>(State(state): State<AppState<RR, TR, DR>>) -> Json<Vec<ModelSchema>>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    Json(state.registry.iter().cloned().collect())
}
