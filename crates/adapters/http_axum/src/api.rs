//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod models;
#[allow(clippy::missing_errors_doc)]
pub mod outbox;
#[allow(clippy::missing_errors_doc)]
pub mod records;
#[allow(clippy::missing_errors_doc)]
pub mod rules;
#[allow(clippy::missing_errors_doc)]
pub mod templates;

use axum::Router;
use axum::routing::{get, post};

use hrmail_app::ports::{RecordRepository, RuleRepository, TemplateRepository};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<RR, TR, DR>() -> Router<AppState<RR, TR, DR>>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    Router::new()
        // Models
        .route("/models", get(models::list::<RR, TR, DR>))
        // Rules
        .route(
            "/rules",
            get(rules::list::<RR, TR, DR>).post(rules::create::<RR, TR, DR>),
        )
        .route("/rules/rebuild", post(rules::rebuild::<RR, TR, DR>))
        .route(
            "/rules/{id}",
            get(rules::get::<RR, TR, DR>)
                .put(rules::update::<RR, TR, DR>)
                .delete(rules::delete::<RR, TR, DR>),
        )
        // Templates
        .route(
            "/templates",
            get(templates::list::<RR, TR, DR>).post(templates::create::<RR, TR, DR>),
        )
        .route(
            "/templates/{id}",
            get(templates::get::<RR, TR, DR>)
                .put(templates::update::<RR, TR, DR>)
                .delete(templates::delete::<RR, TR, DR>),
        )
        // Records
        .route(
            "/records/{model}",
            get(records::list::<RR, TR, DR>)
                .post(records::create::<RR, TR, DR>)
                .put(records::bulk_update::<RR, TR, DR>),
        )
        .route(
            "/records/{model}/{id}",
            get(records::get::<RR, TR, DR>)
                .put(records::update::<RR, TR, DR>)
                .delete(records::delete::<RR, TR, DR>),
        )
        // Outbox
        .route("/outbox", get(outbox::list::<RR, TR, DR>))
}
