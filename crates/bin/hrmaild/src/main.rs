//! # hrmaild — hrmail daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`hrmail.toml`, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Start the mail dispatcher and bind the stored rules
//! - Construct application services, injecting repositories via port traits
//! - Build the axum router, injecting application services
//! - Bind to a TCP port and serve until interrupted, then drain queued mail
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod catalog;
mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hrmail_adapter_http_axum::state::AppState;
use hrmail_adapter_storage_sqlite_sqlx::{
    SqliteRecordRepository, SqliteRuleRepository, SqliteTemplateRepository,
};
use hrmail_app::automation_engine::AutomationEngine;
use hrmail_app::dispatcher::MailDispatcher;
use hrmail_app::outbox::Outbox;
use hrmail_app::services::{RecordService, RuleService, TemplateService};

use crate::config::Config;

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);

    // Database
    let db = hrmail_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let pool = db.pool().clone();

    // Repositories
    let rule_repo = Arc::new(SqliteRuleRepository::new(pool.clone()));
    let template_repo = Arc::new(SqliteTemplateRepository::new(pool.clone()));
    let record_repo = Arc::new(SqliteRecordRepository::new(pool));

    // Models and mail
    let registry = Arc::new(catalog::registry().context("invalid built-in model")?);
    let outbox = Arc::new(Outbox::new(config.mail.outbox_capacity));
    let dispatcher = MailDispatcher::start(
        &config.dispatcher(),
        Arc::clone(&template_repo),
        Arc::clone(&record_repo),
        Arc::clone(&outbox),
        Arc::clone(&registry),
    );

    // Engine
    let engine = Arc::new(AutomationEngine::new(
        Arc::clone(&rule_repo),
        Arc::clone(&record_repo),
        Arc::clone(&registry),
        dispatcher,
    ));
    let report = engine.rebuild().await.context("failed to load rules")?;
    for failure in &report.failed {
        tracing::warn!(rule_id = %failure.rule_id, reason = %failure.reason, "rule left unbound");
    }

    // Services
    let state = AppState::from_arcs(
        Arc::new(RuleService::new(rule_repo, Arc::clone(&engine))),
        Arc::new(TemplateService::new(template_repo)),
        Arc::new(RecordService::new(record_repo, Arc::clone(&engine))),
        registry,
        outbox,
    );
    let app = hrmail_adapter_http_axum::router::build(state);

    // HTTP
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "hrmaild listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.dispatcher().shutdown().await;
    tracing::info!("mail queue drained");
    Ok(())
}
