//! # SMS Relay
//!
//! A webhook relay that turns forwarded text messages into a symptom log.
//!
//! ## Features
//!
//! - **Symptom logging**: any text that is not a command is appended to the
//!   log, with its 1-10 urgency rating when one is present
//! - **Commands**: `link` replies with the sheet URL, `summary` with the last
//!   three entries
//! - **Pluggable collaborators**: Google Sheets or in-memory row store, Join push
//!   notifier, all behind traits from `relay-core`
//! - **Daily check-in**: secret-guarded trigger for a cron service
//! - **Rate limiting**: per-sender token buckets in front of the router
//! - **Configuration**: layered files plus `SMSRELAY__*` environment variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smsrelay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     init_tracing(&config.logging)?;
//!     let processor = build_processor(&config)?;
//!     let response = processor
//!         .process_webhook(br#"{"sender":"+15551234567","body":"Headache, urgency 7"}"#)
//!         .await;
//!     println!("{}", response.body);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod rate_limiter;
pub mod telemetry;

pub use crate::config::*;

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{BoxError, Router};
use relay_core::{DisabledNotifier, MemoryRowStore, Notifier, RowStore};
use relay_join::JoinNotifier;
use relay_sheets::SheetsRowStore;
use relay_web_axum::AppState;
use relay_web_generic::RelayProcessor;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tracing::{info, warn};

/// Errors raised while wiring the relay from configuration
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("notifier setup failed: {0}")]
    Notifier(#[from] relay_core::SendError),
}

/// Row store selected by configuration.
pub fn build_store(config: &AppConfig) -> Result<Arc<dyn RowStore>, SetupError> {
    match &config.sheets {
        Some(sheets) => {
            info!(spreadsheet = %sheets.spreadsheet_id, "using Google Sheets row store");
            Ok(Arc::new(SheetsRowStore::with_base_url(
                sheets.spreadsheet_id.clone(),
                sheets.access_token()?,
                sheets.range.clone(),
                sheets.base_url.clone(),
            )))
        }
        None => {
            warn!("no sheets configured, entries are kept in memory only");
            Ok(Arc::new(MemoryRowStore::new("memory://symptom-log")))
        }
    }
}

/// Notifier selected by configuration.
pub fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, SetupError> {
    match &config.join {
        Some(join) => {
            let timeout = Duration::from_secs(join.timeout_seconds);
            Ok(Arc::new(JoinNotifier::new(&join.send_url, timeout)?))
        }
        None => {
            warn!("no join send_url configured, replies will not be delivered");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

/// Wire router, collaborators and rate limiter into a processor.
pub fn build_processor(config: &AppConfig) -> Result<RelayProcessor, SetupError> {
    let processor = RelayProcessor::new(
        config.relay.message_router(),
        build_store(config)?,
        build_notifier(config)?,
    )
    .with_settings(config.processor_settings()?);

    Ok(if config.rate_limit.enabled {
        processor.with_rate_gate(Arc::new(rate_limiter::RateLimiter::from_config(
            &config.rate_limit,
        )))
    } else {
        processor
    })
}

/// HTTP routes with body limit and request timeout applied. The body limit is
/// the processor's, so oversized requests get the same JSON error either way.
pub fn build_app(config: &AppConfig, processor: RelayProcessor) -> Router {
    let body_limit = processor.settings().max_body_size;
    relay_web_axum::router(AppState { processor })
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: BoxError| async {
                    StatusCode::REQUEST_TIMEOUT
                }))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.timeout_seconds,
                ))),
        )
}

/// Common imports for SMS Relay usage
pub mod prelude {
    pub use crate::config::{
        AppConfig, JoinConfig, LoggingConfig, RateLimitConfig, RelayConfig, SecurityConfig,
        ServerConfig, SheetsConfig,
    };
    pub use crate::rate_limiter::RateLimiter;
    pub use crate::telemetry::init_tracing;
    pub use crate::{SetupError, build_app, build_processor};
    pub use relay_core::*;
    pub use relay_web_generic::{ProcessorSettings, RelayProcessor};
}
