use std::sync::Arc;

use relay_core::{
    HttpStatus, InboundSms, MessageRouter, Notifier, RateDecision, RateGate, RelayError,
    RelayResponse, RouterResult, RowStore, Urgency,
};
use serde_json::json;
use time::{OffsetDateTime, UtcOffset};
use tracing::{error, info, warn};

pub const SERVICE_NAME: &str = "SMS Symptom Relay";
pub const CHECKIN_PROMPT: &str = "How were your symptoms today? Rate urgency (1-10) and describe.";
pub const ACK_TEXT: &str = "Logged. ✅";
pub const EMPTY_SUMMARY_TEXT: &str = "No symptom entries recorded yet.";

/// Request handling knobs that are not routing policy.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Text the sender back after a successful log
    pub acknowledge_entries: bool,
    /// Offset applied to the receipt clock before stamping entries
    pub utc_offset: UtcOffset,
    /// Recipient of the daily check-in prompt
    pub owner_number: Option<String>,
    /// Shared secret guarding the check-in trigger
    pub cron_secret: Option<String>,
    pub max_body_size: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            acknowledge_entries: true,
            utc_offset: UtcOffset::UTC,
            owner_number: None,
            cron_secret: None,
            max_body_size: 64 * 1024,
        }
    }
}

/// Framework-agnostic processor that runs the router and carries out its decision
#[derive(Clone)]
pub struct RelayProcessor {
    router: Arc<MessageRouter>,
    store: Arc<dyn RowStore>,
    notifier: Arc<dyn Notifier>,
    gate: Option<Arc<dyn RateGate>>,
    settings: Arc<ProcessorSettings>,
}

impl RelayProcessor {
    pub fn new(
        router: MessageRouter,
        store: Arc<dyn RowStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            router: Arc::new(router),
            store,
            notifier,
            gate: None,
            settings: Arc::new(ProcessorSettings::default()),
        }
    }

    pub fn with_settings(mut self, settings: ProcessorSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn with_rate_gate(mut self, gate: Arc<dyn RateGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Receipt time in the configured offset.
    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.settings.utc_offset)
    }

    pub fn health(&self) -> RelayResponse {
        RelayResponse::success(json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "endpoints": [
                "GET /trigger-daily-checkin?secret=YOUR_SECRET",
                "POST /android-webhook"
            ]
        }))
    }

    /// Process a forwarded SMS and return a framework-agnostic response
    pub async fn process_webhook(&self, body: &[u8]) -> RelayResponse {
        self.process_webhook_at(body, self.now()).await
    }

    /// Same as [`process_webhook`](Self::process_webhook) with an explicit receipt time.
    pub async fn process_webhook_at(&self, body: &[u8], now: OffsetDateTime) -> RelayResponse {
        match self.process_webhook_internal(body, now).await {
            Ok(value) => RelayResponse::success(value),
            Err(e) => self.error_to_response(e),
        }
    }

    async fn process_webhook_internal(
        &self,
        body: &[u8],
        now: OffsetDateTime,
    ) -> Result<serde_json::Value, RelayError> {
        if body.len() > self.settings.max_body_size {
            return Err(RelayError::PayloadTooLarge(self.settings.max_body_size));
        }
        let sms = InboundSms::from_json(body)?;
        info!(sender = %sms.sender, body = %sms.body, "received SMS");

        if let Some(gate) = &self.gate {
            if let RateDecision::Limited { retry_after } = gate.check(&sms.sender).await {
                return Err(RelayError::RateLimited(retry_after));
            }
        }

        let decision = self
            .router
            .route(self.store.as_ref(), &sms.sender, &sms.body, now)
            .await?;
        self.execute(&sms.sender, decision).await
    }

    /// Carry out one routing decision. Nothing runs after the first failing
    /// effect, except that a failed acknowledgment does not undo a logged entry.
    async fn execute(
        &self,
        sender: &str,
        decision: RouterResult,
    ) -> Result<serde_json::Value, RelayError> {
        let action = decision.action();
        match decision {
            RouterResult::LogEntry(entry) => {
                self.store.append(&entry).await?;
                info!(sender, urgency = ?entry.urgency, "symptom logged");
                if self.settings.acknowledge_entries {
                    if let Err(e) = self.notifier.send(sender, ACK_TEXT).await {
                        warn!(sender, "acknowledgment not delivered: {}", e);
                    }
                }
                Ok(json!({
                    "status": "success",
                    "action": action,
                    "urgency": entry.urgency.map(Urgency::get),
                }))
            }
            RouterResult::LinkReply(url) => {
                self.notifier
                    .send(sender, &format!("📊 Your symptom log: {}", url))
                    .await?;
                Ok(json!({ "status": "success", "action": action }))
            }
            RouterResult::SummaryReply(text) => {
                let entries_count = text.lines().count();
                let reply = if text.is_empty() {
                    EMPTY_SUMMARY_TEXT
                } else {
                    text.as_str()
                };
                self.notifier.send(sender, reply).await?;
                Ok(json!({
                    "status": "success",
                    "action": action,
                    "entries_count": entries_count,
                }))
            }
            RouterResult::NoAction => Ok(json!({ "status": "success", "action": action })),
        }
    }

    /// Send the daily check-in prompt to the owner if `secret` matches.
    pub async fn trigger_daily_checkin(&self, secret: Option<&str>) -> RelayResponse {
        match self.trigger_daily_checkin_internal(secret).await {
            Ok(value) => RelayResponse::success(value),
            Err(e) => self.error_to_response(e),
        }
    }

    async fn trigger_daily_checkin_internal(
        &self,
        secret: Option<&str>,
    ) -> Result<serde_json::Value, RelayError> {
        let expected = self
            .settings
            .cron_secret
            .as_deref()
            .ok_or(RelayError::NotConfigured("CRON_SECRET"))?;
        if secret != Some(expected) {
            return Err(RelayError::Forbidden);
        }
        let owner = self
            .settings
            .owner_number
            .as_deref()
            .ok_or(RelayError::NotConfigured("owner number"))?;

        self.notifier.send(owner, CHECKIN_PROMPT).await?;
        info!("daily check-in sent");
        Ok(json!({ "status": "success", "message": "Daily check-in sent" }))
    }

    /// Log and convert an error, including ones raised by an adapter before
    /// the processor saw the request.
    pub fn error_to_response(&self, error: RelayError) -> RelayResponse {
        match error.status() {
            HttpStatus::InternalServerError | HttpStatus::BadGateway => {
                error!("request failed: {}", error)
            }
            _ => warn!("request rejected: {}", error),
        }
        RelayResponse::from(error)
    }
}

/// Helper trait for framework adapters to convert responses
pub trait ResponseConverter {
    type ResponseType;

    fn from_relay_response(response: RelayResponse) -> Self::ResponseType;
}
