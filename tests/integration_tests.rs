use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use relay_core::*;
use relay_web_generic::{ACK_TEXT, ProcessorSettings, RelayProcessor};
use smsrelay::rate_limiter::RateLimiter;
use smsrelay::{AppConfig, build_app, build_processor};
use time::OffsetDateTime;
use time::macros::datetime;
use tower::ServiceExt;

const SENDER: &str = "+15551234567";
const NOW: OffsetDateTime = datetime!(2026-10-17 12:00:00 UTC);

fn payload(sender: &str, body: &str) -> Vec<u8> {
    serde_json::json!({ "sender": sender, "body": body })
        .to_string()
        .into_bytes()
}

fn memory_processor() -> (RelayProcessor, MemoryRowStore, MemoryNotifier) {
    let store = MemoryRowStore::new("https://docs.google.com/spreadsheets/d/integration");
    let notifier = MemoryNotifier::new();
    let processor = RelayProcessor::new(
        MessageRouter::default(),
        Arc::new(store.clone()),
        Arc::new(notifier.clone()),
    );
    (processor, store, notifier)
}

fn response_json(response: &RelayResponse) -> serde_json::Value {
    serde_json::from_str(&response.body).unwrap()
}

#[tokio::test]
async fn test_full_conversation() {
    let (processor, store, notifier) = memory_processor();

    for body in [
        "Headache today, urgency 7",
        "feeling okay",
        "Nausea 4",
        "urgency 2, tired",
    ] {
        let response = processor.process_webhook_at(&payload(SENDER, body), NOW).await;
        assert_eq!(response.status, HttpStatus::Ok);
    }
    assert_eq!(store.len().await, 4);

    let link = processor.process_webhook_at(&payload(SENDER, "Link"), NOW).await;
    assert_eq!(response_json(&link)["action"], "sent_link");

    let summary = processor
        .process_webhook_at(&payload(SENDER, "  SUMMARY "), NOW)
        .await;
    assert_eq!(response_json(&summary)["entries_count"], 3);

    let sent = notifier.sent().await;
    // four acks, the link and the summary
    assert_eq!(sent.len(), 6);
    assert!(sent.iter().all(|m| m.to == SENDER));
    assert_eq!(sent.iter().filter(|m| m.text == ACK_TEXT).count(), 4);

    let summary_text = &sent[5].text;
    let lines: Vec<&str> = summary_text.lines().collect();
    assert_eq!(
        lines,
        [
            "2026-10-17 12:00:00 — feeling okay (urgency=none)",
            "2026-10-17 12:00:00 — Nausea 4 (urgency=4)",
            "2026-10-17 12:00:00 — urgency 2, tired (urgency=2)",
        ]
    );
}

#[tokio::test]
async fn test_entries_are_append_only() {
    let (processor, store, _) = memory_processor();
    processor
        .process_webhook_at(&payload(SENDER, "first 3"), NOW)
        .await;
    let before = store.entries().await;

    for body in ["link", "summary", "second 9"] {
        processor.process_webhook_at(&payload(SENDER, body), NOW).await;
    }

    let after = store.entries().await;
    assert_eq!(after.len(), 2);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1].urgency, Urgency::new(9));
}

#[tokio::test]
async fn test_concurrent_senders() {
    use futures::future;

    let (processor, store, _) = memory_processor();

    let futures = (0..20).map(|i| {
        let processor = processor.clone();
        let sender = format!("+1555000{:04}", i);
        let body = format!("report urgency {}", i % 10 + 1);
        async move { processor.process_webhook_at(&payload(&sender, &body), NOW).await }
    });

    let responses = future::join_all(futures).await;

    assert_eq!(responses.len(), 20);
    for response in &responses {
        assert_eq!(response.status, HttpStatus::Ok);
    }
    let entries = store.entries().await;
    assert_eq!(entries.len(), 20);
    assert!(entries.iter().all(|e| e.urgency.is_some()));
}

#[tokio::test]
async fn test_rate_limiter_guards_each_sender() {
    let (processor, store, _) = memory_processor();
    let processor = processor.with_rate_gate(Arc::new(RateLimiter::new(1, 2)));

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = processor
            .process_webhook_at(&payload(SENDER, "urgency 5"), NOW)
            .await;
        statuses.push(response.status.as_u16());
    }
    assert_eq!(statuses, [200, 200, 429]);

    let other = processor
        .process_webhook_at(&payload("+15559999999", "urgency 5"), NOW)
        .await;
    assert_eq!(other.status, HttpStatus::Ok);
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn test_default_config_runs_in_memory() {
    let mut config = AppConfig::default();
    config.relay.cron_secret = Some("nightly".into());
    config.relay.owner_number = Some(SENDER.into());
    let processor = build_processor(&config).unwrap();

    let logged = processor
        .process_webhook(&payload(SENDER, "sore throat urgency 3"))
        .await;
    assert_eq!(logged.status, HttpStatus::Ok);
    assert_eq!(response_json(&logged)["urgency"], 3);

    // no notifier configured, so replies fail upstream
    let link = processor.process_webhook(&payload(SENDER, "link")).await;
    assert_eq!(link.status, HttpStatus::BadGateway);

    let checkin = processor.trigger_daily_checkin(Some("nightly")).await;
    assert_eq!(checkin.status, HttpStatus::BadGateway);
}

#[tokio::test]
async fn test_http_app_end_to_end() {
    let config = AppConfig::default();
    let (processor, store, _) = memory_processor();
    let processor = processor.with_settings(ProcessorSettings {
        utc_offset: time::UtcOffset::from_hms(2, 0, 0).unwrap(),
        ..ProcessorSettings::default()
    });
    let app = build_app(&config, processor);

    let response = app
        .clone()
        .oneshot(
            Request::post("/android-webhook")
                .header("content-type", "application/json")
                .body(Body::from(payload(SENDER, "migraine urgency 8")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["action"], "logged_symptom");
    assert_eq!(store.len().await, 1);

    let too_big = app
        .oneshot(
            Request::post("/android-webhook")
                .body(Body::from(vec![b'x'; config.security.max_body_size + 1]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(too_big.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(too_big.headers()["content-type"], "application/json");
    let bytes = to_bytes(too_big.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        value["error"],
        format!("Payload too large: limit is {} bytes", config.security.max_body_size)
    );
    assert_eq!(store.len().await, 1);
}
