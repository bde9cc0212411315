//! In-process collaborators for development and tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{Notifier, RowStore, SendError, StoreError, SymptomEntry};

/// Row store kept in memory; contents vanish with the process.
#[derive(Debug, Clone)]
pub struct MemoryRowStore {
    rows: Arc<RwLock<Vec<SymptomEntry>>>,
    share_url: String,
}

impl MemoryRowStore {
    pub fn new(share_url: impl Into<String>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            share_url: share_url.into(),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub async fn entries(&self) -> Vec<SymptomEntry> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn append(&self, entry: &SymptomEntry) -> Result<(), StoreError> {
        self.rows.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, n: usize) -> Result<Vec<SymptomEntry>, StoreError> {
        let rows = self.rows.read().await;
        let skip = rows.len().saturating_sub(n);
        Ok(rows[skip..].to_vec())
    }

    fn share_url(&self) -> String {
        self.share_url.clone()
    }
}

/// A message captured by [`MemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub text: String,
}

/// Notifier that records every message instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every send is rejected; nothing is recorded.
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, to: &str, text: &str) -> Result<(), SendError> {
        if self.fail {
            return Err(SendError::Rejected("memory notifier set to fail".into()));
        }
        info!(to, "recorded outbound message");
        self.sent.write().await.push(SentMessage {
            to: to.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Stand-in used when no delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, to: &str, text: &str) -> Result<(), SendError> {
        warn!(to, len = text.len(), "dropping outbound message, no notifier configured");
        Err(SendError::NotConfigured("no outbound channel".into()))
    }
}
