//! Classification of inbound texts into one of four actions.
//!
//! The router never writes anything. It may read the [`RowStore`] to build a
//! summary or fetch the share link, and hands back a [`RouterResult`] that the
//! caller executes.

use time::OffsetDateTime;
use tracing::debug;

use crate::{RowStore, StoreError, SymptomEntry, Urgency};

/// Number of entries a summary reply lists unless configured otherwise.
pub const DEFAULT_SUMMARY_SIZE: usize = 3;

/// Reply keywords, compared case-insensitively against the trimmed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandWords {
    pub link: String,
    pub summary: String,
}

impl Default for CommandWords {
    fn default() -> Self {
        Self {
            link: "link".to_string(),
            summary: "summary".to_string(),
        }
    }
}

/// What a body asks for, before any store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Link,
    Summary,
    Blank,
    Symptom,
}

/// Decision for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterResult {
    /// Append the entry to the row store.
    LogEntry(SymptomEntry),
    /// Reply with the store's share link.
    LinkReply(String),
    /// Reply with recent entries, one per line, oldest first. Empty when the
    /// store holds nothing yet.
    SummaryReply(String),
    NoAction,
}

impl RouterResult {
    /// Stable action name used in webhook responses and logs.
    pub fn action(&self) -> &'static str {
        match self {
            RouterResult::LogEntry(_) => "logged_symptom",
            RouterResult::LinkReply(_) => "sent_link",
            RouterResult::SummaryReply(_) => "sent_summary",
            RouterResult::NoAction => "no_action",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    commands: CommandWords,
    summary_size: usize,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(CommandWords::default(), DEFAULT_SUMMARY_SIZE)
    }
}

impl MessageRouter {
    pub fn new(commands: CommandWords, summary_size: usize) -> Self {
        Self {
            commands,
            summary_size,
        }
    }

    pub fn commands(&self) -> &CommandWords {
        &self.commands
    }

    pub fn summary_size(&self) -> usize {
        self.summary_size
    }

    pub fn classify(&self, body: &str) -> Command {
        let trimmed = body.trim();
        // Unicode case folding; command words need not be ASCII
        let folded = trimmed.to_lowercase();
        if folded == self.commands.link.trim().to_lowercase() {
            Command::Link
        } else if folded == self.commands.summary.trim().to_lowercase() {
            Command::Summary
        } else if trimmed.is_empty() {
            Command::Blank
        } else {
            Command::Symptom
        }
    }

    /// Decide what to do with `body` received from `sender` at `now`.
    ///
    /// Only a summary touches the store; its read error is passed through.
    pub async fn route<S>(
        &self,
        store: &S,
        sender: &str,
        body: &str,
        now: OffsetDateTime,
    ) -> Result<RouterResult, StoreError>
    where
        S: RowStore + ?Sized,
    {
        let result = match self.classify(body) {
            Command::Link => RouterResult::LinkReply(store.share_url()),
            Command::Summary => {
                let entries = store.recent(self.summary_size).await?;
                let skip = entries.len().saturating_sub(self.summary_size);
                RouterResult::SummaryReply(render_summary(&entries[skip..]))
            }
            Command::Blank => RouterResult::NoAction,
            Command::Symptom => {
                let urgency = Urgency::extract(body);
                if urgency.is_none() {
                    debug!(sender, "no urgency rating found, logging without one");
                }
                RouterResult::LogEntry(SymptomEntry::received_at(now, body, urgency))
            }
        };
        debug!(sender, action = result.action(), "routed message");
        Ok(result)
    }
}

/// One line per entry in the order given.
pub fn render_summary(entries: &[SymptomEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
