//! # Join Notifier
//!
//! [`Notifier`] that pushes the reply text to an Android phone through a
//! Join or AutoRemote URL. A Tasker task on the phone picks the push up and
//! sends the SMS, so the recipient is decided phone-side.
//!
//! ## Example
//!
//! ```rust,ignore
//! use relay_core::Notifier;
//! use relay_join::JoinNotifier;
//!
//! let notifier = JoinNotifier::new(
//!     "https://joinjoaomgcd.appspot.com/_ah/api/messaging/v1/sendPush?apikey=KEY&deviceId=ID",
//!     Duration::from_secs(10),
//! )?;
//! notifier.send("+15551234567", "Logged.").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use relay_core::{Notifier, SendError};
use tracing::{error, info};
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct JoinNotifier {
    send_url: Url,
    http: reqwest::Client,
}

impl JoinNotifier {
    pub fn new(send_url: &str, timeout: Duration) -> Result<Self, SendError> {
        let send_url = Url::parse(send_url)
            .map_err(|e| SendError::NotConfigured(format!("invalid send url: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError::Http(e.to_string()))?;
        Ok(Self { send_url, http })
    }

    /// Send URL with `text` appended as a query parameter, keeping any
    /// parameters already present.
    pub fn request_url(&self, text: &str) -> Url {
        let mut url = self.send_url.clone();
        url.query_pairs_mut().append_pair("text", text);
        url
    }
}

#[async_trait]
impl Notifier for JoinNotifier {
    async fn send(&self, to: &str, text: &str) -> Result<(), SendError> {
        let res = self
            .http
            .get(self.request_url(text))
            .send()
            .await
            .map_err(|e| {
                error!(to, "push request failed: {}", e);
                SendError::Http(e.to_string())
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(to, %status, "push rejected");
            return Err(SendError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        let preview: String = text.chars().take(50).collect();
        info!(to, preview = %preview, "reply pushed to phone");
        Ok(())
    }
}
