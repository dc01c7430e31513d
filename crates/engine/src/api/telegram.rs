//! Telegram Bot API notifier (sendMessage)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{Notifier, SignalAlert};
use crate::error::NotifyError;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }
}

/// Interpret a sendMessage reply. Any non-2xx status is a rejection whatever
/// the body holds; a 2xx body must parse and carry `ok: true`.
pub(crate) fn check_send_response(status: StatusCode, body: &str) -> Result<(), NotifyError> {
    let parsed = serde_json::from_str::<SendMessageResponse>(body);

    if !status.is_success() {
        let reason = parsed
            .ok()
            .and_then(|r| r.description)
            .unwrap_or_else(|| format!("HTTP {}", status));
        return Err(NotifyError::Rejected(reason));
    }

    match parsed {
        Ok(r) if r.ok => Ok(()),
        Ok(r) => Err(NotifyError::Rejected(
            r.description.unwrap_or_else(|| "ok: false".to_string()),
        )),
        Err(e) => Err(NotifyError::Rejected(format!("unreadable response: {e}"))),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, alert: &SignalAlert) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": alert.message(),
        });

        debug!(symbol = %alert.symbol, "Sending Telegram message");
        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        let body = response.text().await?;
        check_send_response(status, &body)?;

        info!(symbol = %alert.symbol, direction = %alert.direction, "Telegram message delivered");
        Ok(())
    }
}
