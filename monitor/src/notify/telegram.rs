use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::MonitorError;
use crate::notify::message::render;
use crate::notify::{Alert, Notifier};

/// Bot credentials. Opaque to the rest of the monitor.
#[derive(Clone)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends alerts to one chat through the Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    credentials: TelegramCredentials,
    unit: String,
}

impl TelegramNotifier {
    pub fn new(
        api_url: String,
        credentials: TelegramCredentials,
        unit: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            unit,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, alert), fields(symbol = %alert.symbol, kind = %alert.kind))]
    async fn notify(&self, alert: &Alert) -> Result<(), MonitorError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url, self.credentials.bot_token
        );
        let body = serde_json::json!({
            "chat_id": self.credentials.chat_id,
            "text": render(alert, &self.unit),
            "parse_mode": "HTML",
        });

        let fail = |reason: String| MonitorError::delivery_failed(alert.symbol.as_str(), reason);

        // Strip the URL from transport errors so the token never reaches logs.
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| fail(e.without_url().to_string()))?;

        let status = resp.status();
        let parsed: SendMessageResponse = resp
            .json()
            .await
            .map_err(|e| fail(format!("status {status}: {}", e.without_url())))?;

        if !status.is_success() || !parsed.ok {
            let reason = parsed
                .description
                .unwrap_or_else(|| "no description".to_string());
            return Err(fail(format!("status {status}: {reason}")));
        }

        debug!("telegram message sent");
        Ok(())
    }
}
