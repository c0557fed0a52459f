use crate::api::Notifier;
use crate::config::ApiConfig;
use crate::models::Sticker;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;

/// LINE Notify client
///
/// Every message is prefixed with a JST timestamp.
#[derive(Clone)]
pub struct LineNotifier {
    client: Client,
    token: String,
    endpoint: String,
}

impl LineNotifier {
    /// Posts to `api.line_notify_url` with the same request timeout as the exchange client
    pub fn new(token: String, api: &ApiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            token,
            endpoint: api.line_notify_url.clone(),
        })
    }

    /// Post a message, optionally with a sticker
    /// Sticker list: https://developers.line.biz/en/docs/messaging-api/sticker-list/
    pub async fn send(&self, message: &str, sticker: Option<Sticker>) -> anyhow::Result<()> {
        let mut form = vec![("message", timestamped(message, Utc::now()))];
        if let Some(sticker) = sticker {
            form.push(("stickerPackageId", sticker.package_id.to_string()));
            form.push(("stickerId", sticker.sticker_id.to_string()));
        }

        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .await
            .context("LINE Notify request failed")?
            .error_for_status()
            .context("LINE Notify rejected the message")?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn notify(&self, message: &str, sticker: Option<Sticker>) {
        if let Err(e) = self.send(message, sticker).await {
            tracing::warn!("Notification not delivered: {:#}", e);
        }
    }
}

/// `"YYYY/MM/DD HH:MM:SS  message"` in JST (UTC+9)
fn timestamped(message: &str, now: DateTime<Utc>) -> String {
    let jst = now + Duration::hours(9);
    format!("{}  {}", jst.format("%Y/%m/%d %H:%M:%S"), message)
}
