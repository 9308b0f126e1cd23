//! Outbound transport: the `Transport` seam and the Bot API client.

use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use log::error;
use serde::Deserialize;
use serde_json::Value;

use crate::update::Update;

/// The remote messaging transport, as dispatch sees it.
///
/// `fetch_updates` surfaces failure so the polling loop can back off;
/// `invoke` swallows failure — it is logged and reported as `None`, never
/// propagated to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>>;
    async fn invoke(&self, method: &str, params: Value) -> Option<Value>;
}

/// Wire envelope of every Bot API response.
#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

/// HTTP client for the Telegram Bot API.
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
}

/// Client-side request timeout. Must exceed the long-poll window used by
/// the dispatch loop.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

impl TelegramApi {
    pub fn new(token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        TelegramApi {
            client,
            base_url: format!("https://api.telegram.org/bot{token}/"),
        }
    }

    async fn call(&self, method: &str, params: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .with_context(|| format!("request to {method} failed"))?;

        let body: ApiResponse = response
            .json()
            .await
            .with_context(|| format!("response from {method} is not valid JSON"))?;

        if !body.ok {
            let description = body
                .description
                .unwrap_or_else(|| "no description".to_string());
            return Err(anyhow!("{method} rejected: {description}"));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Transport for TelegramApi {
    async fn fetch_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let params = serde_json::json!({ "offset": offset, "timeout": timeout_secs });
        let result = self.call("getUpdates", &params).await?;
        serde_json::from_value(result).context("getUpdates returned an unexpected shape")
    }

    async fn invoke(&self, method: &str, params: Value) -> Option<Value> {
        match self.call(method, &params).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!("api call {method} failed: {e:#}");
                None
            }
        }
    }
}
