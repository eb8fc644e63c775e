//! Slack Web API client for posting channel messages.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ApiError;
use crate::retry::{with_retry, RetryPolicy};

const DEFAULT_BASE_URL: &str = "https://slack.com/api";

pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackResponse {
    #[serde(default)]
    pub ok: bool,
    pub error: Option<String>,
    pub team: Option<String>,
    pub user: Option<String>,
}

impl SlackClient {
    pub fn new(bot_token: &str) -> anyhow::Result<Self> {
        Self::with_base_url(bot_token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(bot_token: &str, base_url: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", bot_token))
            .map_err(|_| anyhow::anyhow!("SLACK_BOT_TOKEN contains invalid characters"))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Post a mrkdwn-formatted message to a channel. Rate limiting is waited
    /// out; any other non-ok response from Slack is a hard failure for this
    /// one message.
    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), ApiError> {
        let payload = serde_json::json!({
            "channel": channel,
            "text": text,
            "mrkdwn": true,
        });

        with_retry(&self.retry, "POST chat.postMessage", || {
            self.call_once("chat.postMessage", Some(&payload))
        })
        .await?;

        tracing::info!("Message posted to {}", channel);
        Ok(())
    }

    /// Verify the bot token; returns the team and user Slack reports.
    pub async fn auth_test(&self) -> Result<SlackResponse, ApiError> {
        with_retry(&self.retry, "GET auth.test", || {
            self.call_once("auth.test", None)
        })
        .await
    }

    async fn call_once(
        &self,
        endpoint: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<SlackResponse, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let request = match payload {
            Some(body) => self.http.post(&url).json(body),
            None => self.http.get(&url),
        };
        let response = request.send().await?;

        let status = response.status();
        // Capture before the body is consumed; throttling may be signalled
        // either by the status code or inside an ok:false payload.
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::Throttled { retry_after });
        }
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        let data: SlackResponse = response.json().await?;
        if !data.ok {
            let error = data
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            if error == "ratelimited" {
                return Err(ApiError::Throttled { retry_after });
            }
            return Err(ApiError::Api(error));
        }

        Ok(data)
    }
}
