use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub motion_api_key: String,
    pub motion_workspace_id: String,
    pub slack_bot_token: String,
    pub slack_channel: String,
    pub poll_interval_secs: u64,
    pub state_file: PathBuf,
}

impl Config {
    /// Load configuration from the environment. All missing required keys
    /// are reported together rather than one at a time.
    pub fn from_env() -> Result<Self> {
        let mut missing = Vec::new();

        let motion_api_key = require("MOTION_API_KEY", &mut missing);
        let motion_workspace_id = require("MOTION_WORKSPACE_ID", &mut missing);
        let slack_bot_token = require("SLACK_BOT_TOKEN", &mut missing);

        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }

        Ok(Self {
            motion_api_key,
            motion_workspace_id,
            slack_bot_token,
            slack_channel: env::var("SLACK_CHANNEL")
                .unwrap_or_else(|_| "#dev-rel".to_string()),
            poll_interval_secs: env::var("POLL_INTERVAL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("POLL_INTERVAL must be a valid number")?,
            state_file: env::var("STATE_FILE")
                .unwrap_or_else(|_| "state.json".to_string())
                .into(),
        })
    }
}

fn require(name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            missing.push(name);
            String::new()
        }
    }
}
