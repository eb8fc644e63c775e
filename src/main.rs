use anyhow::Result;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use motion_slack_bridge::config::Config;
use motion_slack_bridge::motion_client::MotionClient;
use motion_slack_bridge::service::Bridge;
use motion_slack_bridge::slack_client::SlackClient;
use motion_slack_bridge::state::StateStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_slack_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Motion-Slack integration (polling every {}s)",
        config.poll_interval_secs
    );
    tracing::info!("Workspace: {}", config.motion_workspace_id);
    tracing::info!("Slack channel: {}", config.slack_channel);

    let motion = MotionClient::new(&config.motion_api_key)?;
    let slack = SlackClient::new(&config.slack_bot_token)?;
    let state = StateStore::new(&config.state_file);
    let bridge = Bridge::new(
        motion,
        slack,
        state,
        config.motion_workspace_id.clone(),
        config.slack_channel.clone(),
    );

    let mut ticker = interval(Duration::from_secs(config.poll_interval_secs));
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    // A signal arriving mid-cycle is picked up here once the cycle
    // finishes, so shutdown never interrupts an in-flight request.
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, stopping...");
                break;
            }
            _ = ticker.tick() => {}
        }

        if let Err(e) = bridge.check_for_completed_tasks().await {
            tracing::error!("Error checking for completed tasks: {:#}", e);
        }
    }

    Ok(())
}
