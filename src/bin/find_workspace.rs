//! Looks up the workspaces an API key can see, for filling in
//! MOTION_WORKSPACE_ID.

use anyhow::Result;
use motion_slack_bridge::motion_client::MotionClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let api_key = match std::env::var("MOTION_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => {
            eprintln!("MOTION_API_KEY not found in environment");
            eprintln!("Set it in your environment or a .env file and rerun");
            std::process::exit(1);
        }
    };

    let client = MotionClient::new(&api_key)?;

    println!("Finding your Motion workspaces...\n");

    match client.get_user_info().await {
        Ok(user) => {
            println!(
                "Logged in as: {} <{}>\n",
                user.name.as_deref().unwrap_or("Unknown"),
                user.email.as_deref().unwrap_or("unknown")
            );
        }
        Err(e) => {
            eprintln!("Could not fetch user info: {}", e);
        }
    }

    let workspaces = client.get_workspaces().await?;
    if workspaces.is_empty() {
        println!("No workspaces found for this API key.");
        println!("If you are sure you have access, contact Motion support.");
        return Ok(());
    }

    println!("Found {} workspace(s):\n", workspaces.len());
    for workspace in &workspaces {
        println!("  Name:    {}", workspace.name.as_deref().unwrap_or("Unnamed"));
        println!("  ID:      {}", workspace.id.as_deref().unwrap_or("Unknown"));
        println!(
            "  Type:    {}",
            workspace.workspace_type.as_deref().unwrap_or("Unknown")
        );
        println!(
            "  Team ID: {}",
            workspace.team_id.as_deref().unwrap_or("Unknown")
        );
        if !workspace.labels.is_empty() {
            let labels: Vec<_> = workspace
                .labels
                .iter()
                .map(|l| l.name.as_deref().unwrap_or("Unnamed"))
                .collect();
            println!("  Labels:  {}", labels.join(", "));
        }
        if !workspace.statuses.is_empty() {
            let statuses: Vec<_> = workspace
                .statuses
                .iter()
                .map(|s| s.name.as_deref().unwrap_or("Unnamed"))
                .collect();
            println!("  Statuses: {}", statuses.join(", "));
        }
        println!();
    }

    println!("To use a workspace, set its ID in your environment:");
    if let [only] = workspaces.as_slice() {
        println!(
            "MOTION_WORKSPACE_ID={}",
            only.id.as_deref().unwrap_or("<workspace-id>")
        );
    } else {
        println!("MOTION_WORKSPACE_ID=<copy-the-workspace-id-from-above>");
    }

    Ok(())
}
