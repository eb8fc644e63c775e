//! Connectivity check for both remote services: validates the Motion API
//! key and workspace, then the Slack bot token.

use anyhow::Result;
use motion_slack_bridge::motion_client::MotionClient;
use motion_slack_bridge::slack_client::SlackClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    if !run_checks().await? {
        eprintln!();
        eprintln!("Common fixes:");
        eprintln!("  1. Check your Motion API key is correct");
        eprintln!("  2. Individual Motion plans have no API access; Team or Enterprise is required");
        eprintln!("  3. Verify the workspace ID is correct (run find-workspace)");
        eprintln!("  4. Reinstall the Slack app if the bot token was revoked");
        std::process::exit(1);
    }

    println!();
    println!("All checks passed. The bridge is ready to run.");
    Ok(())
}

async fn run_checks() -> Result<bool> {
    let api_key = std::env::var("MOTION_API_KEY").unwrap_or_default();
    let workspace_id = std::env::var("MOTION_WORKSPACE_ID").unwrap_or_default();
    let bot_token = std::env::var("SLACK_BOT_TOKEN").unwrap_or_default();

    if api_key.is_empty() {
        eprintln!("MOTION_API_KEY not found in environment");
        return Ok(false);
    }
    if workspace_id.is_empty() {
        eprintln!("MOTION_WORKSPACE_ID not found in environment");
        return Ok(false);
    }

    let motion = MotionClient::new(&api_key)?;

    println!("Checking Motion credentials...");
    let user = match motion.get_user_info().await {
        Ok(user) => user,
        Err(e) => {
            eprintln!("Failed to get user info: {}", e);
            return Ok(false);
        }
    };
    println!(
        "  User: {} ({})",
        user.name.as_deref().unwrap_or("Unknown"),
        user.email.as_deref().unwrap_or("unknown")
    );

    println!("Listing workspaces...");
    let workspaces = match motion.get_workspaces().await {
        Ok(workspaces) if !workspaces.is_empty() => workspaces,
        Ok(_) => {
            eprintln!("No workspaces found");
            return Ok(false);
        }
        Err(e) => {
            eprintln!("Failed to list workspaces: {}", e);
            return Ok(false);
        }
    };
    for workspace in &workspaces {
        let marker = if workspace.id.as_deref() == Some(workspace_id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "  {} {} ({})",
            marker,
            workspace.name.as_deref().unwrap_or("Unnamed"),
            workspace.id.as_deref().unwrap_or("Unknown")
        );
    }

    println!("Checking workspace {}...", workspace_id);
    match motion.get_workspace(&workspace_id).await {
        Ok(workspace) => {
            println!(
                "  Workspace '{}' is valid and accessible",
                workspace.name.as_deref().unwrap_or("Unnamed")
            );
        }
        Err(e) => {
            eprintln!("Workspace {} is not accessible: {}", workspace_id, e);
            return Ok(false);
        }
    }

    println!("Fetching tasks from workspace...");
    let tasks = match motion.get_tasks(&workspace_id, true).await {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("Failed to fetch tasks: {}", e);
            return Ok(false);
        }
    };
    println!("  Found {} tasks", tasks.len());

    let mut completed: Vec<_> = tasks
        .iter()
        .filter(|t| t.completed)
        .filter_map(|t| t.completed_at().map(|at| (t, at)))
        .collect();
    completed.sort_by_key(|(_, at)| std::cmp::Reverse(*at));
    if completed.is_empty() {
        println!("  No completed tasks yet (normal for a fresh workspace)");
    } else {
        println!("  Found {} completed tasks; most recent:", completed.len());
        for (task, at) in completed.iter().take(3) {
            println!("    {} (completed: {})", task.display_name(), at);
        }
    }

    if bot_token.is_empty() {
        eprintln!("SLACK_BOT_TOKEN not found in environment; skipping Slack check");
        return Ok(false);
    }

    println!("Checking Slack credentials...");
    let slack = SlackClient::new(&bot_token)?;
    match slack.auth_test().await {
        Ok(auth) => {
            println!(
                "  Slack auth successful: {} - {}",
                auth.team.as_deref().unwrap_or("unknown team"),
                auth.user.as_deref().unwrap_or("unknown user")
            );
        }
        Err(e) => {
            eprintln!("Slack auth test failed: {}", e);
            return Ok(false);
        }
    }

    Ok(true)
}
