//! Turns a completed Motion task into Slack mrkdwn text.
//!
//! Everything here is a pure function of the task's fields; missing
//! optional fields get their display defaults applied in one place.

use chrono::DateTime;

use crate::motion_client::{Task, TaskDuration};

/// Character budget for the description line, ellipsis included.
const DESCRIPTION_LIMIT: usize = 300;
const ELLIPSIS: &str = "...";

// Motion descriptions are rich text; map the inline tags we know about to
// Slack mrkdwn and turn block tags into line breaks.
const TAG_REPLACEMENTS: &[(&str, &str)] = &[
    ("<b>", "*"),
    ("</b>", "*"),
    ("<strong>", "*"),
    ("</strong>", "*"),
    ("<i>", "_"),
    ("</i>", "_"),
    ("<em>", "_"),
    ("</em>", "_"),
    ("<li>", "• "),
    ("</li>", "\n"),
    ("<ul>", "\n"),
    ("</ul>", "\n"),
    ("<ol>", "\n"),
    ("</ol>", "\n"),
    ("<p>", ""),
    ("</p>", "\n"),
    ("<br>", "\n"),
    ("<br/>", "\n"),
    ("<br />", "\n"),
    ("<div>", ""),
    ("</div>", "\n"),
];

// &amp; last so unescaping cannot manufacture new entities.
const ENTITY_REPLACEMENTS: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

/// Render a duration as "Xh Ym" / "Xm" minutes, or the fixed phrase for a
/// sentinel value.
pub fn format_duration(duration: Option<&TaskDuration>) -> String {
    match duration {
        Some(TaskDuration::Minutes(minutes)) => {
            let total = *minutes as i64;
            let hours = total / 60;
            let mins = total % 60;
            if hours > 0 {
                format!("{}h {}m", hours, mins)
            } else {
                format!("{}m", mins)
            }
        }
        Some(TaskDuration::Label(label)) => match label.as_str() {
            "NONE" => "No duration set".to_string(),
            "REMINDER" => "Reminder only".to_string(),
            other => other.to_string(),
        },
        None => "No duration set".to_string(),
    }
}

/// Strip rich-text markup down to Slack-friendly plain text, drop blank
/// lines, and truncate to the description budget.
pub fn clean_description(raw: &str) -> String {
    let mut text = raw.to_string();
    for (tag, replacement) in TAG_REPLACEMENTS {
        text = text.replace(tag, replacement);
    }
    for (entity, replacement) in ENTITY_REPLACEMENTS {
        text = text.replace(entity, replacement);
    }

    let text = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    truncate(&text, DESCRIPTION_LIMIT)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit - ELLIPSIS.len()).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Build the Slack message for a completed task.
pub fn format_task_message(task: &Task) -> String {
    let mut message = format!("✅ *Task Completed: {}*\n", task.display_name());

    if let Some(description) = task.description.as_deref() {
        let cleaned = clean_description(description);
        if !cleaned.is_empty() {
            message.push_str(&format!("📝 Description: _{}_\n", cleaned));
        }
    }

    let project = task
        .project
        .as_ref()
        .and_then(|p| p.name.as_deref())
        .unwrap_or("No project");
    message.push_str(&format!("📁 Project: {}\n", project));

    message.push_str(&format!(
        "⏱️ Duration: {}\n",
        format_duration(task.duration.as_ref())
    ));

    let status = task
        .status
        .as_ref()
        .and_then(|s| s.name.as_deref())
        .unwrap_or("Completed");
    message.push_str(&format!("📊 Status: {}\n", status));

    if let Some(raw) = task.completed_time.as_deref() {
        // Unparseable timestamps are shown raw rather than dropped.
        let rendered = match DateTime::parse_from_rfc3339(raw) {
            Ok(instant) => instant.format("%I:%M %p").to_string(),
            Err(_) => raw.to_string(),
        };
        message.push_str(&format!("✓ Completed at: {}", rendered));
    }

    message
}
