//! The poll cycle: load watermark, fetch tasks, filter for new
//! completions, post each to Slack, advance the watermark.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::message;
use crate::motion_client::{MotionClient, Task};
use crate::slack_client::SlackClient;
use crate::state::StateStore;

/// Where completed tasks come from. The poll loop only ever needs the full
/// task set for one workspace.
#[allow(async_fn_in_trait)]
pub trait TaskSource {
    async fn fetch_tasks(&self, workspace_id: &str) -> Result<Vec<Task>>;
}

/// Where notifications go.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, channel: &str, text: &str) -> Result<()>;
}

impl TaskSource for MotionClient {
    async fn fetch_tasks(&self, workspace_id: &str) -> Result<Vec<Task>> {
        Ok(self.get_tasks(workspace_id, true).await?)
    }
}

impl Notifier for SlackClient {
    async fn notify(&self, channel: &str, text: &str) -> Result<()> {
        self.post_message(channel, text).await?;
        Ok(())
    }
}

/// Tasks completed strictly after `since`, in ascending completion order.
/// Tasks without a parseable completion time never qualify.
pub fn newly_completed(tasks: &[Task], since: DateTime<Utc>) -> Vec<&Task> {
    let mut completions: Vec<(&Task, DateTime<Utc>)> = tasks
        .iter()
        .filter(|task| task.completed)
        .filter_map(|task| task.completed_at().map(|at| (task, at)))
        .filter(|(_, at)| *at > since)
        .collect();
    completions.sort_by_key(|(_, at)| *at);
    completions.into_iter().map(|(task, _)| task).collect()
}

/// Orchestrator tying the task source, the notifier and the watermark store
/// together. Constructed once at startup; collaborators are injected so
/// tests can substitute fakes for the two remote services.
pub struct Bridge<S, N> {
    tasks: S,
    notifier: N,
    state: StateStore,
    workspace_id: String,
    channel: String,
}

impl<S: TaskSource, N: Notifier> Bridge<S, N> {
    pub fn new(
        tasks: S,
        notifier: N,
        state: StateStore,
        workspace_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            tasks,
            notifier,
            state,
            workspace_id: workspace_id.into(),
            channel: channel.into(),
        }
    }

    /// Run one poll cycle. Returns how many notifications were delivered.
    ///
    /// The cycle-start instant is recorded before any I/O and becomes the
    /// next watermark, so tasks completed while the cycle runs are picked up
    /// next time. A delivery failure is isolated to its task; the watermark
    /// still advances, so that message is permanently skipped rather than
    /// re-sent. A fetch failure aborts before the watermark is touched.
    pub async fn check_for_completed_tasks(&self) -> Result<usize> {
        let cycle_start = Utc::now();
        let last_checked = self.state.load();
        tracing::info!("Checking for tasks completed since {}", last_checked);

        let tasks = self
            .tasks
            .fetch_tasks(&self.workspace_id)
            .await
            .context("Error fetching tasks")?;

        let new_completions = newly_completed(&tasks, last_checked);
        tracing::info!("Found {} newly completed tasks", new_completions.len());

        let mut delivered = 0;
        for task in new_completions {
            let text = message::format_task_message(task);
            match self.notifier.notify(&self.channel, &text).await {
                Ok(()) => {
                    tracing::info!("Posted to Slack: {}", task.display_name());
                    delivered += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "Error posting task '{}' to Slack: {:#}",
                        task.display_name(),
                        e
                    );
                }
            }
        }

        self.state.save(cycle_start);
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeSource {
        tasks: Vec<Task>,
        fail: bool,
    }

    impl TaskSource for &FakeSource {
        async fn fetch_tasks(&self, _workspace_id: &str) -> Result<Vec<Task>> {
            if self.fail {
                anyhow::bail!("connection reset by peer");
            }
            Ok(self.tasks.clone())
        }
    }

    struct FakeNotifier {
        sent: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(pattern: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on: Some(pattern.to_string()),
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for &FakeNotifier {
        async fn notify(&self, _channel: &str, text: &str) -> Result<()> {
            if let Some(pattern) = &self.fail_on {
                if text.contains(pattern) {
                    anyhow::bail!("message_limit_exceeded");
                }
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn watermark() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn completed_task(name: &str, at: DateTime<Utc>) -> Task {
        serde_json::from_value(json!({
            "id": name,
            "name": name,
            "completed": true,
            "completedTime": at.to_rfc3339(),
        }))
        .unwrap()
    }

    fn bridge<'a>(
        source: &'a FakeSource,
        notifier: &'a FakeNotifier,
        dir: &TempDir,
    ) -> Bridge<&'a FakeSource, &'a FakeNotifier> {
        let state = StateStore::new(dir.path().join("state.json"));
        state.save(watermark());
        Bridge::new(source, notifier, state, "ws-1", "#dev-rel")
    }

    #[test]
    fn test_filter_is_strict_and_idempotent() {
        let since = watermark();
        let tasks = vec![
            completed_task("after", since + Duration::seconds(1)),
            completed_task("before", since - Duration::seconds(1)),
            completed_task("boundary", since),
            serde_json::from_value(json!({"name": "open", "completed": false}))
                .unwrap(),
            serde_json::from_value(json!({
                "name": "garbled",
                "completed": true,
                "completedTime": "yesterday-ish"
            }))
            .unwrap(),
        ];

        let first = newly_completed(&tasks, since);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].display_name(), "after");

        let second = newly_completed(&tasks, since);
        let names = |v: &[&Task]| {
            v.iter().map(|t| t.display_name().to_string()).collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn test_filter_orders_by_completion_time() {
        let since = watermark();
        let tasks = vec![
            completed_task("third", since + Duration::seconds(30)),
            completed_task("first", since + Duration::seconds(10)),
            completed_task("second", since + Duration::seconds(20)),
        ];
        let names: Vec<_> = newly_completed(&tasks, since)
            .iter()
            .map(|t| t.display_name())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_cycle_notifies_only_new_completions_once() {
        let since = watermark();
        let source = FakeSource {
            tasks: vec![
                completed_task("fresh", since + Duration::seconds(1)),
                completed_task("stale", since - Duration::seconds(1)),
            ],
            fail: false,
        };
        let notifier = FakeNotifier::new();
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge(&source, &notifier, &dir);

        let delivered = bridge.check_for_completed_tasks().await.unwrap();
        assert_eq!(delivered, 1);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("fresh"));
    }

    #[tokio::test]
    async fn test_failed_delivery_is_isolated_and_watermark_advances() {
        let since = watermark();
        let source = FakeSource {
            tasks: vec![
                completed_task("doomed", since + Duration::seconds(1)),
                completed_task("lucky", since + Duration::seconds(2)),
            ],
            fail: false,
        };
        let notifier = FakeNotifier::failing_on("doomed");
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge(&source, &notifier, &dir);

        let delivered = bridge.check_for_completed_tasks().await.unwrap();
        assert_eq!(delivered, 1);
        assert!(notifier.sent()[0].contains("lucky"));

        // The watermark still moved to the cycle start.
        let store = StateStore::new(dir.path().join("state.json"));
        let advanced = store.load();
        assert!(advanced > since);
        assert!((Utc::now() - advanced).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_watermark_untouched() {
        let source = FakeSource {
            tasks: vec![],
            fail: true,
        };
        let notifier = FakeNotifier::new();
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge(&source, &notifier, &dir);

        assert!(bridge.check_for_completed_tasks().await.is_err());
        assert!(notifier.sent().is_empty());

        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load(), watermark());
    }

    #[tokio::test]
    async fn test_watermark_is_monotonic_across_cycles() {
        let source = FakeSource {
            tasks: vec![],
            fail: false,
        };
        let notifier = FakeNotifier::new();
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge(&source, &notifier, &dir);
        let store = StateStore::new(dir.path().join("state.json"));

        let mut previous = store.load();
        for _ in 0..3 {
            bridge.check_for_completed_tasks().await.unwrap();
            let current = store.load();
            assert!(current >= previous);
            previous = current;
        }
    }
}
