use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted watermark: tasks completed at or before `last_checked` have
/// already been posted.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct State {
    last_checked: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted watermark. A missing or corrupt state file falls
    /// back to one hour before now, giving a first run a bounded
    /// backward-looking window instead of the full task history.
    pub fn load(&self) -> DateTime<Utc> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<State>(&content) {
                Ok(state) => return state.last_checked,
                Err(e) => {
                    tracing::error!("Error parsing state file: {}", e);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!("Error reading state file: {}", e);
            }
        }
        Utc::now() - Duration::hours(1)
    }

    /// Persist the watermark. A persistence failure is logged and swallowed;
    /// the next cycle re-notifies at worst, it never crashes the process.
    pub fn save(&self, last_checked: DateTime<Utc>) {
        let state = State {
            last_checked,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.write_atomically(&state) {
            tracing::error!("Error saving state: {}", e);
        }
    }

    // Write to a sibling temp file and rename over the target so a crash
    // mid-write cannot leave a half-written state behind.
    fn write_atomically(&self, state: &State) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let watermark = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        store.save(watermark);
        assert_eq!(store.load(), watermark);
    }

    #[test]
    fn test_missing_file_defaults_to_one_hour_ago() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let loaded = store.load();
        let expected = Utc::now() - Duration::hours(1);
        assert!((loaded - expected).num_seconds().abs() < 5);
    }

    #[test]
    fn test_corrupt_file_defaults_to_one_hour_ago() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = StateStore::new(&path);
        let loaded = store.load();
        let expected = Utc::now() - Duration::hours(1);
        assert!((loaded - expected).num_seconds().abs() < 5);
    }

    #[test]
    fn test_save_records_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path);

        let watermark = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        store.save(watermark);

        let state: State =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(state.last_checked, watermark);
        assert!((Utc::now() - state.updated_at).num_seconds().abs() < 5);
    }

    #[test]
    fn test_save_overwrites_previous_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let first = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();
        store.save(first);
        store.save(second);
        assert_eq!(store.load(), second);
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let store = StateStore::new("/nonexistent-dir/state.json");
        store.save(Utc::now());
    }
}
