//! The finalize run: persisting remote-cache misses recorded by setup.
//!
//! Finalize never fails the job. A missing or unsuccessful run record skips
//! persistence with a warning, and each pending record is saved on its own so
//! one failed save does not prevent the other.

use tracing::{debug, info, warn};

use crate::cache::RemoteCache;
use crate::state::{RunRecord, StateFile};

/// What a finalize run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Keys saved successfully
    pub saved: Vec<String>,
    /// Keys whose save failed
    pub failed: Vec<String>,
    /// `true` when persistence was skipped entirely
    pub skipped: bool,
}

impl FinalizeReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Persists every pending record of a successful setup run, then removes the
/// state file.
pub async fn finalize(state_file: &StateFile, cache: Option<&dyn RemoteCache>) -> FinalizeReport {
    let report = match state_file.load() {
        Ok(Some(record)) => persist(record, cache).await,
        Ok(None) => {
            warn!(
                "⚠️ No setup run recorded at {}, not saving cache",
                state_file.path().display()
            );
            return FinalizeReport::skipped();
        }
        Err(e) => {
            warn!("⚠️ Failed to read setup run record: {:#}", e);
            FinalizeReport::skipped()
        }
    };

    if let Err(e) = state_file.remove().await {
        warn!("⚠️ Failed to remove {}: {:#}", state_file.path().display(), e);
    }

    report
}

async fn persist(record: RunRecord, cache: Option<&dyn RemoteCache>) -> FinalizeReport {
    if !record.success {
        warn!("⚠️ Setup did not complete successfully, not saving cache");
        return FinalizeReport::skipped();
    }

    if record.pending.is_empty() {
        debug!("Nothing to save");
        return FinalizeReport::default();
    }

    let Some(cache) = cache else {
        warn!("⚠️ No cache store configured, not saving {} pending entries", record.pending.len());
        return FinalizeReport::skipped();
    };

    let mut report = FinalizeReport::default();
    for pending in record.pending {
        let tool = pending.artifact.name();
        info!("ℹ️ Saving {} cache with the key of {}", tool, pending.key);

        match cache.save(&pending.directory, &[tool.to_string()], &pending.key).await {
            Ok(()) => report.saved.push(pending.key),
            Err(e) => {
                warn!("⚠️ Failed to save cache for {}: {:#}", tool, e);
                report.failed.push(pending.key);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PendingPersist;
    use crate::test_utils::FakeRemoteCache;
    use crate::wordpress::Artifact;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(success: bool) -> RunRecord {
        RunRecord {
            success,
            recorded_at: None,
            pending: vec![
                PendingPersist {
                    artifact: Artifact::WordPress,
                    directory: PathBuf::from("/tmp/wp"),
                    key: "1::wordpress:6.4.3".to_string(),
                },
                PendingPersist {
                    artifact: Artifact::TestLibrary,
                    directory: PathBuf::from("/tmp/wp"),
                    key: "1::wordpress-tests-lib:6.4.3".to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_missing_record_persists_nothing() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("state.json"));
        let cache = FakeRemoteCache::new();

        let report = finalize(&state, Some(&cache)).await;

        assert!(report.skipped);
        assert!(cache.saved().is_empty());
    }

    #[tokio::test]
    async fn test_unsuccessful_run_persists_nothing() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("state.json"));
        state.save(&record(false)).unwrap();
        let cache = FakeRemoteCache::new();

        let report = finalize(&state, Some(&cache)).await;

        assert!(report.skipped);
        assert!(cache.saved().is_empty());
        assert!(!state.path().exists());
    }

    #[tokio::test]
    async fn test_successful_run_persists_each_record() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("state.json"));
        state.save(&record(true)).unwrap();
        let cache = FakeRemoteCache::new();

        let report = finalize(&state, Some(&cache)).await;

        assert_eq!(report.saved, vec!["1::wordpress:6.4.3", "1::wordpress-tests-lib:6.4.3"]);
        assert_eq!(
            cache.saved(),
            vec![
                (PathBuf::from("/tmp/wp"), "1::wordpress:6.4.3".to_string()),
                (PathBuf::from("/tmp/wp"), "1::wordpress-tests-lib:6.4.3".to_string()),
            ]
        );
        assert!(!state.path().exists());
    }

    #[tokio::test]
    async fn test_one_failed_save_does_not_block_the_other() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("state.json"));
        state.save(&record(true)).unwrap();
        let cache = FakeRemoteCache::new();
        cache.fail_save("1::wordpress:6.4.3");

        let report = finalize(&state, Some(&cache)).await;

        assert!(!report.skipped);
        assert_eq!(report.failed, vec!["1::wordpress:6.4.3"]);
        assert_eq!(report.saved, vec!["1::wordpress-tests-lib:6.4.3"]);
    }

    #[tokio::test]
    async fn test_without_cache_store_nothing_is_saved() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("state.json"));
        state.save(&record(true)).unwrap();

        let report = finalize(&state, None).await;

        assert!(report.skipped);
        assert!(!state.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_skipped() {
        let temp = TempDir::new().unwrap();
        let state = StateFile::new(temp.path().join("state.json"));
        std::fs::write(state.path(), "garbage").unwrap();
        let cache = FakeRemoteCache::new();

        let report = finalize(&state, Some(&cache)).await;

        assert!(report.skipped);
        assert!(cache.saved().is_empty());
    }
}
