use crate::files::write_json_atomically;
use anyhow::Context;
use niawase_engine::error::WorkflowError;
use niawase_engine::traits::{Identity, ProfilePatch, ProfileRecord, ProfileStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

type Records = BTreeMap<String, ProfileRecord>;

/// Profile records for every owner, kept in one JSON document keyed by owner id.
#[derive(Debug)]
pub struct JsonFileProfileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileProfileStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_all(path: &Path) -> anyhow::Result<Records> {
    if !path.exists() {
        return Ok(Records::new());
    }
    let raw = std::fs::read(path).with_context(|| format!("read profiles: {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parse profiles: {}", path.display()))
}

fn store_failure(e: anyhow::Error) -> WorkflowError {
    WorkflowError::RemoteFailure(format!("profile store: {e:#}"))
}

/// File IO runs on the blocking pool so the executor threads stay free.
async fn blocking<T, F>(f: F) -> Result<T, WorkflowError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("profile store task")
        .and_then(|r| r)
        .map_err(store_failure)
}

#[async_trait::async_trait]
impl ProfileStore for JsonFileProfileStore {
    async fn merge(&self, identity: &Identity, patch: ProfilePatch) -> Result<(), WorkflowError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let owner = identity.owner.as_str().to_string();
        blocking(move || {
            let mut records = read_all(&path)?;
            records.entry(owner).or_default().merge(patch);
            write_json_atomically(&path, &records)
        })
        .await
    }

    async fn load(&self, identity: &Identity) -> Result<Option<ProfileRecord>, WorkflowError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let owner = identity.owner.as_str().to_string();
        blocking(move || Ok(read_all(&path)?.remove(&owner))).await
    }
}

/// Keeps records in memory only.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    records: Mutex<Records>,
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn merge(&self, identity: &Identity, patch: ProfilePatch) -> Result<(), WorkflowError> {
        self.records
            .lock()
            .await
            .entry(identity.owner.as_str().to_string())
            .or_default()
            .merge(patch);
        Ok(())
    }

    async fn load(&self, identity: &Identity) -> Result<Option<ProfileRecord>, WorkflowError> {
        Ok(self.records.lock().await.get(identity.owner.as_str()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use niawase_core::types::{Gender, Locator, OwnerId, SlotId};

    fn identity(owner: &str) -> Identity {
        Identity::new(OwnerId::new(owner), "tok")
    }

    #[tokio::test]
    async fn merges_per_owner_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let store = JsonFileProfileStore::at_path(&path);

        store
            .merge(
                &identity("a"),
                ProfilePatch {
                    name: Some("Aiko".into()),
                    gender: Some(Gender::Other),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .merge(
                &identity("a"),
                ProfilePatch::upload(SlotId::BackImage, Locator::new("https://cdn/b")),
            )
            .await
            .unwrap();
        store
            .merge(&identity("b"), ProfilePatch::upload(SlotId::FrontImage, Locator::new("x")))
            .await
            .unwrap();

        let reopened = JsonFileProfileStore::at_path(&path);
        let a = reopened.load(&identity("a")).await.unwrap().unwrap();
        assert_eq!(a.name.as_deref(), Some("Aiko"));
        assert_eq!(a.gender, Some(Gender::Other));
        assert_eq!(a.uploads[&SlotId::BackImage].as_str(), "https://cdn/b");
        assert!(reopened.load(&identity("c")).await.unwrap().is_none());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"backImage\""));
        assert!(raw.contains("その他"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_merges_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileProfileStore::at_path(
            dir.path().join("profiles.json"),
        ));

        let writes: Vec<_> = SlotId::ALL
            .into_iter()
            .map(|slot| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .merge(
                            &identity("a"),
                            ProfilePatch::upload(slot, Locator::new(format!("https://cdn/{slot}"))),
                        )
                        .await
                })
            })
            .collect();
        for write in writes {
            write.await.unwrap().unwrap();
        }

        let rec = store.load(&identity("a")).await.unwrap().unwrap();
        assert_eq!(rec.uploads.len(), SlotId::ALL.len());
    }

    #[tokio::test]
    async fn forgetting_uploads_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let store = JsonFileProfileStore::at_path(&path);
        store
            .merge(&identity("a"), ProfilePatch::upload(SlotId::SideImage, Locator::new("s")))
            .await
            .unwrap();
        store
            .merge(&identity("a"), ProfilePatch::forget_uploads())
            .await
            .unwrap();

        let rec = JsonFileProfileStore::at_path(&path)
            .load(&identity("a"))
            .await
            .unwrap()
            .unwrap();
        assert!(rec.uploads.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_remote_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = JsonFileProfileStore::at_path(&path);
        let err = store.load(&identity("a")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RemoteFailure(_)));
    }

    #[tokio::test]
    async fn memory_store_merges() {
        let store = MemoryProfileStore::default();
        assert!(store.load(&identity("a")).await.unwrap().is_none());
        store
            .merge(&identity("a"), ProfilePatch::upload(SlotId::FrontVideo, Locator::new("v")))
            .await
            .unwrap();
        let rec = store.load(&identity("a")).await.unwrap().unwrap();
        assert_eq!(rec.uploads.len(), 1);
    }
}
