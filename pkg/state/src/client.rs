use serde::Serialize;
use serde::de::DeserializeOwned;
use slatedb::Db;
use slatedb::object_store::local::LocalFileSystem;
use slatedb::object_store::memory::InMemory;
use slatedb::object_store::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::StateError;
use crate::watch::{EventLog, EventType, WatchEvent};
use pkg_constants::controller::WATCH_CHANNEL_CAPACITY;
use pkg_constants::state::RESOURCE_VERSION_KEY;
use pkg_types::meta::{Object, StatusObject};

/// Persistent state store backed by SlateDB on a local filesystem.
/// In production this would use S3/R2/MinIO via the `object_store` crate.
///
/// Objects are stored as JSON documents under etcd-style keys. Every
/// mutation is a conditional write against the object's resource version
/// and emits a watch event; a store-wide gate serializes the
/// read-compare-write cycle so versions never interleave.
#[derive(Clone)]
pub struct StateStore {
    db: Db,
    events: EventLog,
    write_gate: Arc<Mutex<()>>,
}

impl StateStore {
    /// Open (or create) a state store rooted at `path` on the local filesystem.
    pub async fn new(path: &str) -> Result<Self, StateError> {
        info!("Opening SlateDB state store at {}", path);

        // Ensure the data directory exists before opening the object store
        std::fs::create_dir_all(path).map_err(|e| {
            StateError::Storage(format!("failed to create data directory {}: {}", path, e))
        })?;

        let object_store = Arc::new(LocalFileSystem::new_with_prefix(path).map_err(|e| {
            StateError::Storage(format!("failed to create local object store: {}", e))
        })?);
        let db = Db::open(Path::from("/"), object_store)
            .await
            .map_err(|e| StateError::Storage(format!("failed to open SlateDB: {}", e)))?;
        Ok(Self::from_db(db))
    }

    /// Open a store on an in-memory object store. Nothing survives the
    /// process; intended for tests.
    pub async fn in_memory() -> Result<Self, StateError> {
        let object_store = Arc::new(InMemory::new());
        let db = Db::open(Path::from("/"), object_store)
            .await
            .map_err(|e| StateError::Storage(format!("failed to open SlateDB: {}", e)))?;
        Ok(Self::from_db(db))
    }

    fn from_db(db: Db) -> Self {
        Self {
            db,
            events: EventLog::new(WATCH_CHANNEL_CAPACITY),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Subscribe to the watch stream of store mutations.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Store a new object under `key`, assigning it a fresh resource
    /// version. Fails with `AlreadyExists` if the key is taken.
    pub async fn create<T>(&self, key: &str, obj: &mut T) -> Result<(), StateError>
    where
        T: Object + Serialize,
    {
        let _gate = self.write_gate.lock().await;
        if self.get_raw(key).await?.is_some() {
            return Err(StateError::AlreadyExists(key.to_string()));
        }
        obj.meta_mut().resource_version = self.next_version().await?;
        self.put_raw(key, obj).await
    }

    /// Retrieve the object stored under `key`, or `None` if absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.get_raw(key).await? {
            Some(bytes) => {
                let obj = serde_json::from_slice(&bytes).map_err(|e| StateError::Codec {
                    key: key.to_string(),
                    source: e,
                })?;
                Ok(Some(obj))
            }
            None => Ok(None),
        }
    }

    /// List all objects whose keys start with `prefix`. Entries that fail
    /// to decode are skipped.
    pub async fn list_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> Result<Vec<T>, StateError> {
        let mut results = Vec::new();
        let mut iter = self
            .db
            .scan_prefix(prefix.as_bytes())
            .await
            .map_err(|e| StateError::Storage(format!("SlateDB scan_prefix failed: {}", e)))?;

        while let Ok(Some(kv)) = iter.next().await {
            if let Ok(obj) = serde_json::from_slice(&kv.value) {
                results.push(obj);
            }
        }
        Ok(results)
    }

    /// Conditionally replace the object under `key`. The caller's copy must
    /// carry the currently stored resource version or the write fails with
    /// `Conflict`. On success the object's version is advanced in place.
    pub async fn update<T>(&self, key: &str, obj: &mut T) -> Result<(), StateError>
    where
        T: Object + Serialize + DeserializeOwned,
    {
        let _gate = self.write_gate.lock().await;
        let current: T = self
            .get_unlocked(key)
            .await?
            .ok_or_else(|| StateError::NotFound(key.to_string()))?;
        self.check_version(key, &current, obj)?;
        obj.meta_mut().resource_version = self.next_version().await?;
        self.put_raw(key, obj).await
    }

    /// Conditionally persist only the status of `obj`: spec and metadata
    /// are taken from the stored object, the caller contributes the status.
    /// On success `obj` is replaced with the merged, freshly versioned
    /// object.
    pub async fn update_status<T>(&self, key: &str, obj: &mut T) -> Result<(), StateError>
    where
        T: StatusObject + Serialize + DeserializeOwned,
    {
        let _gate = self.write_gate.lock().await;
        let mut merged: T = self
            .get_unlocked(key)
            .await?
            .ok_or_else(|| StateError::NotFound(key.to_string()))?;
        self.check_version(key, &merged, obj)?;
        merged.copy_status_from(obj);
        merged.meta_mut().resource_version = self.next_version().await?;
        self.put_raw(key, &merged).await?;
        *obj = merged;
        Ok(())
    }

    /// Remove the object under `key`. Fails with `NotFound` if absent;
    /// callers relying on idempotence tolerate that on redelivery.
    pub async fn delete(&self, key: &str) -> Result<(), StateError> {
        let _gate = self.write_gate.lock().await;
        let old = self
            .get_raw(key)
            .await?
            .ok_or_else(|| StateError::NotFound(key.to_string()))?;
        self.db
            .delete(key.as_bytes())
            .await
            .map_err(|e| StateError::Storage(format!("SlateDB delete failed: {}", e)))?;
        self.events
            .emit(EventType::Delete, key.to_string(), Some(old));
        Ok(())
    }

    /// Gracefully close the state store.
    pub async fn close(self) -> Result<(), StateError> {
        info!("Closing SlateDB state store");
        self.db
            .close()
            .await
            .map_err(|e| StateError::Storage(format!("SlateDB close failed: {}", e)))
    }

    // --- internals ---

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        match self.db.get(key.as_bytes()).await {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(StateError::Storage(format!("SlateDB get failed: {}", e))),
        }
    }

    async fn get_unlocked<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.get_raw(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StateError::Codec {
                    key: key.to_string(),
                    source: e,
                }),
            None => Ok(None),
        }
    }

    fn check_version<T: Object>(&self, key: &str, stored: &T, caller: &T) -> Result<(), StateError> {
        let stored_rv = stored.meta().resource_version;
        let caller_rv = caller.meta().resource_version;
        if stored_rv != caller_rv {
            return Err(StateError::Conflict {
                key: key.to_string(),
                stored: stored_rv,
                caller: caller_rv,
            });
        }
        Ok(())
    }

    async fn put_raw<T: Serialize>(&self, key: &str, obj: &T) -> Result<(), StateError> {
        let bytes = serde_json::to_vec(obj).map_err(|e| StateError::Codec {
            key: key.to_string(),
            source: e,
        })?;
        self.db
            .put(key.as_bytes(), &bytes)
            .await
            .map_err(|e| StateError::Storage(format!("SlateDB put failed: {}", e)))?;
        self.events
            .emit(EventType::Put, key.to_string(), Some(bytes));
        Ok(())
    }

    /// Advance the persisted resource-version counter. Persisting it keeps
    /// versions monotonic across restarts. Callers hold the write gate.
    async fn next_version(&self) -> Result<u64, StateError> {
        let current = match self.get_raw(RESOURCE_VERSION_KEY).await? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StateError::Storage("corrupt resource-version counter".to_string())
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        self.db
            .put(RESOURCE_VERSION_KEY.as_bytes(), &next.to_be_bytes())
            .await
            .map_err(|e| StateError::Storage(format!("SlateDB put failed: {}", e)))?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::ipclaim::{IpClaim, IpClaimSpec};
    use pkg_types::meta::ObjectMeta;

    fn claim(name: &str) -> IpClaim {
        IpClaim {
            meta: ObjectMeta::new(name, "default"),
            spec: IpClaimSpec {
                ip_pool: "default-pool".to_string(),
                mbps: 0,
            },
            status: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let store = StateStore::in_memory().await.unwrap();
        let mut c = claim("web-0");
        store.create("/registry/ipclaims/default/web-0", &mut c)
            .await
            .unwrap();
        assert!(c.meta.resource_version > 0);

        let got: IpClaim = store
            .get("/registry/ipclaims/default/web-0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.meta.name, "web-0");
        assert_eq!(got.meta.resource_version, c.meta.resource_version);
    }

    #[tokio::test]
    async fn create_refuses_existing_key() {
        let store = StateStore::in_memory().await.unwrap();
        let mut c = claim("web-0");
        store.create("/k", &mut c).await.unwrap();
        let mut dup = claim("web-0");
        let err = store.create("/k", &mut dup).await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_rejects_stale_version() {
        let store = StateStore::in_memory().await.unwrap();
        let mut c = claim("web-0");
        store.create("/k", &mut c).await.unwrap();

        let mut fresh = c.clone();
        fresh.spec.mbps = 100;
        store.update("/k", &mut fresh).await.unwrap();

        // `c` still carries the pre-update version
        c.spec.mbps = 200;
        let err = store.update("/k", &mut c).await.unwrap_err();
        assert!(matches!(err, StateError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_status_leaves_spec_alone() {
        let store = StateStore::in_memory().await.unwrap();
        let mut c = claim("web-0");
        store.create("/k", &mut c).await.unwrap();

        // Caller mutates both spec and status, only status must persist
        c.spec.mbps = 999;
        c.status.ip = "10.0.0.5".to_string();
        store.update_status("/k", &mut c).await.unwrap();

        let got: IpClaim = store.get("/k").await.unwrap().unwrap();
        assert_eq!(got.status.ip, "10.0.0.5");
        assert_eq!(got.spec.mbps, 0);
        // The caller's copy was replaced with the merged object
        assert_eq!(c.spec.mbps, 0);
    }

    #[tokio::test]
    async fn delete_is_not_found_when_absent() {
        let store = StateStore::in_memory().await.unwrap();
        let err = store.delete("/missing").await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[tokio::test]
    async fn mutations_emit_watch_events() {
        let store = StateStore::in_memory().await.unwrap();
        let mut rx = store.subscribe();

        let mut c = claim("web-0");
        store.create("/k", &mut c).await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event_type, EventType::Put);
        assert_eq!(ev.key, "/k");
        assert!(ev.value.is_some());

        store.delete("/k").await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event_type, EventType::Delete);
        // Delete events carry the last stored value
        let bytes = ev.value.unwrap();
        let old: IpClaim = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(old.meta.name, "web-0");
    }

    #[tokio::test]
    async fn list_prefix_scopes_by_key() {
        let store = StateStore::in_memory().await.unwrap();
        let mut a = claim("web-0");
        let mut b = claim("web-1");
        let mut other = claim("db-0");
        store.create("/registry/ipclaims/default/web-0", &mut a)
            .await
            .unwrap();
        store.create("/registry/ipclaims/default/web-1", &mut b)
            .await
            .unwrap();
        store.create("/registry/ipclaims/other/db-0", &mut other)
            .await
            .unwrap();

        let claims: Vec<IpClaim> = store
            .list_prefix("/registry/ipclaims/default/")
            .await
            .unwrap();
        assert_eq!(claims.len(), 2);
    }
}
