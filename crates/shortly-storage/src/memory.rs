use crate::snapshot::SnapshotFile;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shortly_core::storage::{Result, Storage};
use shortly_core::{NewRecord, OwnerId, Record, ShortKey, Stats, StorageError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Settings for [`InMemoryStorage`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct InMemorySettings {
    /// Location of the snapshot file.
    #[builder(setter(into))]
    pub path: PathBuf,
    /// How often the flusher checks for unsaved changes.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
}

impl InMemorySettings {
    fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.path.as_os_str().is_empty() {
            problems.push("missing snapshot file name");
        }
        if self.flush_interval.is_zero() {
            problems.push("flush interval must be greater than zero");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(StorageError::InvalidConfig(problems.join("; ")))
        }
    }
}

#[derive(Debug, Default)]
struct State {
    records: Vec<Record>,
    /// Set by every mutation, cleared once a snapshot containing it is taken.
    dirty: bool,
}

#[derive(Debug)]
struct Shared {
    state: RwLock<State>,
    snapshot: SnapshotFile,
    /// Held from taking the copy until the snapshot is renamed into place.
    flush_guard: tokio::sync::Mutex<()>,
}

impl Shared {
    /// Writes the snapshot if anything changed since the last flush.
    ///
    /// The records are copied under the lock and written after releasing it.
    /// On failure the dirty flag is raised again so the next tick retries.
    /// Flushes run one at a time, so an older copy never replaces a newer one.
    async fn flush(&self) -> Result<()> {
        let _guard = self.flush_guard.lock().await;

        let records = {
            let mut state = self.state.write();
            if !state.dirty {
                return Ok(());
            }
            state.dirty = false;
            state.records.clone()
        };

        if let Err(err) = self.snapshot.write(&records).await {
            self.state.write().dirty = true;
            return Err(err);
        }

        debug!(records = records.len(), "flushed in-memory storage");
        Ok(())
    }
}

#[derive(Debug)]
struct Flusher {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// In-process storage engine persisted through periodic whole-state snapshots.
///
/// Records live in an insertion-ordered `Vec` behind one read-write lock;
/// uniqueness checks are linear scans. A background task rewrites the
/// snapshot file whenever a mutation happened since its previous run, and
/// [`close`](Storage::close) stops that task and performs a final flush.
#[derive(Debug)]
pub struct InMemoryStorage {
    shared: Arc<Shared>,
    flusher: Mutex<Option<Flusher>>,
}

impl InMemoryStorage {
    /// Loads the snapshot (creating it if missing) and starts the flusher.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn open(settings: InMemorySettings) -> Result<Self> {
        settings.validate()?;

        let snapshot = SnapshotFile::new(settings.path);
        let records = snapshot.load_or_create().await?;

        let shared = Arc::new(Shared {
            state: RwLock::new(State {
                records,
                dirty: false,
            }),
            snapshot,
            flush_guard: tokio::sync::Mutex::new(()),
        });

        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_flusher(
            Arc::clone(&shared),
            settings.flush_interval,
            stop_rx,
        ));

        Ok(Self {
            shared,
            flusher: Mutex::new(Some(Flusher { stop, handle })),
        })
    }

    /// Returns the snapshot file location.
    pub fn snapshot_path(&self) -> &Path {
        self.shared.snapshot.path()
    }

    /// Writes the snapshot now if there are unsaved changes.
    pub async fn flush(&self) -> Result<()> {
        self.shared.flush().await
    }
}

async fn run_flusher(shared: Arc<Shared>, every: Duration, mut stop: oneshot::Receiver<()>) {
    info!(path = %shared.snapshot.path().display(), ?every, "snapshot flusher started");

    let mut ticker = time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                if let Err(err) = shared.flush().await {
                    warn!(error = %err, "snapshot flush failed, retrying on next tick");
                }
            }
        }
    }

    info!("snapshot flusher stopped");
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn store(&self, owner: OwnerId, key: &ShortKey, url: &str) -> Result<()> {
        let mut state = self.shared.state.write();

        if let Some(existing) = state
            .records
            .iter()
            .find(|r| r.is_live() && r.original_url == url)
        {
            return Err(StorageError::AlreadyExists {
                existing_key: existing.key.clone(),
                url: url.to_owned(),
            });
        }

        if state.records.iter().any(|r| &r.key == key) {
            return Err(StorageError::KeyConflict(key.to_string()));
        }

        state.records.push(Record::new(owner, key.clone(), url));
        state.dirty = true;

        debug!(owner = %owner, key = %key, "stored record");
        Ok(())
    }

    async fn get(&self, key: &ShortKey) -> Result<String> {
        let state = self.shared.state.read();

        match state.records.iter().find(|r| &r.key == key) {
            Some(record) if record.deleted => Err(StorageError::Deleted(key.to_string())),
            Some(record) => Ok(record.original_url.clone()),
            None => {
                trace!(key = %key, "key not found");
                Err(StorageError::NotFound(key.to_string()))
            }
        }
    }

    async fn get_all(&self, owner: OwnerId) -> Result<HashMap<ShortKey, String>> {
        let state = self.shared.state.read();

        Ok(state
            .records
            .iter()
            .filter(|r| r.owner_id == owner && r.is_live())
            .map(|r| (r.key.clone(), r.original_url.clone()))
            .collect())
    }

    async fn batch_store(&self, owner: OwnerId, records: &[NewRecord]) -> Result<()> {
        let mut state = self.shared.state.write();

        let mut keys: HashSet<&str> = state.records.iter().map(|r| r.key.as_str()).collect();
        let mut urls: HashSet<&str> = state
            .records
            .iter()
            .filter(|r| r.is_live())
            .map(|r| r.original_url.as_str())
            .collect();

        // Nothing is written until every record in the batch has been checked.
        for record in records {
            if !keys.insert(record.key.as_str()) || !urls.insert(record.original_url.as_str()) {
                debug!(owner = %owner, key = %record.key, "batch rejected on conflict");
                return Err(StorageError::BatchConflict);
            }
        }
        drop(keys);
        drop(urls);

        state.records.extend(
            records
                .iter()
                .map(|r| Record::new(owner, r.key.clone(), r.original_url.clone())),
        );
        if !records.is_empty() {
            state.dirty = true;
        }

        debug!(owner = %owner, count = records.len(), "stored batch");
        Ok(())
    }

    async fn batch_delete(&self, owner: OwnerId, keys: &[ShortKey]) -> Result<()> {
        let keys: HashSet<&ShortKey> = keys.iter().collect();
        let mut state = self.shared.state.write();

        let mut deleted = 0usize;
        for record in state
            .records
            .iter_mut()
            .filter(|r| r.owner_id == owner && r.is_live() && keys.contains(&r.key))
        {
            record.deleted = true;
            deleted += 1;
        }
        if deleted > 0 {
            state.dirty = true;
        }

        debug!(owner = %owner, requested = keys.len(), deleted, "deleted batch");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let state = self.shared.state.read();

        let mut owners = HashSet::new();
        let mut urls = 0u64;
        for record in state.records.iter().filter(|r| r.is_live()) {
            urls += 1;
            owners.insert(record.owner_id);
        }

        Ok(Stats {
            urls,
            users: owners.len() as u64,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let flusher = self.flusher.lock().take();
        if let Some(flusher) = flusher {
            // the receiver is gone only if the task already ended
            let _ = flusher.stop.send(());
            if let Err(err) = flusher.handle.await {
                warn!(error = %err, "snapshot flusher ended abnormally");
            }
        }

        self.shared.flush().await
    }
}
