use parking_lot::Mutex;
use shortly_core::{OwnerId, ShortKey, ShortenerError, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Settings for [`DeleteAggregator`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct AggregatorSettings {
    /// How often accumulated deletes are written to storage.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
    /// Capacity of the submission queue.
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// How long [`DeleteAggregator::submit`] waits for room in a full queue.
    ///
    /// `None` waits for as long as it takes.
    #[builder(default, setter(strip_option))]
    pub submit_timeout: Option<Duration>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

enum Command {
    Delete { owner: OwnerId, keys: Vec<ShortKey> },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
struct WorkerHandle {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Coalesces delete requests per owner and writes them to storage in bulk.
///
/// A single task owns the per-owner accumulation map; producers reach it
/// only through a bounded queue, so a full queue makes [`submit`] wait.
/// The map is flushed on every tick of the flush interval, on [`flush`],
/// and once more during [`shutdown`].
///
/// [`submit`]: DeleteAggregator::submit
/// [`flush`]: DeleteAggregator::flush
/// [`shutdown`]: DeleteAggregator::shutdown
#[derive(Debug)]
pub struct DeleteAggregator {
    sender: mpsc::Sender<Command>,
    submit_timeout: Option<Duration>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl DeleteAggregator {
    /// Starts the aggregator task on the current Tokio runtime.
    pub fn spawn<S: Storage>(storage: Arc<S>, settings: AggregatorSettings) -> Self {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let (stop, stop_rx) = oneshot::channel();

        let worker = Worker {
            storage,
            receiver,
            pending: HashMap::new(),
        };
        let handle = tokio::spawn(worker.run(settings.flush_interval, stop_rx));

        Self {
            sender,
            submit_timeout: settings.submit_timeout,
            worker: Mutex::new(Some(WorkerHandle { stop, handle })),
        }
    }

    /// Queues `keys` of `owner` for deletion and returns without waiting
    /// for the deletion itself.
    pub async fn submit(&self, owner: OwnerId, keys: Vec<ShortKey>) -> Result<(), ShortenerError> {
        if keys.is_empty() {
            return Ok(());
        }

        let command = Command::Delete { owner, keys };
        match self.submit_timeout {
            None => self
                .sender
                .send(command)
                .await
                .map_err(|_| ShortenerError::AggregatorClosed),
            Some(timeout) => match self.sender.send_timeout(command, timeout).await {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(ShortenerError::DeleteQueueSaturated),
                Err(SendTimeoutError::Closed(_)) => Err(ShortenerError::AggregatorClosed),
            },
        }
    }

    /// Flushes everything submitted so far and waits until it reached storage.
    pub async fn flush(&self) -> Result<(), ShortenerError> {
        let (done, done_rx) = oneshot::channel();
        self.sender
            .send(Command::Flush(done))
            .await
            .map_err(|_| ShortenerError::AggregatorClosed)?;
        done_rx.await.map_err(|_| ShortenerError::AggregatorClosed)
    }

    /// Stops the timer, closes the queue, drains it and flushes one last time.
    ///
    /// Later submissions fail with [`ShortenerError::AggregatorClosed`].
    /// Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return;
        };

        // the receiver is gone only if the task already ended
        let _ = worker.stop.send(());
        if let Err(err) = worker.handle.await {
            warn!(error = %err, "delete aggregator ended abnormally");
        }
    }
}

struct Worker<S> {
    storage: Arc<S>,
    receiver: mpsc::Receiver<Command>,
    pending: HashMap<OwnerId, Vec<ShortKey>>,
}

impl<S: Storage> Worker<S> {
    async fn run(mut self, every: Duration, mut stop: oneshot::Receiver<()>) {
        info!(?every, "delete aggregator started");

        let mut ticker = time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => self.flush().await,
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        // Order matters: nothing queued before the close may be lost.
        drop(ticker);
        self.receiver.close();
        while let Some(command) = self.receiver.recv().await {
            self.handle(command).await;
        }
        self.flush().await;

        info!("delete aggregator stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Delete { owner, keys } => {
                trace!(owner = %owner, count = keys.len(), "queued keys for deletion");
                self.pending.entry(owner).or_default().extend(keys);
            }
            Command::Flush(done) => {
                self.flush().await;
                let _ = done.send(());
            }
        }
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut self.pending);
        debug!(owners = pending.len(), "flushing queued deletions");

        for (owner, keys) in pending {
            if let Err(err) = self.storage.batch_delete(owner, &keys).await {
                warn!(
                    owner = %owner,
                    count = keys.len(),
                    error = %err,
                    "batch delete failed, dropping keys"
                );
            }
        }
    }
}
