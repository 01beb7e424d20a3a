//! Async runtime for feed updaters.
//!
//! Each feed's [`UpdateEngine`] runs in its own tokio task and is driven
//! through a command channel, which makes the task the feed's single
//! writer. A periodic tick publishes changes that were staged by batches
//! not eligible for immediate publication. [`FeedUpdaters`] fans batches
//! of different feeds out to their tasks concurrently.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::engine::{BatchResult, UpdateEngine};
use crate::feed::UpdateBatch;

/// Errors from talking to a feed updater task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("feed updater has shut down")]
    ChannelClosed,

    #[error("no updater registered for feed {0}")]
    UnknownFeed(String),
}

enum Command {
    Apply {
        batch: UpdateBatch,
        resp: oneshot::Sender<BatchResult>,
    },
    Flush {
        resp: oneshot::Sender<Option<u64>>,
    },
    Shutdown {
        resp: oneshot::Sender<Option<u64>>,
    },
}

/// Handle to a running feed updater. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedUpdaterHandle {
    feed_id: String,
    cmd_tx: mpsc::Sender<Command>,
}

impl FeedUpdaterHandle {
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// Applies a batch and waits for its result.
    pub async fn apply(&self, batch: UpdateBatch) -> Result<BatchResult, RuntimeError> {
        let (resp, rx) = oneshot::channel();
        self.send(Command::Apply { batch, resp }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Publishes staged changes now. Returns the new version, if any.
    pub async fn flush(&self) -> Result<Option<u64>, RuntimeError> {
        let (resp, rx) = oneshot::channel();
        self.send(Command::Flush { resp }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Publishes staged changes and stops the task.
    pub async fn shutdown(&self) -> Result<Option<u64>, RuntimeError> {
        let (resp, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

/// Spawns a task that owns `engine` and applies batches sent to it.
///
/// Must be called from within a tokio runtime.
pub fn spawn_feed_updater(engine: UpdateEngine) -> FeedUpdaterHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(64);
    let feed_id = engine.feed_id().to_string();
    let period = engine
        .config()
        .max_publish_delay()
        .max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut engine = engine;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        // Every handle is gone; publish what callers were told succeeded
                        engine.force_publish();
                        break;
                    };
                    match cmd {
                        Command::Apply { batch, resp } => {
                            let _ = resp.send(engine.apply_batch(batch));
                        }
                        Command::Flush { resp } => {
                            let _ = resp.send(engine.force_publish());
                        }
                        Command::Shutdown { resp } => {
                            let _ = resp.send(engine.force_publish());
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if let Some(version) = engine.flush_if_due(Instant::now()) {
                        trace!(feed = engine.feed_id(), version, "Periodic flush published");
                    }
                }
            }
        }
        debug!(feed = engine.feed_id(), "Feed updater stopped");
    });

    FeedUpdaterHandle { feed_id, cmd_tx }
}

/// Running feed updaters, keyed by feed id.
#[derive(Debug, Clone, Default)]
pub struct FeedUpdaters {
    handles: HashMap<String, FeedUpdaterHandle>,
}

impl FeedUpdaters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns an updater for the engine's feed, replacing any previous one.
    pub fn spawn(&mut self, engine: UpdateEngine) -> FeedUpdaterHandle {
        let handle = spawn_feed_updater(engine);
        self.handles
            .insert(handle.feed_id().to_string(), handle.clone());
        handle
    }

    pub fn get(&self, feed_id: &str) -> Option<&FeedUpdaterHandle> {
        self.handles.get(feed_id)
    }

    /// Applies batches concurrently, each on its feed's updater.
    ///
    /// Results are returned in the order of `batches`.
    pub async fn apply_all(
        &self,
        batches: Vec<UpdateBatch>,
    ) -> Vec<Result<BatchResult, RuntimeError>> {
        let futures = batches.into_iter().map(|batch| async move {
            match self.handles.get(&batch.feed_id) {
                Some(handle) => handle.apply(batch).await,
                None => Err(RuntimeError::UnknownFeed(batch.feed_id)),
            }
        });
        join_all(futures).await
    }

    /// Shuts every updater down, publishing what they had staged.
    pub async fn shutdown_all(&self) -> Vec<Result<Option<u64>, RuntimeError>> {
        join_all(self.handles.values().map(|h| h.shutdown())).await
    }
}
