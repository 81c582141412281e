use pkg_constants::controller::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_MAX_BACKOFF_SECS,
    DEFAULT_MAX_CONCURRENT_RECONCILES,
};
use pkg_constants::state::HPA_PREFIX;
use pkg_state::watch::{EventLog, WatchEvent};
use pkg_types::meta::NamespacedName;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

use crate::client::ResourceClient;
use crate::hpa_transfer::{
    HpaTransferReconciler, Outcome, ReconcileContext, ReconcileError, wait_for_shutdown,
};

/// Tuning for the reconcile loop.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub max_concurrent_reconciles: usize,
    pub call_timeout: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

impl ControllerOptions {
    /// Retry delay after `failures` consecutive failures (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failures.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Deduplicating work queue that never hands out a key already being reconciled.
#[derive(Debug, Default)]
struct WorkQueue {
    queue: VecDeque<NamespacedName>,
    queued: HashSet<NamespacedName>,
    active: HashSet<NamespacedName>,
    /// Keys signalled while active; re-queued when their reconcile finishes.
    dirty: HashSet<NamespacedName>,
}

impl WorkQueue {
    fn add(&mut self, key: NamespacedName) {
        if self.active.contains(&key) {
            self.dirty.insert(key);
        } else if self.queued.insert(key.clone()) {
            self.queue.push_back(key);
        }
    }

    fn pop(&mut self) -> Option<NamespacedName> {
        let key = self.queue.pop_front()?;
        self.queued.remove(&key);
        self.active.insert(key.clone());
        Some(key)
    }

    fn done(&mut self, key: &NamespacedName) {
        self.active.remove(key);
        if self.dirty.remove(key) {
            self.add(key.clone());
        }
    }
}

/// Watch-driven loop around [`HpaTransferReconciler`].
///
/// Only HPA keys are watched; edits to ScaledObjects never trigger a reconcile.
/// Each key is reconciled by at most one task at a time, distinct keys in parallel.
pub struct HpaTransferController<C> {
    reconciler: Arc<HpaTransferReconciler<C>>,
    events: broadcast::Receiver<WatchEvent>,
    options: ControllerOptions,
}

impl<C: ResourceClient> HpaTransferController<C> {
    /// Subscribes to `events` immediately, so writes made before `run` lists
    /// the store are still delivered.
    pub fn new(client: C, events: &EventLog, options: ControllerOptions) -> Self {
        Self {
            reconciler: Arc::new(HpaTransferReconciler::new(client)),
            events: events.subscribe(),
            options,
        }
    }

    pub fn start(
        self,
        shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Reconcile until shutdown. Returns an error if the initial resync fails
    /// or the watch stream closes underneath the controller.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let Self {
            reconciler,
            mut events,
            options,
        } = self;
        info!(
            "HpaTransferController started (workers={}, call_timeout={:?})",
            options.max_concurrent_reconciles, options.call_timeout
        );
        let ctx = ReconcileContext::new(shutdown.clone(), options.call_timeout);
        let workers = options.max_concurrent_reconciles.max(1);

        let mut queue = WorkQueue::default();
        resync(reconciler.client(), &mut queue).await?;

        let (retry_tx, mut retry_rx) = mpsc::unbounded_channel::<NamespacedName>();
        let (resync_tx, mut resync_rx) = mpsc::unbounded_channel::<()>();
        let mut in_flight: JoinSet<Result<Outcome, ReconcileError>> = JoinSet::new();
        let mut running: HashMap<Id, NamespacedName> = HashMap::new();
        let mut failures: HashMap<NamespacedName, u32> = HashMap::new();
        // Set from a lag until a resync succeeds; events may have been lost meanwhile.
        let mut resync_pending = false;
        let mut resync_failures = 0u32;

        let result = loop {
            while in_flight.len() < workers {
                let Some(key) = queue.pop() else { break };
                let reconciler = reconciler.clone();
                let task_ctx = ctx.clone();
                let task_key = key.clone();
                let handle = in_flight
                    .spawn(async move { reconciler.reconcile(&task_ctx, &task_key).await });
                running.insert(handle.id(), key);
            }

            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break Ok(()),
                event = events.recv() => match event {
                    Ok(event) => {
                        let parsed = NamespacedName::from_registry_key(HPA_PREFIX, &event.key);
                        if let Some(key) = parsed {
                            debug!(
                                "HpaTransferController: event {:?} for {}",
                                event.event_type, key
                            );
                            queue.add(key);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(
                            "HpaTransferController: watch lagged by {} events, resyncing",
                            missed
                        );
                        if !resync_pending {
                            resync_pending = true;
                            let _ = resync_tx.send(());
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break Err(anyhow::anyhow!("HpaTransferController: watch stream closed"));
                    }
                },
                Some(()) = resync_rx.recv() => {
                    match resync(reconciler.client(), &mut queue).await {
                        Ok(()) => {
                            resync_pending = false;
                            resync_failures = 0;
                        }
                        Err(e) => {
                            resync_failures += 1;
                            let delay = options.backoff(resync_failures);
                            warn!(
                                "HpaTransferController: resync {} failed, retry in {:?}: {}",
                                resync_failures, delay, e
                            );
                            let tx = resync_tx.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                let _ = tx.send(());
                            });
                        }
                    }
                }
                Some(key) = retry_rx.recv() => queue.add(key),
                Some(joined) = in_flight.join_next_with_id(), if !in_flight.is_empty() => {
                    let (id, result) = match joined {
                        Ok((id, result)) => (id, result),
                        Err(e) => (
                            e.id(),
                            Err(ReconcileError::Store(anyhow::anyhow!(
                                "reconcile task failed: {}",
                                e
                            ))),
                        ),
                    };
                    let Some(key) = running.remove(&id) else { continue };
                    queue.done(&key);

                    match result {
                        Ok(outcome) => {
                            failures.remove(&key);
                            if outcome.requeue() {
                                queue.add(key);
                            }
                        }
                        Err(ReconcileError::Cancelled) if ctx.is_cancelled() => {}
                        Err(e) => {
                            let count = failures.entry(key.clone()).or_insert(0);
                            *count += 1;
                            let delay = options.backoff(*count);
                            warn!(
                                "HpaTransferController: {} failed (attempt {}), retry in {:?}: {}",
                                key, count, delay, e
                            );
                            let tx = retry_tx.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                let _ = tx.send(key);
                            });
                        }
                    }
                }
            }
        };

        info!(
            "HpaTransferController stopping ({} reconciles in flight)",
            in_flight.len()
        );
        // In-flight calls observe the same shutdown signal and return promptly.
        while in_flight.join_next().await.is_some() {}
        result
    }
}

/// Enqueue every stored HPA.
async fn resync<C: ResourceClient>(client: &C, queue: &mut WorkQueue) -> anyhow::Result<()> {
    let keys = client.list_hpas().await?;
    info!("HpaTransferController: resync enqueued {} HPAs", keys.len());
    for key in keys {
        queue.add(key);
    }
    Ok(())
}
