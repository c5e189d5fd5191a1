//! Bounded concurrent scanning of proxy lists.
//!
//! A scan pass owns one driver task. The driver fans the submitted proxy
//! strings out to at most `max_workers` spawned probe tasks and forwards every
//! finished result, in completion order, over a bounded channel to a single
//! consumer. Cancelling the pass aborts the in-flight tasks; whatever was
//! already forwarded stays with the consumer.

use crate::config::ScanConfig;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

/// A check that turns one raw proxy string into one terminal value.
///
/// Implementations must not fail: every error path has to be folded into the
/// returned value.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Probe the proxy submitted at position `order`
    async fn run(&self, order: usize, raw: &str) -> Self::Output;

    /// Failure value for a task that died before producing a result
    fn abandoned(&self, order: usize, raw: &str, reason: String) -> Self::Output;
}

/// One delivered result with the progress of the pass
#[derive(Debug, Clone)]
pub struct ScanUpdate<T> {
    pub result: T,
    pub completed: usize,
    pub total: usize,
}

/// Everything a pass delivered
#[derive(Debug, Clone)]
pub struct ScanOutcome<T> {
    /// Results in completion order
    pub results: Vec<T>,
    pub total: usize,
    /// The pass was stopped before every proxy finished
    pub cancelled: bool,
}

/// Aborts the spawned probe when the pool drops it before completion
struct WorkerHandle<T>(JoinHandle<T>);

impl<T> Drop for WorkerHandle<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs probes over proxy lists with a fixed number of workers
#[derive(Debug, Clone)]
pub struct ConcurrentScanner {
    max_workers: usize,
}

impl ConcurrentScanner {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Capture the worker count from a configuration snapshot
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.max_workers)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Start a pass over `endpoints`.
    ///
    /// Must be called from within a tokio runtime. The pass stops early when
    /// `cancel` fires or the returned stream is dropped.
    pub fn scan<P: Probe>(
        &self,
        endpoints: Vec<String>,
        probe: Arc<P>,
        cancel: CancellationToken,
    ) -> ScanStream<P::Output> {
        let total = endpoints.len();
        let max_workers = self.max_workers;
        let pass = cancel.child_token();
        let (tx, rx) = mpsc::channel(max_workers);

        info!(total, max_workers, "scan started");

        let driver_token = pass.clone();
        tokio::spawn(async move {
            let mut pool = stream::iter(endpoints.into_iter().enumerate())
                .map(|(order, raw)| {
                    let probe = Arc::clone(&probe);
                    async move {
                        let mut worker = WorkerHandle(tokio::spawn({
                            let probe = Arc::clone(&probe);
                            let raw = raw.clone();
                            async move { probe.run(order, &raw).await }
                        }));
                        match (&mut worker.0).await {
                            Ok(result) => result,
                            Err(e) => {
                                warn!(order, proxy = %raw, error = %e, "probe task died");
                                probe.abandoned(order, &raw, e.to_string())
                            }
                        }
                    }
                })
                .buffer_unordered(max_workers);

            let mut completed = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = driver_token.cancelled() => {
                        info!(completed, total, "scan cancelled");
                        break;
                    }
                    next = pool.next() => {
                        let Some(result) = next else {
                            info!(completed, total, "scan finished");
                            break;
                        };
                        completed += 1;
                        debug!(completed, total, "probe finished");
                        let update = ScanUpdate { result, completed, total };
                        if tx.send(update).await.is_err() {
                            debug!("scan consumer went away");
                            break;
                        }
                    }
                }
            }
        });

        ScanStream {
            rx,
            total,
            cancel: pass.clone(),
            _guard: pass.drop_guard(),
        }
    }
}

/// Cancel `token` once `signal` resolves.
///
/// One watcher can cover several passes that share the token; it exits when
/// the signal fires or the token is cancelled some other way.
pub fn cancel_on<F>(token: CancellationToken, signal: F) -> JoinHandle<()>
where
    F: Future + Send + 'static,
    F::Output: Send,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = signal => {
                info!("interrupt received, cancelling scan");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Results of a running pass, in completion order
pub struct ScanStream<T> {
    rx: mpsc::Receiver<ScanUpdate<T>>,
    total: usize,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl<T> ScanStream<T> {
    pub fn total(&self) -> usize {
        self.total
    }

    /// Stop the pass; results already delivered or queued are still yielded
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the next result, `None` once the pass is over
    pub async fn next_update(&mut self) -> Option<ScanUpdate<T>> {
        self.rx.recv().await
    }

    /// Non-blocking poll for a finished result
    pub fn try_next_update(&mut self) -> Result<ScanUpdate<T>, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Drain the pass, reporting `(completed, total)` after each result
    pub async fn collect_with_progress<F>(mut self, mut on_progress: F) -> ScanOutcome<T>
    where
        F: FnMut(usize, usize),
    {
        let mut results = Vec::with_capacity(self.total);
        while let Some(update) = self.next_update().await {
            on_progress(update.completed, update.total);
            results.push(update.result);
        }
        let cancelled = results.len() < self.total;
        ScanOutcome {
            results,
            total: self.total,
            cancelled,
        }
    }

    pub async fn collect_outcome(self) -> ScanOutcome<T> {
        self.collect_with_progress(|_, _| {}).await
    }
}

impl<T> Stream for ScanStream<T> {
    type Item = ScanUpdate<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
