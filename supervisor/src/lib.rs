//! Concurrent crawler supervisor.
//!
//! A fixed-size pool of fetch workers feeds a bounded result queue; an
//! internal consumer task bridges results to an output channel while
//! preserving BFS dequeue order under concurrency. Indexing and store
//! writes are deliberately left to the caller draining
//! [`CrawlHandle::recv`] — mirroring `ConcurrentCrawler`'s `pipe()` async
//! iterator, which is consumed by a caller-owned loop that does its own
//! indexing — so this crate has no dependency on `indexer`/`store`.

mod error;

pub use error::SupervisorError;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use url::Url;

use crawler::error::{CrawlError, QueueError};
use crawler::{crawl, CrawlOutcome, PageQueue};

/// Upper bound on how long a worker that just saw an empty queue waits on
/// the `awake` signal before re-checking. `tokio::sync::Notify::notify_waiters`
/// only wakes tasks that are already polling `notified()`; bounding the wait
/// closes the (narrow) window where a worker starts waiting just after a
/// `notify_waiters` call it should have observed.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tunable parameters for a crawl run.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub request_concurrency: usize,
    pub max_queue_size: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig { request_concurrency: 6, max_queue_size: 32 }
    }
}

/// One result forwarded to the caller. An empty-queue poll is consumed
/// internally by the consumer task and never reaches here.
#[derive(Debug)]
pub enum SlotResult {
    /// A fetch completed — possibly with `outcome.content: None` if the
    /// response wasn't a crawlable page.
    Fetched { url: Url, outcome: CrawlOutcome },
    /// The fetch itself errored (network/decode failure).
    Errored(CrawlError),
}

struct Shared {
    queue: AsyncMutex<PageQueue>,
    awake: Notify,
    idle: AtomicUsize,
    pending_restore: std::sync::Mutex<Vec<Url>>,
}

/// RAII guard around a URL that has been dequeued but not yet resolved.
/// If dropped without [`DequeuedGuard::disarm`] being called — because the
/// worker task holding it was cancelled — the URL is pushed onto
/// `Shared::pending_restore`, where the consumer task's teardown restores
/// it to the queue.
struct DequeuedGuard {
    shared: Arc<Shared>,
    url: Option<Url>,
}

impl DequeuedGuard {
    fn new(shared: Arc<Shared>, url: Url) -> Self {
        DequeuedGuard { shared, url: Some(url) }
    }

    fn disarm(mut self) {
        self.url = None;
    }
}

impl Drop for DequeuedGuard {
    fn drop(&mut self) {
        if let Some(url) = self.url.take() {
            self.shared.pending_restore.lock().expect("pending_restore mutex poisoned").push(url);
        }
    }
}

enum WorkerSlot {
    Fetched { url: Url, outcome: CrawlOutcome },
    Errored(CrawlError),
    Empty,
}

/// A running crawl: an output channel of forwarded results, plus the
/// consumer task driving the worker pool.
pub struct CrawlHandle {
    receiver: mpsc::Receiver<SlotResult>,
    consumer: JoinHandle<Result<(), SupervisorError>>,
}

impl CrawlHandle {
    /// Receive the next forwarded result, in BFS order. Returns `None` once
    /// the crawl has drained or `page_count` has been reached.
    pub async fn recv(&mut self) -> Option<SlotResult> {
        self.receiver.recv().await
    }

    /// Wait for the crawl to fully finish: every worker stopped and any URL
    /// cancelled mid-fetch restored to the queue. Should be called after
    /// [`CrawlHandle::recv`] has returned `None` (or the handle is being
    /// dropped early and cleanup should still be awaited).
    pub async fn join(mut self) -> Result<(), SupervisorError> {
        while self.receiver.recv().await.is_some() {}
        self.consumer.await.expect("supervisor consumer task panicked")
    }
}

/// Drives a bounded-concurrency crawl.
///
/// `request_concurrency` worker tasks each, in order: reserve a result-queue
/// slot (an awaitable `oneshot::Receiver`), dequeue the next URL from the
/// shared queue under a mutex, fetch it, then resolve their slot. Because
/// the slot reservation happens before the dequeue, and slots are drained
/// FIFO by the consumer, the order results become visible matches the
/// dequeue order regardless of which worker's fetch finishes first.
pub struct Supervisor {
    client: Client,
    shared: Arc<Shared>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(client: Client, queue: PageQueue, config: SupervisorConfig) -> Self {
        Supervisor {
            client,
            shared: Arc::new(Shared {
                queue: AsyncMutex::new(queue),
                awake: Notify::new(),
                idle: AtomicUsize::new(0),
                pending_restore: std::sync::Mutex::new(Vec::new()),
            }),
            config,
        }
    }

    /// Start the crawl. `page_count` bounds how many pages with fetched
    /// content are forwarded before the supervisor initiates shutdown; a
    /// negative value means unbounded (run until the queue drains).
    pub fn spawn(self, page_count: i64) -> CrawlHandle {
        let n = self.config.request_concurrency.max(1);
        let (slot_tx, slot_rx) =
            mpsc::channel::<oneshot::Receiver<WorkerSlot>>(self.config.max_queue_size.max(1));
        let (out_tx, out_rx) = mpsc::channel::<SlotResult>(self.config.max_queue_size.max(1));
        let running = Arc::new(AtomicBool::new(true));

        let mut workers = Vec::with_capacity(n);
        for _ in 0..n {
            let shared = Arc::clone(&self.shared);
            let client = self.client.clone();
            let slot_tx = slot_tx.clone();
            let running = Arc::clone(&running);
            workers.push(tokio::spawn(worker_loop(shared, client, slot_tx, running)));
        }
        drop(slot_tx);

        let shared = Arc::clone(&self.shared);
        let consumer = tokio::spawn(consume(shared, slot_rx, out_tx, running, workers, page_count, n));

        CrawlHandle { receiver: out_rx, consumer }
    }
}

#[allow(clippy::too_many_arguments)]
async fn consume(
    shared: Arc<Shared>,
    mut slot_rx: mpsc::Receiver<oneshot::Receiver<WorkerSlot>>,
    out_tx: mpsc::Sender<SlotResult>,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    page_count: i64,
    worker_count: usize,
) -> Result<(), SupervisorError> {
    let mut pages_fetched: i64 = 0;

    while let Some(rx) = slot_rx.recv().await {
        let Ok(slot) = rx.await else {
            // The worker holding this slot was cancelled before resolving
            // it. Its URL (if it had dequeued one) is already recorded in
            // `pending_restore` by its `DequeuedGuard`.
            continue;
        };

        match slot {
            WorkerSlot::Empty => {
                let idle = shared.idle.fetch_add(1, Ordering::SeqCst) + 1;
                if idle >= worker_count {
                    log::debug!("every worker is idle; crawl is drained");
                    running.store(false, Ordering::SeqCst);
                    shared.awake.notify_waiters();
                    break;
                }
            }
            WorkerSlot::Errored(err) => {
                log::warn!("crawl of {} failed: {}", err.url, err.cause);
                if out_tx.send(SlotResult::Errored(err)).await.is_err() {
                    break;
                }
            }
            WorkerSlot::Fetched { url, outcome } => {
                if !outcome.outlinks.is_empty() {
                    let mut queue = shared.queue.lock().await;
                    queue
                        .enqueue(outcome.outlinks.clone(), false, true)
                        .map_err(SupervisorError::from_queue)?;
                    drop(queue);
                    shared.idle.store(0, Ordering::SeqCst);
                    shared.awake.notify_waiters();
                }
                let fetched_content = outcome.content.is_some();
                if out_tx.send(SlotResult::Fetched { url, outcome }).await.is_err() {
                    break;
                }
                if fetched_content {
                    pages_fetched += 1;
                }
            }
        }

        if page_count >= 0 && pages_fetched >= page_count {
            log::debug!("page_count {page_count} reached; stopping crawl");
            running.store(false, Ordering::SeqCst);
            shared.awake.notify_waiters();
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    shared.awake.notify_waiters();
    drop(slot_rx);
    drop(out_tx);

    for worker in workers {
        worker.abort();
        let _ = worker.await;
    }

    restore_pending(&shared).await;
    Ok(())
}

/// Teardown step: restore every URL left in `pending_restore` (either
/// cancelled mid-fetch, or still reserved in a slot nobody consumed) to the
/// front of the queue.
async fn restore_pending(shared: &Shared) {
    let pending: Vec<Url> = {
        let mut guard = shared.pending_restore.lock().expect("pending_restore mutex poisoned");
        std::mem::take(&mut *guard)
    };
    if pending.is_empty() {
        return;
    }
    let mut queue = shared.queue.lock().await;
    queue.reset(&pending);
    let _ = queue.enqueue(pending, true, true);
}

async fn worker_loop(
    shared: Arc<Shared>,
    client: Client,
    slot_tx: mpsc::Sender<oneshot::Receiver<WorkerSlot>>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        let (tx, rx) = oneshot::channel();
        if slot_tx.send(rx).await.is_err() {
            return;
        }

        let dequeued = {
            let mut queue = shared.queue.lock().await;
            queue.dequeue()
        };

        match dequeued {
            Ok(url) => {
                let guard = DequeuedGuard::new(Arc::clone(&shared), url.clone());
                let slot = match crawl(&client, url.clone()).await {
                    Ok(outcome) => WorkerSlot::Fetched { url, outcome },
                    Err(err) => WorkerSlot::Errored(err),
                };
                guard.disarm();
                let _ = tx.send(slot);
            }
            Err(QueueError::QueueEmpty) => {
                let _ = tx.send(WorkerSlot::Empty);
                if running.load(Ordering::SeqCst) {
                    let _ = tokio::time::timeout(IDLE_POLL_INTERVAL, shared.awake.notified()).await;
                }
            }
            Err(other) => unreachable!("dequeue only ever returns a URL or QueueEmpty, got {other:?}"),
        }
    }
}
