use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::LoaderSettings;
use crate::data::provider::WarmUpLoader;

/// Symbols that finished warm-up and are eligible for analysis. Grown by the
/// coordinator's consumer task while the analysis loop is already running.
pub type ReadySet = Arc<RwLock<BTreeSet<String>>>;

/// Retry schedule for the warm-up loader, decoupled from the coordinator's own
/// control flow.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_secs: &[u64]) -> Self {
        Self {
            max_attempts,
            backoff: backoff_secs.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    /// Delay before retrying after the given 1-based attempt. The schedule
    /// saturates at its last entry.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let idx = (attempt.saturating_sub(1) as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(idx).copied().unwrap_or(Duration::ZERO)
    }
}

impl From<&LoaderSettings> for RetryPolicy {
    fn from(cfg: &LoaderSettings) -> Self {
        Self::new(cfg.max_attempts, &cfg.backoff_secs)
    }
}

/// Shared progress counters, mutated by both coordinator tasks under one mutex
/// and read by the status reporter.
#[derive(Debug, Clone, Default)]
pub struct LoadProgress {
    pub total: usize,
    pub loaded: usize,
    pub analyzing: usize,
    pub failed: HashSet<String>,
}

impl LoadProgress {
    pub fn summary(&self) -> String {
        format!(
            "{}/{} loaded, {} analyzing, {} failed",
            self.loaded,
            self.total,
            self.analyzing,
            self.failed.len()
        )
    }

    /// The producer is done with every symbol, one way or the other.
    pub fn is_settled(&self) -> bool {
        self.loaded + self.failed.len() == self.total
    }
}

/// Decouples slow, rate-limited warm-up from analysis: a producer loads symbols
/// sequentially with retry/backoff and pushes them through a bounded queue; a
/// consumer drains the queue into the live ready set. Queue capacity is the
/// sole form of backpressure. Both tasks observe the shutdown signal between
/// units of work and drain gracefully.
pub struct SymbolLoadCoordinator {
    progress: Arc<Mutex<LoadProgress>>,
    ready: ReadySet,
}

impl SymbolLoadCoordinator {
    pub fn new(total_symbols: usize) -> Self {
        Self {
            progress: Arc::new(Mutex::new(LoadProgress {
                total: total_symbols,
                ..LoadProgress::default()
            })),
            ready: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    pub fn ready_handle(&self) -> ReadySet {
        Arc::clone(&self.ready)
    }

    pub fn progress_handle(&self) -> Arc<Mutex<LoadProgress>> {
        Arc::clone(&self.progress)
    }

    pub async fn progress_snapshot(&self) -> LoadProgress {
        self.progress.lock().await.clone()
    }

    /// Spawn the producer/consumer pair. Returns both handles so the caller can
    /// join them at shutdown.
    pub fn spawn(
        &self,
        universe: Vec<String>,
        loader: Arc<dyn WarmUpLoader>,
        policy: RetryPolicy,
        queue_capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<String>(queue_capacity.max(1));

        let producer = tokio::spawn(producer_task(
            universe,
            loader,
            policy,
            tx,
            Arc::clone(&self.progress),
            shutdown.clone(),
        ));
        let consumer = tokio::spawn(consumer_task(
            rx,
            Arc::clone(&self.ready),
            Arc::clone(&self.progress),
            shutdown,
        ));

        (producer, consumer)
    }
}

async fn producer_task(
    universe: Vec<String>,
    loader: Arc<dyn WarmUpLoader>,
    policy: RetryPolicy,
    tx: mpsc::Sender<String>,
    progress: Arc<Mutex<LoadProgress>>,
    shutdown: watch::Receiver<bool>,
) {
    for symbol in universe {
        if *shutdown.borrow() {
            log::info!("LOADER: shutdown observed, stopping warm-up");
            break;
        }

        match load_with_retry(loader.as_ref(), &symbol, &policy, &shutdown).await {
            Ok(()) => {
                progress.lock().await.loaded += 1;
                // Bounded send: this is where backpressure suspends the producer
                if tx.send(symbol).await.is_err() {
                    log::warn!("LOADER: ready queue closed, stopping warm-up");
                    break;
                }
            }
            Err(e) => {
                log::warn!("LOADER: {} failed warm-up after retries: {:#}", symbol, e);
                progress.lock().await.failed.insert(symbol);
            }
        }
    }
}

async fn load_with_retry(
    loader: &dyn WarmUpLoader,
    symbol: &str,
    policy: &RetryPolicy,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match loader.load_warm_up_data(symbol).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < policy.max_attempts && !*shutdown.borrow() => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "LOADER: {} warm-up attempt {}/{} failed ({:#}), retrying in {:?}",
                    symbol,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn consumer_task(
    mut rx: mpsc::Receiver<String>,
    ready: ReadySet,
    progress: Arc<Mutex<LoadProgress>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            maybe = rx.recv() => {
                match maybe {
                    Some(symbol) => {
                        {
                            let mut guard = ready.write().unwrap_or_else(|e| e.into_inner());
                            guard.insert(symbol.clone());
                        }
                        let mut prog = progress.lock().await;
                        prog.analyzing += 1;
                        log::info!("LOADER: {} ready for analysis ({})", symbol, prog.summary());
                    }
                    None => break, // producer finished and the queue drained
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
