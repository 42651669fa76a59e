//! Integration tests for the symbol warm-up coordinator: retry/backoff,
//! failed-symbol bookkeeping, bounded-queue handoff and cooperative shutdown.
//! Timers run under tokio's paused clock, so the 5s/15s/30s backoff schedule
//! elapses instantly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use zone_sentry::data::{RetryPolicy, SymbolLoadCoordinator, WarmUpLoader};

/// Fails every attempt for the configured symbols, succeeds for the rest, and
/// counts attempts per symbol.
struct FlakyLoader {
    always_fail: HashSet<String>,
    succeed_on_attempt: HashMap<String, u32>,
    attempts: Mutex<HashMap<String, u32>>,
}

impl FlakyLoader {
    fn new(always_fail: &[&str]) -> Self {
        Self {
            always_fail: always_fail.iter().map(|s| s.to_string()).collect(),
            succeed_on_attempt: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn succeeding_on(mut self, symbol: &str, attempt: u32) -> Self {
        self.succeed_on_attempt.insert(symbol.to_string(), attempt);
        self
    }

    async fn attempts_for(&self, symbol: &str) -> u32 {
        self.attempts.lock().await.get(symbol).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WarmUpLoader for FlakyLoader {
    async fn load_warm_up_data(&self, symbol: &str) -> Result<()> {
        let attempt = {
            let mut guard = self.attempts.lock().await;
            let counter = guard.entry(symbol.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };

        if self.always_fail.contains(symbol) {
            bail!("simulated transient error (attempt {})", attempt);
        }
        if let Some(required) = self.succeed_on_attempt.get(symbol) {
            if attempt < *required {
                bail!("simulated transient error (attempt {})", attempt);
            }
        }
        Ok(())
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, &[5, 15, 30])
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Scenario: a symbol whose warm-up fails 3 times is marked failed and never
/// appears in the ready queue.
#[tokio::test(start_paused = true)]
async fn exhausted_retries_mark_the_symbol_failed() {
    let loader = Arc::new(FlakyLoader::new(&["DOOMUSDT"]));
    let coordinator = SymbolLoadCoordinator::new(2);
    let (_tx, shutdown) = watch::channel(false);

    let (producer, consumer) = coordinator.spawn(
        symbols(&["GOODUSDT", "DOOMUSDT"]),
        loader.clone(),
        policy(),
        4,
        shutdown,
    );
    producer.await.unwrap();
    consumer.await.unwrap();

    let progress = coordinator.progress_snapshot().await;
    assert_eq!(progress.loaded, 1);
    assert!(progress.failed.contains("DOOMUSDT"));
    assert!(progress.is_settled());

    let ready = coordinator.ready_handle();
    let ready = ready.read().unwrap();
    assert!(ready.contains("GOODUSDT"));
    assert!(!ready.contains("DOOMUSDT"), "failed symbol leaked into ready set");

    assert_eq!(loader.attempts_for("DOOMUSDT").await, 3);
    assert_eq!(loader.attempts_for("GOODUSDT").await, 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_within_the_retry_budget() {
    let loader = Arc::new(FlakyLoader::new(&[]).succeeding_on("WOBBLYUSDT", 3));
    let coordinator = SymbolLoadCoordinator::new(1);
    let (_tx, shutdown) = watch::channel(false);

    let (producer, consumer) =
        coordinator.spawn(symbols(&["WOBBLYUSDT"]), loader.clone(), policy(), 4, shutdown);
    producer.await.unwrap();
    consumer.await.unwrap();

    let progress = coordinator.progress_snapshot().await;
    assert_eq!(progress.loaded, 1);
    assert!(progress.failed.is_empty());
    assert_eq!(loader.attempts_for("WOBBLYUSDT").await, 3);

    let ready = coordinator.ready_handle();
    assert!(ready.read().unwrap().contains("WOBBLYUSDT"));
}

/// loaded + failed converges to the universe size regardless of interleaving
/// with the consumer, even through a capacity-1 queue.
#[tokio::test(start_paused = true)]
async fn counts_converge_through_a_tiny_queue() {
    let universe = ["AUSDT", "BUSDT", "CUSDT", "DUSDT", "EUSDT", "FAILUSDT"];
    let loader = Arc::new(FlakyLoader::new(&["FAILUSDT"]));
    let coordinator = SymbolLoadCoordinator::new(universe.len());
    let (_tx, shutdown) = watch::channel(false);

    let (producer, consumer) =
        coordinator.spawn(symbols(&universe), loader, policy(), 1, shutdown);
    producer.await.unwrap();
    consumer.await.unwrap();

    let progress = coordinator.progress_snapshot().await;
    assert_eq!(progress.loaded + progress.failed.len(), universe.len());
    assert_eq!(progress.analyzing, 5);

    let ready = coordinator.ready_handle();
    assert_eq!(ready.read().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_accepting_work() {
    let loader = Arc::new(FlakyLoader::new(&[]));
    let coordinator = SymbolLoadCoordinator::new(3);
    let (tx, shutdown) = watch::channel(false);

    // Shutdown raised before the producer starts: it must not load anything.
    tx.send(true).unwrap();

    let (producer, consumer) = coordinator.spawn(
        symbols(&["AUSDT", "BUSDT", "CUSDT"]),
        loader.clone(),
        policy(),
        2,
        shutdown,
    );
    producer.await.unwrap();
    consumer.await.unwrap();

    let progress = coordinator.progress_snapshot().await;
    assert_eq!(progress.loaded, 0);
    assert_eq!(loader.attempts_for("AUSDT").await, 0);
    assert!(coordinator.ready_handle().read().unwrap().is_empty());
}
