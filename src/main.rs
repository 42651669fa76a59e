use std::panic;
use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use tokio::sync::{mpsc, watch};

use zone_sentry::utils::format_duration;
use zone_sentry::{ANALYSIS, Cli, DemoFeed, RetryPolicy, SentryEngine, SymbolLoadCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        log::error!("CRITICAL PANIC:\n{}\nStack Trace:\n{}", info, backtrace);
    }));

    let (global_level, my_code_level) = if cfg!(debug_assertions) {
        (log::LevelFilter::Warn, log::LevelFilter::Info)
    } else {
        (log::LevelFilter::Error, log::LevelFilter::Info)
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, global_level)
        .filter(Some("zone_sentry"), my_code_level)
        .init();

    let args = Cli::parse();
    let symbols = args.symbol_list();
    let config = ANALYSIS.clone();
    let started_ms = chrono::Utc::now().timestamp_millis();

    // The demo feed stands in for the exchange client and the zone builder
    let feed = Arc::new(DemoFeed::new(&symbols));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 1. Warm-up coordinator: producer/consumer pair over a bounded queue
    let coordinator = SymbolLoadCoordinator::new(symbols.len());
    let (producer, consumer) = coordinator.spawn(
        symbols.clone(),
        feed.clone(),
        RetryPolicy::from(&config.loader),
        config.loader.queue_capacity,
        shutdown_rx.clone(),
    );

    // 2. Signal sink: this is the persistence/notification boundary
    let (signal_tx, mut signal_rx) = mpsc::channel(64);
    let sink = tokio::spawn(async move {
        while let Some(signal) = signal_rx.recv().await {
            match serde_json::to_string(&signal) {
                Ok(json) => println!("{}", json),
                Err(e) => log::error!("SINK: failed to serialize signal: {:#}", e),
            }
        }
    });

    // 3. Analysis loop over the growing ready set
    let engine = SentryEngine::new(
        config,
        feed.clone(),
        feed,
        coordinator.ready_handle(),
        signal_tx,
    );
    engine.run(shutdown_rx, Some(args.ticks)).await;

    // Bounded demo run finished: stop the loader tasks and drain
    let _ = shutdown_tx.send(true);
    join_all([producer, consumer, sink]).await;

    let progress = coordinator.progress_snapshot().await;
    let elapsed_ms = chrono::Utc::now().timestamp_millis() - started_ms;
    log::info!(
        "run complete in {}: {}",
        format_duration(elapsed_ms),
        progress.summary()
    );

    Ok(())
}
