use std::collections::HashMap;
use std::sync::Arc;

use strum::IntoEnumIterator;
use tokio::sync::{mpsc, watch};

use crate::analysis::{ZoneRegistry, filter_zones};
use crate::config::{AnalysisConfig, Timeframe};
use crate::data::{MarketView, ReadySet, ZoneSource};
use crate::engine::arbitrator::Arbitrator;
use crate::engine::fast::FastEngine;
use crate::engine::slow::SlowEngine;
use crate::models::Signal;
use crate::utils::epoch_ms_to_utc;

/// Owns the registry, both signal engines and the arbitrator, and drives the
/// periodic per-symbol analysis tick: refresh candidates through the gate,
/// swap the registry snapshot, run both engines, arbitrate, and hand the
/// survivors to the output channel.
///
/// The ready set it iterates is grown concurrently by the load coordinator;
/// a symbol becomes analyzable the moment the consumer task admits it.
pub struct SentryEngine {
    config: AnalysisConfig,
    registry: Arc<ZoneRegistry>,
    fast: FastEngine,
    slow: SlowEngine,
    arbitrator: Arbitrator,
    market: Arc<dyn MarketView>,
    zone_source: Arc<dyn ZoneSource>,
    ready: ReadySet,
    signal_tx: mpsc::Sender<Signal>,
}

impl SentryEngine {
    pub fn new(
        config: AnalysisConfig,
        market: Arc<dyn MarketView>,
        zone_source: Arc<dyn ZoneSource>,
        ready: ReadySet,
        signal_tx: mpsc::Sender<Signal>,
    ) -> Self {
        let fast = FastEngine::new(config.fast.clone());
        let slow = SlowEngine::new(config.slow.clone());
        let arbitrator = Arbitrator::new(
            config.arbiter.clone(),
            config.fast.timeframe,
            config.slow.timeframe,
        );

        Self {
            config,
            registry: Arc::new(ZoneRegistry::new()),
            fast,
            slow,
            arbitrator,
            market,
            zone_source,
            ready,
            signal_tx,
        }
    }

    pub fn registry(&self) -> Arc<ZoneRegistry> {
        Arc::clone(&self.registry)
    }

    /// The periodic analysis loop. Runs until shutdown flips (or `max_ticks`
    /// for bounded demo runs). Each tick is sequential per symbol; failures are
    /// scoped to the symbol they concern and never escape the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>, max_ticks: Option<u64>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let symbols: Vec<String> = {
                        let guard = self.ready.read().unwrap_or_else(|e| e.into_inner());
                        guard.iter().cloned().collect()
                    };

                    for symbol in &symbols {
                        let signals = self.tick_symbol(symbol);
                        for signal in signals {
                            log::info!(
                                "SIGNAL [{} {}]: {} {} @ {:.4} (conf {}, valid until {})",
                                signal.symbol,
                                signal.timeframe,
                                signal.setup_type,
                                signal.direction,
                                signal.entry,
                                signal.confidence,
                                epoch_ms_to_utc(signal.valid_until_ms)
                            );
                            if self.signal_tx.send(signal).await.is_err() {
                                log::warn!("ENGINE: signal consumer gone, stopping analysis loop");
                                return;
                            }
                        }
                    }

                    ticks += 1;
                    if let Some(max) = max_ticks {
                        if ticks >= max {
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("ENGINE: analysis loop stopped after {} ticks", ticks);
    }

    /// One full analysis pass for one symbol. Data insufficiency anywhere makes
    /// this a quiet no-op for the affected timeframe.
    fn tick_symbol(&mut self, symbol: &str) -> Vec<Signal> {
        let Some(price) = self.market.last_price(symbol) else {
            return Vec::new();
        };
        let as_of_ms = chrono::Utc::now().timestamp_millis();

        self.refresh_zones(symbol, as_of_ms);

        let fast_signals = self.run_engine_tick(symbol, price, as_of_ms, EngineSide::Fast);
        let slow_signals = self.run_engine_tick(symbol, price, as_of_ms, EngineSide::Slow);

        // The front-run re-check uses the entry timeframe's ATR when present
        let arbiter_atr = self
            .market
            .atr(symbol, self.config.fast.timeframe)
            .or_else(|| self.market.atr(symbol, self.config.slow.timeframe))
            .unwrap_or(0.0);

        let (fast_ok, slow_ok) = self.arbitrator.filter(
            symbol,
            fast_signals,
            slow_signals,
            &self.registry,
            price,
            arbiter_atr,
            as_of_ms,
        );

        slow_ok.into_iter().chain(fast_ok).collect()
    }

    /// Pull candidates from the external builder, gate them, and swap the
    /// registry snapshot for every timeframe that has data.
    fn refresh_zones(&self, symbol: &str, as_of_ms: i64) {
        let mut by_tf = HashMap::new();

        for tf in Timeframe::iter() {
            let Some(series) = self.market.series(symbol, tf) else {
                continue;
            };
            let Some(atr) = self.market.atr(symbol, tf) else {
                continue;
            };

            let candidates = self.zone_source.candidate_zones(symbol, tf);
            if candidates.is_empty() {
                continue;
            }

            let gated = filter_zones(
                candidates,
                &series,
                atr,
                &self.config.gate,
                &self.config.freshness,
            );
            by_tf.insert(tf, gated);
        }

        if !by_tf.is_empty() {
            self.registry.update(symbol, by_tf, as_of_ms);
        }
    }

    fn run_engine_tick(
        &mut self,
        symbol: &str,
        price: f64,
        as_of_ms: i64,
        side: EngineSide,
    ) -> Vec<Signal> {
        let tf = match side {
            EngineSide::Fast => self.config.fast.timeframe,
            EngineSide::Slow => self.config.slow.timeframe,
        };

        let Some(series) = self.market.series(symbol, tf) else {
            return Vec::new();
        };
        let (Some(atr), Some(vwap)) = (self.market.atr(symbol, tf), self.market.vwap(symbol, tf))
        else {
            return Vec::new();
        };

        match side {
            EngineSide::Fast => {
                self.fast
                    .tick(symbol, &series, price, atr, vwap, as_of_ms, &self.registry)
            }
            EngineSide::Slow => {
                self.slow
                    .tick(symbol, &series, price, atr, vwap, as_of_ms, &self.registry)
            }
        }
    }
}

#[derive(Clone, Copy)]
enum EngineSide {
    Fast,
    Slow,
}
