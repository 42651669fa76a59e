use std::collections::HashMap;

use uuid::Uuid;

use crate::analysis::ZoneRegistry;
use crate::config::{ArbiterSettings, Timeframe};
use crate::engine::base::clearance_atr;
use crate::models::{Direction, Signal};

#[derive(Debug, Clone, Copy)]
struct ActiveEntry {
    id: Uuid,
    direction: Direction,
    valid_until_ms: i64,
}

/// Resolves conflicts between signals generated by the two engines on the same
/// symbol. Slow-timeframe signals carry priority and always pass through; fast
/// signals are blocked against opposing slow direction, promoted to piggyback
/// when aligned, and re-checked for HTF clearance independently of the
/// per-engine gate.
///
/// Active signals are tracked per timeframe until their validity deadline, so
/// conflicts are detected against standing signals, not only same-tick ones.
pub struct Arbitrator {
    cfg: ArbiterSettings,
    fast_tf: Timeframe,
    slow_tf: Timeframe,
    active: HashMap<(String, Timeframe), Vec<ActiveEntry>>,
}

impl Arbitrator {
    pub fn new(cfg: ArbiterSettings, fast_tf: Timeframe, slow_tf: Timeframe) -> Self {
        Self {
            cfg,
            fast_tf,
            slow_tf,
            active: HashMap::new(),
        }
    }

    pub fn filter(
        &mut self,
        symbol: &str,
        fast_in: Vec<Signal>,
        slow_in: Vec<Signal>,
        registry: &ZoneRegistry,
        price: f64,
        atr: f64,
        now_ms: i64,
    ) -> (Vec<Signal>, Vec<Signal>) {
        self.prune_expired(now_ms);

        // Slow priority: register and pass through unfiltered
        for signal in &slow_in {
            self.register(symbol, self.slow_tf, signal);
        }

        let mut fast_out = Vec::with_capacity(fast_in.len());
        'fast: for mut signal in fast_in {
            let slow_actives = self
                .active
                .get(&(symbol.to_string(), self.slow_tf))
                .cloned()
                .unwrap_or_default();

            // Opposite slow direction blocks outright
            if slow_actives
                .iter()
                .any(|a| a.direction == signal.direction.opposite())
            {
                log::info!(
                    "ARBITER [{}]: fast {} signal blocked by standing slow {}",
                    symbol,
                    signal.direction,
                    signal.direction.opposite()
                );
                continue 'fast;
            }

            // Aligned slow direction promotes instead of blocking
            if let Some(ally) = slow_actives.iter().find(|a| a.direction == signal.direction) {
                signal.confidence = (signal.confidence + self.cfg.piggyback_bonus).min(100);
                signal.piggyback_on = Some(ally.id);
                signal
                    .reasons
                    .push(format!("piggyback on standing {} {}", self.slow_tf, signal.direction));
            }

            // Front-run safety: re-verify HTF clearance independent of the
            // per-engine check.
            let bands = registry.nearest_htf_bands(symbol, price, signal.direction);
            if let Some(clearance) = clearance_atr(&bands, price, signal.direction, atr) {
                if clearance < self.cfg.front_run_clearance_atr {
                    log::info!(
                        "ARBITER [{}]: fast {} signal blocked, front-running HTF band ({:.2} ATR)",
                        symbol,
                        signal.direction,
                        clearance
                    );
                    continue 'fast;
                }
            }

            self.register(symbol, self.fast_tf, &signal);
            fast_out.push(signal);
        }

        (fast_out, slow_in)
    }

    /// Standing signals per symbol/timeframe, for status reporting.
    pub fn active_count(&self, symbol: &str, tf: Timeframe) -> usize {
        self.active
            .get(&(symbol.to_string(), tf))
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn register(&mut self, symbol: &str, tf: Timeframe, signal: &Signal) {
        self.active
            .entry((symbol.to_string(), tf))
            .or_default()
            .push(ActiveEntry {
                id: signal.id,
                direction: signal.direction,
                valid_until_ms: signal.valid_until_ms,
            });
    }

    fn prune_expired(&mut self, now_ms: i64) {
        for entries in self.active.values_mut() {
            entries.retain(|a| a.valid_until_ms > now_ms);
        }
        self.active.retain(|_, entries| !entries.is_empty());
    }
}
