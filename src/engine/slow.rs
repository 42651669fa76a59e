use crate::analysis::ZoneRegistry;
use crate::config::EngineProfile;
use crate::engine::base::{BaseEngine, classify_vwap_bias, clearance_atr};
use crate::engine::locks::SignalLockBook;
use crate::models::{Confirmation, OhlcvTimeSeries, SetupType, Signal};

/// The slow/loose engine: 1-hour entries, optional VWAP bias (skipped outright
/// when the zone overlaps higher-timeframe structure), and a soft HTF clearance
/// gate that costs confidence instead of rejecting outright.
pub struct SlowEngine {
    base: BaseEngine,
    locks: SignalLockBook,
}

impl SlowEngine {
    pub fn new(profile: EngineProfile) -> Self {
        Self {
            base: BaseEngine::new(profile),
            locks: SignalLockBook::new(),
        }
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.base.profile
    }

    pub fn tick(
        &mut self,
        symbol: &str,
        series: &OhlcvTimeSeries,
        price: f64,
        atr: f64,
        vwap: f64,
        as_of_ms: i64,
        registry: &ZoneRegistry,
    ) -> Vec<Signal> {
        let profile = &self.base.profile;
        let mut out = Vec::new();

        if atr <= 0.0 || series.klines() < profile.lookback.max(self.base.min_bars()) {
            #[cfg(debug_assertions)]
            log::debug!("SLOW [{}]: insufficient data, skipping tick", symbol);
            return out;
        }
        let Some(bar_ts) = series.last_timestamp() else {
            return out;
        };

        self.locks.purge_expired(as_of_ms);

        let zones = registry.get_zones(symbol, profile.timeframe);
        let bias = classify_vwap_bias(price, vwap, profile.vwap_buffer_pct);

        for zone in zones.iter() {
            if self.locks.is_locked(zone.id, as_of_ms) {
                continue;
            }

            let Some(setup) = self
                .base
                .detect_flip_retest(zone, series, atr, false)
                .or_else(|| self.base.detect_sweep_return(zone, series, false))
            else {
                continue;
            };

            let mut confidence = self.base.confidence_for(zone, setup.confirmation);
            let mut reasons = vec![format!(
                "{} at {} {} zone",
                setup.setup_type, profile.timeframe, zone.kind
            )];

            // VWAP bias is advisory here, and not even consulted when the zone
            // already sits on higher-timeframe structure.
            let overlaps_htf = !zone.meta.htf_overlap.is_empty();
            if overlaps_htf {
                reasons.push("zone confluent with HTF structure, vwap check skipped".into());
            } else if !bias.allows(setup.direction) {
                let exempt = profile.vwap_sweep_exempt
                    && setup.setup_type == SetupType::SweepReturn
                    && setup.confirmation == Confirmation::Strict;
                if !exempt {
                    confidence -= profile.vwap_soft_penalty;
                    reasons.push("countertrend vs vwap, confidence penalized".into());
                }
            }

            // Soft HTF clearance: close structure costs confidence, the floor
            // below still rejects.
            let bands = registry.nearest_htf_bands(symbol, price, setup.direction);
            if let Some(clearance) = clearance_atr(&bands, price, setup.direction, atr) {
                if clearance < profile.htf_clearance_mult {
                    confidence -= profile.htf_soft_penalty;
                    reasons.push(format!(
                        "opposing HTF band {:.2} ATR away, confidence penalized",
                        clearance
                    ));
                }
            }

            let Some(levels) = self
                .base
                .compute_levels(zone, setup.direction, price, atr, &zones, &bands)
            else {
                continue;
            };

            if zone.stale {
                reasons.push("stale zone, confidence penalized".into());
            }

            let Some(signal) =
                self.base
                    .build_signal(zone, &setup, price, levels, confidence, reasons, bar_ts, as_of_ms)
            else {
                continue;
            };

            if signal.confidence < profile.min_confidence {
                #[cfg(debug_assertions)]
                log::debug!(
                    "SLOW [{}]: signal on zone {} under confidence floor ({})",
                    symbol,
                    zone.id,
                    signal.confidence
                );
                continue;
            }

            self.locks.lock(zone.id, signal.lock.until_ms);
            out.push(signal);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::config::{Timeframe, constants};
    use crate::models::{LifecycleClass, Zone, ZoneKind};

    fn breakout_series() -> OhlcvTimeSeries {
        let mut rows: Vec<(f64, f64, f64, f64)> =
            (0..10).map(|_| (103.0, 103.5, 102.5, 103.0)).collect();
        rows.push((104.0, 106.5, 103.5, 106.0));
        rows.push((106.0, 107.5, 105.5, 107.0));
        OhlcvTimeSeries::from_rows("BTCUSDT", Timeframe::H1, 0, &rows)
    }

    fn registry_with(zone: Zone, htf: Option<Zone>) -> ZoneRegistry {
        let registry = ZoneRegistry::new();
        let mut by_tf = HashMap::new();
        if let Some(h) = htf {
            by_tf.insert(h.timeframe, vec![h]);
        }
        by_tf.insert(Timeframe::H1, vec![zone]);
        registry.update("BTCUSDT", by_tf, 0);
        registry
    }

    fn flipped_support() -> Zone {
        let mut zone = Zone::new(
            "BTCUSDT",
            Timeframe::H1,
            ZoneKind::Support,
            100.0,
            105.0,
            2.0,
            LifecycleClass::Active,
        )
        .unwrap();
        zone.meta.flipped = true;
        zone
    }

    #[test]
    fn countertrend_bias_penalizes_but_still_emits() {
        let registry = registry_with(flipped_support(), None);
        let series = breakout_series();
        let mut engine = SlowEngine::new(constants::engine::slow::DEFAULT);

        // Bear bias vs. Long flip: soft penalty (50 - 10 = 40), still at the floor
        let out = engine.tick("BTCUSDT", &series, 107.0, 2.0, 140.0, 1_000, &registry);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, constants::engine::slow::BASE_CONFIDENCE - 10);
    }

    #[test]
    fn close_htf_band_penalty_can_push_under_the_floor() {
        // Opposing 4h band half an ATR overhead: under the slow clearance mult.
        let htf = Zone::new(
            "BTCUSDT",
            Timeframe::H4,
            ZoneKind::Resistance,
            108.0,
            112.0,
            1.0,
            LifecycleClass::Active,
        )
        .unwrap();
        let registry = registry_with(flipped_support(), Some(htf));
        let series = breakout_series();
        let mut engine = SlowEngine::new(constants::engine::slow::DEFAULT);

        // Bear bias (-10) plus HTF penalty (-20): 50 - 30 = 20 < floor 40
        let out = engine.tick("BTCUSDT", &series, 107.0, 2.0, 140.0, 1_000, &registry);
        assert!(out.is_empty());
    }

    #[test]
    fn htf_confluent_zone_skips_the_vwap_check() {
        // Supporting 4h band overlapping the zone itself (same kind, well below
        // price, so it is not an opposing band ahead).
        let htf = Zone::new(
            "BTCUSDT",
            Timeframe::H4,
            ZoneKind::Support,
            99.0,
            106.0,
            1.0,
            LifecycleClass::Active,
        )
        .unwrap();
        let registry = registry_with(flipped_support(), Some(htf));
        let series = breakout_series();
        let mut engine = SlowEngine::new(constants::engine::slow::DEFAULT);

        // Bear bias would cost 10, but the overlap skips the check entirely
        let out = engine.tick("BTCUSDT", &series, 107.0, 2.0, 140.0, 1_000, &registry);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, constants::engine::slow::BASE_CONFIDENCE);
        assert!(
            out[0]
                .reasons
                .iter()
                .any(|r| r.contains("vwap check skipped"))
        );
    }
}
