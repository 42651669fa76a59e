use std::sync::Arc;

use crate::analysis::ZoneRegistry;
use crate::config::{EngineProfile, Timeframe};
use crate::engine::base::{BaseEngine, classify_vwap_bias, clearance_atr};
use crate::engine::locks::SignalLockBook;
use crate::models::{Confirmation, OhlcvTimeSeries, SetupType, Signal, Zone};

/// The fast/tight engine: 15-minute entries, mandatory VWAP bias (narrow sweep
/// exemption), hard HTF clearance, and escalated confirmation when its zone
/// sits majority-inside an opposing 1h zone.
pub struct FastEngine {
    base: BaseEngine,
    locks: SignalLockBook,
}

impl FastEngine {
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

        // Data insufficiency: skip the symbol, never raise
        if atr <= 0.0 || series.klines() < profile.lookback.max(self.base.min_bars()) {
            #[cfg(debug_assertions)]
            log::debug!("FAST [{}]: insufficient data, skipping tick", symbol);
            return out;
        }
        let Some(bar_ts) = series.last_timestamp() else {
            return out;
        };

        self.locks.purge_expired(as_of_ms);

        let zones = registry.get_zones(symbol, profile.timeframe);
        let slow_zones = registry.get_zones(symbol, Timeframe::H1);
        let bias = classify_vwap_bias(price, vwap, profile.vwap_buffer_pct);

        for zone in zones.iter() {
            if self.locks.is_locked(zone.id, as_of_ms) {
                continue;
            }

            let escalate = self.needs_enhanced_confirmation(zone, &slow_zones);

            let Some(setup) = self
                .base
                .detect_flip_retest(zone, series, atr, escalate)
                .or_else(|| self.base.detect_sweep_return(zone, series, escalate))
            else {
                continue;
            };

            // VWAP bias is mandatory here. The only way around an incompatible
            // bias is a sweep that met the strict criteria: a countertrend sweep
            // is exactly the pattern that fades the prevailing drift.
            if !bias.allows(setup.direction) {
                let exempt = profile.vwap_sweep_exempt
                    && setup.setup_type == SetupType::SweepReturn
                    && setup.confirmation == Confirmation::Strict;
                if !exempt {
                    #[cfg(debug_assertions)]
                    log::debug!(
                        "FAST [{}]: {} setup on zone {} fights VWAP bias, dropped",
                        symbol,
                        setup.setup_type,
                        zone.id
                    );
                    continue;
                }
            }

            // Hard HTF clearance gate
            let bands = registry.nearest_htf_bands(symbol, price, setup.direction);
            if let Some(clearance) = clearance_atr(&bands, price, setup.direction, atr) {
                if clearance < profile.htf_clearance_mult {
                    #[cfg(debug_assertions)]
                    log::debug!(
                        "FAST [{}]: zone {} too close to opposing HTF band ({:.2} ATR), dropped",
                        symbol,
                        zone.id,
                        clearance
                    );
                    continue;
                }
            }

            let Some(levels) = self
                .base
                .compute_levels(zone, setup.direction, price, atr, &zones, &bands)
            else {
                continue;
            };

            let confidence = self.base.confidence_for(zone, setup.confirmation);
            let mut reasons = vec![
                format!("{} at {} {} zone", setup.setup_type, profile.timeframe, zone.kind),
                format!("vwap bias {:?}-compatible", setup.direction),
            ];
            if escalate {
                reasons.push("enhanced confirmation: majority overlap with opposing 1h zone".into());
            }
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
                    "FAST [{}]: signal on zone {} under confidence floor ({})",
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

    /// A fast zone sitting more than half inside an opposing-kind slow zone is
    /// trading against structure one level up; demand the stricter evidence.
    fn needs_enhanced_confirmation(&self, zone: &Zone, slow_zones: &Arc<Vec<Zone>>) -> bool {
        if !self.base.profile.enhanced_confirmation {
            return false;
        }
        slow_zones.iter().any(|slow| {
            slow.kind == zone.kind.opposite()
                && zone.overlap_fraction(slow) > self.base.profile.enhanced_overlap_frac
        })
    }
}
