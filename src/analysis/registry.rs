use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::Timeframe;
use crate::models::{Direction, Zone, ZoneKind};

/// Multiplier applied to an HTF zone's own width when testing whether price
/// sits "at" the band for context checks.
const CONTEXT_WIDEN_MULT: f64 = 1.5;

/// Result of a higher-timeframe scan around a price.
#[derive(Debug, Clone, Default)]
pub struct HtfBands {
    /// Nearest opposing-kind zone strictly above price.
    pub above: Option<Zone>,
    /// Nearest opposing-kind zone strictly below price.
    pub below: Option<Zone>,
    /// HTF zones whose widened band contains price.
    pub containing: Vec<Zone>,
}

/// The single source of truth for tradeable zones per symbol and timeframe.
///
/// Updates swap whole per-symbol snapshots under one write lock, so a signal
/// engine tick never observes a half-applied refresh. Readers get a cheap
/// `Arc` clone of the current snapshot and must treat it as read-only.
pub struct ZoneRegistry {
    inner: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    zones: HashMap<(String, Timeframe), Arc<Vec<Zone>>>,
    refreshed_ms: HashMap<String, i64>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryState::default()),
        }
    }

    /// Atomically replace the snapshot for every timeframe present in
    /// `zones_by_tf`. Candidate-class zones are invisible to signal engines and
    /// are filtered here; higher timeframes are applied first so entry-timeframe
    /// overlap metadata is computed against the fresh HTF sets.
    pub fn update(&self, symbol: &str, mut zones_by_tf: HashMap<Timeframe, Vec<Zone>>, as_of_ms: i64) {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());

        for tf in Timeframe::HIGHER.into_iter().chain(Timeframe::ENTRY) {
            let Some(incoming) = zones_by_tf.remove(&tf) else {
                continue;
            };

            let key = (symbol.to_string(), tf);
            let previous = state.zones.get(&key).cloned().unwrap_or_default();

            let mut tradeable: Vec<Zone> = incoming.into_iter().filter(Zone::is_tradeable).collect();

            for zone in &mut tradeable {
                // Lifecycle is monotonic within a cycle. An apparent demotion is a
                // builder inconsistency: keep the higher class and flag it.
                if let Some(prev) = previous.iter().find(|p| p.id == zone.id) {
                    if prev.lifecycle > zone.lifecycle {
                        log::warn!(
                            "REGISTRY [{} {}]: zone {} demoted {:?} -> {:?} between refreshes; keeping {:?}",
                            symbol,
                            tf,
                            zone.id,
                            prev.lifecycle,
                            zone.lifecycle,
                            prev.lifecycle
                        );
                        zone.lifecycle = prev.lifecycle;
                    }
                }

                if !tf.is_higher() {
                    zone.meta.htf_overlap = htf_overlap_ids(&state, symbol, zone);
                }
            }

            state.zones.insert(key, Arc::new(tradeable));
        }

        state.refreshed_ms.insert(symbol.to_string(), as_of_ms);
    }

    /// Current snapshot for one symbol/timeframe. Read-only by contract.
    pub fn get_zones(&self, symbol: &str, tf: Timeframe) -> Arc<Vec<Zone>> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state
            .zones
            .get(&(symbol.to_string(), tf))
            .cloned()
            .unwrap_or_default()
    }

    pub fn last_refresh_ms(&self, symbol: &str) -> Option<i64> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state.refreshed_ms.get(symbol).copied()
    }

    /// Scan the higher-timeframe sets (4h, 1d) around `price`: the nearest
    /// opposing-kind zone above and below, plus every HTF zone whose widened
    /// band contains the price.
    pub fn nearest_htf_bands(&self, symbol: &str, price: f64, direction: Direction) -> HtfBands {
        let opposing = match direction {
            Direction::Long => ZoneKind::Resistance,
            Direction::Short => ZoneKind::Support,
        };

        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut bands = HtfBands::default();

        for tf in Timeframe::HIGHER {
            let Some(zones) = state.zones.get(&(symbol.to_string(), tf)) else {
                continue;
            };

            for zone in zones.iter() {
                let (wide_low, wide_high) = zone.widened(CONTEXT_WIDEN_MULT);
                if price >= wide_low && price <= wide_high {
                    bands.containing.push(zone.clone());
                }

                if zone.kind != opposing {
                    continue;
                }

                if zone.low > price {
                    let closer = bands
                        .above
                        .as_ref()
                        .map(|best| zone.low < best.low)
                        .unwrap_or(true);
                    if closer {
                        bands.above = Some(zone.clone());
                    }
                } else if zone.high < price {
                    let closer = bands
                        .below
                        .as_ref()
                        .map(|best| zone.high > best.high)
                        .unwrap_or(true);
                    if closer {
                        bands.below = Some(zone.clone());
                    }
                }
            }
        }

        bands
    }
}

impl Default for ZoneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn htf_overlap_ids(state: &RegistryState, symbol: &str, zone: &Zone) -> Vec<uuid::Uuid> {
    let mut ids = Vec::new();
    for tf in Timeframe::HIGHER {
        if let Some(htf_zones) = state.zones.get(&(symbol.to_string(), tf)) {
            for htf in htf_zones.iter() {
                if zone.overlap_fraction(htf) > 0.0 {
                    ids.push(htf.id);
                }
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LifecycleClass;

    fn zone(
        tf: Timeframe,
        kind: ZoneKind,
        low: f64,
        high: f64,
        lifecycle: LifecycleClass,
    ) -> Zone {
        Zone::new("BTCUSDT", tf, kind, low, high, 1.0, lifecycle).unwrap()
    }

    #[test]
    fn candidate_zones_are_invisible_to_engines() {
        let registry = ZoneRegistry::new();
        let mut by_tf = HashMap::new();
        by_tf.insert(
            Timeframe::M15,
            vec![
                zone(Timeframe::M15, ZoneKind::Support, 100.0, 101.0, LifecycleClass::Candidate),
                zone(Timeframe::M15, ZoneKind::Support, 102.0, 103.0, LifecycleClass::Active),
                zone(Timeframe::M15, ZoneKind::Support, 104.0, 105.0, LifecycleClass::Key),
            ],
        );
        registry.update("BTCUSDT", by_tf, 0);

        let snapshot = registry.get_zones("BTCUSDT", Timeframe::M15);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|z| z.lifecycle >= LifecycleClass::Active));
    }

    #[test]
    fn update_replaces_the_whole_snapshot() {
        let registry = ZoneRegistry::new();

        let mut first = HashMap::new();
        first.insert(
            Timeframe::H1,
            vec![zone(Timeframe::H1, ZoneKind::Support, 100.0, 101.0, LifecycleClass::Active)],
        );
        registry.update("BTCUSDT", first, 0);

        let mut second = HashMap::new();
        second.insert(
            Timeframe::H1,
            vec![zone(Timeframe::H1, ZoneKind::Resistance, 200.0, 201.0, LifecycleClass::Active)],
        );
        registry.update("BTCUSDT", second, 1);

        let snapshot = registry.get_zones("BTCUSDT", Timeframe::H1);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].kind, ZoneKind::Resistance);
        assert_eq!(registry.last_refresh_ms("BTCUSDT"), Some(1));
    }

    #[test]
    fn apparent_demotion_keeps_the_higher_class() {
        let registry = ZoneRegistry::new();

        let key_zone = zone(Timeframe::H1, ZoneKind::Support, 100.0, 101.0, LifecycleClass::Key);
        let mut first = HashMap::new();
        first.insert(Timeframe::H1, vec![key_zone.clone()]);
        registry.update("BTCUSDT", first, 0);

        // Same physical zone arrives demoted to Active
        let demoted = zone(Timeframe::H1, ZoneKind::Support, 100.0, 101.0, LifecycleClass::Active);
        assert_eq!(demoted.id, key_zone.id);
        let mut second = HashMap::new();
        second.insert(Timeframe::H1, vec![demoted]);
        registry.update("BTCUSDT", second, 1);

        let snapshot = registry.get_zones("BTCUSDT", Timeframe::H1);
        assert_eq!(snapshot[0].lifecycle, LifecycleClass::Key);
    }

    #[test]
    fn entry_zones_record_htf_overlap() {
        let registry = ZoneRegistry::new();

        let htf = zone(Timeframe::H4, ZoneKind::Resistance, 100.0, 110.0, LifecycleClass::Active);
        let htf_id = htf.id;
        let mut by_tf = HashMap::new();
        by_tf.insert(Timeframe::H4, vec![htf]);
        by_tf.insert(
            Timeframe::H1,
            vec![
                zone(Timeframe::H1, ZoneKind::Support, 105.0, 107.0, LifecycleClass::Active),
                zone(Timeframe::H1, ZoneKind::Support, 150.0, 151.0, LifecycleClass::Active),
            ],
        );
        registry.update("BTCUSDT", by_tf, 0);

        let snapshot = registry.get_zones("BTCUSDT", Timeframe::H1);
        assert_eq!(snapshot[0].meta.htf_overlap, vec![htf_id]);
        assert!(snapshot[1].meta.htf_overlap.is_empty());
    }

    #[test]
    fn nearest_bands_pick_opposing_kind_around_price() {
        let registry = ZoneRegistry::new();

        let mut by_tf = HashMap::new();
        by_tf.insert(
            Timeframe::H4,
            vec![
                zone(Timeframe::H4, ZoneKind::Resistance, 120.0, 125.0, LifecycleClass::Active),
                zone(Timeframe::H4, ZoneKind::Resistance, 140.0, 145.0, LifecycleClass::Active),
                zone(Timeframe::H4, ZoneKind::Resistance, 80.0, 85.0, LifecycleClass::Active),
                zone(Timeframe::H4, ZoneKind::Support, 95.0, 98.0, LifecycleClass::Active),
            ],
        );
        by_tf.insert(
            Timeframe::D1,
            vec![zone(Timeframe::D1, ZoneKind::Resistance, 130.0, 135.0, LifecycleClass::Key)],
        );
        registry.update("BTCUSDT", by_tf, 0);

        let bands = registry.nearest_htf_bands("BTCUSDT", 100.0, Direction::Long);
        assert_eq!(bands.above.as_ref().map(|z| z.low), Some(120.0));
        assert_eq!(bands.below.as_ref().map(|z| z.high), Some(85.0));

        // The 95-98 support widened by 1.5x spans 94.25..98.75 — price 100 is outside,
        // so nothing contains it.
        assert!(bands.containing.is_empty());

        let short_bands = registry.nearest_htf_bands("BTCUSDT", 100.0, Direction::Short);
        assert_eq!(short_bands.below.as_ref().map(|z| z.high), Some(98.0));
    }
}
