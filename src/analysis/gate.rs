use rayon::prelude::*;

use crate::analysis::freshness::apply_freshness;
use crate::analysis::purity::apply_purity;
use crate::config::{FreshnessSettings, GateSettings};
use crate::models::{OhlcvTimeSeries, Zone};

/// The post-validation quality gate: purity (shrink / split / drop) followed by
/// freshness (drop / flag). Runs every refresh cycle, after touch statistics
/// are computed and before zones are eligible for scoring or signal detection.
///
/// Zones are independent, so the batch fans out across the thread pool.
/// Survivor order follows input order.
pub fn filter_zones(
    zones: Vec<Zone>,
    series: &OhlcvTimeSeries,
    atr: f64,
    gate: &GateSettings,
    freshness: &FreshnessSettings,
) -> Vec<Zone> {
    let current_bar = series.klines().saturating_sub(1);

    zones
        .into_par_iter()
        .flat_map_iter(|zone| apply_purity(zone, series, atr, gate).into_iter())
        .filter_map(|zone| apply_freshness(zone, current_bar, freshness))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Timeframe, constants};
    use crate::models::{LifecycleClass, ZoneKind, ZoneTouch};

    #[test]
    fn surviving_zones_meet_the_purity_threshold() {
        // A mix: one clean zone, one stale-and-droppable, one hopelessly impure.
        let rows: Vec<(f64, f64, f64, f64)> = (0..100)
            .map(|i| {
                let close = if i < 50 { 105.0 } else { 200.0 };
                (close, close + 0.5, close - 0.5, close)
            })
            .collect();
        let series = OhlcvTimeSeries::from_rows("BTCUSDT", Timeframe::H1, 0, &rows);

        let touch = ZoneTouch {
            timestamp_ms: 0,
            bar_idx: 99,
            price: 150.5,
        };

        let mut clean = Zone::new(
            "BTCUSDT",
            Timeframe::H1,
            ZoneKind::Resistance,
            150.0,
            151.0,
            1.0,
            LifecycleClass::Active,
        )
        .unwrap();
        clean.touches.push(touch);

        let mut untouched = Zone::new(
            "BTCUSDT",
            Timeframe::H1,
            ZoneKind::Support,
            90.0,
            95.0,
            1.0,
            LifecycleClass::Active,
        )
        .unwrap();
        untouched.touches.clear();

        let mut impure = Zone::new(
            "BTCUSDT",
            Timeframe::H1,
            ZoneKind::Support,
            104.0,
            106.0,
            1.0,
            LifecycleClass::Active,
        )
        .unwrap();
        impure.touches.push(ZoneTouch {
            timestamp_ms: 0,
            bar_idx: 99,
            price: 105.0,
        });

        let cfg = constants::gate::DEFAULT;
        let fresh = constants::freshness::DEFAULT;
        let out = filter_zones(vec![clean.clone(), untouched, impure], &series, 2.0, &cfg, &fresh);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, clean.id);
        assert!(out[0].purity >= cfg.purity_threshold);
    }
}
