use find_peaks::PeakFinder;
use statrs::distribution::{Continuous, Normal};
use statrs::statistics::{Data, OrderStatistics};

use crate::config::GateSettings;
use crate::models::{OhlcvTimeSeries, Zone};
use crate::utils::{get_max, mean_and_stddev};

/// Fraction of bars that respected the band: `1 - closes_inside / total`.
/// An empty series counts as fully pure (nothing contradicted the zone).
pub(crate) fn band_purity(low: f64, high: f64, series: &OhlcvTimeSeries) -> f64 {
    let total = series.klines();
    if total == 0 {
        return 1.0;
    }
    let inside = series
        .close_prices
        .iter()
        .filter(|c| **c >= low && **c <= high)
        .count();
    1.0 - inside as f64 / total as f64
}

/// The purity stage of the gate. Keeps a respected zone unchanged, otherwise
/// tries shrink, then split, then drops the zone for this cycle.
/// Returns 0, 1 or 2 zones.
pub(crate) fn apply_purity(
    zone: Zone,
    series: &OhlcvTimeSeries,
    atr: f64,
    cfg: &GateSettings,
) -> Vec<Zone> {
    let purity = band_purity(zone.low, zone.high, series);
    if purity >= cfg.purity_threshold {
        let mut kept = zone;
        kept.purity = purity;
        return vec![kept];
    }

    // 1. Shrink to the dense core of the touch distribution
    if let Some(shrunk) = try_shrink(&zone, series, cfg) {
        #[cfg(debug_assertions)]
        log::debug!(
            "GATE [{} {}]: shrank zone {:.4}-{:.4} -> {:.4}-{:.4}",
            zone.symbol,
            zone.timeframe,
            zone.low,
            zone.high,
            shrunk.low,
            shrunk.high
        );
        return vec![shrunk];
    }

    // 2. Split at the density valley between two touch clusters
    let children = try_split(&zone, series, atr, cfg);
    if !children.is_empty() {
        #[cfg(debug_assertions)]
        log::debug!(
            "GATE [{} {}]: split zone {:.4}-{:.4} into {} children",
            zone.symbol,
            zone.timeframe,
            zone.low,
            zone.high,
            children.len()
        );
        return children;
    }

    // 3. Drop
    #[cfg(debug_assertions)]
    log::debug!(
        "GATE [{} {}]: dropped impure zone {:.4}-{:.4} (purity {:.2})",
        zone.symbol,
        zone.timeframe,
        zone.low,
        zone.high,
        purity
    );
    Vec::new()
}

fn touch_prices(zone: &Zone) -> Vec<f64> {
    zone.touches.iter().map(|t| t.price).collect()
}

/// Recompute the band as the inner percentile range of touching prices and
/// re-check purity on the tighter band.
fn try_shrink(zone: &Zone, series: &OhlcvTimeSeries, cfg: &GateSettings) -> Option<Zone> {
    let prices = touch_prices(zone);
    if prices.len() < 3 {
        return None;
    }

    let mut data = Data::new(prices);
    let low = data.percentile(cfg.shrink_pctl_low);
    let high = data.percentile(cfg.shrink_pctl_high);
    if !(low < high) {
        return None;
    }

    let purity = band_purity(low, high, series);
    if purity < cfg.purity_threshold {
        return None;
    }

    let mut child = zone.with_bounds(low, high).ok()?;
    child.purity = purity;
    Some(child)
}

/// Fit a kernel density estimate over the touching prices, look for two
/// separated clusters, and partition the band at the valley between them.
/// Each child is re-validated for purity independently.
fn try_split(zone: &Zone, series: &OhlcvTimeSeries, atr: f64, cfg: &GateSettings) -> Vec<Zone> {
    let prices = touch_prices(zone);
    if prices.len() < cfg.min_cluster_points * 2 || atr <= 0.0 {
        return Vec::new();
    }

    // Density across the band
    let grid = density_grid(zone.low, zone.high, cfg.kde_grid_points);
    let density = gaussian_kde(&prices, &grid);
    let max_density = get_max(&density);
    if max_density <= 0.0 {
        return Vec::new();
    }

    // Peaks with prominence >= 10% of the maximum
    let mut finder = PeakFinder::new(&density);
    finder.with_min_prominence(cfg.peak_prominence_frac * max_density);
    let mut peaks = finder.find_peaks();
    if peaks.len() < 2 {
        return Vec::new();
    }
    peaks.sort_by_key(|p| p.middle_position());

    let first = peaks[0].middle_position();
    let second = peaks[1].middle_position();

    // Peaks closer than the ATR gap are one cluster, not two
    if grid[second] - grid[first] < cfg.min_peak_gap_atr * atr {
        return Vec::new();
    }

    // Valley: density minimum between the first two peaks
    let valley_offset = density[first..=second]
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let valley_price = grid[first + valley_offset];

    let lower: Vec<f64> = prices.iter().copied().filter(|p| *p < valley_price).collect();
    let upper: Vec<f64> = prices.iter().copied().filter(|p| *p >= valley_price).collect();
    if lower.len() < cfg.min_cluster_points || upper.len() < cfg.min_cluster_points {
        return Vec::new();
    }

    let mut children = Vec::with_capacity(2);
    for cluster in [&lower, &upper] {
        if let Some(child) = child_from_cluster(zone, cluster, series, atr, cfg) {
            children.push(child);
        }
    }
    children
}

/// Build a child zone spanning one touch cluster, padded to a minimal width so
/// a cluster of identical prints still forms a band, then purity-validate it.
fn child_from_cluster(
    zone: &Zone,
    cluster: &[f64],
    series: &OhlcvTimeSeries,
    atr: f64,
    cfg: &GateSettings,
) -> Option<Zone> {
    let mut low = cluster.iter().copied().fold(f64::INFINITY, f64::min);
    let mut high = cluster.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if high - low < f64::EPSILON {
        low -= 0.05 * atr;
        high += 0.05 * atr;
    }

    let purity = band_purity(low, high, series);
    if purity < cfg.purity_threshold {
        return None;
    }

    let mut child = zone.with_bounds(low, high).ok()?;
    child.purity = purity;
    Some(child)
}

fn density_grid(low: f64, high: f64, points: usize) -> Vec<f64> {
    let n = points.max(2);
    let step = (high - low) / (n - 1) as f64;
    (0..n).map(|i| low + i as f64 * step).collect()
}

/// Plain Gaussian KDE with Silverman's rule-of-thumb bandwidth.
fn gaussian_kde(points: &[f64], grid: &[f64]) -> Vec<f64> {
    let n = points.len();
    let (_, sd) = mean_and_stddev(points);

    let mut bandwidth = 0.9 * sd * (n as f64).powf(-0.2);
    if bandwidth <= f64::EPSILON {
        // Degenerate sample: fall back to one grid step
        let spread = grid.last().copied().unwrap_or(1.0) - grid.first().copied().unwrap_or(0.0);
        bandwidth = (spread / grid.len().max(1) as f64).max(f64::EPSILON);
    }

    let kernel = Normal::new(0.0, 1.0).expect("unit normal is always constructible");
    grid.iter()
        .map(|&x| {
            points
                .iter()
                .map(|&p| kernel.pdf((x - p) / bandwidth))
                .sum::<f64>()
                / (n as f64 * bandwidth)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Timeframe, constants};
    use crate::models::{LifecycleClass, ZoneKind, ZoneTouch};

    fn gate_cfg() -> GateSettings {
        constants::gate::DEFAULT
    }

    /// Series with `inside` closes inside [low, high] and the rest far outside.
    fn series_with_inside_ratio(inside: usize, total: usize, low: f64, high: f64) -> OhlcvTimeSeries {
        let mid = (low + high) / 2.0;
        let rows: Vec<(f64, f64, f64, f64)> = (0..total)
            .map(|i| {
                let close = if i < inside { mid } else { high + 50.0 };
                (close, close + 1.0, close - 1.0, close)
            })
            .collect();
        OhlcvTimeSeries::from_rows("BTCUSDT", Timeframe::H1, 0, &rows)
    }

    fn zone_with_touches(low: f64, high: f64, touch_prices: &[f64]) -> Zone {
        let mut z = Zone::new(
            "BTCUSDT",
            Timeframe::H1,
            ZoneKind::Support,
            low,
            high,
            1.0,
            LifecycleClass::Active,
        )
        .unwrap();
        z.touches = touch_prices
            .iter()
            .enumerate()
            .map(|(i, p)| ZoneTouch {
                timestamp_ms: i as i64,
                bar_idx: i,
                price: *p,
            })
            .collect();
        z
    }

    #[test]
    fn compliant_zone_passes_unchanged() {
        // 30% of closes inside -> purity 0.70 >= 0.65
        let series = series_with_inside_ratio(30, 100, 100.0, 110.0);
        let zone = zone_with_touches(100.0, 110.0, &[101.0, 105.0, 109.0]);
        let id = zone.id;

        let out = apply_purity(zone, &series, 5.0, &gate_cfg());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, id);
        assert_eq!(out[0].low, 100.0);
        assert_eq!(out[0].high, 110.0);
        assert!((out[0].purity - 0.70).abs() < 1e-9);
    }

    #[test]
    fn gate_is_idempotent_on_compliant_zones() {
        let series = series_with_inside_ratio(10, 100, 100.0, 110.0);
        let zone = zone_with_touches(100.0, 110.0, &[101.0, 109.0]);

        let once = apply_purity(zone, &series, 5.0, &gate_cfg());
        let twice = apply_purity(once[0].clone(), &series, 5.0, &gate_cfg());
        assert_eq!(once.len(), twice.len());
        assert_eq!(once[0].id, twice[0].id);
        assert_eq!(once[0].low, twice[0].low);
        assert_eq!(once[0].high, twice[0].high);
    }

    #[test]
    fn impure_zone_shrinks_to_touch_core() {
        // All closes sit in the upper half of the band, so the full band is
        // impure but the tight core around the touches is clean.
        let total = 100;
        let rows: Vec<(f64, f64, f64, f64)> = (0..total)
            .map(|i| {
                // 40 closes inside the wide band at ~107, rest far away
                let close = if i < 40 { 107.0 } else { 160.0 };
                (close, close + 1.0, close - 1.0, close)
            })
            .collect();
        let series = OhlcvTimeSeries::from_rows("BTCUSDT", Timeframe::H1, 0, &rows);

        // Touches clustered at 101..102, far from the closes at 107
        let zone = zone_with_touches(
            100.0,
            110.0,
            &[101.0, 101.2, 101.4, 101.6, 101.8, 102.0],
        );

        let out = apply_purity(zone, &series, 5.0, &gate_cfg());
        assert_eq!(out.len(), 1);
        assert!(out[0].high < 107.0, "shrunk band must exclude the close cluster");
        assert!(out[0].purity >= gate_cfg().purity_threshold);
    }

    /// Scenario: purity 0.60 with a bimodal touch distribution separated by
    /// more than 0.6 ATR splits into two independently validated children.
    #[test]
    fn bimodal_impure_zone_splits_into_two() {
        let total = 100;
        let rows: Vec<(f64, f64, f64, f64)> = (0..total)
            .map(|i| {
                // 40% of closes inside the band, spread across the middle so
                // both the full band and the shrunk band stay impure.
                let close = if i < 40 { 102.5 + (i % 5) as f64 } else { 150.0 };
                (close, close + 0.5, close - 0.5, close)
            })
            .collect();
        let series = OhlcvTimeSeries::from_rows("BTCUSDT", Timeframe::H1, 0, &rows);

        // Two clusters: ~100.2 and ~109.8, gap ~9.6 >= 0.6 * ATR(5) = 3
        let zone = zone_with_touches(
            100.0,
            110.0,
            &[100.0, 100.1, 100.2, 100.3, 100.4, 109.6, 109.7, 109.8, 109.9, 110.0],
        );

        let out = apply_purity(zone, &series, 5.0, &gate_cfg());
        assert_eq!(out.len(), 2, "expected a two-way split, got {:?}", out.len());

        let (lower, upper) = (&out[0], &out[1]);
        assert!(lower.high < upper.low, "children must not overlap");
        assert!(lower.high < 103.0, "lower child should hug the lower cluster");
        assert!(upper.low > 107.0, "upper child should hug the upper cluster");
        for child in &out {
            assert!(child.purity >= gate_cfg().purity_threshold);
            assert!(child.touches.len() >= 2);
        }
    }

    #[test]
    fn unimodal_impure_zone_is_dropped() {
        // 40% of closes sit exactly on the touch cluster, so the shrunk core is
        // as impure as the full band, and a single cluster cannot split.
        let rows: Vec<(f64, f64, f64, f64)> = (0..100)
            .map(|i| {
                let close = if i < 40 { 105.0 } else { 150.0 };
                (close, close + 0.5, close - 0.5, close)
            })
            .collect();
        let series = OhlcvTimeSeries::from_rows("BTCUSDT", Timeframe::H1, 0, &rows);

        let zone = zone_with_touches(100.0, 110.0, &[104.8, 104.9, 105.0, 105.1, 105.2]);

        let out = apply_purity(zone, &series, 5.0, &gate_cfg());
        assert!(out.is_empty());
    }
}
