use crate::config::FreshnessSettings;
use crate::models::Zone;

/// The freshness stage of the gate, applied after purity. A zone whose most
/// recent touch is older than the per-timeframe threshold is stale; untouched
/// zones count as stale too. Stale zones below the configured retain class are
/// dropped, the rest are kept flagged for downstream score penalization.
pub(crate) fn apply_freshness(
    zone: Zone,
    current_bar: usize,
    cfg: &FreshnessSettings,
) -> Option<Zone> {
    let threshold = cfg.max_bars(zone.timeframe);
    let is_stale = match zone.bars_since_touch(current_bar) {
        Some(bars) => bars > threshold,
        None => true, // never touched
    };

    if !is_stale {
        let mut fresh = zone;
        fresh.stale = false;
        return Some(fresh);
    }

    if zone.lifecycle >= cfg.retain_min_class {
        let mut flagged = zone;
        flagged.stale = true;
        Some(flagged)
    } else {
        #[cfg(debug_assertions)]
        log::debug!(
            "GATE [{} {}]: dropped stale {} zone {:.4}-{:.4}",
            zone.symbol,
            zone.timeframe,
            zone.kind,
            zone.low,
            zone.high
        );
        None
    }
}
