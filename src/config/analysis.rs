//! Analysis and signal-detection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Timeframe;
use crate::models::LifecycleClass;

/// Settings for the zone purity gate (shrink / split / drop).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateSettings {
    /// Minimum fraction of bars that must close OUTSIDE a zone for it to count as respected.
    pub purity_threshold: f64,

    /// Percentile band of touching prices used by the shrink rescue.
    pub shrink_pctl_low: usize,
    pub shrink_pctl_high: usize,

    /// Resolution of the density grid the split rescue evaluates across the band.
    pub kde_grid_points: usize,
    /// A density peak must protrude at least this fraction of the maximum density.
    pub peak_prominence_frac: f64,
    /// Two peaks closer than this (in ATR units) are the same cluster. No split.
    pub min_peak_gap_atr: f64,
    /// Each side of a split needs at least this many touching prices.
    pub min_cluster_points: usize,
}

/// Settings for the zone freshness check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FreshnessSettings {
    pub max_bars_m15: usize,
    pub max_bars_h1: usize,
    pub max_bars_h4: usize,
    pub max_bars_d1: usize,

    /// Stale zones below this lifecycle class are dropped. At or above, they are
    /// kept with `stale = true` for downstream score penalization.
    pub retain_min_class: LifecycleClass,
}

impl FreshnessSettings {
    pub fn max_bars(&self, tf: Timeframe) -> usize {
        match tf {
            Timeframe::M15 => self.max_bars_m15,
            Timeframe::H1 => self.max_bars_h1,
            Timeframe::H4 => self.max_bars_h4,
            Timeframe::D1 => self.max_bars_d1,
        }
    }
}

/// Tuning profile for one concrete signal engine.
/// The fast (15m) and slow (1h) engines are the same machinery under two profiles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineProfile {
    pub timeframe: Timeframe,

    /// How many closed bars the setup detectors look back over.
    pub lookback: usize,

    // Flip-Retest
    /// A retest counts when price returns to within this many ATRs of the flip edge.
    pub retest_tolerance_atr: f64,
    /// Minimum post-retest reaction, in ATR units, for the alternative confirmation.
    pub min_reaction_atr: f64,

    // Sweep-Return
    pub sweep_wick_ratio: f64,
    /// Stricter ratio applied under enhanced confirmation.
    pub strict_wick_ratio: f64,
    /// The next N bars after a sweep must close back inside-or-through the zone.
    pub sweep_return_bars: usize,

    // VWAP bias
    pub vwap_mandatory: bool,
    /// Countertrend sweeps may bypass an incompatible bias.
    pub vwap_sweep_exempt: bool,
    pub vwap_buffer_pct: f64,
    /// Confidence cost of an incompatible bias when the check is optional.
    pub vwap_soft_penalty: i32,

    // HTF clearance
    pub htf_clearance_mult: f64,
    /// Hard gate (reject) vs. soft gate (confidence penalty with a floor).
    pub htf_hard_reject: bool,
    pub htf_soft_penalty: i32,

    // Confidence
    pub base_confidence: i32,
    pub min_confidence: i32,
    pub key_class_bonus: i32,
    pub stale_penalty: i32,

    // SL/TP ladder
    pub sl_buffer_atr: f64,
    pub tp1_r: f64,
    pub tp2_r: f64,

    // Locking & validity, in entry-timeframe bars
    pub lock_bars: usize,
    pub valid_bars: usize,

    /// Fast engine only: escalate confirmation requirements when the zone sits
    /// majority-inside an opposing zone of the slower timeframe.
    pub enhanced_confirmation: bool,
    pub enhanced_overlap_frac: f64,
}

impl EngineProfile {
    pub fn lock_duration_ms(&self) -> i64 {
        self.lock_bars as i64 * self.timeframe.interval_ms()
    }

    pub fn validity_ms(&self) -> i64 {
        self.valid_bars as i64 * self.timeframe.interval_ms()
    }
}

/// Settings for the cross-timeframe arbitrator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArbiterSettings {
    /// Confidence bonus for a fast signal riding an aligned slow signal.
    pub piggyback_bonus: i32,
    /// Independent front-run clearance floor, in ATR units.
    pub front_run_clearance_atr: f64,
}

/// Settings for the symbol warm-up coordinator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoaderSettings {
    pub max_attempts: u32,
    pub backoff_secs: [u64; 3],
    /// Ready-queue capacity. This is the sole backpressure control.
    pub queue_capacity: usize,
}

/// The Master Analysis Configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub gate: GateSettings,
    pub freshness: FreshnessSettings,
    pub fast: EngineProfile,
    pub slow: EngineProfile,
    pub arbiter: ArbiterSettings,
    pub loader: LoaderSettings,

    /// Cadence of the per-symbol analysis tick.
    pub tick_interval: Duration,
}
