use std::time::Duration;

// Top Level Constants
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

pub mod gate {
    use crate::config::GateSettings;

    pub const PURITY_THRESHOLD: f64 = 0.65;
    pub const SHRINK_PCTL_LOW: usize = 15;
    pub const SHRINK_PCTL_HIGH: usize = 85;
    pub const KDE_GRID_POINTS: usize = 64;
    pub const PEAK_PROMINENCE_FRAC: f64 = 0.10;
    pub const MIN_PEAK_GAP_ATR: f64 = 0.6;
    pub const MIN_CLUSTER_POINTS: usize = 2;

    pub const DEFAULT: GateSettings = GateSettings {
        purity_threshold: PURITY_THRESHOLD,
        shrink_pctl_low: SHRINK_PCTL_LOW,
        shrink_pctl_high: SHRINK_PCTL_HIGH,
        kde_grid_points: KDE_GRID_POINTS,
        peak_prominence_frac: PEAK_PROMINENCE_FRAC,
        min_peak_gap_atr: MIN_PEAK_GAP_ATR,
        min_cluster_points: MIN_CLUSTER_POINTS,
    };
}

pub mod freshness {
    use crate::config::FreshnessSettings;
    use crate::models::LifecycleClass;

    pub const MAX_BARS_M15: usize = 200;
    pub const MAX_BARS_H1: usize = 200;
    pub const MAX_BARS_H4: usize = 150;
    pub const MAX_BARS_D1: usize = 90;

    pub const DEFAULT: FreshnessSettings = FreshnessSettings {
        max_bars_m15: MAX_BARS_M15,
        max_bars_h1: MAX_BARS_H1,
        max_bars_h4: MAX_BARS_H4,
        max_bars_d1: MAX_BARS_D1,
        retain_min_class: LifecycleClass::Key,
    };
}

pub mod engine {
    // Shared between both profiles
    pub const RETEST_TOLERANCE_ATR: f64 = 0.25;
    pub const SWEEP_WICK_RATIO: f64 = 1.5;
    pub const STRICT_WICK_RATIO: f64 = 1.8;
    pub const SWEEP_RETURN_BARS: usize = 2;
    pub const VWAP_BUFFER_PCT: f64 = 0.001;
    pub const TP1_R: f64 = 1.0;
    pub const TP2_R: f64 = 2.0;

    pub mod fast {
        use super::*;
        use crate::config::{EngineProfile, Timeframe};

        pub const LOOKBACK: usize = 12;
        pub const MIN_REACTION_ATR: f64 = 0.5;
        pub const HTF_CLEARANCE_MULT: f64 = 1.2;
        pub const BASE_CONFIDENCE: i32 = 55;
        pub const MIN_CONFIDENCE: i32 = 45;
        pub const SL_BUFFER_ATR: f64 = 0.35;
        pub const LOCK_BARS: usize = 16;
        pub const VALID_BARS: usize = 6;
        pub const ENHANCED_OVERLAP_FRAC: f64 = 0.5;

        pub const DEFAULT: EngineProfile = EngineProfile {
            timeframe: Timeframe::M15,
            lookback: LOOKBACK,
            retest_tolerance_atr: RETEST_TOLERANCE_ATR,
            min_reaction_atr: MIN_REACTION_ATR,
            sweep_wick_ratio: SWEEP_WICK_RATIO,
            strict_wick_ratio: STRICT_WICK_RATIO,
            sweep_return_bars: SWEEP_RETURN_BARS,
            vwap_mandatory: true,
            vwap_sweep_exempt: true,
            vwap_buffer_pct: VWAP_BUFFER_PCT,
            vwap_soft_penalty: 0,
            htf_clearance_mult: HTF_CLEARANCE_MULT,
            htf_hard_reject: true,
            htf_soft_penalty: 0,
            base_confidence: BASE_CONFIDENCE,
            min_confidence: MIN_CONFIDENCE,
            key_class_bonus: 10,
            stale_penalty: 10,
            sl_buffer_atr: SL_BUFFER_ATR,
            tp1_r: TP1_R,
            tp2_r: TP2_R,
            lock_bars: LOCK_BARS,
            valid_bars: VALID_BARS,
            enhanced_confirmation: true,
            enhanced_overlap_frac: ENHANCED_OVERLAP_FRAC,
        };
    }

    pub mod slow {
        use super::*;
        use crate::config::{EngineProfile, Timeframe};

        pub const LOOKBACK: usize = 8;
        pub const MIN_REACTION_ATR: f64 = 0.4;
        pub const HTF_CLEARANCE_MULT: f64 = 1.0;
        pub const HTF_SOFT_PENALTY: i32 = 20;
        pub const VWAP_SOFT_PENALTY: i32 = 10;
        pub const BASE_CONFIDENCE: i32 = 50;
        pub const MIN_CONFIDENCE: i32 = 40;
        pub const SL_BUFFER_ATR: f64 = 0.5;
        pub const LOCK_BARS: usize = 12;
        pub const VALID_BARS: usize = 8;

        pub const DEFAULT: EngineProfile = EngineProfile {
            timeframe: Timeframe::H1,
            lookback: LOOKBACK,
            retest_tolerance_atr: RETEST_TOLERANCE_ATR,
            min_reaction_atr: MIN_REACTION_ATR,
            sweep_wick_ratio: SWEEP_WICK_RATIO,
            strict_wick_ratio: STRICT_WICK_RATIO,
            sweep_return_bars: SWEEP_RETURN_BARS,
            vwap_mandatory: false,
            vwap_sweep_exempt: true,
            vwap_buffer_pct: VWAP_BUFFER_PCT,
            vwap_soft_penalty: VWAP_SOFT_PENALTY,
            htf_clearance_mult: HTF_CLEARANCE_MULT,
            htf_hard_reject: false,
            htf_soft_penalty: HTF_SOFT_PENALTY,
            base_confidence: BASE_CONFIDENCE,
            min_confidence: MIN_CONFIDENCE,
            key_class_bonus: 10,
            stale_penalty: 10,
            sl_buffer_atr: SL_BUFFER_ATR,
            tp1_r: TP1_R,
            tp2_r: TP2_R,
            lock_bars: LOCK_BARS,
            valid_bars: VALID_BARS,
            enhanced_confirmation: false,
            enhanced_overlap_frac: super::fast::ENHANCED_OVERLAP_FRAC,
        };
    }
}

pub mod arbiter {
    use crate::config::ArbiterSettings;

    pub const PIGGYBACK_BONUS: i32 = 10;
    pub const FRONT_RUN_CLEARANCE_ATR: f64 = 1.0;

    pub const DEFAULT: ArbiterSettings = ArbiterSettings {
        piggyback_bonus: PIGGYBACK_BONUS,
        front_run_clearance_atr: FRONT_RUN_CLEARANCE_ATR,
    };
}

pub mod loader {
    use crate::config::LoaderSettings;

    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BACKOFF_SECS: [u64; 3] = [5, 15, 30];
    pub const QUEUE_CAPACITY: usize = 8;

    pub const DEFAULT: LoaderSettings = LoaderSettings {
        max_attempts: MAX_ATTEMPTS,
        backoff_secs: BACKOFF_SECS,
        queue_capacity: QUEUE_CAPACITY,
    };
}

/// A pre-constructed AnalysisConfig for callers that run with stock tuning.
pub const ANALYSIS: crate::config::AnalysisConfig = crate::config::AnalysisConfig {
    gate: gate::DEFAULT,
    freshness: freshness::DEFAULT,
    fast: engine::fast::DEFAULT,
    slow: engine::slow::DEFAULT,
    arbiter: arbiter::DEFAULT,
    loader: loader::DEFAULT,
    tick_interval: TICK_INTERVAL,
};
