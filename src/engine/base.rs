use itertools::Itertools;

use crate::analysis::HtfBands;
use crate::config::EngineProfile;
use crate::models::{
    Confirmation, Direction, LifecycleClass, LockScope, OhlcvTimeSeries, Setup, SetupType, Signal,
    Zone, ZoneKind,
};
use crate::utils::remap_clamped;

/// Price position relative to VWAP, with a small buffer so prices hugging the
/// line read as Neutral instead of flickering between Bull and Bear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VwapBias {
    Bull,
    Bear,
    Neutral,
}

impl VwapBias {
    pub(crate) fn allows(&self, direction: Direction) -> bool {
        match self {
            Self::Neutral => true,
            Self::Bull => direction == Direction::Long,
            Self::Bear => direction == Direction::Short,
        }
    }
}

pub(crate) fn classify_vwap_bias(price: f64, vwap: f64, buffer_pct: f64) -> VwapBias {
    if vwap <= 0.0 {
        return VwapBias::Neutral;
    }
    let buffer = vwap * buffer_pct;
    if price > vwap + buffer {
        VwapBias::Bull
    } else if price < vwap - buffer {
        VwapBias::Bear
    } else {
        VwapBias::Neutral
    }
}

/// Distance from entry to the nearest opposing HTF band in the trade direction,
/// in ATR units. None when no opposing band lies ahead.
pub(crate) fn clearance_atr(
    bands: &HtfBands,
    entry: f64,
    direction: Direction,
    atr: f64,
) -> Option<f64> {
    if atr <= 0.0 {
        return None;
    }
    let distance = match direction {
        Direction::Long => bands.above.as_ref().map(|z| z.low - entry),
        Direction::Short => bands.below.as_ref().map(|z| entry - z.high),
    };
    distance.map(|d| d / atr)
}

/// Stop and target ladder for a candidate signal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Levels {
    pub stop: f64,
    pub target1: f64,
    pub target2: f64,
}

/// The shared setup-detection and signal-assembly machinery. The fast and slow
/// engines are this struct under two tuning profiles.
pub(crate) struct BaseEngine {
    pub profile: EngineProfile,
}

impl BaseEngine {
    pub(crate) fn new(profile: EngineProfile) -> Self {
        Self { profile }
    }

    /// Fewest bars a detector can work with.
    pub(crate) fn min_bars(&self) -> usize {
        self.profile.sweep_return_bars + 3
    }

    /// Flip-Retest: the zone's role already reversed upstream; direction follows
    /// its *current* kind. Base confirmation is two consecutive closes beyond the
    /// flip edge; the alternative is one close beyond, a retest back to the edge,
    /// and a reaction of at least `min_reaction_atr` ATRs.
    pub(crate) fn detect_flip_retest(
        &self,
        zone: &Zone,
        series: &OhlcvTimeSeries,
        atr: f64,
        require_alternative: bool,
    ) -> Option<Setup> {
        if !zone.meta.flipped || atr <= 0.0 {
            return None;
        }

        let (direction, edge, sign) = match zone.kind {
            ZoneKind::Support => (Direction::Long, zone.high, 1.0),
            ZoneKind::Resistance => (Direction::Short, zone.low, -1.0),
        };

        let len = series.klines();
        if len < self.min_bars() {
            return None;
        }
        let start = series.tail_start(self.profile.lookback);
        let beyond = |close: f64| sign * (close - edge) > 0.0;

        // Base: two consecutive closes beyond the edge in the flip direction
        let base_hit = series.close_prices[start..]
            .iter()
            .enumerate()
            .tuple_windows()
            .find(|((_, a), (_, b))| beyond(**a) && beyond(**b))
            .map(|(_, (i, _))| start + i);

        if !require_alternative {
            if let Some(trigger_idx) = base_hit {
                return Some(Setup {
                    setup_type: SetupType::FlipRetest,
                    direction,
                    confirmation: Confirmation::Base,
                    zone_id: zone.id,
                    trigger_idx,
                });
            }
        }

        // Alternative: close beyond, retest to within tolerance of the edge,
        // then a reaction away from it.
        let tolerance = self.profile.retest_tolerance_atr * atr;
        let required_reaction = self.profile.min_reaction_atr * atr;

        for i in start..len {
            if !beyond(series.close_prices[i]) {
                continue;
            }
            for j in (i + 1)..len {
                let probe = match direction {
                    Direction::Long => series.low_prices[j],
                    Direction::Short => series.high_prices[j],
                };
                if (probe - edge).abs() > tolerance {
                    continue;
                }
                // Reaction measured against the bars after the retest
                let reaction = series.close_prices[(j + 1)..len]
                    .iter()
                    .map(|c| sign * (c - edge))
                    .fold(f64::NEG_INFINITY, f64::max);
                if reaction >= required_reaction {
                    return Some(Setup {
                        setup_type: SetupType::FlipRetest,
                        direction,
                        confirmation: Confirmation::Alternative,
                        zone_id: zone.id,
                        trigger_idx: j,
                    });
                }
            }
        }

        None
    }

    /// Sweep-Return: a wick pierces the zone edge while the close holds inside,
    /// and the following bars confirm the rejection by closing back
    /// inside-or-through. `strict` applies the escalated wick ratio.
    pub(crate) fn detect_sweep_return(
        &self,
        zone: &Zone,
        series: &OhlcvTimeSeries,
        strict: bool,
    ) -> Option<Setup> {
        let (direction, edge) = match zone.kind {
            ZoneKind::Support => (Direction::Long, zone.low),
            ZoneKind::Resistance => (Direction::Short, zone.high),
        };

        let required_ratio = if strict {
            self.profile.strict_wick_ratio
        } else {
            self.profile.sweep_wick_ratio
        };
        let return_bars = self.profile.sweep_return_bars;

        let len = series.klines();
        if len < self.min_bars() {
            return None;
        }
        let start = series.tail_start(self.profile.lookback);
        let last_candidate = len.checked_sub(return_bars + 1)?;

        // Most recent qualifying sweep wins
        for i in (start..=last_candidate).rev() {
            let candle = series.get_candle(i);

            let (penetrates, wick) = match direction {
                Direction::Long => (candle.low < edge, candle.lower_wick_len()),
                Direction::Short => (candle.high > edge, candle.upper_wick_len()),
            };
            let closed_inside = candle.close >= zone.low && candle.close <= zone.high;
            if !penetrates || !closed_inside {
                continue;
            }

            // Doji guard: a wick with near-zero body is a maximal rejection
            let body = candle.body_len().max(candle.close.abs() * 1e-6);
            if wick / body < required_ratio {
                continue;
            }

            let returned = (1..=return_bars).all(|k| {
                let close = series.close_prices[i + k];
                match direction {
                    Direction::Long => close >= edge,
                    Direction::Short => close <= edge,
                }
            });
            if returned {
                return Some(Setup {
                    setup_type: SetupType::SweepReturn,
                    direction,
                    confirmation: if strict {
                        Confirmation::Strict
                    } else {
                        Confirmation::Base
                    },
                    zone_id: zone.id,
                    trigger_idx: i,
                });
            }
        }

        None
    }

    /// Stop behind the zone edge plus an ATR buffer; target1 = 1R or the nearest
    /// same-timeframe opposing zone if closer; target2 = 2R or the nearest HTF
    /// opposing band if closer, clamped never to cross target1.
    pub(crate) fn compute_levels(
        &self,
        zone: &Zone,
        direction: Direction,
        entry: f64,
        atr: f64,
        same_tf: &[Zone],
        bands: &HtfBands,
    ) -> Option<Levels> {
        let buffer = self.profile.sl_buffer_atr * atr;

        match direction {
            Direction::Long => {
                let stop = zone.low - buffer;
                let risk = entry - stop;
                if risk <= 0.0 {
                    return None;
                }

                let mut target1 = entry + self.profile.tp1_r * risk;
                let nearest_opposing = same_tf
                    .iter()
                    .filter(|z| z.id != zone.id && z.kind == ZoneKind::Resistance && z.low > entry)
                    .min_by(|a, b| a.low.total_cmp(&b.low));
                if let Some(opposing) = nearest_opposing {
                    if opposing.low < target1 {
                        target1 = opposing.low;
                    }
                }

                let default_t2 = entry + self.profile.tp2_r * risk;
                let mut target2 = default_t2;
                if let Some(htf) = &bands.above {
                    if htf.low > entry && htf.low < target2 {
                        target2 = htf.low;
                    }
                }
                if target2 <= target1 {
                    target2 = default_t2;
                }

                Some(Levels {
                    stop,
                    target1,
                    target2,
                })
            }
            Direction::Short => {
                let stop = zone.high + buffer;
                let risk = stop - entry;
                if risk <= 0.0 {
                    return None;
                }

                let mut target1 = entry - self.profile.tp1_r * risk;
                let nearest_opposing = same_tf
                    .iter()
                    .filter(|z| z.id != zone.id && z.kind == ZoneKind::Support && z.high < entry)
                    .max_by(|a, b| a.high.total_cmp(&b.high));
                if let Some(opposing) = nearest_opposing {
                    if opposing.high > target1 {
                        target1 = opposing.high;
                    }
                }

                let default_t2 = entry - self.profile.tp2_r * risk;
                let mut target2 = default_t2;
                if let Some(htf) = &bands.below {
                    if htf.high < entry && htf.high > target2 {
                        target2 = htf.high;
                    }
                }
                if target2 >= target1 {
                    target2 = default_t2;
                }

                Some(Levels {
                    stop,
                    target1,
                    target2,
                })
            }
        }
    }

    /// Confidence before engine-specific adjustments: profile base, a bonus for
    /// Key zones and well-respected bands, a penalty for stale ones, and a nudge
    /// for setups that confirmed the hard way.
    pub(crate) fn confidence_for(&self, zone: &Zone, confirmation: Confirmation) -> i32 {
        let mut confidence = self.profile.base_confidence;
        if zone.lifecycle == LifecycleClass::Key {
            confidence += self.profile.key_class_bonus;
        }
        confidence += remap_clamped(zone.purity, 0.5, 1.0, 0.0, 10.0) as i32;
        if zone.stale {
            confidence -= self.profile.stale_penalty;
        }
        if confirmation != Confirmation::Base {
            confidence += 5;
        }
        confidence
    }

    /// Assemble the Signal and enforce the ordering invariant. A violation is an
    /// upstream logic bug: log it and discard, it must never reach the output.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn build_signal(
        &self,
        zone: &Zone,
        setup: &Setup,
        entry: f64,
        levels: Levels,
        confidence: i32,
        reasons: Vec<String>,
        bar_ts_ms: i64,
        as_of_ms: i64,
    ) -> Option<Signal> {
        let profile = &self.profile;
        let signal = Signal {
            id: Signal::deterministic_id(
                &zone.symbol,
                profile.timeframe,
                zone.id,
                setup.setup_type,
                bar_ts_ms,
            ),
            symbol: zone.symbol.clone(),
            timeframe: profile.timeframe,
            direction: setup.direction,
            setup_type: setup.setup_type,
            confirmation: setup.confirmation,
            zone_id: zone.id,
            entry,
            stop: levels.stop,
            target1: levels.target1,
            target2: levels.target2,
            risk_r: (entry - levels.stop).abs(),
            confidence: confidence.clamp(0, 100),
            reasons,
            created_ms: as_of_ms,
            valid_until_ms: as_of_ms + profile.validity_ms(),
            lock: LockScope {
                zone_id: zone.id,
                timeframe: profile.timeframe,
                until_ms: as_of_ms + profile.lock_duration_ms(),
            },
            piggyback_on: None,
        };

        if !signal.ladder_is_ordered() {
            log::error!(
                "SIGNAL [{} {}]: ladder inconsistency for {} {} (stop {:.4} entry {:.4} t1 {:.4} t2 {:.4}) — discarding",
                signal.symbol,
                signal.timeframe,
                signal.setup_type,
                signal.direction,
                signal.stop,
                signal.entry,
                signal.target1,
                signal.target2
            );
            return None;
        }

        Some(signal)
    }
}
