//! Timeframe vocabulary shared by every component (Immutable Blueprints)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::EnumIter;

use crate::utils::TimeUtils;

/// The four bar intervals the pipeline operates on.
/// M15/H1 are entry timeframes; H4/D1 provide higher-timeframe context.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
pub enum Timeframe {
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ENTRY: [Self; 2] = [Self::M15, Self::H1];
    pub const HIGHER: [Self; 2] = [Self::H4, Self::D1];

    pub fn duration(&self) -> Duration {
        match self {
            Self::M15 => Duration::from_secs(15 * 60),
            Self::H1 => Duration::from_secs(60 * 60),
            Self::H4 => Duration::from_secs(4 * 60 * 60),
            Self::D1 => Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn interval_ms(&self) -> i64 {
        match self {
            Self::M15 => TimeUtils::MS_IN_15_MIN,
            Self::H1 => TimeUtils::MS_IN_H,
            Self::H4 => TimeUtils::MS_IN_4_H,
            Self::D1 => TimeUtils::MS_IN_D,
        }
    }

    pub fn is_higher(&self) -> bool {
        Self::HIGHER.contains(self)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::M15 => write!(f, "15m"),
            Self::H1 => write!(f, "1h"),
            Self::H4 => write!(f, "4h"),
            Self::D1 => write!(f, "1d"),
        }
    }
}

impl From<Timeframe> for Duration {
    fn from(tf: Timeframe) -> Self {
        tf.duration()
    }
}
