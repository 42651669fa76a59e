use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "Long"),
            Self::Short => write!(f, "Short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupType {
    FlipRetest,
    SweepReturn,
}

impl std::fmt::Display for SetupType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::FlipRetest => write!(f, "flip-retest"),
            Self::SweepReturn => write!(f, "sweep-return"),
        }
    }
}

/// How a setup confirmed.
/// Base: the plain two-close / standard-wick path.
/// Alternative: the retest-and-react flip path.
/// Strict: the escalated sweep criteria (tighter wick ratio, capped return window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    Base,
    Alternative,
    Strict,
}

/// An ephemeral detection result. Created and discarded within a single
/// engine tick; never persisted.
#[derive(Debug, Clone)]
pub struct Setup {
    pub setup_type: SetupType,
    pub direction: Direction,
    pub confirmation: Confirmation,
    pub zone_id: Uuid,
    /// Index of the bar that triggered the setup.
    pub trigger_idx: usize,
}
