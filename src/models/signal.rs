use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Timeframe;
use crate::models::setup::{Confirmation, Direction, SetupType};

/// Which zone a signal has locked, and until when.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockScope {
    pub zone_id: Uuid,
    pub timeframe: Timeframe,
    pub until_ms: i64,
}

/// The unit of output. Handed to the persistence/notification boundary;
/// consumers deduplicate on the deterministic id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub setup_type: SetupType,
    pub confirmation: Confirmation,
    pub zone_id: Uuid,

    pub entry: f64,
    pub stop: f64,
    pub target1: f64,
    pub target2: f64,
    /// Entry-to-stop distance, the R unit targets are expressed in.
    pub risk_r: f64,

    pub confidence: i32,
    pub reasons: Vec<String>,

    pub created_ms: i64,
    /// A signal not acted upon before this deadline is no longer actionable.
    pub valid_until_ms: i64,

    pub lock: LockScope,
    /// Set by the arbitrator when this fast signal rides an aligned slow signal.
    pub piggyback_on: Option<Uuid>,
}

impl Signal {
    /// Deterministic id over (symbol, timeframe, zone, setup type, bar timestamp):
    /// re-emission of the same physical signal across overlapping ticks is
    /// detectable by the consumer.
    pub fn deterministic_id(
        symbol: &str,
        timeframe: Timeframe,
        zone_id: Uuid,
        setup_type: SetupType,
        bar_ts_ms: i64,
    ) -> Uuid {
        let name = format!(
            "{}|{}|{}|{}|{}",
            symbol, timeframe, zone_id, setup_type, bar_ts_ms
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    /// The mandatory ordering invariant. Long: stop < entry < target1 < target2.
    /// Short: stop > entry > target1 > target2. A violation is a hard rejection
    /// upstream, never a warning.
    pub fn ladder_is_ordered(&self) -> bool {
        match self.direction {
            Direction::Long => {
                self.stop < self.entry && self.entry < self.target1 && self.target1 < self.target2
            }
            Direction::Short => {
                self.stop > self.entry && self.entry > self.target1 && self.target1 > self.target2
            }
        }
    }
}
