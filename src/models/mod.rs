mod ohlcv;
mod setup;
mod signal;
mod zone;

pub use ohlcv::OhlcvTimeSeries;
pub use setup::{Confirmation, Direction, Setup, SetupType};
pub use signal::{LockScope, Signal};
pub use zone::{LifecycleClass, Zone, ZoneKind, ZoneMeta, ZoneTouch};
