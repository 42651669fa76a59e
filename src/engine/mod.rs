mod arbitrator;
mod base;
mod core;
mod fast;
mod locks;
mod slow;

pub use arbitrator::Arbitrator;
pub use core::SentryEngine;
pub use fast::FastEngine;
pub use locks::SignalLockBook;
pub use slow::SlowEngine;
