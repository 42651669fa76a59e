//! Configuration module for the zone-sentry application.

// Can all be private now because we have a public re-export.
mod analysis;
mod types;

// Public
pub mod constants;

// Re-export commonly used items
pub use analysis::{
    AnalysisConfig, ArbiterSettings, EngineProfile, FreshnessSettings, GateSettings,
    LoaderSettings,
};
pub use constants::ANALYSIS;
pub use types::Timeframe;
