#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::too_many_arguments)]

// Core modules
pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod models;
pub mod utils;

// Re-export commonly used types outside of crate
pub use analysis::{ZoneRegistry, filter_zones};
pub use config::{ANALYSIS, AnalysisConfig, Timeframe};
pub use data::{DemoFeed, LoadProgress, RetryPolicy, SymbolLoadCoordinator};
pub use engine::SentryEngine;
pub use models::{Signal, Zone};

// CLI argument parsing
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Comma-separated symbol universe to warm up and analyze
    #[arg(long, default_value = "BTCUSDT,ETHUSDT,SOLUSDT,BNBUSDT")]
    pub symbols: String,

    /// Number of analysis ticks before the demo run exits
    #[arg(long, default_value_t = 12)]
    pub ticks: u64,
}

impl Cli {
    pub fn symbol_list(&self) -> Vec<String> {
        self.symbols
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
