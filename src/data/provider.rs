use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Timeframe;
use crate::models::{OhlcvTimeSeries, Zone};

/// Warm-up boundary: pull enough history for a symbol to be analyzable.
/// Implementations sit on the exchange client and its rate limiter, both of
/// which live outside this crate.
#[async_trait]
pub trait WarmUpLoader: Send + Sync {
    /// Load warm-up data for one symbol. An `Err` is a transient failure the
    /// coordinator will retry with backoff.
    async fn load_warm_up_data(&self, symbol: &str) -> Result<()>;
}

/// Read access to already-loaded market data. Series and indicator values are
/// maintained by the external data layer; the analysis tick only reads them.
pub trait MarketView: Send + Sync {
    fn series(&self, symbol: &str, tf: Timeframe) -> Option<Arc<OhlcvTimeSeries>>;
    fn atr(&self, symbol: &str, tf: Timeframe) -> Option<f64>;
    fn vwap(&self, symbol: &str, tf: Timeframe) -> Option<f64>;
    fn last_price(&self, symbol: &str) -> Option<f64>;
}

/// The external zone builder boundary. Candidates arrive with lifecycle class,
/// strength and flip metadata already computed; the gate and registry decide
/// what the engines actually see.
pub trait ZoneSource: Send + Sync {
    fn candidate_zones(&self, symbol: &str, tf: Timeframe) -> Vec<Zone>;
}
