mod demo_feed;
mod loader;
mod provider;

pub use demo_feed::DemoFeed;
pub use loader::{LoadProgress, ReadySet, RetryPolicy, SymbolLoadCoordinator};
pub use provider::{MarketView, WarmUpLoader, ZoneSource};
