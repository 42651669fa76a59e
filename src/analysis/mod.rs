mod freshness;
mod gate;
mod purity;
mod registry;

pub use gate::filter_zones;
pub use registry::{HtfBands, ZoneRegistry};
