mod candle;

pub use candle::{Candle, CandleKind};
