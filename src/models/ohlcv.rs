use serde::{Deserialize, Serialize};

use crate::config::Timeframe;
use crate::domain::Candle;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OhlcvTimeSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamps: Vec<i64>,
    pub open_prices: Vec<f64>,
    pub high_prices: Vec<f64>,
    pub low_prices: Vec<f64>,
    pub close_prices: Vec<f64>,
}

impl OhlcvTimeSeries {
    pub fn from_candles(symbol: String, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        let len = candles.len();

        let mut ts_vec = Vec::with_capacity(len);
        let mut open_vec = Vec::with_capacity(len);
        let mut high_vec = Vec::with_capacity(len);
        let mut low_vec = Vec::with_capacity(len);
        let mut close_vec = Vec::with_capacity(len);

        for c in &candles {
            ts_vec.push(c.timestamp_ms);
            open_vec.push(c.open);
            high_vec.push(c.high);
            low_vec.push(c.low);
            close_vec.push(c.close);
        }

        Self {
            symbol,
            timeframe,
            timestamps: ts_vec,
            open_prices: open_vec,
            high_prices: high_vec,
            low_prices: low_vec,
            close_prices: close_vec,
        }
    }

    /// Row-oriented constructor. Rows are (open, high, low, close), one bar per
    /// entry, timestamped from `start_ms` at the timeframe's interval.
    pub fn from_rows(
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        rows: &[(f64, f64, f64, f64)],
    ) -> Self {
        let interval = timeframe.interval_ms();
        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| Candle::new(start_ms + i as i64 * interval, o, h, l, c))
            .collect();
        Self::from_candles(symbol.to_string(), timeframe, candles)
    }

    pub fn get_candle(&self, idx: usize) -> Candle {
        Candle::new(
            self.timestamps[idx],
            self.open_prices[idx],
            self.high_prices[idx],
            self.low_prices[idx],
            self.close_prices[idx],
        )
    }

    pub fn klines(&self) -> usize {
        self.open_prices.len()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close_prices.last().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    /// Index of the first bar in the most recent `window` bars.
    pub fn tail_start(&self, window: usize) -> usize {
        self.klines().saturating_sub(window)
    }
}
