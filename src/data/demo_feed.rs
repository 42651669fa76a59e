use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use strum::IntoEnumIterator;

use crate::config::Timeframe;
use crate::data::provider::{MarketView, WarmUpLoader, ZoneSource};
use crate::domain::Candle;
use crate::models::{LifecycleClass, OhlcvTimeSeries, Zone, ZoneKind, ZoneTouch};

const DEMO_BARS: usize = 300;
const SWING_LOOKBACK: usize = 120;
const ATR_WINDOW: usize = 14;
const VWAP_WINDOW: usize = 20;

/// Self-contained stand-in for the external data and zone-builder
/// collaborators: a deterministic synthetic walk per symbol/timeframe, with
/// candidate zones derived from recent swing extremes. Lets the binary run a
/// full pipeline demo with no exchange connection, and gives tests fixture
/// data with stable shapes.
pub struct DemoFeed {
    series: HashMap<(String, Timeframe), Arc<OhlcvTimeSeries>>,
}

impl DemoFeed {
    pub fn new(symbols: &[String]) -> Self {
        let mut series = HashMap::new();
        for symbol in symbols {
            for tf in Timeframe::iter() {
                let seed = seed_for(symbol, tf);
                let bars = synth_walk(seed, tf);
                series.insert(
                    (symbol.clone(), tf),
                    Arc::new(OhlcvTimeSeries::from_candles(symbol.clone(), tf, bars)),
                );
            }
        }
        Self { series }
    }
}

fn seed_for(symbol: &str, tf: Timeframe) -> u64 {
    // Cheap stable hash; only has to vary the walks, not be well distributed
    let mut seed: u64 = 0xcbf29ce484222325;
    for b in symbol.bytes().chain(tf.to_string().bytes()) {
        seed ^= b as u64;
        seed = seed.wrapping_mul(0x100000001b3);
    }
    seed
}

/// Linear-congruential step; returns a uniform draw in [0, 1).
fn lcg_next(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*state >> 11) as f64 / (1u64 << 53) as f64
}

fn synth_walk(seed: u64, tf: Timeframe) -> Vec<Candle> {
    let mut state = seed;
    let mut price = 80.0 + lcg_next(&mut state) * 40.0;
    let interval = tf.interval_ms();

    (0..DEMO_BARS)
        .map(|i| {
            let drift = (lcg_next(&mut state) - 0.5) * 0.02 * price;
            let open = price;
            let close = (price + drift).max(1.0);
            let wick = lcg_next(&mut state) * 0.01 * price;
            let high = open.max(close) + wick;
            let low = (open.min(close) - wick).max(0.5);
            price = close;
            Candle::new(i as i64 * interval, open, high, low, close)
        })
        .collect()
}

impl MarketView for DemoFeed {
    fn series(&self, symbol: &str, tf: Timeframe) -> Option<Arc<OhlcvTimeSeries>> {
        self.series.get(&(symbol.to_string(), tf)).cloned()
    }

    fn atr(&self, symbol: &str, tf: Timeframe) -> Option<f64> {
        let series = self.series(symbol, tf)?;
        let len = series.klines();
        if len < ATR_WINDOW + 1 {
            return None;
        }
        let mut sum = 0.0;
        for i in (len - ATR_WINDOW)..len {
            let high = series.high_prices[i];
            let low = series.low_prices[i];
            let prev_close = series.close_prices[i - 1];
            let tr = (high - low)
                .max((high - prev_close).abs())
                .max((low - prev_close).abs());
            sum += tr;
        }
        Some(sum / ATR_WINDOW as f64)
    }

    fn vwap(&self, symbol: &str, tf: Timeframe) -> Option<f64> {
        let series = self.series(symbol, tf)?;
        let len = series.klines();
        if len < VWAP_WINDOW {
            return None;
        }
        let sum: f64 = series.close_prices[(len - VWAP_WINDOW)..].iter().sum();
        Some(sum / VWAP_WINDOW as f64)
    }

    fn last_price(&self, symbol: &str) -> Option<f64> {
        self.series(symbol, Timeframe::M15)?.last_close()
    }
}

impl ZoneSource for DemoFeed {
    /// Candidate zones off the recent swing extremes: a support band under the
    /// lowest low and a resistance band over the highest high, with touches
    /// recorded for every bar that traded into the band.
    fn candidate_zones(&self, symbol: &str, tf: Timeframe) -> Vec<Zone> {
        let Some(series) = self.series(symbol, tf) else {
            return Vec::new();
        };
        let Some(atr) = self.atr(symbol, tf) else {
            return Vec::new();
        };

        let len = series.klines();
        let start = series.tail_start(SWING_LOOKBACK);
        if len - start < 10 || atr <= 0.0 {
            return Vec::new();
        }

        let lowest = series.low_prices[start..]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let highest = series.high_prices[start..]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let mut zones = Vec::with_capacity(2);
        let band = 0.5 * atr;

        if let Ok(mut support) = Zone::new(
            symbol,
            tf,
            ZoneKind::Support,
            lowest,
            lowest + band,
            1.0,
            LifecycleClass::Active,
        ) {
            support.meta.flipped = seed_for(symbol, tf) % 2 == 0;
            record_touches(&mut support, &series, start);
            zones.push(support);
        }

        if let Ok(mut resistance) = Zone::new(
            symbol,
            tf,
            ZoneKind::Resistance,
            highest - band,
            highest,
            1.0,
            LifecycleClass::Active,
        ) {
            record_touches(&mut resistance, &series, start);
            zones.push(resistance);
        }

        zones
    }
}

fn record_touches(zone: &mut Zone, series: &OhlcvTimeSeries, start: usize) {
    for idx in start..series.klines() {
        let candle = series.get_candle(idx);
        let touched = match zone.kind {
            ZoneKind::Support => candle.low <= zone.high,
            ZoneKind::Resistance => candle.high >= zone.low,
        };
        if touched {
            zone.touches.push(ZoneTouch {
                timestamp_ms: candle.timestamp_ms,
                bar_idx: idx,
                price: match zone.kind {
                    ZoneKind::Support => candle.low,
                    ZoneKind::Resistance => candle.high,
                },
            });
        }
    }
}

#[async_trait]
impl WarmUpLoader for DemoFeed {
    async fn load_warm_up_data(&self, _symbol: &str) -> Result<()> {
        // Pretend to hit the network so the coordinator's pacing is visible
        tokio::time::sleep(Duration::from_millis(25)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_are_deterministic_per_symbol() {
        let symbols = vec!["BTCUSDT".to_string()];
        let a = DemoFeed::new(&symbols);
        let b = DemoFeed::new(&symbols);

        let sa = a.series("BTCUSDT", Timeframe::H1).unwrap();
        let sb = b.series("BTCUSDT", Timeframe::H1).unwrap();
        assert_eq!(sa.close_prices, sb.close_prices);
        assert_eq!(sa.klines(), DEMO_BARS);
    }

    #[test]
    fn candidate_zones_carry_touch_history() {
        let symbols = vec!["ETHUSDT".to_string()];
        let feed = DemoFeed::new(&symbols);
        let zones = feed.candidate_zones("ETHUSDT", Timeframe::H1);
        assert!(!zones.is_empty());
        for zone in &zones {
            assert!(zone.low < zone.high);
            assert!(!zone.touches.is_empty(), "swing zones must have touches");
        }
    }
}
