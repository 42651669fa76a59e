use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Timeframe;

/// Which side of price the zone defends. A zone's kind determines the semantic
/// direction of any signal anchored to it, and may change via a "flip".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    Support,
    Resistance,
}

impl ZoneKind {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Support => Self::Resistance,
            Self::Resistance => Self::Support,
        }
    }
}

impl std::fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Support => write!(f, "support"),
            Self::Resistance => write!(f, "resistance"),
        }
    }
}

/// Quality tier of a zone. Ordered: a zone may be promoted within a cycle but
/// never silently demoted; an apparent demotion between refreshes is a data
/// inconsistency the registry logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleClass {
    Candidate,
    Active,
    Key,
}

/// One recorded touch of a zone: when, at which bar, and how deep price reached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneTouch {
    pub timestamp_ms: i64,
    pub bar_idx: usize,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneMeta {
    /// Role reversal recorded upstream (former resistance acting as support, or vice versa).
    pub flipped: bool,
    /// Ids of higher-timeframe zones whose band overlaps this one. Filled by the
    /// registry at snapshot time.
    pub htf_overlap: Vec<Uuid>,
}

/// A price interval where price has historically reacted.
/// Immutable per update: the gate and registry produce new values, consumers
/// only ever read a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub kind: ZoneKind,
    pub low: f64,
    pub high: f64,
    pub mid: f64,
    pub strength: f64,
    pub lifecycle: LifecycleClass,
    pub purity: f64,
    pub touches: Vec<ZoneTouch>,
    pub stale: bool,
    pub meta: ZoneMeta,
}

impl Zone {
    pub fn new(
        symbol: &str,
        timeframe: Timeframe,
        kind: ZoneKind,
        low: f64,
        high: f64,
        strength: f64,
        lifecycle: LifecycleClass,
    ) -> Result<Self> {
        if !(low < high) {
            bail!("zone bounds degenerate: low {} >= high {}", low, high);
        }
        if strength < 0.0 {
            bail!("zone strength negative: {}", strength);
        }

        let mid = (low + high) / 2.0;
        Ok(Self {
            id: Self::compute_id(symbol, timeframe, kind, low, high),
            symbol: symbol.to_string(),
            timeframe,
            kind,
            low,
            high,
            mid,
            strength,
            lifecycle,
            purity: 0.0,
            touches: Vec::new(),
            stale: false,
            meta: ZoneMeta::default(),
        })
    }

    /// Deterministic id: the same physical band resolves to the same id across
    /// refreshes even when strength/touches differ. Bounds are quantized to
    /// 1 basis point of the band mid so float jitter does not mint new ids.
    pub fn compute_id(
        symbol: &str,
        timeframe: Timeframe,
        kind: ZoneKind,
        low: f64,
        high: f64,
    ) -> Uuid {
        let mid = (low + high) / 2.0;
        let step = (mid.abs() * 1e-4).max(f64::EPSILON);
        let q_low = (low / step).round() as i64;
        let q_high = (high / step).round() as i64;

        let name = format!("{}|{}|{}|{}|{}", symbol, timeframe, kind, q_low, q_high);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    /// Derive a child zone with new bounds (shrink/split rescue). The child keeps
    /// kind/lifecycle/meta, carries only the touches inside its band, and gets the
    /// deterministic id of its own bounds.
    pub fn with_bounds(&self, low: f64, high: f64) -> Result<Self> {
        if !(low < high) {
            bail!("child zone bounds degenerate: low {} >= high {}", low, high);
        }

        let touches: Vec<ZoneTouch> = self
            .touches
            .iter()
            .copied()
            .filter(|t| t.price >= low && t.price <= high)
            .collect();

        Ok(Self {
            id: Self::compute_id(&self.symbol, self.timeframe, self.kind, low, high),
            low,
            high,
            mid: (low + high) / 2.0,
            touches,
            ..self.clone()
        })
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }

    /// Band widened symmetrically by `mult` of its own width.
    pub fn widened(&self, mult: f64) -> (f64, f64) {
        let pad = self.width() * (mult - 1.0) / 2.0;
        (self.low - pad, self.high + pad)
    }

    /// Fraction of this zone's width covered by `other`. 0.0 when disjoint.
    pub fn overlap_fraction(&self, other: &Zone) -> f64 {
        let lo = self.low.max(other.low);
        let hi = self.high.min(other.high);
        if hi <= lo || self.width() <= 0.0 {
            return 0.0;
        }
        (hi - lo) / self.width()
    }

    pub fn last_touch(&self) -> Option<&ZoneTouch> {
        self.touches.last()
    }

    /// Bars elapsed since the most recent touch. None when never touched.
    pub fn bars_since_touch(&self, current_bar: usize) -> Option<usize> {
        self.last_touch()
            .map(|t| current_bar.saturating_sub(t.bar_idx))
    }

    pub fn is_tradeable(&self) -> bool {
        self.lifecycle >= LifecycleClass::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(low: f64, high: f64) -> Zone {
        Zone::new(
            "BTCUSDT",
            Timeframe::H1,
            ZoneKind::Support,
            low,
            high,
            1.0,
            LifecycleClass::Active,
        )
        .unwrap()
    }

    #[test]
    fn rejects_degenerate_bounds() {
        assert!(
            Zone::new(
                "BTCUSDT",
                Timeframe::H1,
                ZoneKind::Support,
                100.0,
                100.0,
                1.0,
                LifecycleClass::Active,
            )
            .is_err()
        );
    }

    #[test]
    fn id_is_stable_across_refreshes() {
        let a = zone(100.0, 110.0);
        let mut b = zone(100.0, 110.0);
        b.strength = 9.0;
        b.touches.push(ZoneTouch {
            timestamp_ms: 1,
            bar_idx: 1,
            price: 101.0,
        });
        assert_eq!(a.id, b.id);

        // A sub-basis-point wobble in the bounds must not mint a new id.
        let c = zone(100.000001, 110.000001);
        assert_eq!(a.id, c.id);

        // Materially different bounds must.
        let d = zone(100.0, 120.0);
        assert_ne!(a.id, d.id);
    }

    #[test]
    fn overlap_fraction_measures_own_width_coverage() {
        let a = zone(100.0, 110.0);
        let b = zone(105.0, 120.0);
        assert!((a.overlap_fraction(&b) - 0.5).abs() < 1e-12);
        let c = zone(200.0, 210.0);
        assert_eq!(a.overlap_fraction(&c), 0.0);
    }

    #[test]
    fn lifecycle_classes_are_ordered() {
        assert!(LifecycleClass::Key > LifecycleClass::Active);
        assert!(LifecycleClass::Active > LifecycleClass::Candidate);
    }

    #[test]
    fn bars_since_touch_only_decreases_on_a_new_touch() {
        let mut z = zone(100.0, 110.0);
        assert_eq!(z.bars_since_touch(50), None);

        z.touches.push(ZoneTouch {
            timestamp_ms: 0,
            bar_idx: 40,
            price: 105.0,
        });
        let earlier = z.bars_since_touch(50).unwrap();
        let later = z.bars_since_touch(60).unwrap();
        assert!(later >= earlier, "staleness must grow with the bar clock");

        z.touches.push(ZoneTouch {
            timestamp_ms: 1,
            bar_idx: 59,
            price: 104.0,
        });
        assert!(z.bars_since_touch(60).unwrap() < later);
    }

    #[test]
    fn child_zone_keeps_only_inside_touches() {
        let mut z = zone(100.0, 110.0);
        for (i, p) in [101.0, 104.0, 109.0].iter().enumerate() {
            z.touches.push(ZoneTouch {
                timestamp_ms: i as i64,
                bar_idx: i,
                price: *p,
            });
        }
        let child = z.with_bounds(103.0, 110.0).unwrap();
        assert_eq!(child.touches.len(), 2);
        assert_ne!(child.id, z.id);
    }
}
