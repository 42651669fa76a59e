use argminmax::ArgMinMax;
use std::f64;

#[inline]
pub(crate) fn get_max(vec: &[f64]) -> f64 {
    let max_index: usize = vec.argmax();
    vec[max_index]
}

#[inline]
pub(crate) fn mean_and_stddev(data: &[f64]) -> (f64, f64) {
    let count = data.len();
    if count == 0 {
        return (0.0, 0.0);
    }

    let sum: f64 = data.iter().sum();
    let mean = sum / count as f64;

    let variance: f64 = data
        .iter()
        .map(|value| {
            let diff = mean - *value;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    (mean, variance.sqrt())
}

/// Linearly maps a value from one range to another while preserving its relative proportion.
/// Output is clamped to the output range.
pub(crate) fn remap_clamped(val: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    if (in_max - in_min).abs() < f64::EPSILON {
        return out_min;
    }
    let t = ((val - in_min) / (in_max - in_min)).clamp(0.0, 1.0);
    out_min + t * (out_max - out_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_clamps_outside_input_range() {
        assert_eq!(remap_clamped(2.0, 0.0, 1.0, 0.0, 10.0), 10.0);
        assert_eq!(remap_clamped(-1.0, 0.0, 1.0, 0.0, 10.0), 0.0);
        assert_eq!(remap_clamped(0.5, 0.0, 1.0, 0.0, 10.0), 5.0);
    }

    #[test]
    fn stddev_of_constant_series_is_zero() {
        let (mean, sd) = mean_and_stddev(&[3.0, 3.0, 3.0]);
        assert_eq!(mean, 3.0);
        assert_eq!(sd, 0.0);
    }
}
