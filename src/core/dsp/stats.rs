//! Statistical helpers over sample slices

/// Arithmetic mean (0 for an empty slice)
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation (ddof = 0)
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let var = data.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / data.len() as f64;
    var.sqrt()
}

/// `(min, max)` ignoring nothing; NaN propagates as NaN bounds
pub fn min_max(data: &[f64]) -> (f64, f64) {
    data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        if v.is_nan() {
            (f64::NAN, f64::NAN)
        } else {
            (lo.min(v), hi.max(v))
        }
    })
}

/// Compute RMS (Root Mean Square)
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Centered moving average with the same length as the input.
///
/// Near the edges the window shrinks to the available samples.
pub fn moving_average(data: &[f64], window_size: usize) -> Vec<f64> {
    if data.len() < window_size || window_size <= 1 {
        return data.to_vec();
    }

    let half = window_size / 2;
    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    for &v in data {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v);
    }

    (0..data.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + window_size - half).min(data.len());
            (prefix[end] - prefix[start]) / (end - start) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        let samples = vec![1.0, -1.0, 1.0, -1.0];
        assert!((rms(&samples) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-12);
        assert!((std_dev(&data) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(&[3.0, -1.0, 2.0]), (-1.0, 3.0));
        assert!(min_max(&[1.0, f64::NAN]).0.is_nan());
    }

    #[test]
    fn test_moving_average_flat_and_edges() {
        let data = vec![1.0; 10];
        assert_eq!(moving_average(&data, 3), data);

        let ramp: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let smoothed = moving_average(&ramp, 3);
        assert_eq!(smoothed.len(), 5);
        assert!((smoothed[0] - 0.5).abs() < 1e-12);
        assert!((smoothed[2] - 2.0).abs() < 1e-12);
        assert!((smoothed[4] - 3.5).abs() < 1e-12);
    }
}
