use super::{defined, rolling_mean};

/// Current volume over its trailing `window` mean. Undefined during warm-up
/// and when the mean is zero.
pub fn relative_volume(volumes: &[f64], window: usize) -> Vec<Option<f64>> {
    let averages = rolling_mean(&defined(volumes), window);
    volumes
        .iter()
        .zip(averages)
        .map(|(&volume, avg)| {
            avg.and_then(|avg| {
                let ratio = volume / avg;
                if ratio.is_finite() {
                    Some(ratio)
                } else {
                    None
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_volume() {
        let volumes = [100.0, 100.0, 100.0, 400.0];
        let rel = relative_volume(&volumes, 4);
        assert_eq!(&rel[..3], &[None, None, None]);
        // 400 / mean(100, 100, 100, 400)
        assert!((rel[3].unwrap() - 400.0 / 175.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_average_is_undefined() {
        let rel = relative_volume(&[0.0, 0.0, 0.0], 2);
        assert_eq!(rel, vec![None, None, None]);
    }
}
