use ndarray::Array2;

use crate::indicators::{pct_change, relative_volume, rolling_std};
use crate::types::Series;

/// Per-bar features for clustering:
/// 1. Close-to-close return
/// 2. Rolling std of returns over `window`
/// 3. Volume relative to its `window` mean
///
/// Undefined entries (warm-up, division by zero) are 0.
pub fn cluster_features(series: &Series, window: usize) -> Array2<f64> {
    let returns = pct_change(&series.closes());
    let volatility = rolling_std(&returns, window);
    let volume_ratio = relative_volume(&series.volumes(), window);

    stack(&[returns, volatility, volume_ratio], series.len())
}

/// Per-bar features for the hidden-state model:
/// 1. Close-to-close return
/// 2. Percentage change in volume
///
/// Undefined entries are 0.
pub fn hidden_state_features(series: &Series) -> Array2<f64> {
    let returns = pct_change(&series.closes());
    let volume_change = pct_change(&series.volumes());

    stack(&[returns, volume_change], series.len())
}

fn stack(columns: &[Vec<Option<f64>>], rows: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, columns.len()), |(i, j)| {
        columns[j].get(i).copied().flatten().unwrap_or(0.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bar;
    use chrono::{Duration, TimeZone, Utc};

    fn series(n: usize) -> Series {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 100.0 + (i % 5) as f64;
                Bar {
                    timestamp: start + Duration::hours(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: if i == 3 { 0.0 } else { 1_000.0 + i as f64 },
                }
            })
            .collect();
        Series::new(bars).unwrap()
    }

    #[test]
    fn test_cluster_features_shape_and_fill() {
        let features = cluster_features(&series(30), 20);
        assert_eq!(features.shape(), &[30, 3]);
        // No return on the first bar, no rolling stats before the window fills
        assert_eq!(features[[0, 0]], 0.0);
        assert_eq!(features[[10, 1]], 0.0);
        assert_eq!(features[[10, 2]], 0.0);
        assert!(features[[25, 1]] > 0.0);
        assert!(features[[25, 2]] > 0.0);
        assert!(features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_hidden_state_features_zero_volume() {
        let features = hidden_state_features(&series(10));
        assert_eq!(features.shape(), &[10, 2]);
        // Volume change out of a zero-volume bar is undefined
        assert_eq!(features[[4, 1]], 0.0);
        assert_eq!(features[[3, 1]], -1.0);
        assert!(features.iter().all(|v| v.is_finite()));
    }
}
