pub mod atr;
pub mod ema;
pub mod volume;

pub use atr::*;
pub use ema::*;
pub use volume::*;

use crate::error::Result;
use crate::types::{columns, IndicatorFrame};

/// Default period for the Wilder-smoothed ADX / ATR columns.
pub const DEFAULT_WILDER_PERIOD: usize = 14;

/// Lift a plain column into the `Option` form the rolling helpers take.
pub fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| if v.is_finite() { Some(*v) } else { None })
        .collect()
}

/// Bar-over-bar percentage change. The first bar, and any change that is not
/// finite (zero previous value), is undefined.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(None);
            continue;
        }
        let change = (values[i] - values[i - 1]) / values[i - 1];
        out.push(if change.is_finite() { Some(change) } else { None });
    }
    out
}

/// Absolute bar-over-bar difference; undefined on the first bar.
pub fn abs_diff(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i == 0 {
            out.push(None);
        } else {
            out.push(Some((values[i] - values[i - 1]).abs()));
        }
    }
    out
}

/// Apply `reducer` over each trailing window of exactly `window` values.
/// A window containing an undefined value yields `None`, as do the first
/// `window - 1` positions.
pub fn rolling<F>(values: &[Option<f64>], window: usize, reducer: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for end in window..=values.len() {
        buf.clear();
        buf.extend(values[end - window..end].iter().map_while(|v| *v));
        if buf.len() == window {
            out[end - 1] = reducer(&buf);
        }
    }
    out
}

pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, mean)
}

pub fn rolling_sum(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| Some(w.iter().sum()))
}

/// Sample standard deviation (n - 1 denominator).
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std)
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().reduce(f64::max))
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().copied().reduce(f64::min))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

impl IndicatorFrame {
    /// Attach ADX(14), EMA(20), EMA(50) and ATR(14) columns computed from the
    /// bars, so the trend classifier can take its directional-strength path.
    /// Warm-up positions hold NaN.
    pub fn with_standard_indicators(self) -> Result<Self> {
        let bars = self.series().bars().to_vec();
        let closes = self.series().closes();
        let to_column = |values: Vec<Option<f64>>| -> Vec<f64> {
            values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
        };

        let adx = to_column(adx(&bars, DEFAULT_WILDER_PERIOD));
        let atr = to_column(atr(&bars, DEFAULT_WILDER_PERIOD));

        self.with_column(columns::ADX, adx)?
            .with_column(columns::EMA_FAST, ewm_mean(&closes, 20))?
            .with_column(columns::EMA_SLOW, ewm_mean(&closes, 50))?
            .with_column(columns::ATR, atr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bar, Series};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_pct_change() {
        let changes = pct_change(&[100.0, 110.0, 99.0, 0.0, 5.0]);
        assert_eq!(changes[0], None);
        assert!((changes[1].unwrap() - 0.10).abs() < 1e-12);
        assert!((changes[2].unwrap() + 0.10).abs() < 1e-12);
        assert_eq!(changes[3], Some(-1.0));
        // Division by a zero previous close is undefined
        assert_eq!(changes[4], None);
    }

    #[test]
    fn test_rolling_requires_full_window() {
        let values = defined(&[1.0, 2.0, 3.0, 4.0]);
        let sums = rolling_sum(&values, 3);
        assert_eq!(sums, vec![None, None, Some(6.0), Some(9.0)]);

        let with_gap = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let means = rolling_mean(&with_gap, 2);
        assert_eq!(means, vec![None, None, None, Some(3.5), Some(4.5)]);

        assert_eq!(rolling_max(&values, 2)[3], Some(4.0));
        assert_eq!(rolling_min(&values, 2)[3], Some(3.0));
        assert!(rolling_sum(&values, 0).iter().all(Option::is_none));
    }

    #[test]
    fn test_sample_std() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138089935).abs() < 1e-6);
        assert_eq!(sample_std(&[1.0]), None);
        assert_eq!(sample_std(&[3.0, 3.0, 3.0]), Some(0.0));
    }

    #[test]
    fn test_standard_indicator_columns() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..80)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar {
                    timestamp: start + Duration::hours(i),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect();
        let frame = IndicatorFrame::new(Series::new(bars).unwrap())
            .with_standard_indicators()
            .unwrap();

        for name in columns::OPTIONAL {
            assert_eq!(frame.column(name).unwrap().len(), 80);
        }
        let adx = frame.column(columns::ADX).unwrap();
        assert!(adx[0].is_nan());
        assert!(adx[79] > 25.0);
        let atr = frame.column(columns::ATR).unwrap();
        assert!(atr[79].is_finite());
    }
}
