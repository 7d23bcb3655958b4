use crate::types::Bar;

/// True range per bar. The first bar has no previous close, so its range is
/// just high - low.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.range();
            match i.checked_sub(1).map(|p| bars[p].close) {
                Some(prev_close) => {
                    let hc = (bar.high - prev_close).abs();
                    let lc = (bar.low - prev_close).abs();
                    hl.max(hc).max(lc)
                }
                None => hl,
            }
        })
        .collect()
}

/// Wilder-smoothed average true range. Seeded with the simple mean of the
/// first `period` true ranges, then `(prev * (period - 1) + tr) / period`.
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    wilder_average(&true_range(bars), period)
}

/// Average directional index (Wilder). Defined from bar `2 * period - 1`
/// onwards.
pub fn adx(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let n = bars.len();
    let mut out = vec![None; n];
    if period == 0 || n <= period {
        return out;
    }

    let tr = true_range(bars);
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    // Wilder running sums over bars 1..=period, then s - s / p + x
    let p = period as f64;
    let mut s_tr: f64 = tr[1..=period].iter().sum();
    let mut s_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut s_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = vec![None; n];
    dx[period] = Some(directional_index(s_tr, s_plus, s_minus));
    for i in period + 1..n {
        s_tr = s_tr - s_tr / p + tr[i];
        s_plus = s_plus - s_plus / p + plus_dm[i];
        s_minus = s_minus - s_minus / p + minus_dm[i];
        dx[i] = Some(directional_index(s_tr, s_plus, s_minus));
    }

    let dx_values: Vec<f64> = dx[period..].iter().map(|v| v.unwrap_or(0.0)).collect();
    for (offset, value) in wilder_average(&dx_values, period).into_iter().enumerate() {
        out[period + offset] = value;
    }
    out
}

fn directional_index(s_tr: f64, s_plus: f64, s_minus: f64) -> f64 {
    if s_tr <= 0.0 {
        return 0.0;
    }
    let di_plus = 100.0 * s_plus / s_tr;
    let di_minus = 100.0 * s_minus / s_tr;
    let sum = di_plus + di_minus;
    if sum <= 0.0 {
        0.0
    } else {
        100.0 * (di_plus - di_minus).abs() / sum
    }
}

fn wilder_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let p = period as f64;
    let mut value = values[..period].iter().sum::<f64>() / p;
    out[period - 1] = Some(value);
    for i in period..values.len() {
        value = (value * (p - 1.0) + values[i]) / p;
        out[i] = Some(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64], spread: f64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close + spread,
                low: close - spread,
                close,
                volume: 100.0,
            })
            .collect()
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let data = bars(&[100.0, 110.0], 1.0);
        let tr = true_range(&data);
        assert_eq!(tr[0], 2.0);
        // high 111 vs previous close 100
        assert_eq!(tr[1], 11.0);
    }

    #[test]
    fn test_atr_seed_and_smoothing() {
        let data = bars(&[10.0; 6], 0.5);
        let values = atr(&data, 3);
        assert_eq!(values[0], None);
        assert_eq!(values[1], None);
        assert_eq!(values[2], Some(1.0));
        assert_eq!(values[5], Some(1.0));
    }

    #[test]
    fn test_adx_strong_uptrend() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + 2.0 * i as f64).collect();
        let values = adx(&bars(&closes, 0.5), 14);
        assert!(values[26].is_none());
        let last = values[39].unwrap();
        assert!(last > 90.0, "adx {}", last);
    }

    #[test]
    fn test_adx_too_short() {
        let values = adx(&bars(&[1.0, 2.0, 3.0], 0.1), 14);
        assert!(values.iter().all(Option::is_none));
    }
}
