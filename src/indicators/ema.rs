/// Exponentially weighted mean with span-derived smoothing
/// (`alpha = 2 / (span + 1)`), bias-adjusted so every bar has a value:
/// `y_t = sum((1 - alpha)^i * x_{t-i}) / sum((1 - alpha)^i)`.
pub fn ewm_mean(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    values
        .iter()
        .map(|&x| {
            numerator = x + decay * numerator;
            denominator = 1.0 + decay * denominator;
            numerator / denominator
        })
        .collect()
}

/// Absolute gap between a fast and a slow exponential mean of `values`.
pub fn ema_gap(values: &[f64], fast_span: usize, slow_span: usize) -> Vec<f64> {
    let fast = ewm_mean(values, fast_span);
    let slow = ewm_mean(values, slow_span);
    fast.iter().zip(&slow).map(|(f, s)| (f - s).abs()).collect()
}
