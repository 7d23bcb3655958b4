use crate::config::EfficiencySettings;
use crate::error::{RegimeError, Result};
use crate::indicators::{abs_diff, rolling_sum};
use crate::types::{IndicatorFrame, LabelSeries};

use super::{require_finite, require_rows, RegimeClassifier};

/// Score given to bars without a defined ratio.
pub const NEUTRAL_EFFICIENCY: f64 = 0.5;

/// Net move over `window` bars divided by the summed absolute bar-to-bar
/// moves across the same span. 1.0 is a straight line, near 0 is churn.
#[derive(Debug, Clone, Default)]
pub struct EfficiencyScorer {
    settings: EfficiencySettings,
}

impl EfficiencyScorer {
    pub fn new(settings: EfficiencySettings) -> Self {
        Self { settings }
    }
}

impl RegimeClassifier for EfficiencyScorer {
    type Label = f64;

    fn name(&self) -> &'static str {
        "efficiency"
    }

    fn fallback_label(&self) -> f64 {
        NEUTRAL_EFFICIENCY
    }

    fn classify(&self, frame: &IndicatorFrame) -> Result<LabelSeries<f64>> {
        require_rows(frame)?;
        let window = self.settings.window;
        if window == 0 {
            return Err(RegimeError::InvalidWindow("efficiency window 0".to_string()));
        }

        let closes = frame.series().closes();
        require_finite("close", &closes)?;
        let path = rolling_sum(&abs_diff(&closes), window);

        Ok(path
            .iter()
            .enumerate()
            .map(|(i, path)| match path {
                Some(path) if *path > 0.0 => {
                    let net = (closes[i] - closes[i - window]).abs();
                    (net / path).clamp(0.0, 1.0)
                }
                _ => NEUTRAL_EFFICIENCY,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::testing::frame_from_closes;

    fn score(closes: &[f64]) -> LabelSeries<f64> {
        EfficiencyScorer::default()
            .classify(&frame_from_closes(closes))
            .unwrap()
    }

    #[test]
    fn test_warm_up_is_neutral() {
        let closes: Vec<f64> = (0..15).map(|i| i as f64 + 1.0).collect();
        let scores = score(&closes);
        assert!(scores.iter().take(10).all(|&s| s == NEUTRAL_EFFICIENCY));
        assert_eq!(scores.get(10), Some(&1.0));
    }

    #[test]
    fn test_straight_line_is_one() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 - 0.5 * i as f64).collect();
        let scores = score(&closes);
        assert!((scores.last().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_is_zero() {
        // Up five, down five: no net move over ten bars
        let mut closes: Vec<f64> = (0..=5).map(|i| 100.0 + i as f64).collect();
        closes.extend((1..=5).map(|i| 105.0 - i as f64));
        let scores = score(&closes);
        assert_eq!(scores.len(), 11);
        assert_eq!(scores.last(), Some(&0.0));
    }

    #[test]
    fn test_flat_prices_are_neutral() {
        let scores = score(&[42.0; 30]);
        assert!(scores.iter().all(|&s| s == NEUTRAL_EFFICIENCY));
    }

    #[test]
    fn test_partial_efficiency() {
        // Ten steps: eight up, two down, net six over a path of ten
        let steps = [1.0, 1.0, 1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0, 1.0];
        let mut closes = vec![10.0];
        for step in steps {
            let next = closes[closes.len() - 1] + step;
            closes.push(next);
        }
        let scores = score(&closes);
        assert!((scores.last().unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_falls_back_to_neutral() {
        let outcome = EfficiencyScorer::default().run(&frame_from_closes(&[1.0, f64::NAN, 3.0]));
        assert!(outcome.is_fallback());
        assert_eq!(outcome.labels().as_slice(), &[NEUTRAL_EFFICIENCY; 3]);
    }
}
