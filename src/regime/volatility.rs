use crate::config::VolatilitySettings;
use crate::error::{RegimeError, Result};
use crate::indicators::{pct_change, rolling_std};
use crate::types::{IndicatorFrame, LabelSeries, VolatilityRegime};

use super::{require_finite, require_rows, RegimeClassifier};

/// Buckets the ratio of short-window to long-window (3x) return volatility.
#[derive(Debug, Clone, Default)]
pub struct VolatilityClassifier {
    settings: VolatilitySettings,
}

impl VolatilityClassifier {
    pub fn new(settings: VolatilitySettings) -> Self {
        Self { settings }
    }

    /// Edges belong to the normal bucket: `low_edge <= ratio <= high_edge`.
    pub fn bucket(&self, ratio: f64) -> VolatilityRegime {
        if ratio < self.settings.low_edge {
            VolatilityRegime::Low
        } else if ratio > self.settings.high_edge {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Normal
        }
    }

    /// Short/long volatility ratio per bar; `None` while either window is
    /// still filling. Zero volatility in both windows reads as ratio 0.
    pub fn relative_volatility(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let returns = pct_change(closes);
        let short = rolling_std(&returns, self.settings.window);
        let long = rolling_std(&returns, self.settings.long_window());

        short
            .into_iter()
            .zip(long)
            .map(|pair| match pair {
                (Some(s), Some(l)) if l > 0.0 => Some(s / l),
                (Some(s), Some(_)) if s == 0.0 => Some(0.0),
                _ => None,
            })
            .collect()
    }
}

impl RegimeClassifier for VolatilityClassifier {
    type Label = VolatilityRegime;

    fn name(&self) -> &'static str {
        "volatility"
    }

    fn fallback_label(&self) -> VolatilityRegime {
        VolatilityRegime::Normal
    }

    fn classify(&self, frame: &IndicatorFrame) -> Result<LabelSeries<VolatilityRegime>> {
        require_rows(frame)?;
        if self.settings.window < 2 {
            return Err(RegimeError::InvalidWindow(format!(
                "volatility window {} (need >= 2)",
                self.settings.window
            )));
        }

        let closes = frame.series().closes();
        require_finite("close", &closes)?;

        // Undefined positions repeat the last defined label, else normal
        let mut carried = None;
        Ok(self
            .relative_volatility(&closes)
            .into_iter()
            .map(|ratio| {
                if let Some(ratio) = ratio {
                    carried = Some(self.bucket(ratio));
                }
                carried.unwrap_or(VolatilityRegime::Normal)
            })
            .collect())
    }
}
