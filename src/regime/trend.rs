use tracing::debug;

use crate::config::TrendSettings;
use crate::error::Result;
use crate::indicators::{defined, ema_gap, rolling_max, rolling_min};
use crate::types::{columns, IndicatorFrame, LabelSeries, TrendRegime};

use super::{require_finite, require_rows, RegimeClassifier};

/// Trending vs ranging.
///
/// With an `adx` column the decision is `adx > adx_threshold`, additionally
/// gated on `|ema_20 - ema_50| > atr` when all three of those columns exist.
/// Without one it falls back to comparing the fast/slow exponential-mean gap
/// against the recent high-low range. Undefined inputs read as ranging.
#[derive(Debug, Clone, Default)]
pub struct TrendClassifier {
    settings: TrendSettings,
}

impl TrendClassifier {
    pub fn new(settings: TrendSettings) -> Self {
        Self { settings }
    }

    fn directional(&self, frame: &IndicatorFrame, adx: &[f64]) -> LabelSeries<TrendRegime> {
        let separation = match (
            frame.column(columns::EMA_FAST),
            frame.column(columns::EMA_SLOW),
            frame.column(columns::ATR),
        ) {
            (Some(fast), Some(slow), Some(atr)) => Some((fast, slow, atr)),
            _ => None,
        };

        (0..frame.len())
            .map(|i| {
                let strong = adx[i] > self.settings.adx_threshold;
                let separated = separation
                    .map_or(true, |(fast, slow, atr)| (fast[i] - slow[i]).abs() > atr[i]);
                TrendRegime::from_flag(strong && separated)
            })
            .collect()
    }

    fn moving_average(&self, frame: &IndicatorFrame) -> Result<LabelSeries<TrendRegime>> {
        let series = frame.series();
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();
        require_finite("close", &closes)?;
        require_finite("high", &highs)?;
        require_finite("low", &lows)?;

        let gap = ema_gap(&closes, self.settings.fast_span, self.settings.slow_span);
        let window = self.settings.range_window;
        let highest = rolling_max(&defined(&highs), window);
        let lowest = rolling_min(&defined(&lows), window);

        Ok(gap
            .iter()
            .zip(highest.iter().zip(&lowest))
            .map(|(&gap, range)| match range {
                (Some(high), Some(low)) => TrendRegime::from_flag(gap > high - low),
                _ => TrendRegime::Ranging,
            })
            .collect())
    }
}

impl RegimeClassifier for TrendClassifier {
    type Label = TrendRegime;

    fn name(&self) -> &'static str {
        "trend"
    }

    fn fallback_label(&self) -> TrendRegime {
        TrendRegime::Ranging
    }

    fn classify(&self, frame: &IndicatorFrame) -> Result<LabelSeries<TrendRegime>> {
        require_rows(frame)?;
        match frame.column(columns::ADX) {
            Some(adx) => Ok(self.directional(frame, adx)),
            None => {
                debug!(target: "analysis", "No adx column, using moving-average trend test");
                self.moving_average(frame)
            }
        }
    }
}
