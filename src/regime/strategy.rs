use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::types::{RegimeSnapshot, TrendRegime, VolatilityRegime};

/// Trading style whose suitability is judged against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StrategyStyle {
    TrendFollowing,
    MeanReversion,
    /// Any unrecognised style; never vetoed.
    Other(String),
}

impl StrategyStyle {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TrendFollowing => "trend_following",
            Self::MeanReversion => "mean_reversion",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for StrategyStyle {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().replace('-', "_").as_str() {
            "trend_following" => Self::TrendFollowing,
            "mean_reversion" => Self::MeanReversion,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl From<&str> for StrategyStyle {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(style) => style,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for StrategyStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Veto rules for trading styles.
///
/// Trend following needs a trending market, at least normal volatility and
/// efficiency above `trend_min_efficiency`. Mean reversion needs a ranging
/// market, at most normal volatility and efficiency below
/// `reversion_max_efficiency`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyFitEvaluator {
    pub trend_min_efficiency: f64,
    pub reversion_max_efficiency: f64,
}

impl Default for StrategyFitEvaluator {
    fn default() -> Self {
        Self {
            trend_min_efficiency: 0.6,
            reversion_max_efficiency: 0.4,
        }
    }
}

impl StrategyFitEvaluator {
    pub fn new(trend_min_efficiency: f64, reversion_max_efficiency: f64) -> Self {
        Self {
            trend_min_efficiency,
            reversion_max_efficiency,
        }
    }

    pub fn is_favorable(&self, snapshot: &RegimeSnapshot, style: &StrategyStyle) -> bool {
        match style {
            StrategyStyle::TrendFollowing => {
                snapshot.trend == TrendRegime::Trending
                    && snapshot.volatility >= VolatilityRegime::Normal
                    && snapshot.efficiency > self.trend_min_efficiency
            }
            StrategyStyle::MeanReversion => {
                snapshot.trend == TrendRegime::Ranging
                    && snapshot.volatility <= VolatilityRegime::Normal
                    && snapshot.efficiency < self.reversion_max_efficiency
            }
            StrategyStyle::Other(_) => true,
        }
    }

    pub fn evaluate(&self, snapshot: &RegimeSnapshot, style: &str) -> bool {
        self.is_favorable(snapshot, &StrategyStyle::from(style))
    }
}
