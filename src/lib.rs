//! Market regime classification from OHLCV history.
//!
//! A [`Series`] of bars (optionally wrapped in an [`IndicatorFrame`] with
//! precomputed indicator columns) is run through independent per-signal
//! classifiers, and [`RegimeAggregator`] reduces their latest values to one
//! [`RegimeSnapshot`]. [`StrategyFitEvaluator`] then judges whether that
//! snapshot suits a trading style.

pub mod config;
pub mod error;
pub mod indicators;
pub mod ml;
pub mod regime;
pub mod types;

pub use config::RegimeConfig;
pub use error::{RegimeError, Result};
pub use ml::LatentStateCapability;
pub use regime::{
    ClassifierOutcome, RegimeAggregator, RegimeClassifier, RegimeHistory, StrategyFitEvaluator,
    StrategyStyle,
};
pub use types::{
    Bar, BarRecord, IndicatorFrame, LabelSeries, RegimeSnapshot, Series, TrendRegime,
    VolatilityRegime, VolumeRegime,
};
