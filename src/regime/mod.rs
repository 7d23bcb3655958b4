//! Per-signal regime classifiers and their fusion into one snapshot.
//!
//! Every classifier reads the shared, immutable [`IndicatorFrame`] and writes
//! only its own [`LabelSeries`]. None reads another's output, so the
//! aggregator may run them concurrently. A classifier never propagates its
//! own failure: it reports it to the `analysis` log target and hands back
//! its neutral label for every bar, tagged with the reason.

pub mod aggregator;
pub mod cluster;
pub mod efficiency;
#[cfg(feature = "hmm")]
pub mod hidden_state;
pub mod strategy;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use aggregator::{RegimeAggregator, RegimeHistory};
pub use cluster::UnsupervisedClusterer;
pub use efficiency::EfficiencyScorer;
#[cfg(feature = "hmm")]
pub use hidden_state::HiddenStateModel;
pub use strategy::{StrategyFitEvaluator, StrategyStyle};
pub use trend::TrendClassifier;
pub use volatility::VolatilityClassifier;
pub use volume::VolumeClassifier;

use tracing::error;

use crate::error::{RegimeError, Result};
use crate::types::{IndicatorFrame, LabelSeries};

/// What a classifier produced for one frame.
#[derive(Debug)]
pub enum ClassifierOutcome<T> {
    Valid(LabelSeries<T>),
    /// Classification failed; `labels` holds the neutral value for every bar.
    Fallback {
        labels: LabelSeries<T>,
        reason: RegimeError,
    },
}

impl<T> ClassifierOutcome<T> {
    pub fn labels(&self) -> &LabelSeries<T> {
        match self {
            Self::Valid(labels) => labels,
            Self::Fallback { labels, .. } => labels,
        }
    }

    pub fn into_labels(self) -> LabelSeries<T> {
        match self {
            Self::Valid(labels) => labels,
            Self::Fallback { labels, .. } => labels,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn failure(&self) -> Option<&RegimeError> {
        match self {
            Self::Valid(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn latest(&self) -> Option<&T> {
        self.labels().last()
    }
}

pub trait RegimeClassifier {
    type Label: Clone;

    fn name(&self) -> &'static str;

    /// Neutral label substituted for every bar on failure.
    fn fallback_label(&self) -> Self::Label;

    fn classify(&self, frame: &IndicatorFrame) -> Result<LabelSeries<Self::Label>>;

    fn fallback(&self, reason: RegimeError, len: usize) -> ClassifierOutcome<Self::Label> {
        error!(
            target: "analysis",
            classifier = self.name(),
            error = %reason,
            "Regime classification failed, using neutral labels"
        );
        ClassifierOutcome::Fallback {
            labels: LabelSeries::filled(self.fallback_label(), len),
            reason,
        }
    }

    /// Classify without ever failing outward.
    fn run(&self, frame: &IndicatorFrame) -> ClassifierOutcome<Self::Label> {
        match self.classify(frame) {
            Ok(labels) => ClassifierOutcome::Valid(labels),
            Err(reason) => self.fallback(reason, frame.len()),
        }
    }
}

fn require_rows(frame: &IndicatorFrame) -> Result<()> {
    if frame.is_empty() {
        return Err(RegimeError::EmptySeries);
    }
    Ok(())
}

fn require_finite(column: &str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(RegimeError::NonFinite {
            column: column.to_string(),
            index,
        }),
        None => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;

    impl RegimeClassifier for AlwaysFails {
        type Label = u8;

        fn name(&self) -> &'static str {
            "always_fails"
        }

        fn fallback_label(&self) -> u8 {
            7
        }

        fn classify(&self, _frame: &IndicatorFrame) -> Result<LabelSeries<u8>> {
            Err(RegimeError::Numerical("boom".to_string()))
        }
    }

    #[test]
    fn test_run_substitutes_fallback() {
        let frame = testing::frame_from_closes(&[1.0, 2.0, 3.0]);
        let outcome = AlwaysFails.run(&frame);

        assert!(outcome.is_fallback());
        assert_eq!(outcome.labels().as_slice(), &[7, 7, 7]);
        assert!(matches!(outcome.failure(), Some(RegimeError::Numerical(_))));
        assert_eq!(outcome.latest(), Some(&7));
    }

    #[test]
    fn test_require_finite_reports_row() {
        match require_finite("close", &[1.0, f64::NAN]) {
            Err(RegimeError::NonFinite { column, index }) => {
                assert_eq!(column, "close");
                assert_eq!(index, 1);
            }
            other => panic!("expected non-finite error, got {:?}", other),
        }
    }
}
