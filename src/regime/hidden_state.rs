use tracing::{debug, error, warn};

use crate::config::HiddenStateSettings;
use crate::error::Result;
use crate::ml::hidden_state_features;
use crate::ml::hmm::GaussianHMM;
use crate::types::{IndicatorFrame, LabelSeries};

use super::{require_finite, require_rows};

/// Gaussian hidden-state model over (return, volume change). Each fit is
/// independent; state ids are only stable within one result.
///
/// Unlike the other classifiers there is no neutral state to substitute,
/// so [`HiddenStateModel::run`] yields `None` on failure.
#[derive(Debug, Clone, Default)]
pub struct HiddenStateModel {
    settings: HiddenStateSettings,
}

impl HiddenStateModel {
    pub fn new(settings: HiddenStateSettings) -> Self {
        Self { settings }
    }

    pub fn detect(&self, frame: &IndicatorFrame) -> Result<LabelSeries<usize>> {
        require_rows(frame)?;
        let series = frame.series();
        require_finite("close", &series.closes())?;
        require_finite("volume", &series.volumes())?;

        let observations = hidden_state_features(series);
        let mut model = GaussianHMM::new(self.settings.n_states, observations.ncols())
            .with_min_covar(self.settings.min_covar)
            .with_seed(self.settings.seed);

        let report = model.fit(&observations, self.settings.max_iter, self.settings.tol)?;
        if report.converged {
            debug!(
                target: "analysis",
                n_iter = report.n_iter,
                log_likelihood = report.log_likelihood,
                "Hidden-state model converged"
            );
        } else {
            warn!(
                target: "analysis",
                n_iter = report.n_iter,
                log_likelihood = report.log_likelihood,
                "Hidden-state model did not converge, decoding anyway"
            );
        }

        Ok(LabelSeries::new(model.predict(&observations)?))
    }

    pub fn run(&self, frame: &IndicatorFrame) -> Option<LabelSeries<usize>> {
        match self.detect(frame) {
            Ok(states) => Some(states),
            Err(e) => {
                error!(
                    target: "analysis",
                    classifier = "hidden_state",
                    error = %e,
                    "Hidden-state model failed, omitting its output"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::testing::{frame_from_closes, trend_then_range};

    #[test]
    fn test_states_cover_every_bar() {
        let frame = trend_then_range(300);
        let model = HiddenStateModel::default();

        let states = model.detect(&frame).unwrap();
        assert_eq!(states.len(), 300);
        assert!(states.iter().all(|&s| s < 3));
        // Seeded, so repeatable
        assert_eq!(model.detect(&frame).unwrap(), states);
    }

    #[test]
    fn test_too_short_series_is_absent() {
        let model = HiddenStateModel::default();
        assert!(model.run(&frame_from_closes(&[100.0, 101.0])).is_none());
    }
}
