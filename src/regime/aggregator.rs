use std::thread::{self, ScopedJoinHandle};

use tracing::{debug, error, info};

use crate::config::RegimeConfig;
use crate::error::{RegimeError, Result};
use crate::ml::LatentStateCapability;
use crate::types::{
    IndicatorFrame, LabelSeries, RegimeSnapshot, TrendRegime, VolatilityRegime, VolumeRegime,
};

#[cfg(feature = "hmm")]
use super::HiddenStateModel;
use super::efficiency::NEUTRAL_EFFICIENCY;
use super::{
    ClassifierOutcome, EfficiencyScorer, RegimeClassifier, StrategyFitEvaluator, TrendClassifier,
    UnsupervisedClusterer, VolatilityClassifier, VolumeClassifier,
};

/// Every classifier's per-bar output for one frame.
#[derive(Debug)]
pub struct RegimeHistory {
    pub volatility: ClassifierOutcome<VolatilityRegime>,
    pub trend: ClassifierOutcome<TrendRegime>,
    pub volume: ClassifierOutcome<VolumeRegime>,
    pub efficiency: ClassifierOutcome<f64>,
    pub cluster: ClassifierOutcome<usize>,
    /// `None` when the latent-state model is unavailable, disabled or failed.
    pub hidden_state: Option<LabelSeries<usize>>,
}

impl RegimeHistory {
    pub fn len(&self) -> usize {
        self.volatility.labels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Composite regime at bar `index`.
    pub fn at(&self, index: usize) -> Option<RegimeSnapshot> {
        let efficiency = *self.efficiency.labels().get(index)?;
        Some(RegimeSnapshot {
            volatility: *self.volatility.labels().get(index)?,
            trend: *self.trend.labels().get(index)?,
            volume: *self.volume.labels().get(index)?,
            efficiency: if efficiency.is_finite() {
                efficiency.clamp(0.0, 1.0)
            } else {
                NEUTRAL_EFFICIENCY
            },
            cluster: *self.cluster.labels().get(index)?,
            hmm_state: self
                .hidden_state
                .as_ref()
                .and_then(|states| states.get(index).copied()),
        })
    }

    /// Composite regime at the most recent bar.
    pub fn latest(&self) -> Result<RegimeSnapshot> {
        self.len()
            .checked_sub(1)
            .and_then(|last| self.at(last))
            .ok_or(RegimeError::EmptySeries)
    }

    /// Names of the classifiers that substituted neutral labels.
    pub fn fallbacks(&self) -> Vec<&'static str> {
        [
            ("volatility", self.volatility.is_fallback()),
            ("trend", self.trend.is_fallback()),
            ("volume", self.volume.is_fallback()),
            ("efficiency", self.efficiency.is_fallback()),
            ("cluster", self.cluster.is_fallback()),
        ]
        .into_iter()
        .filter_map(|(name, failed)| failed.then_some(name))
        .collect()
    }
}

/// Runs every classifier over a frame and reduces their outputs to one
/// [`RegimeSnapshot`].
///
/// Each call recomputes from the full input. The most recent snapshot is
/// kept for [`RegimeAggregator::last_snapshot`] only and is never read back
/// during classification.
#[derive(Debug, Clone)]
pub struct RegimeAggregator {
    config: RegimeConfig,
    capability: LatentStateCapability,
    last_snapshot: Option<RegimeSnapshot>,
}

impl Default for RegimeAggregator {
    fn default() -> Self {
        Self::new(RegimeConfig::default())
    }
}

impl RegimeAggregator {
    pub fn new(config: RegimeConfig) -> Self {
        let capability = LatentStateCapability::detect();
        debug!(target: "analysis", ?capability, "Regime aggregator created");
        Self {
            config,
            capability,
            last_snapshot: None,
        }
    }

    pub fn with_capability(mut self, capability: LatentStateCapability) -> Self {
        self.capability = capability;
        self
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn capability(&self) -> LatentStateCapability {
        self.capability
    }

    /// Full per-bar output of every classifier.
    ///
    /// Fails only on an empty frame; classifier failures are carried in the
    /// returned outcomes.
    pub fn label_history(&self, frame: &IndicatorFrame) -> Result<RegimeHistory> {
        if frame.is_empty() {
            return Err(RegimeError::EmptySeries);
        }

        let history = if self.config.aggregator.parallel {
            self.classify_parallel(frame)
        } else {
            self.classify_sequential(frame)
        };

        let fallbacks = history.fallbacks();
        if !fallbacks.is_empty() {
            debug!(target: "analysis", ?fallbacks, "Snapshot uses neutral labels");
        }
        Ok(history)
    }

    /// Snapshot of the most recent bar, without touching the cache.
    pub fn snapshot(&self, frame: &IndicatorFrame) -> Result<RegimeSnapshot> {
        self.label_history(frame)?.latest()
    }

    /// Snapshot of the most recent bar; also remembered as the last snapshot.
    pub fn aggregate(&mut self, frame: &IndicatorFrame) -> Result<RegimeSnapshot> {
        let snapshot = self.snapshot(frame)?;
        info!(
            target: "analysis",
            bars = frame.len(),
            volatility = %snapshot.volatility,
            trend = %snapshot.trend,
            volume = %snapshot.volume,
            efficiency = snapshot.efficiency,
            cluster = snapshot.cluster,
            hmm_state = ?snapshot.hmm_state,
            "Regime snapshot"
        );
        self.last_snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Result of the most recent successful [`RegimeAggregator::aggregate`].
    pub fn last_snapshot(&self) -> Option<&RegimeSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Fresh snapshot judged against `style` with the default thresholds.
    pub fn is_favorable(&mut self, frame: &IndicatorFrame, style: &str) -> Result<bool> {
        let snapshot = self.aggregate(frame)?;
        Ok(StrategyFitEvaluator::default().evaluate(&snapshot, style))
    }

    fn classify_sequential(&self, frame: &IndicatorFrame) -> RegimeHistory {
        let config = &self.config;
        RegimeHistory {
            volatility: VolatilityClassifier::new(config.volatility.clone()).run(frame),
            trend: TrendClassifier::new(config.trend.clone()).run(frame),
            volume: VolumeClassifier::new(config.volume.clone()).run(frame),
            efficiency: EfficiencyScorer::new(config.efficiency.clone()).run(frame),
            cluster: UnsupervisedClusterer::new(config.cluster.clone()).run(frame),
            hidden_state: self.hidden_states(frame),
        }
    }

    fn classify_parallel(&self, frame: &IndicatorFrame) -> RegimeHistory {
        let config = &self.config;
        let volatility = VolatilityClassifier::new(config.volatility.clone());
        let trend = TrendClassifier::new(config.trend.clone());
        let volume = VolumeClassifier::new(config.volume.clone());
        let efficiency = EfficiencyScorer::new(config.efficiency.clone());
        let cluster = UnsupervisedClusterer::new(config.cluster.clone());
        let rows = frame.len();

        thread::scope(|scope| {
            let volatility_job = scope.spawn(|| volatility.run(frame));
            let trend_job = scope.spawn(|| trend.run(frame));
            let volume_job = scope.spawn(|| volume.run(frame));
            let efficiency_job = scope.spawn(|| efficiency.run(frame));
            let cluster_job = scope.spawn(|| cluster.run(frame));
            let hidden_job = scope.spawn(|| self.hidden_states(frame));

            RegimeHistory {
                volatility: joined(volatility_job, &volatility, rows),
                trend: joined(trend_job, &trend, rows),
                volume: joined(volume_job, &volume, rows),
                efficiency: joined(efficiency_job, &efficiency, rows),
                cluster: joined(cluster_job, &cluster, rows),
                hidden_state: hidden_job.join().unwrap_or_else(|_| {
                    error!(
                        target: "analysis",
                        classifier = "hidden_state",
                        "Worker panicked, omitting its output"
                    );
                    None
                }),
            }
        })
    }

    fn hidden_states(&self, frame: &IndicatorFrame) -> Option<LabelSeries<usize>> {
        if !self.capability.is_available() || !self.config.hidden_state.enabled {
            debug!(target: "analysis", "Latent-state model not in use");
            return None;
        }

        #[cfg(feature = "hmm")]
        {
            HiddenStateModel::new(self.config.hidden_state.clone()).run(frame)
        }
        #[cfg(not(feature = "hmm"))]
        {
            let _ = frame;
            None
        }
    }
}

fn joined<C: RegimeClassifier>(
    handle: ScopedJoinHandle<'_, ClassifierOutcome<C::Label>>,
    classifier: &C,
    rows: usize,
) -> ClassifierOutcome<C::Label> {
    handle.join().unwrap_or_else(|_| {
        classifier.fallback(
            RegimeError::WorkerPanicked(classifier.name().to_string()),
            rows,
        )
    })
}
