use tracing::debug;

use crate::config::ClusterSettings;
use crate::error::Result;
use crate::ml::{cluster_features, KMeans};
use crate::types::{IndicatorFrame, LabelSeries};

use super::{require_finite, require_rows, RegimeClassifier};

/// Groups bars by return, rolling volatility and relative volume with
/// seeded k-means. Ids only group similar bars and are not comparable
/// across fits.
#[derive(Debug, Clone, Default)]
pub struct UnsupervisedClusterer {
    settings: ClusterSettings,
}

impl UnsupervisedClusterer {
    pub fn new(settings: ClusterSettings) -> Self {
        Self { settings }
    }

    fn model(&self) -> KMeans {
        KMeans::new(self.settings.n_clusters)
            .with_n_init(self.settings.n_init)
            .with_max_iter(self.settings.max_iter)
            .with_tol(self.settings.tol)
            .with_seed(self.settings.seed)
    }
}

impl RegimeClassifier for UnsupervisedClusterer {
    type Label = usize;

    fn name(&self) -> &'static str {
        "cluster"
    }

    fn fallback_label(&self) -> usize {
        0
    }

    fn classify(&self, frame: &IndicatorFrame) -> Result<LabelSeries<usize>> {
        require_rows(frame)?;
        let series = frame.series();
        require_finite("close", &series.closes())?;
        require_finite("volume", &series.volumes())?;

        let features = cluster_features(series, self.settings.feature_window);
        let fit = self.model().fit(&features)?;
        debug!(
            target: "analysis",
            inertia = fit.inertia,
            n_iter = fit.n_iter,
            "Clustered {} bars",
            frame.len()
        );

        Ok(LabelSeries::new(fit.labels))
    }
}
