use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RegimeError, Result};

/// Every threshold, window and seed the classifiers use, in one place.
/// Missing keys in a TOML file fall back to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub volatility: VolatilitySettings,
    pub trend: TrendSettings,
    pub volume: VolumeSettings,
    pub efficiency: EfficiencySettings,
    pub cluster: ClusterSettings,
    pub hidden_state: HiddenStateSettings,
    pub aggregator: AggregatorSettings,
}

impl RegimeConfig {
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.volatility.window < 2 {
            errors.push("volatility.window must be >= 2".to_string());
        }
        if self.volatility.low_edge <= 0.0 || self.volatility.low_edge >= self.volatility.high_edge {
            errors.push("volatility: 0 < low_edge < high_edge required".to_string());
        }

        if self.trend.fast_span == 0 || self.trend.fast_span >= self.trend.slow_span {
            errors.push("trend: fast_span must be > 0 and < slow_span".to_string());
        }
        if self.trend.range_window == 0 {
            errors.push("trend.range_window must be > 0".to_string());
        }

        if self.volume.window == 0 {
            errors.push("volume.window must be > 0".to_string());
        }
        if self.volume.dry_edge <= 0.0 || self.volume.dry_edge >= self.volume.surge_edge {
            errors.push("volume: 0 < dry_edge < surge_edge required".to_string());
        }

        if self.efficiency.window == 0 {
            errors.push("efficiency.window must be > 0".to_string());
        }

        if self.cluster.n_clusters == 0 {
            errors.push("cluster.n_clusters must be > 0".to_string());
        }
        if self.cluster.n_init == 0 || self.cluster.max_iter == 0 {
            errors.push("cluster: n_init and max_iter must be > 0".to_string());
        }
        if self.cluster.feature_window < 2 {
            errors.push("cluster.feature_window must be >= 2".to_string());
        }

        if self.hidden_state.n_states == 0 {
            errors.push("hidden_state.n_states must be > 0".to_string());
        }
        if self.hidden_state.max_iter == 0 {
            errors.push("hidden_state.max_iter must be > 0".to_string());
        }
        if self.hidden_state.min_covar <= 0.0 {
            errors.push("hidden_state.min_covar must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config
            .validate()
            .map_err(|errors| RegimeError::Config(errors.join(", ")))?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        info!("Loaded regime configuration from {}", path.display());
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilitySettings {
    /// Short window; the long window is three times this.
    pub window: usize,
    pub low_edge: f64,
    pub high_edge: f64,
}

impl Default for VolatilitySettings {
    fn default() -> Self {
        Self {
            window: 20,
            low_edge: 0.7,
            high_edge: 1.3,
        }
    }
}

impl VolatilitySettings {
    pub fn long_window(&self) -> usize {
        self.window * 3
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    pub adx_threshold: f64,
    pub fast_span: usize,
    pub slow_span: usize,
    /// High-low range window used as the fallback path's noise proxy.
    pub range_window: usize,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            adx_threshold: 25.0,
            fast_span: 20,
            slow_span: 50,
            range_window: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    pub window: usize,
    pub dry_edge: f64,
    pub surge_edge: f64,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            window: 20,
            dry_edge: 0.7,
            surge_edge: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencySettings {
    pub window: usize,
}

impl Default for EfficiencySettings {
    fn default() -> Self {
        Self { window: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub n_clusters: usize,
    /// Window for the rolling-volatility and relative-volume features.
    pub feature_window: usize,
    /// Independent k-means++ restarts; the lowest-inertia run wins.
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            feature_window: 20,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenStateSettings {
    pub enabled: bool,
    pub n_states: usize,
    pub max_iter: usize,
    /// Log-likelihood gain below which EM stops.
    pub tol: f64,
    /// Added to covariance diagonals to keep them positive definite.
    pub min_covar: f64,
    pub seed: u64,
}

impl Default for HiddenStateSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            n_states: 3,
            max_iter: 1000,
            tol: 1e-2,
            min_covar: 1e-3,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    /// Run the classifiers on scoped worker threads.
    pub parallel: bool,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self { parallel: true }
    }
}
