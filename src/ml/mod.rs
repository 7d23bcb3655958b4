pub mod features;
pub mod kmeans;
#[cfg(feature = "hmm")]
pub mod hmm;

pub use features::{cluster_features, hidden_state_features};
pub use kmeans::{KMeans, KMeansFit};

/// Whether the Gaussian hidden-state model is compiled into this build.
/// Resolved once when an aggregator is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatentStateCapability {
    Available,
    Unavailable,
}

impl LatentStateCapability {
    pub fn detect() -> Self {
        if cfg!(feature = "hmm") {
            Self::Available
        } else {
            Self::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_matches_build() {
        assert_eq!(LatentStateCapability::detect().is_available(), cfg!(feature = "hmm"));
        assert!(!LatentStateCapability::Unavailable.is_available());
    }
}
