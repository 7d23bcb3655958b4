use serde::{Deserialize, Serialize};

use super::{TrendRegime, VolatilityRegime, VolumeRegime};

/// Composite, point-in-time regime read from the most recent bar of every
/// classifier. Built fresh per aggregation call.
///
/// Serializes to the flat record consumers expect: integer codes plus their
/// text labels, with `hmm_state` omitted when the latent-state model did not
/// run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SnapshotRecord", try_from = "SnapshotRecord")]
pub struct RegimeSnapshot {
    pub volatility: VolatilityRegime,
    pub trend: TrendRegime,
    pub volume: VolumeRegime,
    /// Path efficiency in [0, 1].
    pub efficiency: f64,
    /// Unordered cluster id; not comparable across different inputs.
    pub cluster: usize,
    /// Latent state id, absent when the model is unavailable or failed.
    pub hmm_state: Option<usize>,
}

impl RegimeSnapshot {
    pub fn volatility_label(&self) -> &'static str {
        self.volatility.as_str()
    }

    pub fn trend_label(&self) -> &'static str {
        self.trend.as_str()
    }

    pub fn volume_label(&self) -> &'static str {
        self.volume.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotRecord {
    volatility: u8,
    volatility_label: String,
    trend: u8,
    trend_label: String,
    volume: u8,
    volume_label: String,
    efficiency: f64,
    cluster: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hmm_state: Option<usize>,
}

impl From<RegimeSnapshot> for SnapshotRecord {
    fn from(s: RegimeSnapshot) -> Self {
        Self {
            volatility: s.volatility.code(),
            volatility_label: s.volatility_label().to_string(),
            trend: s.trend.code(),
            trend_label: s.trend_label().to_string(),
            volume: s.volume.code(),
            volume_label: s.volume_label().to_string(),
            efficiency: s.efficiency,
            cluster: s.cluster,
            hmm_state: s.hmm_state,
        }
    }
}

impl TryFrom<SnapshotRecord> for RegimeSnapshot {
    type Error = String;

    fn try_from(r: SnapshotRecord) -> Result<Self, Self::Error> {
        let volatility = VolatilityRegime::from_code(r.volatility)
            .ok_or_else(|| format!("invalid volatility code {}", r.volatility))?;
        let trend = TrendRegime::from_code(r.trend)
            .ok_or_else(|| format!("invalid trend code {}", r.trend))?;
        let volume = VolumeRegime::from_code(r.volume)
            .ok_or_else(|| format!("invalid volume code {}", r.volume))?;
        if !(0.0..=1.0).contains(&r.efficiency) {
            return Err(format!("efficiency {} outside [0, 1]", r.efficiency));
        }

        Ok(Self {
            volatility,
            trend,
            volume,
            efficiency: r.efficiency,
            cluster: r.cluster,
            hmm_state: r.hmm_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(hmm_state: Option<usize>) -> RegimeSnapshot {
        RegimeSnapshot {
            volatility: VolatilityRegime::High,
            trend: TrendRegime::Trending,
            volume: VolumeRegime::Dry,
            efficiency: 0.75,
            cluster: 2,
            hmm_state,
        }
    }

    #[test]
    fn test_serializes_output_schema() {
        let value = serde_json::to_value(snapshot(Some(1))).unwrap();
        assert_eq!(value["volatility"], 2);
        assert_eq!(value["volatility_label"], "high");
        assert_eq!(value["trend"], 1);
        assert_eq!(value["trend_label"], "trending");
        assert_eq!(value["volume"], 0);
        assert_eq!(value["volume_label"], "dry");
        assert_eq!(value["efficiency"], 0.75);
        assert_eq!(value["cluster"], 2);
        assert_eq!(value["hmm_state"], 1);
    }

    #[test]
    fn test_absent_hmm_state_is_omitted() {
        let value = serde_json::to_value(snapshot(None)).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("hmm_state"));
        assert_eq!(object.len(), 8);
    }

    #[test]
    fn test_rejects_invalid_codes() {
        let json = r#"{"volatility": 5, "volatility_label": "?", "trend": 0, "trend_label": "ranging",
            "volume": 1, "volume_label": "normal", "efficiency": 0.5, "cluster": 0}"#;
        assert!(serde_json::from_str::<RegimeSnapshot>(json).is_err());

        let parsed: RegimeSnapshot =
            serde_json::from_str(&serde_json::to_string(&snapshot(None)).unwrap()).unwrap();
        assert_eq!(parsed, snapshot(None));
    }
}
