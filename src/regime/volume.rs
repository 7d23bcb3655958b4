use crate::config::VolumeSettings;
use crate::error::{RegimeError, Result};
use crate::indicators::relative_volume;
use crate::types::{IndicatorFrame, LabelSeries, VolumeRegime};

use super::{require_finite, require_rows, RegimeClassifier};

#[derive(Debug, Clone, Default)]
pub struct VolumeClassifier {
    settings: VolumeSettings,
}

impl VolumeClassifier {
    pub fn new(settings: VolumeSettings) -> Self {
        Self { settings }
    }

    /// `dry` strictly below `dry_edge`, `surge` strictly above `surge_edge`.
    pub fn bucket(&self, relative: f64) -> VolumeRegime {
        if relative < self.settings.dry_edge {
            VolumeRegime::Dry
        } else if relative > self.settings.surge_edge {
            VolumeRegime::Surge
        } else {
            VolumeRegime::Normal
        }
    }
}

impl RegimeClassifier for VolumeClassifier {
    type Label = VolumeRegime;

    fn name(&self) -> &'static str {
        "volume"
    }

    fn fallback_label(&self) -> VolumeRegime {
        VolumeRegime::Normal
    }

    fn classify(&self, frame: &IndicatorFrame) -> Result<LabelSeries<VolumeRegime>> {
        require_rows(frame)?;
        if self.settings.window == 0 {
            return Err(RegimeError::InvalidWindow("volume window 0".to_string()));
        }

        let volumes = frame.series().volumes();
        require_finite("volume", &volumes)?;

        Ok(relative_volume(&volumes, self.settings.window)
            .into_iter()
            .map(|relative| relative.map_or(VolumeRegime::Normal, |r| self.bucket(r)))
            .collect())
    }
}
