use serde::{Deserialize, Serialize};

use crate::error::{WavemarkError, WavemarkResult};

/// Free-text fields describing the current image. Reset on every navigation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub location: String,
    pub waveform_type: String,
    pub protocol: String,
    pub co_present: bool,
}

impl Metadata {
    /// Location and waveform type must be filled before anything is exported.
    pub fn validate(&self) -> WavemarkResult<()> {
        if self.location.trim().is_empty() {
            return Err(WavemarkError::MissingMetadata("Location"));
        }
        if self.waveform_type.trim().is_empty() {
            return Err(WavemarkError::MissingMetadata("Type"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_location_and_type() {
        let mut meta = Metadata::default();
        assert!(matches!(meta.validate(), Err(WavemarkError::MissingMetadata("Location"))));
        meta.location = "ICU bed 4".into();
        meta.waveform_type = "   ".into();
        assert!(matches!(meta.validate(), Err(WavemarkError::MissingMetadata("Type"))));
        meta.waveform_type = "ECG".into();
        assert!(meta.validate().is_ok());
    }
}
