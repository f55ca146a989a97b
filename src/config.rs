use serde::{Deserialize, Serialize};

use crate::error::SystolicError;
use crate::lookup::BandwidthProfile;

/// Mains frequency targeted by the interference notch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainsFrequency {
    Hz50,
    Hz60,
}

impl MainsFrequency {
    pub fn hz(self) -> f64 {
        match self {
            MainsFrequency::Hz50 => 50.0,
            MainsFrequency::Hz60 => 60.0,
        }
    }
}

impl Default for MainsFrequency {
    fn default() -> Self {
        MainsFrequency::Hz50
    }
}

/// Sizing and scaling parameters for one acquisition run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Samples to collect per lead.
    pub sample_count: usize,
    /// Positive full-scale ADC code used to normalize raw readings.
    pub full_scale_code: u32,
    /// Nominal output data rate; used to size runs, never as the time base.
    pub output_data_rate_hz: u32,
    /// Analog bandwidth label carried along for display.
    pub bandwidth_hz: u32,
}

impl AcquisitionConfig {
    /// Sizes a run of roughly `seconds` against a decimation profile:
    /// `sample_count = seconds * output_data_rate`, rounded.
    pub fn for_duration(profile: &BandwidthProfile, seconds: f64) -> Self {
        Self {
            sample_count: (seconds * f64::from(profile.output_data_rate_hz)).round() as usize,
            full_scale_code: profile.full_scale_code,
            output_data_rate_hz: profile.output_data_rate_hz,
            bandwidth_hz: profile.bandwidth_hz,
        }
    }

    pub fn validate(&self) -> Result<(), SystolicError> {
        if self.sample_count == 0 {
            return Err(SystolicError::InvalidConfig(
                "sample count must be at least 1".into(),
            ));
        }
        if self.full_scale_code == 0 {
            return Err(SystolicError::InvalidConfig(
                "full-scale code must be non-zero".into(),
            ));
        }
        if self.output_data_rate_hz == 0 {
            return Err(SystolicError::InvalidConfig(
                "output data rate must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Run length implied by the nominal data rate. The measured rate of a
    /// finished run is stamped on its waveform set instead.
    pub fn nominal_duration_secs(&self) -> f64 {
        self.sample_count as f64 / f64::from(self.output_data_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::resolve;

    #[test]
    fn duration_sizing_rounds_to_nearest_sample() {
        let profile = resolve(160).unwrap();
        let config = AcquisitionConfig::for_duration(profile, 5.0);
        assert_eq!(config.sample_count, 2000);
        assert_eq!(config.full_scale_code, profile.full_scale_code);

        let profile = resolve(213).unwrap();
        let config = AcquisitionConfig::for_duration(profile, 1.5);
        assert_eq!(config.sample_count, 800); // 533 * 1.5 = 799.5
    }

    #[test]
    fn validate_rejects_empty_run() {
        let profile = resolve(160).unwrap();
        let mut config = AcquisitionConfig::for_duration(profile, 0.0);
        assert!(matches!(
            config.validate(),
            Err(SystolicError::InvalidConfig(_))
        ));
        config.sample_count = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_full_scale() {
        let config = AcquisitionConfig {
            sample_count: 500,
            full_scale_code: 0,
            output_data_rate_hz: 400,
            bandwidth_hz: 160,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nominal_duration_matches_sizing() {
        let profile = resolve(320).unwrap();
        let config = AcquisitionConfig::for_duration(profile, 4.0);
        assert!((config.nominal_duration_secs() - 4.0).abs() < 1e-9);
    }
}
