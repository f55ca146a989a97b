//! Decimation profiles for the analog front end.
//!
//! The front end's sigma-delta modulator runs from a 204.8 kHz clock. The R2
//! and R3 decimation stages divide that down to the output data rate
//! (`204800 / (4 * R2 * R3)`), and the usable analog bandwidth is 0.4x the
//! output data rate. Full-scale codes and noise floors are specimen values
//! from the converter datasheet for each decimation pair.

use serde::{Deserialize, Serialize};

use crate::error::SystolicError;

/// One row of the decimation table: the register values pushed to the device
/// together with the sampling behavior they produce.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandwidthProfile {
    /// Usable analog bandwidth in Hz; the key callers select by.
    pub bandwidth_hz: u32,
    /// Samples per second per lead the device emits at this setting.
    pub output_data_rate_hz: u32,
    /// Positive full-scale ADC code at this decimation.
    pub full_scale_code: u32,
    /// One-hot encoded R2 decimation register value.
    pub r2: u8,
    /// One-hot encoded R3 decimation register value, shared by all three channels.
    pub r3: u8,
    /// Input-referred noise floor in microvolts.
    pub noise_uv: f64,
}

/// The supported decimation ladder, slowest first.
pub const PROFILES: &[BandwidthProfile] = &[
    BandwidthProfile {
        bandwidth_hz: 20,
        output_data_rate_hz: 50,
        full_scale_code: 0x0080_0000,
        r2: 0x08,
        r3: 0x80,
        noise_uv: 0.4,
    },
    BandwidthProfile {
        bandwidth_hz: 40,
        output_data_rate_hz: 100,
        full_scale_code: 0x0080_0000,
        r2: 0x08,
        r3: 0x40,
        noise_uv: 0.5,
    },
    BandwidthProfile {
        bandwidth_hz: 80,
        output_data_rate_hz: 200,
        full_scale_code: 0x0080_0000,
        r2: 0x08,
        r3: 0x20,
        noise_uv: 0.7,
    },
    BandwidthProfile {
        bandwidth_hz: 160,
        output_data_rate_hz: 400,
        full_scale_code: 0x0080_0000,
        r2: 0x08,
        r3: 0x10,
        noise_uv: 1.0,
    },
    BandwidthProfile {
        bandwidth_hz: 213,
        output_data_rate_hz: 533,
        full_scale_code: 0x00C0_0000,
        r2: 0x04,
        r3: 0x10,
        noise_uv: 1.3,
    },
    BandwidthProfile {
        bandwidth_hz: 256,
        output_data_rate_hz: 640,
        full_scale_code: 0x00A0_0000,
        r2: 0x02,
        r3: 0x10,
        noise_uv: 1.6,
    },
    BandwidthProfile {
        bandwidth_hz: 320,
        output_data_rate_hz: 800,
        full_scale_code: 0x0080_0000,
        r2: 0x01,
        r3: 0x10,
        noise_uv: 2.1,
    },
    BandwidthProfile {
        bandwidth_hz: 640,
        output_data_rate_hz: 1600,
        full_scale_code: 0x0080_0000,
        r2: 0x01,
        r3: 0x04,
        noise_uv: 3.5,
    },
];

/// Looks up the profile for a requested analog bandwidth. There is no
/// nearest-match fallback; an unknown bandwidth is an explicit failure.
pub fn resolve(bandwidth_hz: u32) -> Result<&'static BandwidthProfile, SystolicError> {
    PROFILES
        .iter()
        .find(|profile| profile.bandwidth_hz == bandwidth_hz)
        .ok_or(SystolicError::UnknownBandwidth {
            requested: bandwidth_hz,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_finds_known_bandwidth() {
        let profile = resolve(160).unwrap();
        assert_eq!(profile.output_data_rate_hz, 400);
        assert_eq!(profile.full_scale_code, 0x0080_0000);
        assert_eq!(profile.r2, 0x08);
        assert_eq!(profile.r3, 0x10);
    }

    #[test]
    fn resolve_rejects_unknown_bandwidth() {
        let err = resolve(999).unwrap_err();
        assert!(matches!(
            err,
            SystolicError::UnknownBandwidth { requested: 999 }
        ));
    }

    #[test]
    fn register_values_are_one_hot() {
        for profile in PROFILES {
            assert_eq!(profile.r2.count_ones(), 1, "r2 of {profile:?}");
            assert_eq!(profile.r3.count_ones(), 1, "r3 of {profile:?}");
        }
    }

    #[test]
    fn ladder_is_sorted_and_consistent() {
        for pair in PROFILES.windows(2) {
            assert!(pair[0].bandwidth_hz < pair[1].bandwidth_hz);
            assert!(pair[0].output_data_rate_hz < pair[1].output_data_rate_hz);
            assert!(pair[0].noise_uv < pair[1].noise_uv);
        }
        for profile in PROFILES {
            let expected_bw = 0.4 * f64::from(profile.output_data_rate_hz);
            assert!(
                (f64::from(profile.bandwidth_hz) - expected_bw).abs() <= 1.0,
                "bandwidth/rate mismatch in {profile:?}"
            );
        }
    }
}
