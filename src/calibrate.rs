//! Raw ADC code to input-referred voltage conversion.

use serde::{Deserialize, Serialize};

/// Electrical scaling that maps a signed full-scale fraction onto volts at
/// the electrodes. The defaults match the reference front end hardware: a
/// gain factor of 4.8 over a reference divisor of 3.5.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationScale {
    pub gain: f64,
    pub reference_divisor: f64,
}

impl Default for CalibrationScale {
    fn default() -> Self {
        Self {
            gain: 4.8,
            reference_divisor: 3.5,
        }
    }
}

/// One calibrated field, tagged with whether the raw text actually parsed.
///
/// The first line after a mode change is frequently truncated mid-number.
/// An unparseable field is substituted with zero volts instead of failing
/// the run, and the tag lets callers count how often that happened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Calibrated {
    Measured(f64),
    Fallback,
}

impl Calibrated {
    pub fn volts(self) -> f64 {
        match self {
            Calibrated::Measured(volts) => volts,
            Calibrated::Fallback => 0.0,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, Calibrated::Fallback)
    }
}

/// Converts one raw ADC field to volts: the code is normalized to a signed
/// fraction of full scale in [-0.5, 0.5), then rescaled through the
/// electrical calibration.
pub fn voltage(field: &str, full_scale_code: u32, scale: CalibrationScale) -> Calibrated {
    match field.trim().parse::<f64>() {
        Ok(code) => {
            let fraction = code / f64::from(full_scale_code) - 0.5;
            Calibrated::Measured(fraction * scale.gain / scale.reference_divisor)
        }
        Err(_) => Calibrated::Fallback,
    }
}
