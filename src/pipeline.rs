//! The full capture path: acquire raw codes, derive the six leads, notch
//! out mains interference.

use log::info;

use crate::acquire::Acquisition;
use crate::channel::FrontEndChannel;
use crate::config::MainsFrequency;
use crate::error::SystolicError;
use crate::filter::notch_mains;
use crate::leads::{derive_leads, WaveformSet};

/// Runs a configured acquisition through lead derivation and mains removal.
///
/// The notch is designed against the run's measured sample rate, not the
/// nominal output data rate, so clock drift on the front end does not move
/// the stopband off the interference.
pub fn capture<C: FrontEndChannel>(
    acquisition: Acquisition<'_, C>,
    mains: MainsFrequency,
) -> Result<WaveformSet, SystolicError> {
    let run = acquisition.run()?;
    let mut set = derive_leads(&run);
    notch_mains(&mut set, mains)?;
    info!(
        "captured {} samples per lead, {:.1} Hz measured",
        set.len(),
        set.sample_rate_hz()
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{AcquireOptions, Acquisition};
    use crate::channel::{command_frame, registers, ScriptedChannel, START_CONVERSION, STOP_CONVERSION};
    use crate::config::AcquisitionConfig;
    use crate::heart_rate::estimate_heart_rate;
    use crate::leads::Lead;
    use std::time::Duration;

    const MID_SCALE_LINE: &str = "8000000,8000000,8000000";

    fn test_config(sample_count: usize) -> AcquisitionConfig {
        AcquisitionConfig {
            sample_count,
            full_scale_code: 0x0080_0000,
            output_data_rate_hz: 400,
            bandwidth_hz: 160,
        }
    }

    fn fast_options() -> AcquireOptions {
        AcquireOptions {
            settle: Duration::ZERO,
            stall_timeout: Duration::from_millis(500),
            ..AcquireOptions::default()
        }
    }

    #[test]
    fn constant_codes_capture_as_six_flat_leads() {
        let mut channel = ScriptedChannel::new();
        for _ in 0..500 {
            channel.push_line(MID_SCALE_LINE);
        }
        let acquisition = Acquisition::new(&mut channel, test_config(500))
            .with_options(fast_options());
        let set = capture(acquisition, MainsFrequency::Hz50).unwrap();

        assert_eq!(set.len(), 500);
        assert!(set.sample_rate_hz() > 0.0);
        for lead in Lead::ALL {
            let worst = set
                .lead_slice(lead)
                .iter()
                .fold(0.0f64, |acc, &v| acc.max(v.abs()));
            assert!(worst < 1e-9, "{} peaked at {worst}", lead.label());
        }
        let written = channel.written();
        let start = command_frame(registers::CONFIG, START_CONVERSION).into_bytes();
        let stop = command_frame(registers::CONFIG, STOP_CONVERSION).into_bytes();
        assert!(written.contains(&start));
        assert!(written.contains(&stop));
    }

    #[test]
    fn malformed_lines_leave_a_gap_but_no_error() {
        let mut channel = ScriptedChannel::new();
        channel.push_line(MID_SCALE_LINE);
        channel.push_line(MID_SCALE_LINE);
        // Digit-bearing but short one field, so it consumes a slot instead of
        // being skipped as banner noise.
        channel.push_line("12,34");
        channel.push_line(MID_SCALE_LINE);
        channel.push_line(MID_SCALE_LINE);
        let acquisition = Acquisition::new(&mut channel, test_config(5))
            .with_options(fast_options());
        let set = capture(acquisition, MainsFrequency::Hz50).unwrap();

        assert_eq!(set.len(), 5);
        // The dropped slot stays at zero volts, so after baseline removal it
        // sits below the surrounding constant samples.
        let lead_i = set.lead_slice(Lead::I);
        assert!(lead_i[2] < lead_i[0]);
    }

    #[test]
    fn flat_capture_estimates_zero_heart_rate() {
        let mut channel = ScriptedChannel::new();
        for _ in 0..500 {
            channel.push_line(MID_SCALE_LINE);
        }
        let acquisition = Acquisition::new(&mut channel, test_config(500))
            .with_options(fast_options());
        let set = capture(acquisition, MainsFrequency::Hz60).unwrap();
        let estimate = estimate_heart_rate(&set).unwrap();
        assert_eq!(estimate.beats, 0);
        assert_eq!(estimate.bpm, 0);
    }
}
