//! Second-order IIR sections for the mains notch and the QRS emphasis band.
//!
//! All stages are designed against the measured sampling rate of the run
//! they filter. Whole-buffer passes come in two flavors: a causal forward
//! pass, and a forward-backward pass whose group delay cancels so peak
//! timing survives for beat detection.

use std::f64::consts::PI;

use crate::config::MainsFrequency;
use crate::error::SystolicError;
use crate::leads::{Lead, WaveformSet};

/// Quality factor of the mains interference notch.
pub const MAINS_NOTCH_Q: f64 = 30.0;

/// Filter stages available to the pipeline.
#[derive(Clone, Copy, Debug)]
pub enum FilterKind {
    /// Narrow band-reject centered on `freq_hz`.
    Notch { freq_hz: f64, q: f64 },
    Highpass { cutoff_hz: f64, q: f64 },
    Lowpass { cutoff_hz: f64, q: f64 },
    /// Single-section emphasis of the band between `low_hz` and `high_hz`.
    Bandpass { low_hz: f64, high_hz: f64 },
}

#[derive(Clone, Copy, Debug)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

#[derive(Clone, Copy, Debug)]
struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    fn reset(&mut self) {
        self.state = BiquadState::default();
    }

    fn process(&mut self, input: f64) -> f64 {
        // Transposed direct form II
        let y = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * y + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * y;
        y
    }
}

/// A cascade of biquad sections designed for one sampling rate.
#[derive(Debug, Clone)]
pub struct FilterChain {
    sections: Vec<BiquadFilter>,
}

impl FilterChain {
    /// Designs one section per requested stage. A stage whose critical
    /// frequency does not sit strictly between zero and Nyquist is an error,
    /// not something to clamp.
    pub fn design(sample_rate_hz: f64, kinds: &[FilterKind]) -> Result<Self, SystolicError> {
        let mut sections = Vec::with_capacity(kinds.len());
        for kind in kinds {
            sections.push(BiquadFilter::new(design_section(sample_rate_hz, *kind)?));
        }
        Ok(Self { sections })
    }

    /// Streams one sample through every section in order.
    pub fn process_sample(&mut self, mut value: f64) -> f64 {
        for section in &mut self.sections {
            value = section.process(value);
        }
        value
    }

    /// Causal in-place pass over `data`, starting from rest.
    pub fn apply_forward(&mut self, data: &mut [f64]) {
        self.reset();
        for value in data.iter_mut() {
            *value = self.process_sample(*value);
        }
    }

    /// Zero-phase in-place pass: forward, then backward over the forward
    /// output.
    pub fn apply_zero_phase(&mut self, data: &mut [f64]) {
        self.apply_forward(data);
        data.reverse();
        self.apply_forward(data);
        data.reverse();
    }

    fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

/// Applies the zero-phase mains notch to all six leads in place, designed
/// against the set's measured sampling rate.
pub fn notch_mains(set: &mut WaveformSet, mains: MainsFrequency) -> Result<(), SystolicError> {
    let mut chain = FilterChain::design(
        set.sample_rate_hz(),
        &[FilterKind::Notch {
            freq_hz: mains.hz(),
            q: MAINS_NOTCH_Q,
        }],
    )?;
    for lead in Lead::ALL {
        chain.apply_zero_phase(set.lead_slice_mut(lead));
    }
    Ok(())
}

fn design_section(sample_rate_hz: f64, kind: FilterKind) -> Result<BiquadCoeffs, SystolicError> {
    let nyquist = sample_rate_hz * 0.5;
    let checked = |stage: &'static str, frequency_hz: f64| {
        if frequency_hz > 0.0 && frequency_hz < nyquist {
            Ok(frequency_hz)
        } else {
            Err(SystolicError::FilterDesign {
                stage,
                frequency_hz,
                sample_rate_hz,
            })
        }
    };
    match kind {
        FilterKind::Notch { freq_hz, q } => Ok(notch(checked("notch", freq_hz)?, sample_rate_hz, q)),
        FilterKind::Highpass { cutoff_hz, q } => Ok(highpass(
            checked("high-pass", cutoff_hz)?,
            sample_rate_hz,
            q,
        )),
        FilterKind::Lowpass { cutoff_hz, q } => {
            Ok(lowpass(checked("low-pass", cutoff_hz)?, sample_rate_hz, q))
        }
        FilterKind::Bandpass { low_hz, high_hz } => {
            let low = checked("band-pass", low_hz)?;
            let high = checked("band-pass", high_hz)?;
            if low >= high {
                return Err(SystolicError::FilterDesign {
                    stage: "band-pass",
                    frequency_hz: high_hz,
                    sample_rate_hz,
                });
            }
            let center = (low * high).sqrt();
            let q = center / (high - low);
            Ok(bandpass(center, sample_rate_hz, q))
        }
    }
}

fn lowpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = (w0 / 2.0).sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 - cos_w0) * 0.5;
    let b1 = 1.0 - cos_w0;
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

fn highpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = (w0 / 2.0).sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 + cos_w0) * 0.5;
    let b1 = -(1.0 + cos_w0);
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

fn bandpass(center_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * center_hz / sample_rate_hz;
    let alpha = (w0 / 2.0).sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let sin_w0 = w0.sin();
    let b0 = sin_w0 / 2.0 / q;
    let b1 = 0.0;
    let b2 = -b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

fn notch(center_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * center_hz / sample_rate_hz;
    let alpha = (w0 / 2.0).sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = 1.0;
    let b1 = -2.0 * cos_w0;
    let b2 = 1.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoeffs {
    let a0_inv = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * a0_inv,
        b1: b1 * a0_inv,
        b2: b2 * a0_inv,
        a1: a1 * a0_inv,
        a2: a2 * a0_inv,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|v| v * v).sum::<f64>() / data.len() as f64).sqrt()
    }

    fn sine(freq_hz: f64, rate_hz: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / rate_hz).sin())
            .collect()
    }

    #[test]
    fn notch_nulls_the_center_tone() {
        let rate = 500.0;
        let mut data = sine(50.0, rate, 4000);
        let before = rms(&data[1000..3000]);
        let mut chain = FilterChain::design(
            rate,
            &[FilterKind::Notch {
                freq_hz: 50.0,
                q: MAINS_NOTCH_Q,
            }],
        )
        .unwrap();
        chain.apply_zero_phase(&mut data);
        let after = rms(&data[1000..3000]);
        assert!(after * 10.0 < before, "before {before}, after {after}");
    }

    #[test]
    fn notch_spares_a_tone_one_octave_away() {
        let rate = 500.0;
        let mut data = sine(25.0, rate, 4000);
        let before = rms(&data[1000..3000]);
        let mut chain = FilterChain::design(
            rate,
            &[FilterKind::Notch {
                freq_hz: 50.0,
                q: MAINS_NOTCH_Q,
            }],
        )
        .unwrap();
        chain.apply_zero_phase(&mut data);
        let after = rms(&data[1000..3000]);
        assert!(after > 0.9 * before, "before {before}, after {after}");
    }

    #[test]
    fn design_rejects_frequencies_at_or_beyond_nyquist() {
        let err = FilterChain::design(
            80.0,
            &[FilterKind::Notch {
                freq_hz: 50.0,
                q: MAINS_NOTCH_Q,
            }],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SystolicError::FilterDesign {
                stage: "notch",
                ..
            }
        ));
        assert!(FilterChain::design(
            0.0,
            &[FilterKind::Lowpass {
                cutoff_hz: 10.0,
                q: FRAC_1_SQRT_2,
            }],
        )
        .is_err());
    }

    #[test]
    fn zero_phase_pass_keeps_a_symmetric_peak_centered() {
        let mut data: Vec<f64> = (0..1000)
            .map(|i| {
                let x = (i as f64 - 500.0) / 10.0;
                (-0.5 * x * x).exp()
            })
            .collect();
        let mut chain = FilterChain::design(
            500.0,
            &[FilterKind::Lowpass {
                cutoff_hz: 20.0,
                q: FRAC_1_SQRT_2,
            }],
        )
        .unwrap();
        chain.apply_zero_phase(&mut data);
        let peak = data
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak as i64 - 500).abs() <= 1, "peak drifted to {peak}");
    }

    #[test]
    fn bandpass_emphasizes_in_band_energy() {
        let rate = 200.0;
        let kinds = [FilterKind::Bandpass {
            low_hz: 5.0,
            high_hz: 15.0,
        }];
        let mut in_band = sine(10.0, rate, 2000);
        let mut out_band = sine(40.0, rate, 2000);
        FilterChain::design(rate, &kinds)
            .unwrap()
            .apply_forward(&mut in_band);
        FilterChain::design(rate, &kinds)
            .unwrap()
            .apply_forward(&mut out_band);
        assert!(rms(&in_band[500..]) > 4.0 * rms(&out_band[500..]));
    }

    #[test]
    fn bandpass_rejects_inverted_edges() {
        let result = FilterChain::design(
            200.0,
            &[FilterKind::Bandpass {
                low_hz: 15.0,
                high_hz: 5.0,
            }],
        );
        assert!(result.is_err());
    }

    #[test]
    fn notch_mains_covers_all_six_leads() {
        let rate = 500.0;
        let count = 4000;
        let mut samples = Array2::<f64>::zeros((6, count));
        for row in 0..6 {
            let amplitude = 0.5 + row as f64 * 0.25;
            for col in 0..count {
                samples[[row, col]] = amplitude * (2.0 * PI * 50.0 * col as f64 / rate).sin();
            }
        }
        let mut set = WaveformSet::from_samples(samples, rate).unwrap();
        notch_mains(&mut set, MainsFrequency::Hz50).unwrap();
        for lead in Lead::ALL {
            let after = rms(&set.lead_slice(lead)[1000..3000]);
            assert!(after < 0.05, "{} retained rms {after}", lead.label());
        }
    }

    #[test]
    fn notch_mains_fails_cleanly_below_nyquist_headroom() {
        let samples = Array2::<f64>::zeros((6, 100));
        let mut set = WaveformSet::from_samples(samples, 60.0).unwrap();
        let err = notch_mains(&mut set, MainsFrequency::Hz50).unwrap_err();
        assert!(matches!(err, SystolicError::FilterDesign { .. }));
    }
}
