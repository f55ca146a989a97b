//! Magnitude spectra of the derived leads, mostly for eyeballing mains
//! pickup before and after the notch stage.

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::error::SystolicError;
use crate::leads::{Lead, WaveformSet, LEAD_COUNT};

pub const DEFAULT_FFT_SIZE: usize = 1024;

/// One-sided magnitude spectrum per lead, normalized by the transform size.
#[derive(Clone, Debug)]
pub struct MagnitudeSpectrum {
    sample_rate_hz: f64,
    frequencies_hz: Vec<f64>,
    magnitudes: Vec<Vec<f64>>,
}

impl MagnitudeSpectrum {
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// Bin centers in Hz, DC through just under Nyquist.
    pub fn frequencies_hz(&self) -> &[f64] {
        &self.frequencies_hz
    }

    pub fn magnitudes(&self, lead: Lead) -> &[f64] {
        &self.magnitudes[lead.index()]
    }

    /// Frequency of the strongest non-DC bin, if any bins beyond DC exist.
    pub fn peak_frequency_hz(&self, lead: Lead) -> Option<f64> {
        self.magnitudes[lead.index()]
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| self.frequencies_hz[bin])
    }
}

/// Plans and runs forward FFTs over every lead of a waveform set.
///
/// Leads longer than the transform size are truncated, shorter ones are
/// zero-padded, so spectra from different runs share a frequency axis.
#[derive(Clone, Copy, Debug)]
pub struct SpectrumBuilder {
    fft_size: usize,
}

impl Default for SpectrumBuilder {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}

impl SpectrumBuilder {
    pub fn with_size(fft_size: usize) -> Result<Self, SystolicError> {
        if fft_size == 0 {
            return Err(SystolicError::InvalidConfig(
                "fft size must be nonzero".into(),
            ));
        }
        Ok(Self { fft_size })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn compute(&self, set: &WaveformSet) -> MagnitudeSpectrum {
        let size = self.fft_size;
        let bins = size / 2;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        let mut magnitudes = Vec::with_capacity(LEAD_COUNT);
        let mut buffer = vec![Complex64::new(0.0, 0.0); size];
        for lead in Lead::ALL {
            let samples = set.lead_slice(lead);
            for (slot, value) in buffer.iter_mut().enumerate() {
                *value = Complex64::new(samples.get(slot).copied().unwrap_or(0.0), 0.0);
            }
            fft.process(&mut buffer);
            magnitudes.push(
                buffer
                    .iter()
                    .take(bins)
                    .map(|bin| bin.norm() / size as f64)
                    .collect(),
            );
        }

        let frequencies_hz = (0..bins)
            .map(|bin| bin as f64 * set.sample_rate_hz() / size as f64)
            .collect();
        MagnitudeSpectrum {
            sample_rate_hz: set.sample_rate_hz(),
            frequencies_hz,
            magnitudes,
        }
    }
}
