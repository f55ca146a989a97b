//! Beat detection on Lead II, after Pan and Tompkins: band-pass, derivative,
//! squaring, moving-window averaging, then a threshold scan.
//!
//! The detector is deliberately coarse. It uses one fixed absolute threshold
//! and a one-block refractory skip, trades accuracy for predictability, and
//! makes no attempt to adapt to the subject.

use log::debug;

use crate::error::SystolicError;
use crate::filter::{FilterChain, FilterKind};
use crate::leads::{Lead, WaveformSet};

/// Tuning for the QRS detector.
#[derive(Clone, Copy, Debug)]
pub struct HeartRateOptions {
    /// Lower edge of the QRS emphasis band.
    pub band_low_hz: f64,
    /// Upper edge of the QRS emphasis band.
    pub band_high_hz: f64,
    /// Moving-average window over the squared slope signal.
    pub smoothing_window_secs: f64,
    /// Level one smoothed block must exceed to count as a beat.
    pub beat_threshold: f64,
}

impl Default for HeartRateOptions {
    fn default() -> Self {
        Self {
            band_low_hz: 5.0,
            band_high_hz: 15.0,
            smoothing_window_secs: 0.15,
            beat_threshold: 2e-3,
        }
    }
}

/// A completed estimate over one waveform set. Stale as soon as a new
/// acquisition replaces the set it was computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartRateEstimate {
    pub bpm: u32,
    pub beats: usize,
}

impl std::fmt::Display for HeartRateEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bpm ({} beats)", self.bpm, self.beats)
    }
}

/// Estimates heart rate from Lead II with the default tuning.
pub fn estimate_heart_rate(set: &WaveformSet) -> Result<HeartRateEstimate, SystolicError> {
    estimate_heart_rate_with(set, &HeartRateOptions::default())
}

pub fn estimate_heart_rate_with(
    set: &WaveformSet,
    options: &HeartRateOptions,
) -> Result<HeartRateEstimate, SystolicError> {
    let lead = set.lead_slice(Lead::II);
    if lead.len() < 2 {
        return Err(SystolicError::WaveformTooShort { len: lead.len() });
    }
    let rate_hz = set.sample_rate_hz();

    let mut emphasized = lead.to_vec();
    let mut chain = FilterChain::design(
        rate_hz,
        &[FilterKind::Bandpass {
            low_hz: options.band_low_hz,
            high_hz: options.band_high_hz,
        }],
    )?;
    chain.apply_forward(&mut emphasized);

    let mut slope = gradient(&emphasized);
    for value in &mut slope {
        *value *= *value;
    }

    let window = ((options.smoothing_window_secs * rate_hz) as usize).max(1);
    let smoothed = block_means(&slope, window);
    let beats = count_beats(&smoothed, options.beat_threshold);

    let duration_secs = lead.len() as f64 / rate_hz;
    let bpm = (beats as f64 / duration_secs * 60.0).round() as u32;
    debug!(
        "qrs scan: {} blocks of {window} samples, {beats} beats over {duration_secs:.2} s",
        smoothed.len()
    );
    Ok(HeartRateEstimate { bpm, beats })
}

/// Central-difference slope with one-sided differences at the ends, in
/// per-sample units. Callers guarantee at least two samples.
fn gradient(data: &[f64]) -> Vec<f64> {
    let count = data.len();
    let mut out = vec![0.0; count];
    if count < 2 {
        return out;
    }
    out[0] = data[1] - data[0];
    out[count - 1] = data[count - 1] - data[count - 2];
    for i in 1..count - 1 {
        out[i] = (data[i + 1] - data[i - 1]) / 2.0;
    }
    out
}

/// Means of consecutive `window`-sized blocks; the tail block averages only
/// the samples actually present.
fn block_means(data: &[f64], window: usize) -> Vec<f64> {
    data.chunks(window)
        .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
        .collect()
}

/// One beat per above-threshold local maximum, skipping the block right
/// after a detection. The final block has no successor and is never scanned.
fn count_beats(smoothed: &[f64], threshold: f64) -> usize {
    let mut beats = 0;
    let mut i = 0;
    while i + 1 < smoothed.len() {
        let value = smoothed[i];
        if value > 0.0 && smoothed[i + 1] <= value && value > threshold {
            beats += 1;
            i += 2;
            continue;
        }
        i += 1;
    }
    beats
}
