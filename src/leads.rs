//! Six-lead waveform assembly from a raw three-lead run.
//!
//! The front end measures leads I, II and III directly; the augmented limb
//! leads are derived from I and II (Goldberger). Baselines are removed twice:
//! once per measured lead before derivation, and once per augmented lead
//! afterwards, since the derivation arithmetic reintroduces a DC offset.

use ndarray::{Array2, ArrayView1};

use crate::acquire::RawRun;
use crate::error::SystolicError;

pub const MEASURED_LEAD_COUNT: usize = 3;
pub const LEAD_COUNT: usize = 6;
pub const MILLIVOLTS_PER_VOLT: f64 = 1_000.0;

/// One channel of the six-lead set, in storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lead {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
}

impl Lead {
    pub const ALL: [Lead; LEAD_COUNT] = [
        Lead::I,
        Lead::II,
        Lead::III,
        Lead::AVR,
        Lead::AVL,
        Lead::AVF,
    ];

    pub fn index(self) -> usize {
        match self {
            Lead::I => 0,
            Lead::II => 1,
            Lead::III => 2,
            Lead::AVR => 3,
            Lead::AVL => 4,
            Lead::AVF => 5,
        }
    }

    /// Clinical display label, e.g. `"Lead II"` or `"aVL"`.
    pub fn label(self) -> &'static str {
        match self {
            Lead::I => "Lead I",
            Lead::II => "Lead II",
            Lead::III => "Lead III",
            Lead::AVR => "aVR",
            Lead::AVL => "aVL",
            Lead::AVF => "aVF",
        }
    }
}

/// Goldberger derivation of the augmented limb leads from leads I and II.
///
/// Normative sign convention: `aVR = -(I + II) / 2`, `aVL = (I - II) / 2`,
/// `aVF = (II - I) / 2`. Under this convention `aVL == -aVF` pointwise.
pub fn augmented_from_pair(lead_i: f64, lead_ii: f64) -> (f64, f64, f64) {
    let avr = -(lead_i + lead_ii) / 2.0;
    let avl = (lead_i - lead_ii) / 2.0;
    let avf = (lead_ii - lead_i) / 2.0;
    (avr, avl, avf)
}

/// Six equal-length leads in millivolts sharing one measured time base.
/// Immutable once the pipeline hands it out.
#[derive(Clone, Debug)]
pub struct WaveformSet {
    // Standard layout, so row slices below are contiguous.
    samples: Array2<f64>,
    sample_rate_hz: f64,
}

impl WaveformSet {
    /// Wraps a 6 x N sample matrix (millivolts) and its measured rate.
    pub fn from_samples(samples: Array2<f64>, sample_rate_hz: f64) -> Result<Self, SystolicError> {
        if samples.nrows() != LEAD_COUNT {
            return Err(SystolicError::LeadMismatch {
                expected: LEAD_COUNT,
                actual: samples.nrows(),
            });
        }
        let samples = if samples.is_standard_layout() {
            samples
        } else {
            samples.as_standard_layout().into_owned()
        };
        Ok(Self {
            samples,
            sample_rate_hz,
        })
    }

    /// Samples per lead.
    pub fn len(&self) -> usize {
        self.samples.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Measured rate stamped at acquisition time.
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate_hz
    }

    pub fn samples(&self) -> &Array2<f64> {
        &self.samples
    }

    pub fn lead(&self, lead: Lead) -> ArrayView1<'_, f64> {
        self.samples.row(lead.index())
    }

    pub fn lead_slice(&self, lead: Lead) -> &[f64] {
        self.samples
            .row(lead.index())
            .to_slice()
            .expect("standard-layout rows are contiguous")
    }

    pub(crate) fn lead_slice_mut(&mut self, lead: Lead) -> &mut [f64] {
        self.samples
            .row_mut(lead.index())
            .into_slice()
            .expect("standard-layout rows are contiguous")
    }
}

/// Builds the six-lead set from a raw run: baseline removal and millivolt
/// scaling on the measured leads, augmented derivation, then the second
/// baseline pass over the derived leads.
pub fn derive_leads(run: &RawRun) -> WaveformSet {
    let count = run.leads.ncols();
    let mut samples = Array2::<f64>::zeros((LEAD_COUNT, count));

    for row in 0..MEASURED_LEAD_COUNT {
        let source = run.leads.row(row);
        let baseline = source.mean().unwrap_or(0.0);
        for (col, &volts) in source.iter().enumerate() {
            samples[[row, col]] = (volts - baseline) * MILLIVOLTS_PER_VOLT;
        }
    }

    for col in 0..count {
        let (avr, avl, avf) = augmented_from_pair(samples[[0, col]], samples[[1, col]]);
        samples[[Lead::AVR.index(), col]] = avr;
        samples[[Lead::AVL.index(), col]] = avl;
        samples[[Lead::AVF.index(), col]] = avf;
    }

    for row in MEASURED_LEAD_COUNT..LEAD_COUNT {
        let baseline = samples.row(row).mean().unwrap_or(0.0);
        for col in 0..count {
            samples[[row, col]] -= baseline;
        }
    }

    WaveformSet {
        samples,
        sample_rate_hz: run.effective_rate_hz,
    }
}
