//! Controller and interpreter for a low-cost serial six-lead ECG front end.
//!
//! The crate drives an ADS1293-style analog front end over a serial line:
//! it uploads a decimation profile, starts conversion, decodes the comma
//! separated code stream, calibrates codes to volts, derives the six
//! standard limb leads, removes mains interference, and estimates heart
//! rate. A simulator stands in for the hardware when none is attached.

pub mod acquire;
pub mod calibrate;
pub mod channel;
pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod heart_rate;
pub mod leads;
pub mod lookup;
pub mod pipeline;
pub mod plot;
pub mod sim;
pub mod spectrum;

pub use acquire::{AcquireOptions, Acquisition, CancelToken, Phase, RawRun};
pub use calibrate::{Calibrated, CalibrationScale};
pub use channel::{FrontEndChannel, ScriptedChannel, SerialChannel};
pub use config::{AcquisitionConfig, MainsFrequency};
pub use error::SystolicError;
pub use filter::{notch_mains, FilterChain, FilterKind};
pub use frame::{FrameDecoder, FrameEvent, RawSample};
pub use heart_rate::{
    estimate_heart_rate, estimate_heart_rate_with, HeartRateEstimate, HeartRateOptions,
};
pub use leads::{derive_leads, Lead, WaveformSet};
pub use lookup::BandwidthProfile;
pub use pipeline::capture;
pub use sim::SimulatedFrontEnd;
pub use spectrum::{MagnitudeSpectrum, SpectrumBuilder};
