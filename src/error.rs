use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystolicError {
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("channel i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no decimation profile for a {requested} Hz bandwidth")]
    UnknownBandwidth { requested: u32 },
    #[error("invalid acquisition config: {0}")]
    InvalidConfig(String),
    #[error("lead count mismatch: expected {expected}, got {actual}")]
    LeadMismatch { expected: usize, actual: usize },
    #[error("no fresh bytes from the front end within {0:?}")]
    Stalled(Duration),
    #[error("acquisition cancelled")]
    Cancelled,
    #[error("cannot place a {stage} at {frequency_hz} Hz against a {sample_rate_hz} Hz sampling rate")]
    FilterDesign {
        stage: &'static str,
        frequency_hz: f64,
        sample_rate_hz: f64,
    },
    #[error("waveform too short for analysis ({len} samples)")]
    WaveformTooShort { len: usize },
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for SystolicError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        SystolicError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for SystolicError {
    fn from(value: image::ImageError) -> Self {
        SystolicError::Plot(value.to_string())
    }
}
