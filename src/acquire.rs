//! Fixed-count sample acquisition from the streaming front end.
//!
//! One run walks Idle -> Arming -> Collecting -> Draining -> Done. The
//! collection loop never blocks on the channel: it polls for available bytes,
//! reads whatever is ready, and advances one pre-sized buffer slot per
//! decoded record. Device timing drifts from nominal, so the wall-clock
//! measured rate is what gets stamped on the result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ndarray::Array2;

use crate::calibrate::{voltage, CalibrationScale};
use crate::channel::FrontEndChannel;
use crate::config::AcquisitionConfig;
use crate::error::SystolicError;
use crate::frame::{FrameDecoder, FrameEvent};
use crate::leads::MEASURED_LEAD_COUNT;

const READ_CHUNK: usize = 512;
const POLL_BACKOFF: Duration = Duration::from_micros(500);

/// Cooperative cancellation flag; clones share the underlying flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Run knobs that are not part of the sampling configuration.
#[derive(Clone, Copy, Debug)]
pub struct AcquireOptions {
    /// Wait between start-conversion and the first read; bytes buffered
    /// during the wait are discarded.
    pub settle: Duration,
    /// Longest tolerated gap without fresh bytes from the device.
    pub stall_timeout: Duration,
    /// Electrical calibration applied to every field.
    pub calibration: CalibrationScale,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            stall_timeout: Duration::from_secs(5),
            calibration: CalibrationScale::default(),
        }
    }
}

/// Phases of one acquisition run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Arming,
    Collecting,
    Draining,
    Done,
}

/// Raw outcome of one run: the three measured leads in volts plus timing
/// and bookkeeping counters.
#[derive(Clone, Debug)]
pub struct RawRun {
    /// 3 x N matrix of calibrated voltages in lead order I, II, III.
    pub leads: Array2<f64>,
    /// Measured samples per second over the whole run.
    pub effective_rate_hz: f64,
    /// Slots filled from well-formed records.
    pub accepted: usize,
    /// Slots consumed by malformed records, left at zero.
    pub dropped: usize,
    /// Individual fields that failed to parse and fell back to zero volts.
    pub fallback_fields: usize,
}

/// One in-flight acquisition run. Owns its buffer and counters for the
/// duration; the channel is borrowed exclusively until `run` returns.
pub struct Acquisition<'a, C: FrontEndChannel> {
    channel: &'a mut C,
    config: AcquisitionConfig,
    options: AcquireOptions,
    cancel: CancelToken,
    progress: Option<Box<dyn FnMut(usize, usize) + 'a>>,
    phase: Phase,
}

impl<'a, C: FrontEndChannel> Acquisition<'a, C> {
    pub fn new(channel: &'a mut C, config: AcquisitionConfig) -> Self {
        Self {
            channel,
            config,
            options: AcquireOptions::default(),
            cancel: CancelToken::new(),
            progress: None,
            phase: Phase::Idle,
        }
    }

    pub fn with_options(mut self, options: AcquireOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs an externally shared cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token for this run; cancel it from another thread to stop collecting.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Called once per filled buffer slot with `(filled, total)`.
    pub fn on_progress(mut self, callback: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the acquisition to completion and returns the raw three-lead
    /// buffer. Per-record decode failures never abort the run; stalls and
    /// cancellation do.
    pub fn run(mut self) -> Result<RawRun, SystolicError> {
        self.config.validate()?;
        let total = self.config.sample_count;
        let mut leads = Array2::<f64>::zeros((MEASURED_LEAD_COUNT, total));

        self.set_phase(Phase::Arming);
        if let Err(error) = self.channel.start_conversion() {
            warn!("start-conversion write failed: {error}");
        }
        thread::sleep(self.options.settle);
        if let Err(error) = self.channel.clear_input() {
            warn!("could not drain settle-period bytes: {error}");
        }

        self.set_phase(Phase::Collecting);
        let mut decoder = FrameDecoder::new();
        let mut read_buf = vec![0u8; READ_CHUNK];
        let mut slot = 0usize;
        let mut accepted = 0usize;
        let mut dropped = 0usize;
        let mut fallback_fields = 0usize;
        let started = Instant::now();
        let mut last_fresh = started;

        while slot < total {
            if self.cancel.is_cancelled() {
                self.halt_device();
                return Err(SystolicError::Cancelled);
            }

            match decoder.next_event() {
                Some(FrameEvent::Record(sample)) => {
                    for (row, field) in sample.fields.iter().enumerate() {
                        let calibrated =
                            voltage(field, self.config.full_scale_code, self.options.calibration);
                        if calibrated.is_fallback() {
                            fallback_fields += 1;
                        }
                        leads[[row, slot]] = calibrated.volts();
                    }
                    slot += 1;
                    accepted += 1;
                    self.report_progress(slot, total);
                    continue;
                }
                Some(FrameEvent::Malformed) => {
                    warn!("malformed sample line, slot {slot} left at zero");
                    slot += 1;
                    dropped += 1;
                    self.report_progress(slot, total);
                    continue;
                }
                None => {}
            }

            let available = match self.channel.bytes_to_read() {
                Ok(count) => count,
                Err(error) => {
                    warn!("availability poll failed: {error}");
                    0
                }
            };
            if available == 0 {
                if last_fresh.elapsed() >= self.options.stall_timeout {
                    self.halt_device();
                    return Err(SystolicError::Stalled(self.options.stall_timeout));
                }
                thread::sleep(POLL_BACKOFF);
                continue;
            }

            let take = available.min(read_buf.len());
            match self.channel.read_ready(&mut read_buf[..take]) {
                Ok(0) => {}
                Ok(count) => {
                    decoder.push_bytes(&read_buf[..count]);
                    last_fresh = Instant::now();
                }
                Err(error) => warn!("channel read failed: {error}"),
            }
        }
        let elapsed = started.elapsed();

        self.set_phase(Phase::Draining);
        if let Err(error) = self.channel.stop_conversion() {
            warn!("stop-conversion write failed: {error}");
        }

        self.set_phase(Phase::Done);
        let effective_rate_hz = total as f64 / elapsed.as_secs_f64().max(1e-9);
        info!(
            "collected {accepted}+{dropped}/{total} samples in {:.3} s ({effective_rate_hz:.2} Hz effective)",
            elapsed.as_secs_f64()
        );
        if decoder.skipped_lines() > 0 || fallback_fields > 0 {
            debug!(
                "{} digitless lines skipped, {fallback_fields} fields fell back to zero",
                decoder.skipped_lines()
            );
        }

        Ok(RawRun {
            leads,
            effective_rate_hz,
            accepted,
            dropped,
            fallback_fields,
        })
    }

    /// Best-effort stop so an aborted run does not leave the device streaming.
    fn halt_device(&mut self) {
        if let Err(error) = self.channel.stop_conversion() {
            warn!("stop-conversion write failed: {error}");
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!("acquisition phase {:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    fn report_progress(&mut self, filled: usize, total: usize) {
        if let Some(callback) = self.progress.as_mut() {
            callback(filled, total);
        }
    }
}
