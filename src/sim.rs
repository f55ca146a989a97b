//! A software stand-in for the hardware front end, for bench work with no
//! board plugged in. It honours the same command frames the serial channel
//! sends and streams plausible sample lines at the configured output rate.

use std::collections::VecDeque;
use std::time::Instant;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::{registers, FrontEndChannel, START_CONVERSION, STOP_CONVERSION};
use crate::error::SystolicError;

/// Backpressure limit on buffered sample bytes when the host stops reading.
const PENDING_CAP: usize = 1 << 16;
/// Uniform code jitter, in least significant bits of the converter.
const NOISE_LSB: f64 = 20.0;

#[derive(Debug)]
pub struct SimulatedFrontEnd {
    output_data_rate_hz: f64,
    full_scale_code: u32,
    heart_rate_bpm: f64,
    rng: StdRng,
    started_at: Option<Instant>,
    emitted: usize,
    pending: VecDeque<u8>,
    commands: Vec<(u8, u8)>,
}

impl SimulatedFrontEnd {
    pub fn new(output_data_rate_hz: f64, full_scale_code: u32) -> Self {
        Self {
            output_data_rate_hz,
            full_scale_code,
            heart_rate_bpm: 72.0,
            rng: StdRng::seed_from_u64(1942),
            started_at: None,
            emitted: 0,
            pending: VecDeque::new(),
            commands: Vec::new(),
        }
    }

    pub fn with_heart_rate(mut self, bpm: f64) -> Self {
        self.heart_rate_bpm = bpm;
        self
    }

    /// Command frames the host has sent, oldest first.
    pub fn commands(&self) -> &[(u8, u8)] {
        &self.commands
    }

    /// Produces every sample line that is due by now, wall clock against the
    /// configured output data rate.
    fn synthesize_due(&mut self) {
        let Some(started_at) = self.started_at else {
            return;
        };
        let due = (started_at.elapsed().as_secs_f64() * self.output_data_rate_hz) as usize;
        while self.emitted < due && self.pending.len() < PENDING_CAP {
            let t = self.emitted as f64 / self.output_data_rate_hz;
            let phase = (t * self.heart_rate_bpm / 60.0).fract();
            let ii_mv = lead_ii_template(phase);
            let i_mv = 0.6 * ii_mv;
            let iii_mv = ii_mv - i_mv;
            let line = format!(
                "{},{},{}\r\n",
                self.encode(i_mv / 1000.0),
                self.encode(ii_mv / 1000.0),
                self.encode(iii_mv / 1000.0)
            );
            self.pending.extend(line.as_bytes());
            self.emitted += 1;
        }
    }

    /// Maps volts to a converter code around mid-scale, with jitter, clamped
    /// the way a saturating converter would.
    fn encode(&mut self, volts: f64) -> u64 {
        let full_scale = self.full_scale_code as f64;
        let centered = (volts * (3.5 / 4.8) + 0.5) * full_scale;
        let jittered = centered + self.rng.gen_range(-NOISE_LSB..NOISE_LSB);
        jittered.round().clamp(0.0, full_scale - 1.0) as u64
    }
}

impl FrontEndChannel for SimulatedFrontEnd {
    fn bytes_to_read(&mut self) -> Result<usize, SystolicError> {
        self.synthesize_due();
        Ok(self.pending.len())
    }

    fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, SystolicError> {
        self.synthesize_due();
        let count = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(count) {
            if let Some(byte) = self.pending.pop_front() {
                *slot = byte;
            }
        }
        Ok(count)
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), SystolicError> {
        let text = String::from_utf8_lossy(bytes);
        let Some((register, value)) = parse_command(text.trim()) else {
            debug!("simulator ignoring unrecognized frame {text:?}");
            return Ok(());
        };
        self.commands.push((register, value));
        if register == registers::CONFIG {
            match value {
                START_CONVERSION => {
                    self.started_at = Some(Instant::now());
                    self.emitted = 0;
                    debug!("simulator started streaming at {} Hz", self.output_data_rate_hz);
                }
                STOP_CONVERSION => {
                    self.started_at = None;
                    debug!("simulator stopped streaming");
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SystolicError> {
        self.pending.clear();
        Ok(())
    }
}

fn parse_command(text: &str) -> Option<(u8, u8)> {
    let (register, value) = text.split_once(',')?;
    Some((parse_hex_byte(register)?, parse_hex_byte(value)?))
}

fn parse_hex_byte(text: &str) -> Option<u8> {
    let digits = text.trim().strip_prefix("0x")?;
    u8::from_str_radix(digits, 16).ok()
}

fn bump(phase: f64, center: f64, width: f64, amplitude: f64) -> f64 {
    let distance = phase - center;
    amplitude * (-distance * distance / (2.0 * width * width)).exp()
}

/// Millivolt template for one beat on Lead II, phase in `[0, 1)`. A sum of
/// bumps standing in for the P, Q, R, S and T deflections.
fn lead_ii_template(phase: f64) -> f64 {
    bump(phase, 0.18, 0.025, 0.15)
        + bump(phase, 0.37, 0.008, -0.12)
        + bump(phase, 0.40, 0.009, 1.1)
        + bump(phase, 0.43, 0.009, -0.25)
        + bump(phase, 0.63, 0.040, 0.35)
}
