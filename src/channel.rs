//! Byte channel to the front end and the command side of its protocol.
//!
//! Commands are ASCII frames of the form `"<register>,<value>\r\n"` with both
//! numbers in `0x..` hex. The data direction is a stream of sample lines
//! handled by [`crate::frame::FrameDecoder`].

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use log::{debug, warn};
use serialport::{ClearBuffer, SerialPort};

use crate::error::SystolicError;
use crate::lookup::BandwidthProfile;

/// Control register addresses understood by the firmware.
pub mod registers {
    /// Main configuration register; bit 0 starts or stops conversion.
    pub const CONFIG: u8 = 0x00;
    /// R2 decimation rate, shared by all channels.
    pub const R2: u8 = 0x21;
    /// R3 decimation rate, channel 1.
    pub const R3_CH1: u8 = 0x22;
    /// R3 decimation rate, channel 2.
    pub const R3_CH2: u8 = 0x23;
    /// R3 decimation rate, channel 3.
    pub const R3_CH3: u8 = 0x24;
}

pub const START_CONVERSION: u8 = 0x01;
pub const STOP_CONVERSION: u8 = 0x00;

pub const DEFAULT_BAUD: u32 = 115_200;

/// Formats one command frame, e.g. `command_frame(0x21, 0x08)` gives
/// `"0x21,0x08\r\n"`.
pub fn command_frame(register: u8, value: u8) -> String {
    format!("{register:#04x},{value:#04x}\r\n")
}

/// Byte-oriented duplex link to the front end.
///
/// Reads are poll-driven: the acquisition loop asks how many bytes are ready
/// and takes at most that, so no call here may block waiting for data.
pub trait FrontEndChannel {
    /// Number of bytes readable without blocking.
    fn bytes_to_read(&mut self) -> Result<usize, SystolicError>;

    /// Reads from already-available bytes into `buf`, returning the count.
    fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, SystolicError>;

    /// Writes one complete frame.
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), SystolicError>;

    /// Discards any unread input.
    fn clear_input(&mut self) -> Result<(), SystolicError>;

    /// Writes one register command frame.
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SystolicError> {
        let frame = command_frame(register, value);
        self.write_frame(frame.as_bytes())?;
        debug!("sent {}", frame.trim_end());
        Ok(())
    }

    fn start_conversion(&mut self) -> Result<(), SystolicError> {
        self.write_register(registers::CONFIG, START_CONVERSION)
    }

    fn stop_conversion(&mut self) -> Result<(), SystolicError> {
        self.write_register(registers::CONFIG, STOP_CONVERSION)
    }
}

/// Pushes a decimation profile to the device: R2 first, then R3 for each of
/// the three channels. Write failures are logged and skipped; a misconfigured
/// device surfaces later as a stall or an off-nominal measured rate.
pub fn upload_profile<C: FrontEndChannel + ?Sized>(channel: &mut C, profile: &BandwidthProfile) {
    let writes = [
        (registers::R2, profile.r2),
        (registers::R3_CH1, profile.r3),
        (registers::R3_CH2, profile.r3),
        (registers::R3_CH3, profile.r3),
    ];
    for (register, value) in writes {
        if let Err(error) = channel.write_register(register, value) {
            warn!("register {register:#04x} upload failed: {error}");
        }
    }
}

/// Hardware channel over a serial port.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Opens `path` at `baud`. The port timeout only bounds reads issued
    /// after a poll reported bytes ready, so it is kept short.
    pub fn open(path: &str, baud: u32) -> Result<Self, SystolicError> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(100))
            .open()?;
        Ok(Self { port })
    }

    /// Names of the serial ports visible on this machine.
    pub fn available_ports() -> Result<Vec<String>, SystolicError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|info| info.port_name)
            .collect())
    }
}

impl FrontEndChannel for SerialChannel {
    fn bytes_to_read(&mut self) -> Result<usize, SystolicError> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, SystolicError> {
        Ok(self.port.read(buf)?)
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), SystolicError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SystolicError> {
        Ok(self.port.clear(ClearBuffer::Input)?)
    }
}

/// In-memory channel that plays back queued byte chunks and records every
/// frame written to it. Useful for tests and deterministic playback.
///
/// Queued chunks are treated as arriving after any `clear_input`, so a
/// settle-period drain does not eat scripted data.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    chunks: VecDeque<Vec<u8>>,
    written: Vec<Vec<u8>>,
    clears: usize,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one chunk of incoming bytes.
    pub fn push_chunk(&mut self, chunk: impl Into<Vec<u8>>) {
        self.chunks.push_back(chunk.into());
    }

    /// Queues one line with the device's CRLF terminator appended.
    pub fn push_line(&mut self, line: &str) {
        self.push_chunk(format!("{line}\r\n").into_bytes());
    }

    /// Every frame written so far, in order.
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// How many times the input was cleared.
    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl FrontEndChannel for ScriptedChannel {
    fn bytes_to_read(&mut self) -> Result<usize, SystolicError> {
        Ok(self.chunks.front().map_or(0, Vec::len))
    }

    fn read_ready(&mut self, buf: &mut [u8]) -> Result<usize, SystolicError> {
        match self.chunks.pop_front() {
            None => Ok(0),
            Some(chunk) => {
                let taken = chunk.len().min(buf.len());
                buf[..taken].copy_from_slice(&chunk[..taken]);
                if taken < chunk.len() {
                    self.chunks.push_front(chunk[taken..].to_vec());
                }
                Ok(taken)
            }
        }
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), SystolicError> {
        self.written.push(bytes.to_vec());
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SystolicError> {
        self.clears += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::resolve;

    #[test]
    fn command_frames_are_fixed_width_hex() {
        assert_eq!(command_frame(registers::CONFIG, START_CONVERSION), "0x00,0x01\r\n");
        assert_eq!(command_frame(registers::CONFIG, STOP_CONVERSION), "0x00,0x00\r\n");
        assert_eq!(command_frame(registers::R3_CH2, 0x80), "0x23,0x80\r\n");
    }

    #[test]
    fn scripted_channel_plays_back_chunks() {
        let mut channel = ScriptedChannel::new();
        channel.push_line("1,2,3");
        assert_eq!(channel.bytes_to_read().unwrap(), 7);
        let mut buf = [0u8; 16];
        let got = channel.read_ready(&mut buf).unwrap();
        assert_eq!(&buf[..got], b"1,2,3\r\n");
        assert_eq!(channel.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn scripted_channel_splits_oversized_chunks() {
        let mut channel = ScriptedChannel::new();
        channel.push_chunk(b"abcdef".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(channel.read_ready(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(channel.read_ready(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn upload_pushes_r2_then_all_r3_channels() {
        let mut channel = ScriptedChannel::new();
        let profile = resolve(20).unwrap();
        upload_profile(&mut channel, profile);
        let written: Vec<&[u8]> = channel.written().iter().map(Vec::as_slice).collect();
        assert_eq!(
            written,
            vec![
                b"0x21,0x08\r\n".as_slice(),
                b"0x22,0x80\r\n".as_slice(),
                b"0x23,0x80\r\n".as_slice(),
                b"0x24,0x80\r\n".as_slice(),
            ]
        );
    }

    #[test]
    fn conversion_commands_hit_the_config_register() {
        let mut channel = ScriptedChannel::new();
        channel.start_conversion().unwrap();
        channel.stop_conversion().unwrap();
        assert_eq!(channel.written()[0], b"0x00,0x01\r\n");
        assert_eq!(channel.written()[1], b"0x00,0x00\r\n");
    }
}
