//! Device link abstraction and the strip's wire format.
//!
//! The strip understands two fixed-layout commands written to a single
//! characteristic without response:
//!
//! - a bootstrap command sent once after connecting: `7E 00 04 02 01 EF`
//! - a color command: `7E 00 05 03 RR GG BB 00 EF`
//!
//! ## Architecture
//!
//! The [`Link`] trait is the only contact point with the actual radio. A
//! [`transport::DeviceTransport`] sits in front of it and applies the rate and
//! dedup guards. Accepted frames go over a bounded channel to a link worker
//! thread that owns the `Link`, so the animation tick never waits on a write.
//!
//! Implementations:
//! - [`dry_run::DryRunLink`]: always connected, logs frames (default build)
//! - `ble::BleLink`: btleplug-backed BLE connection (feature `ble`)

use anyhow::Result;
use std::fmt;

use crate::color::Rgb;
use crate::common::constants::{
    BOOTSTRAP_FRAME, COLOR_FRAME_LEN, COLOR_FRAME_PREFIX, COLOR_FRAME_SUFFIX,
};

#[cfg(feature = "ble")]
pub mod ble;
pub mod dry_run;
pub mod transport;

/// Connection to one physical strip.
///
/// Implementations are driven from a single worker thread and may block.
#[cfg_attr(test, mockall::automock)]
pub trait Link: Send {
    /// Establish the connection. Called once by the worker.
    fn connect(&mut self) -> Result<()>;

    /// Write one frame without waiting for a response.
    fn write_frame(&mut self, frame: &[u8]) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn disconnect(&mut self) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &'static str;
}

/// One command frame, at most nine bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; COLOR_FRAME_LEN],
    len: usize,
}

impl Frame {
    /// Color command for an already brightness-scaled color.
    pub fn color(rgb: Rgb) -> Self {
        let mut bytes = [0u8; COLOR_FRAME_LEN];
        bytes[..4].copy_from_slice(&COLOR_FRAME_PREFIX);
        bytes[4] = rgb.r;
        bytes[5] = rgb.g;
        bytes[6] = rgb.b;
        bytes[7..].copy_from_slice(&COLOR_FRAME_SUFFIX);
        Self {
            bytes,
            len: COLOR_FRAME_LEN,
        }
    }

    /// Command sent once right after connecting.
    pub fn bootstrap() -> Self {
        let mut bytes = [0u8; COLOR_FRAME_LEN];
        bytes[..BOOTSTRAP_FRAME.len()].copy_from_slice(&BOOTSTRAP_FRAME);
        Self {
            bytes,
            len: BOOTSTRAP_FRAME.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Uppercase hex rendering, e.g. `7E000503FF000000EF`.
    pub fn hex(&self) -> String {
        self.as_bytes().iter().map(|b| format!("{b:02X}")).collect()
    }

    /// Payload color of a color frame.
    pub fn rgb(&self) -> Option<Rgb> {
        (self.len == COLOR_FRAME_LEN).then(|| Rgb::new(self.bytes[4], self.bytes[5], self.bytes[6]))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.hex())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}
