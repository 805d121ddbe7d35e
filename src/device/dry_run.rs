//! Link that talks to no hardware.
//!
//! Used with `--dry-run` and in builds without the `ble` feature. Frames are
//! counted and, in debug mode, logged as hex.

use anyhow::Result;

use super::Link;

#[derive(Debug, Default)]
pub struct DryRunLink {
    connected: bool,
    frames_written: u64,
    debug_enabled: bool,
}

impl DryRunLink {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            connected: false,
            frames_written: 0,
            debug_enabled,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Link for DryRunLink {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if !self.connected {
            anyhow::bail!("dry-run link is not connected");
        }
        self.frames_written += 1;
        if self.debug_enabled {
            let hex: String = frame.iter().map(|b| format!("{b:02X}")).collect();
            log_debug!("dry-run write #{}: {hex}", self.frames_written);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.debug_enabled {
            log_debug!("dry-run link closed after {} frames", self.frames_written);
        }
        self.connected = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
