//! Reactive intent producers and their shared mode toggles.
//!
//! Each sampler runs on its own thread, polls a source at a fixed interval and
//! writes into the shared target through the `request_*` setters. A sampler
//! never touches the display and never talks to the device.
//!
//! Sources are opened on the sampler thread itself, because capture handles
//! are not always `Send`. A source that cannot be opened leaves its mode
//! marked unavailable and contributes nothing.

pub mod audio;
pub mod screen;

use anyhow::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Frequency band of the audio analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Bass,
    Mid,
    High,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Bass, Band::Mid, Band::High];

    pub fn name(self) -> &'static str {
        match self {
            Band::Bass => "bass",
            Band::Mid => "mid",
            Band::High => "high",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bass" => Ok(Band::Bass),
            "mid" => Ok(Band::Mid),
            "high" => Ok(Band::High),
            other => anyhow::bail!("unknown audio band '{other}' (expected bass, mid or high)"),
        }
    }

    fn index(self) -> usize {
        match self {
            Band::Bass => 0,
            Band::Mid => 1,
            Band::High => 2,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of which bands feed the audio intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandSelection {
    selected: [bool; 3],
}

impl BandSelection {
    pub fn new(bands: &[Band]) -> Self {
        let mut selection = Self::default();
        for band in bands {
            selection.selected[band.index()] = true;
        }
        selection
    }

    pub fn contains(&self, band: Band) -> bool {
        self.selected[band.index()]
    }

    pub fn is_empty(&self) -> bool {
        !self.selected.iter().any(|s| *s)
    }

    /// Selected bands in bass, mid, high order.
    pub fn bands(&self) -> impl Iterator<Item = Band> + '_ {
        Band::ALL.into_iter().filter(|b| self.contains(*b))
    }
}

/// Live toggles for the smart modes, shared by the UI and the samplers.
#[derive(Debug, Default)]
pub struct SmartModes {
    screen: AtomicBool,
    screen_brightness: AtomicBool,
    audio: AtomicBool,
    bands: [AtomicBool; 3],
    screen_available: AtomicBool,
    audio_available: AtomicBool,
}

impl SmartModes {
    /// All modes off, with the given bands selected.
    pub fn new(bands: &[Band]) -> Self {
        let modes = Self::default();
        for band in bands {
            modes.bands[band.index()].store(true, Ordering::Relaxed);
        }
        modes
    }

    pub fn screen_enabled(&self) -> bool {
        self.screen.load(Ordering::Relaxed)
    }

    pub fn screen_brightness_enabled(&self) -> bool {
        self.screen_brightness.load(Ordering::Relaxed)
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio.load(Ordering::Relaxed)
    }

    pub fn set_screen(&self, on: bool) {
        self.screen.store(on, Ordering::Relaxed);
    }

    pub fn set_screen_brightness(&self, on: bool) {
        self.screen_brightness.store(on, Ordering::Relaxed);
    }

    pub fn set_audio(&self, on: bool) {
        self.audio.store(on, Ordering::Relaxed);
    }

    /// Flip a toggle and return its new value.
    pub fn toggle_screen(&self) -> bool {
        !self.screen.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn toggle_screen_brightness(&self) -> bool {
        !self.screen_brightness.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn toggle_audio(&self) -> bool {
        !self.audio.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn toggle_band(&self, band: Band) -> bool {
        !self.bands[band.index()].fetch_xor(true, Ordering::Relaxed)
    }

    pub fn band_selection(&self) -> BandSelection {
        let mut selection = BandSelection::default();
        for band in Band::ALL {
            selection.selected[band.index()] = self.bands[band.index()].load(Ordering::Relaxed);
        }
        selection
    }

    pub fn screen_available(&self) -> bool {
        self.screen_available.load(Ordering::Relaxed)
    }

    pub fn audio_available(&self) -> bool {
        self.audio_available.load(Ordering::Relaxed)
    }

    pub(crate) fn set_screen_available(&self, available: bool) {
        self.screen_available.store(available, Ordering::Relaxed);
    }

    pub(crate) fn set_audio_available(&self, available: bool) {
        self.audio_available.store(available, Ordering::Relaxed);
    }
}

/// Reports a failing source once, then only under `--debug` until a poll
/// succeeds again.
#[derive(Debug)]
pub(crate) struct FailureLog {
    source: &'static str,
    debug_enabled: bool,
    failing: bool,
}

impl FailureLog {
    pub(crate) fn new(source: &'static str, debug_enabled: bool) -> Self {
        Self {
            source,
            debug_enabled,
            failing: false,
        }
    }

    /// Record a failed poll. Returns whether it was reported as a warning.
    pub(crate) fn failed(&mut self, error: &anyhow::Error) -> bool {
        if !self.failing {
            self.failing = true;
            log_pipe!();
            log_warning!("{} capture failed: {error:#}", self.source);
            return true;
        }
        if self.debug_enabled {
            log_debug!("{} capture still failing: {error:#}", self.source);
        }
        false
    }

    pub(crate) fn succeeded(&mut self) {
        if self.failing && self.debug_enabled {
            log_debug!("{} capture recovered", self.source);
        }
        self.failing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_log_warns_once_per_outage() {
        let mut log = FailureLog::new("Screen", false);
        let error = anyhow::anyhow!("display went away");
        assert!(log.failed(&error));
        assert!(!log.failed(&error));
        assert!(!log.failed(&error));

        log.succeeded();
        assert!(log.failed(&error));
    }

    #[test]
    fn test_band_names_round_trip() {
        for band in Band::ALL {
            assert_eq!(Band::from_name(band.name()).unwrap(), band);
        }
        assert_eq!(Band::from_name(" BASS ").unwrap(), Band::Bass);
        assert!(Band::from_name("treble").is_err());
    }

    #[test]
    fn test_modes_start_off_with_configured_bands() {
        let modes = SmartModes::new(&[Band::Bass]);
        assert!(!modes.screen_enabled());
        assert!(!modes.audio_enabled());
        assert!(!modes.screen_brightness_enabled());
        let selection = modes.band_selection();
        assert!(selection.contains(Band::Bass));
        assert!(!selection.contains(Band::Mid));
        assert_eq!(selection.bands().collect::<Vec<_>>(), vec![Band::Bass]);
    }

    #[test]
    fn test_toggles_return_new_value() {
        let modes = SmartModes::new(&[]);
        assert!(modes.toggle_audio());
        assert!(modes.audio_enabled());
        assert!(!modes.toggle_audio());
        assert!(modes.toggle_band(Band::High));
        assert!(modes.band_selection().contains(Band::High));
        assert!(!modes.toggle_band(Band::High));
        assert!(modes.band_selection().is_empty());
    }
}
