//! Ambient screen-color matching.
//!
//! The sampler averages the primary screen and makes its hue and saturation
//! the target color. With screen-brightness on (and audio mode off) the
//! screen's value also drives the target brightness.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::{FailureLog, SmartModes};
use crate::color::rgb_to_hue_sat;
use crate::common::constants::*;
use crate::config::Config;
use crate::core::state::ColorState;

/// One captured screen image as tightly packed RGBA bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A frame filled with a single color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat((width as usize) * (height as usize));
        Self::new(width, height, pixels)
    }

    fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        self.pixels.get(offset..offset + 4)
    }
}

pub trait ScreenSource {
    fn capture(&mut self) -> Result<RgbaFrame>;
}

/// Mean color of an evenly spaced grid of at most
/// [`SCREEN_SAMPLE_GRID`]×[`SCREEN_SAMPLE_GRID`] pixels, as `[0, 1]` floats.
///
/// Returns `None` for an empty or truncated frame.
pub fn average_color(frame: &RgbaFrame) -> Option<(f32, f32, f32)> {
    if frame.width == 0 || frame.height == 0 {
        return None;
    }

    let columns = frame.width.min(SCREEN_SAMPLE_GRID);
    let rows = frame.height.min(SCREEN_SAMPLE_GRID);
    let mut sums = [0u64; 3];

    for row in 0..rows {
        // Center of each grid cell
        let y = ((2 * row + 1) as u64 * frame.height as u64 / (2 * rows) as u64) as u32;
        for column in 0..columns {
            let x = ((2 * column + 1) as u64 * frame.width as u64 / (2 * columns) as u64) as u32;
            let pixel = frame.pixel(x, y)?;
            sums[0] += u64::from(pixel[0]);
            sums[1] += u64::from(pixel[1]);
            sums[2] += u64::from(pixel[2]);
        }
    }

    let count = (rows as u64 * columns as u64) as f32 * 255.0;
    Some((
        sums[0] as f32 / count,
        sums[1] as f32 / count,
        sums[2] as f32 / count,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSettings {
    pub interval: Duration,
    pub min_brightness: f32,
}

impl ScreenSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_millis(
                config.screen_interval.unwrap_or(DEFAULT_SCREEN_INTERVAL),
            ),
            min_brightness: config
                .screen_min_brightness
                .unwrap_or(DEFAULT_SCREEN_MIN_BRIGHTNESS),
        }
    }
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SCREEN_INTERVAL),
            min_brightness: DEFAULT_SCREEN_MIN_BRIGHTNESS,
        }
    }
}

pub struct ScreenSampler {
    source: Box<dyn ScreenSource>,
    state: Arc<ColorState>,
    modes: Arc<SmartModes>,
    settings: ScreenSettings,
    debug_enabled: bool,
}

impl ScreenSampler {
    pub fn new(
        source: Box<dyn ScreenSource>,
        state: Arc<ColorState>,
        modes: Arc<SmartModes>,
        settings: ScreenSettings,
        debug_enabled: bool,
    ) -> Self {
        Self {
            source,
            state,
            modes,
            settings,
            debug_enabled,
        }
    }

    /// One poll. Does nothing while screen mode is off.
    ///
    /// Returns the averaged color when one was applied.
    pub fn step(&mut self) -> Result<Option<(f32, f32, f32)>> {
        if !self.modes.screen_enabled() {
            return Ok(None);
        }

        let frame = self.source.capture()?;
        let Some((r, g, b)) = average_color(&frame) else {
            anyhow::bail!("captured an empty screen image ({}x{})", frame.width, frame.height);
        };

        let (hue, saturation) = rgb_to_hue_sat(r, g, b);
        self.state.request_color(hue, saturation);

        if self.modes.screen_brightness_enabled() && !self.modes.audio_enabled() {
            let value = r.max(g).max(b);
            self.state.request_brightness(
                (value * 100.0).clamp(self.settings.min_brightness, MAXIMUM_BRIGHTNESS),
            );
        }

        Ok(Some((r, g, b)))
    }

    pub fn run(&mut self, running: &AtomicBool) {
        let backoff = Duration::from_millis(SAMPLER_ERROR_BACKOFF_MS);
        if self.debug_enabled {
            log_debug!(
                "Screen sampler polling every {}ms",
                self.settings.interval.as_millis()
            );
        }
        let mut failures = FailureLog::new("Screen", self.debug_enabled);
        while running.load(Ordering::SeqCst) {
            match self.step() {
                Ok(_) => {
                    failures.succeeded();
                    thread::sleep(self.settings.interval);
                }
                Err(e) => {
                    failures.failed(&e);
                    thread::sleep(backoff);
                }
            }
        }
    }
}

/// Spawn the screen sampler thread.
///
/// The source is opened on the new thread. If that fails the failure is
/// logged once, the mode stays unavailable and the thread exits.
pub fn spawn(
    state: Arc<ColorState>,
    modes: Arc<SmartModes>,
    settings: ScreenSettings,
    running: Arc<AtomicBool>,
    debug_enabled: bool,
) -> Result<thread::JoinHandle<()>> {
    use anyhow::Context;

    thread::Builder::new()
        .name("screen-sampler".to_string())
        .spawn(move || {
            let source = match open_default_source() {
                Ok(source) => source,
                Err(e) => {
                    log_decorated!("Screen sampling unavailable: {e:#}");
                    return;
                }
            };
            modes.set_screen_available(true);
            ScreenSampler::new(source, state, modes, settings, debug_enabled).run(&running);
        })
        .context("failed to spawn screen sampler thread")
}

#[cfg(feature = "screen")]
pub fn open_default_source() -> Result<Box<dyn ScreenSource>> {
    Ok(Box::new(xcap_source::XcapSource::primary()?))
}

#[cfg(not(feature = "screen"))]
pub fn open_default_source() -> Result<Box<dyn ScreenSource>> {
    anyhow::bail!("built without screen capture support (enable the `screen` feature)")
}

#[cfg(feature = "screen")]
mod xcap_source {
    use anyhow::{Context, Result};
    use xcap::Monitor;

    use super::{RgbaFrame, ScreenSource};

    pub struct XcapSource {
        monitor: Monitor,
    }

    impl XcapSource {
        /// First monitor reported by the platform.
        pub fn primary() -> Result<Self> {
            let monitor = Monitor::all()
                .context("failed to enumerate monitors")?
                .into_iter()
                .next()
                .context("no monitor found")?;
            Ok(Self { monitor })
        }
    }

    impl ScreenSource for XcapSource {
        fn capture(&mut self) -> Result<RgbaFrame> {
            let image = self
                .monitor
                .capture_image()
                .context("failed to capture monitor")?;
            let (width, height) = (image.width(), image.height());
            Ok(RgbaFrame::new(width, height, image.into_raw()))
        }
    }
}
