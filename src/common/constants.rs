//! Application-wide constants: configuration defaults, validation limits and
//! the fixed device protocol bytes.

// # Device Defaults

pub const DEFAULT_ADDRESS: &str = "BE:27:62:00:3E:91";
pub const DEFAULT_CHARACTERISTIC: &str = "0000fff3-0000-1000-8000-00805f9b34fb";
pub const DEFAULT_SCAN_TIMEOUT: u64 = 10; // seconds
pub const DEFAULT_MIN_WRITE_INTERVAL: u64 = 10; // milliseconds

pub const MINIMUM_SCAN_TIMEOUT: u64 = 1;
pub const MAXIMUM_SCAN_TIMEOUT: u64 = 60;
pub const MINIMUM_WRITE_INTERVAL: u64 = 1;
pub const MAXIMUM_WRITE_INTERVAL: u64 = 1000;

// # Animation Defaults

pub const DEFAULT_TICK_INTERVAL: u64 = 10; // milliseconds
pub const DEFAULT_ANIM_SPEED: f32 = 0.2;
pub const DEFAULT_BRIGHTNESS_SPEED: f32 = 0.2;
pub const DEFAULT_BRIGHTNESS: f32 = 100.0;

pub const MINIMUM_TICK_INTERVAL: u64 = 1;
pub const MAXIMUM_TICK_INTERVAL: u64 = 1000;
pub const MINIMUM_BRIGHTNESS: f32 = 0.0;
pub const MAXIMUM_BRIGHTNESS: f32 = 100.0;

/// Per-field change threshold below which a tick counts as "unchanged".
/// A field this close to its target lands on it exactly.
pub const CHANGE_EPSILON: f32 = 1e-3;

// # Screen Sampler Defaults

pub const DEFAULT_SCREEN_INTERVAL: u64 = 50; // milliseconds
pub const DEFAULT_SCREEN_MIN_BRIGHTNESS: f32 = 5.0;
pub const SCREEN_SAMPLE_GRID: u32 = 50;

// # Audio Sampler Defaults

pub const DEFAULT_AUDIO_INTERVAL: u64 = 50; // milliseconds
pub const DEFAULT_AUDIO_SPEED: f32 = 0.18;
pub const DEFAULT_AUDIO_MIN_BRIGHTNESS: f32 = 8.0;
pub const DEFAULT_AUDIO_MAX_BRIGHTNESS: f32 = 80.0;
pub const DEFAULT_SPIKE_THRESHOLD: f32 = 30.0;
pub const DEFAULT_HISTORY_LEN: usize = 30;
pub const DEFAULT_AUDIO_BANDS: &[&str] = &["bass"];

pub const AUDIO_CHUNK_SIZE: usize = 1024;
pub const AUDIO_SAMPLE_RATE: u32 = 44100;
/// FFT bin boundaries of the bass/mid/high bands.
pub const BASS_BINS_END: usize = 150;
pub const MID_BINS_END: usize = 2000;

pub const MINIMUM_SAMPLER_INTERVAL: u64 = 10;
pub const MAXIMUM_SAMPLER_INTERVAL: u64 = 5000;
pub const MINIMUM_HISTORY_LEN: usize = 1;
pub const MAXIMUM_HISTORY_LEN: usize = 1000;

/// Back-off after a failed capture before the sampler polls again.
pub const SAMPLER_ERROR_BACKOFF_MS: u64 = 200;

// # Device Protocol

/// Sent once after the link connects.
pub const BOOTSTRAP_FRAME: [u8; 6] = [0x7E, 0x00, 0x04, 0x02, 0x01, 0xEF];
pub const COLOR_FRAME_PREFIX: [u8; 4] = [0x7E, 0x00, 0x05, 0x03];
pub const COLOR_FRAME_SUFFIX: [u8; 2] = [0x00, 0xEF];
pub const COLOR_FRAME_LEN: usize = 9;

// # Interactive Controller

pub const UI_REDRAW_INTERVAL_MS: u64 = 50;
pub const UI_BRIGHTNESS_STEP: f32 = 5.0;
pub const UI_WHITE_STEP: f32 = 0.05;
pub const UI_WHEEL_RADIUS: i32 = 8;
pub const UI_GRADIENT_WIDTH: usize = 32;

// # One-shot Commands

pub const ONE_SHOT_TIMEOUT_SECS: u64 = 5;
pub const CONVERGENCE_EPSILON: f32 = 1e-3;

// # Exit Codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[cfg(test)]
pub mod test_constants {
    pub const TEST_ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
    pub const TEST_CHARACTERISTIC: &str = "0000fff3-0000-1000-8000-00805f9b34fb";
}
