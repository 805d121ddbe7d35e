//! Configuration system for stripctl.
//!
//! Settings live in a single flat TOML file. Section labels are comments, so
//! every key sits at the top level:
//!
//! ```toml
//! #[Device]
//! address = "BE:27:62:00:3E:91"                            # BLE address of the strip (XX:XX:XX:XX:XX:XX)
//! characteristic = "0000fff3-0000-1000-8000-00805f9b34fb"  # Characteristic UUID written without response
//! scan_timeout = 10                                        # Seconds to scan for the strip (1-60)
//! min_write_interval = 10                                  # Minimum time between device writes (1-1000)ms
//!
//! #[Animation]
//! tick_interval = 10                                       # Animation tick period (1-1000)ms
//! anim_speed = 0.2                                         # Fraction of remaining color distance covered per tick (0-1]
//! brightness_speed = 0.2                                   # Same for brightness (0-1]
//! default_brightness = 100                                 # Brightness at startup (0-100)
//!
//! #[Screen]
//! screen_interval = 50                                     # Screen poll interval (10-5000)ms
//! screen_min_brightness = 5                                # Brightness floor when the screen drives brightness (0-100)
//!
//! #[Audio]
//! audio_interval = 50                                      # Microphone poll interval (10-5000)ms
//! audio_speed = 0.18                                       # Smoothing of the audio-driven brightness (0-1]
//! audio_min_brightness = 8                                 # Brightness during silence (0-100)
//! audio_max_brightness = 80                                # Brightness on the strongest beats (0-100)
//! spike_threshold = 30                                     # Energy above the running mean counted as a beat
//! history_len = 30                                         # Polls in the running mean (1-1000)
//! audio_bands = ["bass"]                                   # Bands feeding the beat detector: "bass", "mid", "high"
//! ```
//!
//! The file is `$XDG_CONFIG_HOME/stripctl/stripctl.toml` unless `--config`
//! points at another directory. A commented default file is written when none
//! exists. Every field is optional; missing values resolve to the `DEFAULT_*`
//! constants.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::common::constants::*;
use crate::sampler::Band;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Settings loaded from `stripctl.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    // Device
    pub address: Option<String>,
    pub characteristic: Option<String>,
    pub scan_timeout: Option<u64>,       // seconds
    pub min_write_interval: Option<u64>, // milliseconds

    // Animation
    pub tick_interval: Option<u64>, // milliseconds
    pub anim_speed: Option<f32>,
    pub brightness_speed: Option<f32>,
    pub default_brightness: Option<f32>,

    // Screen sampler
    pub screen_interval: Option<u64>, // milliseconds
    pub screen_min_brightness: Option<f32>,

    // Audio sampler
    pub audio_interval: Option<u64>, // milliseconds
    pub audio_speed: Option<f32>,
    pub audio_min_brightness: Option<f32>,
    pub audio_max_brightness: Option<f32>,
    pub spike_threshold: Option<f32>,
    pub history_len: Option<usize>,
    pub audio_bands: Option<Vec<String>>,
}

impl Config {
    /// Load configuration using the module's load function
    pub fn load() -> Result<Self> {
        load()
    }

    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    pub fn create_default_config(path: &PathBuf) -> Result<()> {
        create_default_config(path)
    }

    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_ADDRESS)
    }

    pub fn characteristic(&self) -> &str {
        self.characteristic
            .as_deref()
            .unwrap_or(DEFAULT_CHARACTERISTIC)
    }

    /// Audio bands selected at startup.
    ///
    /// Names were checked during validation, so unknown entries cannot occur
    /// in a loaded config and are skipped here.
    pub fn audio_bands(&self) -> Vec<Band> {
        match &self.audio_bands {
            Some(names) => names
                .iter()
                .filter_map(|name| Band::from_name(name).ok())
                .collect(),
            None => DEFAULT_AUDIO_BANDS
                .iter()
                .filter_map(|name| Band::from_name(name).ok())
                .collect(),
        }
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Device: {}", self.address());
        log_indented!("Characteristic: {}", self.characteristic());
        log_indented!(
            "Scan timeout: {} seconds",
            self.scan_timeout.unwrap_or(DEFAULT_SCAN_TIMEOUT)
        );
        log_indented!(
            "Minimum write interval: {}ms",
            self.min_write_interval
                .unwrap_or(DEFAULT_MIN_WRITE_INTERVAL)
        );
        log_indented!(
            "Animation: {}ms ticks, speed {} (brightness {})",
            self.tick_interval.unwrap_or(DEFAULT_TICK_INTERVAL),
            self.anim_speed.unwrap_or(DEFAULT_ANIM_SPEED),
            self.brightness_speed.unwrap_or(DEFAULT_BRIGHTNESS_SPEED)
        );
        log_indented!(
            "Startup brightness: {}%",
            self.default_brightness.unwrap_or(DEFAULT_BRIGHTNESS)
        );

        let bands: Vec<&str> = self.audio_bands().into_iter().map(Band::name).collect();
        log_indented!(
            "Audio: {}-{}% brightness, bands: {}",
            self.audio_min_brightness
                .unwrap_or(DEFAULT_AUDIO_MIN_BRIGHTNESS),
            self.audio_max_brightness
                .unwrap_or(DEFAULT_AUDIO_MAX_BRIGHTNESS),
            if bands.is_empty() {
                "none".to_string()
            } else {
                bands.join(", ")
            }
        );
    }
}
