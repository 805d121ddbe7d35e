//! Default config file creation.
//!
//! The file is assembled with a small builder so every setting carries an
//! aligned explanatory comment.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::common::constants::*;

/// Write a commented default configuration to `path`.
///
/// Parent directories are created as needed.
pub fn create_default_config(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let bands = DEFAULT_AUDIO_BANDS
        .iter()
        .map(|b| format!("\"{b}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let config_content = ConfigBuilder::new()
        .add_section("Device")
        .add_setting(
            "address",
            &format!("\"{DEFAULT_ADDRESS}\""),
            "BLE address of the strip (XX:XX:XX:XX:XX:XX)",
        )
        .add_setting(
            "characteristic",
            &format!("\"{DEFAULT_CHARACTERISTIC}\""),
            "Characteristic UUID written without response",
        )
        .add_setting(
            "scan_timeout",
            &DEFAULT_SCAN_TIMEOUT.to_string(),
            &format!(
                "Seconds to scan for the strip ({MINIMUM_SCAN_TIMEOUT}-{MAXIMUM_SCAN_TIMEOUT})"
            ),
        )
        .add_setting(
            "min_write_interval",
            &DEFAULT_MIN_WRITE_INTERVAL.to_string(),
            &format!(
                "Minimum time between device writes ({MINIMUM_WRITE_INTERVAL}-{MAXIMUM_WRITE_INTERVAL})ms"
            ),
        )
        .add_section("Animation")
        .add_setting(
            "tick_interval",
            &DEFAULT_TICK_INTERVAL.to_string(),
            &format!(
                "Animation tick period ({MINIMUM_TICK_INTERVAL}-{MAXIMUM_TICK_INTERVAL})ms"
            ),
        )
        .add_setting(
            "anim_speed",
            &DEFAULT_ANIM_SPEED.to_string(),
            "Fraction of remaining color distance covered per tick (0-1]",
        )
        .add_setting(
            "brightness_speed",
            &DEFAULT_BRIGHTNESS_SPEED.to_string(),
            "Fraction of remaining brightness distance covered per tick (0-1]",
        )
        .add_setting(
            "default_brightness",
            &DEFAULT_BRIGHTNESS.to_string(),
            &format!("Brightness at startup ({MINIMUM_BRIGHTNESS}-{MAXIMUM_BRIGHTNESS})"),
        )
        .add_section("Screen")
        .add_setting(
            "screen_interval",
            &DEFAULT_SCREEN_INTERVAL.to_string(),
            &format!(
                "Screen poll interval ({MINIMUM_SAMPLER_INTERVAL}-{MAXIMUM_SAMPLER_INTERVAL})ms"
            ),
        )
        .add_setting(
            "screen_min_brightness",
            &DEFAULT_SCREEN_MIN_BRIGHTNESS.to_string(),
            "Brightness floor when the screen drives brightness (0-100)",
        )
        .add_section("Audio")
        .add_setting(
            "audio_interval",
            &DEFAULT_AUDIO_INTERVAL.to_string(),
            &format!(
                "Microphone poll interval ({MINIMUM_SAMPLER_INTERVAL}-{MAXIMUM_SAMPLER_INTERVAL})ms"
            ),
        )
        .add_setting(
            "audio_speed",
            &DEFAULT_AUDIO_SPEED.to_string(),
            "Smoothing of the audio-driven brightness (0-1]",
        )
        .add_setting(
            "audio_min_brightness",
            &DEFAULT_AUDIO_MIN_BRIGHTNESS.to_string(),
            "Brightness during silence (0-100)",
        )
        .add_setting(
            "audio_max_brightness",
            &DEFAULT_AUDIO_MAX_BRIGHTNESS.to_string(),
            "Brightness on the strongest beats (0-100)",
        )
        .add_setting(
            "spike_threshold",
            &DEFAULT_SPIKE_THRESHOLD.to_string(),
            "Energy above the running mean counted as a beat",
        )
        .add_setting(
            "history_len",
            &DEFAULT_HISTORY_LEN.to_string(),
            &format!("Polls in the running mean ({MINIMUM_HISTORY_LEN}-{MAXIMUM_HISTORY_LEN})"),
        )
        .add_setting(
            "audio_bands",
            &format!("[{bands}]"),
            "Bands feeding the beat detector: \"bass\", \"mid\", \"high\"",
        )
        .build();

    fs::write(path, config_content)
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;

    Ok(())
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // Align every comment one space past the longest setting line
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                ConfigEntry::Section(header) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(header);
                    first_section = false;
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.push(String::new());
        result.join("\n")
    }
}
