//! Configuration validation functionality.
//!
//! Range checks for every numeric field plus format checks for the device
//! address and characteristic UUID. Validation runs before any thread starts,
//! so a bad value never reaches the animation loop.

use anyhow::Result;
use uuid::Uuid;

use super::Config;
use crate::common::constants::*;
use crate::sampler::Band;

pub fn validate_config(config: &Config) -> Result<()> {
    // Device
    if let Some(address) = config.address.as_deref()
        && !is_valid_address(address)
    {
        anyhow::bail!("address ({address}) must look like XX:XX:XX:XX:XX:XX (hex digits)");
    }

    if let Some(characteristic) = config.characteristic.as_deref()
        && !is_valid_uuid(characteristic)
    {
        anyhow::bail!(
            "characteristic ({characteristic}) must be a UUID like 0000fff3-0000-1000-8000-00805f9b34fb"
        );
    }

    if let Some(timeout) = config.scan_timeout
        && !(MINIMUM_SCAN_TIMEOUT..=MAXIMUM_SCAN_TIMEOUT).contains(&timeout)
    {
        anyhow::bail!(
            "scan_timeout ({} seconds) must be between {} and {} seconds",
            timeout,
            MINIMUM_SCAN_TIMEOUT,
            MAXIMUM_SCAN_TIMEOUT
        );
    }

    if let Some(interval) = config.min_write_interval
        && !(MINIMUM_WRITE_INTERVAL..=MAXIMUM_WRITE_INTERVAL).contains(&interval)
    {
        anyhow::bail!(
            "min_write_interval ({} ms) must be between {} and {} milliseconds",
            interval,
            MINIMUM_WRITE_INTERVAL,
            MAXIMUM_WRITE_INTERVAL
        );
    }

    // Animation
    if let Some(interval) = config.tick_interval
        && !(MINIMUM_TICK_INTERVAL..=MAXIMUM_TICK_INTERVAL).contains(&interval)
    {
        anyhow::bail!(
            "tick_interval ({} ms) must be between {} and {} milliseconds",
            interval,
            MINIMUM_TICK_INTERVAL,
            MAXIMUM_TICK_INTERVAL
        );
    }

    validate_speed(config.anim_speed, "anim_speed")?;
    validate_speed(config.brightness_speed, "brightness_speed")?;
    validate_brightness(config.default_brightness, "default_brightness")?;

    // Screen
    validate_sampler_interval(config.screen_interval, "screen_interval")?;
    validate_brightness(config.screen_min_brightness, "screen_min_brightness")?;

    // Audio
    validate_sampler_interval(config.audio_interval, "audio_interval")?;
    validate_speed(config.audio_speed, "audio_speed")?;
    validate_brightness(config.audio_min_brightness, "audio_min_brightness")?;
    validate_brightness(config.audio_max_brightness, "audio_max_brightness")?;

    let min = config
        .audio_min_brightness
        .unwrap_or(DEFAULT_AUDIO_MIN_BRIGHTNESS);
    let max = config
        .audio_max_brightness
        .unwrap_or(DEFAULT_AUDIO_MAX_BRIGHTNESS);
    if min > max {
        anyhow::bail!(
            "audio_min_brightness ({min}%) must not exceed audio_max_brightness ({max}%)"
        );
    }

    if let Some(threshold) = config.spike_threshold
        && !(threshold.is_finite() && threshold > 0.0)
    {
        anyhow::bail!("spike_threshold ({threshold}) must be greater than 0");
    }

    if let Some(len) = config.history_len
        && !(MINIMUM_HISTORY_LEN..=MAXIMUM_HISTORY_LEN).contains(&len)
    {
        anyhow::bail!(
            "history_len ({}) must be between {} and {}",
            len,
            MINIMUM_HISTORY_LEN,
            MAXIMUM_HISTORY_LEN
        );
    }

    if let Some(bands) = &config.audio_bands {
        for name in bands {
            Band::from_name(name)?;
        }
    }

    Ok(())
}

fn validate_speed(value: Option<f32>, name: &str) -> Result<()> {
    if let Some(speed) = value
        && !(speed > 0.0 && speed <= 1.0)
    {
        anyhow::bail!("{name} ({speed}) must be greater than 0 and at most 1");
    }
    Ok(())
}

fn validate_brightness(value: Option<f32>, name: &str) -> Result<()> {
    if let Some(brightness) = value
        && !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&brightness)
    {
        anyhow::bail!(
            "{name} ({brightness}%) must be between {MINIMUM_BRIGHTNESS}% and {MAXIMUM_BRIGHTNESS}%"
        );
    }
    Ok(())
}

fn validate_sampler_interval(value: Option<u64>, name: &str) -> Result<()> {
    if let Some(interval) = value
        && !(MINIMUM_SAMPLER_INTERVAL..=MAXIMUM_SAMPLER_INTERVAL).contains(&interval)
    {
        anyhow::bail!(
            "{name} ({interval} ms) must be between {MINIMUM_SAMPLER_INTERVAL} and {MAXIMUM_SAMPLER_INTERVAL} milliseconds"
        );
    }
    Ok(())
}

/// Six colon-separated pairs of hex digits.
pub fn is_valid_address(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Any form the BLE link itself accepts for the characteristic.
pub fn is_valid_uuid(uuid: &str) -> bool {
    Uuid::parse_str(uuid).is_ok()
}
