//! Set command: fade the strip to a color and exit.
//!
//! `stripctl set <RRGGBB> [--brightness N] [--white W]`. Everything is
//! validated before the link is opened, so a typo never touches the strip.

use anyhow::{Context, Result, bail};

use crate::{
    args::GlobalOptions,
    color::Rgb,
    common::constants::*,
    core::state::ColorState,
};

/// A validated `set` request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetRequest {
    pub rgb: Rgb,
    pub brightness: Option<f32>,
    pub white_mix: Option<f32>,
}

impl SetRequest {
    pub fn parse(color: &str, brightness: Option<f32>, white_mix: Option<f32>) -> Result<Self> {
        let rgb = Rgb::from_hex(color).with_context(|| format!("Invalid color '{color}'"))?;

        if let Some(value) = brightness
            && !(MINIMUM_BRIGHTNESS..=MAXIMUM_BRIGHTNESS).contains(&value)
        {
            bail!(
                "Brightness ({value}) must be between {MINIMUM_BRIGHTNESS} and {MAXIMUM_BRIGHTNESS}"
            );
        }

        if let Some(value) = white_mix
            && !(0.0..=1.0).contains(&value)
        {
            bail!("White mix ({value}) must be between 0.0 and 1.0");
        }

        Ok(Self {
            rgb,
            brightness,
            white_mix,
        })
    }

    /// Set the targets this request describes.
    pub fn apply(&self, state: &ColorState) {
        let (hue, saturation) = self.rgb.hue_sat();
        state.request_color(hue, saturation);
        if let Some(white_mix) = self.white_mix {
            state.request_white_mix(white_mix);
        }
        if let Some(brightness) = self.brightness {
            state.request_brightness(brightness);
        }
    }
}

/// Handle the set command.
pub fn handle_set_command(
    options: &GlobalOptions,
    color: &str,
    brightness: Option<f32>,
    white_mix: Option<f32>,
) -> Result<()> {
    let request = SetRequest::parse(color, brightness, white_mix)?;

    let mut summary = format!("Setting color {}", request.rgb);
    if let Some(value) = request.brightness {
        summary.push_str(&format!(" at {value}%"));
    }
    if let Some(value) = request.white_mix {
        summary.push_str(&format!(", white mix {value}"));
    }

    super::run_animated_command(options, &summary, super::default_intent, |state| {
        request.apply(state);
        Ok(())
    })
}

/// Display help for the set command
pub fn display_help() {
    log_version!();
    log_block_start!("set - Fade the strip to a color and exit");
    log_block_start!("Usage: stripctl set <RRGGBB> [OPTIONS]");
    log_block_start!("Arguments:");
    log_indented!("RRGGBB                 Hex color, with or without a leading '#'");
    log_block_start!("Options:");
    log_indented!("-b, --brightness <N>   Brightness in percent (0-100)");
    log_indented!("-w, --white <W>        Blend toward white (0.0-1.0)");
    log_block_start!("Examples:");
    log_indented!("stripctl set FFA500");
    log_indented!("stripctl set '#00FF7F' --brightness 40 --white 0.2");
    log_end!();
}
