//! `on` and `off`: fade brightness to 100% or 0% and exit.

use anyhow::Result;

use crate::{
    args::GlobalOptions,
    common::constants::{MAXIMUM_BRIGHTNESS, MINIMUM_BRIGHTNESS},
    config::Config,
    core::state::ColorIntent,
};

/// Where the fade starts: black when turning on, the configured brightness
/// when turning off.
pub fn fade_start(config: &Config, on: bool) -> ColorIntent {
    let mut initial = super::default_intent(config);
    if on {
        initial.brightness = MINIMUM_BRIGHTNESS;
    }
    initial
}

pub fn fade_target(on: bool) -> f32 {
    if on {
        MAXIMUM_BRIGHTNESS
    } else {
        MINIMUM_BRIGHTNESS
    }
}

pub fn handle_power_command(options: &GlobalOptions, on: bool) -> Result<()> {
    let summary = if on {
        "Turning the strip on"
    } else {
        "Turning the strip off"
    };

    super::run_animated_command(
        options,
        summary,
        |config| fade_start(config, on),
        |state| {
            state.request_brightness(fade_target(on));
            Ok(())
        },
    )
}

pub fn display_help() {
    log_version!();
    log_block_start!("on / off - Fade the strip to full brightness or to black");
    log_block_start!("Usage: stripctl on | stripctl off");
    log_indented!("The color stays at its startup default; use 'set' to pick one.");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_fades_up_from_black() {
        assert_eq!(fade_start(&Config::default(), true).brightness, 0.0);
        assert_eq!(fade_target(true), 100.0);
    }

    #[test]
    fn test_off_fades_down_from_configured_brightness() {
        let config = Config {
            default_brightness: Some(60.0),
            ..Config::default()
        };
        assert_eq!(fade_start(&config, false).brightness, 60.0);
        assert_eq!(fade_target(false), 0.0);
    }
}
