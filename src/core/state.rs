//! Shared target and display color state.
//!
//! The target holds what the producers (interactive controller, screen sampler,
//! audio sampler, one-shot commands) currently ask for. The display holds what
//! the animator last rendered and handed to the transport. Producers only ever
//! touch the target through the `request_*` setters. The display is written
//! exclusively by [`crate::core::animator::Animator`].
//!
//! A single mutex guards both records, so every setter is atomic and two
//! producers writing different fields in the same instant both take effect.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::color::{ColorParseError, Rgb, hsv_white_to_rgb, scale_by_brightness, wrap_unit};
use crate::common::constants::{MAXIMUM_BRIGHTNESS, MINIMUM_BRIGHTNESS};

/// One color in hue/saturation/white-mix/brightness form.
///
/// Used both for the target and for the display snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorIntent {
    /// Hue on the unit circle, `[0, 1)`
    pub hue: f32,
    /// `[0, 1]`
    pub saturation: f32,
    /// Blend toward white, `[0, 1]`
    pub white_mix: f32,
    /// Percentage, `[0, 100]`
    pub brightness: f32,
}

impl ColorIntent {
    pub fn new(hue: f32, saturation: f32, white_mix: f32, brightness: f32) -> Self {
        Self {
            hue: wrap_unit(hue),
            saturation: saturation.clamp(0.0, 1.0),
            white_mix: white_mix.clamp(0.0, 1.0),
            brightness: brightness.clamp(MINIMUM_BRIGHTNESS, MAXIMUM_BRIGHTNESS),
        }
    }

    /// Unscaled color (brightness not applied).
    pub fn base_rgb(&self) -> Rgb {
        hsv_white_to_rgb(self.hue, self.saturation, self.white_mix)
    }

    /// Color as transmitted: white-mixed and brightness-scaled.
    pub fn to_rgb(&self) -> Rgb {
        scale_by_brightness(self.base_rgb(), self.brightness)
    }
}

impl Default for ColorIntent {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, MAXIMUM_BRIGHTNESS)
    }
}

#[derive(Debug)]
struct Inner {
    target: ColorIntent,
    display: ColorIntent,
    color_generation: u64,
}

/// Target/display record shared between producers and the animator.
#[derive(Debug)]
pub struct ColorState {
    inner: Mutex<Inner>,
}

impl ColorState {
    /// Create a state whose target and display both start at `initial`.
    pub fn new(initial: ColorIntent) -> Self {
        Self {
            inner: Mutex::new(Inner {
                target: initial,
                display: initial,
                color_generation: 0,
            }),
        }
    }

    /// Start from black-level defaults at the given brightness.
    pub fn with_brightness(brightness: f32) -> Self {
        Self::new(ColorIntent::new(0.0, 0.0, 0.0, brightness))
    }

    // A producer panicking mid-write cannot leave a field half-written, so a
    // poisoned lock still holds valid data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set target hue (wrapped onto `[0, 1)`) and saturation (clamped).
    ///
    /// Bumps the color generation so caches derived from the target color
    /// (such as the white-mix preview gradient) know to refresh.
    pub fn request_color(&self, hue: f32, saturation: f32) {
        if !hue.is_finite() || !saturation.is_finite() {
            return;
        }
        let mut inner = self.lock();
        inner.target.hue = wrap_unit(hue);
        inner.target.saturation = saturation.clamp(0.0, 1.0);
        inner.color_generation = inner.color_generation.wrapping_add(1);
    }

    /// Set target brightness, clamped to `[0, 100]`.
    pub fn request_brightness(&self, brightness: f32) {
        if !brightness.is_finite() {
            return;
        }
        self.lock().target.brightness = brightness.clamp(MINIMUM_BRIGHTNESS, MAXIMUM_BRIGHTNESS);
    }

    /// Set target white-mix, clamped to `[0, 1]`.
    pub fn request_white_mix(&self, white_mix: f32) {
        if !white_mix.is_finite() {
            return;
        }
        self.lock().target.white_mix = white_mix.clamp(0.0, 1.0);
    }

    /// Parse a hex color and make its hue/saturation the target.
    ///
    /// Malformed input leaves the target untouched.
    pub fn request_hex(&self, hex: &str) -> Result<Rgb, ColorParseError> {
        let rgb = Rgb::from_hex(hex)?;
        let (hue, saturation) = rgb.hue_sat();
        self.request_color(hue, saturation);
        Ok(rgb)
    }

    pub fn target(&self) -> ColorIntent {
        self.lock().target
    }

    pub fn display(&self) -> ColorIntent {
        self.lock().display
    }

    /// Target and display read under one lock.
    pub fn snapshot(&self) -> (ColorIntent, ColorIntent) {
        let inner = self.lock();
        (inner.target, inner.display)
    }

    pub fn color_generation(&self) -> u64 {
        self.lock().color_generation
    }

    // Only the animator commits display values
    pub(crate) fn commit_display(&self, display: ColorIntent) {
        self.lock().display = display;
    }
}

impl Default for ColorState {
    fn default() -> Self {
        Self::new(ColorIntent::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_request_color_wraps_and_clamps() {
        let state = ColorState::default();
        state.request_color(1.25, 3.0);
        let target = state.target();
        assert!((target.hue - 0.25).abs() < 1e-6);
        assert_eq!(target.saturation, 1.0);

        state.request_color(-0.25, -1.0);
        let target = state.target();
        assert!((target.hue - 0.75).abs() < 1e-6);
        assert_eq!(target.saturation, 0.0);
    }

    #[test]
    fn test_request_brightness_and_white_clamp() {
        let state = ColorState::default();
        state.request_brightness(140.0);
        state.request_white_mix(-0.5);
        assert_eq!(state.target().brightness, 100.0);
        assert_eq!(state.target().white_mix, 0.0);

        state.request_brightness(-3.0);
        state.request_white_mix(7.0);
        assert_eq!(state.target().brightness, 0.0);
        assert_eq!(state.target().white_mix, 1.0);
    }

    #[test]
    fn test_non_finite_requests_are_ignored() {
        let state = ColorState::default();
        state.request_color(0.3, 0.4);
        state.request_color(f32::NAN, 0.9);
        state.request_brightness(f32::INFINITY);
        state.request_white_mix(f32::NAN);

        let target = state.target();
        assert!((target.hue - 0.3).abs() < 1e-6);
        assert!((target.saturation - 0.4).abs() < 1e-6);
        assert_eq!(target.brightness, 100.0);
        assert_eq!(target.white_mix, 0.0);
    }

    #[test]
    fn test_requests_do_not_touch_display() {
        let state = ColorState::with_brightness(60.0);
        let before = state.display();
        state.request_color(0.5, 1.0);
        state.request_brightness(10.0);
        state.request_white_mix(0.4);
        assert_eq!(state.display(), before);
    }

    #[test]
    fn test_color_generation_bumps_only_on_color_requests() {
        let state = ColorState::default();
        assert_eq!(state.color_generation(), 0);
        state.request_color(0.1, 0.5);
        state.request_brightness(50.0);
        state.request_white_mix(0.5);
        assert_eq!(state.color_generation(), 1);
        state.request_color(0.1, 0.5);
        assert_eq!(state.color_generation(), 2);
    }

    #[test]
    fn test_request_hex_rejects_without_partial_update() {
        let state = ColorState::default();
        state.request_color(0.6, 0.7);
        let before = state.target();
        let generation = state.color_generation();

        assert!(state.request_hex("12345").is_err());
        assert!(state.request_hex("zz0000").is_err());
        assert_eq!(state.target(), before);
        assert_eq!(state.color_generation(), generation);

        assert_eq!(state.request_hex("#0000FF"), Ok(Rgb::new(0, 0, 255)));
        assert!((state.target().hue - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_concurrent_producers_on_different_fields_both_apply() {
        let state = Arc::new(ColorState::default());
        let a = Arc::clone(&state);
        let b = Arc::clone(&state);

        let color = thread::spawn(move || {
            for _ in 0..1000 {
                a.request_color(0.5, 0.5);
            }
        });
        let brightness = thread::spawn(move || {
            for _ in 0..1000 {
                b.request_brightness(42.0);
            }
        });
        color.join().unwrap();
        brightness.join().unwrap();

        let target = state.target();
        assert_eq!(target.hue, 0.5);
        assert_eq!(target.brightness, 42.0);
    }

    #[test]
    fn test_intent_to_rgb() {
        let red = ColorIntent::new(0.0, 1.0, 0.0, 100.0);
        assert_eq!(red.to_rgb(), Rgb::new(255, 0, 0));
        let dark = ColorIntent::new(0.0, 1.0, 0.0, 0.0);
        assert_eq!(dark.to_rgb(), Rgb::new(0, 0, 0));
    }
}
