//! Fixed-period animation tick.
//!
//! Every tick moves the display a fixed fraction of the remaining distance to
//! the target and hands the resulting color to the transport. Ticks never
//! skip the send when nothing moved: the transport's rate guard decides what
//! actually reaches the link, and a frame dropped while the worker was busy is
//! simply offered again on the next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::color::{Rgb, hue_distance, lerp, lerp_hue};
use crate::common::constants::*;
use crate::config::Config;
use crate::core::state::{ColorIntent, ColorState};
use crate::device::transport::{DeviceTransport, SendOutcome};

/// Tick period and interpolation speeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSettings {
    pub tick_interval: Duration,
    /// Fraction of the remaining distance covered per tick for hue,
    /// saturation and white-mix
    pub anim_speed: f32,
    /// Same for brightness
    pub brightness_speed: f32,
}

impl AnimationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: Duration::from_millis(
                config.tick_interval.unwrap_or(DEFAULT_TICK_INTERVAL),
            ),
            anim_speed: config.anim_speed.unwrap_or(DEFAULT_ANIM_SPEED),
            brightness_speed: config.brightness_speed.unwrap_or(DEFAULT_BRIGHTNESS_SPEED),
        }
    }
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL),
            anim_speed: DEFAULT_ANIM_SPEED,
            brightness_speed: DEFAULT_BRIGHTNESS_SPEED,
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Display committed by this tick
    pub display: ColorIntent,
    /// Brightness-scaled color handed to the transport
    pub rgb: Rgb,
    /// Whether any field moved by more than [`CHANGE_EPSILON`]
    pub changed: bool,
    pub outcome: SendOutcome,
}

/// Advance `display` one step toward `target`.
///
/// Returns the new display and whether any field moved by more than
/// [`CHANGE_EPSILON`] (hue measured around the circle).
pub fn step_toward(
    display: ColorIntent,
    target: ColorIntent,
    anim_speed: f32,
    brightness_speed: f32,
) -> (ColorIntent, bool) {
    let next = ColorIntent {
        hue: settle_hue(lerp_hue(display.hue, target.hue, anim_speed), target.hue),
        saturation: settle(
            lerp(display.saturation, target.saturation, anim_speed),
            target.saturation,
            1.0,
        ),
        white_mix: settle(
            lerp(display.white_mix, target.white_mix, anim_speed),
            target.white_mix,
            1.0,
        ),
        brightness: settle(
            lerp(display.brightness, target.brightness, brightness_speed),
            target.brightness,
            MAXIMUM_BRIGHTNESS,
        ),
    };

    let changed = hue_distance(next.hue, display.hue) > CHANGE_EPSILON
        || (next.saturation - display.saturation).abs() > CHANGE_EPSILON
        || (next.white_mix - display.white_mix).abs() > CHANGE_EPSILON
        || (next.brightness - display.brightness).abs() > CHANGE_EPSILON;

    (next, changed)
}

/// Land on `target` once within [`CHANGE_EPSILON`].
///
/// Near the target the fractional step drops below one f32 ulp and the value
/// would stall just short of it, which truncates 255 to 254 on the wire.
/// `scale` maps the field onto `[0, 1]`.
fn settle(next: f32, target: f32, scale: f32) -> f32 {
    if ((target - next) / scale).abs() <= CHANGE_EPSILON {
        target
    } else {
        next
    }
}

fn settle_hue(next: f32, target: f32) -> f32 {
    if hue_distance(next, target) <= CHANGE_EPSILON {
        target
    } else {
        next
    }
}

/// Whether `display` is within `epsilon` of `target` on every field.
///
/// Brightness is compared on a `[0, 1]` scale so one epsilon fits all fields.
pub fn is_converged(display: &ColorIntent, target: &ColorIntent, epsilon: f32) -> bool {
    hue_distance(display.hue, target.hue) <= epsilon
        && (display.saturation - target.saturation).abs() <= epsilon
        && (display.white_mix - target.white_mix).abs() <= epsilon
        && ((display.brightness - target.brightness) / MAXIMUM_BRIGHTNESS).abs() <= epsilon
}

/// Sole writer of the display state and sole user of the transport.
pub struct Animator {
    state: Arc<ColorState>,
    transport: DeviceTransport,
    settings: AnimationSettings,
    debug_enabled: bool,
}

impl Animator {
    pub fn new(
        state: Arc<ColorState>,
        transport: DeviceTransport,
        settings: AnimationSettings,
        debug_enabled: bool,
    ) -> Self {
        Self {
            state,
            transport,
            settings,
            debug_enabled,
        }
    }

    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    pub fn transport(&self) -> &DeviceTransport {
        &self.transport
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// Run one tick with an explicit clock reading for the transport guards.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let (target, display) = self.state.snapshot();
        let (next, changed) = step_toward(
            display,
            target,
            self.settings.anim_speed,
            self.settings.brightness_speed,
        );
        self.state.commit_display(next);

        let rgb = next.to_rgb();
        let outcome = self.transport.send_at(rgb, now);

        TickReport {
            display: next,
            rgb,
            changed,
            outcome,
        }
    }

    /// Whether the display has caught up with the current target.
    pub fn converged(&self, epsilon: f32) -> bool {
        let (target, display) = self.state.snapshot();
        is_converged(&display, &target, epsilon)
    }

    /// Tick at a fixed period until `running` clears.
    ///
    /// A missed deadline reschedules from now instead of bursting to catch up.
    pub fn run(&mut self, running: &AtomicBool) {
        let period = self.settings.tick_interval;
        if self.debug_enabled {
            log_debug!(
                "Animator running every {}ms (speed {}, brightness speed {})",
                period.as_millis(),
                self.settings.anim_speed,
                self.settings.brightness_speed
            );
        }

        let mut next_deadline = Instant::now();
        while running.load(Ordering::SeqCst) {
            let report = self.tick();
            if self.debug_enabled && report.changed {
                log_debug!(
                    "Display {} ({:?})",
                    report.rgb,
                    report.outcome
                );
            }

            next_deadline += period;
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            } else {
                next_deadline = now;
            }
        }

        if self.debug_enabled {
            log_debug!("Animator stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Frame;
    use std::sync::mpsc::{Receiver, sync_channel};

    fn animator_with_receiver(
        initial: ColorIntent,
        settings: AnimationSettings,
    ) -> (Animator, Arc<ColorState>, Receiver<Frame>) {
        let state = Arc::new(ColorState::new(initial));
        let (sender, receiver) = sync_channel(1024);
        let transport = DeviceTransport::new(
            sender,
            Arc::new(AtomicBool::new(true)),
            Duration::from_millis(DEFAULT_MIN_WRITE_INTERVAL),
        );
        let animator = Animator::new(Arc::clone(&state), transport, settings, false);
        (animator, state, receiver)
    }

    /// Tick `n` times, spacing ticks by the tick interval.
    fn run_ticks(animator: &mut Animator, start: Instant, n: u32) -> Vec<TickReport> {
        let period = animator.settings().tick_interval;
        (0..n).map(|i| animator.tick_at(start + period * i)).collect()
    }

    #[test]
    fn test_step_moves_fixed_fraction() {
        let display = ColorIntent::new(0.0, 0.0, 0.0, 100.0);
        let target = ColorIntent::new(0.0, 1.0, 0.5, 0.0);
        let (next, changed) = step_toward(display, target, 0.2, 0.5);
        assert!(changed);
        assert!((next.saturation - 0.2).abs() < 1e-6);
        assert!((next.white_mix - 0.1).abs() < 1e-6);
        assert!((next.brightness - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_step_takes_short_way_around_the_wheel() {
        let display = ColorIntent::new(0.95, 1.0, 0.0, 100.0);
        let target = ColorIntent::new(0.05, 1.0, 0.0, 100.0);
        let (next, _) = step_toward(display, target, 0.5, 0.2);
        assert!(next.hue < 0.01 || next.hue > 0.99, "hue went the long way: {}", next.hue);
    }

    #[test]
    fn test_tick_at_target_reports_unchanged_but_still_sends() {
        let initial = ColorIntent::new(0.0, 1.0, 0.0, 100.0);
        let (mut animator, _state, receiver) =
            animator_with_receiver(initial, AnimationSettings::default());

        let report = animator.tick_at(Instant::now());
        assert!(!report.changed);
        assert_eq!(report.outcome, SendOutcome::Sent);
        assert_eq!(report.rgb, Rgb::new(255, 0, 0));
        assert_eq!(receiver.try_iter().count(), 1);
    }

    #[test]
    fn test_red_at_full_brightness_converges_to_red_frame() {
        let (mut animator, state, receiver) =
            animator_with_receiver(ColorIntent::default(), AnimationSettings::default());
        state.request_color(0.0, 1.0);
        state.request_white_mix(0.0);
        state.request_brightness(100.0);

        let reports = run_ticks(&mut animator, Instant::now(), 60);
        assert!(animator.converged(CONVERGENCE_EPSILON));

        let last = reports.last().unwrap();
        assert_eq!(last.outcome, SendOutcome::Sent);
        let frames: Vec<Frame> = receiver.try_iter().collect();
        assert_eq!(frames.last().unwrap().hex(), "7E000503FF000000EF");
    }

    #[test]
    fn test_settle_lands_exactly_on_target() {
        let display = ColorIntent::new(0.0, 1.0, 1.0 - 6e-8, 100.0 - 8e-6);
        let target = ColorIntent::new(0.0, 1.0, 1.0, 100.0);
        let (next, changed) = step_toward(display, target, 0.2, 0.2);
        assert!(!changed);
        assert_eq!(next.white_mix, 1.0);
        assert_eq!(next.brightness, 100.0);
    }

    #[test]
    fn test_fade_up_from_dark_reaches_full_channels() {
        let initial = ColorIntent::new(0.0, 0.0, 0.0, 0.0);
        let (mut animator, state, receiver) =
            animator_with_receiver(initial, AnimationSettings::default());
        state.request_brightness(100.0);

        run_ticks(&mut animator, Instant::now(), 200);
        assert_eq!(state.display().brightness, 100.0);
        let last = receiver.try_iter().last().unwrap();
        assert_eq!(last.hex(), "7E000503FFFFFF00EF");
    }

    #[test]
    fn test_red_from_dim_pastel_reaches_full_red_frame() {
        let initial = ColorIntent::new(0.5, 0.3, 0.4, 50.0);
        let (mut animator, state, receiver) =
            animator_with_receiver(initial, AnimationSettings::default());
        state.request_color(0.0, 1.0);
        state.request_brightness(100.0);
        state.request_white_mix(0.0);

        run_ticks(&mut animator, Instant::now(), 200);
        assert_eq!(state.display(), state.target());
        let last = receiver.try_iter().last().unwrap();
        assert_eq!(last.hex(), "7E000503FF000000EF");
    }

    #[test]
    fn test_white_mix_fade_reaches_full_white() {
        let initial = ColorIntent::new(0.0, 1.0, 0.0, 60.0);
        let (mut animator, state, receiver) =
            animator_with_receiver(initial, AnimationSettings::default());
        state.request_white_mix(1.0);
        state.request_brightness(100.0);

        run_ticks(&mut animator, Instant::now(), 200);
        assert_eq!(state.display().white_mix, 1.0);
        let last = receiver.try_iter().last().unwrap();
        assert_eq!(last.rgb(), Some(Rgb::new(255, 255, 255)));
    }

    #[test]
    fn test_zero_brightness_converges_to_black_payload() {
        let initial = ColorIntent::new(0.4, 0.8, 0.2, 100.0);
        let (mut animator, state, receiver) =
            animator_with_receiver(initial, AnimationSettings::default());
        state.request_brightness(0.0);

        run_ticks(&mut animator, Instant::now(), 60);
        assert!(animator.converged(CONVERGENCE_EPSILON));

        let last = receiver.try_iter().last().unwrap();
        assert_eq!(last.rgb(), Some(Rgb::new(0, 0, 0)));
    }

    #[test]
    fn test_brightness_uses_its_own_speed() {
        let settings = AnimationSettings {
            anim_speed: 0.1,
            brightness_speed: 1.0,
            ..AnimationSettings::default()
        };
        let (mut animator, state, _receiver) =
            animator_with_receiver(ColorIntent::default(), settings);
        state.request_brightness(30.0);
        state.request_color(0.5, 1.0);

        let report = animator.tick_at(Instant::now());
        assert_eq!(report.display.brightness, 30.0);
        assert!((report.display.saturation - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_display_is_committed_each_tick() {
        let (mut animator, state, _receiver) =
            animator_with_receiver(ColorIntent::default(), AnimationSettings::default());
        state.request_white_mix(1.0);
        let report = animator.tick_at(Instant::now());
        assert_eq!(state.display(), report.display);
        assert!((state.display().white_mix - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_converged_compares_brightness_on_unit_scale() {
        let a = ColorIntent::new(0.5, 0.5, 0.5, 50.0);
        let b = ColorIntent::new(0.5, 0.5, 0.5, 50.05);
        assert!(is_converged(&a, &b, 1e-3));
        let c = ColorIntent::new(0.5, 0.5, 0.5, 50.5);
        assert!(!is_converged(&a, &c, 1e-3));
    }

    #[test]
    fn test_converged_across_hue_seam() {
        let a = ColorIntent::new(0.9995, 1.0, 0.0, 100.0);
        let b = ColorIntent::new(0.0, 1.0, 0.0, 100.0);
        assert!(is_converged(&a, &b, 1e-3));
    }

    #[test]
    fn test_run_stops_when_flag_clears() {
        let settings = AnimationSettings {
            tick_interval: Duration::from_millis(1),
            ..AnimationSettings::default()
        };
        let (mut animator, state, receiver) =
            animator_with_receiver(ColorIntent::default(), settings);
        state.request_color(0.3, 1.0);

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            animator.run(&flag);
            animator
        });

        thread::sleep(Duration::from_millis(30));
        running.store(false, Ordering::SeqCst);
        let animator = handle.join().unwrap();

        assert!(state.display().saturation > 0.0);
        assert!(receiver.try_iter().count() >= 1);
        drop(animator);
    }
}
