//! Core application logic and thread orchestration.
//!
//! [`Core`] owns a running session: it builds the link, spawns the link
//! worker, the animator and the samplers, hands the main thread to the
//! interactive controller and tears everything down again once `running`
//! clears. [`run_one_shot`] is the short-lived variant used by the `set`,
//! `on` and `off` commands.

pub mod animator;
pub mod state;

use anyhow::{Context, Result, bail};
use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{
    common::{constants::*, logger::Log, utils},
    config::{self, Config},
    device::{
        Link,
        dry_run::DryRunLink,
        transport::{SendOutcome, spawn_link_worker},
    },
    io::{lock::LockFile, signals::SignalState},
    sampler::{self, SmartModes, audio::AudioSettings, screen::ScreenSettings},
    ui::Controller,
};

use animator::{AnimationSettings, Animator};
use state::{ColorIntent, ColorState};

/// Parameters for creating a Core instance.
pub(crate) struct CoreParams {
    pub config: Config,
    pub signal_state: SignalState,
    pub debug_enabled: bool,
    pub dry_run: bool,
    pub lock_file: LockFile,
}

/// A running interactive session.
pub(crate) struct Core {
    config: Config,
    signal_state: SignalState,
    debug_enabled: bool,
    dry_run: bool,
    lock_file: LockFile,
    state: Arc<ColorState>,
    modes: Arc<SmartModes>,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        let brightness = params
            .config
            .default_brightness
            .unwrap_or(DEFAULT_BRIGHTNESS);
        let modes = SmartModes::new(&params.config.audio_bands());

        Self {
            config: params.config,
            signal_state: params.signal_state,
            debug_enabled: params.debug_enabled,
            dry_run: params.dry_run,
            lock_file: params.lock_file,
            state: Arc::new(ColorState::with_brightness(brightness)),
            modes: Arc::new(modes),
        }
    }

    /// Run the session until a signal or the quit key clears `running`.
    pub fn execute(self) -> Result<()> {
        if let Some(custom_dir) = config::get_custom_config_dir() {
            log_block_start!("Base directory: {}", utils::private_path(&custom_dir));
        }

        let running = Arc::clone(&self.signal_state.running);

        let link = create_link(&self.config, self.dry_run, self.debug_enabled)?;
        let link_name = link.name();
        log_block_start!("Starting {link_name} link to {}", self.config.address());

        let (transport, worker) =
            spawn_link_worker(link, min_write_interval(&self.config), self.debug_enabled)?;
        let link_connected = worker.connection_flag();

        let mut animator = Animator::new(
            Arc::clone(&self.state),
            transport,
            AnimationSettings::from_config(&self.config),
            self.debug_enabled,
        );
        let animator_running = Arc::clone(&running);
        // The animator, and with it the transport, is dropped when the thread
        // ends, which lets the link worker drain and disconnect
        let animator_thread = thread::Builder::new()
            .name("animator".to_string())
            .spawn(move || animator.run(&animator_running))
            .context("failed to spawn animator thread")?;

        let mut samplers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        samplers.push(sampler::screen::spawn(
            Arc::clone(&self.state),
            Arc::clone(&self.modes),
            ScreenSettings::from_config(&self.config),
            Arc::clone(&running),
            self.debug_enabled,
        )?);
        samplers.push(sampler::audio::spawn(
            Arc::clone(&self.state),
            Arc::clone(&self.modes),
            AudioSettings::from_config(&self.config),
            Arc::clone(&running),
            self.debug_enabled,
        )?);

        let result = if std::io::stdout().is_terminal() {
            self.run_controller(link_connected, link_name, &running)
        } else {
            log_block_start!("No terminal attached, running headless until signalled");
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(UI_REDRAW_INTERVAL_MS));
            }
            Ok(())
        };

        // A controller error also ends the session
        running.store(false, Ordering::SeqCst);

        log_block_start!("Shutting down stripctl...");
        for handle in samplers {
            let _ = handle.join();
        }
        if animator_thread.join().is_err() {
            log_pipe!();
            log_error!("Animator thread panicked");
        }
        worker.join();

        if self.debug_enabled {
            let display = self.state.display();
            log_debug!("Final display color {}", display.to_rgb());
        }

        drop(self.lock_file);
        log_end!();
        result
    }

    fn run_controller(
        &self,
        link_connected: Arc<AtomicBool>,
        link_name: &'static str,
        running: &Arc<AtomicBool>,
    ) -> Result<()> {
        // The controller owns the terminal; only file output stays on
        let file_logging = Log::is_file_logging();
        if !file_logging {
            Log::set_enabled(false);
        }

        let result = Controller::new(
            Arc::clone(&self.state),
            Arc::clone(&self.modes),
            Arc::clone(running),
            link_connected,
            link_name,
        )
        .run();

        Log::set_enabled(true);
        result
    }
}

/// Build the link selected by the build features and `--dry-run`.
pub(crate) fn create_link(
    config: &Config,
    dry_run: bool,
    debug_enabled: bool,
) -> Result<Box<dyn Link>> {
    if dry_run {
        return Ok(Box::new(DryRunLink::new(debug_enabled)));
    }
    hardware_link(config, debug_enabled)
}

#[cfg(feature = "ble")]
fn hardware_link(config: &Config, _debug_enabled: bool) -> Result<Box<dyn Link>> {
    let scan_timeout = Duration::from_secs(config.scan_timeout.unwrap_or(DEFAULT_SCAN_TIMEOUT));
    let link = crate::device::ble::BleLink::new(
        config.address(),
        config.characteristic(),
        scan_timeout,
    )?;
    Ok(Box::new(link))
}

#[cfg(not(feature = "ble"))]
fn hardware_link(_config: &Config, debug_enabled: bool) -> Result<Box<dyn Link>> {
    log_pipe!();
    log_warning!("Built without Bluetooth support, frames will only be logged");
    log_indented!("Rebuild with `--features ble` to drive a real strip");
    Ok(Box::new(DryRunLink::new(debug_enabled)))
}

fn min_write_interval(config: &Config) -> Duration {
    Duration::from_millis(
        config
            .min_write_interval
            .unwrap_or(DEFAULT_MIN_WRITE_INTERVAL),
    )
}

/// How a one-shot command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneShotOutcome {
    /// The display reached the target and the final frame went out
    Converged,
    /// The timeout passed first; the last sent frame may lag the target
    TimedOut,
    /// A signal interrupted the animation
    Interrupted,
}

/// Drive `animator` until the display converges and the final frame is sent.
///
/// The loop ticks at the animator's own interval and stops early when
/// `running` clears or `timeout` passes.
pub fn drive_to_target(
    animator: &mut Animator,
    running: &AtomicBool,
    timeout: Duration,
) -> OneShotOutcome {
    let period = animator.settings().tick_interval;
    let deadline = Instant::now() + timeout;

    loop {
        if !running.load(Ordering::SeqCst) {
            return OneShotOutcome::Interrupted;
        }

        let report = animator.tick();
        // Duplicate means the same frame was accepted a moment ago
        if animator.converged(CONVERGENCE_EPSILON)
            && matches!(report.outcome, SendOutcome::Sent | SendOutcome::Duplicate)
        {
            return OneShotOutcome::Converged;
        }

        if Instant::now() >= deadline {
            return OneShotOutcome::TimedOut;
        }
        thread::sleep(period);
    }
}

/// Connect, apply a target change and animate to it, then disconnect.
///
/// The strip cannot report its current color, so the animation starts from
/// `initial`. `apply` sets the targets before anything is sent.
pub fn run_one_shot(
    config: &Config,
    debug_enabled: bool,
    dry_run: bool,
    running: &AtomicBool,
    initial: ColorIntent,
    apply: impl FnOnce(&ColorState) -> Result<()>,
) -> Result<OneShotOutcome> {
    let state = Arc::new(ColorState::new(initial));
    apply(&state)?;

    let link = create_link(config, dry_run, debug_enabled)?;
    animate_once(config, debug_enabled, running, state, link)
}

/// Animate `state` to its target over `link`, then disconnect.
pub(crate) fn animate_once(
    config: &Config,
    debug_enabled: bool,
    running: &AtomicBool,
    state: Arc<ColorState>,
    link: Box<dyn Link>,
) -> Result<OneShotOutcome> {
    let link_name = link.name();
    let (transport, worker) =
        spawn_link_worker(link, min_write_interval(config), debug_enabled)?;

    let scan_timeout = Duration::from_secs(config.scan_timeout.unwrap_or(DEFAULT_SCAN_TIMEOUT));
    if !worker.wait_for_connection(scan_timeout + Duration::from_secs(ONE_SHOT_TIMEOUT_SECS)) {
        drop(transport);
        worker.join();
        bail!("Could not connect to the LED strip through the {link_name} link");
    }

    let mut animator = Animator::new(
        state,
        transport,
        AnimationSettings::from_config(config),
        debug_enabled,
    );
    let outcome = drive_to_target(
        &mut animator,
        running,
        Duration::from_secs(ONE_SHOT_TIMEOUT_SECS),
    );

    // Closing the channel lets the worker flush the last frame and disconnect
    drop(animator);
    worker.join();

    if debug_enabled {
        log_debug!("One-shot finished: {outcome:?}");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::device::transport::DeviceTransport;
    use std::sync::mpsc::sync_channel;

    fn quick_config() -> Config {
        Config {
            tick_interval: Some(1),
            min_write_interval: Some(1),
            anim_speed: Some(0.5),
            brightness_speed: Some(0.5),
            ..Config::default()
        }
    }

    #[test]
    fn test_one_shot_dry_run_converges() {
        let running = AtomicBool::new(true);
        let initial = ColorIntent::default();
        let outcome = run_one_shot(&quick_config(), false, true, &running, initial, |state| {
            state.request_hex("#00FF00")?;
            state.request_brightness(50.0);
            Ok(())
        })
        .unwrap();
        assert_eq!(outcome, OneShotOutcome::Converged);
    }

    /// Link that keeps every color payload it is handed.
    struct CapturingLink {
        frames: Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
        connected: bool,
    }

    impl Link for CapturingLink {
        fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }

        fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
            self.frames.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "capturing"
        }
    }

    #[test]
    fn test_one_shot_on_ends_with_full_white_frame() {
        let frames = Arc::new(std::sync::Mutex::new(Vec::new()));
        let link = CapturingLink {
            frames: Arc::clone(&frames),
            connected: false,
        };

        let state = Arc::new(ColorState::new(ColorIntent::new(0.0, 0.0, 0.0, 0.0)));
        state.request_brightness(100.0);

        let running = AtomicBool::new(true);
        let outcome =
            animate_once(&quick_config(), false, &running, state, Box::new(link)).unwrap();
        assert_eq!(outcome, OneShotOutcome::Converged);

        let frames = frames.lock().unwrap();
        let white = crate::device::Frame::color(Rgb::new(255, 255, 255));
        assert_eq!(frames.last().unwrap().as_slice(), white.as_bytes());
    }

    #[test]
    fn test_one_shot_apply_error_is_propagated() {
        let running = AtomicBool::new(true);
        let initial = ColorIntent::default();
        let result = run_one_shot(&quick_config(), false, true, &running, initial, |state| {
            state.request_hex("nope")?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_drive_to_target_stops_when_interrupted() {
        let state = Arc::new(ColorState::with_brightness(100.0));
        state.request_color(0.5, 1.0);
        let (sender, _receiver) = sync_channel(1);
        let transport = DeviceTransport::new(
            sender,
            Arc::new(AtomicBool::new(true)),
            Duration::from_millis(1),
        );
        let mut animator = Animator::new(state, transport, AnimationSettings::default(), false);

        let running = AtomicBool::new(false);
        let outcome = drive_to_target(&mut animator, &running, Duration::from_secs(1));
        assert_eq!(outcome, OneShotOutcome::Interrupted);
    }

    #[test]
    fn test_drive_to_target_waits_for_final_frame() {
        let state = Arc::new(ColorState::with_brightness(100.0));
        state.request_color(0.0, 1.0);
        let (sender, receiver) = sync_channel(1);
        let transport = DeviceTransport::new(
            sender,
            Arc::new(AtomicBool::new(true)),
            Duration::from_millis(1),
        );
        let settings = AnimationSettings {
            tick_interval: Duration::from_millis(1),
            ..AnimationSettings::default()
        };
        let mut animator = Animator::new(state, transport, settings, false);

        // Drain the channel so the one-slot buffer never reports Busy
        let drain = thread::spawn(move || receiver.iter().last());

        let running = AtomicBool::new(true);
        let outcome = drive_to_target(&mut animator, &running, Duration::from_secs(5));
        assert_eq!(outcome, OneShotOutcome::Converged);

        drop(animator);
        let last = drain.join().unwrap().unwrap();
        assert_eq!(last.rgb(), Some(Rgb::new(255, 0, 0)));
    }
}
