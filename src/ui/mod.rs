//! Interactive terminal controller.
//!
//! A crossterm raw-mode screen that shows the displayed color, a small hue /
//! saturation wheel, the white-mix gradient and the smart-mode toggles. Keys
//! map to the same `request_*` setters every other producer uses; the
//! controller never touches the display state or the device.
//!
//! Keys:
//! - `1`-`9`, `0`, `a`-`g`: presets
//! - arrows: move the wheel cursor
//! - `[` / `]`: white-mix down / up
//! - `-` / `+`: brightness down / up
//! - `o` / `O`: on (100%) / off (0%)
//! - `#`: type a hex color, Enter applies it
//! - `s`: screen mode, `S`: screen brightness, `m`: audio mode
//! - `B` / `M` / `H`: toggle the bass / mid / high bands
//! - `q`, Esc, Ctrl+C: quit

use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::io::{Write, stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::color::{PRESETS, Rgb, hsv_white_to_rgb, wheel_pick};
use crate::common::constants::*;
use crate::common::utils::TerminalGuard;
use crate::core::state::ColorState;
use crate::sampler::{Band, SmartModes};

/// Preset key labels in palette order.
const PRESET_KEYS: [char; 17] = [
    '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
];

const HEX_ENTRY_MAX: usize = 7;

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Preset(usize),
    MoveCursor(i32, i32),
    AdjustWhiteMix(f32),
    AdjustBrightness(f32),
    SetBrightness(f32),
    BeginHexEntry,
    ToggleScreen,
    ToggleScreenBrightness,
    ToggleAudio,
    ToggleBand(Band),
    Quit,
}

/// Map a key outside hex entry to an action.
pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')).then_some(Action::Quit);
    }

    let action = match key.code {
        KeyCode::Esc => Action::Quit,
        KeyCode::Up => Action::MoveCursor(0, -1),
        KeyCode::Down => Action::MoveCursor(0, 1),
        KeyCode::Left => Action::MoveCursor(-1, 0),
        KeyCode::Right => Action::MoveCursor(1, 0),
        KeyCode::Char(c) => match c {
            'q' => Action::Quit,
            '[' => Action::AdjustWhiteMix(-UI_WHITE_STEP),
            ']' => Action::AdjustWhiteMix(UI_WHITE_STEP),
            '-' => Action::AdjustBrightness(-UI_BRIGHTNESS_STEP),
            '+' | '=' => Action::AdjustBrightness(UI_BRIGHTNESS_STEP),
            'o' => Action::SetBrightness(MAXIMUM_BRIGHTNESS),
            'O' => Action::SetBrightness(MINIMUM_BRIGHTNESS),
            '#' => Action::BeginHexEntry,
            's' => Action::ToggleScreen,
            'S' => Action::ToggleScreenBrightness,
            'm' => Action::ToggleAudio,
            'B' => Action::ToggleBand(Band::Bass),
            'M' => Action::ToggleBand(Band::Mid),
            'H' => Action::ToggleBand(Band::High),
            other => Action::Preset(PRESET_KEYS.iter().position(|k| *k == other)?),
        },
        _ => return None,
    };
    Some(action)
}

/// `HEX: #RRGGBB | RGB: (r,g,b)`
pub fn readout(rgb: Rgb) -> String {
    format!("HEX: {rgb} | RGB: ({},{},{})", rgb.r, rgb.g, rgb.b)
}

/// Base color blended from pure hue/saturation (left) to white (right).
pub fn white_gradient(hue: f32, saturation: f32, width: usize) -> Vec<Rgb> {
    (0..width)
        .map(|i| hsv_white_to_rgb(hue, saturation, i as f32 / width as f32))
        .collect()
}

/// White-mix gradient, rebuilt only when the target color changes.
#[derive(Debug, Default)]
pub struct GradientCache {
    generation: Option<u64>,
    cells: Vec<Rgb>,
    rebuilds: u64,
}

impl GradientCache {
    /// Bring the cached gradient up to date with `state`.
    pub fn refresh(&mut self, state: &ColorState, width: usize) -> &[Rgb] {
        // Generation first: a color request racing with this read only
        // makes the next refresh rebuild again
        let generation = state.color_generation();
        if self.generation != Some(generation) || self.cells.len() != width {
            let target = state.target();
            self.cells = white_gradient(target.hue, target.saturation, width);
            self.generation = Some(generation);
            self.rebuilds += 1;
        }
        &self.cells
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

pub struct Controller {
    state: Arc<ColorState>,
    modes: Arc<SmartModes>,
    running: Arc<AtomicBool>,
    link_connected: Arc<AtomicBool>,
    link_name: &'static str,
    cursor: (i32, i32),
    hex_entry: Option<String>,
    status: String,
    gradient: GradientCache,
}

impl Controller {
    pub fn new(
        state: Arc<ColorState>,
        modes: Arc<SmartModes>,
        running: Arc<AtomicBool>,
        link_connected: Arc<AtomicBool>,
        link_name: &'static str,
    ) -> Self {
        Self {
            state,
            modes,
            running,
            link_connected,
            link_name,
            cursor: (0, 0),
            hex_entry: None,
            status: String::from("Ready"),
            gradient: GradientCache::default(),
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_entering_hex(&self) -> bool {
        self.hex_entry.is_some()
    }

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.hex_entry.is_some() {
            self.handle_hex_key(key);
        } else if let Some(action) = action_for_key(key) {
            self.apply(action);
        }
    }

    fn handle_hex_key(&mut self, key: KeyEvent) {
        let Some(entry) = self.hex_entry.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Esc => {
                self.hex_entry = None;
                self.status = String::from("Hex entry cancelled");
            }
            KeyCode::Backspace => {
                entry.pop();
            }
            KeyCode::Char(c) if entry.len() < HEX_ENTRY_MAX && (c.is_ascii_hexdigit() || c == '#') => {
                entry.push(c);
            }
            KeyCode::Enter => {
                let input = std::mem::take(entry);
                self.hex_entry = None;
                self.status = match self.state.request_hex(&input) {
                    Ok(rgb) => format!("Applied {rgb}"),
                    Err(e) => format!("Invalid hex color '{input}': {e}"),
                };
            }
            _ => {}
        }
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Preset(index) => {
                if let Some(rgb) = PRESETS.get(index) {
                    let (hue, saturation) = rgb.hue_sat();
                    self.state.request_color(hue, saturation);
                    self.status = format!("Preset {rgb}");
                }
            }
            Action::MoveCursor(dx, dy) => {
                self.cursor = clamp_to_wheel(self.cursor.0 + dx, self.cursor.1 + dy);
                let (hue, saturation) = wheel_pick(
                    self.cursor.0 as f32,
                    self.cursor.1 as f32,
                    UI_WHEEL_RADIUS as f32,
                );
                self.state.request_color(hue, saturation);
            }
            Action::AdjustWhiteMix(delta) => {
                let white = self.state.target().white_mix;
                self.state.request_white_mix(white + delta);
            }
            Action::AdjustBrightness(delta) => {
                let brightness = self.state.target().brightness;
                self.state.request_brightness(brightness + delta);
            }
            Action::SetBrightness(value) => {
                self.state.request_brightness(value);
                self.status = if value > MINIMUM_BRIGHTNESS {
                    String::from("On")
                } else {
                    String::from("Off")
                };
            }
            Action::BeginHexEntry => {
                self.hex_entry = Some(String::new());
            }
            Action::ToggleScreen => {
                let on = self.modes.toggle_screen();
                self.status = mode_status("Screen mode", on, self.modes.screen_available());
            }
            Action::ToggleScreenBrightness => {
                let on = self.modes.toggle_screen_brightness();
                self.status = mode_status("Screen brightness", on, self.modes.screen_available());
            }
            Action::ToggleAudio => {
                let on = self.modes.toggle_audio();
                self.status = mode_status("Audio mode", on, self.modes.audio_available());
            }
            Action::ToggleBand(band) => {
                let on = self.modes.toggle_band(band);
                self.status = format!("Band {band} {}", if on { "on" } else { "off" });
            }
            Action::Quit => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Draw the whole screen into `out`.
    pub fn render(&mut self, out: &mut impl Write) -> Result<()> {
        let (target, display) = self.state.snapshot();
        let shown = display.to_rgb();

        queue!(out, cursor::MoveTo(0, 0), terminal::Clear(ClearType::All))?;

        let link = if self.link_connected.load(Ordering::Relaxed) {
            format!("connected ({})", self.link_name)
        } else {
            String::from("not connected")
        };
        line(out, 0, &format!("stripctl v{}  link: {link}", env!("CARGO_PKG_VERSION")))?;

        // Swatch and readout
        queue!(out, cursor::MoveTo(0, 2))?;
        swatch(out, shown, 12)?;
        queue!(out, Print("  "), Print(readout(shown)))?;

        line(
            out,
            3,
            &format!(
                "target  hue {:.3}  sat {:.2}  white {:.2}  brightness {:.0}%",
                target.hue, target.saturation, target.white_mix, target.brightness
            ),
        )?;

        // Wheel
        let radius = UI_WHEEL_RADIUS;
        for (row, y) in (-radius..=radius).enumerate() {
            queue!(out, cursor::MoveTo(2, 5 + row as u16))?;
            for x in -radius..=radius {
                if x * x + y * y > radius * radius {
                    queue!(out, ResetColor, Print("  "))?;
                    continue;
                }
                let (hue, saturation) = wheel_pick(x as f32, y as f32, radius as f32);
                let rgb = hsv_white_to_rgb(hue, saturation, 0.0);
                let mark = if (x, y) == self.cursor { "<>" } else { "  " };
                queue!(
                    out,
                    SetBackgroundColor(to_color(rgb)),
                    SetForegroundColor(Color::Black),
                    Print(mark)
                )?;
            }
            queue!(out, ResetColor)?;
        }

        // White-mix gradient with a marker at the target
        let gradient_row = 6 + 2 * radius as u16;
        let marker = ((target.white_mix * UI_GRADIENT_WIDTH as f32) as usize).min(UI_GRADIENT_WIDTH - 1);
        queue!(out, cursor::MoveTo(0, gradient_row), Print("white  "))?;
        for (i, rgb) in self.gradient.refresh(&self.state, UI_GRADIENT_WIDTH).iter().enumerate() {
            let mark = if i == marker { "|" } else { " " };
            queue!(
                out,
                SetBackgroundColor(to_color(*rgb)),
                SetForegroundColor(Color::Black),
                Print(mark)
            )?;
        }
        queue!(out, ResetColor)?;

        // Presets
        queue!(out, cursor::MoveTo(0, gradient_row + 2), Print("presets "))?;
        for (key, rgb) in PRESET_KEYS.iter().zip(PRESETS.iter()) {
            let fg = if rgb.luma_mean() < 128 { Color::White } else { Color::Black };
            queue!(
                out,
                SetBackgroundColor(to_color(*rgb)),
                SetForegroundColor(fg),
                Print(format!(" {key} ")),
                ResetColor
            )?;
        }

        // Smart modes
        let bands: Vec<&str> = self.modes.band_selection().bands().map(Band::name).collect();
        line(
            out,
            gradient_row + 4,
            &format!(
                "screen {}{}  screen-brightness {}  audio {}{}  bands {}",
                on_off(self.modes.screen_enabled()),
                unavailable(self.modes.screen_available()),
                on_off(self.modes.screen_brightness_enabled()),
                on_off(self.modes.audio_enabled()),
                unavailable(self.modes.audio_available()),
                if bands.is_empty() { String::from("none") } else { bands.join("+") }
            ),
        )?;

        line(
            out,
            gradient_row + 6,
            "arrows wheel  [ ] white  - + brightness  o/O on/off  # hex  s/S/m modes  B/M/H bands  q quit",
        )?;

        let prompt = match &self.hex_entry {
            Some(entry) => format!("hex> {entry}"),
            None => self.status.clone(),
        };
        line(out, gradient_row + 7, &prompt)?;

        out.flush()?;
        Ok(())
    }

    /// Run the controller until quit or until `running` clears elsewhere.
    pub fn run(mut self) -> Result<()> {
        let _guard = TerminalGuard::new()?;
        let mut out = stdout();
        let redraw = Duration::from_millis(UI_REDRAW_INTERVAL_MS);

        while self.running.load(Ordering::SeqCst) {
            self.render(&mut out)?;

            if event::poll(redraw)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key);
            }
        }

        Ok(())
    }
}

fn clamp_to_wheel(x: i32, y: i32) -> (i32, i32) {
    let radius = UI_WHEEL_RADIUS;
    if x * x + y * y <= radius * radius {
        return (x, y);
    }
    // Project back onto the rim
    let distance = ((x * x + y * y) as f32).sqrt();
    let scale = radius as f32 / distance;
    (
        (x as f32 * scale).trunc() as i32,
        (y as f32 * scale).trunc() as i32,
    )
}

fn mode_status(name: &str, on: bool, available: bool) -> String {
    if on && !available {
        format!("{name} on (no source available)")
    } else {
        format!("{name} {}", on_off(on))
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn unavailable(available: bool) -> &'static str {
    if available { "" } else { " (n/a)" }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.r,
        g: rgb.g,
        b: rgb.b,
    }
}

fn swatch(out: &mut impl Write, rgb: Rgb, width: usize) -> Result<()> {
    queue!(
        out,
        SetBackgroundColor(to_color(rgb)),
        Print(" ".repeat(width)),
        ResetColor
    )?;
    Ok(())
}

fn line(out: &mut impl Write, row: u16, text: &str) -> Result<()> {
    queue!(
        out,
        cursor::MoveTo(0, row),
        terminal::Clear(ClearType::CurrentLine),
        Print(text)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ColorIntent;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn controller() -> (Controller, Arc<ColorState>, Arc<SmartModes>, Arc<AtomicBool>) {
        let state = Arc::new(ColorState::new(ColorIntent::default()));
        let modes = Arc::new(SmartModes::new(&[Band::Bass]));
        let running = Arc::new(AtomicBool::new(true));
        let controller = Controller::new(
            Arc::clone(&state),
            Arc::clone(&modes),
            Arc::clone(&running),
            Arc::new(AtomicBool::new(true)),
            "dry-run",
        );
        (controller, state, modes, running)
    }

    #[test]
    fn test_preset_keys_cover_palette() {
        assert_eq!(action_for_key(key('1')), Some(Action::Preset(0)));
        assert_eq!(action_for_key(key('0')), Some(Action::Preset(9)));
        assert_eq!(action_for_key(key('g')), Some(Action::Preset(16)));
        assert_eq!(action_for_key(key('z')), None);
    }

    #[test]
    fn test_ctrl_c_quits_but_c_is_a_preset() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(action_for_key(ctrl_c), Some(Action::Quit));
        assert_eq!(action_for_key(key('c')), Some(Action::Preset(12)));
    }

    #[test]
    fn test_preset_sets_target_color() {
        let (mut controller, state, _, _) = controller();
        controller.handle_key(key('3'));
        let target = state.target();
        assert!((target.hue - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(target.saturation, 1.0);
    }

    #[test]
    fn test_on_off_and_brightness_steps() {
        let (mut controller, state, _, _) = controller();
        controller.handle_key(key('O'));
        assert_eq!(state.target().brightness, 0.0);
        controller.handle_key(key('-'));
        assert_eq!(state.target().brightness, 0.0);
        controller.handle_key(key('+'));
        controller.handle_key(key('='));
        assert_eq!(state.target().brightness, 10.0);
        controller.handle_key(key('o'));
        assert_eq!(state.target().brightness, 100.0);
    }

    #[test]
    fn test_white_mix_steps_clamp() {
        let (mut controller, state, _, _) = controller();
        controller.handle_key(key('['));
        assert_eq!(state.target().white_mix, 0.0);
        controller.handle_key(key(']'));
        controller.handle_key(key(']'));
        assert!((state.target().white_mix - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_cursor_left_picks_red() {
        let (mut controller, state, _, _) = controller();
        for _ in 0..UI_WHEEL_RADIUS + 3 {
            controller.handle_key(KeyEvent::new(KeyCode::Left, KeyModifiers::NONE));
        }
        // Clamped to the rim on the left edge: hue 0 at full saturation
        let target = state.target();
        assert!(target.hue < 1e-6 || target.hue > 1.0 - 1e-6);
        assert_eq!(target.saturation, 1.0);
    }

    #[test]
    fn test_hex_entry_applies_on_enter() {
        let (mut controller, state, _, _) = controller();
        controller.handle_key(key('#'));
        assert!(controller.is_entering_hex());
        for c in "00ff00".chars() {
            controller.handle_key(key(c));
        }
        controller.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));

        assert!(!controller.is_entering_hex());
        assert!((state.target().hue - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(controller.status(), "Applied #00FF00");
    }

    #[test]
    fn test_invalid_hex_entry_leaves_target() {
        let (mut controller, state, _, _) = controller();
        controller.handle_key(key('2'));
        let before = state.target();

        controller.handle_key(key('#'));
        for c in "12ab".chars() {
            controller.handle_key(key(c));
        }
        // Non-hex characters are ignored while typing
        controller.handle_key(key('x'));
        controller.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));

        assert_eq!(state.target(), before);
        assert!(controller.status().starts_with("Invalid hex color"));
    }

    #[test]
    fn test_quit_keys_clear_running() {
        let (mut controller, _, _, running) = controller();
        controller.handle_key(key('q'));
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_mode_toggles() {
        let (mut controller, _, modes, _) = controller();
        controller.handle_key(key('s'));
        controller.handle_key(key('S'));
        controller.handle_key(key('m'));
        controller.handle_key(key('M'));
        controller.handle_key(key('B'));
        assert!(modes.screen_enabled());
        assert!(modes.screen_brightness_enabled());
        assert!(modes.audio_enabled());
        let selection = modes.band_selection();
        assert!(selection.contains(Band::Mid));
        assert!(!selection.contains(Band::Bass));
    }

    #[test]
    fn test_gradient_rebuilds_only_on_color_change() {
        let state = ColorState::default();
        let mut cache = GradientCache::default();

        cache.refresh(&state, 8);
        cache.refresh(&state, 8);
        assert_eq!(cache.rebuilds(), 1);

        state.request_brightness(20.0);
        state.request_white_mix(0.5);
        cache.refresh(&state, 8);
        assert_eq!(cache.rebuilds(), 1);

        state.request_color(0.0, 1.0);
        let cells = cache.refresh(&state, 8).to_vec();
        assert_eq!(cache.rebuilds(), 2);
        assert_eq!(cells[0], Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_white_gradient_runs_from_color_toward_white() {
        let cells = white_gradient(0.0, 1.0, 4);
        assert_eq!(cells[0], Rgb::new(255, 0, 0));
        assert!(cells[3].g > cells[1].g);
        assert_eq!(cells[3].r, 255);
    }

    #[test]
    fn test_render_shows_readout() {
        let state = Arc::new(ColorState::new(ColorIntent::new(0.0, 1.0, 0.0, 100.0)));
        let mut controller = Controller::new(
            state,
            Arc::new(SmartModes::new(&[Band::Bass])),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicBool::new(false)),
            "dry-run",
        );

        let mut out = Vec::new();
        controller.render(&mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("HEX: #FF0000 | RGB: (255,0,0)"));
        assert!(text.contains("not connected"));
    }

    #[test]
    fn test_readout_format() {
        assert_eq!(readout(Rgb::new(1, 2, 255)), "HEX: #0102FF | RGB: (1,2,255)");
    }
}
