//! Music-reactive brightness.
//!
//! Each poll reads one chunk of microphone samples, splits its magnitude
//! spectrum into bass, mid and high bands and compares the selected bands'
//! energy against a short rolling history. Spikes above the running mean map
//! to brightness through a cubic curve, so quiet passages stay near the floor
//! and only clear beats push toward the ceiling.

use anyhow::{Context, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use super::{Band, BandSelection, FailureLog, SmartModes};
use crate::color::lerp;
use crate::common::constants::*;
use crate::config::Config;
use crate::core::state::ColorState;

/// Blocking source of mono samples in signed 16-bit scale.
pub trait AudioSource {
    /// Fill `buf` with up to `buf.len()` samples and return how many were
    /// written. Zero means nothing was captured this time.
    fn read_chunk(&mut self, buf: &mut [f32]) -> Result<usize>;
}

/// Mean spectral magnitude per band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandLevels {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

impl BandLevels {
    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.bass,
            Band::Mid => self.mid,
            Band::High => self.high,
        }
    }

    /// Mean of the selected bands, 0 when none are selected.
    pub fn selected_mean(&self, selection: &BandSelection) -> f32 {
        let (sum, count) = selection
            .bands()
            .fold((0.0, 0usize), |(sum, count), band| (sum + self.get(band), count + 1));
        if count == 0 { 0.0 } else { sum / count as f32 }
    }
}

/// Spectrum splitter plus the rolling history used for spike detection.
pub struct BandAnalyzer {
    planner: FftPlanner<f32>,
    buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    history: VecDeque<f32>,
    history_len: usize,
}

impl BandAnalyzer {
    pub fn new(history_len: usize) -> Self {
        Self {
            planner: FftPlanner::new(),
            buffer: Vec::with_capacity(AUDIO_CHUNK_SIZE),
            magnitudes: Vec::with_capacity(AUDIO_CHUNK_SIZE / 2 + 1),
            history: VecDeque::with_capacity(history_len + 1),
            history_len: history_len.max(1),
        }
    }

    /// Real-FFT magnitude spectrum of `samples`, averaged into bands.
    ///
    /// Band edges are bin indices: bass `[0, 150)`, mid `[150, 2000)` and
    /// high `[2000, ..)`, each clipped to the spectrum. With the default
    /// 1024-sample chunk the high band is empty and reads as 0.
    pub fn band_levels(&mut self, samples: &[f32]) -> BandLevels {
        if samples.is_empty() {
            return BandLevels::default();
        }

        let fft = self.planner.plan_fft_forward(samples.len());
        self.buffer.clear();
        self.buffer
            .extend(samples.iter().map(|&s| Complex::new(s, 0.0)));
        fft.process(&mut self.buffer);

        // Only the non-negative frequencies, as a real FFT would return
        let bins = samples.len() / 2 + 1;
        self.magnitudes.clear();
        self.magnitudes
            .extend(self.buffer[..bins].iter().map(|c| c.norm()));

        BandLevels {
            bass: band_mean(&self.magnitudes, 0, BASS_BINS_END),
            mid: band_mean(&self.magnitudes, BASS_BINS_END, MID_BINS_END),
            high: band_mean(&self.magnitudes, MID_BINS_END, usize::MAX),
        }
    }

    /// Record `value` and return how far it rises above the rolling mean.
    ///
    /// The mean includes `value` itself. Never negative.
    pub fn push_intensity(&mut self, value: f32) -> f32 {
        self.history.push_back(value);
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }
        let mean = self.history.iter().sum::<f32>() / self.history.len() as f32;
        (value - mean).max(0.0)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

fn band_mean(magnitudes: &[f32], start: usize, end: usize) -> f32 {
    let end = end.min(magnitudes.len());
    if start >= end {
        return 0.0;
    }
    let slice = &magnitudes[start..end];
    slice.iter().sum::<f32>() / slice.len() as f32
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub interval: Duration,
    /// Smoothing factor applied to the sampler's own brightness
    pub speed: f32,
    pub min_brightness: f32,
    pub max_brightness: f32,
    pub spike_threshold: f32,
    pub history_len: usize,
}

impl AudioSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: Duration::from_millis(config.audio_interval.unwrap_or(DEFAULT_AUDIO_INTERVAL)),
            speed: config.audio_speed.unwrap_or(DEFAULT_AUDIO_SPEED),
            min_brightness: config
                .audio_min_brightness
                .unwrap_or(DEFAULT_AUDIO_MIN_BRIGHTNESS),
            max_brightness: config
                .audio_max_brightness
                .unwrap_or(DEFAULT_AUDIO_MAX_BRIGHTNESS),
            spike_threshold: config.spike_threshold.unwrap_or(DEFAULT_SPIKE_THRESHOLD),
            history_len: config.history_len.unwrap_or(DEFAULT_HISTORY_LEN),
        }
    }

    /// Brightness for a spike of the given intensity.
    pub fn level_for(&self, intensity: f32) -> f32 {
        let normalized = (intensity / (self.spike_threshold * 3.0)).min(1.0);
        let cubic = normalized.powi(3);
        self.min_brightness + (self.max_brightness - self.min_brightness) * cubic
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_AUDIO_INTERVAL),
            speed: DEFAULT_AUDIO_SPEED,
            min_brightness: DEFAULT_AUDIO_MIN_BRIGHTNESS,
            max_brightness: DEFAULT_AUDIO_MAX_BRIGHTNESS,
            spike_threshold: DEFAULT_SPIKE_THRESHOLD,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

pub struct AudioSampler {
    source: Box<dyn AudioSource>,
    analyzer: BandAnalyzer,
    state: Arc<ColorState>,
    modes: Arc<SmartModes>,
    settings: AudioSettings,
    chunk: Vec<f32>,
    // Smoothed brightness; reseeded from the target whenever the mode turns on
    brightness: Option<f32>,
    debug_enabled: bool,
}

impl AudioSampler {
    pub fn new(
        source: Box<dyn AudioSource>,
        state: Arc<ColorState>,
        modes: Arc<SmartModes>,
        settings: AudioSettings,
        debug_enabled: bool,
    ) -> Self {
        Self {
            source,
            analyzer: BandAnalyzer::new(settings.history_len),
            state,
            modes,
            chunk: vec![0.0; AUDIO_CHUNK_SIZE],
            settings,
            brightness: None,
            debug_enabled,
        }
    }

    /// One poll. Does nothing while audio mode is off.
    ///
    /// Returns the brightness requested this poll.
    pub fn step(&mut self) -> Result<Option<f32>> {
        if !self.modes.audio_enabled() {
            self.brightness = None;
            return Ok(None);
        }

        let read = self.source.read_chunk(&mut self.chunk)?;
        let level = if read == 0 {
            self.settings.min_brightness
        } else {
            let levels = self.analyzer.band_levels(&self.chunk[..read]);
            let value = levels.selected_mean(&self.modes.band_selection());
            let intensity = self.analyzer.push_intensity(value);
            self.settings.level_for(intensity)
        };

        let current = self
            .brightness
            .unwrap_or_else(|| self.state.target().brightness);
        let next = lerp(current, level, self.settings.speed);
        self.brightness = Some(next);
        self.state.request_brightness(next);
        Ok(Some(next))
    }

    pub fn run(&mut self, running: &AtomicBool) {
        let backoff = Duration::from_millis(SAMPLER_ERROR_BACKOFF_MS);
        let mut failures = FailureLog::new("Audio", self.debug_enabled);
        while running.load(Ordering::SeqCst) {
            match self.step() {
                Ok(_) => {
                    failures.succeeded();
                    thread::sleep(self.settings.interval);
                }
                Err(e) => {
                    failures.failed(&e);
                    thread::sleep(backoff);
                }
            }
        }
    }
}

/// Spawn the audio sampler thread.
///
/// The microphone is opened on the new thread. If that fails the failure is
/// logged once, the mode stays unavailable and the thread exits.
pub fn spawn(
    state: Arc<ColorState>,
    modes: Arc<SmartModes>,
    settings: AudioSettings,
    running: Arc<AtomicBool>,
    debug_enabled: bool,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("audio-sampler".to_string())
        .spawn(move || {
            let source = match open_default_source() {
                Ok(source) => source,
                Err(e) => {
                    log_decorated!("Audio sampling unavailable: {e:#}");
                    return;
                }
            };
            if debug_enabled {
                log_debug!(
                    "Audio sampler polling every {}ms, bands: {}",
                    settings.interval.as_millis(),
                    modes
                        .band_selection()
                        .bands()
                        .map(Band::name)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            modes.set_audio_available(true);
            AudioSampler::new(source, state, modes, settings, debug_enabled).run(&running);
        })
        .context("failed to spawn audio sampler thread")
}

#[cfg(feature = "audio")]
pub fn open_default_source() -> Result<Box<dyn AudioSource>> {
    Ok(Box::new(cpal_source::CpalSource::open_default()?))
}

#[cfg(not(feature = "audio"))]
pub fn open_default_source() -> Result<Box<dyn AudioSource>> {
    anyhow::bail!("built without audio capture support (enable the `audio` feature)")
}

#[cfg(feature = "audio")]
mod cpal_source {
    use anyhow::{Context, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::AudioSource;
    use crate::common::constants::{AUDIO_CHUNK_SIZE, AUDIO_SAMPLE_RATE};

    // Keep a few chunks so a slow poll does not lose the latest audio
    const BUFFER_CAPACITY: usize = AUDIO_CHUNK_SIZE * 4;

    type SampleBuffer = Arc<Mutex<VecDeque<f32>>>;

    /// Default input device, downmixed to mono.
    pub struct CpalSource {
        _stream: cpal::Stream,
        samples: SampleBuffer,
        wait: Duration,
    }

    impl CpalSource {
        pub fn open_default() -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .context("no default input device")?;
            let supported = device
                .default_input_config()
                .context("failed to query input configuration")?;
            let channels = usize::from(supported.channels()).max(1);
            let sample_format = supported.sample_format();
            let config = supported.config();

            let samples: SampleBuffer =
                Arc::new(Mutex::new(VecDeque::with_capacity(BUFFER_CAPACITY)));
            let sink = Arc::clone(&samples);

            let stream = match sample_format {
                cpal::SampleFormat::F32 => device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        push_frames(&sink, data, channels, |s| s * 32768.0)
                    },
                    stream_error,
                    None,
                )?,
                cpal::SampleFormat::I16 => device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        push_frames(&sink, data, channels, f32::from)
                    },
                    stream_error,
                    None,
                )?,
                other => anyhow::bail!("unsupported input sample format {other:?}"),
            };
            stream.play().context("failed to start input stream")?;

            // Two chunk durations at the nominal rate
            let wait = Duration::from_secs_f32(
                2.0 * AUDIO_CHUNK_SIZE as f32 / AUDIO_SAMPLE_RATE as f32,
            );

            Ok(Self {
                _stream: stream,
                samples,
                wait,
            })
        }
    }

    fn stream_error(err: cpal::StreamError) {
        log_warning!("Audio input stream error: {err}");
    }

    fn push_frames<T: Copy>(
        sink: &SampleBuffer,
        data: &[T],
        channels: usize,
        convert: impl Fn(T) -> f32,
    ) {
        let mut buffer = sink.lock().unwrap_or_else(PoisonError::into_inner);
        for frame in data.chunks(channels) {
            let mono = frame.iter().map(|&s| convert(s)).sum::<f32>() / frame.len() as f32;
            buffer.push_back(mono);
        }
        while buffer.len() > BUFFER_CAPACITY {
            buffer.pop_front();
        }
    }

    impl AudioSource for CpalSource {
        fn read_chunk(&mut self, buf: &mut [f32]) -> Result<usize> {
            let deadline = Instant::now() + self.wait;
            loop {
                let mut buffer = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
                if buffer.len() >= buf.len() || Instant::now() >= deadline {
                    let count = buffer.len().min(buf.len());
                    for (slot, sample) in buf.iter_mut().zip(buffer.drain(..count)) {
                        *slot = sample;
                    }
                    return Ok(count);
                }
                drop(buffer);
                thread::sleep(Duration::from_millis(2));
            }
        }
    }
}
