//! Spectrum sources: live microphone capture and offline WAV playback.
//!
//! The live pipeline runs two stages off the frame loop: a cpal input
//! stream folds interleaved samples to mono into a shared ring, and an
//! analysis thread windows the ring, runs a forward FFT and publishes a
//! normalized half-spectrum with a generation counter. The frame loop only
//! ever copies the latest published spectrum, so audio backpressure can
//! never stall animation.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::SpectrumSource;
use crate::error::{AvatarError, AvatarResult};
use crate::params::SpectrumConfig;

/// Keep at most this many FFT windows of raw samples queued; if the
/// analysis thread falls behind, old audio is dropped rather than grown.
const RING_CAP_WINDOWS: usize = 8;

struct SharedSpectrum {
    generation: u64,
    magnitudes: Vec<f32>,
}

/// Microphone capture feeding a background FFT analysis thread.
pub struct LiveAudioPipeline {
    stream: Option<cpal::Stream>,
    worker: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
    shared: Arc<Mutex<SharedSpectrum>>,
    last_generation: u64,
}

impl LiveAudioPipeline {
    /// Open the default input device and start capture + analysis.
    pub fn new(config: &SpectrumConfig) -> AvatarResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AvatarError::AudioSetup("no input device available".to_string()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| AvatarError::AudioSetup(format!("default input config: {e}")))?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate_hz = stream_config.sample_rate.0;

        let ring: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let ring_cap = config.fft_size * RING_CAP_WINDOWS;

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_input_stream::<f32>(&device, &stream_config, Arc::clone(&ring), ring_cap)?
            }
            cpal::SampleFormat::I16 => {
                build_input_stream::<i16>(&device, &stream_config, Arc::clone(&ring), ring_cap)?
            }
            cpal::SampleFormat::U16 => {
                build_input_stream::<u16>(&device, &stream_config, Arc::clone(&ring), ring_cap)?
            }
            other => {
                return Err(AvatarError::AudioSetup(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        };
        stream
            .play()
            .map_err(|e| AvatarError::AudioSetup(format!("start stream: {e}")))?;

        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::new(Mutex::new(SharedSpectrum {
            generation: 0,
            magnitudes: Vec::new(),
        }));
        let worker = spawn_analysis_thread(
            config,
            Arc::clone(&running),
            Arc::clone(&ring),
            Arc::clone(&shared),
        )?;

        log::info!(
            "live audio pipeline up: {} Hz, fft {}, every {} ms",
            sample_rate_hz,
            config.fft_size,
            config.update_interval_ms
        );

        Ok(Self {
            stream: Some(stream),
            worker: Some(worker),
            running,
            shared,
            last_generation: 0,
        })
    }
}

impl SpectrumSource for LiveAudioPipeline {
    fn sample(&mut self, _dt: f32, out: &mut Vec<f32>) -> AvatarResult<bool> {
        let shared = self
            .shared
            .lock()
            .map_err(|_| AvatarError::AudioRead("spectrum state poisoned".to_string()))?;
        if shared.generation == self.last_generation {
            return Ok(false);
        }
        self.last_generation = shared.generation;
        out.clone_from(&shared.magnitudes);
        Ok(true)
    }

    /// Stop analysis first, then capture: the worker is signalled and
    /// joined while the stream still exists, then the stream is dropped.
    /// Safe to call more than once.
    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("spectrum analysis thread panicked during shutdown");
            }
        }
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::info!("live audio pipeline stopped");
        }
    }
}

impl Drop for LiveAudioPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    ring: Arc<Mutex<Vec<f32>>>,
    ring_cap: usize,
) -> AvatarResult<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = (config.channels as usize).max(1);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut ring = match ring.lock() {
                    Ok(guard) => guard,
                    Err(_) => return,
                };
                for frame in data.chunks(channels) {
                    let sum: f32 = frame.iter().map(|s| f32::from_sample(*s)).sum();
                    ring.push(sum / frame.len() as f32);
                }
                if ring.len() > ring_cap {
                    let excess = ring.len() - ring_cap;
                    ring.drain(..excess);
                }
            },
            |err| log::warn!("input stream error: {err}"),
            None,
        )
        .map_err(|e| AvatarError::AudioSetup(format!("build input stream: {e}")))
}

fn spawn_analysis_thread(
    config: &SpectrumConfig,
    running: Arc<AtomicBool>,
    ring: Arc<Mutex<Vec<f32>>>,
    shared: Arc<Mutex<SharedSpectrum>>,
) -> AvatarResult<thread::JoinHandle<()>> {
    let fft_size = config.fft_size;
    let norm = config.magnitude_norm();
    let interval = Duration::from_millis(config.update_interval_ms);

    thread::Builder::new()
        .name("spectrum-analysis".to_string())
        .spawn(move || {
            let mut planner = FftPlanner::new();
            let fft = planner.plan_fft_forward(fft_size);
            let window = hann_window(fft_size);
            let mut frame = vec![0.0_f32; fft_size];
            let mut scratch: Vec<Complex<f32>> = Vec::with_capacity(fft_size);
            let mut magnitudes: Vec<f32> = Vec::with_capacity(fft_size / 2);

            while running.load(Ordering::Relaxed) {
                thread::sleep(interval);

                let fresh = {
                    let mut ring = match ring.lock() {
                        Ok(guard) => guard,
                        Err(_) => break,
                    };
                    if ring.len() >= fft_size {
                        frame.copy_from_slice(&ring[..fft_size]);
                        // 50% overlap between consecutive windows
                        ring.drain(..fft_size / 2);
                        true
                    } else {
                        false
                    }
                };
                if !fresh {
                    continue;
                }

                analyze_window(&frame, &window, fft.as_ref(), norm, &mut scratch, &mut magnitudes);

                if let Ok(mut shared) = shared.lock() {
                    shared.generation = shared.generation.wrapping_add(1);
                    shared.magnitudes.clone_from(&magnitudes);
                }
            }
        })
        .map_err(|e| AvatarError::AudioSetup(format!("spawn analysis thread: {e}")))
}

/// WAV file played back as a spectrum source, for demos and offline runs.
///
/// The whole file is decoded to mono up front; each frame advances a
/// playback cursor by `dt` and analyzes the window starting there. When a
/// non-looping file runs out it publishes one final zero spectrum so the
/// avatar settles into silence.
pub struct WavSpectrumSource {
    samples: Vec<f32>,
    sample_rate: f64,
    cursor: f64,
    loop_playback: bool,
    drained: bool,
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    norm: f32,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl WavSpectrumSource {
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: &SpectrumConfig,
        loop_playback: bool,
    ) -> AvatarResult<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| AvatarError::AudioSetup(format!("open {}: {e}", path.display())))?;
        let spec = reader.spec();
        let channels = (spec.channels as usize).max(1);

        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AvatarError::AudioSetup(format!("decode {}: {e}", path.display())))?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| {
                        AvatarError::AudioSetup(format!("decode {}: {e}", path.display()))
                    })?
            }
        };
        let samples = if channels == 1 {
            raw
        } else {
            raw.chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        log::info!(
            "wav source {}: {:.2}s at {} Hz",
            path.display(),
            samples.len() as f64 / spec.sample_rate as f64,
            spec.sample_rate
        );

        Ok(Self::from_samples(
            samples,
            spec.sample_rate as f64,
            config,
            loop_playback,
        ))
    }

    /// Build a source from raw mono samples (synthetic audio, tests).
    pub fn from_samples(
        samples: Vec<f32>,
        sample_rate: f64,
        config: &SpectrumConfig,
        loop_playback: bool,
    ) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        Self {
            samples,
            sample_rate,
            cursor: 0.0,
            loop_playback,
            drained: false,
            fft,
            fft_size: config.fft_size,
            norm: config.magnitude_norm(),
            window: hann_window(config.fft_size),
            scratch: Vec::with_capacity(config.fft_size),
        }
    }

    pub fn finished(&self) -> bool {
        self.drained
    }
}

impl SpectrumSource for WavSpectrumSource {
    fn sample(&mut self, dt: f32, out: &mut Vec<f32>) -> AvatarResult<bool> {
        if self.drained {
            return Ok(false);
        }

        self.cursor += dt.max(0.0) as f64 * self.sample_rate;
        let mut start = self.cursor as usize;

        if start + self.fft_size > self.samples.len() {
            if self.loop_playback && self.samples.len() >= self.fft_size {
                self.cursor = 0.0;
                start = 0;
            } else {
                // Hand the extractor silence once, then report no new data.
                self.drained = true;
                out.clear();
                out.resize(self.fft_size / 2, 0.0);
                return Ok(true);
            }
        }

        analyze_window(
            &self.samples[start..start + self.fft_size],
            &self.window,
            self.fft.as_ref(),
            self.norm,
            &mut self.scratch,
            out,
        );
        Ok(true)
    }
}

/// Hann window coefficients for an analysis window of `n` samples.
fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let phase = i as f32 / (n - 1) as f32;
            0.5 * (1.0 - (std::f32::consts::TAU * phase).cos())
        })
        .collect()
}

/// Window the samples, run the forward FFT and write the normalized
/// half-spectrum magnitudes into `out`.
fn analyze_window(
    samples: &[f32],
    window: &[f32],
    fft: &dyn Fft<f32>,
    norm: f32,
    scratch: &mut Vec<Complex<f32>>,
    out: &mut Vec<f32>,
) {
    scratch.clear();
    scratch.extend(
        samples
            .iter()
            .zip(window)
            .map(|(s, w)| Complex::new(s * w, 0.0)),
    );
    fft.process(scratch);

    out.clear();
    out.extend(
        scratch[..samples.len() / 2]
            .iter()
            .map(|c| (c.norm() / norm).min(1.0)),
    );
}
