//! Per-frame audio feature extraction and speech/silence classification.
//!
//! A [`SpectrumSource`] hands the extractor a normalized magnitude spectrum
//! once per frame; the extractor reduces it to overall volume, three band
//! energies and a hysteresis-gated speaking flag, and smooths a speech
//! intensity the rest of the system animates from. With no source attached
//! the extractor reports silence and lets intensity decay to zero.

use crate::error::AvatarResult;
use crate::params::SpeechDetection;
use crate::smoothing::Channel;

/// Audio features for a single frame. Recomputed every frame, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeechState {
    pub is_speaking: bool,

    /// Mean magnitude over all bins, in [0, 1]
    pub volume: f32,

    /// Mean magnitude of the low third of the spectrum, in [0, 1]
    pub band_low: f32,

    /// Mean magnitude of the middle third, in [0, 1]
    pub band_mid: f32,

    /// Mean magnitude of the high third, in [0, 1]
    pub band_high: f32,

    /// Smoothed speech intensity, in [0, 1]
    pub intensity: f32,
}

/// Anything that can deliver a magnitude spectrum once per frame.
///
/// Bins must already be normalized to [0, 1] (each source knows its own
/// scale). `sample` returns `Ok(true)` when `out` was refreshed and
/// `Ok(false)` when no new data arrived this frame, in which case the
/// previous features persist. Implementations must not block.
pub trait SpectrumSource {
    fn sample(&mut self, dt: f32, out: &mut Vec<f32>) -> AvatarResult<bool>;

    /// Release whatever the source holds (threads, streams, files). Called
    /// before the source is dropped during detach/dispose; must be an
    /// idempotent no-op on a source already shut down.
    fn shutdown(&mut self) {}
}

/// Two-threshold speaking/silent classifier.
///
/// Entering the speaking state takes more volume than staying in it, so a
/// voice trailing off (or a noise floor near the threshold) cannot flicker
/// the flag.
#[derive(Debug, Clone)]
pub struct SpeechClassifier {
    detection: SpeechDetection,
    speaking: bool,
}

impl SpeechClassifier {
    pub fn new(detection: SpeechDetection) -> Self {
        Self {
            detection,
            speaking: false,
        }
    }

    /// Classify one frame's volume; returns the updated speaking flag.
    pub fn update(&mut self, volume: f32) -> bool {
        let threshold = if self.speaking {
            self.detection.sustain_threshold
        } else {
            self.detection.enter_threshold
        };
        self.speaking = volume > threshold;
        self.speaking
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }
}

/// Frame-driven audio feature extractor.
pub struct AudioFeatures {
    detection: SpeechDetection,
    classifier: SpeechClassifier,
    source: Option<Box<dyn SpectrumSource>>,
    spectrum: Vec<f32>,

    // Raw features carried across frames when a source yields no new data
    volume: f32,
    band_low: f32,
    band_mid: f32,
    band_high: f32,

    intensity: Channel,
}

impl AudioFeatures {
    pub fn new(detection: SpeechDetection) -> Self {
        let intensity = Channel::new(0.0, detection.intensity_rate);
        Self {
            classifier: SpeechClassifier::new(detection.clone()),
            detection,
            source: None,
            spectrum: Vec::new(),
            volume: 0.0,
            band_low: 0.0,
            band_mid: 0.0,
            band_high: 0.0,
            intensity,
        }
    }

    /// Attach (or replace) the spectrum source. A replaced source is shut
    /// down before the new one is installed.
    pub fn attach_source(&mut self, source: Box<dyn SpectrumSource>) {
        self.detach_source();
        self.source = Some(source);
    }

    /// Shut down and drop the current source, if any. The extractor then
    /// reports silence and intensity decays naturally.
    pub fn detach_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.shutdown();
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Advance one frame and return the current speech state.
    pub fn update(&mut self, dt: f32) -> SpeechState {
        match &mut self.source {
            Some(source) => match source.sample(dt, &mut self.spectrum) {
                Ok(true) => {
                    self.volume = mean(&self.spectrum).clamp(0.0, 1.0);
                    let (low, mid, high) = band_energies(&self.spectrum);
                    self.band_low = low;
                    self.band_mid = mid;
                    self.band_high = high;
                }
                // No new data this frame: previous features persist.
                Ok(false) => {}
                Err(e) => {
                    log::warn!("audio read failed, keeping previous features: {e}");
                }
            },
            None => {
                self.volume = 0.0;
                self.band_low = 0.0;
                self.band_mid = 0.0;
                self.band_high = 0.0;
            }
        }

        let is_speaking = self.classifier.update(self.volume);

        let target = if is_speaking {
            (self.volume * self.detection.intensity_gain).min(1.0)
        } else {
            0.0
        };
        self.intensity.set_target(target);
        let intensity = self.intensity.advance(dt);

        SpeechState {
            is_speaking,
            volume: self.volume,
            band_low: self.band_low,
            band_mid: self.band_mid,
            band_high: self.band_high,
            intensity,
        }
    }
}

/// Mean magnitude over all bins.
fn mean(spectrum: &[f32]) -> f32 {
    if spectrum.is_empty() {
        return 0.0;
    }
    spectrum.iter().sum::<f32>() / spectrum.len() as f32
}

/// Average the three equal contiguous thirds of the spectrum (the high
/// third absorbs any remainder bins).
fn band_energies(spectrum: &[f32]) -> (f32, f32, f32) {
    if spectrum.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let third = spectrum.len() / 3;
    if third == 0 {
        let value = mean(spectrum).clamp(0.0, 1.0);
        return (value, value, value);
    }
    let low = mean(&spectrum[..third]).clamp(0.0, 1.0);
    let mid = mean(&spectrum[third..2 * third]).clamp(0.0, 1.0);
    let high = mean(&spectrum[2 * third..]).clamp(0.0, 1.0);
    (low, mid, high)
}
