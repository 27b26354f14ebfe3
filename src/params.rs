//! Parameter definitions with physical units and documented semantics.
//!
//! All tuning constants of the animation core live here with:
//! - Physical units (radians, seconds, Hz, etc.)
//! - Documented ranges and meanings
//! - `Default` impls holding the calibrated values

/// Frame rate the per-channel smoothing rates are calibrated against.
///
/// A channel with rate `r` moves `r` of the remaining distance per frame at
/// this frame rate; `smoothing::approach` rescales for any actual frame
/// duration.
pub const REFERENCE_FPS: f32 = 60.0;

/// Spectrum analysis configuration for the audio pipeline.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    /// Audio sample rate (Hz)
    pub sample_rate_hz: usize,

    /// FFT window size in samples (must be a power of 2)
    pub fft_size: usize,

    /// Spectrum refresh interval on the analysis thread (milliseconds)
    pub update_interval_ms: u64,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44100,
            fft_size: 1024,
            update_interval_ms: 15, // ~1 refresh per 60 Hz frame
        }
    }
}

impl SpectrumConfig {
    /// Number of magnitude bins a source produces per spectrum.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Normalization divisor mapping raw FFT magnitudes into [0, 1].
    ///
    /// A full-scale sine through a Hann window peaks at `fft_size / 4` in
    /// its bin, so dividing by this puts the loudest possible bin at 1.0.
    pub fn magnitude_norm(&self) -> f32 {
        self.fft_size as f32 * 0.25
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two() {
            return Err(format!(
                "FFT size must be power of 2, got {}",
                self.fft_size
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err("Sample rate must be > 0".to_string());
        }
        Ok(())
    }
}

/// Speech/silence classification thresholds.
///
/// The two-threshold split is hysteresis: a voice hovering around a single
/// threshold would flicker the speaking flag on and off every few frames.
#[derive(Debug, Clone)]
pub struct SpeechDetection {
    /// Mean-volume threshold to *enter* the speaking state
    pub enter_threshold: f32,

    /// Mean-volume threshold to *remain* in the speaking state
    /// (must be below `enter_threshold`)
    pub sustain_threshold: f32,

    /// Gain applied to volume before clamping into the intensity target
    /// (intensity target = min(volume * gain, 1))
    pub intensity_gain: f32,

    /// Smoothing rate for the intensity channel (per frame at 60 fps)
    pub intensity_rate: f32,
}

impl Default for SpeechDetection {
    fn default() -> Self {
        Self {
            enter_threshold: 0.025,
            sustain_threshold: 0.015,
            intensity_gain: 2.0,
            intensity_rate: 0.15,
        }
    }
}

impl SpeechDetection {
    pub fn validate(&self) -> Result<(), String> {
        if self.sustain_threshold >= self.enter_threshold {
            return Err(format!(
                "Sustain threshold {} must be below enter threshold {}",
                self.sustain_threshold, self.enter_threshold
            ));
        }
        if self.intensity_rate <= 0.0 || self.intensity_rate >= 1.0 {
            return Err(format!(
                "Intensity rate must be in (0, 1), got {}",
                self.intensity_rate
            ));
        }
        Ok(())
    }
}

/// Per-subsystem smoothing rates (fraction of remaining distance per frame
/// at 60 fps).
///
/// The spread expresses perceived weight: the neck is the heaviest thing in
/// the system, mouth shapes the lightest (they must track the audio).
#[derive(Debug, Clone)]
pub struct SmoothingRates {
    /// Head rotation (responsive but not twitchy)
    pub head: f32,

    /// Neck rotation (slower than the head; reads as mass)
    pub neck: f32,

    /// Upper/lower arm rotation
    pub arms: f32,

    /// Hand rotation
    pub hands: f32,

    /// Shoulder raise/sway
    pub shoulders: f32,

    /// Finger segment curl
    pub fingers: f32,

    /// Spine/chest breathing motion
    pub breathing: f32,

    /// Hip sway
    pub hips: f32,

    /// Emotive expression weights
    pub expressions: f32,

    /// Mouth shapes and blink (fast; driven directly by the audio signal)
    pub mouth: f32,
}

impl Default for SmoothingRates {
    fn default() -> Self {
        Self {
            head: 0.07,
            neck: 0.05,
            arms: 0.1,
            hands: 0.09,
            shoulders: 0.08,
            fingers: 0.1,
            breathing: 0.08,
            hips: 0.06,
            expressions: 0.09,
            mouth: 0.25,
        }
    }
}

impl SmoothingRates {
    pub fn validate(&self) -> Result<(), String> {
        for (name, rate) in [
            ("head", self.head),
            ("neck", self.neck),
            ("arms", self.arms),
            ("hands", self.hands),
            ("shoulders", self.shoulders),
            ("fingers", self.fingers),
            ("breathing", self.breathing),
            ("hips", self.hips),
            ("expressions", self.expressions),
            ("mouth", self.mouth),
        ] {
            if rate <= 0.0 || rate >= 1.0 {
                return Err(format!("{} rate must be in (0, 1), got {}", name, rate));
            }
        }
        Ok(())
    }
}

/// Weights mapping frequency-band energies onto the four viseme channels.
#[derive(Debug, Clone)]
pub struct LipShapeMapping {
    /// Low band → "aa" (wide open mouth)
    pub open_from_low: f32,

    /// High band → "ih" (narrow mouth)
    pub narrow_from_high: f32,

    /// Mid band → "ou" (rounded mouth)
    pub rounded_from_mid: f32,

    /// (low + mid) → "oh" (rounded open mouth)
    pub rounded_open_from_low_mid: f32,
}

impl Default for LipShapeMapping {
    fn default() -> Self {
        Self {
            open_from_low: 0.8,
            narrow_from_high: 0.6,
            rounded_from_mid: 0.5,
            rounded_open_from_low_mid: 0.4,
        }
    }
}

/// Blink and mood machine timing.
#[derive(Debug, Clone)]
pub struct ExpressionTiming {
    /// Minimum gap between blinks (seconds)
    pub blink_min_interval_s: f32,

    /// Maximum gap between blinks (seconds)
    pub blink_max_interval_s: f32,

    /// Full width of the triangular blink pulse (seconds)
    pub blink_width_s: f32,

    /// Minimum hold before a new mood may be selected (seconds)
    pub mood_min_hold_s: f32,

    /// Maximum hold before a new mood may be selected (seconds)
    pub mood_max_hold_s: f32,

    /// Duration of the eased 0→1 mood transition ramp (seconds)
    pub mood_fade_s: f32,

    /// Lower bound of the randomly chosen mood intensity
    pub mood_min_intensity: f32,

    /// Upper bound of the randomly chosen mood intensity
    pub mood_max_intensity: f32,
}

impl Default for ExpressionTiming {
    fn default() -> Self {
        Self {
            blink_min_interval_s: 2.5,
            blink_max_interval_s: 6.0,
            blink_width_s: 0.3,
            mood_min_hold_s: 2.5,
            mood_max_hold_s: 5.5,
            mood_fade_s: 1.25,
            mood_min_intensity: 0.25,
            mood_max_intensity: 0.6,
        }
    }
}

/// Gesture reselection and cross-fade timing.
#[derive(Debug, Clone)]
pub struct GestureTiming {
    /// Minimum hold before a new variant may be selected (seconds)
    pub min_hold_s: f32,

    /// Maximum hold before a new variant may be selected (seconds)
    pub max_hold_s: f32,

    /// Hold seeded when speech starts after silence (seconds)
    pub entry_hold_s: f32,

    /// Duration of the eased head-target cross-fade (seconds)
    pub crossfade_s: f32,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            min_hold_s: 2.0,
            max_hold_s: 4.0,
            entry_hold_s: 2.0,
            crossfade_s: 0.67,
        }
    }
}

/// Amplitudes and frequencies of the head/neck gesture formulas.
///
/// All amplitudes are radians; frequencies are Hz of the underlying
/// oscillation. Values are small on purpose: a speaking head moves a few
/// degrees, not tens of degrees.
#[derive(Debug, Clone)]
pub struct GestureMotion {
    // Variant 0: idle wander (layered slow sines)
    /// Idle wander amplitude (radians)
    pub idle_amplitude_rad: f32,

    /// Idle wander primary frequency (Hz)
    pub idle_freq_primary_hz: f32,

    /// Idle wander secondary frequency (Hz)
    pub idle_freq_secondary_hz: f32,

    // Speaking variants
    /// Nod pitch amplitude (radians)
    pub nod_amplitude_rad: f32,

    /// Nod frequency (Hz)
    pub nod_freq_hz: f32,

    /// Tilt roll amplitude (radians)
    pub tilt_amplitude_rad: f32,

    /// Tilt frequency (Hz)
    pub tilt_freq_hz: f32,

    /// Shake yaw amplitude (radians)
    pub shake_amplitude_rad: f32,

    /// Shake frequency (Hz)
    pub shake_freq_hz: f32,

    /// Forward-lean pitch amplitude (radians)
    pub lean_amplitude_rad: f32,

    /// Forward-lean bob frequency (Hz)
    pub lean_bob_freq_hz: f32,

    /// Side-glance yaw amplitude (radians)
    pub glance_amplitude_rad: f32,

    /// Side-glance drift frequency (Hz)
    pub glance_drift_freq_hz: f32,

    /// Look-down pitch amplitude (radians)
    pub look_down_amplitude_rad: f32,

    /// Look-down bob frequency (Hz)
    pub look_down_bob_freq_hz: f32,

    /// Fraction of the head formula the neck follows
    pub neck_follow: f32,

    // Micro-movement (speech jitter on top of the blended target)
    /// Micro-movement amplitude at full speech intensity (radians)
    pub micro_amplitude_rad: f32,

    /// Micro-movement pitch frequency (Hz)
    pub micro_freq_pitch_hz: f32,

    /// Micro-movement yaw frequency (Hz)
    pub micro_freq_yaw_hz: f32,
}

impl Default for GestureMotion {
    fn default() -> Self {
        Self {
            idle_amplitude_rad: 0.025,
            idle_freq_primary_hz: 0.11,
            idle_freq_secondary_hz: 0.07,

            nod_amplitude_rad: 0.09,
            nod_freq_hz: 1.7,
            tilt_amplitude_rad: 0.12,
            tilt_freq_hz: 0.6,
            shake_amplitude_rad: 0.07,
            shake_freq_hz: 2.1,
            lean_amplitude_rad: 0.12,
            lean_bob_freq_hz: 0.5,
            glance_amplitude_rad: 0.16,
            glance_drift_freq_hz: 0.35,
            look_down_amplitude_rad: 0.14,
            look_down_bob_freq_hz: 0.4,

            neck_follow: 0.45,

            micro_amplitude_rad: 0.012,
            micro_freq_pitch_hz: 1.3,
            micro_freq_yaw_hz: 1.9,
        }
    }
}

/// Body motion amplitudes, frequencies and activation thresholds.
#[derive(Debug, Clone)]
pub struct BodyMotion {
    // Breathing (continuous; spine and chest pitch)
    /// Breathing frequency (Hz; 0.25 ≈ 15 breaths/min)
    pub breath_freq_hz: f32,

    /// Breathing pitch amplitude at rest (radians)
    pub breath_amplitude_rad: f32,

    /// Extra breathing amplitude at full speech intensity (radians)
    pub breath_intensity_bonus_rad: f32,

    /// Phase lag of the chest behind the spine (radians)
    pub chest_phase_lag_rad: f32,

    // Shoulders (speech emphasis only)
    /// Speech intensity above which the shoulders engage
    pub shoulder_threshold: f32,

    /// Shoulder raise at full excess intensity (radians)
    pub shoulder_raise_rad: f32,

    /// Shoulder sway frequency while engaged (Hz)
    pub shoulder_sway_freq_hz: f32,

    // Arms and hands
    /// Arm gesture oscillation frequency (Hz)
    pub arm_swing_freq_hz: f32,

    /// Upper arm amplitude at full intensity (radians)
    pub upper_arm_amplitude_rad: f32,

    /// Lower arm amplitude at full intensity (radians)
    pub lower_arm_amplitude_rad: f32,

    /// Hand amplitude at full intensity (radians)
    pub hand_amplitude_rad: f32,

    /// Speech intensity above which the emphasis multiplier kicks in
    pub emphasis_threshold: f32,

    /// Arm/hand amplitude multiplier right at the emphasis threshold
    pub emphasis_min_multiplier: f32,

    /// Arm/hand amplitude multiplier at full speech intensity
    pub emphasis_max_multiplier: f32,

    // Relaxed idle pose (targets while silent)
    /// Upper arm inward rotation at rest (radians, mirrored per side)
    pub relaxed_upper_arm_rad: f32,

    /// Lower arm bend at rest (radians)
    pub relaxed_lower_arm_rad: f32,

    // Hips (continuous)
    /// Hip sway frequency (Hz)
    pub hip_sway_freq_hz: f32,

    /// Hip sway amplitude (radians)
    pub hip_sway_amplitude_rad: f32,

    // Fingers
    /// Speech intensity above which the fingers curl
    pub finger_curl_threshold: f32,

    /// Additional curl at full excess intensity (radians)
    pub finger_curl_amplitude_rad: f32,

    /// Finger curl wave frequency (Hz)
    pub finger_wave_freq_hz: f32,

    /// Phase offset between consecutive finger segments (radians)
    pub finger_phase_step_rad: f32,

    /// Natural slight curl at rest (radians)
    pub relaxed_finger_curl_rad: f32,
}

impl Default for BodyMotion {
    fn default() -> Self {
        Self {
            breath_freq_hz: 0.25,
            breath_amplitude_rad: 0.025,
            breath_intensity_bonus_rad: 0.035,
            chest_phase_lag_rad: 0.6,

            shoulder_threshold: 0.4,
            shoulder_raise_rad: 0.08,
            shoulder_sway_freq_hz: 0.9,

            arm_swing_freq_hz: 1.1,
            upper_arm_amplitude_rad: 0.1,
            lower_arm_amplitude_rad: 0.14,
            hand_amplitude_rad: 0.12,
            emphasis_threshold: 0.5,
            emphasis_min_multiplier: 1.1,
            emphasis_max_multiplier: 1.6,

            relaxed_upper_arm_rad: 0.06,
            relaxed_lower_arm_rad: 0.12,

            hip_sway_freq_hz: 0.14,
            hip_sway_amplitude_rad: 0.02,

            finger_curl_threshold: 0.3,
            finger_curl_amplitude_rad: 0.5,
            finger_wave_freq_hz: 0.8,
            finger_phase_step_rad: 0.4,
            relaxed_finger_curl_rad: 0.15,
        }
    }
}

/// Complete avatar parameter set.
#[derive(Debug, Clone, Default)]
pub struct AvatarParams {
    pub spectrum: SpectrumConfig,
    pub detection: SpeechDetection,
    pub rates: SmoothingRates,
    pub lips: LipShapeMapping,
    pub expression: ExpressionTiming,
    pub gesture_timing: GestureTiming,
    pub gesture_motion: GestureMotion,
    pub body: BodyMotion,

    /// Base RNG seed for gesture/mood selection; `None` seeds from entropy.
    /// Fixing this makes a whole run reproducible.
    pub rng_seed: Option<u64>,
}

impl AvatarParams {
    /// Validate the full parameter set.
    pub fn validate(&self) -> Result<(), String> {
        self.spectrum.validate()?;
        self.detection.validate()?;
        self.rates.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AvatarParams::default().validate().is_ok());
    }

    #[test]
    fn test_spectrum_config_rejects_non_power_of_two() {
        let mut config = SpectrumConfig::default();
        config.fft_size = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_detection_rejects_inverted_thresholds() {
        let mut detection = SpeechDetection::default();
        detection.sustain_threshold = detection.enter_threshold;
        assert!(detection.validate().is_err());
    }

    #[test]
    fn test_rates_rejects_out_of_range() {
        let mut rates = SmoothingRates::default();
        rates.mouth = 1.0;
        assert!(rates.validate().is_err());
    }

    #[test]
    fn test_magnitude_norm_tracks_fft_size() {
        let config = SpectrumConfig::default();
        assert_eq!(config.magnitude_norm(), config.fft_size as f32 * 0.25);
        assert_eq!(config.bin_count(), config.fft_size / 2);
    }
}
