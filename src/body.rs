//! Torso, arm, hip and finger animation driven by speech intensity.
//!
//! Everything here is a closed-form oscillation: no random state, no
//! variant machine. Breathing and hip sway run whether or not anyone is
//! talking; shoulders, arm gestures and finger curl fade in above their
//! intensity thresholds and the smoothing channels carry every limb back
//! to the relaxed pose when speech ends.

use glam::Vec3;
use std::f32::consts::{PI, TAU};

use crate::audio::SpeechState;
use crate::params::{AvatarParams, BodyMotion};
use crate::rig::{bones, Rig};
use crate::smoothing::{Channel, Channel3};

pub struct BodyAnimator {
    motion: BodyMotion,
    elapsed: f32,

    spine: Channel3,
    chest: Channel3,
    shoulder_l: Channel3,
    shoulder_r: Channel3,
    upper_arm_l: Channel3,
    upper_arm_r: Channel3,
    lower_arm_l: Channel3,
    lower_arm_r: Channel3,
    hand_l: Channel3,
    hand_r: Channel3,
    hips: Channel3,

    // Curl channel per finger segment, in `bones::finger_segments` order so
    // the per-segment phase offsets are stable
    fingers: Vec<(String, Channel)>,
}

impl BodyAnimator {
    pub fn new(params: &AvatarParams) -> Self {
        let rates = &params.rates;
        let fingers = bones::finger_segments()
            .into_iter()
            .map(|name| (name, Channel::new(params.body.relaxed_finger_curl_rad, rates.fingers)))
            .collect();

        Self {
            motion: params.body.clone(),
            elapsed: 0.0,
            spine: Channel3::new(Vec3::ZERO, rates.breathing),
            chest: Channel3::new(Vec3::ZERO, rates.breathing),
            shoulder_l: Channel3::new(Vec3::ZERO, rates.shoulders),
            shoulder_r: Channel3::new(Vec3::ZERO, rates.shoulders),
            upper_arm_l: Channel3::new(Vec3::ZERO, rates.arms),
            upper_arm_r: Channel3::new(Vec3::ZERO, rates.arms),
            lower_arm_l: Channel3::new(Vec3::ZERO, rates.arms),
            lower_arm_r: Channel3::new(Vec3::ZERO, rates.arms),
            hand_l: Channel3::new(Vec3::ZERO, rates.hands),
            hand_r: Channel3::new(Vec3::ZERO, rates.hands),
            hips: Channel3::new(Vec3::ZERO, rates.hips),
            fingers,
        }
    }

    /// Advance one frame and write every body bone rotation.
    pub fn update(&mut self, dt: f32, speech: &SpeechState, rig: &mut Rig) {
        let dt = dt.max(0.0);
        self.elapsed += dt;
        let t = self.elapsed;
        let intensity = speech.intensity;

        // Breathing never stops; speech just deepens it.
        let breath_amp =
            self.motion.breath_amplitude_rad + intensity * self.motion.breath_intensity_bonus_rad;
        let breath_phase = TAU * self.motion.breath_freq_hz * t;
        self.spine
            .set_target(Vec3::new(breath_phase.sin() * breath_amp, 0.0, 0.0));
        self.chest.set_target(Vec3::new(
            (breath_phase - self.motion.chest_phase_lag_rad).sin() * breath_amp,
            0.0,
            0.0,
        ));
        rig.set_bone_rotation(bones::SPINE, self.spine.advance(dt));
        rig.set_bone_rotation(bones::CHEST, self.chest.advance(dt));

        let (shoulder_l, shoulder_r) = shoulder_targets(&self.motion, t, intensity);
        self.shoulder_l.set_target(shoulder_l);
        self.shoulder_r.set_target(shoulder_r);
        rig.set_bone_rotation(bones::LEFT_SHOULDER, self.shoulder_l.advance(dt));
        rig.set_bone_rotation(bones::RIGHT_SHOULDER, self.shoulder_r.advance(dt));

        let (upper_l, lower_l, hand_l) =
            arm_targets(&self.motion, t, intensity, speech.is_speaking, 1.0);
        let (upper_r, lower_r, hand_r) =
            arm_targets(&self.motion, t, intensity, speech.is_speaking, -1.0);
        self.upper_arm_l.set_target(upper_l);
        self.upper_arm_r.set_target(upper_r);
        self.lower_arm_l.set_target(lower_l);
        self.lower_arm_r.set_target(lower_r);
        self.hand_l.set_target(hand_l);
        self.hand_r.set_target(hand_r);
        rig.set_bone_rotation(bones::LEFT_UPPER_ARM, self.upper_arm_l.advance(dt));
        rig.set_bone_rotation(bones::RIGHT_UPPER_ARM, self.upper_arm_r.advance(dt));
        rig.set_bone_rotation(bones::LEFT_LOWER_ARM, self.lower_arm_l.advance(dt));
        rig.set_bone_rotation(bones::RIGHT_LOWER_ARM, self.lower_arm_r.advance(dt));
        rig.set_bone_rotation(bones::LEFT_HAND, self.hand_l.advance(dt));
        rig.set_bone_rotation(bones::RIGHT_HAND, self.hand_r.advance(dt));

        // Hip sway is continuous, like breathing
        self.hips.set_target(Vec3::new(
            0.0,
            0.0,
            self.motion.hip_sway_amplitude_rad * (TAU * self.motion.hip_sway_freq_hz * t).sin(),
        ));
        rig.set_bone_rotation(bones::HIPS, self.hips.advance(dt));

        self.update_fingers(dt, t, intensity, rig);
    }

    fn update_fingers(&mut self, dt: f32, t: f32, intensity: f32, rig: &mut Rig) {
        let excess_curl = if intensity > self.motion.finger_curl_threshold {
            let excess = (intensity - self.motion.finger_curl_threshold)
                / (1.0 - self.motion.finger_curl_threshold);
            excess.clamp(0.0, 1.0) * self.motion.finger_curl_amplitude_rad
        } else {
            0.0
        };
        let relaxed = self.motion.relaxed_finger_curl_rad;
        let wave_freq = self.motion.finger_wave_freq_hz;
        let phase_step = self.motion.finger_phase_step_rad;

        for (index, (name, channel)) in self.fingers.iter_mut().enumerate() {
            let wave = (TAU * wave_freq * t - phase_step * index as f32).sin();
            channel.set_target(relaxed + excess_curl * (0.5 + 0.5 * wave));
            rig.set_bone_rotation(name, Vec3::new(channel.advance(dt), 0.0, 0.0));
        }
    }
}

/// Amplitude multiplier for arm/hand gestures; ramps from the minimum to
/// the maximum multiplier as intensity rises past the emphasis threshold.
fn emphasis(motion: &BodyMotion, intensity: f32) -> f32 {
    if intensity <= motion.emphasis_threshold {
        return 1.0;
    }
    let excess =
        ((intensity - motion.emphasis_threshold) / (1.0 - motion.emphasis_threshold)).clamp(0.0, 1.0);
    motion.emphasis_min_multiplier
        + (motion.emphasis_max_multiplier - motion.emphasis_min_multiplier) * excess
}

/// Shoulder rotation targets; zero until intensity clears the threshold.
fn shoulder_targets(motion: &BodyMotion, t: f32, intensity: f32) -> (Vec3, Vec3) {
    if intensity <= motion.shoulder_threshold {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    let excess =
        ((intensity - motion.shoulder_threshold) / (1.0 - motion.shoulder_threshold)).clamp(0.0, 1.0);
    let raise = motion.shoulder_raise_rad * excess;
    let sway = (TAU * motion.shoulder_sway_freq_hz * t).sin();
    (
        Vec3::new(0.0, 0.0, raise * (0.8 + 0.2 * sway)),
        Vec3::new(0.0, 0.0, -raise * (0.8 - 0.2 * sway)),
    )
}

/// (upper arm, lower arm, hand) rotation targets for one side
/// (`side` is +1 for left, -1 for right; the right arm swings in
/// counter-phase).
fn arm_targets(
    motion: &BodyMotion,
    t: f32,
    intensity: f32,
    speaking: bool,
    side: f32,
) -> (Vec3, Vec3, Vec3) {
    if !speaking {
        return (
            Vec3::new(0.0, 0.0, side * motion.relaxed_upper_arm_rad),
            Vec3::new(motion.relaxed_lower_arm_rad, 0.0, 0.0),
            Vec3::ZERO,
        );
    }

    let phase = if side > 0.0 { 0.0 } else { PI };
    let drive = intensity * emphasis(motion, intensity);
    let swing = TAU * motion.arm_swing_freq_hz * t + phase;

    let upper = Vec3::new(
        motion.upper_arm_amplitude_rad * drive * swing.sin(),
        0.0,
        side * motion.relaxed_upper_arm_rad * 0.5,
    );
    // The elbow keeps a positive bend; the oscillation rides on top of it
    let lower = Vec3::new(
        motion.relaxed_lower_arm_rad * 0.5
            + motion.lower_arm_amplitude_rad * drive * (0.5 + 0.5 * (swing + 0.8).sin()),
        0.0,
        0.0,
    );
    let hand = Vec3::new(
        0.0,
        0.0,
        motion.hand_amplitude_rad * drive * (swing + 1.6).sin(),
    );
    (upper, lower, hand)
}
