//! Head and neck gestures: variant selection, cross-fading, micro-movement.
//!
//! While speech is active the controller cycles through small procedural
//! head motions (nods, tilts, glances...), holding each for a few seconds.
//! Switching variants never snaps: the head target blends from a snapshot
//! of the outgoing pose to the new formula over an eased cross-fade. In
//! silence the controller drops straight to a slow idle wander; the
//! rotation channels' own smoothing covers that switch.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::Rng;
use std::f32::consts::TAU;

use crate::audio::SpeechState;
use crate::params::{AvatarParams, GestureMotion, GestureTiming};
use crate::rig::{bones, expressions, Rig};
use crate::smoothing::{ease_in_out, Channel, Channel3};

/// One procedural head motion. `Idle` doubles as the silence fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureVariant {
    Idle,
    Nod,
    Tilt,
    Shake,
    Lean,
    Glance,
    LookDown,
}

impl GestureVariant {
    pub const ALL: [GestureVariant; 7] = [
        GestureVariant::Idle,
        GestureVariant::Nod,
        GestureVariant::Tilt,
        GestureVariant::Shake,
        GestureVariant::Lean,
        GestureVariant::Glance,
        GestureVariant::LookDown,
    ];
}

/// Raw head rotation target for a variant, `t` seconds after the variant
/// began, in radians (x pitch, y yaw, z roll). The phase clock restarts at
/// every variant change, so each motion starts from its rest point.
fn head_formula(motion: &GestureMotion, variant: GestureVariant, t: f32) -> Vec3 {
    match variant {
        GestureVariant::Idle => Vec3::new(
            motion.idle_amplitude_rad
                * (0.6 * (TAU * motion.idle_freq_primary_hz * t).sin()
                    + 0.4 * (TAU * motion.idle_freq_secondary_hz * 1.3 * t).sin()),
            motion.idle_amplitude_rad * (TAU * motion.idle_freq_secondary_hz * t + 1.3).sin(),
            0.5 * motion.idle_amplitude_rad
                * (TAU * motion.idle_freq_primary_hz * 0.8 * t + 2.1).sin(),
        ),
        GestureVariant::Nod => Vec3::new(
            motion.nod_amplitude_rad * (TAU * motion.nod_freq_hz * t).sin(),
            0.0,
            0.0,
        ),
        GestureVariant::Tilt => Vec3::new(
            0.0,
            0.0,
            motion.tilt_amplitude_rad * (TAU * motion.tilt_freq_hz * t).sin(),
        ),
        GestureVariant::Shake => Vec3::new(
            0.0,
            motion.shake_amplitude_rad * (TAU * motion.shake_freq_hz * t).sin(),
            0.0,
        ),
        // Held forward lean with a slow bob, rather than a pure oscillation
        GestureVariant::Lean => Vec3::new(
            motion.lean_amplitude_rad * (0.6 + 0.4 * (TAU * motion.lean_bob_freq_hz * t).sin()),
            0.0,
            0.0,
        ),
        GestureVariant::Glance => Vec3::new(
            0.0,
            motion.glance_amplitude_rad * (TAU * motion.glance_drift_freq_hz * t).sin(),
            0.0,
        ),
        GestureVariant::LookDown => Vec3::new(
            motion.look_down_amplitude_rad
                * (0.7 + 0.3 * (TAU * motion.look_down_bob_freq_hz * t).sin()),
            0.0,
            0.0,
        ),
    }
}

/// Inner-brow raise accompanying each variant.
fn brow_level(variant: GestureVariant) -> f32 {
    match variant {
        GestureVariant::Idle => 0.0,
        GestureVariant::Nod => 0.2,
        GestureVariant::Tilt => 0.35,
        GestureVariant::Shake => 0.1,
        GestureVariant::Lean => 0.3,
        GestureVariant::Glance => 0.4,
        GestureVariant::LookDown => 0.15,
    }
}

/// Speech jitter layered on the blended head target, scaled by intensity.
fn micro_offset(motion: &GestureMotion, t: f32, intensity: f32) -> Vec3 {
    let gain = motion.micro_amplitude_rad * intensity;
    Vec3::new(
        gain * (TAU * motion.micro_freq_pitch_hz * t).sin(),
        gain * (TAU * motion.micro_freq_yaw_hz * t + 0.7).sin(),
        0.0,
    )
}

pub struct GestureController {
    timing: GestureTiming,
    motion: GestureMotion,
    rng: StdRng,
    elapsed: f32,

    variant: GestureVariant,
    // Seconds since the current variant was selected
    phase: f32,
    previous_pose: Vec3,
    fade_progress: f32,
    next_select: f32,
    last_effective: Vec3,
    was_speaking: bool,

    head: Channel3,
    neck: Channel3,
    brow: Channel,
}

impl GestureController {
    pub fn new(params: &AvatarParams, rng: StdRng) -> Self {
        Self {
            timing: params.gesture_timing.clone(),
            motion: params.gesture_motion.clone(),
            rng,
            elapsed: 0.0,
            variant: GestureVariant::Idle,
            phase: 0.0,
            previous_pose: Vec3::ZERO,
            fade_progress: 1.0,
            next_select: 0.0,
            last_effective: Vec3::ZERO,
            was_speaking: false,
            head: Channel3::new(Vec3::ZERO, params.rates.head),
            neck: Channel3::new(Vec3::ZERO, params.rates.neck),
            brow: Channel::new(0.0, params.rates.expressions),
        }
    }

    pub fn variant(&self) -> GestureVariant {
        self.variant
    }

    /// Advance one frame and write head/neck rotations and the brow weight.
    pub fn update(&mut self, dt: f32, speech: &SpeechState, rig: &mut Rig) {
        let dt = dt.max(0.0);
        self.elapsed += dt;
        self.phase += dt;
        self.select_variant(speech);

        if self.fade_progress < 1.0 {
            self.fade_progress = (self.fade_progress + dt / self.timing.crossfade_s).min(1.0);
        }

        let raw = head_formula(&self.motion, self.variant, self.phase);
        let mut effective = self
            .previous_pose
            .lerp(raw, ease_in_out(self.fade_progress));
        if speech.is_speaking {
            effective += micro_offset(&self.motion, self.elapsed, speech.intensity);
        }
        self.last_effective = effective;

        self.head.set_target(effective);
        rig.set_bone_rotation(bones::HEAD, self.head.advance(dt));

        // The cross-fade covers the head only; neck and brow take the new
        // variant's values directly and lean on their slower rates.
        self.neck.set_target(raw * self.motion.neck_follow);
        rig.set_bone_rotation(bones::NECK, self.neck.advance(dt));

        self.brow.set_target(brow_level(self.variant));
        rig.set_expression(expressions::BROWS_UP, self.brow.advance(dt));

        self.was_speaking = speech.is_speaking;
    }

    fn select_variant(&mut self, speech: &SpeechState) {
        if speech.is_speaking {
            if !self.was_speaking {
                // Fresh speech: pick right away and hold the first choice a
                // fixed beat before rotation starts.
                let variant = self.random_variant();
                self.begin_variant(variant);
                self.next_select = self.elapsed + self.timing.entry_hold_s;
            } else if self.elapsed >= self.next_select {
                let variant = self.random_variant();
                self.begin_variant(variant);
                self.next_select = self.elapsed
                    + self
                        .rng
                        .gen_range(self.timing.min_hold_s..=self.timing.max_hold_s);
            }
        } else if self.variant != GestureVariant::Idle {
            // Silence switches the target straight to the idle formula, no
            // cross-fade; the head/neck channels smooth the transition.
            self.variant = GestureVariant::Idle;
            self.phase = 0.0;
            self.fade_progress = 1.0;
        }
    }

    fn begin_variant(&mut self, variant: GestureVariant) {
        self.previous_pose = self.last_effective;
        self.variant = variant;
        self.phase = 0.0;
        self.fade_progress = 0.0;
    }

    fn random_variant(&mut self) -> GestureVariant {
        GestureVariant::ALL[self.rng.gen_range(0..GestureVariant::ALL.len())]
    }
}
