//! Facial expression control: lip sync, blinking, and the mood machine.
//!
//! Three independent layers write disjoint expression channels each frame:
//! the four viseme shapes track the spectrum bands while speech is active,
//! the blink scheduler fires a short triangular closure at random
//! intervals, and the mood machine rotates through emotive weight sets
//! while speaking and fades back to neutral in silence. Every channel is a
//! target smoothed at its own rate, so nothing written to the rig ever
//! snaps.

use rand::rngs::StdRng;
use rand::Rng;

use crate::audio::SpeechState;
use crate::params::{AvatarParams, ExpressionTiming, LipShapeMapping};
use crate::rig::{expressions, Rig};
use crate::smoothing::{ease_in_out, Channel};

/// Emotional coloring applied while the avatar is speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Neutral,
    Happy,
    Surprised,
    Thinking,
    Relaxed,
}

const SPEAKING_MOODS: [Mood; 4] = [Mood::Happy, Mood::Surprised, Mood::Thinking, Mood::Relaxed];

/// Emotive weight rows, indexed like [`expressions::EMOTIVE`]:
/// neutral, happy, angry, sad, relaxed, surprised.
fn mood_weights(mood: Mood, intensity: f32) -> [f32; 6] {
    let mut weights = [0.0; 6];
    match mood {
        Mood::Neutral => {}
        Mood::Happy => {
            weights[1] = 1.0;
            weights[4] = 0.2;
        }
        Mood::Surprised => {
            weights[5] = 1.0;
        }
        // No dedicated "thinking" preset exists; a light brow-knit mix of
        // angry and sad reads as concentration at low weight.
        Mood::Thinking => {
            weights[2] = 0.6;
            weights[3] = 0.4;
        }
        Mood::Relaxed => {
            weights[4] = 1.0;
            weights[1] = 0.15;
        }
    }
    for weight in &mut weights {
        *weight *= intensity;
    }
    weights
}

pub struct ExpressionController {
    timing: ExpressionTiming,
    mapping: LipShapeMapping,
    rng: StdRng,
    elapsed: f32,

    // Viseme channels: aa, ih, ou, oh
    lips: [Channel; 4],

    blink: Channel,
    next_blink: f32,
    blink_started: Option<f32>,

    mood: Mood,
    mood_from: [f32; 6],
    mood_to: [f32; 6],
    fade_progress: f32,
    next_mood: f32,
    emotive: [Channel; 6],
}

impl ExpressionController {
    pub fn new(params: &AvatarParams, mut rng: StdRng) -> Self {
        let timing = params.expression.clone();
        let mouth = params.rates.mouth;
        let expr = params.rates.expressions;
        let next_blink =
            rng.gen_range(timing.blink_min_interval_s..=timing.blink_max_interval_s);

        Self {
            timing,
            mapping: params.lips.clone(),
            rng,
            elapsed: 0.0,
            lips: [
                Channel::new(0.0, mouth),
                Channel::new(0.0, mouth),
                Channel::new(0.0, mouth),
                Channel::new(0.0, mouth),
            ],
            blink: Channel::new(0.0, mouth),
            next_blink,
            blink_started: None,
            mood: Mood::Neutral,
            mood_from: [0.0; 6],
            mood_to: [0.0; 6],
            fade_progress: 1.0,
            next_mood: 0.0,
            emotive: [
                Channel::new(0.0, expr),
                Channel::new(0.0, expr),
                Channel::new(0.0, expr),
                Channel::new(0.0, expr),
                Channel::new(0.0, expr),
                Channel::new(0.0, expr),
            ],
        }
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    /// Advance one frame and write lip, blink and emotive weights to the rig.
    pub fn update(&mut self, dt: f32, speech: &SpeechState, rig: &mut Rig) {
        let dt = dt.max(0.0);
        self.elapsed += dt;

        self.update_lips(dt, speech, rig);
        self.update_blink(dt, rig);
        self.update_mood(dt, speech, rig);
    }

    fn update_lips(&mut self, dt: f32, speech: &SpeechState, rig: &mut Rig) {
        let targets = if speech.is_speaking {
            [
                (speech.band_low * self.mapping.open_from_low).clamp(0.0, 1.0),
                (speech.band_high * self.mapping.narrow_from_high).clamp(0.0, 1.0),
                (speech.band_mid * self.mapping.rounded_from_mid).clamp(0.0, 1.0),
                ((speech.band_low + speech.band_mid) * self.mapping.rounded_open_from_low_mid)
                    .clamp(0.0, 1.0),
            ]
        } else {
            [0.0; 4]
        };

        let names = [expressions::AA, expressions::IH, expressions::OU, expressions::OH];
        for ((channel, target), name) in self.lips.iter_mut().zip(targets).zip(names) {
            channel.set_target(target);
            rig.set_expression(name, channel.advance(dt));
        }
    }

    /// Blinks run on their own clock, speaking or not. Each pulse is a
    /// triangular close/open of `blink_width_s`; the next blink time is
    /// reseeded when the pulse completes.
    fn update_blink(&mut self, dt: f32, rig: &mut Rig) {
        if self.blink_started.is_none() && self.elapsed >= self.next_blink {
            self.blink_started = Some(self.elapsed);
        }

        let target = match self.blink_started {
            Some(start) => {
                let phase = (self.elapsed - start) / self.timing.blink_width_s;
                if phase >= 1.0 {
                    self.blink_started = None;
                    self.next_blink = self.elapsed
                        + self
                            .rng
                            .gen_range(self.timing.blink_min_interval_s..=self.timing.blink_max_interval_s);
                    0.0
                } else {
                    ease_in_out(1.0 - (2.0 * phase - 1.0).abs())
                }
            }
            None => 0.0,
        };

        self.blink.set_target(target);
        rig.set_expression(expressions::BLINK, self.blink.advance(dt));
    }

    fn update_mood(&mut self, dt: f32, speech: &SpeechState, rig: &mut Rig) {
        if self.fade_progress < 1.0 {
            self.fade_progress = (self.fade_progress + dt / self.timing.mood_fade_s).min(1.0);
        }

        if speech.is_speaking {
            // Rotation waits for the previous fade; only the silence edge
            // below may interrupt one.
            if self.elapsed >= self.next_mood && self.fade_progress >= 1.0 {
                let mood = SPEAKING_MOODS[self.rng.gen_range(0..SPEAKING_MOODS.len())];
                let intensity = self
                    .rng
                    .gen_range(self.timing.mood_min_intensity..=self.timing.mood_max_intensity);
                self.begin_mood(mood, intensity);
                self.next_mood = self.elapsed
                    + self
                        .rng
                        .gen_range(self.timing.mood_min_hold_s..=self.timing.mood_max_hold_s);
            }
        } else if self.mood != Mood::Neutral {
            self.begin_mood(Mood::Neutral, 0.0);
        }

        let targets = self.effective_weights();
        for ((channel, target), name) in
            self.emotive.iter_mut().zip(targets).zip(expressions::EMOTIVE)
        {
            channel.set_target(target);
            rig.set_expression(name, channel.advance(dt));
        }
    }

    /// Start an eased fade from whatever the mood targets currently are.
    /// Snapshotting the in-flight blend means an interruption (silence
    /// mid-fade, speech resuming) never jumps the targets.
    fn begin_mood(&mut self, mood: Mood, intensity: f32) {
        self.mood_from = self.effective_weights();
        self.mood_to = mood_weights(mood, intensity);
        self.mood = mood;
        self.fade_progress = 0.0;
    }

    fn effective_weights(&self) -> [f32; 6] {
        let blend = ease_in_out(self.fade_progress);
        let mut weights = [0.0; 6];
        for (i, weight) in weights.iter_mut().enumerate() {
            *weight = self.mood_from[i] + (self.mood_to[i] - self.mood_from[i]) * blend;
        }
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn controller(seed: u64) -> ExpressionController {
        ExpressionController::new(&AvatarParams::default(), StdRng::seed_from_u64(seed))
    }

    fn speaking() -> SpeechState {
        SpeechState {
            is_speaking: true,
            volume: 0.5,
            band_low: 0.6,
            band_mid: 0.4,
            band_high: 0.2,
            intensity: 0.5,
        }
    }

    fn silent() -> SpeechState {
        SpeechState::default()
    }

    #[test]
    fn test_lips_follow_bands_then_release() {
        let mut ctrl = controller(7);
        let mut rig = Rig::standard_humanoid();

        for _ in 0..60 {
            ctrl.update(DT, &speaking(), &mut rig);
        }
        // aa target = 0.6 * 0.8 = 0.48; one second at rate 0.25 gets close
        assert!(rig.expression(expressions::AA).unwrap() > 0.3);
        assert!(rig.expression(expressions::OU).unwrap() > 0.1);

        for _ in 0..180 {
            ctrl.update(DT, &silent(), &mut rig);
        }
        for name in [expressions::AA, expressions::IH, expressions::OU, expressions::OH] {
            assert!(rig.expression(name).unwrap() < 0.01, "{} still open", name);
        }
    }

    #[test]
    fn test_rounded_open_sums_low_and_mid_bands() {
        let mut ctrl = controller(7);
        let mut rig = Rig::standard_humanoid();
        let speech = SpeechState {
            is_speaking: true,
            volume: 0.5,
            band_low: 1.0,
            band_mid: 1.0,
            band_high: 0.0,
            intensity: 0.5,
        };

        for _ in 0..600 {
            ctrl.update(DT, &speech, &mut rig);
        }
        // oh = (low + mid) * 0.4 = 0.8, the same weight aa gets from
        // low * 0.8; both bands contribute at full strength
        assert!((rig.expression(expressions::OH).unwrap() - 0.8).abs() < 0.01);
        assert!((rig.expression(expressions::AA).unwrap() - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_blink_fires_and_clears() {
        let mut ctrl = controller(11);
        let mut rig = Rig::standard_humanoid();

        let mut history = Vec::new();
        for _ in 0..600 {
            ctrl.update(DT, &silent(), &mut rig);
            history.push(rig.expression(expressions::BLINK).unwrap());
        }

        // At least one blink within the 6 s maximum interval
        let (peak_frame, peak) = history
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, v)| (i, *v))
            .unwrap();
        assert!(peak > 0.3, "no blink pulse seen (peak {})", peak);

        // Eyes reopen within 1.5 s of the peak (the minimum 2.5 s gap
        // guarantees no second pulse lands in that window)
        let reopened = history[peak_frame..(peak_frame + 90).min(history.len())]
            .iter()
            .any(|w| *w < 0.05);
        assert!(reopened);
    }

    #[test]
    fn test_mood_engages_with_speech_and_releases() {
        let mut ctrl = controller(3);
        let mut rig = Rig::standard_humanoid();

        for _ in 0..120 {
            ctrl.update(DT, &speaking(), &mut rig);
        }
        assert_ne!(ctrl.mood(), Mood::Neutral);
        let engaged: f32 = expressions::EMOTIVE
            .iter()
            .map(|name| rig.expression(name).unwrap())
            .sum();
        assert!(engaged > 0.05, "no emotive weight engaged ({})", engaged);

        for _ in 0..600 {
            ctrl.update(DT, &silent(), &mut rig);
        }
        assert_eq!(ctrl.mood(), Mood::Neutral);
        for name in expressions::EMOTIVE {
            assert!(rig.expression(name).unwrap() < 0.01);
        }
    }

    #[test]
    fn test_mood_transition_never_snaps() {
        let mut ctrl = controller(19);
        let mut rig = Rig::standard_humanoid();
        let mut previous: Option<Vec<f32>> = None;

        // Speaking, then silence, then speaking again: every emotive weight
        // must move gradually through all three phases.
        for frame in 0..900 {
            let speech = if (300..450).contains(&frame) {
                silent()
            } else {
                speaking()
            };
            ctrl.update(DT, &speech, &mut rig);

            let weights: Vec<f32> = expressions::EMOTIVE
                .iter()
                .map(|name| rig.expression(name).unwrap())
                .collect();
            if let Some(prev) = &previous {
                for (a, b) in prev.iter().zip(&weights) {
                    assert!((a - b).abs() < 0.04, "weight jumped {} -> {}", a, b);
                }
            }
            previous = Some(weights);
        }
    }

    #[test]
    fn test_negative_dt_does_not_rewind_mood_fade() {
        let mut a = controller(42);
        let mut b = controller(42);
        let mut rig_a = Rig::standard_humanoid();
        let mut rig_b = Rig::standard_humanoid();

        // The first mood fade starts on the first speaking frame and runs
        // 1.25 s; feed one controller backward clock steps mid-fade.
        for _ in 0..40 {
            a.update(DT, &speaking(), &mut rig_a);
            b.update(DT, &speaking(), &mut rig_b);
        }
        for _ in 0..10 {
            a.update(-DT, &speaking(), &mut rig_a);
        }
        for _ in 0..80 {
            a.update(DT, &speaking(), &mut rig_a);
            b.update(DT, &speaking(), &mut rig_b);
        }

        // Backward steps are no-ops, so the weights stay in lockstep
        for name in expressions::EMOTIVE {
            assert_eq!(rig_a.expression(name), rig_b.expression(name), "{}", name);
        }
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let mut a = controller(42);
        let mut b = controller(42);
        let mut rig_a = Rig::standard_humanoid();
        let mut rig_b = Rig::standard_humanoid();

        for frame in 0..300 {
            let speech = if frame < 150 { speaking() } else { silent() };
            a.update(DT, &speech, &mut rig_a);
            b.update(DT, &speech, &mut rig_b);
        }

        for name in rig_a.expression_names() {
            assert_eq!(rig_a.expression(name), rig_b.expression(name), "{}", name);
        }
        assert_eq!(a.mood(), b.mood());
    }
}
