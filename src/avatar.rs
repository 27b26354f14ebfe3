//! Avatar instance: lifecycle, per-frame orchestration, resource teardown.
//!
//! An [`Avatar`] starts in `Loading`, becomes `Ready` once a valid rig is
//! attached, and animates only while it is `Ready` and visible. Each frame
//! runs one pass of audio feature extraction and hands the result to the
//! gesture, expression and body subsystems, which write disjoint channels
//! of the rig. `dispose` tears everything down in a fixed order and is safe
//! to call any number of times.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::audio::{AudioFeatures, SpectrumSource, SpeechState};
use crate::body::BodyAnimator;
use crate::error::{AvatarError, AvatarResult};
use crate::expression::{ExpressionController, Mood};
use crate::gesture::{GestureController, GestureVariant};
use crate::params::AvatarParams;
use crate::rig::Rig;

/// Where an avatar instance is in its life.
///
/// `Error` and `Disposed` are terminal: once there an avatar never accepts
/// resources or animates again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    Loading,
    Ready,
    Error,
    Disposed,
}

pub struct Avatar {
    status: LifecycleStatus,
    error_message: Option<String>,
    visible: bool,
    elapsed: f32,

    rig: Option<Rig>,
    audio: AudioFeatures,
    gesture: GestureController,
    expression: ExpressionController,
    body: BodyAnimator,
    last_speech: SpeechState,
}

impl Avatar {
    /// Build an avatar in the `Loading` state. No rig, no audio source yet.
    pub fn new(params: AvatarParams) -> AvatarResult<Self> {
        params.validate().map_err(AvatarError::InvalidParams)?;

        let seed = params.rng_seed.unwrap_or_else(rand::random);
        if params.rng_seed.is_none() {
            log::debug!("avatar seed {} (pass it back in to reproduce this run)", seed);
        }

        Ok(Self {
            status: LifecycleStatus::Loading,
            error_message: None,
            visible: true,
            elapsed: 0.0,
            rig: None,
            audio: AudioFeatures::new(params.detection.clone()),
            gesture: GestureController::new(&params, StdRng::seed_from_u64(seed)),
            expression: ExpressionController::new(
                &params,
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            body: BodyAnimator::new(&params),
            last_speech: SpeechState::default(),
        })
    }

    /// Attach the humanoid rig. A valid rig moves the avatar to `Ready`; an
    /// invalid one is rejected and the avatar goes to `Error`.
    pub fn attach_rig(&mut self, rig: Rig) -> AvatarResult<()> {
        if self.is_terminal() {
            return Err(AvatarError::Lifecycle(self.status));
        }
        if let Err(e) = rig.validate() {
            self.status = LifecycleStatus::Error;
            self.error_message = Some(e.to_string());
            return Err(e);
        }

        log::info!(
            "rig attached: {} bones, {} expressions",
            rig.bone_count(),
            rig.expression_count()
        );
        self.rig = Some(rig);
        self.status = LifecycleStatus::Ready;
        Ok(())
    }

    /// Record a host-side loading failure (model download, parse, ...).
    /// The avatar moves to `Error` and stays there.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        if self.status == LifecycleStatus::Disposed {
            return;
        }
        let reason = reason.into();
        log::error!("avatar failed: {}", reason);
        self.status = LifecycleStatus::Error;
        self.error_message = Some(reason);
    }

    /// Attach (or replace) the audio source. Replacing shuts the old source
    /// down first, so acquisition order is preserved across swaps.
    pub fn attach_audio(&mut self, source: Box<dyn SpectrumSource>) -> AvatarResult<()> {
        if self.is_terminal() {
            return Err(AvatarError::Lifecycle(self.status));
        }
        self.audio.attach_source(source);
        log::info!("audio source attached");
        Ok(())
    }

    /// Detach the audio source, if any. The avatar keeps animating and
    /// degrades to idle motion.
    pub fn detach_audio(&mut self) {
        if self.audio.has_source() {
            self.audio.detach_source();
            log::info!("audio source detached");
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Advance the whole avatar by `dt` seconds. Does nothing unless the
    /// avatar is `Ready` and visible.
    pub fn update(&mut self, dt: f32) {
        if self.status != LifecycleStatus::Ready || !self.visible {
            return;
        }
        let rig = match self.rig.as_mut() {
            Some(rig) => rig,
            None => return,
        };

        // One clamp for every subsystem: a backward host clock step must
        // not run fades or phase clocks in reverse.
        let dt = dt.max(0.0);
        self.elapsed += dt;
        let speech = self.audio.update(dt);
        self.gesture.update(dt, &speech, rig);
        self.expression.update(dt, &speech, rig);
        self.body.update(dt, &speech, rig);
        self.last_speech = speech;
    }

    /// Tear the avatar down: stop animating, shut down audio analysis and
    /// its source, release the rig, and mark the instance `Disposed`.
    /// Calling this again is a no-op.
    pub fn dispose(&mut self) {
        if self.status == LifecycleStatus::Disposed {
            return;
        }
        self.visible = false;
        self.audio.detach_source();
        self.rig = None;
        self.status = LifecycleStatus::Disposed;
        log::info!("avatar disposed");
    }

    pub fn status(&self) -> LifecycleStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Speech state from the most recent update.
    pub fn speech(&self) -> SpeechState {
        self.last_speech
    }

    pub fn rig(&self) -> Option<&Rig> {
        self.rig.as_ref()
    }

    pub fn mood(&self) -> Mood {
        self.expression.mood()
    }

    pub fn gesture_variant(&self) -> GestureVariant {
        self.gesture.variant()
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            LifecycleStatus::Error | LifecycleStatus::Disposed
        )
    }
}

impl Drop for Avatar {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::{bones, expressions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const DT: f32 = 1.0 / 60.0;

    /// One uniform spectrum per scripted volume, then no new data. Counts
    /// shutdown calls so teardown ordering tests can observe it.
    struct ScriptedSource {
        volumes: Vec<f32>,
        index: usize,
        shutdowns: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(volumes: &[f32]) -> (Self, Arc<AtomicUsize>) {
            let shutdowns = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    volumes: volumes.to_vec(),
                    index: 0,
                    shutdowns: Arc::clone(&shutdowns),
                },
                shutdowns,
            )
        }
    }

    impl SpectrumSource for ScriptedSource {
        fn sample(&mut self, _dt: f32, out: &mut Vec<f32>) -> AvatarResult<bool> {
            let volume = match self.volumes.get(self.index) {
                Some(v) => *v,
                None => return Ok(false),
            };
            self.index += 1;
            out.clear();
            out.extend(std::iter::repeat(volume).take(12));
            Ok(true)
        }

        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn fixed_params() -> AvatarParams {
        AvatarParams {
            rng_seed: Some(7),
            ..AvatarParams::default()
        }
    }

    #[test]
    fn test_rig_attachment_transitions_to_ready() {
        let mut avatar = Avatar::new(fixed_params()).unwrap();
        assert_eq!(avatar.status(), LifecycleStatus::Loading);

        avatar.attach_rig(Rig::standard_humanoid()).unwrap();
        assert_eq!(avatar.status(), LifecycleStatus::Ready);
        assert!(avatar.rig().is_some());
    }

    #[test]
    fn test_invalid_rig_is_terminal() {
        let mut avatar = Avatar::new(fixed_params()).unwrap();
        assert!(avatar.attach_rig(Rig::empty()).is_err());
        assert_eq!(avatar.status(), LifecycleStatus::Error);
        assert!(avatar.error_message().is_some());

        // A good rig no longer helps
        assert!(matches!(
            avatar.attach_rig(Rig::standard_humanoid()),
            Err(AvatarError::Lifecycle(LifecycleStatus::Error))
        ));

        avatar.update(DT);
        assert_eq!(avatar.elapsed(), 0.0);
    }

    #[test]
    fn test_mark_failed_reports_reason() {
        let mut avatar = Avatar::new(fixed_params()).unwrap();
        avatar.mark_failed("model fetch returned 404");
        assert_eq!(avatar.status(), LifecycleStatus::Error);
        assert_eq!(avatar.error_message(), Some("model fetch returned 404"));
    }

    #[test]
    fn test_updates_gated_by_readiness_and_visibility() {
        let mut avatar = Avatar::new(fixed_params()).unwrap();
        avatar.update(DT);
        assert_eq!(avatar.elapsed(), 0.0); // not ready yet

        avatar.attach_rig(Rig::standard_humanoid()).unwrap();
        avatar.update(DT);
        assert!(avatar.elapsed() > 0.0);

        let frozen = avatar.elapsed();
        avatar.set_visible(false);
        for _ in 0..10 {
            avatar.update(DT);
        }
        assert_eq!(avatar.elapsed(), frozen);

        avatar.set_visible(true);
        avatar.update(DT);
        assert!(avatar.elapsed() > frozen);
    }

    #[test]
    fn test_dispose_is_ordered_and_idempotent() {
        let mut avatar = Avatar::new(fixed_params()).unwrap();
        avatar.attach_rig(Rig::standard_humanoid()).unwrap();
        let (source, shutdowns) = ScriptedSource::new(&[0.4; 60]);
        avatar.attach_audio(Box::new(source)).unwrap();

        for _ in 0..30 {
            avatar.update(DT);
        }

        avatar.dispose();
        assert_eq!(avatar.status(), LifecycleStatus::Disposed);
        assert!(!avatar.visible());
        assert!(avatar.rig().is_none());
        assert_eq!(shutdowns.load(Ordering::Relaxed), 1);

        // Second dispose changes nothing and shuts nothing down twice
        avatar.dispose();
        assert_eq!(avatar.status(), LifecycleStatus::Disposed);
        assert_eq!(shutdowns.load(Ordering::Relaxed), 1);

        // Disposed avatars refuse new resources and never animate
        let (source, _) = ScriptedSource::new(&[0.4]);
        assert!(matches!(
            avatar.attach_audio(Box::new(source)),
            Err(AvatarError::Lifecycle(LifecycleStatus::Disposed))
        ));
        avatar.update(DT);
        let elapsed = avatar.elapsed();
        avatar.update(DT);
        assert_eq!(avatar.elapsed(), elapsed);
    }

    #[test]
    fn test_negative_dt_frames_change_nothing() {
        let run = |inject_negatives: bool| {
            let mut avatar = Avatar::new(fixed_params()).unwrap();
            avatar.attach_rig(Rig::standard_humanoid()).unwrap();
            let (source, _) = ScriptedSource::new(&[0.4; 30]);
            avatar.attach_audio(Box::new(source)).unwrap();

            // The carried volume keeps the avatar speaking after the
            // source runs dry, so a gesture cross-fade (from the 2 s
            // entry-hold reselection) is in flight around frame 130.
            for _ in 0..130 {
                avatar.update(DT);
            }
            if inject_negatives {
                for _ in 0..10 {
                    avatar.update(-DT);
                }
            }
            for _ in 0..60 {
                avatar.update(DT);
            }
            let head = avatar.rig().unwrap().bone_rotation(bones::HEAD).unwrap();
            (avatar.elapsed(), head)
        };

        // Backward clock steps neither advance nor rewind anything
        assert_eq!(run(true), run(false));
    }

    #[test]
    fn test_replacing_audio_shuts_down_old_source() {
        let mut avatar = Avatar::new(fixed_params()).unwrap();
        avatar.attach_rig(Rig::standard_humanoid()).unwrap();

        let (first, first_shutdowns) = ScriptedSource::new(&[0.4; 10]);
        avatar.attach_audio(Box::new(first)).unwrap();
        assert_eq!(first_shutdowns.load(Ordering::Relaxed), 0);

        let (second, second_shutdowns) = ScriptedSource::new(&[0.2; 10]);
        avatar.attach_audio(Box::new(second)).unwrap();
        assert_eq!(first_shutdowns.load(Ordering::Relaxed), 1);
        assert_eq!(second_shutdowns.load(Ordering::Relaxed), 0);

        avatar.detach_audio();
        assert_eq!(second_shutdowns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_volume_scenario_end_to_end() {
        let mut avatar = Avatar::new(fixed_params()).unwrap();
        avatar.attach_rig(Rig::standard_humanoid()).unwrap();

        let volumes = [0.0, 0.0, 0.03, 0.03, 0.03, 0.02, 0.016, 0.01];
        let expected = [false, false, true, true, true, true, true, false];
        let (source, _) = ScriptedSource::new(&volumes);
        avatar.attach_audio(Box::new(source)).unwrap();

        let mut peak_intensity = 0.0_f32;
        for (frame, want) in expected.iter().enumerate() {
            avatar.update(DT);
            assert_eq!(
                avatar.speech().is_speaking,
                *want,
                "frame {} volume {}",
                frame,
                volumes[frame]
            );
            peak_intensity = peak_intensity.max(avatar.speech().intensity);
        }
        assert!(peak_intensity > 0.0);
        assert!(peak_intensity <= 0.06 + 1e-6);

        // Source dry: the last carried volume (0.01) reads as silence, so
        // intensity decays and the mouth closes while breathing keeps going.
        let mut saw_breath = false;
        for _ in 0..600 {
            avatar.update(DT);
            if let Some(rig) = avatar.rig() {
                if rig.bone_rotation(bones::SPINE).unwrap().x.abs() > 0.003 {
                    saw_breath = true;
                }
            }
        }
        assert!(avatar.speech().intensity < 1e-3);
        assert!(!avatar.speech().is_speaking);
        let rig = avatar.rig().unwrap();
        assert!(rig.expression(expressions::AA).unwrap() < 0.01);
        assert!(saw_breath);
    }
}
