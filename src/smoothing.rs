//! Framerate-independent exponential smoothing.
//!
//! Every animated value in the crate moves through [`approach`]: a current
//! value chases a target by a fixed fraction of the remaining distance per
//! reference frame, rescaled to the actual frame duration. The result is
//! the same real-time half-life at 30, 60 or 144 fps, with no overshoot and
//! no oscillation for any rate in (0, 1).

use glam::Vec3;

use crate::params::REFERENCE_FPS;

/// Advance `current` toward `target` by smoothing rate `rate` over `dt`
/// seconds.
///
/// `rate` is the fraction of the remaining distance covered in one frame at
/// 60 fps. The effective per-step factor is `1 - (1 - rate)^(dt * 60)`, so
/// two 8 ms steps land exactly where one 16 ms step would.
///
/// # Arguments
/// * `current` - Present value of the channel
/// * `target` - Value the channel is converging to
/// * `rate` - Per-frame approach fraction in (0, 1), calibrated at 60 fps
/// * `dt` - Elapsed time since the previous step (seconds, >= 0)
pub fn approach(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    let factor = 1.0 - (1.0 - rate).powf(dt.max(0.0) * REFERENCE_FPS);
    current + (target - current) * factor
}

/// Cubic ease-in/ease-out (smoothstep), clamped to [0, 1].
///
/// Used for gesture cross-fades, mood ramps and the blink pulse; monotonic,
/// with zero slope at both ends.
pub fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// A scalar animation channel: current value, target value, smoothing rate.
///
/// The current value is only ever mutated by [`Channel::advance`]; the
/// target is only ever mutated by the controller owning the channel. That
/// split is what keeps every output of the system continuous no matter how
/// abruptly the targets jump.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    current: f32,
    target: f32,
    rate: f32,
}

impl Channel {
    /// Create a channel at rest at `initial` with the given smoothing rate.
    ///
    /// Rates are clamped into (0, 1); a rate at or beyond either end would
    /// either freeze the channel or make it snap.
    pub fn new(initial: f32, rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            rate: rate.clamp(1e-4, 1.0 - 1e-4),
        }
    }

    /// Set the value the channel converges to.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Move the current value toward the target; returns the new current.
    pub fn advance(&mut self, dt: f32) -> f32 {
        self.current = approach(self.current, self.target, self.rate, dt);
        self.current
    }

    /// Jump current and target to `value` with no smoothing (initialization
    /// and teardown only).
    pub fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

/// A three-axis rotation channel (euler radians), smoothed per component at
/// one shared rate.
#[derive(Debug, Clone, Copy)]
pub struct Channel3 {
    current: Vec3,
    target: Vec3,
    rate: f32,
}

impl Channel3 {
    pub fn new(initial: Vec3, rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            rate: rate.clamp(1e-4, 1.0 - 1e-4),
        }
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Move the current rotation toward the target; returns the new current.
    pub fn advance(&mut self, dt: f32) -> Vec3 {
        self.current = Vec3::new(
            approach(self.current.x, self.target.x, self.rate, dt),
            approach(self.current.y, self.target.y, self.rate, dt),
            approach(self.current.z, self.target.z, self.rate, dt),
        );
        self.current
    }

    pub fn snap(&mut self, value: Vec3) {
        self.current = value;
        self.target = value;
    }

    pub fn current(&self) -> Vec3 {
        self.current
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_within_five_seconds_for_shipped_rates() {
        // Uneven frame durations summing to >= 5 simulated seconds. The
        // formula leaves a residual of (1-rate)^300 after 5 s at 60 fps,
        // which stays above 1e-3 for rates under ~0.023, so the grid
        // starts at the bottom of the range the channels actually use.
        let dts = [0.016, 0.033, 0.008, 0.05, 0.016, 0.002, 0.041];

        for rate in [0.04, 0.05, 0.09, 0.25, 0.5, 0.9, 0.99] {
            let mut current = 0.0;
            let target = 1.0;
            let mut elapsed = 0.0;

            while elapsed < 5.0 {
                for dt in dts {
                    current = approach(current, target, rate, dt);
                    elapsed += dt;
                }
            }

            assert!(
                (target - current).abs() < 1e-3,
                "rate {} stuck at {} after {:.2}s",
                rate,
                current,
                elapsed
            );
        }
    }

    #[test]
    fn test_never_overshoots_stationary_target() {
        for rate in [0.05, 0.25, 0.7, 0.99] {
            let mut current = -2.0;
            let target = 3.0;
            for step in 0..600 {
                // Vary dt to include long stalls (dropped frames)
                let dt = 0.016 + (step % 7) as f32 * 0.02;
                current = approach(current, target, rate, dt);
                assert!(
                    current <= target + 1e-6,
                    "rate {} overshot to {} at step {}",
                    rate,
                    current,
                    step
                );
            }
        }
    }

    #[test]
    fn test_framerate_independence() {
        // One 32 ms step must land exactly where four 8 ms steps do.
        let rate = 0.12;
        let coarse = approach(0.0, 1.0, rate, 0.032);

        let mut fine = 0.0;
        for _ in 0..4 {
            fine = approach(fine, 1.0, rate, 0.008);
        }

        assert!(
            (coarse - fine).abs() < 1e-5,
            "coarse {} vs fine {}",
            coarse,
            fine
        );
    }

    #[test]
    fn test_zero_dt_is_identity() {
        assert_eq!(approach(0.4, 1.0, 0.25, 0.0), 0.4);
    }

    #[test]
    fn test_negative_dt_is_identity() {
        // A host clock hiccup must not run the smoothing backward.
        assert_eq!(approach(0.4, 1.0, 0.25, -0.5), 0.4);
    }

    #[test]
    fn test_channel_tracks_target_changes() {
        let mut channel = Channel::new(0.0, 0.25);
        channel.set_target(1.0);

        // Past ~58 steps at rate 0.25 the f32 current rounds onto the
        // target and stops moving, so strict progress is only checked
        // short of that.
        let mut previous = 0.0;
        for _ in 0..40 {
            let value = channel.advance(1.0 / 60.0);
            assert!(value > previous, "must move monotonically toward target");
            previous = value;
        }

        // Retargeting reverses direction without a discontinuity.
        channel.set_target(0.0);
        let value = channel.advance(1.0 / 60.0);
        assert!(value < previous);
        assert!((value - previous).abs() < 0.5);
    }

    #[test]
    fn test_channel3_advances_all_axes() {
        let mut channel = Channel3::new(Vec3::ZERO, 0.25);
        channel.set_target(Vec3::new(1.0, -1.0, 0.5));

        for _ in 0..600 {
            channel.advance(1.0 / 60.0);
        }

        let current = channel.current();
        assert!((current.x - 1.0).abs() < 1e-3);
        assert!((current.y + 1.0).abs() < 1e-3);
        assert!((current.z - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_ease_in_out_shape() {
        assert_eq!(ease_in_out(0.0), 0.0);
        assert_eq!(ease_in_out(1.0), 1.0);
        assert!((ease_in_out(0.5) - 0.5).abs() < 1e-6);

        // Monotonic over the whole ramp
        let mut previous = 0.0;
        for i in 1..=100 {
            let value = ease_in_out(i as f32 / 100.0);
            assert!(value >= previous);
            previous = value;
        }

        // Clamped outside [0, 1]
        assert_eq!(ease_in_out(-1.0), 0.0);
        assert_eq!(ease_in_out(2.0), 1.0);
    }
}
