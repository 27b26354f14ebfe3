//! Named-bone skeleton and blend-shape containers.
//!
//! The animation core never parses model files; the host's asset loader
//! builds a [`Rig`] out of whatever its model actually contains and hands it
//! over. Writes address bones and expressions by name; a name the rig does
//! not carry makes the write a silent no-op, so a stripped-down model
//! simply moves less.

use std::collections::HashMap;

use glam::{EulerRot, Quat, Vec3};

use crate::error::{AvatarError, AvatarResult};

/// VRM-style humanoid bone names driven by the animation core.
pub mod bones {
    pub const HIPS: &str = "Hips";
    pub const SPINE: &str = "Spine";
    pub const CHEST: &str = "Chest";
    pub const NECK: &str = "Neck";
    pub const HEAD: &str = "Head";

    pub const LEFT_SHOULDER: &str = "LeftShoulder";
    pub const RIGHT_SHOULDER: &str = "RightShoulder";
    pub const LEFT_UPPER_ARM: &str = "LeftUpperArm";
    pub const RIGHT_UPPER_ARM: &str = "RightUpperArm";
    pub const LEFT_LOWER_ARM: &str = "LeftLowerArm";
    pub const RIGHT_LOWER_ARM: &str = "RightLowerArm";
    pub const LEFT_HAND: &str = "LeftHand";
    pub const RIGHT_HAND: &str = "RightHand";

    /// The 30 finger segment names (5 fingers x 3 segments x 2 hands), in a
    /// fixed order so per-segment phase offsets are deterministic.
    pub fn finger_segments() -> Vec<String> {
        let mut names = Vec::with_capacity(30);
        for hand in ["Left", "Right"] {
            for finger in ["Thumb", "Index", "Middle", "Ring", "Little"] {
                for segment in ["Proximal", "Intermediate", "Distal"] {
                    names.push(format!("{hand}{finger}{segment}"));
                }
            }
        }
        names
    }
}

/// Expression (blend-shape) names driven by the animation core.
pub mod expressions {
    // Visemes
    pub const AA: &str = "aa"; // wide open
    pub const IH: &str = "ih"; // narrow
    pub const OU: &str = "ou"; // rounded
    pub const OH: &str = "oh"; // rounded open

    pub const BLINK: &str = "blink";
    pub const BROWS_UP: &str = "browInnerUp";

    // Emotive weights
    pub const NEUTRAL: &str = "neutral";
    pub const HAPPY: &str = "happy";
    pub const ANGRY: &str = "angry";
    pub const SAD: &str = "sad";
    pub const RELAXED: &str = "relaxed";
    pub const SURPRISED: &str = "surprised";

    /// The emotive weights the mood machine retargets every frame.
    pub const EMOTIVE: [&str; 6] = [NEUTRAL, HAPPY, ANGRY, SAD, RELAXED, SURPRISED];
}

/// A single orientable node of the skeleton.
///
/// Rotation is an euler offset (radians, XYZ order) from the bone's rest
/// pose; the rest pose itself belongs to the asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bone {
    pub rotation: Vec3,
}

impl Bone {
    /// Rotation as a quaternion, for hosts composing world transforms.
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }
}

/// Named-bone skeleton plus named blend-shape weights.
#[derive(Debug, Clone, Default)]
pub struct Rig {
    bones: HashMap<String, Bone>,
    expressions: HashMap<String, f32>,
}

impl Rig {
    /// An empty rig for hosts that populate it from a loaded asset.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The full humanoid vocabulary this crate drives: torso/head chain,
    /// shoulder/arm/hand chains, 30 finger segments, visemes, blink, brow
    /// and the six emotive weights.
    pub fn standard_humanoid() -> Self {
        let mut rig = Self::empty();

        for name in [
            bones::HIPS,
            bones::SPINE,
            bones::CHEST,
            bones::NECK,
            bones::HEAD,
            bones::LEFT_SHOULDER,
            bones::RIGHT_SHOULDER,
            bones::LEFT_UPPER_ARM,
            bones::RIGHT_UPPER_ARM,
            bones::LEFT_LOWER_ARM,
            bones::RIGHT_LOWER_ARM,
            bones::LEFT_HAND,
            bones::RIGHT_HAND,
        ] {
            rig.add_bone(name);
        }
        for name in bones::finger_segments() {
            rig.add_bone(name);
        }

        for name in [
            expressions::AA,
            expressions::IH,
            expressions::OU,
            expressions::OH,
            expressions::BLINK,
            expressions::BROWS_UP,
        ] {
            rig.add_expression(name);
        }
        for name in expressions::EMOTIVE {
            rig.add_expression(name);
        }

        rig
    }

    pub fn add_bone(&mut self, name: impl Into<String>) {
        self.bones.insert(name.into(), Bone::default());
    }

    pub fn add_expression(&mut self, name: impl Into<String>) {
        self.expressions.insert(name.into(), 0.0);
    }

    /// A rig with no bones at all cannot be animated.
    pub fn validate(&self) -> AvatarResult<()> {
        if self.bones.is_empty() {
            return Err(AvatarError::InvalidRig(
                "rig has no bones; nothing to animate".to_string(),
            ));
        }
        Ok(())
    }

    /// Write a bone rotation (euler radians). Returns false (and writes
    /// nothing) if the rig has no bone of that name.
    pub fn set_bone_rotation(&mut self, name: &str, rotation: Vec3) -> bool {
        match self.bones.get_mut(name) {
            Some(bone) => {
                bone.rotation = rotation;
                true
            }
            None => false,
        }
    }

    /// Write an expression weight, clamped to [0, 1]. Returns false (and
    /// writes nothing) if the rig has no expression of that name.
    pub fn set_expression(&mut self, name: &str, weight: f32) -> bool {
        match self.expressions.get_mut(name) {
            Some(slot) => {
                *slot = weight.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(name)
    }

    pub fn bone_rotation(&self, name: &str) -> Option<Vec3> {
        self.bones.get(name).map(|bone| bone.rotation)
    }

    pub fn expression(&self, name: &str) -> Option<f32> {
        self.expressions.get(name).copied()
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn bone_names(&self) -> impl Iterator<Item = &str> {
        self.bones.keys().map(String::as_str)
    }

    pub fn expression_names(&self) -> impl Iterator<Item = &str> {
        self.expressions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_humanoid_vocabulary() {
        let rig = Rig::standard_humanoid();

        // 13 named torso/arm bones + 30 finger segments
        assert_eq!(rig.bone_count(), 43);
        assert!(rig.bone(bones::HEAD).is_some());
        assert!(rig.bone("LeftIndexDistal").is_some());

        // 4 visemes + blink + brow + 6 emotive
        assert_eq!(rig.expression_count(), 12);
        assert_eq!(rig.expression(expressions::AA), Some(0.0));
    }

    #[test]
    fn test_missing_channel_write_is_noop() {
        let mut rig = Rig::standard_humanoid();
        assert!(!rig.set_bone_rotation("Tail", Vec3::ONE));
        assert!(!rig.set_expression("sneer", 1.0));
        assert!(rig.set_bone_rotation(bones::HEAD, Vec3::ONE));
    }

    #[test]
    fn test_expression_weights_are_clamped() {
        let mut rig = Rig::standard_humanoid();
        rig.set_expression(expressions::BLINK, 2.5);
        assert_eq!(rig.expression(expressions::BLINK), Some(1.0));
        rig.set_expression(expressions::BLINK, -0.5);
        assert_eq!(rig.expression(expressions::BLINK), Some(0.0));
    }

    #[test]
    fn test_empty_rig_fails_validation() {
        assert!(Rig::empty().validate().is_err());

        let mut rig = Rig::empty();
        rig.add_bone(bones::HEAD);
        assert!(rig.validate().is_ok());
    }

    #[test]
    fn test_bone_orientation_matches_euler() {
        let mut rig = Rig::standard_humanoid();
        rig.set_bone_rotation(bones::HEAD, Vec3::new(0.1, 0.0, 0.0));

        let quat = rig.bone(bones::HEAD).unwrap().orientation();
        let expected = Quat::from_euler(EulerRot::XYZ, 0.1, 0.0, 0.0);
        assert!(quat.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_finger_segments_are_deterministic() {
        let first = bones::finger_segments();
        let second = bones::finger_segments();
        assert_eq!(first, second);
        assert_eq!(first.len(), 30);
        assert_eq!(first[0], "LeftThumbProximal");
        assert_eq!(first[29], "RightLittleDistal");
    }
}
