//! Voxpuppet library - audio-reactive procedural animation for humanoid avatars

pub mod audio;
pub mod avatar;
pub mod body;
pub mod capture;
pub mod cli;
pub mod error;
pub mod expression;
pub mod gesture;
pub mod params;
pub mod rig;
pub mod smoothing;
