//! Error types for the avatar animation core.

use thiserror::Error;

use crate::avatar::LifecycleStatus;

/// Avatar animation errors.
///
/// Parameter and asset errors are fatal for an avatar instance; audio
/// errors are recovered locally (the avatar degrades to idle motion) and
/// never surface to the host's frame loop.
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    // Asset errors (fatal for the instance)
    #[error("Asset load failed: {0}")]
    AssetLoad(String),

    #[error("Invalid rig: {0}")]
    InvalidRig(String),

    // Audio errors (recoverable; the avatar runs without a source)
    #[error("Audio setup failed: {0}")]
    AudioSetup(String),

    #[error("Audio read failed: {0}")]
    AudioRead(String),

    // Lifecycle errors
    #[error("Avatar is {0:?} and cannot accept new resources")]
    Lifecycle(LifecycleStatus),
}

/// Result type for avatar operations
pub type AvatarResult<T> = Result<T, AvatarError>;
