//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

use crate::params::AvatarParams;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "voxpuppet")]
#[command(about = "Audio-reactive humanoid avatar animation demo", long_about = None)]
pub struct Args {
    /// Animate from a WAV file instead of the microphone
    #[arg(long, value_name = "PATH")]
    pub wav: Option<PathBuf>,

    /// Loop the WAV file instead of going idle at the end
    #[arg(long, requires = "wav")]
    pub loop_wav: bool,

    /// Capture audio from the default input device
    #[arg(long, conflicts_with = "wav")]
    pub mic: bool,

    /// RNG seed for gesture and mood selection (fixes a run exactly)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// How long to run before disposing the avatar (seconds)
    #[arg(long, value_name = "SECONDS", default_value = "20")]
    pub duration: f32,
}

impl Args {
    /// Avatar parameters with the CLI overrides applied
    pub fn avatar_params(&self) -> AvatarParams {
        AvatarParams {
            rng_seed: self.seed,
            ..AvatarParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let args = Args::parse_from(["voxpuppet"]);
        assert!(args.wav.is_none());
        assert!(!args.mic);
        assert_eq!(args.duration, 20.0);
        assert!(args.avatar_params().rng_seed.is_none());
    }

    #[test]
    fn test_seed_flows_into_params() {
        let args = Args::parse_from(["voxpuppet", "--seed", "99", "--duration", "5"]);
        assert_eq!(args.avatar_params().rng_seed, Some(99));
        assert_eq!(args.duration, 5.0);
    }

    #[test]
    fn test_wav_and_mic_conflict() {
        assert!(Args::try_parse_from(["voxpuppet", "--wav", "a.wav", "--mic"]).is_err());
        assert!(Args::try_parse_from(["voxpuppet", "--loop-wav"]).is_err());
    }
}
