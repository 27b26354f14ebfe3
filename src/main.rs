//! Voxpuppet - audio-reactive procedural avatar animation
//!
//! Headless demo: attaches a standard humanoid rig, feeds it microphone or
//! WAV audio, and logs what the avatar is doing once a second.

use clap::Parser;
use std::time::{Duration, Instant};

use voxpuppet::avatar::Avatar;
use voxpuppet::capture::{LiveAudioPipeline, WavSpectrumSource};
use voxpuppet::cli::Args;
use voxpuppet::error::AvatarResult;
use voxpuppet::rig::{bones, Rig};

const FRAME: Duration = Duration::from_micros(16_667); // 60 fps

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> AvatarResult<()> {
    let params = args.avatar_params();
    let spectrum = params.spectrum.clone();

    let mut avatar = Avatar::new(params)?;
    avatar.attach_rig(Rig::standard_humanoid())?;

    // A missing audio source is not fatal; the avatar idles instead
    if let Some(path) = &args.wav {
        match WavSpectrumSource::open(path, &spectrum, args.loop_wav) {
            Ok(source) => avatar.attach_audio(Box::new(source))?,
            Err(e) => log::warn!("wav source unavailable ({e}); running idle"),
        }
    } else if args.mic {
        match LiveAudioPipeline::new(&spectrum) {
            Ok(source) => avatar.attach_audio(Box::new(source))?,
            Err(e) => log::warn!("microphone unavailable ({e}); running idle"),
        }
    } else {
        log::info!("no audio source requested; idle motion only");
    }

    let start = Instant::now();
    let mut last = start;
    let mut next_report = Duration::from_secs(1);

    while start.elapsed().as_secs_f32() < args.duration {
        let frame_start = Instant::now();
        let dt = frame_start.duration_since(last).as_secs_f32();
        last = frame_start;

        avatar.update(dt);

        if start.elapsed() >= next_report {
            report(&avatar);
            next_report += Duration::from_secs(1);
        }

        std::thread::sleep(FRAME.saturating_sub(frame_start.elapsed()));
    }

    avatar.dispose();
    Ok(())
}

fn report(avatar: &Avatar) {
    let speech = avatar.speech();
    let head = avatar
        .rig()
        .and_then(|rig| rig.bone_rotation(bones::HEAD))
        .unwrap_or_default();
    log::info!(
        "t={:5.1}s speaking={} vol={:.3} intensity={:.2} gesture={:?} mood={:?} head=({:+.3},{:+.3},{:+.3})",
        avatar.elapsed(),
        speech.is_speaking,
        speech.volume,
        speech.intensity,
        avatar.gesture_variant(),
        avatar.mood(),
        head.x,
        head.y,
        head.z,
    );
}
