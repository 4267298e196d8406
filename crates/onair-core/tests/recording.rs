//! Full recording flow: console → engine → batcher → encode worker → asset
//!
//! The audio thread is simulated by calling `AudioEngine::process` by hand.

use std::f32::consts::TAU;
use std::io::Cursor;
use std::sync::Arc;

use onair_core::capture::{
    AudioEncoder, CaptureTap, EncodeError, EncodeResult, EncoderSpec, RecordingError,
    RecordingEvent, FRAME_SIZE,
};
use onair_core::config::ConsoleConfig;
use onair_core::engine::AudioEngine;
use onair_core::{Console, StereoBuffer, StereoSample, MAX_BLOCK_SIZE};

const RATE: u32 = 48000;

fn rig() -> (Console, AudioEngine) {
    Console::new(&ConsoleConfig::default(), RATE)
}

/// Feed `input` through the engine in blocks of `block` frames
fn feed(engine: &mut AudioEngine, input: &[f32], block: usize) {
    let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
    let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
    for chunk in input.chunks(block) {
        let mic = StereoBuffer::from_mono(chunk);
        engine.process(&mic, &mut program, &mut monitor);
    }
}

/// One silent block so the engine picks up pending commands
fn tick(engine: &mut AudioEngine) {
    feed(engine, &[0.0; 64], 64);
}

fn no_codec(_: &EncoderSpec) -> EncodeResult<Box<dyn AudioEncoder>> {
    Err(EncodeError::Init("no codec available".to_string()))
}

fn sine(freq: f32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| 0.5 * (TAU * freq * i as f32 / RATE as f32).sin())
        .collect()
}

#[test]
fn ten_thousand_samples_in_three_batches() {
    let (mut console, mut engine) = rig();
    let events = console.events();

    let session = console
        .start_recording(CaptureTap::Program)
        .expect("recording starts");
    assert_eq!(session.spec.sample_rate, RATE);
    assert!(console.is_recording());

    feed(&mut engine, &vec![0.25; 10_000], 1000);
    let handle = console.stop_recording().expect("stop accepted");
    assert!(!console.is_recording());
    tick(&mut engine);

    let asset = handle.wait().expect("asset");
    assert_eq!(asset.total_samples, 10_000);
    assert!((asset.duration_seconds - 10_000.0 / RATE as f64).abs() < 1e-9);

    let reader = hound::WavReader::new(Cursor::new(asset.bytes.clone())).expect("valid wav");
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.duration(), 10_000);

    let received: Vec<RecordingEvent> = events.try_iter().collect();
    assert!(matches!(received.first(), Some(RecordingEvent::Ready)));
    assert!(matches!(
        received.last(),
        Some(RecordingEvent::Complete { asset: done }) if done.total_samples == 10_000
    ));
    assert_eq!(console.poll_diagnostics().capture_overflows, 0);
}

#[test]
fn sine_round_trip_duration_within_one_frame() {
    let (mut console, mut engine) = rig();
    let seconds = 2.0;
    let frames = (RATE as f64 * seconds) as usize;

    console
        .start_recording(CaptureTap::Program)
        .expect("recording starts");
    feed(&mut engine, &sine(440.0, frames), 128);
    let handle = console.stop_recording().expect("stop accepted");
    tick(&mut engine);
    let asset = handle.wait().expect("asset");

    let mut reader = hound::WavReader::new(Cursor::new(asset.bytes)).expect("valid wav");
    let decoded = reader.duration() as f64 / reader.spec().sample_rate as f64;
    let tolerance = FRAME_SIZE as f64 / RATE as f64;
    assert!((decoded - seconds).abs() <= tolerance);

    // Left channel carries the sine at roughly the input level
    let peak = reader
        .samples::<i16>()
        .step_by(2)
        .filter_map(Result::ok)
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0);
    assert!(peak > 15_000 && peak < 17_000, "peak {}", peak);
}

#[test]
fn monitor_tap_records_cue_preview() {
    let (mut console, mut engine) = rig();
    console.set_cue_mode(true);

    console
        .start_recording(CaptureTap::Monitor)
        .expect("recording starts");
    // Mic is off-air in cue mode and pads are idle: the monitor is silent
    feed(&mut engine, &vec![0.5; 4096], 512);
    let handle = console.stop_recording().expect("stop accepted");
    tick(&mut engine);
    let asset = handle.wait().expect("asset");

    let mut reader = hound::WavReader::new(Cursor::new(asset.bytes)).expect("valid wav");
    assert_eq!(reader.duration(), 4096);
    assert!(reader.samples::<i16>().filter_map(Result::ok).all(|s| s == 0));
}

#[test]
fn second_start_is_rejected() {
    let (mut console, mut engine) = rig();
    console
        .start_recording(CaptureTap::Program)
        .expect("recording starts");
    assert!(matches!(
        console.start_recording(CaptureTap::Monitor),
        Err(RecordingError::AlreadyRecording)
    ));

    let handle = console.stop_recording().expect("stop accepted");
    tick(&mut engine);
    let asset = handle.wait().expect("asset");
    assert_eq!(asset.total_samples, 0);
}

#[test]
fn encoder_init_failure_leaves_console_usable() {
    let (mut console, mut engine) =
        Console::with_encoder_factory(&ConsoleConfig::default(), RATE, Arc::new(no_codec));
    let events = console.events();

    assert!(matches!(
        console.start_recording(CaptureTap::Program),
        Err(RecordingError::EncoderInit(_))
    ));
    assert!(!console.is_recording());
    assert!(matches!(
        events.try_recv(),
        Ok(RecordingEvent::Error { fatal: true, .. })
    ));

    // The mixer keeps running
    let mut program = StereoBuffer::silence(MAX_BLOCK_SIZE);
    let mut monitor = StereoBuffer::silence(MAX_BLOCK_SIZE);
    let mic = StereoBuffer::from_vec(vec![StereoSample::mono(0.3); 128]);
    engine.process(&mic, &mut program, &mut monitor);
    assert!((program[127].left - 0.3).abs() < 1e-3);
}

#[test]
fn finalize_handle_can_be_awaited() {
    let (mut console, mut engine) = rig();
    console
        .start_recording(CaptureTap::Program)
        .expect("recording starts");
    feed(&mut engine, &vec![0.1; 2000], 500);
    let handle = console.stop_recording().expect("stop accepted");
    tick(&mut engine);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let asset = runtime.block_on(handle).expect("asset");
    assert_eq!(asset.total_samples, 2000);
}
