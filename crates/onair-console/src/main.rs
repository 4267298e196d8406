//! OnAir Console - terminal control surface for the broadcast core
//!
//! Opens the audio devices, builds the console and its engine, then reads
//! line commands from stdin. The program output ring is drained here; a
//! network transport would consume it instead.
//!
//! ## Command line flags
//!
//! - `--config <path>`: use a config file other than the default

mod command;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{tick, unbounded, Receiver};
use onair_core::audio::{start_audio_system, AudioDevices, ProgramTap};
use onair_core::capture::{FinalizeHandle, RecordedAsset, RecordingEvent};
use onair_core::config::{default_config_path, load_config, ConsoleConfig};
use onair_core::engine::NUM_PADS;
use onair_core::Console;

use command::{Command, HELP};

/// How often diagnostics are polled
const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    log::info!("onair-console starting up");
    let config: ConsoleConfig = load_config(&config_path);

    let devices = AudioDevices::open(&config.audio).context("Failed to open audio devices")?;
    let (mut console, engine) = Console::new(&config, devices.sample_rate());
    let audio = start_audio_system(devices, engine).context("Failed to start audio")?;
    log::info!(
        "Audio running at {} Hz, {} frames ({:.1} ms)",
        audio.sample_rate,
        audio.buffer_size,
        audio.latency_ms
    );

    spawn_program_drain(audio.program_tap)?;
    let lines = spawn_stdin_reader()?;
    let events = console.events();
    let ticker = tick(POLL_INTERVAL);

    println!("OnAir console ready. Type 'help' for commands.");

    loop {
        let quit = crossbeam::select! {
            recv(lines) -> line => match line {
                Ok(line) => handle_line(&mut console, &config, &line),
                // stdin closed
                Err(_) => true,
            },
            recv(events) -> event => {
                if let Ok(event) = event {
                    report(&event);
                }
                false
            },
            recv(ticker) -> _ => {
                console.poll_diagnostics();
                false
            },
        };
        if quit {
            break;
        }
    }

    if console.is_recording() {
        log::info!("Stopping recording before exit");
        if let Ok(handle) = console.stop_recording() {
            save_recording(handle, &config.recordings_dir);
        }
    }

    drop(audio.handle);
    log::info!("onair-console shut down");
    Ok(())
}

/// Run one input line; true means quit
fn handle_line(console: &mut Console, config: &ConsoleConfig, line: &str) -> bool {
    match Command::parse(line) {
        Ok(Some(Command::Quit)) => return true,
        Ok(Some(cmd)) => execute(console, config, cmd),
        Ok(None) => {}
        Err(e) => println!("{}", e),
    }
    false
}

fn execute(console: &mut Console, config: &ConsoleConfig, cmd: Command) {
    match cmd {
        Command::ToggleEffect(kind) => {
            let enabled = console.toggle_effect(kind);
            println!("{} {}", kind, if enabled { "on" } else { "off" });
        }
        Command::UpdateEffect(kind, params) => {
            if !console.update_effect(kind, &params) {
                println!("{}: nothing changed", kind);
            }
        }
        Command::MicVolume(volume) => console.set_mic_volume(volume),
        Command::Mute(muted) => console.set_mic_muted(muted),
        Command::Listen(listening) => console.set_listening(listening),
        Command::Cue(cue) => console.set_cue_mode(cue),
        Command::Limit(db) => {
            let ceiling = console.set_limiter_threshold(db);
            println!("Limiter at {} dB", ceiling.db());
        }
        Command::Gate(db) => {
            let db = console.set_gate_threshold(db);
            println!("Gate threshold {} dB", db);
        }
        Command::PadLoad(pad, path) => {
            if let Err(e) = console.load_pad(pad, &path) {
                println!("Pad {}: {}", pad, e);
            }
        }
        Command::PadPlay(pad) => {
            console.play_pad(pad);
        }
        Command::PadStop(pad) => {
            console.stop_pad(pad);
        }
        Command::PadRemove(pad) => {
            console.remove_pad(pad);
        }
        Command::PadLoop(pad, looping) => {
            console.set_pad_loop(pad, looping);
        }
        Command::PadGain(pad, gain) => {
            console.set_pad_gain(pad, gain);
        }
        Command::RecordStart(tap) => match console.start_recording(tap) {
            Ok(session) => println!(
                "Recording {:?} at {} Hz, {} ch",
                session.tap, session.spec.sample_rate, session.spec.channels
            ),
            Err(e) => println!("Cannot start recording: {}", e),
        },
        Command::RecordStop => match console.stop_recording() {
            Ok(handle) => {
                let dir = config.recordings_dir.clone();
                let spawned = thread::Builder::new()
                    .name("recording-save".to_string())
                    .spawn(move || save_recording(handle, &dir));
                if let Err(e) = spawned {
                    log::error!("Failed to spawn save thread: {}", e);
                }
            }
            Err(e) => println!("Cannot stop recording: {}", e),
        },
        Command::Meters => print_meters(console),
        Command::Status => print_status(console),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

fn report(event: &RecordingEvent) {
    match event {
        RecordingEvent::Error { fatal: true, .. } => log::error!("{}", event.description()),
        RecordingEvent::Error { .. } => log::warn!("{}", event.description()),
        _ => log::info!("{}", event.description()),
    }
}

/// Wait for the asset and write it next to the others
fn save_recording(handle: FinalizeHandle, dir: &Path) {
    let result = handle
        .wait()
        .context("Recording failed")
        .and_then(|asset| write_asset(&asset, dir));
    match result {
        Ok(path) => println!("Saved {}", path.display()),
        Err(e) => log::error!("{:#}", e),
    }
}

fn write_asset(asset: &RecordedAsset, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create recordings directory: {:?}", dir))?;
    let name = format!(
        "onair-{}.wav",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let path = dir.join(name);
    std::fs::write(&path, &asset.bytes)
        .with_context(|| format!("Failed to write recording: {:?}", path))?;
    log::info!(
        "Recording saved: {:?} ({:.1}s, {} bytes)",
        path,
        asset.duration_seconds,
        asset.bytes.len()
    );
    Ok(path)
}

fn print_meters(console: &Console) {
    let meters = console.meters();
    for (name, meter) in [
        ("mic", &meters.mic),
        ("program", &meters.program),
        ("monitor", &meters.monitor),
    ] {
        let r = meter.read();
        println!(
            "{:<8} peak {:>6.1} / {:>6.1} dB  rms {:>6.1} / {:>6.1} dB{}",
            name,
            onair_core::linear_to_db(r.peak[0]),
            onair_core::linear_to_db(r.peak[1]),
            onair_core::linear_to_db(r.rms[0]),
            onair_core::linear_to_db(r.rms[1]),
            if r.mono { "  (mono)" } else { "" }
        );
    }
    println!(
        "gate     {} (gain {:.2}){}",
        if meters.gate_open() { "open" } else { "closed" },
        meters.gate_gain(),
        if meters.take_clip() { "  CLIP" } else { "" }
    );
}

fn print_status(console: &Console) {
    let mixer = console.mixer_state();
    println!(
        "mic {:.2}{}  listen {}  cue {}  limiter {} dB  gate {} dB",
        mixer.mic_volume,
        if mixer.muted { " (muted)" } else { "" },
        mixer.listening,
        mixer.cue_mode,
        mixer.limiter.db(),
        console.gate_threshold_db()
    );
    for state in console.effects().states() {
        let mut params: Vec<_> = state.param_map().into_iter().collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));
        let params: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!(
            "{:<12} {:<3} {}",
            state.kind.to_string(),
            if state.enabled { "on" } else { "off" },
            params.join(" ")
        );
    }
    for pad in 0..NUM_PADS {
        if let Some(atomics) = console.pad(pad).filter(|a| a.is_loaded()) {
            println!(
                "pad {}  {}{}  {}/{}",
                pad,
                if atomics.is_playing() { "playing" } else { "stopped" },
                if atomics.is_looping() { " (loop)" } else { "" },
                atomics.position(),
                atomics.length()
            );
        }
    }
    if let Some(session) = console.recording_session() {
        println!("recording {:?}", session.tap);
    }
}

/// Read stdin on its own thread so the main loop can also poll
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

/// Stand-in for the network transport: consume the program ring
fn spawn_program_drain(mut tap: ProgramTap) -> Result<()> {
    thread::Builder::new()
        .name("program-drain".to_string())
        .spawn(move || loop {
            let available = tap.slots();
            if available > 0 {
                if let Ok(chunk) = tap.read_chunk(available) {
                    chunk.commit_all();
                }
            }
            if tap.is_abandoned() && tap.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        })
        .context("Failed to spawn program drain")?;
    Ok(())
}
