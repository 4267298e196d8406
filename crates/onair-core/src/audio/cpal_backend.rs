//! CPAL duplex backend
//!
//! ```text
//! ┌──────────────────┐   StereoSample    ┌──────────────────────┐
//! │  Input callback  │──────push()──────►│   Mic ring (SPSC)    │
//! │  (mic device)    │                   └──────────┬───────────┘
//! └──────────────────┘                              │ pop()
//!                                                   ▼
//! ┌──────────────────┐   EngineCommand   ┌──────────────────────┐
//! │  Control thread  │──────push()──────►│   Output callback    │
//! └──────────────────┘                   │  (owns AudioEngine)  │
//!         ▲                              └───┬──────────────┬───┘
//!         │ relaxed atomics                  │ monitor      │ program
//!         └──────────────────────────────────┘ to device    ▼
//!                                                    ProgramTap ring
//! ```
//!
//! No lock is shared with the callbacks: the engine moves into the output
//! closure and the two streams only meet through the mic ring.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, SampleRate, Stream, StreamConfig};


use super::config::AudioConfig;
use super::error::{AudioError, AudioResult};
use crate::engine::{AudioEngine, EngineDiagnostics};
use crate::types::{StereoBuffer, StereoSample, MAX_BLOCK_SIZE};

/// Consumer side of the broadcast output, for the network transport
pub type ProgramTap = rtrb::Consumer<StereoSample>;

/// Keeps both streams alive; drop it to stop audio
pub struct AudioHandle {
    _input_stream: Stream,
    _output_stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// A running audio system
pub struct AudioSystemResult {
    pub handle: AudioHandle,
    /// Program output, one second deep
    pub program_tap: ProgramTap,
    pub sample_rate: u32,
    pub buffer_size: u32,
    pub latency_ms: f32,
}

/// Devices and negotiated stream configs, before any stream exists
///
/// Opening happens in two steps so the engine can be built at the rate the
/// devices actually run at.
pub struct AudioDevices {
    input: cpal::Device,
    output: cpal::Device,
    input_config: StreamConfig,
    output_config: StreamConfig,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioDevices {
    /// Find the devices and agree on a sample rate
    pub fn open(config: &AudioConfig) -> AudioResult<Self> {
        let host = cpal::default_host();

        let input = match &config.input_device {
            Some(name) => find_input_device(&host, name)?,
            None => host
                .default_input_device()
                .ok_or_else(|| AudioError::NoDefaultDevice("No default input device".to_string()))?,
        };
        let output = match &config.output_device {
            Some(name) => find_output_device(&host, name)?,
            None => host.default_output_device().ok_or_else(|| {
                AudioError::NoDefaultDevice("No default output device".to_string())
            })?,
        };

        log::info!(
            "Mic device: {}",
            input.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        log::info!(
            "Monitor device: {}",
            output.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let buffer_size = config.buffer_frames();
        let (input_channels, input_rate) = pick_input_config(&input, config.sample_rate)?;
        let (output_channels, output_rate) = pick_output_config(&output, config.sample_rate)?;
        if input_rate != output_rate {
            return Err(AudioError::SampleRateMismatch {
                input: input_rate,
                output: output_rate,
            });
        }

        let stream_config = |channels| StreamConfig {
            channels,
            sample_rate: SampleRate(input_rate),
            buffer_size: CpalBufferSize::Fixed(buffer_size),
        };

        log::info!(
            "Audio config: {} in / {} out channels, {}Hz, {} frames (~{:.1}ms)",
            input_channels,
            output_channels,
            input_rate,
            buffer_size,
            buffer_size as f32 / input_rate as f32 * 1000.0
        );

        Ok(Self {
            input,
            output,
            input_config: stream_config(input_channels),
            output_config: stream_config(output_channels),
            sample_rate: input_rate,
            buffer_size,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channels the mic device delivers
    pub fn input_channels(&self) -> u16 {
        self.input_config.channels
    }
}

/// Build and start both streams; the engine moves into the output callback
pub fn start_audio_system(
    devices: AudioDevices,
    mut engine: AudioEngine,
) -> AudioResult<AudioSystemResult> {
    let AudioDevices {
        input,
        output,
        input_config,
        output_config,
        sample_rate,
        buffer_size,
    } = devices;

    engine.set_mic_channels(input_config.channels);

    // Mic ring: a few buffers of slack for callback jitter
    let mic_capacity = buffer_size as usize * 8;
    let (mic_producer, mic_consumer) = rtrb::RingBuffer::<StereoSample>::new(mic_capacity);
    let (program_producer, program_tap) =
        rtrb::RingBuffer::<StereoSample>::new(sample_rate as usize);

    let input_stream = build_input_stream(&input, &input_config, mic_producer)?;
    let state = CallbackState::new(engine, mic_consumer, program_producer);
    let output_stream = build_output_stream(&output, &output_config, state)?;

    input_stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(format!("Input: {}", e)))?;
    output_stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(format!("Output: {}", e)))?;

    log::info!("Audio streams started");

    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;
    Ok(AudioSystemResult {
        handle: AudioHandle {
            _input_stream: input_stream,
            _output_stream: output_stream,
            sample_rate,
            buffer_size,
        },
        program_tap,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

/// Everything the output callback owns
struct CallbackState {
    engine: AudioEngine,
    diagnostics: Arc<EngineDiagnostics>,
    mic: rtrb::Consumer<StereoSample>,
    program_tx: rtrb::Producer<StereoSample>,
    mic_block: StereoBuffer,
    program: StereoBuffer,
    monitor: StereoBuffer,
}

impl CallbackState {
    fn new(
        engine: AudioEngine,
        mic: rtrb::Consumer<StereoSample>,
        program_tx: rtrb::Producer<StereoSample>,
    ) -> Self {
        Self {
            diagnostics: engine.diagnostics(),
            engine,
            mic,
            program_tx,
            mic_block: StereoBuffer::silence(MAX_BLOCK_SIZE),
            program: StereoBuffer::silence(MAX_BLOCK_SIZE),
            monitor: StereoBuffer::silence(MAX_BLOCK_SIZE),
        }
    }

    /// Render `n_frames` (at most one engine block)
    fn render(&mut self, n_frames: usize) {
        self.mic_block.set_len_from_capacity(n_frames);
        let mut underrun = false;
        for frame in self.mic_block.as_mut_slice() {
            match self.mic.pop() {
                Ok(sample) => *frame = sample,
                Err(_) => {
                    *frame = StereoSample::silence();
                    underrun = true;
                }
            }
        }
        if underrun {
            self.diagnostics.record_mic_underrun();
        }

        self.engine
            .process(&self.mic_block, &mut self.program, &mut self.monitor);

        for sample in self.program.iter() {
            // Transport is behind; it catches up on later blocks
            if self.program_tx.push(*sample).is_err() {
                break;
            }
        }
    }
}

fn build_input_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: rtrb::Producer<StereoSample>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_input_stream(
            config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    let left = frame[0];
                    // Mono mics are duplicated to both sides
                    let right = if channels > 1 { frame[1] } else { left };
                    if producer.push(StereoSample::new(left, right)).is_err() {
                        break;
                    }
                }
            },
            move |err| {
                log::error!("Mic stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: CallbackState,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
                    let n_frames = chunk.len() / channels;
                    state.render(n_frames);

                    let monitor = state.monitor.as_slice();
                    for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                        let sample = monitor.get(i).copied().unwrap_or_default();
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("Monitor stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

fn find_input_device(host: &cpal::Host, name: &str) -> AudioResult<cpal::Device> {
    let mut devices = host
        .input_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .peekable();
    if devices.peek().is_none() {
        return Err(AudioError::NoDevices("input"));
    }
    devices
        .find(|d| d.name().ok().as_deref() == Some(name))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}

fn find_output_device(host: &cpal::Host, name: &str) -> AudioResult<cpal::Device> {
    let mut devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .peekable();
    if devices.peek().is_none() {
        return Err(AudioError::NoDevices("output"));
    }
    devices
        .find(|d| d.name().ok().as_deref() == Some(name))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}

/// Pick an f32 config at `target_rate`, returning (channels, rate)
fn pick_config(
    configs: Vec<cpal::SupportedStreamConfigRange>,
    target_rate: u32,
    prefer_channels: u16,
) -> AudioResult<(u16, u32)> {
    if configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported stream configurations".to_string(),
        ));
    }

    let f32_configs: Vec<_> = configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();
    if f32_configs.is_empty() {
        return Err(AudioError::UnsupportedFormat(format!(
            "{:?}",
            configs[0].sample_format()
        )));
    }

    let in_range = |c: &&&cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    if let Some(best) = f32_configs
        .iter()
        .filter(in_range)
        .find(|c| c.channels() >= prefer_channels)
        .or_else(|| f32_configs.iter().find(in_range))
    {
        return Ok((best.channels(), target_rate));
    }

    // Device can't run at the requested rate
    let fallback = f32_configs[0];
    log::warn!(
        "Audio device doesn't support {}Hz, falling back to {}Hz",
        target_rate,
        fallback.max_sample_rate().0
    );
    Ok((fallback.channels(), fallback.max_sample_rate().0))
}

fn pick_input_config(device: &cpal::Device, target_rate: u32) -> AudioResult<(u16, u32)> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();
    // Any channel count works for a mic
    pick_config(configs, target_rate, 1)
}

fn pick_output_config(device: &cpal::Device, target_rate: u32) -> AudioResult<(u16, u32)> {
    let configs = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();
    pick_config(configs, target_rate, 2)
}
