//! Audio engine owning the platform output stream and the live voice pair.
//!
//! The engine facade runs on the session thread and owns only a command
//! producer and a stop sender; the cpal stream and the voices live on a
//! dedicated audio thread. Commands cross over a lock-free ring buffer and
//! are drained by the audio callback between blocks.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::voices::BinauralVoicePair;

/// Commands consumed by the audio callback between blocks.
pub enum EngineCommand {
    Retarget {
        carrier_hz: f64,
        beat_hz: f64,
        ramp_sec: f64,
    },
    SetGain(f32),
}

/// Seam between the session machine and the audio output.
///
/// `start` is the only fallible operation; everything else degrades to a
/// no-op rather than raising, since an audio glitch is preferable to
/// crashing a running session.
pub trait BeatEngine {
    /// Begins output with the left voice at `carrier_hz` and the right voice
    /// at `carrier_hz + beat_hz`. Any previously running pair is torn down
    /// first. The ramp argument exists for API symmetry; the first tone
    /// starts at target frequency.
    fn start(&mut self, carrier_hz: f64, beat_hz: f64, initial_ramp_sec: f64) -> Result<()>;

    /// Glides the running pair to new frequencies over `ramp_sec`. Ignored
    /// while stopped.
    fn retarget(&mut self, carrier_hz: f64, beat_hz: f64, ramp_sec: f64);

    /// Ramps the shared gain stage to `level` over a short smoothing window.
    /// Silently accepted while stopped.
    fn set_volume(&mut self, level: f32);

    /// Halts output and releases every owned resource. Idempotent; safe to
    /// call before `start`.
    fn stop(&mut self);
}

struct StreamHandle {
    commands: HeapProd<EngineCommand>,
    stop_tx: Sender<()>,
}

pub struct BinauralAudioEngine {
    initial_gain: f32,
    handle: Option<StreamHandle>,
}

impl BinauralAudioEngine {
    pub fn new(initial_gain: f32) -> Self {
        Self {
            initial_gain: initial_gain.clamp(0.0, 1.0),
            handle: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.handle.is_some()
    }
}

impl BeatEngine for BinauralAudioEngine {
    fn start(&mut self, carrier_hz: f64, beat_hz: f64, _initial_ramp_sec: f64) -> Result<()> {
        // One active voice pair at most: restarting tears down the old pair.
        self.stop();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioUnavailable("no output device".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioUnavailable(e.to_string()))?;
        let sample_rate = supported.sample_rate().0 as f32;

        let voices = BinauralVoicePair::new(carrier_hz, beat_hz, self.initial_gain, sample_rate);
        let rb = HeapRb::<EngineCommand>::new(64);
        let (prod, cons) = rb.split();
        let (stop_tx, stop_rx) = unbounded();

        std::thread::spawn(move || {
            run_audio_stream(voices, cons, stop_rx);
        });

        debug!(carrier_hz, beat_hz, sample_rate = sample_rate as f64, "audio engine started");
        self.handle = Some(StreamHandle {
            commands: prod,
            stop_tx,
        });
        Ok(())
    }

    fn retarget(&mut self, carrier_hz: f64, beat_hz: f64, ramp_sec: f64) {
        if let Some(handle) = &mut self.handle {
            let cmd = EngineCommand::Retarget {
                carrier_hz,
                beat_hz,
                ramp_sec,
            };
            if handle.commands.try_push(cmd).is_err() {
                warn!("engine command queue full, retarget dropped");
            }
        }
    }

    fn set_volume(&mut self, level: f32) {
        if let Some(handle) = &mut self.handle {
            if handle
                .commands
                .try_push(EngineCommand::SetGain(level.clamp(0.0, 1.0)))
                .is_err()
            {
                warn!("engine command queue full, volume change dropped");
            }
        }
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Teardown never fails; a dead audio thread just means there is
            // nothing left to signal.
            let _ = handle.stop_tx.send(());
            debug!("audio engine stopped");
        }
    }
}

impl Drop for BinauralAudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the cpal stream for the lifetime of one voice pair. Runs on its own
/// thread; returns (dropping the stream and the voices) once the stop signal
/// arrives or the facade is gone.
fn run_audio_stream(
    voices: BinauralVoicePair,
    cmd_rx: HeapCons<EngineCommand>,
    stop_rx: Receiver<()>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        error!("no output device available");
        return;
    };
    let supported = match device.default_output_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("no default output config: {e}");
            return;
        }
    };
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let mut pair = voices;
    let mut cmds = cmd_rx;
    let audio_callback = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        while let Some(cmd) = cmds.try_pop() {
            match cmd {
                EngineCommand::Retarget {
                    carrier_hz,
                    beat_hz,
                    ramp_sec,
                } => pair.retarget(carrier_hz, beat_hz, ramp_sec),
                EngineCommand::SetGain(level) => pair.set_gain(level),
            }
        }
        pair.render(data);
    };

    let stream = match sample_format {
        SampleFormat::F32 => {
            match device.build_output_stream(
                &config,
                audio_callback,
                |err| error!("stream error: {err}"),
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    error!("failed to build output stream: {e}");
                    return;
                }
            }
        }
        other => {
            error!("unsupported sample format {other:?}");
            return;
        }
    };
    if let Err(e) = stream.play() {
        error!("failed to start output stream: {e}");
        return;
    }

    // Keep the stream alive until the stop signal arrives or the engine
    // facade is dropped.
    loop {
        match stop_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
