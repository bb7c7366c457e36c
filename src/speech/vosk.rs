//! Native speech recognition using Vosk, with cpal for audio capture.
//!
//! Requires a Vosk model to be downloaded and available. The model path can
//! be configured via:
//! 1. `VOSK_MODEL_PATH` environment variable
//! 2. `~/.local/share/vosk/model` (default)
//!
//! Download models from: https://alphacephei.com/vosk/models

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, warn};
use vosk::{DecodingState, Model, Recognizer};

use super::{EngineConfig, EngineEvent, EventSender, Segment, SpeechEngine};

pub struct VoskEngine {
    config: EngineConfig,
    events: EventSender,
    model_path: PathBuf,
    running: Arc<AtomicBool>,
    stop_signal: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl VoskEngine {
    /// Check that a model is present; absence means the capability is
    /// unavailable for the whole session.
    pub fn probe(config: &EngineConfig, events: EventSender) -> Result<Self> {
        let model_path = model_path()?;
        if !model_path.exists() {
            bail!(
                "Vosk model not found at: {}\n\
                 Download a model from https://alphacephei.com/vosk/models\n\
                 and extract it to ~/.local/share/vosk/model\n\
                 or set VOSK_MODEL_PATH",
                model_path.display()
            );
        }
        debug!(locale = %config.locale, "vosk model selects the language; locale tag is advisory");

        Ok(Self {
            config: config.clone(),
            events,
            model_path,
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
}

fn model_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("VOSK_MODEL_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = env::var("HOME").map_err(|_| anyhow!("HOME environment variable not set"))?;
    Ok(PathBuf::from(home).join(".local/share/vosk/model"))
}

impl SpeechEngine for VoskEngine {
    fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            bail!("recognizer already started");
        }
        self.stop_signal.store(false, Ordering::SeqCst);

        let model_path = self.model_path.clone();
        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        let stop_signal = Arc::clone(&self.stop_signal);
        let interim_results = self.config.interim_results;

        let handle = thread::spawn(move || {
            if let Err(err) = run_recognition(&model_path, &events, &stop_signal, interim_results) {
                warn!("recognition session failed: {err:#}");
                let _ = events.send(EngineEvent::Error(err.to_string()));
            }
            let _ = events.send(EngineEvent::End);
            running.store(false, Ordering::SeqCst);
        });

        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.worker = None;
    }
}

impl Drop for VoskEngine {
    fn drop(&mut self) {
        self.abort();
    }
}

fn run_recognition(
    model_path: &Path,
    events: &EventSender,
    stop_signal: &AtomicBool,
    interim_results: bool,
) -> Result<()> {
    let model = Model::new(model_path.to_string_lossy())
        .ok_or_else(|| anyhow!("failed to load Vosk model from {}", model_path.display()))?;

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no input device available"))?;

    let device_config = device.default_input_config()?;
    let sample_rate = device_config.sample_rate().0 as f32;
    let channels = device_config.channels() as usize;

    let mut recognizer = Recognizer::new(&model, sample_rate)
        .ok_or_else(|| anyhow!("failed to create Vosk recognizer"))?;
    recognizer.set_partial_words(interim_results);

    let audio_buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
    let audio_buffer_for_callback = Arc::clone(&audio_buffer);

    let stream = device.build_input_stream(
        &device_config.into(),
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Average interleaved channels down to mono i16.
            let samples: Vec<i16> = data
                .chunks(channels)
                .map(|frame| {
                    let sum: f32 = frame.iter().sum();
                    (sum / channels as f32 * 32767.0) as i16
                })
                .collect();
            if let Ok(mut buffer) = audio_buffer_for_callback.lock() {
                buffer.extend(samples);
            }
        },
        |err| {
            warn!("audio stream error: {err}");
        },
        None,
    )?;

    stream.play()?;
    debug!("vosk session started ({}Hz, {} ch)", sample_rate, channels);

    // Finalized utterances accumulate over the session; the newest interim
    // rides at the tail of every result snapshot.
    let mut finals: Vec<Segment> = Vec::new();
    let mut last_partial = String::new();

    while !stop_signal.load(Ordering::SeqCst) {
        let samples: Vec<i16> = {
            let mut buffer = audio_buffer
                .lock()
                .map_err(|_| anyhow!("audio buffer poisoned"))?;
            std::mem::take(&mut *buffer)
        };

        if samples.is_empty() {
            thread::sleep(Duration::from_millis(50));
            continue;
        }

        match recognizer.accept_waveform(&samples) {
            Ok(DecodingState::Finalized) => {
                let result = recognizer.result();
                if let Some(single) = result.single() {
                    if !single.text.is_empty() {
                        finals.push(Segment::finalized(single.text));
                        last_partial.clear();
                        if events.send(EngineEvent::Result(finals.clone())).is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            Ok(DecodingState::Running) => {
                if interim_results {
                    let partial = recognizer.partial_result().partial.to_string();
                    if !partial.is_empty() && partial != last_partial {
                        last_partial = partial.clone();
                        let mut list = finals.clone();
                        list.push(Segment::interim(partial));
                        if events.send(EngineEvent::Result(list)).is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            Ok(DecodingState::Failed) => {
                bail!("recognizer rejected audio");
            }
            Err(err) => {
                bail!("accept_waveform failed: {err}");
            }
        }

        thread::sleep(Duration::from_millis(50));
    }

    // Flush whatever the recognizer still holds for the current utterance.
    if let Some(single) = recognizer.final_result().single() {
        if !single.text.is_empty() {
            finals.push(Segment::finalized(single.text));
            let _ = events.send(EngineEvent::Result(finals));
        }
    }

    Ok(())
}
