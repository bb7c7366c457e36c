//! Speech recognition capability.
//!
//! Recognition is delegated to a platform-supplied engine; this module owns
//! the contract the widget drives: configuration, the event stream, and the
//! lifecycle trait. Backends:
//!
//! - scripted: worker thread playing a fixed word list (always available)
//! - vosk: offline recognition via libvosk (Linux, feature `vosk-backend`)
//!
//! An engine delivers events through the `std::sync::mpsc` sender handed to
//! its constructor; the main loop drains the receiver, so callbacks are
//! never observed concurrently.

use std::sync::mpsc::Sender;

use anyhow::Result;

pub mod scripted;

#[cfg(all(target_os = "linux", feature = "vosk-backend"))]
pub mod vosk;

/// The only locale this widget recognizes in.
pub const LOCALE: &str = "en-US";

/// Engine configuration, fixed at construction time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Keep recognizing across utterances instead of stopping at the first.
    pub continuous: bool,
    /// Emit provisional segments while an utterance is still in flight.
    pub interim_results: bool,
    /// BCP 47 locale tag handed to the recognizer.
    pub locale: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            locale: LOCALE.to_string(),
        }
    }
}

/// One entry of the engine's current result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// The engine will not revise this segment further.
    pub is_final: bool,
}

impl Segment {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Events delivered from the engine to the widget.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Snapshot of the session's result list, oldest segment first.
    Result(Vec<Segment>),
    /// The engine gave up on the current session.
    Error(String),
    /// The engine stopped on its own (silence timeout, end of script).
    End,
}

pub type EventSender = Sender<EngineEvent>;

/// Microphone lifecycle contract. `start` and `stop` may fail synchronously
/// when called in an invalid state; recognition outcomes arrive later as
/// events.
pub trait SpeechEngine {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Best-effort teardown; releases the microphone.
    fn abort(&mut self);
}

/// Probe for a usable engine. With the native backend compiled in, a missing
/// Vosk model means the capability is absent and the caller gets `None`;
/// `force_scripted` skips the native backend for demo runs.
pub fn create_engine(
    config: EngineConfig,
    events: EventSender,
    force_scripted: bool,
) -> Option<Box<dyn SpeechEngine>> {
    #[cfg(all(target_os = "linux", feature = "vosk-backend"))]
    {
        if !force_scripted {
            return match vosk::VoskEngine::probe(&config, events) {
                Ok(engine) => Some(Box::new(engine)),
                Err(err) => {
                    tracing::warn!("native speech recognition unavailable: {err:#}");
                    None
                }
            };
        }
    }

    let _ = force_scripted;
    Some(Box::new(scripted::ScriptedEngine::new(config, events)))
}
