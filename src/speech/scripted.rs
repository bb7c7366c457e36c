//! Scripted speech engine for platforms without a native backend.
//!
//! Plays a fixed word list on a worker thread: growing interim fragments,
//! then a final segment per word, then an end event — the same event shape
//! a real recognizer produces, at a pace slow enough to watch.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};

use super::{EngineConfig, EngineEvent, EventSender, Segment, SpeechEngine};

const SCRIPT: [&str; 5] = ["hello", "world", "dictation", "spelling", "terminal"];
const FRAGMENT_DELAY: Duration = Duration::from_millis(120);
const WORD_DELAY: Duration = Duration::from_millis(400);

pub struct ScriptedEngine {
    config: EngineConfig,
    events: EventSender,
    running: Arc<AtomicBool>,
    stop_signal: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ScriptedEngine {
    pub fn new(config: EngineConfig, events: EventSender) -> Self {
        Self {
            config,
            events,
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl SpeechEngine for ScriptedEngine {
    fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            bail!("scripted engine already started");
        }
        self.stop_signal.store(false, Ordering::SeqCst);

        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        let stop_signal = Arc::clone(&self.stop_signal);
        let continuous = self.config.continuous;
        let interim_results = self.config.interim_results;

        let handle = thread::spawn(move || {
            run_script(&events, &stop_signal, continuous, interim_results);
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

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.abort();
    }
}

fn run_script(
    events: &EventSender,
    stop_signal: &AtomicBool,
    continuous: bool,
    interim_results: bool,
) {
    let mut finals: Vec<Segment> = Vec::new();

    'script: for word in SCRIPT {
        if interim_results {
            // Growing fragments of the word, revised in place.
            let chars: Vec<char> = word.chars().collect();
            for n in 1..chars.len() {
                if stop_signal.load(Ordering::SeqCst) {
                    break 'script;
                }
                let fragment: String = chars[..n].iter().collect();
                let mut list = finals.clone();
                list.push(Segment::interim(fragment));
                if events.send(EngineEvent::Result(list)).is_err() {
                    return;
                }
                thread::sleep(FRAGMENT_DELAY);
            }
        }

        if stop_signal.load(Ordering::SeqCst) {
            break;
        }

        finals.push(Segment::finalized(word));
        if events.send(EngineEvent::Result(finals.clone())).is_err() {
            return;
        }

        if !continuous {
            break;
        }
        thread::sleep(WORD_DELAY);
    }

    let _ = events.send(EngineEvent::End);
}
