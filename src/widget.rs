//! The dictation widget: session state and every transition that mutates it.
//!
//! The widget owns the speech engine for its mounted lifetime and is driven
//! from the main loop three ways: user intent (toggle/clear/copy), engine
//! events drained from the channel, and the per-frame tick that advances
//! deadlines. All timed behavior (interim decay, delayed restart, the copy
//! acknowledgment) lives in `Countdown`s polled by `tick`, so every
//! transition is deterministic under test.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::clipboard::Clipboard;
use crate::speech::{EngineEvent, Segment, SpeechEngine};
use crate::text::{self, SpellStyle};
use crate::timer::Countdown;

pub const MAX_HISTORY: usize = 5;
/// How long an interim display survives without a newer event.
pub const INTERIM_HOLD: Duration = Duration::from_secs(2);
/// Pause before restarting the engine after an unsolicited end, so a
/// flapping engine cannot spin the restart path.
pub const RESTART_DELAY: Duration = Duration::from_millis(100);
/// How long the copy acknowledgment stays visible.
pub const COPIED_HOLD: Duration = Duration::from_secs(2);

/// How an engine result list is folded back into a single utterance. The
/// two are not equivalent for multi-segment lists and both are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptMode {
    /// Concatenate segments newest-to-oldest, up to and including the first
    /// final one; captures multi-segment utterances.
    #[default]
    FoldResults,
    /// Read only the single most recent segment.
    LatestOnly,
}

/// User-visible failures. Messages are fixed; detail goes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DictationError {
    #[error("Speech recognition is not available on this system.")]
    CapabilityUnavailable,
    #[error("Could not start the microphone. Try again.")]
    StartFailure,
    #[error("Speech recognition error.")]
    Engine,
}

pub struct DictationWidget {
    engine: Option<Box<dyn SpeechEngine>>,
    supported: bool,
    listening: bool,
    interim_active: bool,
    error: Option<DictationError>,
    current: String,
    spelled: String,
    interim_text: String,
    history: VecDeque<String>,
    mode: TranscriptMode,
    style: SpellStyle,
    interim_hold: Countdown,
    restart: Countdown,
    copied: Countdown,
}

impl DictationWidget {
    /// `engine` is the availability-probe outcome; `None` renders the whole
    /// widget inert apart from the fixed unsupported message.
    pub fn new(
        engine: Option<Box<dyn SpeechEngine>>,
        mode: TranscriptMode,
        style: SpellStyle,
    ) -> Self {
        let supported = engine.is_some();
        Self {
            engine,
            supported,
            listening: false,
            interim_active: false,
            error: (!supported).then_some(DictationError::CapabilityUnavailable),
            current: String::new(),
            spelled: String::new(),
            interim_text: String::new(),
            history: VecDeque::with_capacity(MAX_HISTORY + 1),
            mode,
            style,
            interim_hold: Countdown::default(),
            restart: Countdown::default(),
            copied: Countdown::default(),
        }
    }

    pub fn supported(&self) -> bool {
        self.supported
    }

    pub fn listening(&self) -> bool {
        self.listening
    }

    pub fn interim_active(&self) -> bool {
        self.interim_active
    }

    pub fn error(&self) -> Option<DictationError> {
        self.error
    }

    /// Most recent finalized word, title-cased.
    pub fn current_word(&self) -> &str {
        &self.current
    }

    /// Letter-by-letter expansion of the current word.
    pub fn spelled(&self) -> &str {
        &self.spelled
    }

    pub fn interim_text(&self) -> &str {
        &self.interim_text
    }

    /// Finalized words, most recent first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// True while the transient "copied" acknowledgment should show.
    pub fn copied_ack(&self) -> bool {
        self.copied.is_armed()
    }

    /// Flip between listening and idle. A synchronous start failure is
    /// caught here and surfaced as state, never propagated.
    pub fn toggle_listening(&mut self, now: Instant) {
        if !self.supported {
            return;
        }

        if self.listening {
            self.listening = false;
            self.drop_interim();
            self.restart.cancel();
            if let Some(engine) = self.engine.as_mut() {
                if let Err(err) = engine.stop() {
                    warn!("engine stop failed: {err:#}");
                }
            }
            debug!("stopped listening");
            return;
        }

        self.error = None;
        self.current.clear();
        self.spelled.clear();
        // Optimistic: show activity immediately, let the debounce take it
        // back if the engine stays quiet.
        self.begin_interim(now);

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match engine.start() {
            Ok(()) => {
                self.listening = true;
                debug!("listening");
            }
            Err(err) => {
                warn!("engine start failed: {err:#}");
                self.drop_interim();
                self.listening = false;
                self.error = Some(DictationError::StartFailure);
            }
        }
    }

    /// Reset the display (word, spelling, history, interim, error).
    /// Listening state is untouched.
    pub fn clear(&mut self) {
        if !self.supported {
            return;
        }
        self.current.clear();
        self.spelled.clear();
        self.history.clear();
        self.drop_interim();
        self.error = None;
    }

    /// Write the spelled text to the clipboard; success shows a transient
    /// acknowledgment, failure is silent.
    pub fn copy_to_clipboard(&mut self, clipboard: &mut dyn Clipboard, now: Instant) {
        if !self.supported || self.spelled.is_empty() {
            return;
        }
        match clipboard.set_text(&self.spelled) {
            Ok(()) => self.copied.arm(now, COPIED_HOLD),
            Err(err) => debug!("clipboard write failed: {err:#}"),
        }
    }

    /// Inject one engine callback into the state machine.
    pub fn handle_event(&mut self, event: EngineEvent, now: Instant) {
        if !self.supported {
            return;
        }
        match event {
            EngineEvent::Result(segments) => self.on_result(&segments, now),
            EngineEvent::Error(message) => self.on_error(&message),
            EngineEvent::End => self.on_end(now),
        }
    }

    /// Advance deadlines. Called once per main-loop frame; never blocks.
    pub fn tick(&mut self, now: Instant) {
        if self.interim_hold.fired(now) {
            self.interim_active = false;
            self.interim_text.clear();
        }

        if self.restart.fired(now) && self.listening {
            if let Some(engine) = self.engine.as_mut() {
                if let Err(err) = engine.start() {
                    // Expected race during rapid stop/start; not escalated.
                    debug!("auto-restart failed: {err:#}");
                }
            }
        }

        let _ = self.copied.fired(now);
    }

    fn on_result(&mut self, segments: &[Segment], now: Instant) {
        let Some(utterance) = reconstruct(segments, self.mode) else {
            return;
        };

        if utterance.is_final {
            // A final always ends the interim display, even when the engine
            // finalized nothing but whitespace.
            self.drop_interim();
            let word = text::title_case(&utterance.text);
            if word.is_empty() {
                return;
            }
            self.spelled = text::spell_out(&word, self.style);
            self.current = word;
            self.history.push_front(self.current.clone());
            self.history.truncate(MAX_HISTORY);
            debug!(word = %self.current, "finalized");
        } else {
            let interim = utterance.text.trim();
            if !interim.is_empty() {
                self.interim_text = interim.to_string();
                self.begin_interim(now);
            }
        }
    }

    fn on_error(&mut self, message: &str) {
        warn!("engine error: {message}");
        self.error = Some(DictationError::Engine);
        self.listening = false;
        self.drop_interim();
        // Terminal for this session: no auto-restart after an explicit error.
        self.restart.cancel();
    }

    /// The engine stopped on its own (silence timeout, end of script). If
    /// the user still wants to listen, schedule a best-effort restart.
    fn on_end(&mut self, now: Instant) {
        self.drop_interim();
        if self.listening {
            self.restart.arm(now, RESTART_DELAY);
            debug!("engine ended on its own, restart pending");
        }
    }

    fn begin_interim(&mut self, now: Instant) {
        self.interim_active = true;
        self.interim_hold.arm(now, INTERIM_HOLD);
    }

    fn drop_interim(&mut self) {
        self.interim_active = false;
        self.interim_text.clear();
        self.interim_hold.cancel();
    }
}

impl Drop for DictationWidget {
    fn drop(&mut self) {
        // Release the microphone with the session.
        if let Some(engine) = self.engine.as_mut() {
            engine.abort();
        }
    }
}

struct Utterance {
    text: String,
    is_final: bool,
}

/// Rebuild the intended utterance from the engine's result list. Finality
/// is decided by the newest entry in both modes.
fn reconstruct(segments: &[Segment], mode: TranscriptMode) -> Option<Utterance> {
    let newest = segments.last()?;
    let text = match mode {
        TranscriptMode::LatestOnly => newest.text.clone(),
        TranscriptMode::FoldResults => {
            let mut parts: Vec<&str> = Vec::new();
            for segment in segments.iter().rev() {
                parts.push(segment.text.as_str());
                if segment.is_final {
                    break;
                }
            }
            parts.reverse();
            parts.join(" ")
        }
    };
    Some(Utterance {
        text,
        is_final: newest.is_final,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct EngineProbe {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: AtomicBool,
    }

    struct TestEngine {
        probe: Arc<EngineProbe>,
    }

    impl SpeechEngine for TestEngine {
        fn start(&mut self) -> anyhow::Result<()> {
            self.probe.starts.fetch_add(1, Ordering::SeqCst);
            if self.probe.fail_start.load(Ordering::SeqCst) {
                bail!("microphone refused");
            }
            Ok(())
        }

        fn stop(&mut self) -> anyhow::Result<()> {
            self.probe.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn abort(&mut self) {}
    }

    #[derive(Default)]
    struct MemClipboard {
        texts: Vec<String>,
        fail: bool,
    }

    impl Clipboard for MemClipboard {
        fn set_text(&mut self, text: &str) -> anyhow::Result<()> {
            if self.fail {
                bail!("no clipboard");
            }
            self.texts.push(text.to_string());
            Ok(())
        }
    }

    fn widget() -> (DictationWidget, Arc<EngineProbe>) {
        widget_with(TranscriptMode::default(), SpellStyle::default())
    }

    fn widget_with(
        mode: TranscriptMode,
        style: SpellStyle,
    ) -> (DictationWidget, Arc<EngineProbe>) {
        let probe = Arc::new(EngineProbe::default());
        let engine = TestEngine {
            probe: Arc::clone(&probe),
        };
        (DictationWidget::new(Some(Box::new(engine)), mode, style), probe)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn interims_then_final_displays_title_cased_word() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        widget.toggle_listening(t0);

        widget.handle_event(EngineEvent::Result(vec![Segment::interim("hel")]), t0 + ms(100));
        widget.handle_event(
            EngineEvent::Result(vec![Segment::interim("hello wor")]),
            t0 + ms(200),
        );
        assert!(widget.interim_active());
        assert_eq!(widget.interim_text(), "hello wor");

        widget.handle_event(
            EngineEvent::Result(vec![Segment::finalized(" hello world ")]),
            t0 + ms(300),
        );
        assert_eq!(widget.current_word(), "Hello world");
        assert_eq!(widget.spelled(), "H E L L O   W O R L D");
        assert!(!widget.interim_active());
        assert_eq!(widget.interim_text(), "");
    }

    #[test]
    fn history_keeps_five_most_recent_newest_first() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        for word in ["one", "two", "three", "four", "five", "six", "seven"] {
            widget.handle_event(EngineEvent::Result(vec![Segment::finalized(word)]), t0);
        }
        let history: Vec<&str> = widget.history().collect();
        assert_eq!(history, ["Seven", "Six", "Five", "Four", "Three"]);
    }

    #[test]
    fn interim_decays_after_two_seconds() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        widget.handle_event(EngineEvent::Result(vec![Segment::interim("hel")]), t0);
        assert!(widget.interim_active());

        widget.tick(t0 + ms(1_999));
        assert!(widget.interim_active());

        widget.tick(t0 + ms(2_001));
        assert!(!widget.interim_active());
        assert_eq!(widget.interim_text(), "");
    }

    #[test]
    fn each_interim_event_restarts_the_decay() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        widget.handle_event(EngineEvent::Result(vec![Segment::interim("he")]), t0);
        widget.handle_event(
            EngineEvent::Result(vec![Segment::interim("hell")]),
            t0 + ms(1_500),
        );

        widget.tick(t0 + ms(2_500));
        assert!(widget.interim_active());

        widget.tick(t0 + ms(3_600));
        assert!(!widget.interim_active());
    }

    #[test]
    fn double_toggle_leaves_idle_with_no_pending_restart() {
        let (mut widget, probe) = widget();
        let t0 = Instant::now();
        widget.toggle_listening(t0);
        widget.toggle_listening(t0);

        assert!(!widget.listening());
        widget.tick(t0 + ms(500));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_failure_rolls_back_and_sets_message() {
        let (mut widget, probe) = widget();
        probe.fail_start.store(true, Ordering::SeqCst);
        widget.toggle_listening(Instant::now());

        assert!(!widget.listening());
        assert!(!widget.interim_active());
        assert_eq!(widget.error(), Some(DictationError::StartFailure));
    }

    #[test]
    fn starting_clears_previous_error_and_word() {
        let (mut widget, probe) = widget();
        let t0 = Instant::now();
        probe.fail_start.store(true, Ordering::SeqCst);
        widget.toggle_listening(t0);
        assert!(widget.error().is_some());

        probe.fail_start.store(false, Ordering::SeqCst);
        widget.toggle_listening(t0 + ms(100));
        assert!(widget.listening());
        assert!(widget.error().is_none());
        assert_eq!(widget.current_word(), "");
        assert!(widget.interim_active());
    }

    #[test]
    fn unsupported_widget_is_inert() {
        let mut widget =
            DictationWidget::new(None, TranscriptMode::default(), SpellStyle::default());
        assert!(!widget.supported());
        assert_eq!(widget.error(), Some(DictationError::CapabilityUnavailable));

        let t0 = Instant::now();
        widget.toggle_listening(t0);
        assert!(!widget.listening());

        widget.handle_event(
            EngineEvent::Result(vec![Segment::finalized("hello")]),
            t0,
        );
        assert_eq!(widget.current_word(), "");
    }

    #[test]
    fn unsolicited_end_restarts_after_delay() {
        let (mut widget, probe) = widget();
        let t0 = Instant::now();
        widget.toggle_listening(t0);
        widget.handle_event(EngineEvent::End, t0 + ms(500));

        widget.tick(t0 + ms(599));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);

        widget.tick(t0 + ms(601));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 2);
        assert!(widget.listening());
    }

    #[test]
    fn end_after_explicit_stop_does_not_restart() {
        let (mut widget, probe) = widget();
        let t0 = Instant::now();
        widget.toggle_listening(t0);
        widget.toggle_listening(t0 + ms(100));
        widget.handle_event(EngineEvent::End, t0 + ms(150));

        widget.tick(t0 + ms(1_000));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);
        assert!(!widget.listening());
    }

    #[test]
    fn restart_failure_is_swallowed() {
        let (mut widget, probe) = widget();
        let t0 = Instant::now();
        widget.toggle_listening(t0);
        widget.handle_event(EngineEvent::End, t0);

        probe.fail_start.store(true, Ordering::SeqCst);
        widget.tick(t0 + ms(200));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 2);
        // Not escalated: no user-visible error, state unchanged.
        assert!(widget.error().is_none());
        assert!(widget.listening());
    }

    #[test]
    fn engine_error_stops_session_without_restart() {
        let (mut widget, probe) = widget();
        let t0 = Instant::now();
        widget.toggle_listening(t0);
        widget.handle_event(EngineEvent::Result(vec![Segment::interim("he")]), t0);

        widget.handle_event(EngineEvent::Error("boom".into()), t0 + ms(100));
        assert!(!widget.listening());
        assert!(!widget.interim_active());
        assert_eq!(widget.error(), Some(DictationError::Engine));

        widget.tick(t0 + ms(5_000));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_resets_display_but_not_listening() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        widget.toggle_listening(t0);
        widget.handle_event(EngineEvent::Result(vec![Segment::finalized("hello")]), t0);
        widget.handle_event(EngineEvent::Result(vec![Segment::interim("wor")]), t0);

        widget.clear();
        assert_eq!(widget.current_word(), "");
        assert_eq!(widget.spelled(), "");
        assert_eq!(widget.history().count(), 0);
        assert!(!widget.interim_active());
        assert_eq!(widget.interim_text(), "");
        assert!(widget.error().is_none());
        assert!(widget.listening());

        // The interim countdown is gone too: nothing left for it to undo.
        widget.tick(t0 + ms(5_000));
        assert!(!widget.interim_active());
    }

    #[test]
    fn copy_shows_transient_acknowledgment() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        widget.handle_event(EngineEvent::Result(vec![Segment::finalized("hello")]), t0);

        let mut clipboard = MemClipboard::default();
        widget.copy_to_clipboard(&mut clipboard, t0);
        assert_eq!(clipboard.texts, ["H E L L O"]);
        assert!(widget.copied_ack());

        widget.tick(t0 + ms(2_500));
        assert!(!widget.copied_ack());
    }

    #[test]
    fn copy_failure_is_silent() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        widget.handle_event(EngineEvent::Result(vec![Segment::finalized("hello")]), t0);

        let mut clipboard = MemClipboard {
            fail: true,
            ..MemClipboard::default()
        };
        widget.copy_to_clipboard(&mut clipboard, t0);
        assert!(!widget.copied_ack());
        assert!(widget.error().is_none());
    }

    #[test]
    fn copy_without_a_word_is_a_no_op() {
        let (mut widget, _) = widget();
        let mut clipboard = MemClipboard::default();
        widget.copy_to_clipboard(&mut clipboard, Instant::now());
        assert!(clipboard.texts.is_empty());
        assert!(!widget.copied_ack());
    }

    #[test]
    fn whitespace_final_ends_interim_without_history_entry() {
        let (mut widget, _) = widget();
        let t0 = Instant::now();
        widget.handle_event(EngineEvent::Result(vec![Segment::interim("he")]), t0);
        widget.handle_event(EngineEvent::Result(vec![Segment::finalized("   ")]), t0);

        assert!(!widget.interim_active());
        assert_eq!(widget.history().count(), 0);
        assert_eq!(widget.current_word(), "");
    }

    #[test]
    fn keep_case_spelling_variant() {
        let (mut widget, _) = widget_with(TranscriptMode::default(), SpellStyle::KeepCase);
        widget.handle_event(
            EngineEvent::Result(vec![Segment::finalized("hello")]),
            Instant::now(),
        );
        assert_eq!(widget.spelled(), "H  e  l  l  o");
    }

    #[test]
    fn fold_and_latest_diverge_on_multi_segment_lists() {
        let segments = vec![Segment::finalized("knock"), Segment::interim("who's there")];

        let folded = reconstruct(&segments, TranscriptMode::FoldResults).unwrap();
        assert_eq!(folded.text, "knock who's there");
        assert!(!folded.is_final);

        let latest = reconstruct(&segments, TranscriptMode::LatestOnly).unwrap();
        assert_eq!(latest.text, "who's there");
        assert!(!latest.is_final);
    }

    #[test]
    fn fold_stops_at_first_final_from_the_newest_end() {
        let segments = vec![
            Segment::finalized("older"),
            Segment::finalized("newer"),
            Segment::interim("tail"),
        ];
        let folded = reconstruct(&segments, TranscriptMode::FoldResults).unwrap();
        assert_eq!(folded.text, "newer tail");
    }

    #[test]
    fn reconstruct_empty_list_is_nothing() {
        assert!(reconstruct(&[], TranscriptMode::FoldResults).is_none());
        assert!(reconstruct(&[], TranscriptMode::LatestOnly).is_none());
    }
}
