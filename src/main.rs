//! spellout - voice dictation widget for the terminal
//!
//! Listens via the microphone, shows the recognized word with a
//! letter-by-letter spelling, and keeps a short history of recent words.

use std::env;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use termwiz::caps::Capabilities;
use termwiz::input::{InputEvent, KeyCode, KeyEvent, Modifiers};
use termwiz::terminal::{new_terminal, Terminal};

mod clipboard;
mod speech;
mod text;
mod timer;
mod ui;
mod widget;

use clipboard::SystemClipboard;
use speech::EngineConfig;
use text::SpellStyle;
use widget::{DictationWidget, TranscriptMode};

const USAGE: &str = "\
spellout - speak a word, see it spelled out

USAGE:
    spellout [OPTIONS]

OPTIONS:
    --latest-only    read only the newest recognition segment
    --keep-case      spell with original casing, double-spaced letters
    --demo           use the scripted engine instead of the microphone
    -h, --help       show this help

KEYS:
    Space  start/stop listening    c  copy spelling
    x      clear                   q  quit
";

struct Options {
    mode: TranscriptMode,
    style: SpellStyle,
    demo: bool,
}

fn parse_args() -> Result<Options> {
    let mut options = Options {
        mode: TranscriptMode::default(),
        style: SpellStyle::default(),
        demo: false,
    };
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--latest-only" => options.mode = TranscriptMode::LatestOnly,
            "--keep-case" => options.style = SpellStyle::KeepCase,
            "--demo" => options.demo = true,
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown option: {other}\n\n{USAGE}"),
        }
    }
    Ok(options)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args()?;

    let (event_tx, event_rx) = mpsc::channel();
    let engine = speech::create_engine(EngineConfig::default(), event_tx, options.demo);
    let mut widget = DictationWidget::new(engine, options.mode, options.style);
    let mut system_clipboard = SystemClipboard::new();

    let caps = Capabilities::new_from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
    let mut term = new_terminal(caps).map_err(|e| anyhow::anyhow!("{}", e))?;
    term.set_raw_mode().map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut screen = ui::Screen::default();
    let tick_rate = Duration::from_millis(33); // ~30 FPS
    let mut quit = false;

    while !quit {
        let now = Instant::now();
        widget.tick(now);

        // Drain engine callbacks into the state machine
        while let Ok(event) = event_rx.try_recv() {
            widget.handle_event(event, now);
        }

        screen.tick();
        screen.draw(&mut term, &widget)?;

        let input = term
            .poll_input(Some(tick_rate))
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        if let Some(InputEvent::Key(KeyEvent { key, modifiers })) = input {
            match key {
                KeyCode::Char('c') if modifiers == Modifiers::CTRL => quit = true,
                KeyCode::Char('q') | KeyCode::Escape => quit = true,
                KeyCode::Char(' ') => widget.toggle_listening(Instant::now()),
                KeyCode::Char('c') => {
                    widget.copy_to_clipboard(&mut system_clipboard, Instant::now());
                }
                KeyCode::Char('x') => widget.clear(),
                _ => {}
            }
        }
    }

    screen.clear(&mut term)?;
    term.set_cooked_mode().map_err(|e| anyhow::anyhow!("{}", e))?;
    drop(widget); // aborts the engine, releasing the microphone

    Ok(())
}
