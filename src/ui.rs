//! Inline terminal rendering using termwiz.
//!
//! The widget occupies a handful of rows at the cursor position (status
//! line, spelling, recent words, controls) and repaints them in place with
//! relative cursor moves, so it lives inside the shell scrollback instead
//! of owning the screen. termwiz talks to /dev/tty directly, which keeps
//! stderr free for logs.

use anyhow::Result;
use termwiz::cell::AttributeChange;
use termwiz::color::ColorAttribute;
use termwiz::surface::{Change, CursorVisibility, Position};
use termwiz::terminal::Terminal;

use crate::widget::DictationWidget;

const LISTENING_FRAMES: usize = 16;

/// Styled text segment
struct Segment {
    text: String,
    color: ColorAttribute,
}

impl Segment {
    fn new(text: impl Into<String>, color: ColorAttribute) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }

    fn dim(text: impl Into<String>) -> Self {
        Self::new(text, ColorAttribute::PaletteIndex(8))
    }
}

/// The widget's patch of terminal. Between frames the cursor parks on the
/// top row, so a frame is: overwrite every row we own, step back up.
#[derive(Default)]
pub struct Screen {
    rows: usize,
    animation_frame: usize,
}

impl Screen {
    pub fn tick(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Repaint the widget in place.
    pub fn draw(&mut self, term: &mut dyn Terminal, widget: &DictationWidget) -> Result<()> {
        let mut lines = build_lines(widget, self.animation_frame);
        // Never paint fewer rows than we own: a shrinking frame blanks the
        // rows it no longer uses instead of leaving them behind.
        while lines.len() < self.rows {
            lines.push(Vec::new());
        }

        let mut changes = vec![Change::CursorVisibility(CursorVisibility::Hidden)];
        for segments in &lines {
            changes.push(Change::ClearToEndOfLine(Default::default()));
            for segment in segments {
                changes.push(Change::Attribute(AttributeChange::Foreground(
                    segment.color,
                )));
                changes.push(Change::Text(segment.text.clone()));
            }
            changes.push(Change::Attribute(AttributeChange::Foreground(
                ColorAttribute::Default,
            )));
            changes.push(Change::Text("\r\n".to_string()));
        }
        changes.push(rewind(lines.len()));

        term.render(&changes).map_err(|e| anyhow::anyhow!("{}", e))?;
        self.rows = lines.len();
        Ok(())
    }

    /// Blank our rows and hand the cursor back on exit.
    pub fn clear(&mut self, term: &mut dyn Terminal) -> Result<()> {
        let mut changes = Vec::with_capacity(self.rows * 2 + 2);
        for _ in 0..self.rows {
            changes.push(Change::ClearToEndOfLine(Default::default()));
            // Step, don't "\r\n": a newline on the bottom row would scroll.
            changes.push(Change::CursorPosition {
                x: Position::Absolute(0),
                y: Position::Relative(1),
            });
        }
        if self.rows > 0 {
            changes.push(rewind(self.rows));
        }
        changes.push(Change::CursorVisibility(CursorVisibility::Visible));

        term.render(&changes).map_err(|e| anyhow::anyhow!("{}", e))?;
        self.rows = 0;
        Ok(())
    }
}

/// Move the cursor back to the top row of the region.
fn rewind(rows: usize) -> Change {
    Change::CursorPosition {
        x: Position::Absolute(0),
        y: Position::Relative(-(rows as isize)),
    }
}

fn build_lines(widget: &DictationWidget, frame: usize) -> Vec<Vec<Segment>> {
    if !widget.supported() {
        let message = widget
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Speech recognition is not available.".to_string());
        return vec![vec![
            Segment::new("✗ ", ColorAttribute::PaletteIndex(1)),
            Segment::dim(message),
        ]];
    }

    let mut lines = Vec::new();

    // Line 1: status glyph + word / interim / error / placeholder
    let mut line1 = Vec::new();
    let (glyph, glyph_color) = status_glyph(widget, frame);
    line1.push(Segment::new(glyph, glyph_color));
    line1.push(Segment::new(" ", ColorAttribute::Default));

    if let Some(error) = widget.error() {
        line1.push(Segment::new(
            error.to_string(),
            ColorAttribute::PaletteIndex(1),
        ));
    } else if widget.interim_active() {
        if widget.interim_text().is_empty() {
            line1.push(Segment::dim("Speak now..."));
        } else {
            // Unsettled text in the provisional cyan
            line1.push(Segment::new(
                widget.interim_text(),
                rgb(120, 160, 180),
            ));
        }
    } else if !widget.current_word().is_empty() {
        line1.push(Segment::new(widget.current_word(), rgb(255, 255, 255)));
    } else if widget.listening() {
        line1.push(Segment::dim("Speak now..."));
    }
    lines.push(line1);

    // Line 2: spelled-out letters
    if !widget.spelled().is_empty() {
        lines.push(vec![
            Segment::new("  ", ColorAttribute::Default),
            Segment::new(widget.spelled(), ColorAttribute::PaletteIndex(6)),
        ]);
    }

    // History: most recent first, fading out
    let history: Vec<&str> = widget.history().collect();
    if history.len() > 1 {
        let mut line = vec![Segment::dim("  recent: ")];
        for (i, word) in history.iter().enumerate().skip(1) {
            if i > 1 {
                line.push(Segment::dim(" · "));
            }
            line.push(Segment::new(*word, ColorAttribute::PaletteIndex(7)));
        }
        lines.push(line);
    }

    // Status bar
    let mut status = vec![
        Segment::new("Space", ColorAttribute::PaletteIndex(3)),
        Segment::dim(if widget.listening() { " stop • " } else { " listen • " }),
        Segment::new("c", ColorAttribute::PaletteIndex(5)),
        Segment::dim(" copy • "),
        Segment::new("x", ColorAttribute::PaletteIndex(4)),
        Segment::dim(" clear • "),
        Segment::new("q", ColorAttribute::PaletteIndex(1)),
        Segment::dim(" quit"),
    ];
    if widget.copied_ack() {
        status.push(Segment::new("  copied ✓", ColorAttribute::PaletteIndex(2)));
    }
    lines.push(status);

    lines
}

fn status_glyph(widget: &DictationWidget, frame: usize) -> (&'static str, ColorAttribute) {
    if widget.error().is_some() {
        ("✗", ColorAttribute::PaletteIndex(1))
    } else if widget.listening() {
        // Pulsing red dot
        let pulse =
            (frame as f32 / LISTENING_FRAMES as f32 * std::f32::consts::PI).sin();
        let brightness = 200 + ((pulse + 1.0) / 2.0 * 55.0) as u8;
        ("●", rgb(brightness, 0, 0))
    } else {
        ("○", ColorAttribute::PaletteIndex(8))
    }
}

fn rgb(r: u8, g: u8, b: u8) -> ColorAttribute {
    ColorAttribute::TrueColorWithDefaultFallback(
        termwiz::color::SrgbaTuple(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            1.0,
        )
        .into(),
    )
}
