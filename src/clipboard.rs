//! Clipboard capability.
//!
//! A single write operation behind a trait so the widget can be exercised
//! without a windowing session; the system implementation uses arboard,
//! which covers X11 and Wayland.

use anyhow::Result;

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard. Construction is lazy-failing: headless sessions get a
/// sink that reports failure on write instead of refusing to start.
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        let inner = match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(err) => {
                tracing::debug!("clipboard unavailable: {err}");
                None
            }
        };
        Self { inner }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        match self.inner.as_mut() {
            Some(clipboard) => clipboard.set_text(text.to_string()).map_err(Into::into),
            None => anyhow::bail!("no clipboard in this session"),
        }
    }
}
