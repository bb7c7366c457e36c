//! Derived-text formatting for recognized words.

/// Letter layout used when expanding a word into its spelled-out form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpellStyle {
    /// Uppercase letters joined by a single space: "H E L L O".
    #[default]
    Uppercase,
    /// Original casing, letters joined by two spaces: "H  e  l  l  o".
    KeepCase,
}

/// Trim, then uppercase the first character and lowercase the rest.
pub fn title_case(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(trimmed.len());
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
            out
        }
        None => String::new(),
    }
}

/// Expand a word letter by letter. A space inside the word widens with the
/// separator, so word boundaries stay visible in the spelled form.
pub fn spell_out(word: &str, style: SpellStyle) -> String {
    let separator = match style {
        SpellStyle::Uppercase => " ",
        SpellStyle::KeepCase => "  ",
    };
    let mut out = String::with_capacity(word.len() * (separator.len() + 1));
    for (i, ch) in word.chars().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        match style {
            SpellStyle::Uppercase => out.extend(ch.to_uppercase()),
            SpellStyle::KeepCase => out.push(ch),
        }
    }
    out
}
