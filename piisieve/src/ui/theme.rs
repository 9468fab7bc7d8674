//! Colors used for terminal output.
//!
//! Styling is applied only when the target stream is a terminal; piped output
//! is always plain text.

use std::collections::HashMap;

use owo_colors::{AnsiColors, OwoColorize};

/// Type alias for the theme map.
pub type ThemeMap = HashMap<ThemeEntry, AnsiColors>;

/// The logical parts of the output that can be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeEntry {
    Success,
    Info,
    Warn,
    Error,
}

/// The built-in theme.
pub fn default_theme_map() -> ThemeMap {
    HashMap::from([
        (ThemeEntry::Success, AnsiColors::Green),
        (ThemeEntry::Info, AnsiColors::White),
        (ThemeEntry::Warn, AnsiColors::Yellow),
        (ThemeEntry::Error, AnsiColors::Red),
    ])
}

/// Returns `text` styled for `entry`, or unchanged when color is disabled.
pub fn paint(text: &str, entry: ThemeEntry, theme: &ThemeMap, enable_color: bool) -> String {
    match theme.get(&entry) {
        Some(color) if enable_color => text.color(*color).to_string(),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_is_plain_without_color() {
        let theme = default_theme_map();
        assert_eq!(paint("[piisieve WARN]", ThemeEntry::Warn, &theme, false), "[piisieve WARN]");
        assert_ne!(paint("[piisieve WARN]", ThemeEntry::Warn, &theme, true), "[piisieve WARN]");
    }

    #[test]
    fn every_entry_has_a_color() {
        let theme = default_theme_map();
        for entry in [ThemeEntry::Success, ThemeEntry::Info, ThemeEntry::Warn, ThemeEntry::Error] {
            assert!(theme.contains_key(&entry), "{:?}", entry);
        }
    }
}
