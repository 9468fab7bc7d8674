//! Status messages written to stderr.

use std::io::{self, Write};

use is_terminal::IsTerminal;

use crate::ui::theme::{paint, ThemeEntry, ThemeMap};

fn print_message(entry: ThemeEntry, prefix: &str, msg: &str, theme: &ThemeMap) {
    let stderr = io::stderr();
    let color = stderr.is_terminal();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "{} {}", paint(prefix, entry, theme, color), msg);
}

pub fn info_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    print_message(ThemeEntry::Info, "[piisieve]", msg.as_ref(), theme);
}

pub fn success_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    print_message(ThemeEntry::Success, "[piisieve]", msg.as_ref(), theme);
}

pub fn warn_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    print_message(ThemeEntry::Warn, "[piisieve WARN]", msg.as_ref(), theme);
}

pub fn error_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    print_message(ThemeEntry::Error, "[piisieve ERROR]", msg.as_ref(), theme);
}
