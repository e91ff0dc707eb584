// src/scrub.rs

//! ANSI escape sequence removal for captured output.
//!
//! Every chunk read from a child's stdout/stderr goes through [`scrub`]
//! before it is buffered or published, so pattern waits and stored logs only
//! ever see plain text.
//!
//! Recognised sequences:
//! - CSI (`ESC [` or the 8-bit `0x9B` introducer) with parameters,
//!   intermediates and a final byte, e.g. colours and cursor movement.
//! - OSC (`ESC ]`) terminated by BEL or ST, e.g. window titles and hyperlinks.
//! - Character set designations (`ESC ( B`).
//! - Two-byte escapes (`ESC M`, `ESC 7`, `ESC c`, ...).

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|(?:\x1b\[|\x{9B})[0-?]*[ -/]*[@-~]",
        r"|\x1b[()#][0-9A-Za-z]",
        r"|\x1b[@-Z\\-_=>78c]",
    ))
    .expect("ANSI regex is valid")
});

// An escape sequence cut off at the end of the text.
static PARTIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:\x1b\[|\x{9B})[0-?]*[ -/]*\z",
        r"|\x1b\][^\x07\x1b]*\x1b?\z",
        r"|\x1b[()#]?\z",
    ))
    .expect("partial ANSI regex is valid")
});

/// Strip ANSI escape sequences from `chunk`.
///
/// Borrows when there is nothing to remove.
pub fn scrub(chunk: &str) -> Cow<'_, str> {
    if !chunk.contains('\x1b') && !chunk.contains('\u{9B}') {
        return Cow::Borrowed(chunk);
    }
    ANSI_RE.replace_all(chunk, "")
}

/// Byte offset of an escape sequence left unterminated at the end of
/// `text`, if any. Readers hold such a tail back until the rest arrives.
pub(crate) fn pending_escape_start(text: &str) -> Option<usize> {
    if !text.contains('\x1b') && !text.contains('\u{9B}') {
        return None;
    }
    PARTIAL_RE.find(text).map(|m| m.start())
}
