//! Output preprocessing: UTF-8 decoding, ANSI stripping and case folding

use crate::session::SessionConfig;
use bytes::{Buf, BytesMut};

/// Longest unterminated escape sequence held back between reads
const MAX_HELD_ESCAPE: usize = 1024;

/// Turns raw reads into the text chunks a session matches against.
///
/// A multi-byte character split across two reads is held back until the rest
/// arrives; bytes that can never form valid UTF-8 become U+FFFD. With colour
/// stripping on, an escape sequence cut off at the end of a read is held back
/// the same way.
pub(crate) struct OutputFilter {
    pending: BytesMut,
    strip_colors: bool,
    ignore_case: bool,
}

impl OutputFilter {
    pub(crate) fn new(config: &SessionConfig) -> Self {
        Self {
            pending: BytesMut::new(),
            strip_colors: config.strip_colors,
            ignore_case: config.ignore_case,
        }
    }

    /// Decode and filter one read. May return an empty string.
    pub(crate) fn feed(&mut self, data: &[u8]) -> String {
        self.pending.extend_from_slice(data);
        let mut text = self.decode();
        if self.strip_colors {
            if let Some(at) = unterminated_escape(&text) {
                let mut held = BytesMut::from(text[at..].as_bytes());
                held.extend_from_slice(&self.pending);
                self.pending = held;
                text.truncate(at);
            }
        }
        self.apply(text)
    }

    /// Flush whatever is still held back at end of stream.
    pub(crate) fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        self.apply(text)
    }

    fn decode(&mut self) -> String {
        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.pending.clear();
                    return text;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(prefix) = std::str::from_utf8(&self.pending[..valid]) {
                        text.push_str(prefix);
                    }
                    match err.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.advance(valid + bad);
                        }
                        // incomplete sequence at the end, wait for more
                        None => {
                            self.pending.advance(valid);
                            return text;
                        }
                    }
                }
            }
        }
    }

    fn apply(&self, text: String) -> String {
        let text = if self.strip_colors {
            strip_ansi(&text)
        } else {
            text
        };
        if self.ignore_case {
            text.to_lowercase()
        } else {
            text
        }
    }
}

/// Byte offset of an escape sequence that `text` ends in the middle of.
fn unterminated_escape(text: &str) -> Option<usize> {
    let at = text.rfind('\x1b')?;
    if text.len() - at > MAX_HELD_ESCAPE {
        return None;
    }
    let mut rest = text[at + 1..].chars();
    let complete = match rest.next() {
        None => false,
        Some('[') => rest.any(|c| ('@'..='~').contains(&c)),
        // the last ESC starts the OSC, so only BEL can have ended it
        Some(']') => rest.any(|c| c == '\x07'),
        Some('(' | ')') => rest.next().is_some(),
        Some(_) => true,
    };
    (!complete).then_some(at)
}

/// Strip ANSI escape sequences (CSI, OSC, charset selection) from text.
///
/// # Examples
///
/// ```
/// use spectcl::process::strip_ansi;
///
/// assert_eq!(strip_ansi("\x1b[33mHello\nWorld\x1b[0m"), "Hello\nWorld");
/// ```
pub fn strip_ansi(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            // CSI: parameters and intermediates, then one final byte
            Some('[') => {
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            // OSC: terminated by BEL or ST (ESC \)
            Some(']') => {
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            Some('(' | ')') => {
                chars.next();
            }
            Some(_) | None => {}
        }
    }

    result
}
