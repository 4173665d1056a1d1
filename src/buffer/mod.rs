//! Buffer management for process output

/// Accumulated, not-yet-matched output of a session.
///
/// The buffer keeps at most `max_chars` characters. Appending past that bound
/// drops the oldest characters and raises the full flag; the flag is cleared by
/// the next consuming match.
#[derive(Debug)]
pub struct MatchBuffer {
    text: String,
    chars: usize,
    max_chars: usize,
    full: bool,
}

impl MatchBuffer {
    /// Create an empty buffer bounded to `max_chars` characters
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            max_chars,
            full: false,
        }
    }

    /// Append a chunk, trimming the front if the bound is exceeded.
    ///
    /// Returns `true` if characters were dropped.
    pub fn append(&mut self, chunk: &str) -> bool {
        self.text.push_str(chunk);
        self.chars += chunk.chars().count();

        if self.chars <= self.max_chars {
            return false;
        }

        let excess = self.chars - self.max_chars;
        let cut = self
            .text
            .char_indices()
            .nth(excess)
            .map_or(self.text.len(), |(idx, _)| idx);
        self.text.drain(..cut);
        self.chars = self.max_chars;
        self.full = true;
        true
    }

    /// Remove and return `[0, end)`, leaving `[end, len)` as the new buffer.
    ///
    /// `end` is a byte offset on a char boundary, as produced by the matchers.
    pub fn consume_up_to(&mut self, end: usize) -> String {
        let end = end.min(self.text.len());
        debug_assert!(self.text.is_char_boundary(end));

        let rest = self.text.split_off(end);
        let flushed = std::mem::replace(&mut self.text, rest);
        self.chars -= flushed.chars().count();
        self.full = false;
        flushed
    }

    /// Remove and return everything.
    pub fn take_all(&mut self) -> String {
        self.chars = 0;
        self.full = false;
        std::mem::take(&mut self.text)
    }

    /// Read-only view of the current contents
    pub fn snapshot(&self) -> &str {
        &self.text
    }

    /// Whether an append has overflowed since the last consuming match
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Current length in characters
    pub fn char_len(&self) -> usize {
        self.chars
    }

    /// The configured bound in characters
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }
}
