//! Pattern matcher implementations

use regex::Regex;

/// Result of a pattern match
#[derive(Debug, Clone)]
pub struct Match {
    /// Start position of the match
    pub start: usize,
    /// End position of the match
    pub end: usize,
    /// Captured groups (for regex)
    pub captures: Vec<String>,
}

/// Trait for pattern matching
pub trait Matcher: Send + Sync {
    /// Find the first match in the text
    fn find(&self, text: &str) -> Option<Match>;
}

/// Literal matcher using Boyer-Moore-Horspool.
///
/// Reports the leftmost occurrence. A match of valid UTF-8 inside valid UTF-8
/// always starts and ends on char boundaries. The empty pattern matches at 0.
pub struct LiteralMatcher {
    pattern: Vec<u8>,
    bad_char_table: [usize; 256],
}

impl LiteralMatcher {
    /// Create a new literal matcher
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.as_bytes().to_vec();

        let mut bad_char_table = [pattern.len(); 256];
        let last = pattern.len().saturating_sub(1);
        for (i, &byte) in pattern.iter().enumerate().take(last) {
            bad_char_table[byte as usize] = last - i;
        }

        Self {
            pattern,
            bad_char_table,
        }
    }
}

impl Matcher for LiteralMatcher {
    fn find(&self, text: &str) -> Option<Match> {
        let haystack = text.as_bytes();
        let len = self.pattern.len();
        if len == 0 {
            return Some(Match {
                start: 0,
                end: 0,
                captures: vec![],
            });
        }

        let mut pos = 0;
        while pos + len <= haystack.len() {
            if haystack[pos..pos + len] == self.pattern[..] {
                return Some(Match {
                    start: pos,
                    end: pos + len,
                    captures: vec![],
                });
            }

            let shift_char = haystack[pos + len - 1];
            pos += self.bad_char_table[shift_char as usize];
        }

        None
    }
}

/// Regex matcher
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Wrap an already compiled regex
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, text: &str) -> Option<Match> {
        let captures = self.regex.captures(text)?;
        let full_match = captures.get(0)?;

        let capture_strings = captures
            .iter()
            .map(|cap| cap.map_or_else(String::new, |m| m.as_str().to_owned()))
            .collect();

        Some(Match {
            start: full_match.start(),
            end: full_match.end(),
            captures: capture_strings,
        })
    }
}
