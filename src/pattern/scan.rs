//! Scanning the buffer against an ordered pattern list

use super::matcher::{LiteralMatcher, Matcher, RegexMatcher};
use super::Pattern;
use crate::buffer::MatchBuffer;
use crate::result::MatchResult;

/// A pattern paired with its compiled matcher (none for sentinels).
pub(crate) struct CompiledPattern {
    pattern: Pattern,
    matcher: Option<Box<dyn Matcher>>,
}

impl CompiledPattern {
    pub(crate) fn compile(pattern: Pattern) -> Self {
        let matcher: Option<Box<dyn Matcher>> = match &pattern {
            Pattern::Literal(s) => Some(Box::new(LiteralMatcher::new(s))),
            Pattern::Regex(r) => Some(Box::new(RegexMatcher::new(r.clone()))),
            Pattern::Eof | Pattern::Timeout | Pattern::FullBuffer => None,
        };
        Self { pattern, matcher }
    }

    pub(crate) fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

/// Find the first pattern, in registration order, that the buffer satisfies.
///
/// `FullBuffer` is checked before everything else and consumes the whole
/// buffer. Content patterns consume `[0, match end)`. `Eof` and `Timeout` never
/// match here. With no match the buffer is left untouched.
pub(crate) fn scan(buffer: &mut MatchBuffer, patterns: &[CompiledPattern]) -> Option<MatchResult> {
    if buffer.is_full() && patterns.iter().any(|p| p.pattern == Pattern::FullBuffer) {
        return Some(MatchResult::full_buffer(buffer.take_all()));
    }

    patterns.iter().find_map(|compiled| {
        let hit = compiled.matcher.as_ref()?.find(buffer.snapshot())?;
        let flushed = buffer.consume_up_to(hit.end);
        Some(MatchResult::hit(
            compiled.pattern.clone(),
            flushed,
            hit.start,
            hit.captures,
        ))
    })
}
