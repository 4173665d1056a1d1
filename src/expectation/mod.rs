//! Expectation lists: pattern/handler pairs and their validated form

use crate::pattern::{CompiledPattern, Pattern};
use crate::result::{ExpectError, MatchResult};
use crate::session::{Done, Session};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a handler tells the session after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The handler is done with this round; completion is up to the [`Done`] handle.
    Complete,
    /// Re-arm the same expectation list with the same completion callback
    /// (TCL's `exp_continue`).
    Continue,
}

type HandlerFn = dyn Fn(&Session, &MatchResult, Done) -> Flow + Send + Sync;

/// Callback invoked when its pattern resolves an expectation.
///
/// The handler gets the session (to `send` or start a nested `expect`), the
/// match, and the [`Done`] handle that finishes the whole `expect` call.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wrap a closure as a handler
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Session, &MatchResult, Done) -> Flow + Send + Sync + 'static,
    {
        Handler(Arc::new(f))
    }

    pub(crate) fn call(&self, session: &Session, result: &MatchResult, done: Done) -> Flow {
        (self.0)(session, result, done)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// One entry of the flat `[pattern, handler, pattern, handler, ...]` list.
#[derive(Debug, Clone)]
pub enum Arm {
    /// A pattern slot
    Pattern(Pattern),
    /// A handler slot
    Handler(Handler),
}

impl Arm {
    /// Build a handler entry from a closure
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&Session, &MatchResult, Done) -> Flow + Send + Sync + 'static,
    {
        Arm::Handler(Handler::new(f))
    }
}

impl From<Pattern> for Arm {
    fn from(pattern: Pattern) -> Self {
        Arm::Pattern(pattern)
    }
}

impl From<&str> for Arm {
    fn from(s: &str) -> Self {
        Arm::Pattern(Pattern::from(s))
    }
}

impl From<Handler> for Arm {
    fn from(handler: Handler) -> Self {
        Arm::Handler(handler)
    }
}

/// An expectation list as handed to [`Session::expect`].
///
/// Usually built pair by pair with [`Expectations::on`]. A raw `Vec<Arm>` is
/// also accepted; it is validated when `expect` is called.
///
/// # Examples
///
/// ```
/// use spectcl::{Expectations, Flow, Pattern};
///
/// let list = Expectations::new()
///     .on(Pattern::regex("assword").unwrap(), |session, _, _| {
///         let _ = session.send_line("secret");
///         Flow::Continue
///     })
///     .on("$ ", |_, _, done| {
///         done.complete();
///         Flow::Complete
///     })
///     .on(Pattern::Eof, |_, _, done| {
///         done.fail(spectcl::ExpectError::Eof);
///         Flow::Complete
///     });
/// assert_eq!(list.len(), 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Expectations {
    arms: Vec<Arm>,
}

impl Expectations {
    /// An empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pattern and its handler
    pub fn on<P, F>(mut self, pattern: P, handler: F) -> Self
    where
        P: Into<Pattern>,
        F: Fn(&Session, &MatchResult, Done) -> Flow + Send + Sync + 'static,
    {
        self.arms.push(Arm::Pattern(pattern.into()));
        self.arms.push(Arm::handler(handler));
        self
    }

    /// Append a single raw entry
    pub fn push(&mut self, arm: impl Into<Arm>) {
        self.arms.push(arm.into());
    }

    /// Number of entries (twice the number of pairs for a well-formed list)
    pub fn len(&self) -> usize {
        self.arms.len()
    }

    /// Whether the list has no entries
    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}

impl From<Vec<Arm>> for Expectations {
    fn from(arms: Vec<Arm>) -> Self {
        Self { arms }
    }
}

/// Validated expectation list: unique patterns in first-seen order, each with
/// the first handler registered for it.
pub(crate) struct ExpectationSet {
    patterns: Vec<CompiledPattern>,
    handlers: Vec<Handler>,
    index: HashMap<Pattern, usize>,
}

impl ExpectationSet {
    pub(crate) fn build(list: Expectations) -> Result<Self, ExpectError> {
        if list.arms.is_empty() {
            return Err(ExpectError::InvalidExpectationList {
                reason: "cannot call expect with an empty list",
            });
        }
        if list.arms.len() % 2 != 0 {
            return Err(ExpectError::InvalidExpectationList {
                reason: "list must hold pattern/handler pairs",
            });
        }

        let mut set = Self {
            patterns: Vec::with_capacity(list.arms.len() / 2),
            handlers: Vec::with_capacity(list.arms.len() / 2),
            index: HashMap::new(),
        };

        let mut arms = list.arms.into_iter().enumerate();
        while let (Some((at, pattern)), Some((handler_at, handler))) = (arms.next(), arms.next()) {
            let pattern = match pattern {
                Arm::Pattern(pattern) => pattern,
                Arm::Handler(_) => {
                    return Err(ExpectError::InvalidPattern {
                        index: at,
                        source: crate::PatternError::NotAPattern,
                    })
                }
            };
            let Arm::Handler(handler) = handler else {
                return Err(ExpectError::InvalidHandler { index: handler_at });
            };
            let compiled = CompiledPattern::compile(pattern);

            if set.index.contains_key(compiled.pattern()) {
                continue;
            }
            set.index.insert(compiled.pattern().clone(), set.patterns.len());
            set.patterns.push(compiled);
            set.handlers.push(handler);
        }

        Ok(set)
    }

    /// Unique patterns in registration order
    pub(crate) fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    pub(crate) fn handler_for(&self, pattern: &Pattern) -> Option<&Handler> {
        self.index.get(pattern).map(|&i| &self.handlers[i])
    }

    pub(crate) fn describe(&self) -> String {
        self.patterns
            .iter()
            .map(|p| p.pattern().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
