//! Test case records and the pull-iterator protocol that feeds them to the
//! worker pool.

use serde_json::{Map, Value};

/// One immutable test record: created by the caller, consumed once by a
/// worker, never mutated.
#[derive(Debug, Clone)]
pub struct Case<I, R> {
    pub input: I,
    pub expected: Option<R>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Map<String, Value>>,
}

impl<I, R> Case<I, R> {
    #[must_use]
    pub fn new(input: I) -> Self {
        Self {
            input,
            expected: None,
            tags: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_expected(mut self, expected: R) -> Self {
        self.expected = Some(expected);
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A pull iterator over [`Case`] values. `next` returning `None` is the
/// end-of-stream sentinel; `Some(Err(_))` is a recoverable per-pull failure
/// that must be recorded against its own `eval` span without aborting
/// sibling workers.
pub trait Cases<I, R>: Send {
    fn next(&mut self) -> Option<Result<Case<I, R>, String>>;
}

/// Adapts a `Vec<Case<I, R>>` into [`Cases`] — the common case of a
/// caller-supplied literal list with no iterator failures possible.
pub struct VecCases<I, R> {
    inner: std::vec::IntoIter<Case<I, R>>,
}

impl<I, R> VecCases<I, R> {
    #[must_use]
    pub fn new(cases: Vec<Case<I, R>>) -> Self {
        Self {
            inner: cases.into_iter(),
        }
    }
}

impl<I: Send, R: Send> Cases<I, R> for VecCases<I, R> {
    fn next(&mut self) -> Option<Result<Case<I, R>, String>> {
        self.inner.next().map(Ok)
    }
}
