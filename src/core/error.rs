//! Error types shared by the toolkit components.

use std::fmt;

use thiserror::Error;

/// Separator used when an [`ErrorList`] is rendered as a single message.
pub const ERROR_LIST_SEPARATOR: &str = " | ";

/// Errors produced by the semaphore, worker pool, scheduler and closer.
#[derive(Debug, Error)]
pub enum Error {
    /// The component was already closed (or is closing).
    #[error("{0} is closed")]
    Closed(&'static str),
    /// An argument was out of range, e.g. a permit count below one.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A scheduler task with this id is already registered.
    #[error("task {0:?} already exists")]
    AlreadyExists(String),
    /// No scheduler task with this id is registered.
    #[error("task {0:?} does not exist")]
    NotFound(String),
    /// The worker pool could not admit a job after growing.
    #[error("the pool is full (workers: {workers}, queued: {queued})")]
    PoolFull {
        /// Live workers at the time of rejection.
        workers: usize,
        /// Jobs waiting in the queue at the time of rejection.
        queued: usize,
    },
    /// One or more cleanup actions failed.
    #[error("{0}")]
    Aggregate(ErrorList),
    /// The surrounding scope was cancelled before the operation finished.
    #[error("operation cancelled")]
    Cancelled,
    /// No Tokio runtime was available to spawn onto.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
    /// Signal registration or another OS-level failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for toolkit operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Application-facing result using anyhow for caller-supplied tasks and cleanups.
pub type AppResult<T> = std::result::Result<T, anyhow::Error>;

/// An ordered list of error messages.
///
/// Only the rendered text of each failure is kept, so the original error
/// types are lost once pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList {
    messages: Vec<String>,
}

impl ErrorList {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { messages: Vec::new() }
    }

    /// Append the rendered message of `err`.
    pub fn push(&mut self, err: impl fmt::Display) {
        self.messages.push(err.to_string());
    }

    /// Append every error that is present.
    pub fn extend<I, E>(&mut self, errs: I)
    where
        I: IntoIterator<Item = Option<E>>,
        E: fmt::Display,
    {
        for err in errs.into_iter().flatten() {
            self.push(err);
        }
    }

    /// Number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no error was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Collected messages in insertion order.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// `Ok(())` when empty, otherwise the list as an [`Error::Aggregate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aggregate`] when at least one error was pushed.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(self))
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join(ERROR_LIST_SEPARATOR))
    }
}

impl std::error::Error for ErrorList {}

/// Join the messages of every present error with `sep`.
///
/// Returns `None` when all inputs are `None`.
pub fn merge_errors<I, E>(sep: &str, errs: I) -> Option<String>
where
    I: IntoIterator<Item = Option<E>>,
    E: fmt::Display,
{
    let mut buf = String::new();
    for err in errs.into_iter().flatten() {
        if !buf.is_empty() {
            buf.push_str(sep);
        }
        buf.push_str(&err.to_string());
    }
    (!buf.is_empty()).then_some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Closed("semaphore").to_string(), "semaphore is closed");
        assert_eq!(
            Error::PoolFull { workers: 4, queued: 2 }.to_string(),
            "the pool is full (workers: 4, queued: 2)"
        );
        assert_eq!(
            Error::NotFound("nightly".into()).to_string(),
            "task \"nightly\" does not exist"
        );
    }

    #[test]
    fn test_error_list_joins_messages() {
        let mut list = ErrorList::new();
        assert!(list.clone().into_result().is_ok());

        list.push("db: timeout");
        list.push(anyhow::anyhow!("cache: refused"));
        assert_eq!(list.len(), 2);
        assert_eq!(list.to_string(), "db: timeout | cache: refused");

        let err = list.into_result().unwrap_err();
        assert!(matches!(err, Error::Aggregate(ref l) if l.len() == 2));
    }

    #[test]
    fn test_merge_errors_skips_missing() {
        let none: Vec<Option<String>> = vec![None, None];
        assert_eq!(merge_errors(", ", none), None);

        let some = vec![None, Some("a"), None, Some("b")];
        assert_eq!(merge_errors(", ", some).as_deref(), Some("a, b"));
    }
}
