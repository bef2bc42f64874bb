use std::io;

use thiserror::Error;

/// Describes the potential error conditions that might arise from remote
/// operations.
///
/// Cooperative suspension is *not* an error; operations that may suspend
/// return [`Progress::Again`] instead.
///
/// [`Progress::Again`]: enum.Progress.html
#[derive(Debug, Error)]
pub enum Error {
    /// A malformed argument or violated precondition: a missing URL for the
    /// requested direction, a detached remote asked to persist state, or
    /// `perform` called on an idle remote.
    #[error("{0}")]
    Invalid(String),

    /// A remote name or refspec that does not satisfy the grammar.
    #[error("{0}")]
    InvalidSpec(String),

    /// A configuration key, remote, or reference that does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Something that already exists where it must not.
    #[error("{0}")]
    Exists(String),

    /// An operation was started while another one is still in progress.
    #[error("remote is busy")]
    Busy,

    /// A transport failure, including cancellation, timeouts, and overflow
    /// of the pending-continuation stack.
    #[error("{0}")]
    Net(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Error {
        Error::Invalid(message.into())
    }

    pub(crate) fn invalid_spec(message: impl Into<String>) -> Error {
        Error::InvalidSpec(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Error {
        Error::NotFound(message.into())
    }

    pub(crate) fn exists(message: impl Into<String>) -> Error {
        Error::Exists(message.into())
    }

    pub(crate) fn net(message: impl Into<String>) -> Error {
        Error::Net(message.into())
    }

    /// Returns true if this error reports something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true if this error reports something that already exists.
    pub fn is_exists(&self) -> bool {
        matches!(self, Error::Exists(_))
    }
}

/// A specialized [`Result`] type for remote operations.
///
/// [`Result`]: https://doc.rust-lang.org/std/result/enum.Result.html
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = Error::invalid("cannot set empty URL");
        assert_eq!(err.to_string(), "cannot set empty URL");

        let err = Error::Busy;
        assert_eq!(err.to_string(), "remote is busy");

        let err = Error::not_found("remote 'origin' does not exist");
        assert!(err.is_not_found());
        assert!(!err.is_exists());

        let err = Error::exists("remote 'origin' already exists");
        assert!(err.is_exists());
        assert!(!err.is_not_found());
    }

    #[test]
    fn from_io() {
        let io_err = io::Error::new(io::ErrorKind::Other, "boom");
        let err = Error::from(io_err);
        assert_eq!(err.to_string(), "boom");
    }
}
