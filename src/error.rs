use std::fmt;
use std::io;

/// An error that can occur while building, persisting or loading a word
/// graph.
///
/// This error type is marked as `non_exhaustive`-by-convention: callers
/// should match on [`Error::kind`] and be prepared for new kinds in future
/// releases. Query operations (`contains`, `lookup`, `find_prefixes` and the
/// search extensions) never produce an error on a well-formed graph; input
/// the current alphabet cannot represent is reported as a miss instead.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The kind of an error that occurred.
#[derive(Debug)]
pub enum ErrorKind {
    /// A container file (or byte buffer) was rejected: bad magic, unknown
    /// version, mutually exclusive flags both set, truncated regions,
    /// inconsistent counts or an out-of-range edge target.
    ///
    /// The message names the specific check that failed.
    BadContainer {
        /// A human readable description of the rejected structure.
        msg: String,
    },
    /// A rebuild into a fixed encoding was requested, but the key set cannot
    /// be represented in that encoding. For the compressed encoding this
    /// means more than 89 distinct units, or not enough remap slots free of
    /// collision with the data.
    EncodingExceeded {
        /// The number of distinct units in the key set at the time of the
        /// failed rebuild.
        distinct_units: usize,
        /// A human readable description of what did not fit.
        msg: String,
    },
    /// Minimization produced a graph whose accepted key set differs from its
    /// input. The automaton is left unchanged when this is returned. This is
    /// defensive: seeing it indicates a bug in this crate, not in the
    /// caller's data.
    MinimizeConsistency,
    /// A host file or memory-map operation failed.
    Io(io::Error),
}

impl Error {
    /// Return the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns true if this error came from a rejected container.
    pub fn is_bad_container(&self) -> bool {
        matches!(self.kind, ErrorKind::BadContainer { .. })
    }

    /// Returns true if this error reports an encoding that cannot hold the
    /// key set.
    pub fn is_encoding_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::EncodingExceeded { .. })
    }

    /// Returns true if this error reports a failed minimization consistency
    /// check.
    pub fn is_minimize_consistency(&self) -> bool {
        matches!(self.kind, ErrorKind::MinimizeConsistency)
    }

    pub(crate) fn bad_container(msg: impl Into<String>) -> Error {
        Error { kind: ErrorKind::BadContainer { msg: msg.into() } }
    }

    pub(crate) fn encoding_exceeded(
        distinct_units: usize,
        msg: impl Into<String>,
    ) -> Error {
        Error {
            kind: ErrorKind::EncodingExceeded {
                distinct_units,
                msg: msg.into(),
            },
        }
    }

    pub(crate) fn minimize_consistency() -> Error {
        Error { kind: ErrorKind::MinimizeConsistency }
    }

    pub(crate) fn io(err: io::Error) -> Error {
        Error { kind: ErrorKind::Io(err) }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind {
            ErrorKind::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::BadContainer { ref msg } => {
                write!(f, "malformed container: {}", msg)
            }
            ErrorKind::EncodingExceeded { distinct_units, ref msg } => {
                write!(
                    f,
                    "encoding capacity exceeded ({} distinct units): {}",
                    distinct_units, msg,
                )
            }
            ErrorKind::MinimizeConsistency => {
                write!(
                    f,
                    "minimization changed the accepted key set; \
                     the automaton was left unmodified",
                )
            }
            ErrorKind::Io(ref err) => {
                write!(f, "I/O error: {}", err)
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::io(err)
    }
}
