use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidInput,
    InvalidState,
    /// Rule base missing or uncompilable, or a strict-mode model failure.
    Configuration,
    /// No extraction mapping for a record type, or a mapped field is absent.
    IndexMapping,
    /// `update`/`remove` on a key the index does not hold.
    UnknownKey,
    /// A lock wait ran past the configured timeout.
    Deadlock,
    /// Serializable commit-time validation lost against a concurrent commit.
    SerializationFailure,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn configuration(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Configuration, context.into())
    }

    pub fn index_mapping(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::IndexMapping, context.into())
    }

    pub fn unknown_key(key: impl fmt::Debug) -> Self {
        Error::new(ErrorKind::UnknownKey, format!("Key {:?} is not in the index", key))
    }

    pub fn invalid_state(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidState, context.into())
    }

    pub fn invalid_input(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidInput, context.into())
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("JSON error: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidInput,
            context: format!("Invalid pattern: {}", err),
        }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("Invalid date/time: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
