use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation attempted after the index was dropped. Terminal.
    IndexDropped,
    /// Mutation attempted while the index is read-only.
    ReadOnly,
    /// Query string violates the grammar at a non-tolerated site.
    UnexpectedToken,
    /// Rejected configuration value.
    InvalidConfiguration,
    Io,
    Corrupted,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
        }
    }

    pub fn index_dropped() -> Self {
        Error::new(ErrorKind::IndexDropped, "the index has been dropped")
    }

    pub fn read_only() -> Self {
        Error::new(ErrorKind::ReadOnly, "the index is read-only")
    }

    pub fn unexpected_token(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::UnexpectedToken, context)
    }

    pub fn invalid_configuration(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidConfiguration, context)
    }

    pub fn corrupted(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Corrupted, context)
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

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Corrupted,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
