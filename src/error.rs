use std::{error, fmt, io};

/// The crate's result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A resource an operation needed but the session does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Network,
    Dataset,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Network => f.write_str("network"),
            Resource::Dataset => f.write_str("dataset"),
        }
    }
}

/// All errors surfaced by the library.
#[derive(Debug)]
pub enum Error {
    /// Layer sizes cannot form a network.
    InvalidArchitecture(String),
    /// A model archive or its sidecar is corrupt or incompatible.
    InvalidModelFormat(String),
    /// No model archive at the given location.
    ModelNotFound(String),
    /// The dataset could not be fetched or decoded.
    DatasetUnavailable {
        msg: String,
        source: Option<io::Error>,
    },
    /// The operation needs a network or dataset that is not loaded.
    Unavailable(Resource),
    /// A training run is in progress.
    Conflict(String),
    /// Training hyperparameters out of range.
    InvalidConfig(String),
    /// Input data does not fit the network.
    InvalidInput(String),
    /// The training worker stopped before completing its run.
    TrainingFailed(String),
    Io(io::Error),
}

impl Error {
    pub(crate) fn dataset(msg: impl Into<String>, source: io::Error) -> Self {
        Error::DatasetUnavailable { msg: msg.into(), source: Some(source) }
    }

    /// HTTP status that best describes the error at the API boundary.
    pub fn status(&self) -> u16 {
        match self {
            Error::InvalidArchitecture(_)
            | Error::InvalidConfig(_)
            | Error::InvalidInput(_) => 400,
            Error::InvalidModelFormat(_) => 400,
            Error::ModelNotFound(_) => 404,
            Error::Unavailable(Resource::Network) => 404,
            Error::Unavailable(Resource::Dataset) => 503,
            Error::DatasetUnavailable { .. } => 503,
            Error::Conflict(_) => 409,
            Error::TrainingFailed(_) | Error::Io(_) => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArchitecture(msg) => write!(f, "invalid architecture: {msg}"),
            Error::InvalidModelFormat(msg) => write!(f, "invalid model format: {msg}"),
            Error::ModelNotFound(path) => write!(f, "model not found: {path}"),
            Error::DatasetUnavailable { msg, source } => match source {
                Some(e) => write!(f, "dataset unavailable: {msg}: {e}"),
                None => write!(f, "dataset unavailable: {msg}"),
            },
            Error::Unavailable(Resource::Network) => f.write_str("no network created"),
            Error::Unavailable(Resource::Dataset) => f.write_str("MNIST data not loaded"),
            Error::Conflict(msg) => f.write_str(msg),
            Error::InvalidConfig(msg) => write!(f, "invalid training config: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::TrainingFailed(msg) => write!(f, "training failed: {msg}"),
            Error::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::DatasetUnavailable { source: Some(e), .. } => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Boundary conversion for binaries.
impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
