use std::path::PathBuf;

/// Failures of the simulation pipeline and the reform fetch helper.
///
/// Every variant is fatal: callers add context and exit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unreadable filing-unit input.
    #[error("invalid input data: {0}")]
    InputData(String),
    /// Reform file missing, malformed, or naming unknown parameters.
    #[error("invalid reform: {0}")]
    ReformParse(String),
    /// Failure inside the tax calculator or the response model.
    #[error("computation failed: {0}")]
    Computation(String),
    /// Remote host unreachable or the transfer failed.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    /// The remote host answered 404.
    #[error("reform not found: {url}")]
    NotFound { url: String },
    /// Any other non-success HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::InputData(err.to_string())
    }
}
