use std::path::PathBuf;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library.
///
/// Every variant is fatal for a generation run: the run stops and no output
/// is written. Recoverable problems are reported through
/// [`Diagnostics`](crate::session::Diagnostics) instead.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError { file: PathBuf, line: usize, message: String },
    Environment(String),
    EntryFile { file: PathBuf, message: String },
    PackageNotFound(String),
    Annotation { context: String, message: String },
    SerializationError(String),
}

impl Error {
    pub(crate) fn annotation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Annotation {
            context: context.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::ParseError {
                file,
                line,
                message,
            } => {
                write!(f, "syntax error in {}:{}: {}", file.display(), line, message)
            }
            Error::Environment(msg) => write!(f, "environment error: {}", msg),
            Error::EntryFile { file, message } => {
                write!(f, "cannot read router file {}: {}", file.display(), message)
            }
            Error::PackageNotFound(pkg) => write!(
                f,
                "package '{}' does not exist in the GOPATH or vendor path",
                pkg
            ),
            Error::Annotation { context, message } => write!(f, "[{}] {}", context, message),
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML: {}", err))
    }
}
