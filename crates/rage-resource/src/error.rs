//! Error types for the resource crate.

use std::fmt;

use cwxml::{ElementPath, XmlError};

/// Result type for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, refreshing or writing resources.
#[derive(Debug)]
pub enum Error {
    /// The element tree could not be decoded or encoded.
    Xml(XmlError),
    /// Reading or writing a file failed.
    Io {
        /// The file involved.
        path: String,
        /// The error message.
        message: String,
    },
    /// The file name does not carry a known resource suffix.
    UnsupportedFile {
        /// The offending path.
        path: String,
    },
    /// A hard size limit was exceeded.
    CapacityExceeded {
        /// What overflowed.
        what: &'static str,
        /// The size that was requested.
        count: usize,
        /// The largest size allowed.
        limit: usize,
    },
    /// A shader filename or hash is not in the catalogue.
    UnresolvedShader {
        /// The filename or `hash_<hex>` key.
        filename: String,
    },
    /// The input cannot be turned into a valid resource.
    Configuration {
        /// Description of the problem.
        detail: String,
    },
    /// An IR invariant does not hold.
    Validation {
        /// Where the broken invariant lives.
        element: ElementPath,
        /// Description of what is wrong.
        detail: String,
    },
}

impl Error {
    pub(crate) fn validation(element: &ElementPath, detail: impl Into<String>) -> Self {
        Error::Validation {
            element: element.clone(),
            detail: detail.into(),
        }
    }

    /// Build a configuration error.
    pub fn configuration(detail: impl Into<String>) -> Self {
        Error::Configuration {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Xml(e) => write!(f, "xml error: {e}"),
            Error::Io { path, message } => write!(f, "i/o error on {path}: {message}"),
            Error::UnsupportedFile { path } => write!(f, "unsupported resource file: {path}"),
            Error::CapacityExceeded { what, count, limit } => {
                write!(f, "{what} count {count} exceeds the limit of {limit}")
            }
            Error::UnresolvedShader { filename } => {
                write!(f, "shader '{filename}' is not in the catalogue")
            }
            Error::Configuration { detail } => write!(f, "configuration error: {detail}"),
            Error::Validation { element, detail } => {
                write!(f, "invalid resource at {element}: {detail}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Xml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<XmlError> for Error {
    fn from(e: XmlError) -> Self {
        Error::Xml(e)
    }
}
