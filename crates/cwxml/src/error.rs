//! Error types for element tree decoding.

use std::fmt;

use crate::ElementPath;

/// Errors that can occur while reading or writing an element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// The document is not well-formed XML.
    MalformedXml { detail: String },
    /// A numeric blob had the wrong component count or a non-numeric token.
    MalformedBlob {
        element: ElementPath,
        reason: String,
    },
    /// A polymorphic list contained a tag or `type` token outside its closed set.
    UnknownVariant { parent: ElementPath, got: String },
    /// A required attribute or child was missing or could not be parsed.
    SchemaViolation {
        element: ElementPath,
        detail: String,
    },
    /// The emitter failed to serialise the tree.
    Write { detail: String },
}

impl XmlError {
    /// Build a malformed blob error at `element`.
    pub fn blob(element: &ElementPath, reason: impl Into<String>) -> Self {
        Self::MalformedBlob {
            element: element.clone(),
            reason: reason.into(),
        }
    }

    /// Build a schema violation at `element`.
    pub fn schema(element: &ElementPath, detail: impl Into<String>) -> Self {
        Self::SchemaViolation {
            element: element.clone(),
            detail: detail.into(),
        }
    }

    /// Build an unknown variant error for a child of `parent`.
    pub fn unknown_variant(parent: &ElementPath, got: impl Into<String>) -> Self {
        Self::UnknownVariant {
            parent: parent.clone(),
            got: got.into(),
        }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedXml { detail } => write!(f, "malformed xml: {detail}"),
            Self::MalformedBlob { element, reason } => {
                write!(f, "malformed blob at {element}: {reason}")
            }
            Self::UnknownVariant { parent, got } => {
                write!(f, "unknown variant '{got}' in {parent}")
            }
            Self::SchemaViolation { element, detail } => {
                write!(f, "schema violation at {element}: {detail}")
            }
            Self::Write { detail } => write!(f, "failed to write xml: {detail}"),
        }
    }
}

impl std::error::Error for XmlError {}

/// Result type for element tree operations.
pub type XmlResult<T> = Result<T, XmlError>;
