use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::validation::{ValidationEvent, ValidationEventCollector};

/// Boxed error used as the cause of a structural conversion failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which side of the binding an operation was working on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reading XML into a bound document
    Input,
    /// Writing a bound document as XML
    Output,
}

impl Direction {
    fn conversion(&self) -> &'static str {
        match self {
            Direction::Input => "unmarshalling",
            Direction::Output => "marshalling",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Main error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("An error occurred when creating the binding: {details}")]
    Setup { details: String },

    #[error("An error occurred when processing the validating schemas: {details}")]
    SchemaComposition { details: String },

    #[error("Input cannot be read: {location}")]
    InputAccess {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Output cannot be written: {location}")]
    OutputAccess {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("An error occurred during {}: {details}", .direction.conversion())]
    StructuralConversion {
        direction: Direction,
        details: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Validation errors were detected in the {direction}: {details}")]
    Validation {
        direction: Direction,
        details: String,
        events: Vec<ValidationEvent>,
    },

    #[error("Configuration error: {details}")]
    Configuration { details: String },

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },
}

impl XmlError {
    pub(crate) fn structural<E>(direction: Direction, details: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        XmlError::StructuralConversion {
            direction,
            details: details.into(),
            source: Some(Box::new(cause)),
        }
    }

    pub(crate) fn structural_message(direction: Direction, details: impl Into<String>) -> Self {
        XmlError::StructuralConversion {
            direction,
            details: details.into(),
            source: None,
        }
    }

    /// Build a validation failure carrying every collected event
    pub(crate) fn validation(direction: Direction, collector: ValidationEventCollector) -> Self {
        XmlError::Validation {
            direction,
            details: collector.joined_messages(),
            events: collector.into_events(),
        }
    }

    pub(crate) fn configuration(details: impl Into<String>) -> Self {
        XmlError::Configuration {
            details: details.into(),
        }
    }

    pub(crate) fn input_access(location: impl Into<String>, source: std::io::Error) -> Self {
        XmlError::InputAccess {
            location: location.into(),
            source,
        }
    }

    pub(crate) fn output_access(location: impl Into<String>, source: std::io::Error) -> Self {
        XmlError::OutputAccess {
            location: location.into(),
            source,
        }
    }

    /// True for failures to open or read/write the input or output itself,
    /// as opposed to problems with its content
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            XmlError::InputAccess { .. } | XmlError::OutputAccess { .. }
        )
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: null pointer returned")]
    SchemaParseFailed,

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Document validation failed with internal code {code}")]
    ValidationFailed { code: i32 },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Path cannot be passed to libxml2: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Document too large for libxml2: {size} bytes")]
    InputTooLarge { size: usize },
}

impl From<LibXml2Error> for XmlError {
    fn from(err: LibXml2Error) -> Self {
        XmlError::LibXml2Internal {
            details: err.to_string(),
        }
    }
}

impl From<ConfigError> for XmlError {
    fn from(err: ConfigError) -> Self {
        XmlError::Configuration {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, XmlError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
