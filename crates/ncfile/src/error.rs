//! Error types for NetCDF file access.

use thiserror::Error;

/// Result type for ncfile operations.
pub type NcResult<T> = Result<T, NcError>;

/// Error types for schema definition, variable access and value coding.
#[derive(Error, Debug)]
pub enum NcError {
    /// Index expression cannot be classified against the declared shape
    #[error("invalid index for variable '{variable}': {message}")]
    InvalidIndex { variable: String, message: String },

    /// Expression is a method call, not an index
    #[error("'{method}' is not an index expression for variable '{variable}'; materialize the variable first")]
    NotAnIndex { variable: String, method: String },

    /// Schema references a dimension that is not defined
    #[error("invalid dimension '{dimension}' for variable '{variable}'")]
    UnknownDimension { variable: String, dimension: String },

    /// Variable is not part of the file catalog
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// Declared variable or attribute type is not one of the six physical types
    #[error("invalid type '{type_name}' for variable '{variable}'")]
    InvalidType { variable: String, type_name: String },

    /// Tagged attribute mapping is malformed
    #[error("invalid specification in attribute '{attribute}': {message}")]
    InvalidAttributeSpec { attribute: String, message: String },

    /// Schema document is structurally invalid
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Inline variable declaration could not be parsed
    #[error("invalid variable declaration: '{0}'")]
    InvalidDeclaration(String),

    /// Time decoding attempted without a `units` attribute
    #[error("variable '{0}' has no attribute 'units'")]
    MissingUnits(String),

    /// `units` attribute is not `<unit> since <epoch>`
    #[error("format of {variable}:units is not valid for time: {message}")]
    InvalidUnitsFormat { variable: String, message: String },

    /// Value cannot be stored or packed
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A storage backend primitive failed
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External command execution error
    #[error("command execution failed: {0}")]
    Command(String),
}

impl NcError {
    /// Create a BackendFailure error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Create an InvalidIndex error.
    pub fn invalid_index(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            variable: variable.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidAttributeSpec error.
    pub fn invalid_attribute(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttributeSpec {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Append a `{name: value}` context suffix to a backend failure.
    ///
    /// Other error kinds are returned unchanged.
    pub fn with_context(self, name: &str, value: impl std::fmt::Display) -> Self {
        match self {
            Self::BackendFailure(msg) => Self::BackendFailure(format!("{} {{{}: {}}}", msg, name, value)),
            other => other,
        }
    }
}

impl From<serde_yaml::Error> for NcError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::InvalidSchema(format!("YAML error: {}", err))
    }
}

impl From<serde_json::Error> for NcError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidSchema(format!("JSON error: {}", err))
    }
}
