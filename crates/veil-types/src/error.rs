//! Type model errors

use thiserror::Error;

/// Errors raised while registering, resolving or instantiating types
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    /// Name lookup failed
    #[error("Undefined type: {name}")]
    UndefinedType {
        /// Name that was not found
        name: String,
    },

    /// A type with this qualified name already exists
    #[error("Duplicate type: {name}")]
    DuplicateType {
        /// Qualified name
        name: String,
    },

    /// Wrong number of generic arguments
    #[error("Invalid type argument count for {name}: expected {expected}, got {actual}")]
    InvalidTypeArgCount {
        /// Generic definition name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// A signature refers to something that does not exist in its scope
    #[error("Invalid type reference in {context}: {reason}")]
    InvalidTypeReference {
        /// Where the reference appeared
        context: String,
        /// What is wrong with it
        reason: String,
    },

    /// An interface was required
    #[error("{name} is not an interface")]
    NotAnInterface {
        /// Offending type
        name: String,
    },

    /// A class was required
    #[error("{name} is not a class")]
    NotAClass {
        /// Offending type
        name: String,
    },

    /// A type was completed twice
    #[error("Type {name} is already complete")]
    AlreadyComplete {
        /// Qualified name
        name: String,
    },

    /// Malformed qualified type name
    #[error("Invalid type name '{input}': {reason}")]
    InvalidName {
        /// Text being parsed
        input: String,
        /// Parse failure
        reason: String,
    },

    /// Catalog document could not be read
    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl From<serde_json::Error> for TypeError {
    fn from(err: serde_json::Error) -> Self {
        TypeError::Catalog(err.to_string())
    }
}

/// Result alias for type model operations
pub type TypeResult<T> = Result<T, TypeError>;
