//! Engine error types

use veil_types::TypeError;

/// Result type for engine and proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised while building proxies or servicing calls
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The base type cannot be proxied
    #[error("Type {name} cannot be proxied: {reason}")]
    Ineligible {
        /// Qualified name of the rejected type
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Malformed contract (e.g. a class in the interface list)
    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    /// No interceptor attached, or proceed reached a method without a body
    #[error("Not implemented: {method}")]
    NotImplemented {
        /// Method description
        method: String,
    },

    /// The interceptor's result does not fit the declared return type
    #[error("Result type mismatch in {method}: expected {expected}, got {actual}")]
    ResultMismatch {
        /// Method description
        method: String,
        /// Declared return type
        expected: String,
        /// Type of the returned value
        actual: String,
    },

    /// An argument does not fit its parameter type
    #[error("Argument {index} of {method}: expected {expected}, got {actual}")]
    ArgumentMismatch {
        /// Method description
        method: String,
        /// Parameter position
        index: usize,
        /// Parameter type
        expected: String,
        /// Type of the supplied value
        actual: String,
    },

    /// Wrong number of arguments
    #[error("{method} takes {expected} argument(s), got {actual}")]
    ArgumentCount {
        /// Method description
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Wrong number of generic type arguments
    #[error("{method} takes {expected} type argument(s), got {actual}")]
    TypeArgumentCount {
        /// Method description
        method: String,
        /// Declared generic arity
        expected: usize,
        /// Supplied type argument count
        actual: usize,
    },

    /// A forwarding body could not be built
    #[error("Cannot synthesize {method}: {reason}")]
    Synthesis {
        /// Method description
        method: String,
        /// Failure detail
        reason: String,
    },

    /// A persisted proxy could not be rebuilt
    #[error("Reconstruction failed: {0}")]
    Reconstruction(String),

    /// A proxy could not be persisted
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// No method with a body matches the call
    #[error("No method {name} on {ty}")]
    MissingMethod {
        /// Receiver type
        ty: String,
        /// Method name
        name: String,
    },

    /// An object could not be created
    #[error("Cannot instantiate {name}: {reason}")]
    Instantiation {
        /// Qualified type name
        name: String,
        /// Failure detail
        reason: String,
    },

    /// A value could not be converted to the requested Rust type
    #[error("Cannot convert {actual} to {expected}")]
    Conversion {
        /// Requested Rust type
        expected: &'static str,
        /// Value kind that was supplied
        actual: String,
    },

    /// Failure raised by a method body or interceptor
    #[error("{0}")]
    Runtime(String),

    /// Type model error
    #[error(transparent)]
    Type(#[from] TypeError),

    /// JSON encoding error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<String> for ProxyError {
    fn from(s: String) -> Self {
        ProxyError::Runtime(s)
    }
}

impl From<&str> for ProxyError {
    fn from(s: &str) -> Self {
        ProxyError::Runtime(s.to_string())
    }
}

impl ProxyError {
    /// Shorthand for a failure raised by user code
    pub fn runtime(message: impl Into<String>) -> Self {
        ProxyError::Runtime(message.into())
    }

    /// Whether this is the "no interceptor / no body" condition
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, ProxyError::NotImplemented { .. })
    }
}
