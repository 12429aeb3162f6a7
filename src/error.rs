//! Boundary errors - failures reported by the foreign runtime
//!
//! Design: one enum for every failure a boundary primitive can report.
//! Nothing in this crate retries; an error is surfaced to the caller once.

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BoundaryError>;

/// Failure reported while crossing the runtime boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    /// No foreign runtime is installed on the current thread
    NoRuntime,
    /// Operation attempted on a handle whose identity was taken
    EmptyHandle,
    /// The runtime does not recognise this reference
    InvalidHandle { raw: u32 },
    /// Call target is not a function
    NotCallable { type_tag: String },
    /// Construct target is not a constructor
    NotConstructible { type_tag: String },
    /// Property read or write rejected by the runtime
    PropertyAccess { key: String, type_tag: String },
    /// Method lookup by name found nothing callable
    MethodNotFound { name: String },
    /// Foreign value cannot be represented as the requested native type
    Coercion { expected: String, found: String },
    /// Descriptor has no wire representation in this direction
    Unsupported { descriptor: String },
    /// Foreign code raised an error
    Thrown { message: String },
}

impl BoundaryError {
    /// Coercion failure helper
    pub fn coercion(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Coercion {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Foreign exception helper
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown {
            message: message.into(),
        }
    }
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuntime => write!(f, "No foreign runtime installed on this thread"),
            Self::EmptyHandle => write!(f, "Handle is empty (its value was moved out)"),
            Self::InvalidHandle { raw } => write!(f, "Invalid handle: {}", raw),
            Self::NotCallable { type_tag } => write!(f, "Value of type {} is not callable", type_tag),
            Self::NotConstructible { type_tag } => {
                write!(f, "Value of type {} is not a constructor", type_tag)
            }
            Self::PropertyAccess { key, type_tag } => {
                write!(f, "Cannot access property '{}' of {}", key, type_tag)
            }
            Self::MethodNotFound { name } => write!(f, "Method not found: {}", name),
            Self::Coercion { expected, found } => {
                write!(f, "Cannot convert {} to {}", found, expected)
            }
            Self::Unsupported { descriptor } => {
                write!(f, "No wire conversion for type {}", descriptor)
            }
            Self::Thrown { message } => write!(f, "Foreign exception: {}", message),
        }
    }
}

impl std::error::Error for BoundaryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = BoundaryError::coercion("i32", "string \"abc\"");
        assert_eq!(err.to_string(), "Cannot convert string \"abc\" to i32");

        let err = BoundaryError::MethodNotFound { name: "frob".into() };
        assert_eq!(err.to_string(), "Method not found: frob");
    }
}
