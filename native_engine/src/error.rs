//! Error types for the native engine
//!
//! Recoverable failures (stale tickets, unknown uniforms, device creation
//! failures) are reported through [`Error`]. Device-limit violations are not
//! recoverable and halt through an assertion instead.

use std::fmt;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// The graphics layer refused to create a resource or read one back
    BackendError(String),

    /// A ticket or handle coming from the scripting side that cannot be used
    InvalidResource(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Log an error and build an `Error::BackendError` from the same message
///
/// # Example
///
/// ```ignore
/// return Err(engine_err!("native::Engine", "program {:?} not found", key));
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::native::Error::BackendError(message)
    }};
}

/// Log an error and return early with an `Error::BackendError`
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a warning and build an `Error::InvalidResource`
///
/// Used for stale tickets coming back from the scripting side.
#[macro_export]
macro_rules! invalid_resource {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::native::Error::InvalidResource(message)
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
