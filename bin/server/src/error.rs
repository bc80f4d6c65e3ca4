//! Startup errors of the server binary.
//!
//! Errors inside the flow are `FlowError`s and end in a failure redirect;
//! the variants here abort startup.

use std::fmt;

/// Errors raised while starting the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Configuration could not be loaded or failed validation.
    Configuration { details: String },
    /// The HTTP client for the token endpoint could not be built.
    HttpClient { details: String },
    /// The listener could not be bound.
    Bind { address: String, details: String },
    /// The server stopped with an I/O error.
    Serve { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "invalid configuration: {details}"),
            Self::HttpClient { details } => write!(f, "failed to build HTTP client: {details}"),
            Self::Bind { address, details } => {
                write!(f, "failed to bind to '{address}': {details}")
            }
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for ServerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = ServerError::Bind {
            address: "127.0.0.1:3000".to_string(),
            details: "address in use".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind to '127.0.0.1:3000': address in use"
        );
    }
}
