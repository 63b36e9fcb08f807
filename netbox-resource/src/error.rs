use std::fmt;

use crate::api::Operation;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort a reconciliation pass.
///
/// Errors are raised before any mutating call is issued, except for
/// [`Error::RemoteApi`] and [`Error::Transport`] coming from that call itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed module input: bad slug, missing identifying field, unknown
    /// query parameter.
    #[error("{0}")]
    Validation(String),

    /// A field referring to another NetBox object did not resolve to exactly
    /// one object.
    #[error("could not resolve {field} {value}: {reason}")]
    Resolution {
        field: String,
        value: String,
        reason: ResolutionFailure,
    },

    /// The lookup for the managed object itself returned several candidates.
    #[error("more than one {resource} matched {query}; use query_params to narrow the lookup")]
    AmbiguousMatch { resource: String, query: String },

    /// NetBox answered, but refused the request.
    #[error("NetBox rejected {operation} on {endpoint} (HTTP {status}): {message}")]
    RemoteApi {
        operation: Operation,
        endpoint: String,
        status: u16,
        message: String,
    },

    /// NetBox answered with something that is not a NetBox object.
    #[error("unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },

    #[error("could not reach NetBox: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    NotFound,
    Ambiguous,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::NotFound => write!(f, "referenced object does not exist"),
            ResolutionFailure::Ambiguous => {
                write!(f, "ambiguous reference, add distinguishing fields")
            }
        }
    }
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn transport(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Transport(Box::new(error))
    }

    /// Whether a lookup, primary or nested, matched more than one object.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousMatch { .. }
                | Error::Resolution {
                    reason: ResolutionFailure::Ambiguous,
                    ..
                }
        )
    }
}
