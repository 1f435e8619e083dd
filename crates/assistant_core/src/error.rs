//! Failure taxonomy surfaced at the controller boundary.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RateLimited,
    CreditExhausted,
    ServerError,
    Timeout,
    TransportFailure,
    /// Handled by defaulting the payload; never shown to the user.
    MalformedResponse,
    /// Select/delete of an absent session; handled by falling back to the sentinel.
    NotFound,
}

impl FailureKind {
    pub fn user_message(self) -> &'static str {
        match self {
            Self::RateLimited => "Too many requests, please wait a moment and try again.",
            Self::CreditExhausted => "The assistant's credit is exhausted, please try again later.",
            Self::ServerError => "The server had a problem, please try again later.",
            Self::Timeout => "The request timed out, please try again.",
            Self::TransportFailure | Self::MalformedResponse | Self::NotFound => {
                "Sorry, something went wrong. Please try again."
            }
        }
    }

    /// Whether the kind should raise the dismissible error banner.
    pub fn is_surfaced(self) -> bool {
        !matches!(self, Self::MalformedResponse | Self::NotFound)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RateLimited => "rate_limited",
            Self::CreditExhausted => "credit_exhausted",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::TransportFailure => "transport_failure",
            Self::MalformedResponse => "malformed_response",
            Self::NotFound => "not_found",
        };
        f.write_str(name)
    }
}
