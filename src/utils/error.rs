use thiserror::Error;

use crate::domain::location::Location;

#[derive(Error, Debug)]
pub enum KartenError {
    /// The portal rejected the card number / password pair. Terminal until
    /// the caller fixes the credentials.
    #[error("{location}: {operation}: portal rejected the credentials (HTTP {status}): {message}")]
    Authentication {
        location: Location,
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// Network failure, timeout, or a server error the portal did not
    /// explain. Transient; callers may retry.
    #[error("{location}: {operation}: transport failure: {message}")]
    Transport {
        location: Location,
        operation: &'static str,
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The portal no longer accepts the session's auth token. The caller
    /// must connect again.
    #[error("{location}: {operation}: session expired, log in again: {message}")]
    SessionExpired {
        location: Location,
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// The response did not match the expected structure. Usually an
    /// upstream layout change; reported, never retried.
    #[error("{location}: {operation}: unexpected response structure: {message}")]
    Parse {
        location: Location,
        operation: &'static str,
        message: String,
    },

    /// A session was used with a client bound to a different institution.
    #[error("session for {got} used with a client for {expected}")]
    SessionMismatch { expected: Location, got: Location },

    #[error("unknown location {0:?} (supported: {supported})", supported = Location::supported())]
    UnknownLocation(String),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "cli")]
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

impl KartenError {
    pub(crate) fn parse(
        location: Location,
        operation: &'static str,
        message: impl std::fmt::Display,
    ) -> Self {
        KartenError::Parse {
            location,
            operation,
            message: message.to_string(),
        }
    }

    pub(crate) fn transport(
        location: Location,
        operation: &'static str,
        status: Option<u16>,
        message: impl std::fmt::Display,
    ) -> Self {
        KartenError::Transport {
            location,
            operation,
            status,
            message: message.to_string(),
            source: None,
        }
    }

    pub(crate) fn transport_from(
        location: Location,
        operation: &'static str,
        source: reqwest::Error,
    ) -> Self {
        KartenError::Transport {
            location,
            operation,
            status: source.status().map(|s| s.as_u16()),
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn config(message: impl std::fmt::Display) -> Self {
        KartenError::Config {
            message: message.to_string(),
        }
    }

    /// True for failures that are worth retrying without changing anything
    /// on the caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KartenError::Transport { .. })
    }

    /// The institution the failing operation was talking to, if any.
    pub fn location(&self) -> Option<Location> {
        match self {
            KartenError::Authentication { location, .. }
            | KartenError::Transport { location, .. }
            | KartenError::SessionExpired { location, .. }
            | KartenError::Parse { location, .. } => Some(*location),
            KartenError::SessionMismatch { expected, .. } => Some(*expected),
            _ => None,
        }
    }

    /// The HTTP status behind the failure, where one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            KartenError::Authentication { status, .. } => Some(*status),
            KartenError::Transport { status, .. } | KartenError::SessionExpired { status, .. } => {
                *status
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, KartenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_retryable() {
        let transport = KartenError::transport(Location::Dresden, "card info", Some(503), "oops");
        let auth = KartenError::Authentication {
            location: Location::Dresden,
            operation: "login",
            status: 500,
            message: "wrong password".into(),
        };
        assert!(transport.is_retryable());
        assert!(!auth.is_retryable());
    }

    #[test]
    fn errors_carry_location_and_status() {
        let err = KartenError::Authentication {
            location: Location::Augsburg,
            operation: "login",
            status: 599,
            message: "rejected".into(),
        };
        assert_eq!(err.location(), Some(Location::Augsburg));
        assert_eq!(err.status(), Some(599));

        let parse = KartenError::parse(Location::Leipzig, "transactions", "bad JSON");
        assert_eq!(parse.location(), Some(Location::Leipzig));
        assert_eq!(parse.status(), None);
    }

    #[test]
    fn unknown_location_names_the_supported_set() {
        let msg = KartenError::UnknownLocation("Bielefeld".into()).to_string();
        assert!(msg.contains("Bielefeld"));
        assert!(msg.contains("Dresden"));
    }
}
