use crate::adapters::http::HttpSession;
use crate::domain::location::Location;
use crate::domain::model::ApiCredentials;

/// An authenticated context with one portal: the cookie-bearing HTTP
/// session, the application credentials, and the cardholder's auth token.
/// Only a successful login produces one; it is never persisted and holds
/// for exactly one institution and one card. Dropping it releases the
/// underlying connections.
///
/// Not `Clone` and not meant for parallel use; callers wanting
/// parallelism connect once per thread.
pub struct Session {
    location: Location,
    card_number: String,
    auth_token: String,
    retention_days: i64,
    api_credentials: ApiCredentials,
    http: HttpSession,
}

impl Session {
    pub(crate) fn new(
        location: Location,
        card_number: String,
        auth_token: String,
        retention_days: i64,
        api_credentials: ApiCredentials,
        http: HttpSession,
    ) -> Self {
        Session {
            location,
            card_number,
            auth_token,
            retention_days,
            api_credentials,
            http,
        }
    }

    /// The institution this session was created against.
    pub fn location(&self) -> Location {
        self.location
    }

    pub fn card_number(&self) -> &str {
        &self.card_number
    }

    /// How many days of transaction history the portal said it keeps.
    pub fn retention_days(&self) -> i64 {
        self.retention_days
    }

    /// The application credentials used for this session. Callers may
    /// cache them and pass them into the next client to skip the
    /// discovery round trip.
    pub fn api_credentials(&self) -> &ApiCredentials {
        &self.api_credentials
    }

    pub(crate) fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub(crate) fn http(&self) -> &HttpSession {
        &self.http
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("location", &self.location)
            .field("card_number", &self.card_number)
            .field("auth_token", &"<redacted>")
            .field("retention_days", &self.retention_days)
            .finish_non_exhaustive()
    }
}
