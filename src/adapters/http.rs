//! HTTP session wrapper: one cookie-bearing blocking client per login
//! session, with a fixed user agent and a hard timeout on every call.
//! Transport failures surface here; response statuses are handed back
//! uninterpreted for the adapter to classify.

use std::time::Duration;

use serde_json::Value;

use crate::domain::location::Location;
use crate::domain::model::ApiCredentials;
use crate::utils::error::{KartenError, Result};

const USER_AGENT: &str = concat!("kartenservice/", env!("CARGO_PKG_VERSION"));

/// Default bound on each HTTP call. The portals are slow but not this slow;
/// exceeding it surfaces a transport error rather than hanging the caller.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Status and body of a portal reply, prior to any interpretation.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A cookie-bearing HTTP client scoped to one session with one portal.
/// Dropping it releases the underlying connection pool.
pub struct HttpSession {
    client: reqwest::blocking::Client,
    location: Location,
}

impl HttpSession {
    pub fn new(location: Location, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| KartenError::transport_from(location, "client setup", e))?;
        Ok(HttpSession { client, location })
    }

    pub fn get(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, String)],
        auth: Option<&ApiCredentials>,
    ) -> Result<RawResponse> {
        let mut request = self.client.get(url).query(query);
        if let Some(creds) = auth {
            request = request.basic_auth(&creds.user, Some(&creds.password));
        }
        self.send(operation, url, request)
    }

    pub fn post_json(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, String)],
        payload: &Value,
        auth: Option<&ApiCredentials>,
    ) -> Result<RawResponse> {
        let mut request = self.client.post(url).query(query).json(payload);
        if let Some(creds) = auth {
            request = request.basic_auth(&creds.user, Some(&creds.password));
        }
        self.send(operation, url, request)
    }

    fn send(
        &self,
        operation: &'static str,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<RawResponse> {
        tracing::debug!(location = %self.location, operation, url, "portal request");
        let response = request
            .send()
            .map_err(|e| KartenError::transport_from(self.location, operation, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| KartenError::transport_from(self.location, operation, e))?;
        tracing::debug!(
            location = %self.location,
            operation,
            status,
            bytes = body.len(),
            "portal response"
        );
        Ok(RawResponse { status, body })
    }
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
