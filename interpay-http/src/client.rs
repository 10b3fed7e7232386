//! Shared HTTP client for payment-network calls.
//!
//! All traffic to the network goes through [`NetworkClient`]: unsigned
//! JSON GETs for resolution, and signed JSON POSTs (optionally carrying a
//! GNAP access token) for everything else. Every call is bounded by the
//! configured timeout; a timed-out call is a failure of that call, never
//! success-with-unknown-outcome.

use std::time::Duration;

use http::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use interpay::error::SigningError;
use interpay::timestamp::UnixTimestamp;

use crate::signature::{SigningIdentity, sign_request};

/// Default bound for any single network round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A failed network call, before mapping into the domain taxonomy.
///
/// Callers translate these into `ResolutionError`, `GrantError`, or
/// `PhaseError` depending on which operation was underway.
#[derive(Debug, thiserror::Error)]
pub enum RequestFailure {
    /// The request never produced a response (connect failure, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// The response status code.
        status: u16,
        /// The response body, for the failure summary.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("malformed response body: {0}")]
    Decode(String),

    /// The request could not be signed.
    #[error("{0}")]
    Signing(#[from] SigningError),
}

/// HTTP client wrapper with the engine's timeout and header conventions.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    http: reqwest::Client,
}

impl NetworkClient {
    /// Creates a client with the default 30 second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend cannot be
    /// initialized.
    pub fn try_new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend cannot be
    /// initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Wraps a pre-configured `reqwest` client.
    #[must_use]
    pub const fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Performs an unsigned JSON GET.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestFailure`] on transport failure, non-success
    /// status, or a body that does not deserialize into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, RequestFailure> {
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| RequestFailure::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    /// Performs a signed JSON POST, optionally authorized by a GNAP access
    /// token.
    ///
    /// The body is serialized exactly once; the same bytes are digested,
    /// signed, and sent, so the signature the server verifies covers the
    /// body it received.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestFailure`] on signing failure, transport failure,
    /// non-success status, or a body that does not deserialize into `T`.
    pub async fn post_signed<T, B>(
        &self,
        identity: &SigningIdentity,
        url: &Url,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, RequestFailure>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| RequestFailure::Decode(e.to_string()))?;
        let signed = sign_request(
            identity,
            &Method::POST,
            url,
            Some(&bytes),
            UnixTimestamp::now(),
        )?;

        let mut request = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header("Signature-Input", signed.signature_input)
            .header("Signature", signed.signature);
        if let Some(digest) = signed.content_digest {
            request = request.header("Content-Digest", digest);
        }
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("GNAP {token}"));
        }

        let response = request
            .body(bytes)
            .send()
            .await
            .map_err(|e| RequestFailure::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RequestFailure> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestFailure::Status {
                status: status.as_u16(),
                body: body.trim().to_owned(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestFailure::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| RequestFailure::Decode(e.to_string()))
    }
}
