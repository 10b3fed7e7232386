//! Grant negotiation against account authorization servers.
//!
//! [`GrantNegotiator`] performs one signed request/response exchange and
//! reports the outcome: an issued token, or an interaction requirement a
//! human must complete out of band. [`GrantStore`] layers the token
//! lifecycle on top: one cached token per (authorization server, access
//! type), checked for expiry before every use and re-negotiated when
//! expired. A token is never presented past its reported expiry.

use std::collections::HashMap;

use tokio::sync::Mutex;
use url::Url;

use interpay::account::WalletRecord;
use interpay::auth::{
    AccessItem, AccessTokenRequest, AccessType, ClientDescriptor, ClientKey, GrantRequest,
    GrantResponse, GrantToken, InteractRequest, InteractionRequired, Jwk,
};
use interpay::error::GrantError;
use interpay::timestamp::UnixTimestamp;

use crate::client::NetworkClient;
use crate::signature::SigningIdentity;

/// The outcome of one grant negotiation.
#[derive(Debug, Clone)]
pub enum GrantOutcome {
    /// The server issued a usable token immediately.
    Issued(GrantToken),
    /// The server requires out-of-band approval. The engine does not
    /// complete this path automatically.
    InteractionRequired(InteractionRequired),
}

/// Negotiates grants with authorization servers.
#[derive(Debug, Clone)]
pub struct GrantNegotiator {
    client: NetworkClient,
    identity: SigningIdentity,
}

impl GrantNegotiator {
    /// Creates a negotiator signing with the given identity.
    #[must_use]
    pub const fn new(client: NetworkClient, identity: SigningIdentity) -> Self {
        Self { client, identity }
    }

    /// Requests a grant for the given access from the wallet's
    /// authorization server.
    ///
    /// # Errors
    ///
    /// Returns a [`GrantError`] if the negotiation is rejected or the
    /// response carries neither a token nor a continuation.
    pub async fn request_grant(
        &self,
        wallet: &WalletRecord,
        access: Vec<AccessItem>,
    ) -> Result<GrantOutcome, GrantError> {
        let request = GrantRequest {
            access_token: AccessTokenRequest { access },
            client: ClientDescriptor {
                key: ClientKey {
                    proof: "httpsig".to_owned(),
                    jwk: Jwk::ed25519(self.identity.key_id(), self.identity.public_jwk_x()),
                },
            },
            interact: Some(InteractRequest::redirect()),
        };

        tracing::debug!(auth_server = %wallet.auth_server, "requesting grant");
        let issued_at = UnixTimestamp::now();
        let response: GrantResponse = self
            .client
            .post_signed(&self.identity, &wallet.auth_server, None, &request)
            .await
            .map_err(|e| GrantError::new(e.to_string()))?;

        if let Some(token) = response.access_token {
            tracing::info!(auth_server = %wallet.auth_server, "grant issued");
            return Ok(GrantOutcome::Issued(GrantToken {
                value: token.value,
                manage: token.manage,
                expires_at: token.expires_in.map(|secs| issued_at + secs),
                access: token.access.unwrap_or_default(),
            }));
        }

        if let Some(continuation) = response.continuation {
            tracing::info!(
                auth_server = %wallet.auth_server,
                continue_uri = %continuation.uri,
                "grant requires interactive approval"
            );
            return Ok(GrantOutcome::InteractionRequired(InteractionRequired {
                continue_uri: continuation.uri,
                continue_token: continuation.access_token.map(|t| t.value),
                redirect: response.interact.and_then(|i| i.redirect),
            }));
        }

        Err(GrantError::new(
            "authorization server returned neither a token nor a continuation",
        ))
    }
}

/// Caches one token per (authorization server, access type), re-negotiating
/// through the [`GrantNegotiator`] whenever the cached token is absent or
/// past its reported expiry.
#[derive(Debug)]
pub struct GrantStore {
    negotiator: GrantNegotiator,
    tokens: Mutex<HashMap<(Url, AccessType), GrantToken>>,
}

impl GrantStore {
    /// Creates an empty store over a negotiator.
    #[must_use]
    pub fn new(negotiator: GrantNegotiator) -> Self {
        Self {
            negotiator,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a non-expired token scoped to exactly the given access type
    /// (`create` + `read`), negotiating a fresh grant when needed.
    ///
    /// The cache lock is never held across the negotiation round trip.
    ///
    /// # Errors
    ///
    /// Returns a [`GrantError`] if negotiation fails or the server
    /// requires interactive approval; the approval URI is carried in the
    /// error so it reaches the user-facing summary.
    pub async fn token_for(
        &self,
        wallet: &WalletRecord,
        access_type: AccessType,
    ) -> Result<GrantToken, GrantError> {
        let key = (wallet.auth_server.clone(), access_type);
        {
            let tokens = self.tokens.lock().await;
            if let Some(token) = tokens.get(&key) {
                if !token.is_expired() {
                    return Ok(token.clone());
                }
                tracing::debug!(
                    auth_server = %wallet.auth_server,
                    access = %access_type,
                    "cached token expired, re-negotiating"
                );
            }
        }

        let outcome = self
            .negotiator
            .request_grant(wallet, vec![AccessItem::create_read(access_type)])
            .await?;
        match outcome {
            GrantOutcome::Issued(token) => {
                self.tokens.lock().await.insert(key, token.clone());
                Ok(token)
            }
            GrantOutcome::InteractionRequired(interaction) => {
                Err(GrantError::interaction_required(interaction))
            }
        }
    }
}
