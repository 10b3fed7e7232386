//! Delegated-authorization wire types and access tokens.
//!
//! Grants are negotiated with the authorization server named by a wallet
//! record. A grant request describes the access being asked for (resource
//! type plus actions) and the requesting client's public key; the response
//! carries either a usable access token or a continuation that requires a
//! human to approve the grant out of band. The engine never completes the
//! interactive path automatically.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::timestamp::UnixTimestamp;

/// The resource types a grant can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    /// Receiver-side reservations.
    IncomingPayment,
    /// Sender-side executions.
    OutgoingPayment,
    /// Sender-side quotes.
    Quote,
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::IncomingPayment => "incoming-payment",
            Self::OutgoingPayment => "outgoing-payment",
            Self::Quote => "quote",
        };
        write!(f, "{s}")
    }
}

/// The actions a grant can permit on a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    /// Create a resource.
    Create,
    /// Read a single resource.
    Read,
    /// List resources.
    List,
}

/// One requested or granted access: a resource type and its actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessItem {
    /// The resource type.
    #[serde(rename = "type")]
    pub access_type: AccessType,
    /// The permitted actions.
    pub actions: Vec<AccessAction>,
}

impl AccessItem {
    /// Creates an access item.
    #[must_use]
    pub const fn new(access_type: AccessType, actions: Vec<AccessAction>) -> Self {
        Self {
            access_type,
            actions,
        }
    }

    /// Creates an access item permitting `create` and `read`, the minimum a
    /// payment phase needs.
    #[must_use]
    pub fn create_read(access_type: AccessType) -> Self {
        Self::new(access_type, vec![AccessAction::Create, AccessAction::Read])
    }
}

/// A usable delegated-access token.
///
/// Owned by the side that requested it and held in memory only; tokens are
/// never persisted beyond the process's lifetime. A token must not be
/// presented past its expiry; check [`GrantToken::is_expired`] before
/// every use and re-negotiate when it returns `true`.
#[derive(Debug, Clone)]
pub struct GrantToken {
    /// The opaque token value.
    pub value: String,
    /// Token management URI, if the server provided one.
    pub manage: Option<Url>,
    /// Expiry instant, if the server reported one.
    pub expires_at: Option<UnixTimestamp>,
    /// The access the token was granted for.
    pub access: Vec<AccessItem>,
}

impl GrantToken {
    /// Returns `true` if the token's reported expiry has passed.
    ///
    /// Tokens without a reported expiry never expire from the client's
    /// point of view.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at.has_passed())
    }
}

/// A grant negotiation that stopped at an interaction requirement.
///
/// Completing it needs a human to visit the redirect URI and approve the
/// grant outside the chat transport. This is a first-class outcome, not an
/// error shape: callers decide whether to surface the URI or fail the
/// enclosing operation.
#[derive(Debug, Clone)]
pub struct InteractionRequired {
    /// URI to continue the negotiation at, once approved.
    pub continue_uri: Url,
    /// Token authorizing the continuation request.
    pub continue_token: Option<String>,
    /// Out-of-band approval URI to send the user to.
    pub redirect: Option<Url>,
}

// --- wire types ---

/// Body of a grant request sent to an authorization server.
///
/// Grant negotiation uses snake_case field names on the wire, unlike the
/// camelCase wallet and payment records.
#[derive(Debug, Clone, Serialize)]
pub struct GrantRequest {
    /// The requested access.
    pub access_token: AccessTokenRequest,
    /// The requesting client's key descriptor.
    pub client: ClientDescriptor,
    /// How the client can interact for approval, if needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interact: Option<InteractRequest>,
}

/// The `access_token` element of a grant request.
#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenRequest {
    /// Requested access items.
    pub access: Vec<AccessItem>,
}

/// The `client` element of a grant request.
#[derive(Debug, Clone, Serialize)]
pub struct ClientDescriptor {
    /// The client's proofing key.
    pub key: ClientKey,
}

/// A client key descriptor: proof method plus the public key as a JWK.
#[derive(Debug, Clone, Serialize)]
pub struct ClientKey {
    /// Proofing method; always `"httpsig"` for this engine.
    pub proof: String,
    /// The public key.
    pub jwk: Jwk,
}

/// A public key in JWK form.
#[derive(Debug, Clone, Serialize)]
pub struct Jwk {
    /// Key identifier.
    pub kid: String,
    /// Key type.
    pub kty: String,
    /// Curve name.
    pub crv: String,
    /// Base64url-encoded public key bytes.
    pub x: String,
}

impl Jwk {
    /// Builds an Ed25519 JWK from a key id and base64url public key.
    #[must_use]
    pub fn ed25519(kid: impl Into<String>, x: impl Into<String>) -> Self {
        Self {
            kid: kid.into(),
            kty: "OKP".to_owned(),
            crv: "Ed25519".to_owned(),
            x: x.into(),
        }
    }
}

/// The `interact` element of a grant request.
#[derive(Debug, Clone, Serialize)]
pub struct InteractRequest {
    /// Supported interaction start modes.
    pub start: Vec<String>,
}

impl InteractRequest {
    /// Requests redirect-based interaction, the only mode the engine knows
    /// how to surface.
    #[must_use]
    pub fn redirect() -> Self {
        Self {
            start: vec!["redirect".to_owned()],
        }
    }
}

/// Body of a grant response from an authorization server.
///
/// Exactly one of `access_token` (immediate grant) or `continuation`
/// (interaction required) is expected; a response with neither is a
/// negotiation failure.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantResponse {
    /// The issued token, when the grant was immediate.
    pub access_token: Option<GrantedToken>,
    /// Continuation details, when interaction is required.
    #[serde(rename = "continue")]
    pub continuation: Option<Continuation>,
    /// Interaction details accompanying a continuation.
    pub interact: Option<InteractResponse>,
}

/// The `access_token` element of a grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantedToken {
    /// The opaque token value.
    pub value: String,
    /// Token management URI.
    pub manage: Option<Url>,
    /// Lifetime in seconds from issuance.
    pub expires_in: Option<u64>,
    /// The access actually granted.
    pub access: Option<Vec<AccessItem>>,
}

/// The `continue` element of a grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct Continuation {
    /// URI to continue the negotiation at.
    pub uri: Url,
    /// Token authorizing the continuation request.
    pub access_token: Option<ContinuationToken>,
    /// Seconds the client should wait before continuing.
    pub wait: Option<u64>,
}

/// The continuation access token wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ContinuationToken {
    /// The opaque continuation token value.
    pub value: String,
}

/// The `interact` element of a grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractResponse {
    /// URI to send the user to for approval.
    pub redirect: Option<Url>,
    /// Interaction finish nonce.
    pub finish: Option<String>,
}
