//! Detached HTTP message signatures for payment-network requests.
//!
//! Every authenticated request carries a `Signature-Input` header naming
//! the covered components, a `Signature` header with the Ed25519 signature,
//! and, when a body is present, a `Content-Digest` header. The remote
//! network verifies the signature against the public key registered for the
//! key id, so the signature base must be reproducible byte-for-byte from
//! the request alone.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as b64, URL_SAFE_NO_PAD as b64url};
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer, SigningKey};
use http::Method;
use sha2::{Digest, Sha256};
use url::Url;

use interpay::account::PaymentPointer;
use interpay::error::SigningError;
use interpay::timestamp::UnixTimestamp;

/// The signature algorithm name advertised in `Signature-Input`.
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

/// A signing identity: key id, private key material, and the account that
/// holds the key.
///
/// The private key is used only to produce signatures. It is never
/// serialized, never logged, and deliberately absent from the `Debug`
/// output.
#[derive(Clone)]
pub struct SigningIdentity {
    key_id: String,
    signing_key: SigningKey,
    holder: PaymentPointer,
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("key_id", &self.key_id)
            .field("holder", &self.holder)
            .finish_non_exhaustive()
    }
}

impl SigningIdentity {
    /// Creates an identity from an already-parsed signing key.
    #[must_use]
    pub const fn new(key_id: String, signing_key: SigningKey, holder: PaymentPointer) -> Self {
        Self {
            key_id,
            signing_key,
            holder,
        }
    }

    /// Creates an identity from base64-encoded private key material.
    ///
    /// Accepts either a raw 32-byte Ed25519 seed or a PKCS#8 DER document,
    /// both base64-encoded; these are the two forms key management tooling hands
    /// out.
    ///
    /// # Errors
    ///
    /// Returns a [`SigningError`] if the input is not valid base64 or not a
    /// usable Ed25519 private key. The error never reproduces key bytes.
    pub fn from_base64(
        key_id: impl Into<String>,
        encoded: &str,
        holder: PaymentPointer,
    ) -> Result<Self, SigningError> {
        let bytes = b64
            .decode(encoded.trim())
            .map_err(|_| SigningError::new("private key is not valid base64"))?;

        let signing_key = match <[u8; 32]>::try_from(bytes.as_slice()) {
            Ok(seed) => SigningKey::from_bytes(&seed),
            Err(_) => SigningKey::from_pkcs8_der(&bytes)
                .map_err(|_| SigningError::new("private key is not a 32-byte seed or PKCS#8 document"))?,
        };

        Ok(Self::new(key_id.into(), signing_key, holder))
    }

    /// Returns the key identifier the remote network knows this key by.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the account that holds this key.
    #[must_use]
    pub const fn holder(&self) -> &PaymentPointer {
        &self.holder
    }

    /// Returns the public key as the base64url `x` coordinate of an
    /// Ed25519 JWK.
    #[must_use]
    pub fn public_jwk_x(&self) -> String {
        b64url.encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Returns the verifying (public) half of the key.
    #[must_use]
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.signing_key.verifying_key()
    }
}

/// The headers produced by signing one request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// `Signature-Input` header value.
    pub signature_input: String,
    /// `Signature` header value.
    pub signature: String,
    /// `Content-Digest` header value, present when the request has a body.
    pub content_digest: Option<String>,
}

/// Computes the `Content-Digest` header value for a request body.
#[must_use]
pub fn content_digest(body: &[u8]) -> String {
    format!("sha-256=:{}:", b64.encode(Sha256::digest(body)))
}

/// Builds the canonical signature base for a request.
///
/// Components are rendered in fixed order (method, target URI, authority,
/// then the content digest when a body is present), one
/// `"component-name": value` line each, joined by newlines with no trailing
/// newline. Identical inputs produce a byte-identical base.
///
/// # Errors
///
/// Returns a [`SigningError`] if the target URI has no authority.
pub fn signature_base(
    method: &Method,
    target: &Url,
    digest: Option<&str>,
) -> Result<String, SigningError> {
    let host = target
        .host_str()
        .ok_or_else(|| SigningError::new("target URI has no host"))?;
    let authority = match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };

    let mut base = format!(
        "\"@method\": {method}\n\"@target-uri\": {target}\n\"@authority\": {authority}"
    );
    if let Some(digest) = digest {
        base.push_str(&format!("\n\"content-digest\": {digest}"));
    }
    Ok(base)
}

/// Signs a request, producing the signature headers.
///
/// The `created` timestamp becomes part of the `Signature-Input` header and
/// is supplied by the caller so that signing is reproducible under test.
///
/// # Errors
///
/// Returns a [`SigningError`] if the signature base cannot be built.
pub fn sign_request(
    identity: &SigningIdentity,
    method: &Method,
    target: &Url,
    body: Option<&[u8]>,
    created: UnixTimestamp,
) -> Result<SignedHeaders, SigningError> {
    let digest = body.map(content_digest);
    let base = signature_base(method, target, digest.as_deref())?;
    let signature = identity.signing_key.sign(base.as_bytes());

    let components = if digest.is_some() {
        r#""@method" "@target-uri" "@authority" "content-digest""#
    } else {
        r#""@method" "@target-uri" "@authority""#
    };
    let signature_input = format!(
        "sig1=({components});created={created};keyid=\"{}\";alg=\"{SIGNATURE_ALGORITHM}\"",
        identity.key_id()
    );
    let signature = format!("sig1=:{}:", b64.encode(signature.to_bytes()));

    Ok(SignedHeaders {
        signature_input,
        signature,
        content_digest: digest,
    })
}
