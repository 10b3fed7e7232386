//! Payment pointers and resolved wallet records.
//!
//! A payment pointer is the portable, human-shareable name of a payment
//! account (`$wallet.example.com/alice`). It is resolved, never parsed for
//! meaning: a single GET against the derived URL yields a [`WalletRecord`]
//! describing the account's asset, authorization server, and capability
//! endpoints. Records are fetched fresh on every resolution and must be
//! treated as possibly stale between resolution and use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::ValidationError;

/// A portable identifier naming a payment account.
///
/// Two forms are accepted:
///
/// - The sigil form `$host/path`, resolved as `https://` + remainder.
/// - An absolute `http(s)://` URL, taken as the already-canonical wallet
///   address. Test deployments without TLS use this form.
///
/// The identifier is immutable once constructed and the resolution URL is
/// derived exactly once, at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentPointer {
    raw: String,
    resolution: Url,
}

impl PaymentPointer {
    /// Parses and validates a payment pointer.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the input is neither a `$`-prefixed
    /// pointer nor an absolute HTTP(S) URL, or if the derived URL has no
    /// host.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let target = if let Some(rest) = trimmed.strip_prefix('$') {
            format!("https://{rest}")
        } else if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
            trimmed.to_owned()
        } else {
            return Err(ValidationError::new(format!(
                "payment pointer must start with '$' or 'https://': {trimmed}"
            )));
        };

        let resolution = Url::parse(&target)
            .map_err(|e| ValidationError::new(format!("invalid payment pointer {trimmed}: {e}")))?;
        if resolution.host_str().is_none() {
            return Err(ValidationError::new(format!(
                "payment pointer has no host: {trimmed}"
            )));
        }

        Ok(Self {
            raw: trimmed.to_owned(),
            resolution,
        })
    }

    /// Returns the pointer exactly as it was supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the URL the pointer resolves at.
    #[must_use]
    pub const fn resolution_url(&self) -> &Url {
        &self.resolution
    }
}

impl fmt::Display for PaymentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for PaymentPointer {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PaymentPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PaymentPointer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Public metadata for a payment account, fetched at its resolution URL.
///
/// Deserialization fails closed: a response missing the asset, the
/// authorization server, or any capability endpoint does not produce a
/// partially-populated record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    /// Canonical wallet address URL.
    pub id: Url,
    /// Asset code the account is denominated in (e.g., `"USD"`).
    pub asset_code: String,
    /// Number of fractional decimal digits the network uses for this asset.
    pub asset_scale: u8,
    /// Authorization server that issues grants for this account.
    pub auth_server: Url,
    /// Capability endpoints for reservations, quotes, and executions.
    pub capabilities: WalletCapabilities,
}

/// The capability endpoints advertised by a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCapabilities {
    /// Endpoint for creating incoming payments (reservations).
    pub incoming_payments: CapabilityEndpoint,
    /// Endpoint for creating quotes.
    pub quotes: CapabilityEndpoint,
    /// Endpoint for creating outgoing payments (executions).
    pub outgoing_payments: CapabilityEndpoint,
}

/// A single capability endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEndpoint {
    /// The endpoint URL.
    pub id: Url,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigil_pointer_resolves_over_https() {
        let p = PaymentPointer::parse("$wallet.interledger-test.dev/alice").unwrap();
        assert_eq!(p.as_str(), "$wallet.interledger-test.dev/alice");
        assert_eq!(
            p.resolution_url().as_str(),
            "https://wallet.interledger-test.dev/alice"
        );
    }

    #[test]
    fn url_pointer_is_taken_as_is() {
        let p = PaymentPointer::parse("http://127.0.0.1:9000/bob").unwrap();
        assert_eq!(p.resolution_url().as_str(), "http://127.0.0.1:9000/bob");
    }

    #[test]
    fn bare_string_is_rejected() {
        assert!(PaymentPointer::parse("wallet.example.com/alice").is_err());
        assert!(PaymentPointer::parse("").is_err());
    }

    #[test]
    fn wallet_record_missing_capabilities_fails_closed() {
        let json = serde_json::json!({
            "id": "https://wallet.example.com/alice",
            "assetCode": "USD",
            "assetScale": 2,
            "authServer": "https://auth.example.com",
        });
        assert!(serde_json::from_value::<WalletRecord>(json).is_err());
    }

    #[test]
    fn wallet_record_parses_capability_urls() {
        let json = serde_json::json!({
            "id": "https://wallet.example.com/alice",
            "assetCode": "EUR",
            "assetScale": 2,
            "authServer": "https://auth.example.com",
            "capabilities": {
                "incomingPayments": { "id": "https://wallet.example.com/incoming-payments" },
                "quotes": { "id": "https://wallet.example.com/quotes" },
                "outgoingPayments": { "id": "https://wallet.example.com/outgoing-payments" },
            },
        });
        let record: WalletRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.asset_code, "EUR");
        assert_eq!(
            record.capabilities.quotes.id.as_str(),
            "https://wallet.example.com/quotes"
        );
    }
}
