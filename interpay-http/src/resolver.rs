//! Payment pointer resolution.
//!
//! Resolution is a single idempotent GET against the URL derived from the
//! pointer. Records are fetched fresh every time; the engine never caches
//! them, so a record is always as current as its last resolution and no
//! more. Retry policy belongs to callers; this layer reports one failure
//! per attempt.

use interpay::account::{PaymentPointer, WalletRecord};
use interpay::error::ResolutionError;

use crate::client::NetworkClient;

/// Resolves payment pointers into wallet records.
#[derive(Debug, Clone)]
pub struct AccountResolver {
    client: NetworkClient,
}

impl AccountResolver {
    /// Creates a resolver over the given client.
    #[must_use]
    pub const fn new(client: NetworkClient) -> Self {
        Self { client }
    }

    /// Fetches the wallet record for a pointer.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] on network failure, a non-success
    /// response, or a response missing required fields (asset, auth
    /// server, capability endpoints). The record either deserializes
    /// completely or not at all.
    pub async fn resolve(&self, pointer: &PaymentPointer) -> Result<WalletRecord, ResolutionError> {
        tracing::debug!(pointer = %pointer, "resolving wallet record");
        let record: WalletRecord = self
            .client
            .get_json(pointer.resolution_url())
            .await
            .map_err(|e| ResolutionError::new(pointer.as_str(), e.to_string()))?;
        tracing::debug!(
            pointer = %pointer,
            asset = %record.asset_code,
            scale = record.asset_scale,
            "wallet record resolved"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn wallet_json(base: &str) -> serde_json::Value {
        json!({
            "id": format!("{base}/alice"),
            "assetCode": "USD",
            "assetScale": 2,
            "authServer": format!("{base}/auth"),
            "capabilities": {
                "incomingPayments": { "id": format!("{base}/incoming-payments") },
                "quotes": { "id": format!("{base}/quotes") },
                "outgoingPayments": { "id": format!("{base}/outgoing-payments") },
            },
        })
    }

    #[tokio::test]
    async fn resolves_a_complete_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wallet_json(&server.uri())))
            .mount(&server)
            .await;

        let resolver = AccountResolver::new(NetworkClient::try_new().unwrap());
        let pointer = PaymentPointer::parse(&format!("{}/alice", server.uri())).unwrap();
        let record = resolver.resolve(&pointer).await.unwrap();

        assert_eq!(record.asset_code, "USD");
        assert_eq!(record.asset_scale, 2);
        assert!(
            record
                .capabilities
                .incoming_payments
                .id
                .as_str()
                .ends_with("/incoming-payments")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_a_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = AccountResolver::new(NetworkClient::try_new().unwrap());
        let pointer = PaymentPointer::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = resolver.resolve(&pointer).await.unwrap_err();
        assert!(err.cause.contains("404"));
        assert!(err.identifier.contains("/missing"));
    }

    #[tokio::test]
    async fn incomplete_record_fails_closed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/partial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": format!("{}/partial", server.uri()),
                "assetCode": "USD",
            })))
            .mount(&server)
            .await;

        let resolver = AccountResolver::new(NetworkClient::try_new().unwrap());
        let pointer = PaymentPointer::parse(&format!("{}/partial", server.uri())).unwrap();
        assert!(resolver.resolve(&pointer).await.is_err());
    }
}
