//! The three-phase payment state machine.
//!
//! One [`PaymentOrchestrator`] serves one configured paying account. Each
//! confirmed send request becomes a [`PaymentTransaction`] that advances
//! through resolution, reservation, quoting, and execution; a failure at
//! any phase is terminal for that transaction, with the phase and cause
//! recorded. Remote resources created before the failure are left in place
//! (the network's cancellation semantics for unconsumed reservations are
//! unconfirmed, so the engine does not attempt compensation.
//!
//! Amount validation happens before any network contact, and every phase
//! authenticates with a token scoped to exactly that phase's access type.

use rust_decimal::Decimal;

use interpay::account::PaymentPointer;
use interpay::amount::{Amount, AmountBounds};
use interpay::auth::AccessType;
use interpay::error::{PaymentError, PhaseError, ValidationError};
use interpay::payment::{
    IncomingPayment, IncomingPaymentRequest, OutgoingPayment, OutgoingPaymentRequest,
    PaymentPhase, PaymentTransaction, Quote, QuoteRequest,
};

use crate::client::NetworkClient;
use crate::grant::{GrantNegotiator, GrantStore};
use crate::resolver::AccountResolver;
use crate::signature::SigningIdentity;

/// A confirmed request to move funds from the configured account.
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// The amount to transfer, as entered by the user.
    pub amount: Decimal,
    /// Free-text description attached to the reservation.
    pub description: Option<String>,
    /// The receiving account.
    pub destination: PaymentPointer,
}

/// Drives transfers for one paying account.
#[derive(Debug)]
pub struct PaymentOrchestrator {
    client: NetworkClient,
    identity: SigningIdentity,
    source: PaymentPointer,
    bounds: AmountBounds,
    resolver: AccountResolver,
    grants: GrantStore,
}

impl PaymentOrchestrator {
    /// Creates an orchestrator for the given paying account.
    #[must_use]
    pub fn new(
        client: NetworkClient,
        identity: SigningIdentity,
        source: PaymentPointer,
        bounds: AmountBounds,
    ) -> Self {
        let resolver = AccountResolver::new(client.clone());
        let grants = GrantStore::new(GrantNegotiator::new(client.clone(), identity.clone()));
        Self {
            client,
            identity,
            source,
            bounds,
            resolver,
            grants,
        }
    }

    /// The configured paying account.
    #[must_use]
    pub const fn source(&self) -> &PaymentPointer {
        &self.source
    }

    /// The configured per-transfer bounds.
    #[must_use]
    pub const fn bounds(&self) -> &AmountBounds {
        &self.bounds
    }

    /// Executes one transfer to a terminal state.
    ///
    /// Always returns the transaction record: on success it carries the
    /// reservation, quote, and execution ids plus the network-reported
    /// settlement state; on failure it carries the failing phase, the
    /// cause, and whatever ids had been created before the failure.
    pub async fn send_payment(&self, request: SendRequest) -> PaymentTransaction {
        let mut tx = PaymentTransaction::new(
            request.amount,
            request.description,
            self.source.clone(),
            request.destination,
        );

        if let Err(e) = self.validate(request.amount) {
            tracing::warn!(amount = %request.amount, error = %e, "send request rejected");
            tx.fail(e);
            return tx;
        }

        match self.run(&mut tx).await {
            Ok(()) => {
                tracing::info!(
                    source = %tx.source,
                    destination = %tx.destination,
                    amount = %tx.amount,
                    execution = ?tx.execution_id,
                    "transfer completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    source = %tx.source,
                    destination = %tx.destination,
                    amount = %tx.amount,
                    phase = %tx.phase,
                    error = %e,
                    "transfer failed"
                );
                tx.fail(e);
            }
        }
        tx
    }

    fn validate(&self, amount: Decimal) -> Result<(), ValidationError> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::new(format!(
                "amount must be positive: {amount}"
            )));
        }
        self.bounds.check(amount)
    }

    async fn run(&self, tx: &mut PaymentTransaction) -> Result<(), PaymentError> {
        tx.phase = PaymentPhase::Resolving;
        let source = self.resolver.resolve(&tx.source).await?;
        let destination = self.resolver.resolve(&tx.destination).await?;

        tx.phase = PaymentPhase::Reserving;
        let token = self
            .grants
            .token_for(&destination, AccessType::IncomingPayment)
            .await?;
        let body = IncomingPaymentRequest {
            wallet_address: destination.id.clone(),
            incoming_amount: Amount::from_decimal(
                tx.amount,
                destination.asset_code.clone(),
                destination.asset_scale,
            )?,
            description: tx.description.clone(),
        };
        let reservation: IncomingPayment = self
            .client
            .post_signed(
                &self.identity,
                &destination.capabilities.incoming_payments.id,
                Some(&token.value),
                &body,
            )
            .await
            .map_err(|e| PhaseError::new(PaymentPhase::Reserving, e.to_string()))?;
        tx.reservation_id = Some(reservation.id.clone());
        tracing::info!(reservation = %reservation.id, "reservation created");

        tx.phase = PaymentPhase::Quoting;
        let token = self.grants.token_for(&source, AccessType::Quote).await?;
        let body = QuoteRequest {
            wallet_address: source.id.clone(),
            receiver: reservation.id,
            method: "ilp".to_owned(),
            debit_amount: Amount::from_decimal(
                tx.amount,
                source.asset_code.clone(),
                source.asset_scale,
            )?,
        };
        let quote: Quote = self
            .client
            .post_signed(
                &self.identity,
                &source.capabilities.quotes.id,
                Some(&token.value),
                &body,
            )
            .await
            .map_err(|e| PhaseError::new(PaymentPhase::Quoting, e.to_string()))?;
        tx.quote_id = Some(quote.id.clone());
        tracing::info!(quote = %quote.id, "quote created");

        tx.phase = PaymentPhase::Executing;
        let token = self
            .grants
            .token_for(&source, AccessType::OutgoingPayment)
            .await?;
        let body = OutgoingPaymentRequest {
            wallet_address: source.id.clone(),
            quote_id: quote.id,
        };
        let execution: OutgoingPayment = self
            .client
            .post_signed(
                &self.identity,
                &source.capabilities.outgoing_payments.id,
                Some(&token.value),
                &body,
            )
            .await
            .map_err(|e| PhaseError::new(PaymentPhase::Executing, e.to_string()))?;
        tx.execution_id = Some(execution.id);
        tx.complete(execution.state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity() -> SigningIdentity {
        SigningIdentity::new(
            "key-1".to_owned(),
            ed25519_dalek::SigningKey::from_bytes(&[5u8; 32]),
            PaymentPointer::parse("$wallet.example.com/alice").unwrap(),
        )
    }

    fn wallet_json(base: &str, who: &str) -> serde_json::Value {
        json!({
            "id": format!("{base}/{who}"),
            "assetCode": "USD",
            "assetScale": 2,
            "authServer": format!("{base}/auth-{who}"),
            "capabilities": {
                "incomingPayments": { "id": format!("{base}/{who}/incoming-payments") },
                "quotes": { "id": format!("{base}/{who}/quotes") },
                "outgoingPayments": { "id": format!("{base}/{who}/outgoing-payments") },
            },
        })
    }

    async fn mount_wallets(server: &MockServer) {
        for who in ["alice", "bob"] {
            Mock::given(method("GET"))
                .and(path(format!("/{who}")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(wallet_json(&server.uri(), who)),
                )
                .mount(server)
                .await;
        }
    }

    /// Issues a distinct token per requested access type so the phase
    /// endpoints can assert exact scoping.
    async fn mount_grants(server: &MockServer) {
        for (who, access, token) in [
            ("bob", "incoming-payment", "tok-incoming"),
            ("alice", "quote", "tok-quote"),
            ("alice", "outgoing-payment", "tok-outgoing"),
        ] {
            Mock::given(method("POST"))
                .and(path(format!("/auth-{who}")))
                .and(body_partial_json(json!({
                    "access_token": { "access": [{ "type": access }] }
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": { "value": token, "expires_in": 600 },
                })))
                .mount(server)
                .await;
        }
    }

    fn orchestrator(server: &MockServer) -> PaymentOrchestrator {
        PaymentOrchestrator::new(
            NetworkClient::try_new().unwrap(),
            identity(),
            PaymentPointer::parse(&format!("{}/alice", server.uri())).unwrap(),
            AmountBounds::default(),
        )
    }

    fn send_to_bob(server: &MockServer, amount: Decimal) -> SendRequest {
        SendRequest {
            amount,
            description: Some("lunch".to_owned()),
            destination: PaymentPointer::parse(&format!("{}/bob", server.uri())).unwrap(),
        }
    }

    #[tokio::test]
    async fn happy_path_completes_with_all_ids() {
        let server = MockServer::start().await;
        mount_wallets(&server).await;
        mount_grants(&server).await;

        Mock::given(method("POST"))
            .and(path("/bob/incoming-payments"))
            .and(header("authorization", "GNAP tok-incoming"))
            .and(body_partial_json(json!({
                "incomingAmount": { "value": "1050", "assetCode": "USD", "assetScale": 2 }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("{}/bob/incoming-payments/r1", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/alice/quotes"))
            .and(header("authorization", "GNAP tok-quote"))
            .and(body_partial_json(json!({ "method": "ilp" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("{}/alice/quotes/q1", server.uri()),
                "debitAmount": { "value": "1050", "assetCode": "USD", "assetScale": 2 },
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/alice/outgoing-payments"))
            .and(header("authorization", "GNAP tok-outgoing"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("{}/alice/outgoing-payments/p1", server.uri()),
                "state": "COMPLETED",
            })))
            .mount(&server)
            .await;

        let tx = orchestrator(&server)
            .send_payment(send_to_bob(&server, Decimal::new(1050, 2)))
            .await;

        assert!(tx.is_completed(), "failure: {:?}", tx.failure);
        assert!(tx.reservation_id.is_some());
        assert!(tx.quote_id.is_some());
        assert!(tx.execution_id.is_some());
        assert_eq!(tx.settlement_state.as_deref(), Some("COMPLETED"));
    }

    #[tokio::test]
    async fn over_maximum_amount_is_rejected_before_any_network_call() {
        let server = MockServer::start().await;

        let tx = orchestrator(&server)
            .send_payment(send_to_bob(&server, Decimal::from(1500)))
            .await;

        assert!(tx.is_failed());
        assert_eq!(tx.failed_phase, Some(PaymentPhase::Init));
        assert!(matches!(tx.failure, Some(PaymentError::Validation(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_amount_is_rejected_before_any_network_call() {
        let server = MockServer::start().await;

        let tx = orchestrator(&server)
            .send_payment(send_to_bob(&server, Decimal::from(-5)))
            .await;

        assert!(tx.is_failed());
        assert!(matches!(tx.failure, Some(PaymentError::Validation(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quote_failure_keeps_the_reservation_id() {
        let server = MockServer::start().await;
        mount_wallets(&server).await;
        mount_grants(&server).await;

        Mock::given(method("POST"))
            .and(path("/bob/incoming-payments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("{}/bob/incoming-payments/r1", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/alice/quotes"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let tx = orchestrator(&server)
            .send_payment(send_to_bob(&server, Decimal::new(1050, 2)))
            .await;

        assert!(tx.is_failed());
        assert_eq!(tx.failed_phase, Some(PaymentPhase::Quoting));
        // The reservation created before the failure is left as-is and
        // stays visible in the record.
        assert!(tx.reservation_id.is_some());
        assert!(tx.quote_id.is_none());
        match tx.failure {
            Some(PaymentError::Phase(e)) => {
                assert_eq!(e.phase, PaymentPhase::Quoting);
                assert!(e.cause.contains("502"));
            }
            other => panic!("expected a phase error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unresolvable_destination_fails_at_resolution() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alice"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(wallet_json(&server.uri(), "alice")),
            )
            .mount(&server)
            .await;
        // No mock for /bob: resolution of the destination 404s.

        let tx = orchestrator(&server)
            .send_payment(send_to_bob(&server, Decimal::ONE))
            .await;

        assert!(tx.is_failed());
        assert_eq!(tx.failed_phase, Some(PaymentPhase::Resolving));
        assert!(matches!(tx.failure, Some(PaymentError::Resolution(_))));
    }

    #[tokio::test]
    async fn interactive_grant_fails_the_reservation_phase() {
        let server = MockServer::start().await;
        mount_wallets(&server).await;
        Mock::given(method("POST"))
            .and(path("/auth-bob"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "continue": { "uri": format!("{}/continue/1", server.uri()) },
                "interact": { "redirect": format!("{}/approve/1", server.uri()) },
            })))
            .mount(&server)
            .await;

        let tx = orchestrator(&server)
            .send_payment(send_to_bob(&server, Decimal::ONE))
            .await;

        assert!(tx.is_failed());
        assert_eq!(tx.failed_phase, Some(PaymentPhase::Reserving));
        match tx.failure {
            Some(PaymentError::Grant(e)) => {
                let interaction = e.interaction.expect("interaction carried in the error");
                assert!(interaction.redirect.is_some());
            }
            other => panic!("expected a grant error, got {other:?}"),
        }
    }
}
