//! Payment phases, the per-transfer transaction record, and the network
//! wire types for reservations, quotes, and executions.
//!
//! A transfer advances through the phases in order; each transition is
//! triggered only by success of the prior step. Any failure moves the
//! transaction directly to [`PaymentPhase::Failed`] with the failing phase
//! recorded. Remote resources created before the failure are left as-is:
//! there is no rollback, so a reservation created by a transfer that later
//! failed at quoting stays on the receiving side (and stays visible in the
//! transaction record).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::account::PaymentPointer;
use crate::amount::Amount;
use crate::error::PaymentError;

/// The states of the transfer state machine, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPhase {
    /// Transaction created, nothing attempted yet.
    Init,
    /// Resolving source and destination wallet records.
    Resolving,
    /// Creating the destination-side reservation.
    Reserving,
    /// Obtaining the source-side quote.
    Quoting,
    /// Executing the source-side debit.
    Executing,
    /// Terminal: all phases succeeded.
    Completed,
    /// Terminal: a phase failed.
    Failed,
}

impl std::fmt::Display for PaymentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "initialization",
            Self::Resolving => "account resolution",
            Self::Reserving => "reservation",
            Self::Quoting => "quoting",
            Self::Executing => "execution",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The unit of work for one transfer attempt.
///
/// Created when a confirmed send request is accepted and discarded once
/// terminal; it is never retried automatically and never persisted.
#[derive(Debug, Clone)]
pub struct PaymentTransaction {
    /// The requested amount, as entered.
    pub amount: Decimal,
    /// Free-text description for the transfer.
    pub description: Option<String>,
    /// The paying account.
    pub source: PaymentPointer,
    /// The receiving account.
    pub destination: PaymentPointer,
    /// Current phase.
    pub phase: PaymentPhase,
    /// The phase at which the transaction failed, when terminal-failed.
    pub failed_phase: Option<PaymentPhase>,
    /// The failure, when terminal-failed.
    pub failure: Option<PaymentError>,
    /// Reservation id, set once the reservation phase succeeds.
    pub reservation_id: Option<Url>,
    /// Quote id, set once the quoting phase succeeds.
    pub quote_id: Option<Url>,
    /// Execution id, set once the execution phase succeeds.
    pub execution_id: Option<Url>,
    /// Settlement state reported by the network on completion.
    pub settlement_state: Option<String>,
}

impl PaymentTransaction {
    /// Creates a transaction in [`PaymentPhase::Init`].
    #[must_use]
    pub const fn new(
        amount: Decimal,
        description: Option<String>,
        source: PaymentPointer,
        destination: PaymentPointer,
    ) -> Self {
        Self {
            amount,
            description,
            source,
            destination,
            phase: PaymentPhase::Init,
            failed_phase: None,
            failure: None,
            reservation_id: None,
            quote_id: None,
            execution_id: None,
            settlement_state: None,
        }
    }

    /// Records a terminal failure at the current phase.
    pub fn fail(&mut self, error: impl Into<PaymentError>) {
        self.failed_phase = Some(self.phase);
        self.failure = Some(error.into());
        self.phase = PaymentPhase::Failed;
    }

    /// Records terminal success with the network-reported settlement state.
    pub fn complete(&mut self, settlement_state: Option<String>) {
        self.settlement_state = settlement_state;
        self.phase = PaymentPhase::Completed;
    }

    /// Returns `true` when the transaction completed successfully.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == PaymentPhase::Completed
    }

    /// Returns `true` when the transaction terminally failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.phase == PaymentPhase::Failed
    }
}

// --- wire types ---

/// Request body for creating a reservation on the receiving account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPaymentRequest {
    /// The receiving wallet's canonical address.
    pub wallet_address: Url,
    /// The expected incoming amount, in the receiving asset's minor units.
    pub incoming_amount: Amount,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A reservation as returned by the receiving account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPayment {
    /// The reservation's canonical id.
    pub id: Url,
    /// The reserved amount, when echoed by the server.
    pub incoming_amount: Option<Amount>,
    /// Whether the reservation has been fully paid.
    pub completed: Option<bool>,
}

/// Request body for creating a quote on the paying account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// The paying wallet's canonical address.
    pub wallet_address: Url,
    /// The reservation this quote pays into.
    pub receiver: Url,
    /// Payment method; always `"ilp"` for this engine.
    pub method: String,
    /// The debit amount, in the paying asset's minor units.
    pub debit_amount: Amount,
}

/// A quote as returned by the paying account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// The quote's canonical id.
    pub id: Url,
    /// The fixed debit amount.
    pub debit_amount: Option<Amount>,
    /// The amount the receiver will get.
    pub receive_amount: Option<Amount>,
}

/// Request body for executing the debit against a quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPaymentRequest {
    /// The paying wallet's canonical address.
    pub wallet_address: Url,
    /// The quote being executed.
    pub quote_id: Url,
}

/// An execution as returned by the paying account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPayment {
    /// The execution's canonical id.
    pub id: Url,
    /// Settlement state reported by the network.
    pub state: Option<String>,
    /// The amount actually sent so far.
    pub sent_amount: Option<Amount>,
}
