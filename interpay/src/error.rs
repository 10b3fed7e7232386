//! Error types for transfer operations.
//!
//! The taxonomy separates failures by where they are handled: validation
//! failures are caught before any network call, resolution/signing/grant/
//! phase failures abort the current transaction with no retry at any
//! layer, and authorization failures are policy denials raised before the
//! payment engine is ever invoked.

use std::fmt;

use crate::auth::InteractionRequired;
use crate::payment::PaymentPhase;

/// Base error type for transfer operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    /// Input rejected before any network call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Account metadata unreachable or malformed.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// Key material invalid; fatal, never retried.
    #[error("{0}")]
    Signing(#[from] SigningError),

    /// Grant negotiation rejected or requires interaction the engine cannot
    /// complete.
    #[error("{0}")]
    Grant(#[from] GrantError),

    /// A reservation, quote, or execution step failed.
    #[error("{0}")]
    Phase(#[from] PhaseError),

    /// Destination not whitelisted for the requesting user.
    #[error("{0}")]
    Authorization(#[from] AuthorizationError),
}

/// Input rejected before any network call.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// What was wrong with the input.
    pub reason: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Failure to resolve a payment pointer into a wallet record.
#[derive(Debug, Clone)]
pub struct ResolutionError {
    /// The identifier being resolved.
    pub identifier: String,
    /// The underlying cause.
    pub cause: String,
}

impl ResolutionError {
    /// Creates a new resolution error.
    #[must_use]
    pub fn new(identifier: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not resolve {}: {}", self.identifier, self.cause)
    }
}

impl std::error::Error for ResolutionError {}

/// Invalid or absent key material.
#[derive(Debug, Clone)]
pub struct SigningError {
    /// What went wrong, without reproducing key bytes.
    pub reason: String,
}

impl SigningError {
    /// Creates a new signing error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request signing failed: {}", self.reason)
    }
}

impl std::error::Error for SigningError {}

/// Grant negotiation failure.
#[derive(Debug, Clone)]
pub struct GrantError {
    /// Why the grant is unusable.
    pub reason: String,
    /// Set when the server asked for out-of-band approval instead of
    /// issuing a token.
    pub interaction: Option<InteractionRequired>,
}

impl GrantError {
    /// Creates a new grant error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            interaction: None,
        }
    }

    /// Creates a grant error carrying an interaction requirement, so the
    /// approval URI survives into the user-facing failure summary.
    #[must_use]
    pub fn interaction_required(interaction: InteractionRequired) -> Self {
        Self {
            reason: "grant requires interactive approval".to_owned(),
            interaction: Some(interaction),
        }
    }
}

impl fmt::Display for GrantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.interaction {
            Some(interaction) => {
                let uri = interaction
                    .redirect
                    .as_ref()
                    .unwrap_or(&interaction.continue_uri);
                write!(f, "{}: approve at {uri}", self.reason)
            }
            None => write!(f, "grant negotiation failed: {}", self.reason),
        }
    }
}

impl std::error::Error for GrantError {}

/// Failure of one payment phase, carrying which phase and the network's
/// reported cause.
#[derive(Debug, Clone)]
pub struct PhaseError {
    /// The phase that failed.
    pub phase: PaymentPhase,
    /// The network's reported cause.
    pub cause: String,
}

impl PhaseError {
    /// Creates a new phase error.
    #[must_use]
    pub fn new(phase: PaymentPhase, cause: impl Into<String>) -> Self {
        Self {
            phase,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.phase, self.cause)
    }
}

impl std::error::Error for PhaseError {}

/// Whitelist denial for a (user, destination) pair.
#[derive(Debug, Clone)]
pub struct AuthorizationError {
    /// The destination that is not whitelisted.
    pub destination: String,
}

impl AuthorizationError {
    /// Creates a new authorization error.
    #[must_use]
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "destination {} is not in your contacts",
            self.destination
        )
    }
}

impl std::error::Error for AuthorizationError {}
