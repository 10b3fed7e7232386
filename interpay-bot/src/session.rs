//! The per-user conversation state machine.
//!
//! A session tracks exactly one flow at a time: registering a contact
//! (`name → wallet → description`) or sending a payment
//! (`select contact → amount → confirm`). Every step's input parsing is
//! isolated here as a total function: any input either advances the
//! step, re-prompts, or aborts the flow; nothing is silently ignored.
//!
//! The engine owns the effectful parts (resolution, persistence, the
//! payment itself) and discards the session at flow end; the types here
//! carry the accumulated state between turns.

use rust_decimal::Decimal;

use crate::contacts::Contact;

/// A live conversation session: one user, one flow.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// The owning user identity.
    pub user_id: String,
    /// The flow in progress.
    pub flow: Flow,
}

/// The mutually exclusive flows a session can be in.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Registering a new contact.
    AddingContact(AddContactFlow),
    /// Sending a payment to an existing contact.
    SendingPayment(SendFlow),
}

/// State for the add-contact flow.
#[derive(Debug, Clone)]
pub struct AddContactFlow {
    /// The step awaiting input.
    pub step: AddContactStep,
    /// Collected at the `Name` step.
    pub name: Option<String>,
    /// Collected at the `Wallet` step, unvalidated until submission.
    pub wallet: Option<String>,
}

impl AddContactFlow {
    /// Starts the flow at the `Name` step.
    #[must_use]
    pub const fn start() -> Self {
        Self {
            step: AddContactStep::Name,
            name: None,
            wallet: None,
        }
    }
}

/// Steps of the add-contact flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddContactStep {
    /// Awaiting the display name.
    Name,
    /// Awaiting the wallet address.
    Wallet,
    /// Awaiting a note, or the skip sentinel.
    Description,
}

/// State for the send-payment flow.
#[derive(Debug, Clone)]
pub struct SendFlow {
    /// The step awaiting input.
    pub step: SendStep,
    /// Contact list snapshot taken when the flow started; index-based
    /// selection stays valid against this snapshot for the whole flow.
    pub contacts: Vec<Contact>,
    /// The chosen recipient.
    pub selected: Option<Contact>,
    /// The validated amount.
    pub amount: Option<Decimal>,
}

impl SendFlow {
    /// Starts the flow at the `SelectContact` step over a snapshot.
    #[must_use]
    pub const fn start(contacts: Vec<Contact>) -> Self {
        Self {
            step: SendStep::SelectContact,
            contacts,
            selected: None,
            amount: None,
        }
    }
}

/// Steps of the send-payment flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStep {
    /// Awaiting a 1-based index into the contact snapshot.
    SelectContact,
    /// Awaiting the amount.
    Amount,
    /// Awaiting the confirmation.
    Confirm,
}

/// Parses a 1-based selection into an index into a list of `len` items.
///
/// Returns `None` for non-numeric or out-of-range input; the caller
/// re-prompts without advancing.
#[must_use]
pub fn parse_selection(input: &str, len: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    if n == 0 || n > len {
        return None;
    }
    Some(n - 1)
}

/// Returns `true` if the input is the skip sentinel for optional steps.
#[must_use]
pub fn is_skip(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "skip" | "-")
}

/// Returns `true` if the input confirms the pending action. Anything else
/// cancels.
#[must_use]
pub fn is_affirmative(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "yes" | "y" | "confirm" | "ok" | "send"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_one_based_and_bounded() {
        assert_eq!(parse_selection("1", 3), Some(0));
        assert_eq!(parse_selection(" 3 ", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("two", 3), None);
        assert_eq!(parse_selection("1", 0), None);
    }

    #[test]
    fn skip_sentinel() {
        assert!(is_skip("skip"));
        assert!(is_skip("SKIP"));
        assert!(is_skip("-"));
        assert!(!is_skip("ship"));
    }

    #[test]
    fn only_explicit_confirmation_confirms() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("Y"));
        assert!(is_affirmative("  ok "));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("maybe"));
        assert!(!is_affirmative(""));
    }
}
