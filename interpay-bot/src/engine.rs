//! Command routing and the session boundary.
//!
//! One engine serves every user. Each inbound event takes the sending
//! user's session slot (rejecting with a busy reply if an earlier event
//! still holds it), routes commands, advances the active flow, and always
//! leaves the slot in a consistent state: a flow either continues awaiting
//! the next turn or the session is discarded. Any failure inside a step
//! discards the session; a session is never left advanced past an error.
//!
//! Terminal payment outcomes produce exactly one summary naming the
//! amount, the counterpart, and on success the reservation, quote, and
//! execution ids; on failure the failing phase and cause.

use std::sync::Arc;

use interpay::account::PaymentPointer;
use interpay::amount::parse_amount;
use interpay::error::AuthorizationError;
use interpay::payment::PaymentTransaction;
use interpay_http::orchestrator::{PaymentOrchestrator, SendRequest};
use interpay_http::resolver::AccountResolver;

use crate::contacts::{Contact, ContactError, ContactStore};
use crate::registry::SessionRegistry;
use crate::session::{
    AddContactFlow, AddContactStep, ConversationSession, Flow, SendFlow, SendStep, is_affirmative,
    is_skip, parse_selection,
};
use crate::transport::{InboundEvent, Reply};
use crate::whitelist::AuthorizationGate;

/// What a flow step decided: keep the session for the next turn, or end
/// the flow and discard it.
enum FlowOutcome {
    Continue(Reply),
    Done(Reply),
}

fn generic_failure() -> Reply {
    Reply::text("Something went wrong and the flow was cancelled. Please start again.")
}

/// The conversational engine: routes events, owns the session registry,
/// and invokes the payment orchestrator on confirmed sends.
pub struct Engine {
    registry: SessionRegistry,
    contacts: Arc<dyn ContactStore>,
    gate: AuthorizationGate,
    resolver: AccountResolver,
    orchestrator: PaymentOrchestrator,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("source", self.orchestrator.source())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine over a contact store, resolver, and orchestrator.
    #[must_use]
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        resolver: AccountResolver,
        orchestrator: PaymentOrchestrator,
    ) -> Self {
        let gate = AuthorizationGate::new(Arc::clone(&contacts));
        Self {
            registry: SessionRegistry::new(),
            contacts,
            gate,
            resolver,
            orchestrator,
        }
    }

    /// Processes one inbound event and produces one reply.
    ///
    /// Events for the same user are serialized by the session slot: if an
    /// earlier event is still in flight, this one is rejected with a busy
    /// reply rather than queued against state the user no longer sees.
    pub async fn handle_event(&self, event: &InboundEvent) -> Reply {
        let slot = self.registry.slot(&event.user_id);
        let Ok(mut session) = slot.try_lock() else {
            tracing::debug!(user = %event.user_id, "busy, rejecting concurrent event");
            return Reply::text("Still processing your previous message, one moment.");
        };

        let text = event.text.trim();
        if let Some(rest) = text.strip_prefix('/') {
            self.handle_command(&mut session, &event.user_id, rest).await
        } else if session.is_some() {
            self.advance_flow(&mut session, &event.user_id, text).await
        } else {
            Reply::text("I didn't catch that. Send /help to see what I can do.")
        }
    }

    async fn handle_command(
        &self,
        session: &mut Option<ConversationSession>,
        user_id: &str,
        rest: &str,
    ) -> Reply {
        let mut parts = rest.split_whitespace();
        let command = parts.next().unwrap_or_default().to_lowercase();
        let argument = parts.next();

        match command.as_str() {
            "start" | "help" => Reply::text(self.help_text()),
            "wallet" => self.wallet_info().await,
            "contacts" => self.list_contacts(user_id).await,
            "cancel" => {
                if session.take().is_some() {
                    tracing::debug!(user = user_id, "flow cancelled");
                    Reply::text("Cancelled.")
                } else {
                    Reply::text("Nothing to cancel.")
                }
            }
            "addcontact" => self.start_add_contact(session, user_id),
            "send" => self.start_send(session, user_id).await,
            "delcontact" => {
                if session.is_some() {
                    Self::finish_flow_first()
                } else {
                    self.remove_contact(user_id, argument).await
                }
            }
            _ => Reply::text("Unknown command. Send /help to see what I can do."),
        }
    }

    fn help_text(&self) -> String {
        let bounds = self.orchestrator.bounds();
        format!(
            "I send payments from your wallet over Open Payments.\n\n\
             Commands:\n\
             /send: pay one of your contacts\n\
             /contacts: list your contacts\n\
             /addcontact: register a new contact\n\
             /delcontact <number>: remove a contact\n\
             /wallet: show your wallet details\n\
             /cancel: abandon the current flow\n\
             /help: this message\n\n\
             Transfers between {} and {} per payment.",
            bounds.min, bounds.max
        )
    }

    fn finish_flow_first() -> Reply {
        Reply::text("You're in the middle of something. Finish it or send /cancel first.")
    }

    async fn wallet_info(&self) -> Reply {
        match self.resolver.resolve(self.orchestrator.source()).await {
            Ok(record) => Reply::text(format!(
                "Your wallet: {}\nAddress: {}\nAsset: {} (scale {})",
                self.orchestrator.source(),
                record.id,
                record.asset_code,
                record.asset_scale,
            )),
            Err(e) => Reply::text(format!("Couldn't reach your wallet: {e}")),
        }
    }

    async fn list_contacts(&self, user_id: &str) -> Reply {
        match self.contacts.list(user_id).await {
            Ok(contacts) if contacts.is_empty() => {
                Reply::text("You have no contacts yet. Add one with /addcontact.")
            }
            Ok(contacts) => Reply::text(format!("Your contacts:\n{}", render_contacts(&contacts))),
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "contact listing failed");
                generic_failure()
            }
        }
    }

    fn start_add_contact(
        &self,
        session: &mut Option<ConversationSession>,
        user_id: &str,
    ) -> Reply {
        if session.is_some() {
            return Self::finish_flow_first();
        }
        *session = Some(ConversationSession {
            user_id: user_id.to_owned(),
            flow: Flow::AddingContact(AddContactFlow::start()),
        });
        tracing::debug!(user = user_id, "add-contact flow started");
        Reply::text("What should the contact be called?")
    }

    async fn start_send(
        &self,
        session: &mut Option<ConversationSession>,
        user_id: &str,
    ) -> Reply {
        if session.is_some() {
            return Self::finish_flow_first();
        }
        let contacts = match self.contacts.list(user_id).await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "contact snapshot failed");
                return generic_failure();
            }
        };
        if contacts.is_empty() {
            return Reply::text("You have no contacts yet. Add one with /addcontact first.");
        }

        let listing = render_contacts(&contacts);
        let keyboard = selection_keyboard(contacts.len());
        *session = Some(ConversationSession {
            user_id: user_id.to_owned(),
            flow: Flow::SendingPayment(SendFlow::start(contacts)),
        });
        tracing::debug!(user = user_id, "send flow started");
        Reply::with_keyboard(
            format!("Who do you want to pay?\n{listing}"),
            keyboard,
        )
    }

    async fn remove_contact(&self, user_id: &str, argument: Option<&str>) -> Reply {
        let Some(argument) = argument else {
            return Reply::text("Usage: /delcontact <number> (see /contacts for the numbers).");
        };
        let contacts = match self.contacts.list(user_id).await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "contact listing failed");
                return generic_failure();
            }
        };
        if contacts.is_empty() {
            return Reply::text("You have no contacts to remove.");
        }
        let Some(index) = parse_selection(argument, contacts.len()) else {
            return Reply::text(format!(
                "Pick a number between 1 and {} (see /contacts).",
                contacts.len()
            ));
        };
        let contact = contacts[index].clone();
        match self.contacts.remove(user_id, contact.id).await {
            Ok(true) => Reply::text(format!("Removed {}.", contact.name)),
            Ok(false) => Reply::text("That contact no longer exists."),
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "contact removal failed");
                generic_failure()
            }
        }
    }

    async fn advance_flow(
        &self,
        session: &mut Option<ConversationSession>,
        user_id: &str,
        text: &str,
    ) -> Reply {
        let Some(active) = session.as_mut() else {
            return generic_failure();
        };
        let outcome = match &mut active.flow {
            Flow::AddingContact(flow) => self.advance_add_contact(user_id, flow, text).await,
            Flow::SendingPayment(flow) => self.advance_send(user_id, flow, text).await,
        };
        match outcome {
            FlowOutcome::Continue(reply) => reply,
            FlowOutcome::Done(reply) => {
                *session = None;
                reply
            }
        }
    }

    async fn advance_add_contact(
        &self,
        user_id: &str,
        flow: &mut AddContactFlow,
        text: &str,
    ) -> FlowOutcome {
        match flow.step {
            AddContactStep::Name => {
                if text.is_empty() {
                    return FlowOutcome::Continue(Reply::text(
                        "The name can't be empty. What should the contact be called?",
                    ));
                }
                flow.name = Some(text.to_owned());
                flow.step = AddContactStep::Wallet;
                FlowOutcome::Continue(Reply::text(
                    "What's their wallet address? (a payment pointer like $wallet.example.com/alice)",
                ))
            }
            AddContactStep::Wallet => {
                if text.is_empty() {
                    return FlowOutcome::Continue(Reply::text(
                        "Send the wallet address, or /cancel.",
                    ));
                }
                // Stored as-is; validation is deferred to submission.
                flow.wallet = Some(text.to_owned());
                flow.step = AddContactStep::Description;
                FlowOutcome::Continue(Reply::text("Add a note for this contact, or send 'skip'."))
            }
            AddContactStep::Description => {
                let note = if is_skip(text) {
                    None
                } else {
                    Some(text.to_owned())
                };
                let (Some(name), Some(wallet)) = (flow.name.clone(), flow.wallet.clone()) else {
                    tracing::error!(user = user_id, "add-contact flow missing collected fields");
                    return FlowOutcome::Done(generic_failure());
                };
                self.submit_contact(user_id, name, &wallet, note).await
            }
        }
    }

    async fn submit_contact(
        &self,
        user_id: &str,
        name: String,
        wallet: &str,
        note: Option<String>,
    ) -> FlowOutcome {
        let pointer = match PaymentPointer::parse(wallet) {
            Ok(pointer) => pointer,
            Err(e) => {
                return FlowOutcome::Done(Reply::text(format!("Couldn't add {name}: {e}")));
            }
        };
        if let Err(e) = self.resolver.resolve(&pointer).await {
            tracing::warn!(user = user_id, pointer = %pointer, error = %e, "contact wallet rejected");
            return FlowOutcome::Done(Reply::text(format!("Couldn't add {name}: {e}")));
        }
        match self.contacts.add(user_id, name.clone(), pointer, note).await {
            Ok(contact) => {
                tracing::info!(user = user_id, contact = %contact.destination, "contact added");
                FlowOutcome::Done(Reply::text(format!(
                    "Contact {name} added ({}). You can now pay them with /send.",
                    contact.destination
                )))
            }
            Err(ContactError::Duplicate) => FlowOutcome::Done(Reply::text(format!(
                "Couldn't add {name}: you already have a contact with that wallet address.",
            ))),
            Err(e) => {
                tracing::error!(user = user_id, error = %e, "contact persistence failed");
                FlowOutcome::Done(generic_failure())
            }
        }
    }

    async fn advance_send(
        &self,
        user_id: &str,
        flow: &mut SendFlow,
        text: &str,
    ) -> FlowOutcome {
        match flow.step {
            SendStep::SelectContact => match parse_selection(text, flow.contacts.len()) {
                Some(index) => {
                    let contact = flow.contacts[index].clone();
                    let bounds = self.orchestrator.bounds();
                    let prompt = format!(
                        "How much do you want to send to {}? ({} to {})",
                        contact.name, bounds.min, bounds.max
                    );
                    flow.selected = Some(contact);
                    flow.step = SendStep::Amount;
                    FlowOutcome::Continue(Reply::text(prompt))
                }
                None => FlowOutcome::Continue(Reply::text(format!(
                    "Pick a number between 1 and {}.",
                    flow.contacts.len()
                ))),
            },
            SendStep::Amount => {
                let parsed = parse_amount(text)
                    .and_then(|amount| self.orchestrator.bounds().check(amount).map(|()| amount));
                match parsed {
                    Ok(amount) => {
                        let Some(contact) = flow.selected.as_ref() else {
                            tracing::error!(user = user_id, "send flow missing selected contact");
                            return FlowOutcome::Done(generic_failure());
                        };
                        let prompt = format!(
                            "Send {amount} to {} ({})? (yes/no)",
                            contact.name, contact.destination
                        );
                        flow.amount = Some(amount);
                        flow.step = SendStep::Confirm;
                        FlowOutcome::Continue(Reply::with_keyboard(
                            prompt,
                            vec![vec!["yes".to_owned(), "no".to_owned()]],
                        ))
                    }
                    Err(e) => FlowOutcome::Continue(Reply::text(format!(
                        "{e}. Try again, or /cancel."
                    ))),
                }
            }
            SendStep::Confirm => {
                if !is_affirmative(text) {
                    tracing::debug!(user = user_id, "send flow declined at confirmation");
                    return FlowOutcome::Done(Reply::text("Payment cancelled."));
                }
                let (Some(contact), Some(amount)) = (flow.selected.clone(), flow.amount) else {
                    tracing::error!(user = user_id, "send flow missing collected fields");
                    return FlowOutcome::Done(generic_failure());
                };
                self.execute_send(user_id, contact, amount).await
            }
        }
    }

    async fn execute_send(
        &self,
        user_id: &str,
        contact: Contact,
        amount: rust_decimal::Decimal,
    ) -> FlowOutcome {
        if !self.gate.is_allowed(user_id, &contact.destination).await {
            let denial = AuthorizationError::new(contact.destination.to_string());
            tracing::warn!(user = user_id, destination = %contact.destination, "send denied by whitelist");
            return FlowOutcome::Done(Reply::text(format!("{denial}.")));
        }

        let tx = self
            .orchestrator
            .send_payment(SendRequest {
                amount,
                description: Some(format!("Payment to {}", contact.name)),
                destination: contact.destination.clone(),
            })
            .await;
        FlowOutcome::Done(Reply::text(summarize(&tx, &contact)))
    }
}

fn render_contacts(contacts: &[Contact]) -> String {
    contacts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {} ({})", i + 1, c.name, c.destination))
        .collect::<Vec<_>>()
        .join("\n")
}

fn selection_keyboard(len: usize) -> Vec<Vec<String>> {
    (1..=len)
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .chunks(3)
        .map(<[String]>::to_vec)
        .collect()
}

fn summarize(tx: &PaymentTransaction, contact: &Contact) -> String {
    if tx.is_completed() {
        let mut summary = format!(
            "Sent {} to {} ({}).",
            tx.amount, contact.name, contact.destination
        );
        if let Some(id) = &tx.reservation_id {
            summary.push_str(&format!("\nReservation: {id}"));
        }
        if let Some(id) = &tx.quote_id {
            summary.push_str(&format!("\nQuote: {id}"));
        }
        if let Some(id) = &tx.execution_id {
            summary.push_str(&format!("\nExecution: {id}"));
        }
        if let Some(state) = &tx.settlement_state {
            summary.push_str(&format!("\nNetwork state: {state}"));
        }
        return summary;
    }

    let phase = tx
        .failed_phase
        .map_or_else(|| "processing".to_owned(), |p| p.to_string());
    let cause = tx
        .failure
        .as_ref()
        .map_or_else(|| "unknown failure".to_owned(), ToString::to_string);
    let mut summary = format!(
        "Payment of {} to {} failed during {phase}: {cause}",
        tx.amount, contact.name
    );
    if let Some(id) = &tx.reservation_id {
        summary.push_str(&format!(
            "\nA reservation was already created on the receiving side and remains open: {id}"
        ));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::MemoryContactStore;
    use interpay::amount::AmountBounds;
    use interpay_http::client::NetworkClient;
    use interpay_http::signature::SigningIdentity;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(user: &str, text: &str) -> InboundEvent {
        InboundEvent {
            user_id: user.to_owned(),
            chat_id: format!("chat-{user}"),
            text: text.to_owned(),
        }
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

    fn engine_for(server: &MockServer, store: Arc<dyn ContactStore>) -> Engine {
        let client = NetworkClient::try_new().unwrap();
        let identity = SigningIdentity::new(
            "key-1".to_owned(),
            ed25519_dalek::SigningKey::from_bytes(&[8u8; 32]),
            PaymentPointer::parse(&format!("{}/alice", server.uri())).unwrap(),
        );
        let orchestrator = PaymentOrchestrator::new(
            client.clone(),
            identity,
            PaymentPointer::parse(&format!("{}/alice", server.uri())).unwrap(),
            AmountBounds::default(),
        );
        Engine::new(store, AccountResolver::new(client), orchestrator)
    }

    async fn seed_contact(store: &MemoryContactStore, user: &str, server: &MockServer) -> Contact {
        store
            .add(
                user,
                "Bob".to_owned(),
                PaymentPointer::parse(&format!("{}/bob", server.uri())).unwrap(),
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_input_without_a_flow_hints_at_help() {
        let server = MockServer::start().await;
        let engine = engine_for(&server, Arc::new(MemoryContactStore::new()));
        let reply = engine.handle_event(&event("u1", "hello there")).await;
        assert!(reply.text.contains("/help"));
    }

    #[tokio::test]
    async fn busy_slot_rejects_a_concurrent_event() {
        let server = MockServer::start().await;
        let engine = engine_for(&server, Arc::new(MemoryContactStore::new()));

        let slot = engine.registry.slot("u1");
        let _held = slot.lock().await;

        let reply = engine.handle_event(&event("u1", "/help")).await;
        assert!(reply.text.contains("previous message"));
    }

    #[tokio::test]
    async fn send_with_no_contacts_points_at_addcontact() {
        let server = MockServer::start().await;
        let engine = engine_for(&server, Arc::new(MemoryContactStore::new()));
        let reply = engine.handle_event(&event("u1", "/send")).await;
        assert!(reply.text.contains("/addcontact"));
    }

    #[tokio::test]
    async fn invalid_amount_reprompts_without_discarding_the_flow() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryContactStore::new());
        seed_contact(&store, "u1", &server).await;
        let engine = engine_for(&server, store);

        engine.handle_event(&event("u1", "/send")).await;
        engine.handle_event(&event("u1", "1")).await;

        // Scenario: a negative amount re-prompts, no network calls made.
        let reply = engine.handle_event(&event("u1", "-5")).await;
        assert!(reply.text.contains("Try again"));
        assert!(server.received_requests().await.unwrap().is_empty());

        // The flow is still alive: a valid amount advances to confirmation.
        let reply = engine.handle_event(&event("u1", "10.50")).await;
        assert!(reply.text.contains("yes/no"));
        assert_eq!(reply.keyboard, Some(vec![vec!["yes".into(), "no".into()]]));
    }

    #[tokio::test]
    async fn out_of_range_selection_reprompts() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryContactStore::new());
        seed_contact(&store, "u1", &server).await;
        let engine = engine_for(&server, store);

        engine.handle_event(&event("u1", "/send")).await;
        let reply = engine.handle_event(&event("u1", "7")).await;
        assert!(reply.text.contains("between 1 and 1"));
        let reply = engine.handle_event(&event("u1", "bob")).await;
        assert!(reply.text.contains("between 1 and 1"));
    }

    #[tokio::test]
    async fn declining_the_confirmation_cancels_the_flow() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryContactStore::new());
        seed_contact(&store, "u1", &server).await;
        let engine = engine_for(&server, store);

        engine.handle_event(&event("u1", "/send")).await;
        engine.handle_event(&event("u1", "1")).await;
        engine.handle_event(&event("u1", "5.00")).await;
        let reply = engine.handle_event(&event("u1", "no")).await;
        assert!(reply.text.contains("cancelled"));

        // Session is gone: free text now gets the help hint.
        let reply = engine.handle_event(&event("u1", "yes")).await;
        assert!(reply.text.contains("/help"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn removed_contact_is_denied_before_any_network_call() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryContactStore::new());
        let contact = seed_contact(&store, "u1", &server).await;
        let engine = engine_for(&server, Arc::clone(&store) as Arc<dyn ContactStore>);

        engine.handle_event(&event("u1", "/send")).await;
        engine.handle_event(&event("u1", "1")).await;
        engine.handle_event(&event("u1", "5.00")).await;

        // The whitelist entry disappears between snapshot and confirm.
        store.remove("u1", contact.id).await.unwrap();

        let reply = engine.handle_event(&event("u1", "yes")).await;
        assert!(reply.text.contains("not in your contacts"));
        // No resolution, no grant negotiation, no payment calls.
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_for_distinct_users_are_isolated() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryContactStore::new());
        seed_contact(&store, "u1", &server).await;
        let engine = engine_for(&server, store);

        engine.handle_event(&event("u1", "/send")).await;
        engine.handle_event(&event("u2", "/addcontact")).await;

        // u2's input lands in u2's flow, not u1's.
        let reply = engine.handle_event(&event("u2", "Carol")).await;
        assert!(reply.text.contains("wallet address"));

        // u1 is still at contact selection.
        let reply = engine.handle_event(&event("u1", "1")).await;
        assert!(reply.text.contains("How much"));
    }

    #[tokio::test]
    async fn add_contact_aborts_when_the_wallet_does_not_resolve() {
        let server = MockServer::start().await;
        let engine = engine_for(&server, Arc::new(MemoryContactStore::new()));

        engine.handle_event(&event("u1", "/addcontact")).await;
        engine.handle_event(&event("u1", "Carol")).await;
        engine
            .handle_event(&event("u1", &format!("{}/carol", server.uri())))
            .await;
        // No mock mounted: resolution 404s at submission.
        let reply = engine.handle_event(&event("u1", "skip")).await;
        assert!(reply.text.contains("Couldn't add Carol"));

        // The flow was aborted, not left mid-step.
        let reply = engine.handle_event(&event("u1", "anything")).await;
        assert!(reply.text.contains("/help"));
    }

    #[tokio::test]
    async fn full_flow_adds_a_contact_and_completes_a_payment() {
        let server = MockServer::start().await;
        for who in ["alice", "bob"] {
            Mock::given(method("GET"))
                .and(path(format!("/{who}")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(wallet_json(&server.uri(), who)),
                )
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("/auth-{who}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": { "value": format!("tok-{who}"), "expires_in": 600 },
                })))
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path("/bob/incoming-payments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("{}/bob/incoming-payments/r1", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/alice/quotes"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("{}/alice/quotes/q1", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/alice/outgoing-payments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": format!("{}/alice/outgoing-payments/p1", server.uri()),
                "state": "COMPLETED",
            })))
            .mount(&server)
            .await;

        let engine = engine_for(&server, Arc::new(MemoryContactStore::new()));

        engine.handle_event(&event("u1", "/addcontact")).await;
        engine.handle_event(&event("u1", "Bob")).await;
        engine
            .handle_event(&event("u1", &format!("{}/bob", server.uri())))
            .await;
        let reply = engine.handle_event(&event("u1", "skip")).await;
        assert!(reply.text.contains("Contact Bob added"));

        engine.handle_event(&event("u1", "/send")).await;
        engine.handle_event(&event("u1", "1")).await;
        engine.handle_event(&event("u1", "10.50")).await;
        let reply = engine.handle_event(&event("u1", "yes")).await;

        assert!(reply.text.contains("Sent 10.50 to Bob"), "{}", reply.text);
        assert!(reply.text.contains("/bob/incoming-payments/r1"));
        assert!(reply.text.contains("/alice/quotes/q1"));
        assert!(reply.text.contains("/alice/outgoing-payments/p1"));
        assert!(reply.text.contains("COMPLETED"));

        // The send session was discarded after the terminal outcome.
        let reply = engine.handle_event(&event("u1", "yes")).await;
        assert!(reply.text.contains("/help"));
    }

    #[tokio::test]
    async fn quote_failure_names_the_phase_and_the_open_reservation() {
        let server = MockServer::start().await;
        for who in ["alice", "bob"] {
            Mock::given(method("GET"))
                .and(path(format!("/{who}")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(wallet_json(&server.uri(), who)),
                )
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(format!("/auth-{who}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": { "value": format!("tok-{who}"), "expires_in": 600 },
                })))
                .mount(&server)
                .await;
        }
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

        let store = Arc::new(MemoryContactStore::new());
        seed_contact(&store, "u1", &server).await;
        let engine = engine_for(&server, store);

        engine.handle_event(&event("u1", "/send")).await;
        engine.handle_event(&event("u1", "1")).await;
        engine.handle_event(&event("u1", "10.50")).await;
        let reply = engine.handle_event(&event("u1", "yes")).await;

        assert!(reply.text.contains("failed during quoting"), "{}", reply.text);
        assert!(reply.text.contains("remains open"));
        assert!(reply.text.contains("/bob/incoming-payments/r1"));
    }

    #[tokio::test]
    async fn delcontact_removes_by_listing_index() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryContactStore::new());
        seed_contact(&store, "u1", &server).await;
        let engine = engine_for(&server, Arc::clone(&store) as Arc<dyn ContactStore>);

        let reply = engine.handle_event(&event("u1", "/delcontact 1")).await;
        assert!(reply.text.contains("Removed Bob"));
        assert!(store.list("u1").await.unwrap().is_empty());

        let reply = engine.handle_event(&event("u1", "/delcontact 1")).await;
        assert!(reply.text.contains("no contacts to remove"));
    }
}
