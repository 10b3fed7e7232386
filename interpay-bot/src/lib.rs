//! Conversational front end for the Open Payments transfer engine.
//!
//! The bot collects transfer parameters across chat turns: a per-user
//! state machine gathers the recipient (from the user's registered
//! contacts), the amount, and a confirmation, then hands the confirmed
//! request to the payment orchestrator. Contacts double as the whitelist:
//! a transfer can only go to a destination the user has registered.
//!
//! The chat transport itself is a collaborator behind the
//! [`transport::ChatTransport`] trait; the engine is transport-agnostic
//! and processes one inbound event per user at a time, with events for
//! distinct users handled fully in parallel.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with environment-variable expansion
//! - [`contacts`] - Contact records and the contact store
//! - [`engine`] - Command routing and session boundary handling
//! - [`registry`] - At-most-one-session-per-user registry
//! - [`session`] - The per-user conversation state machine
//! - [`transport`] - Inbound events, replies, and the transport trait
//! - [`whitelist`] - The (user, destination) authorization gate

pub mod config;
pub mod contacts;
pub mod engine;
pub mod registry;
pub mod session;
pub mod transport;
pub mod whitelist;
