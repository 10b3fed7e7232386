//! Core types for the Open Payments transfer engine.
//!
//! This crate provides the foundational types used throughout the interpay
//! workspace for executing account-to-account transfers over the Open
//! Payments protocol. It is transport-agnostic: everything that speaks HTTP
//! lives in `interpay-http`, and the conversational front end lives in
//! `interpay-bot`.
//!
//! # Overview
//!
//! A transfer moves funds between two payment accounts named by portable
//! payment pointers. The sending side resolves both accounts, places a
//! reservation (incoming payment) on the receiving account, obtains a quote
//! fixing the debit amount, and finally executes the debit (outgoing
//! payment). Every authenticated request to the network is authorized by a
//! delegated grant obtained from the account's authorization server.
//!
//! # Modules
//!
//! - [`account`] - Payment pointers and resolved wallet records
//! - [`amount`] - Decimal amounts, minor-unit conversion, and bounds
//! - [`auth`] - Grant negotiation wire types and access tokens
//! - [`error`] - The failure taxonomy for transfer operations
//! - [`payment`] - Payment phases, transactions, and network wire types
//! - [`timestamp`] - Unix timestamps for signatures and token expiry

pub mod account;
pub mod amount;
pub mod auth;
pub mod error;
pub mod payment;
pub mod timestamp;
