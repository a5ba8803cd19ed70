//! # DSX Emulator
//!
//! In-memory versioned datastore for DSX.
//!
//! This crate provides:
//! - `Lookup`, `RunQuery` and `Commit` over an in-memory entity store
//! - Store-wide versions, bumped once per applied commit
//! - Base-version preconditions with per-mutation conflict reporting
//! - Transactional (all-or-nothing) and non-transactional commit modes
//! - Id allocation for incomplete keys
//!
//! # Versions
//!
//! Every applied commit advances the store version by one and stamps it on
//! each entity it writes. A missing entity has version 0, so a base version
//! of 0 means "must not exist yet".
//!
//! Commits are serialised under one write lock: precondition checks and the
//! writes they guard happen atomically.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::EmulatorConfig;
pub use error::{EmulatorError, EmulatorResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::Emulator;
pub use store::{describe, EntityStore, StoreKey, StoredEntity};
