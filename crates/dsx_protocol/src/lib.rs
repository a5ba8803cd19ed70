//! # DSX Protocol
//!
//! Wire types and CBOR codecs for the DSX datastore protocol.
//!
//! This crate provides:
//! - `Key`, `Entity`, `Value` and `EntityResult` wire shapes
//! - Request/response messages for `Lookup`, `RunQuery` and `Commit`
//! - `Mutation` with an optional base-version precondition
//! - The `DatastoreService` trait implemented by servers and emulators
//! - CBOR encoding/decoding via `ciborium`
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod entity;
mod error;
mod key;
mod messages;
mod mutation;
mod service;

pub use codec::{from_cbor, to_cbor, WireMessage};
pub use entity::{Entity, EntityResult, Value};
pub use error::{Code, CodecError, CodecResult, Status};
pub use key::{IdType, Key, PartitionId, PathElement, DEFAULT_DATABASE_ID};
pub use messages::{
    CommitMode, CommitRequest, CommitResponse, LookupRequest, LookupResponse, Method,
    MoreResults, MutationResult, Query, QueryResultBatch, RunQueryRequest, RunQueryResponse,
    TransactionOptions,
};
pub use mutation::{Mutation, Operation};
pub use service::{route_post, DatastoreService, LoopbackServer};

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u16 = 1;
