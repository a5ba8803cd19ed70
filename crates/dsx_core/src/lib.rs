//! # DSX Core
//!
//! Optimistic read-locking for a versioned document datastore.
//!
//! This crate provides:
//! - A per-request `Recorder` of entities observed by reads
//! - A `RecordingInterceptor` that feeds lookup and query results into it
//! - `ExtensionClient::mutate_with_locks`, which commits caller mutations
//!   together with a lock on each chosen entity
//! - A native `DatastoreClient` with pluggable transports and interceptors
//!
//! ## Locking model
//!
//! A lock is an update that rewrites an entity exactly as it was read, with
//! the version it was read at as its base version. Locks and caller
//! mutations commit in one single-use read-write transaction:
//! 1. Read through a client carrying the `RecordingInterceptor`, with a
//!    scope from `with_recorder`
//! 2. Commit with `mutate_with_locks`, passing the keys to lock
//! 3. If any locked entity changed in between, nothing applies and the
//!    commit fails with `CoreError::Conflict`
//!
//! ## Key Invariants
//!
//! - The latest read of a key is the one a lock uses
//! - Locks precede caller mutations in the commit
//! - A lock that cannot be built means nothing is sent
//! - Conflicts are never retried here

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod client;
mod config;
mod entity;
mod error;
mod extension;
mod interceptor;
mod key;
mod locks;
mod mutation;
mod recorder;
mod scope;
mod transport;

pub use adapter::{self_check, ExposeRpc, RpcHandles, ADAPTER_VERSION};
pub use client::{ClientBuilder, DatastoreClient};
pub use config::{
    ClientConfig, ENV_DATABASE_ID, ENV_EMULATOR_HOST, ENV_NAMESPACE, ENV_PROJECT_ID,
};
pub use entity::{entity_from_proto, entity_to_proto, Entity};
pub use error::{CoreError, CoreResult, RpcError, RpcResult};
pub use extension::ExtensionClient;
pub use interceptor::{
    Intercepted, Interceptor, Invoker, InvokerExt, RecordingInterceptor, RpcRequest, RpcResponse,
};
pub use key::{key_to_proto, proto_to_key, Key, KeyId};
pub use locks::build_locks;
pub use mutation::{mutation_protos, set_base_version, Mutation, MutationKind};
pub use recorder::{RecordedObservation, Recorder};
pub use scope::{with_recorder, CancelHandle, RequestScope};
pub use transport::{Disconnected, HttpClient, HttpTransport, LoopbackClient, ServiceTransport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
