//! The emulator facade.

use crate::config::EmulatorConfig;
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::{EntityStore, StoreKey};
use dsx_protocol::{
    route_post, CommitRequest, CommitResponse, DatastoreService, EntityResult, Key,
    LookupRequest, LookupResponse, LoopbackServer, RunQueryRequest, RunQueryResponse, Status,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// An in-memory versioned datastore.
///
/// Serves the three datastore methods either directly through
/// [`DatastoreService`] or as CBOR bodies through [`LoopbackServer`].
///
/// # Example
///
/// ```
/// use dsx_emulator::{Emulator, EmulatorConfig};
///
/// let emulator = Emulator::new(EmulatorConfig::default());
/// assert_eq!(emulator.current_version(), 0);
/// assert_eq!(emulator.entity_count(), 0);
/// ```
pub struct Emulator {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl Emulator {
    /// Creates an empty emulator.
    pub fn new(config: EmulatorConfig) -> Self {
        let store = Arc::new(RwLock::new(EntityStore::new(config.first_allocated_id)));
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the current store version.
    pub fn current_version(&self) -> i64 {
        self.context.store.read().version()
    }

    /// Returns the number of stored entities.
    pub fn entity_count(&self) -> usize {
        self.context.store.read().len()
    }

    /// Reads an entity without going through a request.
    pub fn entity(&self, key: &Key) -> Option<EntityResult> {
        let store_key = StoreKey::from_key(key).ok()?;
        self.context.store.read().get(&store_key).map(|e| e.to_result())
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(EmulatorConfig::default())
    }
}

impl DatastoreService for Emulator {
    fn lookup(&self, request: LookupRequest) -> Result<LookupResponse, Status> {
        self.handler.handle_lookup(request).map_err(Status::from)
    }

    fn run_query(&self, request: RunQueryRequest) -> Result<RunQueryResponse, Status> {
        self.handler.handle_run_query(request).map_err(Status::from)
    }

    fn commit(&self, request: CommitRequest) -> Result<CommitResponse, Status> {
        self.handler.handle_commit(request).map_err(Status::from)
    }
}

impl LoopbackServer for Emulator {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        route_post(self, path, body).map_err(|e| {
            warn!(%path, error = %e, "rejected request");
            e
        })
    }
}
