//! Narrow access to a client's RPC handle.
//!
//! The extension client needs three things from a native client: the invoker
//! chain and the project and database ids. [`ExposeRpc`] hands them over,
//! stamped with an [`ADAPTER_VERSION`] that both sides must agree on.

use crate::client::DatastoreClient;
use crate::config::ClientConfig;
use crate::error::CoreResult;
use crate::extension::ExtensionClient;
use crate::interceptor::Invoker;
use crate::transport::Disconnected;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Version of the [`ExposeRpc`] contract.
pub const ADAPTER_VERSION: u32 = 1;

/// Project id of the client built by [`self_check`].
const SELF_CHECK_PROJECT: &str = "foobar";
/// Endpoint of the client built by [`self_check`]; it is never dialled.
const SELF_CHECK_ENDPOINT: &str = "never.really.connect.to.fake.datastore.example.com:443";

/// Handles a native client exposes to extensions.
#[derive(Clone)]
pub struct RpcHandles {
    /// Invoker chain of the client, interceptors included.
    pub rpc: Arc<dyn Invoker>,
    /// Project id.
    pub project_id: String,
    /// Database id.
    pub database_id: String,
    /// Per-call timeout the client applies to its own calls.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for RpcHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcHandles")
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .finish_non_exhaustive()
    }
}

/// Implemented by clients that can share their RPC handle.
pub trait ExposeRpc {
    /// Contract version this client was built against.
    fn adapter_version(&self) -> u32;

    /// Returns the handles, or `None` if the client has none to share.
    fn rpc_handles(&self) -> Option<RpcHandles>;
}

impl ExposeRpc for DatastoreClient {
    fn adapter_version(&self) -> u32 {
        ADAPTER_VERSION
    }

    fn rpc_handles(&self) -> Option<RpcHandles> {
        Some(RpcHandles {
            rpc: Arc::clone(self.rpc()),
            project_id: self.config().project_id.clone(),
            database_id: self.config().database_id.clone(),
            timeout: self.config().timeout,
        })
    }
}

/// Verifies that an extension client can be derived from a native client.
///
/// Builds a client that never connects and derives an [`ExtensionClient`]
/// from it. Run once at process start; an error means the native client and
/// this library disagree on [`ExposeRpc`].
pub fn self_check() -> CoreResult<()> {
    let config = ClientConfig::new(SELF_CHECK_PROJECT).with_endpoint(SELF_CHECK_ENDPOINT);
    let client = DatastoreClient::builder(config)
        .with_invoker(Disconnected)
        .build()?;
    ExtensionClient::from_client(&client)?;
    debug!(version = ADAPTER_VERSION, "adapter self-check passed");
    Ok(())
}
