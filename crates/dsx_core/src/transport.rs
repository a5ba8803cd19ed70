//! Transports that carry RPCs to a datastore.
//!
//! - [`ServiceTransport`] calls a [`DatastoreService`] in-process.
//! - [`HttpTransport`] posts CBOR bodies through a pluggable [`HttpClient`].
//! - [`Disconnected`] fails every call; used where a client must exist but
//!   must never reach the network.

use crate::error::{RpcError, RpcResult};
use crate::interceptor::{Invoker, RpcRequest, RpcResponse};
use crate::scope::RequestScope;
use dsx_protocol::{from_cbor, DatastoreService, LoopbackServer, Method, Status, WireMessage};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Calls a [`DatastoreService`] directly, without encoding.
pub struct ServiceTransport<S> {
    service: S,
}

impl<S: DatastoreService> ServiceTransport<S> {
    /// Creates a transport over `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S: DatastoreService> Invoker for ServiceTransport<S> {
    fn invoke(&self, scope: &RequestScope, request: RpcRequest) -> RpcResult<RpcResponse> {
        scope.check()?;
        let response = match request {
            RpcRequest::Lookup(r) => RpcResponse::Lookup(self.service.lookup(r)?),
            RpcRequest::RunQuery(r) => RpcResponse::RunQuery(self.service.run_query(r)?),
            RpcRequest::Commit(r) => RpcResponse::Commit(self.service.commit(r)?),
        };
        Ok(response)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport (reqwest, hyper,
/// ureq, ...).
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    ///
    /// `timeout` is the time left on the caller's deadline, if any.
    fn post(&self, url: &str, body: Vec<u8>, timeout: Option<Duration>) -> Result<Vec<u8>, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based transport using CBOR request/response bodies.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL (e.g., "http://localhost:8081").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Connection state.
    connected: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Checks if the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Closes the transport. Later calls fail with [`RpcError::NotConnected`].
    ///
    /// A failed request does not close the transport; it is recorded in
    /// [`last_error`](Self::last_error) and the next call is attempted.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn post_cbor<Req, Res>(&self, scope: &RequestScope, method: Method, request: &Req) -> RpcResult<Res>
    where
        Req: WireMessage,
        Res: DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(RpcError::NotConnected);
        }
        scope.check()?;

        let body = request
            .encode()
            .map_err(|e| RpcError::Protocol(format!("failed to encode request: {}", e)))?;

        let url = format!("{}{}", self.base_url, method.path());
        debug!(%url, bytes = body.len(), "posting request");
        let response_body = self.client.post(&url, body, scope.remaining()).map_err(|e| {
            warn!(%url, error = %e, "request failed");
            *self.last_error.write() = Some(e.clone());
            RpcError::transport_retryable(e)
        })?;
        *self.last_error.write() = None;

        let reply: Result<Res, Status> = from_cbor(&response_body)
            .map_err(|e| RpcError::Protocol(format!("failed to decode response: {}", e)))?;
        reply.map_err(RpcError::Status)
    }
}

impl<C: HttpClient> Invoker for HttpTransport<C> {
    fn invoke(&self, scope: &RequestScope, request: RpcRequest) -> RpcResult<RpcResponse> {
        let method = request.method();
        let response = match request {
            RpcRequest::Lookup(r) => RpcResponse::Lookup(self.post_cbor(scope, method, &r)?),
            RpcRequest::RunQuery(r) => RpcResponse::RunQuery(self.post_cbor(scope, method, &r)?),
            RpcRequest::Commit(r) => RpcResponse::Commit(self.post_cbor(scope, method, &r)?),
        };
        Ok(response)
    }
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for exercising the full CBOR path without network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>, _timeout: Option<Duration>) -> Result<Vec<u8>, String> {
        let path = url.find("/v1/").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// A transport that never connects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl Invoker for Disconnected {
    fn invoke(&self, _scope: &RequestScope, _request: RpcRequest) -> RpcResult<RpcResponse> {
        Err(RpcError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::InvokerExt;
    use dsx_protocol::{
        to_cbor, Code, CommitRequest, CommitResponse, LookupRequest, LookupResponse,
        RunQueryRequest, RunQueryResponse,
    };
    use std::time::Instant;

    struct TestClient {
        response: RwLock<Option<Vec<u8>>>,
        healthy: AtomicBool,
        last_timeout: RwLock<Option<Duration>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                healthy: AtomicBool::new(true),
                last_timeout: RwLock::new(None),
            }
        }

        fn set_response(&self, resp: Vec<u8>) {
            *self.response.write() = Some(resp);
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    impl HttpClient for TestClient {
        fn post(&self, _url: &str, _body: Vec<u8>, timeout: Option<Duration>) -> Result<Vec<u8>, String> {
            *self.last_timeout.write() = timeout;
            self.response
                .read()
                .clone()
                .ok_or_else(|| "No response set".into())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    struct EmptyService;

    impl DatastoreService for EmptyService {
        fn lookup(&self, _request: LookupRequest) -> Result<LookupResponse, Status> {
            Ok(LookupResponse::default())
        }

        fn run_query(&self, _request: RunQueryRequest) -> Result<RunQueryResponse, Status> {
            Err(Status::new(Code::Unimplemented, "no queries"))
        }

        fn commit(&self, _request: CommitRequest) -> Result<CommitResponse, Status> {
            Ok(CommitResponse::default())
        }
    }

    fn lookup() -> LookupRequest {
        LookupRequest::new("demo", "(default)", vec![])
    }

    #[test]
    fn transport_creation() {
        let transport = HttpTransport::new("http://localhost:8081", TestClient::new());
        assert_eq!(transport.base_url(), "http://localhost:8081");
        assert!(transport.is_connected());
    }

    #[test]
    fn transport_not_connected_error() {
        let transport = HttpTransport::new("http://localhost:8081", TestClient::new());
        transport.close();
        let result = transport.lookup(&RequestScope::new(), lookup());
        assert!(matches!(result, Err(RpcError::NotConnected)));
    }

    #[test]
    fn transport_unhealthy_client() {
        let client = TestClient::new();
        client.set_healthy(false);
        let transport = HttpTransport::new("http://localhost:8081", client);
        assert!(!transport.is_connected());
    }

    #[test]
    fn transport_decodes_ok_reply() {
        let client = TestClient::new();
        let reply: Result<LookupResponse, Status> = Ok(LookupResponse {
            read_time: Some(42),
            ..LookupResponse::default()
        });
        client.set_response(to_cbor(&reply).unwrap());

        let transport = HttpTransport::new("http://localhost:8081", client);
        let response = transport.lookup(&RequestScope::new(), lookup()).unwrap();
        assert_eq!(response.read_time, Some(42));
        assert!(transport.last_error().is_none());
    }

    #[test]
    fn transport_surfaces_status() {
        let client = TestClient::new();
        let reply: Result<LookupResponse, Status> = Err(Status::invalid_argument("bad key"));
        client.set_response(to_cbor(&reply).unwrap());

        let transport = HttpTransport::new("http://localhost:8081", client);
        let err = transport.lookup(&RequestScope::new(), lookup()).unwrap_err();
        assert!(matches!(err, RpcError::Status(s) if s.code == Code::InvalidArgument));
    }

    #[test]
    fn transport_recovers_after_failure() {
        let transport = HttpTransport::new("http://localhost:8081", TestClient::new());
        let err = transport.lookup(&RequestScope::new(), lookup()).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("No response set"));
        assert!(transport.is_connected());

        let reply: Result<LookupResponse, Status> = Ok(LookupResponse::default());
        transport.client.set_response(to_cbor(&reply).unwrap());
        assert!(transport.lookup(&RequestScope::new(), lookup()).is_ok());
        assert!(transport.last_error().is_none());
    }

    #[test]
    fn transport_passes_remaining_deadline() {
        let client = TestClient::new();
        let reply: Result<LookupResponse, Status> = Ok(LookupResponse::default());
        client.set_response(to_cbor(&reply).unwrap());
        let transport = HttpTransport::new("http://localhost:8081", client);

        let scope = RequestScope::new().with_timeout(Duration::from_secs(30));
        transport.lookup(&scope, lookup()).unwrap();
        let timeout = (*transport.client.last_timeout.read()).unwrap();
        assert!(timeout <= Duration::from_secs(30));
        assert!(timeout > Duration::from_secs(20));
    }

    #[test]
    fn expired_scope_is_not_sent() {
        let transport = ServiceTransport::new(EmptyService);
        let scope = RequestScope::new().with_deadline(Instant::now());
        let result = transport.lookup(&scope, lookup());
        assert!(matches!(result, Err(RpcError::DeadlineExceeded)));
    }

    #[test]
    fn service_transport_maps_status() {
        let transport = ServiceTransport::new(EmptyService);
        assert!(transport.lookup(&RequestScope::new(), lookup()).is_ok());

        let query = RunQueryRequest {
            project_id: "demo".into(),
            database_id: "(default)".into(),
            partition_id: dsx_protocol::PartitionId::new("demo", "(default)"),
            query: dsx_protocol::Query::kind("Task"),
        };
        let err = transport.run_query(&RequestScope::new(), query).unwrap_err();
        assert!(matches!(err, RpcError::Status(s) if s.code == Code::Unimplemented));
    }

    #[test]
    fn disconnected_always_fails() {
        let result = Disconnected.lookup(&RequestScope::new(), lookup());
        assert!(matches!(result, Err(RpcError::NotConnected)));
    }
}
