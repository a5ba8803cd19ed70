//! Call-path middleware.
//!
//! Every RPC goes through an [`Invoker`]. An [`Interceptor`] wraps an invoker
//! with [`Intercepted`] to observe or alter calls; the
//! [`RecordingInterceptor`] feeds read responses into the scope's recorder.

use crate::error::{RpcError, RpcResult};
use crate::scope::RequestScope;
use dsx_protocol::{
    CommitRequest, CommitResponse, LookupRequest, LookupResponse, Method, RunQueryRequest,
    RunQueryResponse,
};
use std::sync::Arc;
use tracing::trace;

/// A request to the datastore.
#[derive(Debug, Clone)]
pub enum RpcRequest {
    /// Lookup request.
    Lookup(LookupRequest),
    /// Query request.
    RunQuery(RunQueryRequest),
    /// Commit request.
    Commit(CommitRequest),
}

impl RpcRequest {
    /// Method this request calls.
    pub fn method(&self) -> Method {
        match self {
            RpcRequest::Lookup(_) => Method::Lookup,
            RpcRequest::RunQuery(_) => Method::RunQuery,
            RpcRequest::Commit(_) => Method::Commit,
        }
    }
}

/// A response from the datastore.
#[derive(Debug, Clone)]
pub enum RpcResponse {
    /// Lookup response.
    Lookup(LookupResponse),
    /// Query response.
    RunQuery(RunQueryResponse),
    /// Commit response.
    Commit(CommitResponse),
}

/// Performs one unary call.
pub trait Invoker: Send + Sync {
    /// Sends `request` and waits for the response.
    fn invoke(&self, scope: &RequestScope, request: RpcRequest) -> RpcResult<RpcResponse>;
}

impl<T: Invoker + ?Sized> Invoker for Arc<T> {
    fn invoke(&self, scope: &RequestScope, request: RpcRequest) -> RpcResult<RpcResponse> {
        (**self).invoke(scope, request)
    }
}

/// Typed helpers over [`Invoker::invoke`].
pub trait InvokerExt: Invoker {
    /// Calls `Lookup`.
    fn lookup(&self, scope: &RequestScope, request: LookupRequest) -> RpcResult<LookupResponse> {
        match self.invoke(scope, RpcRequest::Lookup(request))? {
            RpcResponse::Lookup(response) => Ok(response),
            _ => Err(RpcError::UnexpectedResponse { method: "lookup" }),
        }
    }

    /// Calls `RunQuery`.
    fn run_query(
        &self,
        scope: &RequestScope,
        request: RunQueryRequest,
    ) -> RpcResult<RunQueryResponse> {
        match self.invoke(scope, RpcRequest::RunQuery(request))? {
            RpcResponse::RunQuery(response) => Ok(response),
            _ => Err(RpcError::UnexpectedResponse { method: "runQuery" }),
        }
    }

    /// Calls `Commit`.
    fn commit(&self, scope: &RequestScope, request: CommitRequest) -> RpcResult<CommitResponse> {
        match self.invoke(scope, RpcRequest::Commit(request))? {
            RpcResponse::Commit(response) => Ok(response),
            _ => Err(RpcError::UnexpectedResponse { method: "commit" }),
        }
    }
}

impl<T: Invoker + ?Sized> InvokerExt for T {}

/// Middleware around an [`Invoker`].
pub trait Interceptor: Send + Sync {
    /// Handles `request`, normally by delegating to `next`.
    fn intercept(
        &self,
        scope: &RequestScope,
        request: RpcRequest,
        next: &dyn Invoker,
    ) -> RpcResult<RpcResponse>;
}

impl<T: Interceptor + ?Sized> Interceptor for Arc<T> {
    fn intercept(
        &self,
        scope: &RequestScope,
        request: RpcRequest,
        next: &dyn Invoker,
    ) -> RpcResult<RpcResponse> {
        (**self).intercept(scope, request, next)
    }
}

/// An invoker wrapped by an interceptor.
pub struct Intercepted<I, X> {
    inner: I,
    interceptor: X,
}

impl<I: Invoker, X: Interceptor> Intercepted<I, X> {
    /// Wraps `inner` with `interceptor`.
    pub fn new(inner: I, interceptor: X) -> Self {
        Self { inner, interceptor }
    }
}

impl<I: Invoker, X: Interceptor> Invoker for Intercepted<I, X> {
    fn invoke(&self, scope: &RequestScope, request: RpcRequest) -> RpcResult<RpcResponse> {
        self.interceptor.intercept(scope, request, &self.inner)
    }
}

/// Records entities returned by `Lookup` and `RunQuery` into the scope's recorder.
///
/// Calls made with a scope that has no recorder pass straight through.
/// Errors and write responses are never inspected or altered.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingInterceptor;

impl RecordingInterceptor {
    /// Creates a recording interceptor.
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for RecordingInterceptor {
    fn intercept(
        &self,
        scope: &RequestScope,
        request: RpcRequest,
        next: &dyn Invoker,
    ) -> RpcResult<RpcResponse> {
        let response = next.invoke(scope, request)?;

        let Some(recorder) = scope.recorder() else {
            return Ok(response);
        };

        match &response {
            RpcResponse::Lookup(lookup) => {
                trace!(found = lookup.found.len(), "recording lookup results");
                recorder.record(&lookup.found);
            }
            RpcResponse::RunQuery(query) => {
                trace!(
                    results = query.batch.entity_results.len(),
                    "recording query results"
                );
                recorder.record(&query.batch.entity_results);
            }
            RpcResponse::Commit(_) => {}
        }
        Ok(response)
    }
}
