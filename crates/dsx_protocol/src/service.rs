//! Service-side interface of the datastore protocol.

use crate::codec::{to_cbor, WireMessage};
use crate::error::Status;
use crate::messages::{
    CommitRequest, CommitResponse, LookupRequest, LookupResponse, Method, RunQueryRequest,
    RunQueryResponse,
};
use std::sync::Arc;

/// A datastore that serves the three protocol methods.
///
/// Implemented by the in-memory emulator; clients reach it either directly
/// (loopback) or through an HTTP transport.
pub trait DatastoreService: Send + Sync {
    /// Reads entities by key.
    fn lookup(&self, request: LookupRequest) -> Result<LookupResponse, Status>;

    /// Runs a query.
    fn run_query(&self, request: RunQueryRequest) -> Result<RunQueryResponse, Status>;

    /// Applies mutations.
    fn commit(&self, request: CommitRequest) -> Result<CommitResponse, Status>;
}

impl<S: DatastoreService + ?Sized> DatastoreService for Arc<S> {
    fn lookup(&self, request: LookupRequest) -> Result<LookupResponse, Status> {
        (**self).lookup(request)
    }

    fn run_query(&self, request: RunQueryRequest) -> Result<RunQueryResponse, Status> {
        (**self).run_query(request)
    }

    fn commit(&self, request: CommitRequest) -> Result<CommitResponse, Status> {
        (**self).commit(request)
    }
}

/// Trait for servers that can handle raw HTTP POST bodies.
pub trait LoopbackServer {
    /// Handles a POST request and returns the response body.
    ///
    /// The body is the CBOR encoding of `Result<Response, Status>`. An `Err`
    /// is a transport-level failure (unknown path, undecodable request).
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        (**self).handle_post(path, body)
    }
}

/// Decodes a request for `path`, dispatches it to `service` and encodes the reply.
pub fn route_post<S: DatastoreService + ?Sized>(
    service: &S,
    path: &str,
    body: &[u8],
) -> Result<Vec<u8>, String> {
    let method = Method::from_path(path).ok_or_else(|| format!("unknown path: {}", path))?;
    let encoded = match method {
        Method::Lookup => {
            let request = LookupRequest::decode(body).map_err(|e| e.to_string())?;
            to_cbor(&service.lookup(request))
        }
        Method::RunQuery => {
            let request = RunQueryRequest::decode(body).map_err(|e| e.to_string())?;
            to_cbor(&service.run_query(request))
        }
        Method::Commit => {
            let request = CommitRequest::decode(body).map_err(|e| e.to_string())?;
            to_cbor(&service.commit(request))
        }
    };
    encoded.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::from_cbor;
    use crate::error::Code;

    struct Unavailable;

    impl DatastoreService for Unavailable {
        fn lookup(&self, _request: LookupRequest) -> Result<LookupResponse, Status> {
            Ok(LookupResponse::default())
        }

        fn run_query(&self, _request: RunQueryRequest) -> Result<RunQueryResponse, Status> {
            Err(Status::new(Code::Unimplemented, "queries disabled"))
        }

        fn commit(&self, _request: CommitRequest) -> Result<CommitResponse, Status> {
            Err(Status::new(Code::Unavailable, "read only"))
        }
    }

    #[test]
    fn routes_by_path() {
        let request = LookupRequest::new("p", "(default)", vec![]);
        let body = route_post(&Unavailable, Method::Lookup.path(), &request.encode().unwrap())
            .unwrap();
        let reply: Result<LookupResponse, Status> = from_cbor(&body).unwrap();
        assert_eq!(reply, Ok(LookupResponse::default()));
    }

    #[test]
    fn status_is_encoded_in_body() {
        let request = CommitRequest::non_transactional("p", "(default)", vec![]);
        let body = route_post(&Unavailable, Method::Commit.path(), &request.encode().unwrap())
            .unwrap();
        let reply: Result<CommitResponse, Status> = from_cbor(&body).unwrap();
        assert_eq!(reply.unwrap_err().code, Code::Unavailable);
    }

    #[test]
    fn unknown_path_and_bad_body() {
        assert!(route_post(&Unavailable, "/v1/allocateIds", &[]).is_err());
        assert!(route_post(&Unavailable, Method::Commit.path(), &[0xff]).is_err());
    }
}
