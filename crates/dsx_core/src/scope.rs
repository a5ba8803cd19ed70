//! Request scope passed explicitly through every call.
//!
//! A [`RequestScope`] carries the per-request state the core needs: the
//! optional [`Recorder`], an optional deadline and an optional cancellation
//! flag. Scopes are cheap to clone; clones share the same recorder.

use crate::error::{RpcError, RpcResult};
use crate::recorder::Recorder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-request call scope.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    recorder: Option<Arc<Recorder>>,
    deadline: Option<Instant>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl RequestScope {
    /// Creates a scope with no recorder, deadline or cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorder attached to this scope.
    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_deref()
    }

    /// Returns a scope that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a scope with the given deadline. An earlier existing deadline wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    /// Returns a cancellable scope and the handle that cancels it.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let scope = Self {
            cancelled: Some(Arc::clone(&flag)),
            ..self.clone()
        };
        (scope, CancelHandle { flag })
    }

    /// Deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns an error if the scope is cancelled or past its deadline.
    pub fn check(&self) -> RpcResult<()> {
        if self
            .cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Err(RpcError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(RpcError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Cancels the scope it was created with, and every scope derived from it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancels the scope.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Attaches a fresh, empty recorder to a copy of `scope`.
///
/// Returns the derived scope and the recorder handle. Reads made with the
/// derived scope through a client carrying the recording interceptor are
/// captured in the recorder.
pub fn with_recorder(scope: &RequestScope) -> (RequestScope, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::new());
    let scope = RequestScope {
        recorder: Some(Arc::clone(&recorder)),
        ..scope.clone()
    };
    (scope, recorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_scope_has_no_recorder() {
        let scope = RequestScope::new();
        assert!(scope.recorder().is_none());
        assert!(scope.check().is_ok());
        assert!(scope.remaining().is_none());
    }

    #[test]
    fn with_recorder_attaches_fresh_recorder() {
        let base = RequestScope::new();
        let (scope, recorder) = with_recorder(&base);
        assert!(base.recorder().is_none());
        assert!(std::ptr::eq(scope.recorder().unwrap(), recorder.as_ref()));
        assert!(recorder.is_empty());

        let (other, other_recorder) = with_recorder(&scope);
        assert!(!Arc::ptr_eq(&recorder, &other_recorder));
        assert!(std::ptr::eq(other.recorder().unwrap(), other_recorder.as_ref()));
    }

    #[test]
    fn expired_deadline() {
        let scope = RequestScope::new().with_deadline(Instant::now());
        assert!(matches!(scope.check(), Err(RpcError::DeadlineExceeded)));
        assert_eq!(scope.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn earlier_deadline_wins() {
        let early = Instant::now() + Duration::from_secs(1);
        let scope = RequestScope::new()
            .with_deadline(early)
            .with_timeout(Duration::from_secs(60));
        assert_eq!(scope.deadline(), Some(early));
    }

    #[test]
    fn cancellation_reaches_derived_scopes() {
        let (scope, handle) = RequestScope::new().with_cancel();
        let (derived, _recorder) = with_recorder(&scope);
        assert!(derived.check().is_ok());

        handle.cancel();
        assert!(matches!(scope.check(), Err(RpcError::Cancelled)));
        assert!(matches!(derived.check(), Err(RpcError::Cancelled)));
    }
}
