//! Per-invocation call context
//!
//! Every handler receives a [`CallContext`]. It carries the cancellation
//! token of the connection the request arrived on, an optional deadline, and
//! enough request identity for handlers to log with. The engine never acts
//! on either signal itself: a handler that ignores them keeps running.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wirecall_core::Id;

/// Context handed to a handler for a single request
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    request_id: Id,
    method: String,
    conn_id: u64,
}

impl CallContext {
    pub fn new(
        cancel: CancellationToken,
        deadline: Option<Instant>,
        request_id: Id,
        method: impl Into<String>,
        conn_id: u64,
    ) -> Self {
        Self {
            cancel,
            deadline,
            request_id,
            method: method.into(),
            conn_id,
        }
    }

    /// A context with a fresh token and no deadline, for calling handlers
    /// outside a connection (tests, local invocation).
    pub fn detached(request_id: Id, method: impl Into<String>) -> Self {
        Self::new(CancellationToken::new(), None, request_id, method, 0)
    }

    pub fn request_id(&self) -> &Id {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection's token is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` without a deadline, zero once
    /// it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Resolves when the context is cancelled or its deadline passes,
    /// whichever comes first.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detached_context() {
        let ctx = CallContext::detached(Id::Number(7), "ping");
        assert_eq!(ctx.request_id(), &Id::Number(7));
        assert_eq!(ctx.method(), "ping");
        assert!(!ctx.is_cancelled());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_expired());
    }

    #[tokio::test]
    async fn test_done_on_cancel() {
        let token = CancellationToken::new();
        let ctx = CallContext::new(token.clone(), None, Id::Null, "slow", 1);
        token.cancel();
        ctx.done().await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_on_deadline() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let ctx = CallContext::new(CancellationToken::new(), Some(deadline), Id::Null, "slow", 1);
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(5)));

        ctx.done().await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert!(!ctx.is_cancelled());
    }
}
