//! Idempotency ledger for write operations
//!
//! Guards send/draft/reply/forward against duplicate execution. Each write
//! request carries a caller-chosen token; the ledger records the token as
//! PENDING while the operation is in flight and SUCCESS once it completes.
//! A failed attempt removes the entry, so the same token can be retried.
//!
//! The ledger is bounded: when it grows past capacity, the oldest entry by
//! insertion order is evicted regardless of state. Duplicate protection is
//! therefore advisory beyond the configured capacity.
//!
//! The guard itself is not synchronized; the server wraps it in a
//! `tokio::sync::Mutex` so check-and-insert and eviction run as one atomic
//! unit with respect to concurrent tool calls.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::errors::AppError;

/// Outcome of a rejected [`IdempotencyGuard::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The token is currently held by an in-flight operation
    #[error("a request with this idempotency token is currently being processed")]
    ConcurrentDuplicate,
    /// The token's operation already completed successfully
    #[error("this operation was already successfully processed; no action taken")]
    AlreadyProcessed,
}

impl From<AcquireError> for AppError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::ConcurrentDuplicate => Self::ConcurrentDuplicate(err.to_string()),
            AcquireError::AlreadyProcessed => Self::AlreadyProcessed(err.to_string()),
        }
    }
}

/// Ledger entry state
///
/// Entries only ever move PENDING → SUCCESS or PENDING → removed; there is
/// no failed terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    Pending,
    Success,
}

/// Bounded ledger of in-flight and completed write operations
///
/// Keys are opaque idempotency tokens chosen by the caller. The `order`
/// queue mirrors `states` exactly and determines eviction priority.
#[derive(Debug)]
pub struct IdempotencyGuard {
    capacity: usize,
    states: HashMap<String, TokenState>,
    order: VecDeque<String>,
}

impl IdempotencyGuard {
    /// Create a guard retaining at most `capacity` tokens
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            states: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Admit a write attempt for `token`
    ///
    /// Inserts a PENDING entry and evicts the oldest entry if the ledger is
    /// over capacity. Fails with [`AcquireError::ConcurrentDuplicate`] if the
    /// token is already in flight, or [`AcquireError::AlreadyProcessed`] if
    /// its operation already succeeded. On failure the existing entry is
    /// left untouched.
    pub fn acquire(&mut self, token: &str) -> Result<(), AcquireError> {
        match self.states.get(token) {
            Some(TokenState::Pending) => Err(AcquireError::ConcurrentDuplicate),
            Some(TokenState::Success) => Err(AcquireError::AlreadyProcessed),
            None => {
                self.states.insert(token.to_owned(), TokenState::Pending);
                self.order.push_back(token.to_owned());
                self.evict_overflow();
                Ok(())
            }
        }
    }

    /// Record that the operation behind `token` completed successfully
    ///
    /// Safe to call redundantly. If the entry was evicted while the
    /// operation was in flight, this is a no-op; the ledger never re-admits
    /// a token out of insertion order.
    pub fn mark_success(&mut self, token: &str) {
        if let Some(state) = self.states.get_mut(token) {
            *state = TokenState::Success;
        }
    }

    /// Remove the entry for `token`, making the token retryable
    ///
    /// Called when the underlying mail operation fails. Safe to call when no
    /// entry exists.
    pub fn mark_failed(&mut self, token: &str) {
        if self.states.remove(token).is_some() {
            self.order.retain(|t| t != token);
        }
    }

    /// Number of tokens currently tracked
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when no tokens are tracked
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Evict oldest entries until within capacity
    ///
    /// `order` holds exactly the live tokens ([`Self::mark_failed`] removes
    /// from both structures), so each popped token maps to a live entry.
    fn evict_overflow(&mut self) {
        while self.states.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.states.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::{AcquireError, IdempotencyGuard, TokenState};

    #[test]
    fn acquire_admits_unseen_token_as_pending() {
        let mut guard = IdempotencyGuard::new(500);
        guard.acquire("tok-1").expect("first acquire must succeed");
        assert_eq!(guard.states.get("tok-1"), Some(&TokenState::Pending));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn second_acquire_on_pending_token_is_conflict() {
        let mut guard = IdempotencyGuard::new(500);
        guard.acquire("tok-1").expect("first acquire must succeed");
        let err = guard.acquire("tok-1").expect_err("duplicate must fail");
        assert_eq!(err, AcquireError::ConcurrentDuplicate);
        // the original entry must be untouched
        assert_eq!(guard.states.get("tok-1"), Some(&TokenState::Pending));
    }

    #[test]
    fn acquire_after_success_reports_already_processed() {
        let mut guard = IdempotencyGuard::new(500);
        guard.acquire("tok-1").expect("first acquire must succeed");
        guard.mark_success("tok-1");
        let err = guard.acquire("tok-1").expect_err("replay must fail");
        assert_eq!(err, AcquireError::AlreadyProcessed);
    }

    #[test]
    fn mark_failed_makes_token_retryable() {
        let mut guard = IdempotencyGuard::new(500);
        guard.acquire("tok-1").expect("first acquire must succeed");
        guard.mark_failed("tok-1");
        assert!(guard.is_empty());
        guard
            .acquire("tok-1")
            .expect("retry after failure must succeed");
        assert_eq!(guard.states.get("tok-1"), Some(&TokenState::Pending));
    }

    #[test]
    fn mark_success_and_mark_failed_are_noop_safe() {
        let mut guard = IdempotencyGuard::new(500);
        guard.mark_success("never-seen");
        guard.mark_failed("never-seen");
        assert!(guard.is_empty());

        guard.acquire("tok-1").expect("acquire must succeed");
        guard.mark_success("tok-1");
        guard.mark_success("tok-1");
        assert_eq!(guard.states.get("tok-1"), Some(&TokenState::Success));
    }

    #[test]
    fn evicts_oldest_token_regardless_of_state() {
        let capacity = 5;
        let mut guard = IdempotencyGuard::new(capacity);
        for i in 1..=capacity {
            guard
                .acquire(&format!("tok-{i}"))
                .expect("acquire must succeed");
        }
        guard.mark_success("tok-1");

        guard.acquire("tok-6").expect("acquire must succeed");
        assert_eq!(guard.len(), capacity);
        assert!(!guard.states.contains_key("tok-1"));
        assert!(guard.states.contains_key("tok-2"));
        assert!(guard.states.contains_key("tok-6"));

        // evicted token is admitted fresh, not treated as a replay
        guard.acquire("tok-1").expect("evicted token is unseen again");
    }

    #[test]
    fn eviction_skips_nothing_after_failures() {
        let mut guard = IdempotencyGuard::new(2);
        guard.acquire("a").expect("acquire must succeed");
        guard.acquire("b").expect("acquire must succeed");
        guard.mark_failed("a");
        guard.acquire("c").expect("acquire must succeed");
        guard.acquire("d").expect("acquire must succeed");

        // "a" left both structures on failure, so "b" is the eviction victim
        assert!(!guard.states.contains_key("b"));
        assert!(guard.states.contains_key("c"));
        assert!(guard.states.contains_key("d"));
    }

    #[test]
    fn full_write_lifecycle() {
        let mut guard = IdempotencyGuard::new(500);
        guard.acquire("tok-1").expect("admitted");
        assert_eq!(
            guard.acquire("tok-1").expect_err("in flight"),
            AcquireError::ConcurrentDuplicate
        );
        guard.mark_success("tok-1");
        assert_eq!(
            guard.acquire("tok-1").expect_err("completed"),
            AcquireError::AlreadyProcessed
        );
    }

    #[tokio::test]
    async fn concurrent_acquires_admit_exactly_one() {
        let guard = Arc::new(Mutex::new(IdempotencyGuard::new(500)));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let guard = Arc::clone(&guard);
            handles.push(tokio::spawn(async move {
                guard.lock().await.acquire("shared-token").is_ok()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.expect("task must not panic") {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }
}
