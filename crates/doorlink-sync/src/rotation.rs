//! Refresh-token rotation detection and persistence.
//!
//! The remote account API rotates the refresh token at its own discretion
//! and surfaces the new value inside the opaque session handle. Losing a
//! rotated token strands the account until the user re-authenticates, so
//! every rotation must reach durable storage before the watcher considers
//! it handled.
//!
//! Detection is pure and cheap; it runs after every remote call. The
//! watcher serializes persistence so concurrent observers of the same
//! rotation produce exactly one durable write.

use doorlink_core::SessionHandle;
use doorlink_store::CredentialRepository;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Result of comparing a session handle against the known token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationResult {
    /// The handle carries the token we already know, or no token at all.
    Unchanged,

    /// The handle carries a new token.
    Rotated { token: String },
}

/// Constant-time token comparison.
///
/// Refresh tokens are secrets; comparing them byte-by-byte with early exit
/// would leak prefix length through timing.
fn tokens_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Compare a session handle against the currently known refresh token.
///
/// A handle without a token (missing key, non-string, empty string) is
/// reported as [`RotationResult::Unchanged`]; malformed handles never
/// interrupt door operation.
#[must_use]
pub fn detect(current_token: &str, handle: &SessionHandle) -> RotationResult {
    match handle.refresh_token() {
        Some(token) if !tokens_equal(current_token, token) => RotationResult::Rotated {
            token: token.to_string(),
        },
        _ => RotationResult::Unchanged,
    }
}

/// Outcome of one rotation observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// No rotation, or another observer already persisted this token.
    Unchanged,

    /// A rotated token was durably persisted by this observation.
    Persisted,

    /// A rotation was detected but persistence failed; the known token was
    /// not advanced, so the next observation retries.
    Failed,
}

/// Tracks the known refresh token for one account and persists rotations.
///
/// Shared by every update path on the account (poll tasks, push
/// reconciliation, commands). The fast path is a read lock and a
/// constant-time comparison; the write lock is only taken when a rotation
/// is actually in front of us.
#[derive(Debug)]
pub struct RotationWatcher<R> {
    account_id: String,
    current: RwLock<String>,
    repository: R,
}

impl<R: CredentialRepository> RotationWatcher<R> {
    /// Create a watcher seeded with the token the session was created from.
    pub fn new(account_id: impl Into<String>, initial_token: impl Into<String>, repository: R) -> Self {
        Self {
            account_id: account_id.into(),
            current: RwLock::new(initial_token.into()),
            repository,
        }
    }

    /// The token this watcher currently considers authoritative.
    pub async fn current_token(&self) -> String {
        self.current.read().await.clone()
    }

    /// Inspect a session handle snapshot and persist any rotation it carries.
    ///
    /// Errors from the store are absorbed: the token is not advanced, a
    /// warning is logged, and the caller's operation continues unaffected.
    /// The next observation of the same handle retries the write.
    pub async fn observe(&self, handle: &SessionHandle) -> RotationOutcome {
        // Read-mostly fast path; no contention with sibling observers.
        {
            let current = self.current.read().await;
            if detect(&current, handle) == RotationResult::Unchanged {
                return RotationOutcome::Unchanged;
            }
        }

        let mut current = self.current.write().await;

        // Re-check under the write lock: a sibling observer may have
        // persisted this exact rotation while we waited.
        let token = match detect(&current, handle) {
            RotationResult::Unchanged => return RotationOutcome::Unchanged,
            RotationResult::Rotated { token } => token,
        };

        match self
            .repository
            .persist_rotation(&self.account_id, &token, handle)
            .await
        {
            Ok(written) => {
                if written {
                    info!(account_id = %self.account_id, "persisted rotated refresh token");
                } else {
                    // Another process already holds this token; nothing to do.
                    debug!(account_id = %self.account_id, "rotation already persisted");
                }
                *current = token;
                RotationOutcome::Persisted
            }
            Err(e) => {
                warn!(
                    account_id = %self.account_id,
                    error = %e,
                    "failed to persist rotated refresh token, will retry"
                );
                RotationOutcome::Failed
            }
        }
    }

    /// Access the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorlink_store::{CredentialRecord, StoreError, StoreResult};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn handle_with(token: &str) -> SessionHandle {
        let mut handle = SessionHandle::new();
        handle.insert("refresh_token", token);
        handle
    }

    #[test]
    fn test_detect_unchanged() {
        assert_eq!(detect("tok-A", &handle_with("tok-A")), RotationResult::Unchanged);
    }

    #[test]
    fn test_detect_rotated() {
        assert_eq!(
            detect("tok-A", &handle_with("tok-B")),
            RotationResult::Rotated {
                token: "tok-B".to_string()
            }
        );
    }

    #[test]
    fn test_detect_missing_token_is_unchanged() {
        assert_eq!(detect("tok-A", &SessionHandle::new()), RotationResult::Unchanged);
    }

    #[test]
    fn test_detect_empty_token_is_unchanged() {
        assert_eq!(detect("tok-A", &handle_with("")), RotationResult::Unchanged);
    }

    /// In-memory repository with failure injection.
    #[derive(Debug, Default)]
    struct RecordingRepository {
        persisted: Mutex<Vec<String>>,
        writes: AtomicUsize,
        fail: AtomicBool,
    }

    impl CredentialRepository for &RecordingRepository {
        async fn find_by_account(&self, _account_id: &str) -> StoreResult<Option<CredentialRecord>> {
            Ok(None)
        }

        async fn insert(&self, _record: &CredentialRecord) -> StoreResult<()> {
            Ok(())
        }

        async fn persist_rotation(
            &self,
            _account_id: &str,
            new_token: &str,
            _handle: &SessionHandle,
        ) -> StoreResult<bool> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Configuration("injected failure".to_string()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.persisted.lock().unwrap().push(new_token.to_string());
            Ok(true)
        }

        async fn delete(&self, _account_id: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_observe_unchanged_touches_nothing() {
        let repo = RecordingRepository::default();
        let watcher = RotationWatcher::new("acct-1", "tok-A", &repo);

        let outcome = watcher.observe(&handle_with("tok-A")).await;
        assert_eq!(outcome, RotationOutcome::Unchanged);
        assert_eq!(repo.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_observe_persists_rotation_once() {
        let repo = RecordingRepository::default();
        let watcher = RotationWatcher::new("acct-1", "tok-A", &repo);

        assert_eq!(
            watcher.observe(&handle_with("tok-B")).await,
            RotationOutcome::Persisted
        );
        assert_eq!(watcher.current_token().await, "tok-B");

        // Observing the same handle again is a no-op.
        assert_eq!(
            watcher.observe(&handle_with("tok-B")).await,
            RotationOutcome::Unchanged
        );
        assert_eq!(repo.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observe_retries_after_store_failure() {
        let repo = RecordingRepository::default();
        let watcher = RotationWatcher::new("acct-1", "tok-A", &repo);

        repo.fail.store(true, Ordering::SeqCst);
        assert_eq!(
            watcher.observe(&handle_with("tok-B")).await,
            RotationOutcome::Failed
        );
        // Token did not advance past the failed write.
        assert_eq!(watcher.current_token().await, "tok-A");

        repo.fail.store(false, Ordering::SeqCst);
        assert_eq!(
            watcher.observe(&handle_with("tok-B")).await,
            RotationOutcome::Persisted
        );
        assert_eq!(watcher.current_token().await, "tok-B");
        assert_eq!(repo.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_observers_write_once() {
        let repo = RecordingRepository::default();
        let watcher = std::sync::Arc::new(RotationWatcher::new("acct-1", "tok-A", &repo));

        // The write lock serializes concurrent observers of the same
        // rotation; the re-check under the lock turns all but the first
        // into no-ops.
        let handle = handle_with("tok-B");
        let first = watcher.observe(&handle);
        let second = watcher.observe(&handle);
        let (a, b) = tokio::join!(first, second);

        let persisted = [a, b]
            .iter()
            .filter(|o| **o == RotationOutcome::Persisted)
            .count();
        assert_eq!(persisted, 1);
        assert_eq!(repo.writes.load(Ordering::SeqCst), 1);
    }
}
