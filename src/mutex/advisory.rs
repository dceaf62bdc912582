//! Database advisory-lock backend.
//!
//! # Responsibilities
//! - Delegate locking to a relational database's named-lock primitives
//!   (the `GET_LOCK` / `RELEASE_LOCK` shape)
//!
//! # Design Decisions
//! - Generic over an [`AdvisorySession`] the application implements on top
//!   of its own database driver; this crate carries no driver of its own
//! - Locks are session-scoped: the database releases them automatically
//!   when the connection closes
//! - Known caveat, preserved deliberately: two `try_lock` calls through the
//!   SAME session both "succeed" for the same name, because the database
//!   treats the session as already holding the lock. This backend is mutual
//!   exclusion between sessions, not within one

use async_trait::async_trait;

use crate::mutex::{LockBackend, LockError};

/// The scalar-query surface a database connection must expose.
#[async_trait]
pub trait AdvisorySession: Send + Sync {
    /// `SELECT GET_LOCK(name, 0)` equivalent: a single non-blocking
    /// acquisition attempt. Returns true if the session now holds the lock.
    async fn acquire(&self, name: &str) -> Result<bool, LockError>;

    /// `SELECT RELEASE_LOCK(name)` equivalent. Returns true if a lock held
    /// by this session was released.
    async fn release(&self, name: &str) -> Result<bool, LockError>;
}

/// Lock backend delegating to a database session's advisory locks.
pub struct AdvisoryLock<S> {
    session: S,
}

impl<S: AdvisorySession> AdvisoryLock<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S> std::fmt::Debug for AdvisoryLock<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisoryLock").finish()
    }
}

#[async_trait]
impl<S: AdvisorySession> LockBackend for AdvisoryLock<S> {
    async fn try_lock(&self, name: &str) -> Result<bool, LockError> {
        self.session.acquire(name).await
    }

    async fn unlock(&self, name: &str) -> Result<bool, LockError> {
        self.session.release(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// In-memory stand-in for a database's named-lock table. Lock ownership
    /// is per session ID, mirroring session-scoped advisory locks.
    #[derive(Default)]
    struct FakeLockServer {
        locks: PlMutex<HashMap<String, u32>>,
    }

    struct FakeSession {
        server: Arc<FakeLockServer>,
        session_id: u32,
    }

    #[async_trait]
    impl AdvisorySession for FakeSession {
        async fn acquire(&self, name: &str) -> Result<bool, LockError> {
            let mut locks = self.server.locks.lock();
            match locks.get(name) {
                // Same-session re-acquire "succeeds": the documented caveat.
                Some(&owner) => Ok(owner == self.session_id),
                None => {
                    locks.insert(name.to_string(), self.session_id);
                    Ok(true)
                }
            }
        }

        async fn release(&self, name: &str) -> Result<bool, LockError> {
            let mut locks = self.server.locks.lock();
            if locks.get(name) == Some(&self.session_id) {
                locks.remove(name);
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    fn sessions() -> (AdvisoryLock<FakeSession>, AdvisoryLock<FakeSession>) {
        let server = Arc::new(FakeLockServer::default());
        (
            AdvisoryLock::new(FakeSession {
                server: server.clone(),
                session_id: 1,
            }),
            AdvisoryLock::new(FakeSession {
                server,
                session_id: 2,
            }),
        )
    }

    #[tokio::test]
    async fn test_exclusive_between_sessions() {
        let (a, b) = sessions();
        assert!(a.try_lock("job").await.unwrap());
        assert!(!b.try_lock("job").await.unwrap());
        assert!(a.unlock("job").await.unwrap());
        assert!(b.try_lock("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_session_reacquire_succeeds() {
        let (a, _) = sessions();
        assert!(a.try_lock("job").await.unwrap());
        // Documented caveat: not mutual exclusion against itself.
        assert!(a.try_lock("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_release_of_foreign_lock_fails() {
        let (a, b) = sessions();
        assert!(a.try_lock("job").await.unwrap());
        assert!(!b.unlock("job").await.unwrap());
    }
}
