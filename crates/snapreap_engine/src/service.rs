//! The live namespace service as seen by the deletion engine.

use crate::error::ServiceResult;
use std::ops::Deref;
use std::sync::Arc;
use tracing::warn;

/// A connected handle to the live namespace service.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (the wire client, an in-memory tree for testing, etc.).
/// Connecting is done by the implementation's constructor, which returns
/// only once the session is ready.
pub trait NamespaceService: Send + Sync {
    /// Deletes `path` if its live version equals `expected_version`.
    ///
    /// # Errors
    ///
    /// - `NoNode` if the path is already gone
    /// - `BadVersion` if the live version differs
    /// - `NotEmpty` if the node has live children
    /// - transport errors, some of which are retryable
    fn delete(&self, path: &str, expected_version: i32) -> ServiceResult<()>;

    /// Checks if the handle is connected.
    fn is_connected(&self) -> bool;

    /// Releases the session.
    fn close(&self) -> ServiceResult<()>;
}

impl<T: NamespaceService + ?Sized> NamespaceService for Arc<T> {
    fn delete(&self, path: &str, expected_version: i32) -> ServiceResult<()> {
        (**self).delete(path, expected_version)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn close(&self) -> ServiceResult<()> {
        (**self).close()
    }
}

/// Owns a connected service and closes it exactly once.
///
/// Closing happens through [`ServiceGuard::close`] when the caller wants the
/// result, or on drop on every other exit path.
#[derive(Debug)]
pub struct ServiceGuard<S: NamespaceService> {
    service: S,
    closed: bool,
}

impl<S: NamespaceService> ServiceGuard<S> {
    /// Takes ownership of a connected service.
    pub fn new(service: S) -> Self {
        Self {
            service,
            closed: false,
        }
    }

    /// Closes the service and reports the outcome.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying `close`.
    pub fn close(mut self) -> ServiceResult<()> {
        self.closed = true;
        self.service.close()
    }
}

impl<S: NamespaceService> Deref for ServiceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.service
    }
}

impl<S: NamespaceService> Drop for ServiceGuard<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.service.close() {
            warn!(error = %e, "failed to close service session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryService;

    #[test]
    fn guard_closes_on_drop() {
        let service = Arc::new(MemoryService::new());
        {
            let guard = ServiceGuard::new(Arc::clone(&service));
            assert!(guard.is_connected());
        }
        assert_eq!(service.close_count(), 1);
        assert!(!service.is_connected());
    }

    #[test]
    fn explicit_close_is_not_repeated() {
        let service = Arc::new(MemoryService::new());
        let guard = ServiceGuard::new(Arc::clone(&service));
        guard.close().unwrap();
        assert_eq!(service.close_count(), 1);
    }

    #[test]
    fn guard_closes_on_early_return() {
        fn fails_after_connect(service: Arc<MemoryService>) -> Result<(), String> {
            let _guard = ServiceGuard::new(service);
            Err("snapshot failed to load".into())
        }

        let service = Arc::new(MemoryService::new());
        assert!(fails_after_connect(Arc::clone(&service)).is_err());
        assert_eq!(service.close_count(), 1);
    }
}
