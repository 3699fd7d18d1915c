//! Scoped acquisition with guaranteed release.
//!
//! Shard search contexts and intermediate fetch results are reference counted
//! resources. Each acquisition hands out a [`TrackedResource`] guard that
//! gives its reference back exactly once, either through an explicit
//! [`TrackedResource::release`] or when the guard is dropped. Dropping covers
//! every exit path: early returns, `?` propagation, panics unwinding through
//! the owner and futures being dropped on cancellation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct TrackerInner {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Counts acquisitions and releases of one kind of resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    inner: Arc<TrackerInner>,
}

impl ResourceTracker {
    /// Create a new tracker with no outstanding resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire one reference and return the guard that will give it back.
    pub fn acquire(&self) -> TrackedResource {
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        TrackedResource {
            tracker: Some(Arc::clone(&self.inner)),
        }
    }

    /// Number of references handed out and not yet released.
    pub fn outstanding(&self) -> u64 {
        let acquired = self.inner.acquired.load(Ordering::SeqCst);
        let released = self.inner.released.load(Ordering::SeqCst);
        acquired.saturating_sub(released)
    }

    /// Total number of acquisitions.
    pub fn acquired(&self) -> u64 {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    /// Total number of releases.
    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::SeqCst)
    }
}

/// Guard for one acquired reference.
pub struct TrackedResource {
    tracker: Option<Arc<TrackerInner>>,
}

impl TrackedResource {
    /// Give the reference back. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.tracker.take() {
            Some(inner) => {
                inner.released.fetch_add(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Whether the reference has already been given back.
    pub fn is_released(&self) -> bool {
        self.tracker.is_none()
    }
}

impl Drop for TrackedResource {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for TrackedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedResource")
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_on_drop() {
        let tracker = ResourceTracker::new();
        {
            let _a = tracker.acquire();
            let _b = tracker.acquire();
            assert_eq!(tracker.outstanding(), 2);
        }
        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(tracker.acquired(), 2);
        assert_eq!(tracker.released(), 2);
    }

    #[test]
    fn test_explicit_release_is_counted_once() {
        let tracker = ResourceTracker::new();
        let mut guard = tracker.acquire();

        assert!(guard.release());
        assert!(!guard.release());
        assert!(guard.is_released());
        drop(guard);

        assert_eq!(tracker.released(), 1);
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn test_release_on_error_path() {
        fn failing(tracker: &ResourceTracker) -> std::result::Result<(), String> {
            let _guard = tracker.acquire();
            Err("read failed".to_string())?;
            Ok(())
        }

        let tracker = ResourceTracker::new();
        assert!(failing(&tracker).is_err());
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn test_release_on_panic() {
        let tracker = ResourceTracker::new();
        let cloned = tracker.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = cloned.acquire();
            panic!("extractor panicked");
        });

        assert!(result.is_err());
        assert_eq!(tracker.outstanding(), 0);
    }
}
