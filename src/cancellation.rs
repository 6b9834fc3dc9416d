//! Cooperative cancellation.
//!
//! A [`CancellationSignal`] is threaded through every middleware and the
//! terminal handler. Nothing in the chain acts on it; each layer decides
//! whether and when to look. Children let a layer narrow the signal (for
//! example to add a deadline) without being able to cancel the caller's.
//!
//! ```text
//! caller signal ──cancel──▶ child (timeout) ──cancel──▶ grandchild …
//!        ▲                        │
//!        └──── never ─────────────┘   cancelling a child leaves its parent alone
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::Error;

// Parents hold their children weakly and children hold their parent
// strongly, so a dropped intermediate signal never cuts a descendant off
// from the root.
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<Inner>>>,
    _parent: Option<Arc<Inner>>,
}

impl Inner {
    fn new(parent: Option<Arc<Inner>>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
            _parent: parent,
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// A cloneable, shareable cancellation flag.
///
/// Clones observe the same state. Cancelling is idempotent.
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self { inner: Arc::new(Inner::new(None)) }
    }

    /// Marks this signal and every child as cancelled and wakes all waiters.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Error::Cancelled)` once the signal fires. Convenient with `?`.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
    }

    /// Resolves once the signal is cancelled. Resolves immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register interest before re-checking the flag so a `cancel`
            // racing with us cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Creates a signal that is cancelled whenever this one is, but that can
    /// also be cancelled on its own.
    pub fn child(&self) -> Self {
        let child = Arc::new(Inner::new(Some(Arc::clone(&self.inner))));
        {
            let mut children = self.inner.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        // The parent may have been cancelled before the child was linked.
        if self.is_cancelled() {
            child.cancel();
        }
        Self { inner: child }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn clones_share_state() {
        let signal = CancellationSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        signal.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn parent_cancels_child_not_vice_versa() {
        let parent = CancellationSignal::new();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!sibling.is_cancelled());

        parent.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_parent_starts_cancelled() {
        let parent = CancellationSignal::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[test]
    fn grandchildren_follow_the_root() {
        let root = CancellationSignal::new();
        let grandchild = root.child().child();
        root.cancel();
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn dropped_intermediate_keeps_the_link() {
        let root = CancellationSignal::new();
        let leaf = {
            let middle = root.child();
            middle.child()
        };
        root.cancel();
        assert!(leaf.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let signal = CancellationSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        tokio::task::yield_now().await;
        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter did not wake")
            .expect("waiter panicked");
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let signal = CancellationSignal::new();
        signal.cancel();
        signal.cancelled().await;
    }
}
