//! Root-start propagation.
//!
//! Every derived node carries a non-owning handle to the start function of
//! the chain's root, plus a copy of the parent's "root already started"
//! flag. Any chain operation fires the root through this handle at most once
//! per node, and the root's own `start` is idempotent, so the root
//! producer runs exactly once however deep the chain grows.

use crate::promise::Node;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Type-erased start function of a chain root.
pub(crate) trait Activate: Send + Sync {
    fn start_root(&self);
}

impl<T> Activate for Node<T>
where
    T: Clone + Send + 'static,
{
    fn start_root(&self) {
        self.start();
    }
}

pub(crate) struct RootLink {
    /// `None` on the root itself
    trigger: Option<Weak<dyn Activate>>,
    root_started: AtomicBool,
}

impl RootLink {
    pub(crate) fn root() -> Self {
        Self {
            trigger: None,
            root_started: AtomicBool::new(false),
        }
    }

    /// Link for a node derived from `parent`.
    ///
    /// If `parent` is itself the root, the trigger points at `parent`;
    /// otherwise the parent's inherited trigger is carried forward.
    pub(crate) fn inherit<T>(parent: &Arc<Node<T>>) -> Self
    where
        T: Clone + Send + 'static,
    {
        let trigger = match &parent.link.trigger {
            Some(trigger) => trigger.clone(),
            None => Arc::downgrade(parent) as Weak<dyn Activate>,
        };
        Self {
            trigger: Some(trigger),
            root_started: AtomicBool::new(parent.link.root_started.load(Ordering::Acquire)),
        }
    }

    /// Start the chain root unless this node has already done so.
    pub(crate) fn fire(&self) {
        if self.root_started.load(Ordering::Acquire) {
            return;
        }
        if let Some(root) = self.trigger.as_ref().and_then(Weak::upgrade) {
            tracing::trace!("firing chain root");
            root.start_root();
        }
        self.root_started.store(true, Ordering::Release);
    }

    pub(crate) fn root_started(&self) -> bool {
        self.root_started.load(Ordering::Acquire)
    }

    pub(crate) fn is_root(&self) -> bool {
        self.trigger.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::Promise;
    use std::sync::atomic::AtomicUsize;

    fn counted_root(runs: &Arc<AtomicUsize>) -> Promise<i32> {
        let counter = runs.clone();
        Promise::new(move |resolve, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            resolve(1);
        })
    }

    #[test]
    fn test_root_has_no_trigger() {
        let runs = Arc::new(AtomicUsize::new(0));
        let root = counted_root(&runs);

        assert!(root.node.link.is_root());
        assert!(!root.node.link.root_started());
    }

    #[test]
    fn test_derived_inherits_started_flag() {
        let runs = Arc::new(AtomicUsize::new(0));
        let root = counted_root(&runs);
        let child = root.map(|v| v + 1);
        let grandchild = child.map(|v| v + 1);

        assert!(!child.node.link.is_root());
        assert!(child.node.link.root_started());
        assert!(grandchild.node.link.root_started());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fire_tolerates_dropped_root() {
        let runs = Arc::new(AtomicUsize::new(0));
        let root = counted_root(&runs);
        let link = RootLink::inherit(&root.node);
        drop(root);

        link.fire();
        assert!(link.root_started());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fire_starts_root_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let root = counted_root(&runs);
        let first = RootLink::inherit(&root.node);
        let second = RootLink::inherit(&root.node);

        first.fire();
        first.fire();
        second.fire();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(root.value(), Some(1));
    }
}
