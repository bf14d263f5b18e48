//! Chain builder
//!
//! Every operation here follows the same shape:
//!
//! 1. activate the parent (fire the chain root, then start the parent),
//! 2. build a derived node whose producer is a dispatcher over the parent,
//! 3. start the derived node at once, which reads the parent's state: a
//!    settled parent is dispatched immediately, a pending parent gets a
//!    queued reaction.
//!
//! Failures short-circuit `map` and `flat_map`; only `on_error` and
//! `recover` look at them.

use crate::activation::RootLink;
use crate::promise::{Node, Progress, ProgressSink, Promise, Reject, Resolve};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use vow_core::{Fault, Settlement};

/// Run a user transform, converting a panic into a `Fault` when the chain
/// is configured to contain them.
fn guarded<R>(contain: bool, transform: impl FnOnce() -> R) -> Result<R, Fault> {
    if !contain {
        return Ok(transform());
    }
    panic::catch_unwind(AssertUnwindSafe(transform)).map_err(|payload| {
        let fault = Fault::from_panic(payload.as_ref());
        tracing::error!(error = %fault, "transform panicked; rejecting derived node");
        fault
    })
}

fn settle_with<X>(resolve: &Resolve<X>, reject: &Reject, result: Result<X, Fault>) {
    match result {
        Ok(value) => resolve(value),
        Err(fault) => reject(fault),
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Build and start a node driven by `dispatch`.
    fn derive<X, D>(&self, dispatch: D) -> Promise<X>
    where
        X: Clone + Send + 'static,
        D: FnOnce(Resolve<X>, Reject, Progress) + Send + 'static,
    {
        let child = Promise {
            node: Node::new(
                Box::new(dispatch),
                RootLink::inherit(&self.node),
                self.node.config.clone(),
            ),
        };
        self.node
            .add_forward(Arc::downgrade(&child.node) as Weak<dyn ProgressSink>);
        child.node.start();
        child
    }

    /// Transform a success value.
    ///
    /// A rejected parent rejects the derived node with the same fault and
    /// `transform` is never called.
    pub fn map<X, F>(&self, transform: F) -> Promise<X>
    where
        X: Clone + Send + 'static,
        F: FnOnce(T) -> X + Send + 'static,
    {
        self.node.activate();
        let parent = self.node.clone();
        self.derive(move |resolve, reject, _progress| {
            let contain = parent.config.contain_panics;
            parent.observe(Box::new(move |settled: &Settlement<T>| match settled {
                Settlement::Fulfilled(value) => {
                    let value = value.clone();
                    settle_with(&resolve, &reject, guarded(contain, move || transform(value)));
                }
                Settlement::Rejected(fault) => reject(fault.clone()),
            }));
        })
    }

    /// Transform a success value into another promise and settle with that
    /// promise's outcome, so callers never see a promise of a promise.
    pub fn flat_map<X, F>(&self, transform: F) -> Promise<X>
    where
        X: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<X> + Send + 'static,
    {
        self.node.activate();
        let parent = self.node.clone();
        self.derive(move |resolve, reject, _progress| {
            let contain = parent.config.contain_panics;
            parent.observe(Box::new(move |settled: &Settlement<T>| match settled {
                Settlement::Fulfilled(value) => {
                    let value = value.clone();
                    match guarded(contain, move || transform(value)) {
                        Ok(nested) => nested.forward_into(resolve, reject),
                        Err(fault) => reject(fault),
                    }
                }
                Settlement::Rejected(fault) => reject(fault.clone()),
            }));
        })
    }

    /// Continue with an existing promise once this one fulfills.
    pub fn then_promise<X>(&self, next: Promise<X>) -> Promise<X>
    where
        X: Clone + Send + 'static,
    {
        self.flat_map(move |_| next)
    }

    /// Turn a failure into a value.
    ///
    /// NOTE: a *fulfilled* parent does not pass its value through here; the
    /// derived node is rejected with [`Fault::NothingToRecover`]. Use
    /// [`Promise::recover`] when successes should flow through unchanged.
    pub fn on_error<X, F>(&self, handler: F) -> Promise<X>
    where
        X: Clone + Send + 'static,
        F: FnOnce(Fault) -> X + Send + 'static,
    {
        self.node.activate();
        let parent = self.node.clone();
        self.derive(move |resolve, reject, _progress| {
            let contain = parent.config.contain_panics;
            parent.observe(Box::new(move |settled: &Settlement<T>| match settled {
                Settlement::Fulfilled(_) => reject(Fault::NothingToRecover),
                Settlement::Rejected(fault) => {
                    let fault = fault.clone();
                    settle_with(&resolve, &reject, guarded(contain, move || handler(fault)));
                }
            }));
        })
    }

    /// Turn a failure into a value, passing a success through unchanged.
    pub fn recover<F>(&self, handler: F) -> Promise<T>
    where
        F: FnOnce(Fault) -> T + Send + 'static,
    {
        self.node.activate();
        let parent = self.node.clone();
        self.derive(move |resolve, reject, _progress| {
            let contain = parent.config.contain_panics;
            parent.observe(Box::new(move |settled: &Settlement<T>| match settled {
                Settlement::Fulfilled(value) => resolve(value.clone()),
                Settlement::Rejected(fault) => {
                    let fault = fault.clone();
                    settle_with(&resolve, &reject, guarded(contain, move || handler(fault)));
                }
            }));
        })
    }

    /// Activate this promise and settle `resolve`/`reject` with its outcome.
    fn forward_into(&self, resolve: Resolve<T>, reject: Reject) {
        self.node.activate();
        self.node.observe(Box::new(move |settled: &Settlement<T>| match settled {
            Settlement::Fulfilled(value) => resolve(value.clone()),
            Settlement::Rejected(fault) => reject(fault.clone()),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vow_core::{ChainConfig, State};

    type Handles<T> = Arc<Mutex<Option<(Resolve<T>, Reject)>>>;

    fn parked<T: Clone + Send + 'static>() -> (Promise<T>, Handles<T>) {
        let slot: Handles<T> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let promise = Promise::new(move |resolve, reject| {
            *inner.lock() = Some((resolve, reject));
        });
        (promise, slot)
    }

    fn resolve_parked<T>(slot: &Handles<T>, value: T) {
        let (resolve, _) = slot.lock().clone().unwrap();
        resolve(value);
    }

    fn reject_parked<T>(slot: &Handles<T>, fault: Fault) {
        let (_, reject) = slot.lock().clone().unwrap();
        reject(fault);
    }

    #[test]
    fn test_map_over_settled_parent() {
        let root = Promise::resolved(5);
        let out = root.map(|x| x * 2).map(|x| x + 1);
        assert_eq!(out.value(), Some(11));
    }

    #[test]
    fn test_map_over_pending_parent() {
        let (root, slot) = parked::<i32>();
        let out = root.map(|x| x.to_string());
        assert_eq!(out.state(), State::Pending);

        resolve_parked(&slot, 7);
        assert_eq!(out.value().as_deref(), Some("7"));
    }

    #[test]
    fn test_map_short_circuits_pending_failure() {
        let (root, slot) = parked::<i32>();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let out = root.map(move |x| {
            counter.fetch_add(1, Ordering::SeqCst);
            x
        });

        reject_parked(&slot, Fault::msg("E1"));
        assert_eq!(out.state(), State::Rejected);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flat_map_waits_for_nested() {
        let (nested, nested_slot) = parked::<String>();
        let root = Promise::resolved(5);
        let out = root.flat_map(move |_| nested);

        assert_eq!(out.state(), State::Pending);
        resolve_parked(&nested_slot, "result-5".to_string());
        assert_eq!(out.value().as_deref(), Some("result-5"));
    }

    #[test]
    fn test_flat_map_propagates_nested_failure() {
        let root = Promise::resolved(1);
        let out: Promise<i32> = root.flat_map(|_| Promise::rejected(Fault::msg("inner")));
        assert_eq!(out.fault().map(|f| f.to_string()).as_deref(), Some("inner"));
    }

    #[test]
    fn test_then_promise_ignores_upstream_value() {
        let root = Promise::resolved("ignored");
        let out = root.then_promise(Promise::resolved(42));
        assert_eq!(out.value(), Some(42));
    }

    #[test]
    fn test_on_error_over_fulfilled_is_synthetic_rejection() {
        let root = Promise::resolved(5);
        let out = root.on_error(|_| -1);
        assert!(matches!(out.fault(), Some(Fault::NothingToRecover)));
    }

    #[test]
    fn test_on_error_pending_paths() {
        let (failing, fail_slot) = parked::<i32>();
        let recovered = failing.on_error(|e| e.to_string().len());
        reject_parked(&fail_slot, Fault::msg("four"));
        assert_eq!(recovered.value(), Some(4));

        let (passing, pass_slot) = parked::<i32>();
        let unrecovered = passing.on_error(|_| 0usize);
        resolve_parked(&pass_slot, 1);
        assert!(matches!(unrecovered.fault(), Some(Fault::NothingToRecover)));
    }

    #[test]
    fn test_recover_passes_success_through() {
        assert_eq!(Promise::resolved(5).recover(|_| -1).value(), Some(5));
        assert_eq!(
            Promise::<i32>::rejected(Fault::msg("E1")).recover(|_| -1).value(),
            Some(-1)
        );
    }

    #[test]
    fn test_contained_panic_rejects_child() {
        let root = Promise::resolved(0);
        let out: Promise<i32> = root.map(|_| panic!("transform exploded"));
        match out.fault() {
            Some(Fault::TransformPanicked(message)) => assert_eq!(message, "transform exploded"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    fn panic_message<T: Clone + Send + 'static>(promise: &Promise<T>) -> String {
        match promise.fault() {
            Some(Fault::TransformPanicked(message)) => message,
            other => panic!("unexpected fault: {other:?}"),
        }
    }

    #[test]
    fn test_contained_panic_in_flat_map() {
        let out: Promise<i32> =
            Promise::resolved(1).flat_map(|_| -> Promise<i32> { panic!("no nested promise") });
        assert_eq!(panic_message(&out), "no nested promise");
    }

    #[test]
    fn test_contained_panic_in_on_error() {
        let (root, slot) = parked::<i32>();
        let out: Promise<i32> = root.on_error(|_| panic!("handler exploded"));
        reject_parked(&slot, Fault::msg("E1"));
        assert_eq!(panic_message(&out), "handler exploded");
    }

    #[test]
    fn test_contained_panic_in_recover() {
        let out = Promise::<i32>::rejected(Fault::msg("E1")).recover(|fault| panic!("cannot recover from {fault}"));
        assert_eq!(panic_message(&out), "cannot recover from E1");
    }

    #[test]
    fn test_deep_pending_chain_settles() {
        let (root, slot) = parked::<u64>();
        let mut leaf = root.map(|x| x + 1);
        for _ in 1..10_000 {
            leaf = leaf.map(|x| x + 1);
        }
        assert_eq!(leaf.state(), State::Pending);

        resolve_parked(&slot, 0);
        assert_eq!(leaf.value(), Some(10_000));
    }

    #[test]
    fn test_uncontained_panic_unwinds() {
        let config = ChainConfig::new().with_contain_panics(false);
        let root: Promise<i32> = Promise::new_with(config, |resolve, _| resolve(0));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            root.map(|_| -> i32 { panic!("loose") })
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_fan_out_to_every_child() {
        let (root, slot) = parked::<i32>();
        let doubled = root.map(|x| x * 2);
        let negated = root.map(|x| -x);
        let described = root.map(|x| format!("#{x}"));

        resolve_parked(&slot, 4);
        assert_eq!(doubled.value(), Some(8));
        assert_eq!(negated.value(), Some(-4));
        assert_eq!(described.value().as_deref(), Some("#4"));
    }

    #[test]
    fn test_progress_forwards_to_children() {
        let root: Promise<i32> = Promise::with_progress(|_, _, progress| {
            progress(0.25);
        });
        let child = root.map(|x| x);
        assert_eq!(root.last_progress(), Some(0.25));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        child.progress(move |p| sink.lock().push(p));
        root.node.report_progress(0.75);

        assert_eq!(child.last_progress(), Some(0.75));
        assert_eq!(*seen.lock(), vec![0.75]);
    }

    #[test]
    fn test_derived_inherits_config() {
        let root: Promise<i32> =
            Promise::new_with(ChainConfig::new().with_label("ingest"), |resolve, _| resolve(1));
        let child = root.map(|x| x + 1).flat_map(|x| Promise::resolved(x * 10));
        assert_eq!(child.label(), Some("ingest"));
        assert_eq!(child.value(), Some(20));
    }
}
