//! Test utilities for Vow chains.
//!
//! - [`Gate`]: a root promise whose settlement is driven by the test
//! - [`Counter`] / [`counting_producer`]: count how often a producer runs
//! - [`Recorder`]: thread-safe log of values seen by a handler
//! - `assert_fulfilled!`, `assert_rejected!`, `assert_pending!`

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;
use vow_runtime::{Progress, Promise, Reject, Resolve};

pub use vow_core::{ChainConfig, Fault, RepeatSettlement, Settlement, State};

/// Install a fmt subscriber for test output. Safe to call from every test.
///
/// Honors `RUST_LOG`; defaults to `info,vow_runtime=debug`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,vow_runtime=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

struct Handles<T> {
    resolve: Resolve<T>,
    reject: Reject,
    progress: Progress,
}

impl<T> Clone for Handles<T> {
    fn clone(&self) -> Self {
        Self {
            resolve: self.resolve.clone(),
            reject: self.reject.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// A root promise that stays pending until the test settles it.
///
/// The entry points are only available once the promise has been started,
/// so every settle method reports whether the producer had run.
pub struct Gate<T> {
    handles: Arc<Mutex<Option<Handles<T>>>>,
    promise: Promise<T>,
}

impl<T> Gate<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_config(ChainConfig::default())
    }

    pub fn with_config(config: ChainConfig) -> Self {
        let handles: Arc<Mutex<Option<Handles<T>>>> = Arc::new(Mutex::new(None));
        let slot = handles.clone();
        let promise = Promise::with_progress_with(config, move |resolve, reject, progress| {
            *slot.lock() = Some(Handles {
                resolve,
                reject,
                progress,
            });
        });
        Self { handles, promise }
    }

    pub fn promise(&self) -> Promise<T> {
        self.promise.clone()
    }

    /// True once the producer has run.
    pub fn is_open(&self) -> bool {
        self.handles.lock().is_some()
    }

    pub fn resolve(&self, value: T) -> bool {
        self.with_handles(|h| (h.resolve)(value))
    }

    pub fn reject(&self, fault: Fault) -> bool {
        self.with_handles(|h| (h.reject)(fault))
    }

    pub fn progress(&self, fraction: f32) -> bool {
        self.with_handles(|h| (h.progress)(fraction))
    }

    /// Drop the entry points without settling, as a producer that gives up would.
    pub fn close(&self) {
        self.handles.lock().take();
    }

    fn with_handles(&self, call: impl FnOnce(Handles<T>)) -> bool {
        // clone out so reactions never run under our lock
        let handles = self.handles.lock().clone();
        match handles {
            Some(handles) => {
                call(handles);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for Gate<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Shared hit counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A `(resolve, reject)` producer that bumps `counter` and resolves with `value`.
pub fn counting_producer<T>(
    counter: &Counter,
    value: T,
) -> impl FnOnce(Resolve<T>, Reject) + Send + use<T>
where
    T: Send + 'static,
{
    let counter = counter.clone();
    move |resolve, _reject| {
        counter.hit();
        resolve(value);
    }
}

/// Thread-safe record of every value passed to a handler.
pub struct Recorder<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> Recorder<T>
where
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, value: T) {
        self.entries.lock().push(value);
    }

    /// A handler that records its argument.
    pub fn sink(&self) -> impl Fn(T) + Send + Sync + use<T> {
        let recorder = self.clone();
        move |value| recorder.record(value)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.entries.lock().clone()
    }
}

/// Assert a promise is fulfilled with the expected value.
#[macro_export]
macro_rules! assert_fulfilled {
    ($promise:expr, $expected:expr $(,)?) => {{
        match $promise.outcome() {
            Some($crate::Settlement::Fulfilled(value)) => assert_eq!(value, $expected),
            other => panic!("expected a fulfilled promise, got {:?}", other),
        }
    }};
}

/// Assert a promise is rejected, optionally with the given fault message.
#[macro_export]
macro_rules! assert_rejected {
    ($promise:expr $(,)?) => {{
        match $promise.outcome() {
            Some($crate::Settlement::Rejected(fault)) => fault,
            other => panic!("expected a rejected promise, got {:?}", other),
        }
    }};
    ($promise:expr, $message:expr $(,)?) => {{
        let fault = $crate::assert_rejected!($promise);
        assert_eq!(fault.to_string(), $message);
        fault
    }};
}

#[macro_export]
macro_rules! assert_pending {
    ($promise:expr $(,)?) => {{
        assert_eq!($promise.state(), $crate::State::Pending, "expected a pending promise");
    }};
}
