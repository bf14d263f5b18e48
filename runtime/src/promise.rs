//! Promise - the settlement node
//!
//! A `Promise<T>` wraps a producer that is not run until the promise is
//! started, either explicitly with [`Promise::start`] or implicitly by the
//! first chain operation. The producer receives three entry points
//! (`resolve`, `reject`, `progress`) which it may call synchronously or
//! later, from any thread.

use crate::activation::RootLink;
use crate::dispatch;
use parking_lot::Mutex;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use vow_core::{ChainConfig, Fault, NodeId, RepeatSettlement, Settlement, State};

/// Entry point a producer calls with its value.
pub type Resolve<T> = Arc<dyn Fn(T) + Send + Sync>;
/// Entry point a producer calls with its failure.
pub type Reject = Arc<dyn Fn(Fault) + Send + Sync>;
/// Entry point a producer calls with fractional progress.
pub type Progress = Arc<dyn Fn(f32) + Send + Sync>;

pub type EmptyPromise = Promise<()>;

pub(crate) type Producer<T> = Box<dyn FnOnce(Resolve<T>, Reject, Progress) + Send>;
pub(crate) type Reaction<T> = Box<dyn FnOnce(&Settlement<T>) + Send>;
type Hook = Box<dyn FnOnce() + Send>;

/// Type-erased progress target of a derived node.
pub(crate) trait ProgressSink: Send + Sync {
    fn forward_progress(&self, progress: f32);
}

struct Slots<T> {
    outcome: Option<Settlement<T>>,
    last_progress: Option<f32>,
    /// Settlement subscribers, in registration order
    reactions: Vec<Reaction<T>>,
    finally: Vec<Hook>,
    /// User handler; last writer wins
    on_progress: Option<Progress>,
    /// Derived nodes that receive this node's ticks; never owning
    forwards: Vec<Weak<dyn ProgressSink>>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            outcome: None,
            last_progress: None,
            reactions: Vec::new(),
            finally: Vec::new(),
            on_progress: None,
            forwards: Vec::new(),
        }
    }
}

pub(crate) struct Node<T> {
    id: NodeId,
    me: Weak<Node<T>>,
    slots: Mutex<Slots<T>>,
    producer: Mutex<Option<Producer<T>>>,
    started: AtomicBool,
    pub(crate) link: RootLink,
    pub(crate) config: Arc<ChainConfig>,
    release: fn(Vec<Reaction<T>>, Vec<Hook>),
}

impl<T> Node<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(
        producer: Producer<T>,
        link: RootLink,
        config: Arc<ChainConfig>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Node {
            id: uuid::Uuid::new_v4(),
            me: me.clone(),
            slots: Mutex::new(Slots::default()),
            producer: Mutex::new(Some(producer)),
            started: AtomicBool::new(false),
            link,
            config,
            release: release_detached::<T>,
        })
    }

    /// Run the producer if it has not run yet.
    pub(crate) fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let producer = self.producer.lock().take();
        let (Some(producer), Some(me)) = (producer, self.me.upgrade()) else {
            return;
        };

        tracing::debug!(
            vow.node = %self.id,
            vow.chain = %self.config.display_label(),
            "producer started"
        );

        let on_resolve = me.clone();
        let on_reject = me.clone();
        let on_progress = me;
        let resolve: Resolve<T> = Arc::new(move |value| on_resolve.resolve(value));
        let reject: Reject = Arc::new(move |fault| on_reject.reject(fault));
        let progress: Progress = Arc::new(move |p| on_progress.report_progress(p));
        producer(resolve, reject, progress);
    }

    /// Root-start propagation followed by starting this node.
    ///
    /// Runs before every chain operation so that a synchronous root producer
    /// has already settled by the time its children inspect state.
    pub(crate) fn activate(&self) {
        self.link.fire();
        self.start();
    }

    pub(crate) fn resolve(&self, value: T) {
        self.settle(Settlement::Fulfilled(value));
    }

    pub(crate) fn reject(&self, fault: Fault) {
        self.settle(Settlement::Rejected(fault));
    }

    fn settle(&self, settlement: Settlement<T>) {
        let (reactions, hooks) = {
            let mut slots = self.slots.lock();
            if let Some(existing) = &slots.outcome {
                self.report_repeat(existing.state(), settlement.state());
                return;
            }
            slots.outcome = Some(settlement.clone());
            (
                mem::take(&mut slots.reactions),
                mem::take(&mut slots.finally),
            )
        };

        let node = self.id;
        dispatch::schedule(move || {
            let _span = tracing::trace_span!("settle", vow.node = %node).entered();
            tracing::trace!(
                state = %settlement.state(),
                reactions = reactions.len(),
                "node settled"
            );

            for reaction in reactions {
                reaction(&settlement);
            }
            for hook in hooks {
                hook();
            }
        });
    }

    fn report_repeat(&self, current: State, attempted: State) {
        match self.config.repeat_settlement {
            RepeatSettlement::Warn => tracing::warn!(
                vow.node = %self.id,
                vow.chain = %self.config.display_label(),
                %current,
                %attempted,
                "ignoring repeated settlement"
            ),
            RepeatSettlement::Ignore => tracing::debug!(
                vow.node = %self.id,
                %current,
                %attempted,
                "ignoring repeated settlement"
            ),
        }
    }

    pub(crate) fn report_progress(&self, progress: f32) {
        let (handler, forwards) = {
            let mut slots = self.slots.lock();
            slots.last_progress = Some(progress);
            slots.forwards.retain(|sink| sink.strong_count() > 0);
            (slots.on_progress.clone(), slots.forwards.clone())
        };
        if let Some(handler) = handler {
            handler(progress);
        }
        for sink in forwards.iter().filter_map(Weak::upgrade) {
            sink.forward_progress(progress);
        }
    }

    /// Run `reaction` now if settled, otherwise queue it for settlement.
    ///
    /// The state check and the enqueue happen under the same lock, so a
    /// settlement racing in from another thread cannot be missed.
    pub(crate) fn observe(&self, reaction: Reaction<T>) {
        let snapshot = {
            let mut slots = self.slots.lock();
            if slots.outcome.is_none() {
                slots.reactions.push(reaction);
                return;
            }
            slots.outcome.clone()
        };
        if let Some(settlement) = snapshot {
            reaction(&settlement);
        }
    }

    /// Forward future ticks to `sink` while it is alive.
    ///
    /// A settled node keeps no new subscribers, so children derived after
    /// settlement are owned by their handles alone.
    pub(crate) fn add_forward(&self, sink: Weak<dyn ProgressSink>) {
        let mut slots = self.slots.lock();
        if slots.outcome.is_some() {
            return;
        }
        slots.forwards.retain(|sink| sink.strong_count() > 0);
        slots.forwards.push(sink);
    }

    fn add_finally(&self, hook: Hook) {
        {
            let mut slots = self.slots.lock();
            if slots.outcome.is_none() {
                slots.finally.push(hook);
                return;
            }
        }
        hook();
    }

    fn set_progress_handler(&self, handler: Progress) {
        self.slots.lock().on_progress = Some(handler);
    }
}

impl<T> ProgressSink for Node<T>
where
    T: Clone + Send + 'static,
{
    fn forward_progress(&self, progress: f32) {
        self.report_progress(progress);
    }
}

impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        let slots = self.slots.get_mut();
        let reactions = mem::take(&mut slots.reactions);
        let hooks = mem::take(&mut slots.finally);
        if !reactions.is_empty() || !hooks.is_empty() {
            (self.release)(reactions, hooks);
        }
    }
}

/// Subscribers of a dropped, unsettled node own the rest of its chain, so
/// they are dropped through the dispatch queue one level at a time.
fn release_detached<T: 'static>(reactions: Vec<Reaction<T>>, hooks: Vec<Hook>) {
    dispatch::schedule(move || drop((reactions, hooks)));
}

/// A deferred value that settles exactly once.
///
/// Cloning a `Promise` yields another handle to the same node.
pub struct Promise<T> {
    pub(crate) node: Arc<Node<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.node.slots.lock();
        f.debug_struct("Promise")
            .field("id", &self.node.id)
            .field(
                "state",
                &slots.outcome.as_ref().map_or(State::Pending, Settlement::state),
            )
            .field("started", &self.node.started.load(Ordering::Acquire))
            .field("root_started", &self.node.link.root_started())
            .finish()
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Create an unstarted root from a `(resolve, reject)` producer.
    pub fn new<P>(producer: P) -> Self
    where
        P: FnOnce(Resolve<T>, Reject) + Send + 'static,
    {
        Self::new_with(ChainConfig::default(), producer)
    }

    /// Create an unstarted root from a `(resolve, reject, progress)` producer.
    pub fn with_progress<P>(producer: P) -> Self
    where
        P: FnOnce(Resolve<T>, Reject, Progress) + Send + 'static,
    {
        Self::with_progress_with(ChainConfig::default(), producer)
    }

    /// [`Promise::new`] with an explicit chain configuration.
    pub fn new_with<P>(config: ChainConfig, producer: P) -> Self
    where
        P: FnOnce(Resolve<T>, Reject) + Send + 'static,
    {
        Self::with_progress_with(config, move |resolve, reject, _progress| {
            producer(resolve, reject)
        })
    }

    /// [`Promise::with_progress`] with an explicit chain configuration.
    pub fn with_progress_with<P>(config: ChainConfig, producer: P) -> Self
    where
        P: FnOnce(Resolve<T>, Reject, Progress) + Send + 'static,
    {
        Self {
            node: Node::new(Box::new(producer), RootLink::root(), Arc::new(config)),
        }
    }

    /// A started root already fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        let promise = Self::new(move |resolve, _| resolve(value));
        promise.start();
        promise
    }

    /// A started root already rejected with `fault`.
    pub fn rejected(fault: Fault) -> Self {
        let promise = Self::new(move |_, reject| reject(fault));
        promise.start();
        promise
    }

    /// Run the producer. Idempotent.
    pub fn start(&self) {
        self.node.start();
    }

    /// Attach a side effect that runs once, after the success or failure
    /// reactions, when this node settles. Runs immediately if already settled.
    ///
    /// Returns a handle to this same node.
    pub fn finally<F>(&self, side_effect: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.node.start();
        self.node.add_finally(Box::new(side_effect));
        self.clone()
    }

    /// Replace this node's progress handler.
    ///
    /// Only the most recently registered handler receives ticks. Forwarding
    /// into derived nodes is unaffected.
    pub fn progress<F>(&self, handler: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.node.set_progress_handler(Arc::new(handler));
        self.clone()
    }

    pub fn state(&self) -> State {
        self.node
            .slots
            .lock()
            .outcome
            .as_ref()
            .map_or(State::Pending, Settlement::state)
    }

    /// Cloned snapshot of the settlement, if any.
    pub fn outcome(&self) -> Option<Settlement<T>> {
        self.node.slots.lock().outcome.clone()
    }

    pub fn value(&self) -> Option<T> {
        self.outcome().and_then(|s| s.value().cloned())
    }

    pub fn fault(&self) -> Option<Fault> {
        self.outcome().and_then(|s| s.fault().cloned())
    }

    pub fn last_progress(&self) -> Option<f32> {
        self.node.slots.lock().last_progress
    }

    pub fn is_started(&self) -> bool {
        self.node.started.load(Ordering::Acquire)
    }
}

impl<T> Promise<T> {
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn label(&self) -> Option<&str> {
        self.node.config.label.as_deref()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.node.config
    }

    /// True for a node created from a caller-supplied producer.
    pub fn is_root(&self) -> bool {
        self.node.link.is_root()
    }

    /// True when both handles point at the same node.
    pub fn same_node(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}
