//! Async bridge
//!
//! Lets async code wait on a promise without the engine scheduling
//! anything: [`Promise::settled`] registers an ordinary reaction that sends
//! the outcome through a oneshot channel.

use crate::promise::Promise;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use vow_core::{Fault, Settlement};

/// Future returned by [`Promise::settled`].
///
/// Resolves to `Err(Fault::Abandoned)` if the promise is dropped while pending.
#[must_use = "futures do nothing unless polled"]
pub struct Settled<T> {
    rx: oneshot::Receiver<Settlement<T>>,
}

impl<T> Future for Settled<T> {
    type Output = Result<T, Fault>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(settlement)) => Poll::Ready(settlement.into_result()),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Fault::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Wait for this promise to settle.
    ///
    /// Counts as a consumer: the chain root is started if it has not been.
    pub fn settled(&self) -> Settled<T> {
        self.node.activate();
        let (tx, rx) = oneshot::channel();
        self.node.observe(Box::new(move |settled: &Settlement<T>| {
            // receiver may already be gone
            let _ = tx.send(settled.clone());
        }));
        Settled { rx }
    }
}

impl<T> IntoFuture for Promise<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<T, Fault>;
    type IntoFuture = Settled<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.settled()
    }
}
