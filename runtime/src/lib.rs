//! # Vow runtime
//!
//! A `Promise<T>` is a single-value container that starts pending and is
//! settled exactly once. Chain operations (`map`, `flat_map`, `on_error`, ...)
//! build derived promises wired to their parent, and the first chain
//! operation anywhere in a chain lazily starts the root producer.

mod activation;
pub mod bridge;
pub mod chain;
mod dispatch;
pub mod promise;

pub mod prelude {
    pub use crate::bridge::Settled;
    pub use crate::promise::{EmptyPromise, Progress, Promise, Reject, Resolve};
    pub use vow_core::prelude::*;
}

pub use bridge::Settled;
pub use promise::{EmptyPromise, Progress, Promise, Reject, Resolve};
