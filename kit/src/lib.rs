//! Vow facade crate.
//!
//! This crate re-exports the core settlement types and the runtime engine
//! with a single entry point.
//!
//! ```rust
//! use vow::prelude::*;
//!
//! let total = Promise::new(|resolve, _reject| resolve(5))
//!     .map(|x| x * 2)
//!     .map(|x| x + 1);
//! assert_eq!(total.value(), Some(11));
//! ```

pub use vow_core as core;
pub use vow_runtime as runtime;

pub use vow_core::{ChainConfig, ConfigError, Fault, RepeatSettlement, Settlement, State};
pub use vow_runtime::{EmptyPromise, Progress, Promise, Reject, Resolve, Settled};

pub mod prelude {
    pub use vow_core::prelude::*;
    pub use vow_runtime::prelude::*;
}
