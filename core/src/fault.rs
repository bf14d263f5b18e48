use std::fmt::{Debug, Display};
use std::sync::Arc;
use thiserror::Error;

/// The failure carried along the rejection path of a chain.
///
/// Producers report arbitrary errors through `Fault::Reported`; the other
/// variants are raised by the engine itself. `Fault` is cheap to clone so a
/// single rejection can fan out to every downstream node.
#[derive(Error, Debug, Clone)]
pub enum Fault {
    /// Failure reported by a producer
    #[error("{0}")]
    Reported(Arc<anyhow::Error>),

    /// `on_error` was attached to a node that fulfilled, so there was nothing to recover
    #[error("upstream fulfilled; nothing to recover")]
    NothingToRecover,

    /// A user transform panicked and the panic was contained
    #[error("transform panicked: {0}")]
    TransformPanicked(String),

    /// The node was dropped before it settled
    #[error("node dropped before settlement")]
    Abandoned,
}

impl Fault {
    /// Wrap a typed error reported by a producer.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Fault::Reported(Arc::new(anyhow::Error::new(error)))
    }

    /// Report a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Fault::Reported(Arc::new(anyhow::Error::msg(message)))
    }

    /// Try to recover the typed error a producer reported.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self {
            Fault::Reported(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Identity comparison: true when both faults carry the same reported error.
    pub fn ptr_eq(&self, other: &Fault) -> bool {
        match (self, other) {
            (Fault::Reported(a), Fault::Reported(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, Fault::Reported(_))
    }

    /// Build a `TransformPanicked` from a caught panic payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Fault::TransformPanicked(message)
    }
}

impl From<anyhow::Error> for Fault {
    fn from(error: anyhow::Error) -> Self {
        Fault::Reported(Arc::new(error))
    }
}
