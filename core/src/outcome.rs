use crate::fault::Fault;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NodeId = Uuid;

/// Observable lifecycle of a settlement node.
///
/// `Pending` is the only non-terminal state. A node leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl State {
    pub fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            State::Pending => "pending",
            State::Fulfilled => "fulfilled",
            State::Rejected => "rejected",
        };
        f.write_str(text)
    }
}

/// The terminal result held by a settled node.
///
/// `Settlement` is "value or failure as data": a node never carries both.
/// A pending node simply has no `Settlement` yet.
#[derive(Debug, Clone)]
pub enum Settlement<T> {
    /// The producer resolved with a value
    Fulfilled(T),

    /// The producer (or an upstream node) rejected
    Rejected(Fault),
}

impl<T> Settlement<T> {
    pub fn state(&self) -> State {
        match self {
            Settlement::Fulfilled(_) => State::Fulfilled,
            Settlement::Rejected(_) => State::Rejected,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settlement::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settlement::Rejected(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settlement::Fulfilled(v) => Some(v),
            Settlement::Rejected(_) => None,
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Settlement::Fulfilled(_) => None,
            Settlement::Rejected(e) => Some(e),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, op: F) -> Settlement<U> {
        match self {
            Settlement::Fulfilled(v) => Settlement::Fulfilled(op(v)),
            Settlement::Rejected(e) => Settlement::Rejected(e),
        }
    }

    pub fn into_result(self) -> Result<T, Fault> {
        self.into()
    }
}

impl<T> From<Settlement<T>> for Result<T, Fault> {
    fn from(settlement: Settlement<T>) -> Self {
        match settlement {
            Settlement::Fulfilled(v) => Ok(v),
            Settlement::Rejected(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, Fault>> for Settlement<T> {
    fn from(result: Result<T, Fault>) -> Self {
        match result {
            Ok(v) => Settlement::Fulfilled(v),
            Err(e) => Settlement::Rejected(e),
        }
    }
}
