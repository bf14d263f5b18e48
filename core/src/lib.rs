pub mod config;
pub mod fault;
pub mod outcome;

pub use config::{ChainConfig, ConfigError, RepeatSettlement};
pub use fault::Fault;
pub use outcome::{NodeId, Settlement, State};

pub mod prelude {
    pub use crate::config::{ChainConfig, RepeatSettlement};
    pub use crate::fault::Fault;
    pub use crate::outcome::{Settlement, State};
}
