//! Submission scheduling: one driver actor per execution context, each
//! walking a prompt list with bounded readiness waits and a fixed delay
//! between submissions.

pub mod config;
mod driver;
mod group;
mod run;

pub use config::{ConfigError, DriverConfig};
pub use driver::{Driver, DriverHandle};
pub use group::{ContextEvent, DriverGroup};
