//! Command-line front end: argument definitions, telemetry setup, and the
//! actions they dispatch to.

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod telemetry;

mod start;
pub use self::start::start;
