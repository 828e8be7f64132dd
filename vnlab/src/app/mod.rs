//! Application wiring for the CLI and the daemon

pub mod options;
pub mod run;
pub mod state;
