//! REST surface of the daemon

pub mod handlers;
pub mod serve;
