//! CLI command implementations

pub mod build;
pub mod get;
pub mod lifecycle;
pub mod output;
pub mod reconcile;
pub mod serve;
