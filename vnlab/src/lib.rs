//! vnlab library
//!
//! Orchestration of virtual lab deployments: templates are translated into
//! backend descriptors, realized network by network and host by host, and
//! committed to a catalog; failed builds are rolled back.

pub mod app;
pub mod backend;
pub mod catalog;
pub mod descriptor;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod orchestrator;
pub mod provision;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
