//! Data models

pub mod kind;
pub mod records;
pub mod state;
pub mod template;
