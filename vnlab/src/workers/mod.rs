//! Background workers run by the daemon

pub mod reconciler;
