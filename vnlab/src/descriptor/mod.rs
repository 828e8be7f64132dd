//! Backend descriptors translated from template definitions.
//!
//! Translation is pure: the same definition always yields the same
//! descriptor, whatever serialization the backend wants afterwards.

pub mod host;
pub mod network;
pub mod xml;

pub use host::{host_descriptor, host_record, HostDescriptor};
pub use network::{network_descriptor, network_record, NetworkDescriptor};
