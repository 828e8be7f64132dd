//! Deployment orchestration: build with rollback, lifecycle fan-out,
//! inspection and reconciliation

pub mod build;
pub mod fsm;
pub mod inspect;
pub mod lifecycle;
pub mod reconcile;
pub mod uniqueness;

pub use build::Orchestrator;
pub use inspect::Inspector;
pub use lifecycle::{FanoutReport, LifecycleFanout, Target, Verb};
pub use reconcile::{ReconcileReport, Reconciler};
pub use uniqueness::UniquenessValidator;
