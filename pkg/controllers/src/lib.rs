//! Reconciliation engine for NetSet resources.
//!
//! One reconcile invocation reads fresh cluster state and reduces it to a
//! single action; the dispatcher re-invokes the engine as state changes.

pub mod claims;
pub mod dispatch;
pub mod naming;
pub mod netset;
pub mod pods;
mod registry;
