//! Privilege module orchestrator following the RSB module specification.
//!
//! Revocable permissions are acquired through an explicit state machine;
//! grants are never assumed to survive a suspend.

mod core;

pub use core::{PrivilegeGate, PrivilegeState, edge_allowed};
