//! Panel module orchestrator following the RSB module specification.
//!
//! The attached panel is the single UI surface both interaction paths drive.
//! All open/close traffic goes through [`AttachedPanelController`] so the
//! open flag stays authoritative.

mod core;

pub use core::{AttachedPanelController, PanelDriver, PanelPlacement, PanelSnapshot};
