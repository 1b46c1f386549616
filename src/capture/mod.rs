//! Capture module orchestrator following the RSB module specification.
//!
//! [`CaptureResourceManager`] owns the camera hardware lifecycle and the
//! at-most-one-capture-in-flight rule; [`CaptureFlow`] composes it with the
//! privilege gate, trigger input, and decode pipeline into the capture-path
//! feature.

mod core;
mod flow;

pub use core::CaptureResourceManager;
pub use flow::{CaptureConfig, CaptureFlow};
