//! Gaze module orchestrator following the RSB module specification.
//!
//! Turns the per-tick fixation stream into a hysteresis-smoothed focus
//! signal for one tracked surface and drives the attached panel from it.

mod core;

pub use core::{
    FocusSample, FocusSignal, FocusState, GazeConfig, GazeFocusTracker, GazeTarget,
    SharedFocusSignal,
};
