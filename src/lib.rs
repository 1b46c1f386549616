//! Interaction layer for a head-worn AR device: gaze-driven focus with an
//! attached detail panel, and a privilege-gated capture-and-decode path that
//! shares the same panel.
//!
//! The host engine owns the frame loop and drives everything through
//! [`runtime::InteractionRuntime`]: `init` once, `tick` once per frame,
//! `teardown` exactly once. Hardware lives behind the port traits in
//! [`ports`]; the modules follow the RSB `MODULE_SPEC` pattern.

pub mod capture;
pub mod decode;
pub mod error;
pub mod gaze;
pub mod geometry;
pub mod logging;
pub mod metrics;
pub mod panel;
pub mod ports;
pub mod privilege;
pub mod runtime;

pub use capture::{CaptureConfig, CaptureFlow, CaptureResourceManager};
pub use decode::{DecodeOutcome, DecodePipeline};
pub use error::{GateError, Result};
pub use gaze::{
    FocusSample, FocusSignal, FocusState, GazeConfig, GazeFocusTracker, GazeTarget,
    SharedFocusSignal,
};
pub use geometry::{AnchorTransform, Side, Vec3};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{MetricSnapshot, RuntimeMetrics};
pub use panel::{AttachedPanelController, PanelDriver, PanelPlacement, PanelSnapshot};
pub use ports::{
    CameraService, DecoderFault, GazeSensor, PrivilegeId, PrivilegeService, PrivilegeUpdate,
    RawFrame, RayCaster, RayHit, SurfaceId, SymbolDecoder, TriggerEvent, TriggerInput,
};
pub use privilege::{PrivilegeGate, PrivilegeState, edge_allowed};
pub use runtime::audit::{
    NullRuntimeAudit, RuntimeAudit, RuntimeAuditEvent, RuntimeAuditEventBuilder, RuntimeAuditStage,
};
pub use runtime::{
    EventFlow, InteractionFeature, InteractionRuntime, RuntimeConfig, RuntimeContext, RuntimeEvent,
};
