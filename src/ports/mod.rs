//! Capability ports for the hardware-backed collaborators.
//!
//! Every external signal the runtime consumes — gaze fixation, ray
//! intersection, privilege grants, camera frames, controller triggers, symbol
//! decoding — enters through one of these traits. Components receive port
//! implementations through their constructors, so hosts wire real device
//! backends while tests and benches use [`scripted`] doubles.
//!
//! Completions are polled, never pushed: a request made on one tick may
//! surface its result any number of ticks later, and a component that has
//! been torn down simply stops polling.

pub mod scripted;

use crate::geometry::Vec3;

/// Identity of an object the ray intersection service can report.
pub type SurfaceId = u32;

/// Identifier of a revocable permission (e.g. `"camera_capture"`).
pub type PrivilegeId = String;

/// First intersection along a cast ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub surface: SurfaceId,
    pub position: Vec3,
    /// Surface tagged as a non-distracting reading area.
    pub reading_surface: bool,
}

/// Gaze sensor supplying one fixation point per tick while running.
pub trait GazeSensor: Send {
    fn start(&mut self) -> bool;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn fixation_point(&mut self) -> Option<Vec3>;
}

/// Ray intersection service.
pub trait RayCaster: Send {
    fn cast(&mut self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;
}

/// Completed asynchronous privilege request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeUpdate {
    pub id: PrivilegeId,
    pub granted: bool,
}

/// Privilege subsystem. `request` only enqueues; outcomes arrive later via
/// `poll_updates`.
pub trait PrivilegeService: Send {
    fn start(&mut self) -> bool;
    fn stop(&mut self);
    fn request(&mut self, id: &PrivilegeId) -> bool;
    fn poll_updates(&mut self) -> Vec<PrivilegeUpdate>;
}

/// Unprocessed pixel buffer delivered by the camera's capture completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Camera hardware lifecycle plus asynchronous still capture.
pub trait CameraService: Send {
    fn start(&mut self) -> bool;
    fn connect(&mut self) -> bool;
    fn disconnect(&mut self);
    fn stop(&mut self);
    fn capture_async(&mut self) -> bool;
    fn poll_frame(&mut self) -> Option<RawFrame>;
}

/// Discrete controller events consumed by the capture path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Capture,
    Dismiss,
}

/// Physical controller input delivering capture/dismiss events.
pub trait TriggerInput: Send {
    fn start(&mut self) -> bool;
    fn stop(&mut self);
    fn poll_events(&mut self) -> Vec<TriggerEvent>;
}

/// Internal failure of an opaque decode backend. Never escapes the decode
/// pipeline; it is mapped to a "no payload" outcome there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("decoder fault: {0}")]
pub struct DecoderFault(pub String);

/// Opaque symbol/barcode decode capability over a pixel buffer.
pub trait SymbolDecoder: Send {
    fn decode(
        &mut self,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<String>, DecoderFault>;
}
