use crate::ports::{CameraService, RawFrame};

/// Owns the camera's start/connect/disconnect/stop lifecycle and guarantees
/// at most one capture in flight.
///
/// Frame delivery is subscription-gated: `poll_frame` returns nothing unless
/// the completion callback is registered, and registration happens exactly
/// once per enable/disable cycle. A frame surfacing through `poll_frame`
/// clears the capturing flag before the caller sees the bytes, so a failure
/// during decode can never leave the manager stuck unable to retrigger.
pub struct CaptureResourceManager {
    camera: Box<dyn CameraService>,
    started: bool,
    connected: bool,
    capturing: bool,
    frames_subscribed: bool,
}

impl CaptureResourceManager {
    pub fn new(camera: impl CameraService + 'static) -> Self {
        Self {
            camera: Box::new(camera),
            started: false,
            connected: false,
            capturing: false,
            frames_subscribed: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Start and connect the hardware. Short-circuits on start failure.
    pub fn enable(&mut self) -> bool {
        self.started = self.camera.start();
        if !self.started {
            return false;
        }
        self.connected = self.camera.connect();
        self.connected
    }

    /// Disconnect then stop, unconditionally. Clears every flag regardless
    /// of the state the hardware was actually in.
    pub fn disable(&mut self) {
        self.camera.disconnect();
        self.connected = false;
        self.camera.stop();
        self.started = false;
        self.capturing = false;
        self.frames_subscribed = false;
    }

    /// Register for frame completions. Idempotent within one
    /// enable/disable cycle; never stacks, and `disable` clears it.
    pub fn subscribe_frames(&mut self) {
        self.frames_subscribed = true;
    }

    pub fn frames_subscribed(&self) -> bool {
        self.frames_subscribed
    }

    /// Issue one asynchronous capture. Rejected unless the hardware is
    /// started and connected with no capture already in flight.
    pub fn trigger_capture(&mut self) -> bool {
        if !self.started || !self.connected || self.capturing {
            return false;
        }
        if !self.camera.capture_async() {
            return false;
        }
        self.capturing = true;
        true
    }

    /// Surface a completed frame, if any. Clearing `capturing` happens here,
    /// before any decode work can run on the returned bytes.
    pub fn poll_frame(&mut self) -> Option<RawFrame> {
        if !self.frames_subscribed {
            return None;
        }
        let frame = self.camera.poll_frame()?;
        self.capturing = false;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::scripted::ScriptedCamera;

    fn frame() -> RawFrame {
        RawFrame {
            bytes: vec![1, 2, 3],
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn enable_starts_and_connects() {
        let camera = ScriptedCamera::new();
        let mut manager = CaptureResourceManager::new(camera.clone());
        assert!(manager.enable());
        assert!(manager.is_started());
        assert!(manager.is_connected());
        assert!(camera.started());
        assert!(camera.connected());
    }

    #[test]
    fn enable_short_circuits_on_start_failure() {
        let camera = ScriptedCamera::failing_start();
        let mut manager = CaptureResourceManager::new(camera.clone());
        assert!(!manager.enable());
        assert!(!manager.is_started());
        assert!(!camera.connected());
    }

    #[test]
    fn enable_reports_connect_failure() {
        let mut manager = CaptureResourceManager::new(ScriptedCamera::failing_connect());
        assert!(!manager.enable());
        assert!(manager.is_started());
        assert!(!manager.is_connected());
    }

    #[test]
    fn disable_is_unconditional() {
        let camera = ScriptedCamera::new();
        let mut manager = CaptureResourceManager::new(camera.clone());
        // Never enabled, disable still walks the teardown sequence.
        manager.disable();
        assert_eq!(camera.disconnect_calls(), 1);
        assert_eq!(camera.stop_calls(), 1);
        assert!(!manager.is_capturing());
        assert!(!manager.frames_subscribed());
    }

    #[test]
    fn capture_rejected_while_in_flight() {
        let camera = ScriptedCamera::new();
        let mut manager = CaptureResourceManager::new(camera.clone());
        manager.enable();
        manager.subscribe_frames();

        assert!(manager.trigger_capture());
        assert!(manager.is_capturing());
        assert!(!manager.trigger_capture());
        assert_eq!(camera.capture_calls(), 1);
    }

    #[test]
    fn capture_rejected_when_not_connected() {
        let mut manager = CaptureResourceManager::new(ScriptedCamera::failing_connect());
        manager.enable();
        assert!(!manager.trigger_capture());
    }

    #[test]
    fn poll_frame_clears_capturing_first() {
        let camera = ScriptedCamera::new();
        let mut manager = CaptureResourceManager::new(camera.clone());
        manager.enable();
        manager.subscribe_frames();
        manager.trigger_capture();

        camera.push_frame(frame());
        let delivered = manager.poll_frame().unwrap();
        assert_eq!(delivered, frame());
        assert!(!manager.is_capturing());
        // Retrigger works immediately after delivery.
        assert!(manager.trigger_capture());
    }

    #[test]
    fn unsubscribed_frames_are_not_delivered() {
        let camera = ScriptedCamera::new();
        let mut manager = CaptureResourceManager::new(camera.clone());
        manager.enable();
        manager.trigger_capture();
        camera.push_frame(frame());

        assert!(manager.poll_frame().is_none());
        // The frame stays queued at the port; nothing was consumed.
        assert_eq!(camera.pending_frames(), 1);
        assert!(manager.is_capturing());
    }
}
