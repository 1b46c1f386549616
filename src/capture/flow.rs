use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::decode::{DecodeOutcome, DecodePipeline};
use crate::error::Result;
use crate::geometry::{AnchorTransform, Side};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::metrics::RuntimeMetrics;
use crate::panel::PanelDriver;
use crate::ports::{
    CameraService, PrivilegeId, PrivilegeService, RawFrame, SymbolDecoder, TriggerEvent,
    TriggerInput,
};
use crate::privilege::{PrivilegeGate, PrivilegeState};
use crate::runtime::{EventFlow, InteractionFeature, RuntimeContext, RuntimeEvent};

use super::core::CaptureResourceManager;

/// Configuration for the capture path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Privilege identifiers that must all be granted before the camera is
    /// touched.
    pub required_privileges: Vec<PrivilegeId>,
    pub side: Side,
    /// Result panel distance along the anchor's forward axis.
    pub panel_forward_offset: f32,
    pub lateral_magnitude: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            required_privileges: vec!["camera_capture".to_string()],
            side: Side::Left,
            panel_forward_offset: 2.0,
            lateral_magnitude: 0.0,
        }
    }
}

/// Privilege-gated capture-and-decode, the second panel driver.
///
/// Order within a tick is fixed: the privilege gate advances first, then
/// trigger events are drained, then at most one completed frame is decoded.
/// The camera is never touched before the gate reports `Granted`, and a
/// successful decode parks the camera until the wearer dismisses the result
/// panel.
pub struct CaptureFlow {
    config: CaptureConfig,
    gate: PrivilegeGate,
    resources: CaptureResourceManager,
    pipeline: DecodePipeline,
    trigger: Box<dyn TriggerInput>,
    anchor: Option<AnchorTransform>,
    /// Trigger input and camera brought up after the grant landed.
    session_started: bool,
    /// Camera intentionally off while the result panel is showing.
    parked: bool,
    denial_logged: bool,
    active: bool,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<RuntimeMetrics>>>,
}

impl CaptureFlow {
    pub fn new(
        config: CaptureConfig,
        privileges: impl PrivilegeService + 'static,
        camera: impl CameraService + 'static,
        trigger: impl TriggerInput + 'static,
        decoder: impl SymbolDecoder + 'static,
    ) -> Self {
        let required = config.required_privileges.clone();
        Self {
            config,
            gate: PrivilegeGate::new(privileges, required),
            resources: CaptureResourceManager::new(camera),
            pipeline: DecodePipeline::new(decoder),
            trigger: Box::new(trigger),
            anchor: None,
            session_started: false,
            parked: false,
            denial_logged: false,
            active: true,
            logger: None,
            metrics: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<RuntimeMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_anchor(mut self, anchor: AnchorTransform) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn set_anchor(&mut self, anchor: AnchorTransform) {
        self.anchor = Some(anchor);
    }

    pub fn privilege_state(&self) -> PrivilegeState {
        self.gate.state()
    }

    pub fn camera_active(&self) -> bool {
        self.resources.is_started() && self.resources.is_connected()
    }

    fn on_tick(&mut self, ctx: &mut RuntimeContext<'_>) {
        if !self.active {
            return;
        }

        // Privileges advance before any capture work so a grant landing
        // this tick already unlocks the camera this tick.
        self.gate.tick();
        match self.gate.state() {
            PrivilegeState::Granted => {
                if !self.session_started && !self.start_session() {
                    return;
                }
            }
            PrivilegeState::Denied => {
                if !self.denial_logged {
                    self.denial_logged = true;
                    self.log(LogLevel::Warn, "privileges_denied", std::iter::empty());
                }
                return;
            }
            _ => return,
        }

        for event in self.trigger.poll_events() {
            match event {
                TriggerEvent::Capture => self.begin_capture(),
                TriggerEvent::Dismiss => self.dismiss(ctx),
            }
        }

        if let Some(frame) = self.resources.poll_frame() {
            self.handle_frame(ctx, frame);
        }
    }

    /// One-time start sequence after the grant: subscribe the trigger
    /// input, then bring the camera up. Runs again after a suspend.
    fn start_session(&mut self) -> bool {
        if !self.trigger.start() {
            self.active = false;
            self.log(
                LogLevel::Error,
                "trigger_input_start_failed",
                std::iter::empty(),
            );
            return false;
        }
        if !self.start_camera() {
            self.trigger.stop();
            return false;
        }
        self.session_started = true;
        true
    }

    fn start_camera(&mut self) -> bool {
        if !self.resources.enable() {
            // Unusable hardware; stay registered but do nothing further.
            self.active = false;
            self.resources.disable();
            self.log(LogLevel::Error, "camera_start_failed", std::iter::empty());
            return false;
        }
        self.resources.subscribe_frames();
        self.log(LogLevel::Info, "camera_ready", std::iter::empty());
        true
    }

    fn begin_capture(&mut self) {
        if !self.resources.trigger_capture() {
            return;
        }
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_capture();
            }
        }
        self.log(LogLevel::Debug, "capture_started", std::iter::empty());
    }

    fn dismiss(&mut self, ctx: &mut RuntimeContext<'_>) {
        ctx.request_panel_close(PanelDriver::Capture);
        if self.parked {
            self.parked = false;
            self.start_camera();
        }
    }

    fn handle_frame(&mut self, ctx: &mut RuntimeContext<'_>, frame: RawFrame) {
        let outcome = self.pipeline.decode(&frame);
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_decode(outcome.found_payload());
            }
        }
        match outcome {
            DecodeOutcome::Payload(text) => {
                if ctx.panel_driver() == Some(PanelDriver::Gaze) {
                    // The gaze path holds the panel; drop the result and
                    // keep the camera live so the wearer can retry later.
                    self.log(LogLevel::Debug, "payload_dropped_panel_busy", std::iter::empty());
                    return;
                }
                // Release the camera while the result is showing; the
                // dismiss trigger brings it back.
                self.resources.disable();
                self.parked = true;
                if let Some(anchor) = self.anchor {
                    let position = anchor.panel_point(
                        self.config.panel_forward_offset,
                        self.config.side,
                        self.config.lateral_magnitude,
                    );
                    ctx.request_panel_open(PanelDriver::Capture, position, self.config.side);
                }
                self.log(
                    LogLevel::Info,
                    "payload_decoded",
                    [json_kv("len", json!(text.len()))],
                );
                ctx.set_panel_text(text);
            }
            DecodeOutcome::NotFound => {
                // Camera stays live; the next trigger pull retries.
                self.log(LogLevel::Debug, "decode_missed", std::iter::empty());
            }
        }
    }

    fn suspend(&mut self) {
        self.gate.pause();
        // Unsubscribe input along with the camera: a press landing while
        // suspended must not replay as a capture after resume.
        self.trigger.stop();
        self.resources.disable();
        self.session_started = false;
        self.parked = false;
        self.log(LogLevel::Info, "capture_suspended", std::iter::empty());
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(level, "gazekit::capture", message, fields);
            let _ = logger.log_event(event);
        }
    }
}

impl InteractionFeature for CaptureFlow {
    fn name(&self) -> &str {
        "capture.flow"
    }

    fn init(&mut self, _ctx: &mut RuntimeContext<'_>) -> Result<()> {
        if !self.gate.enable() {
            self.active = false;
            self.log(
                LogLevel::Error,
                "privilege_service_start_failed",
                std::iter::empty(),
            );
            return Ok(());
        }
        self.log(
            LogLevel::Info,
            "capture_flow_started",
            [json_str(
                "privileges",
                self.config.required_privileges.join(","),
            )],
        );
        Ok(())
    }

    fn on_event(
        &mut self,
        ctx: &mut RuntimeContext<'_>,
        event: &RuntimeEvent,
    ) -> Result<EventFlow> {
        match event {
            RuntimeEvent::Tick { .. } => self.on_tick(ctx),
            RuntimeEvent::AnchorMoved(anchor) => {
                if self.active {
                    self.anchor = Some(*anchor);
                }
            }
            RuntimeEvent::Suspended => {
                if self.active {
                    self.suspend();
                }
            }
            RuntimeEvent::Resumed => {}
        }
        Ok(EventFlow::Continue)
    }

    fn teardown(&mut self, ctx: &mut RuntimeContext<'_>) -> Result<()> {
        self.trigger.stop();
        self.resources.disable();
        self.gate.disable();
        self.active = false;
        self.session_started = false;
        self.parked = false;
        ctx.request_panel_close(PanelDriver::Capture);
        self.log(LogLevel::Info, "capture_flow_stopped", std::iter::empty());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::geometry::Vec3;
    use crate::ports::scripted::{
        ScriptedCamera, ScriptedDecoder, ScriptedPrivilegeService, ScriptedTrigger,
    };
    use crate::runtime::InteractionRuntime;

    struct Rig {
        privileges: ScriptedPrivilegeService,
        camera: ScriptedCamera,
        trigger: ScriptedTrigger,
        decoder: ScriptedDecoder,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                privileges: ScriptedPrivilegeService::new(),
                camera: ScriptedCamera::new(),
                trigger: ScriptedTrigger::new(),
                decoder: ScriptedDecoder::new(),
            }
        }

        fn flow(&self, config: CaptureConfig) -> CaptureFlow {
            CaptureFlow::new(
                config,
                self.privileges.clone(),
                self.camera.clone(),
                self.trigger.clone(),
                self.decoder.clone(),
            )
            .with_anchor(AnchorTransform::default())
        }

        fn grant_all(&self, config: &CaptureConfig) {
            for id in &config.required_privileges {
                self.privileges.push_update(id.clone(), true);
            }
        }
    }

    fn runtime_with(flow: CaptureFlow) -> InteractionRuntime {
        let mut runtime = InteractionRuntime::new();
        runtime.register_feature(flow);
        runtime.init().unwrap();
        runtime
    }

    fn step(runtime: &mut InteractionRuntime) {
        runtime.tick(Duration::from_millis(16)).unwrap();
    }

    fn frame() -> RawFrame {
        RawFrame {
            bytes: vec![0u8; 64],
            width: 8,
            height: 8,
        }
    }

    #[test]
    fn camera_starts_on_the_tick_the_grant_lands() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        // Tick 1 issues the requests; the camera is still untouched.
        step(&mut runtime);
        assert_eq!(rig.privileges.requested(), config.required_privileges);
        assert!(!rig.camera.started());

        // Tick 2 sees the grant and brings the camera up in the same pass.
        rig.grant_all(&config);
        step(&mut runtime);
        assert!(rig.camera.started());
        assert!(rig.camera.connected());
    }

    #[test]
    fn capture_decode_success_shows_panel_and_parks_camera() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);

        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);
        assert_eq!(rig.camera.capture_calls(), 1);

        rig.camera.push_frame(frame());
        rig.decoder.push_result(Ok(Some("https://example.com".into())));
        step(&mut runtime);

        assert!(runtime.panel().is_open());
        assert_eq!(runtime.panel().driver(), Some(PanelDriver::Capture));
        assert_eq!(runtime.panel().text(), "https://example.com");
        // Result panel placement: two units along forward from the anchor.
        let placement = runtime.panel().placement().unwrap();
        assert_eq!(placement.position, Vec3::new(0.0, 0.0, 2.0));
        // Camera released while the result is showing.
        assert!(!rig.camera.started());
    }

    #[test]
    fn decode_miss_leaves_camera_live_for_a_retry() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);

        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);
        rig.camera.push_frame(frame());
        // Scripted decoder with no result reports "no payload".
        step(&mut runtime);

        assert!(!runtime.panel().is_open());
        assert!(rig.camera.started());

        // The in-flight flag was cleared before decode, so a retry works.
        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);
        assert_eq!(rig.camera.capture_calls(), 2);
    }

    #[test]
    fn dismiss_closes_panel_and_restarts_camera() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);
        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);
        rig.camera.push_frame(frame());
        rig.decoder.push_result(Ok(Some("payload".into())));
        step(&mut runtime);
        assert!(runtime.panel().is_open());
        assert!(!rig.camera.started());

        rig.trigger.push_event(TriggerEvent::Dismiss);
        step(&mut runtime);
        assert!(!runtime.panel().is_open());
        assert!(rig.camera.started());
    }

    #[test]
    fn denial_keeps_the_camera_untouched() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        for id in &config.required_privileges {
            rig.privileges.push_update(id.clone(), false);
        }
        step(&mut runtime);

        rig.trigger.push_event(TriggerEvent::Capture);
        for _ in 0..3 {
            step(&mut runtime);
        }
        assert!(!rig.camera.started());
        assert_eq!(rig.camera.capture_calls(), 0);
    }

    #[test]
    fn privilege_service_start_failure_disables_the_feature() {
        let rig = Rig {
            privileges: ScriptedPrivilegeService::failing(),
            ..Rig::new()
        };
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        rig.grant_all(&config);
        for _ in 0..3 {
            step(&mut runtime);
        }
        assert!(rig.privileges.requested().is_empty());
        assert!(!rig.camera.started());
    }

    #[test]
    fn camera_start_failure_disables_the_feature() {
        let rig = Rig {
            camera: ScriptedCamera::failing_start(),
            ..Rig::new()
        };
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);
        assert!(!rig.camera.started());

        // Feature went inert: later ticks stop polling the trigger.
        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);
        assert_eq!(rig.camera.capture_calls(), 0);
    }

    #[test]
    fn suspend_drops_grants_and_camera_then_resume_recovers() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);
        assert!(rig.camera.started());

        runtime.dispatch_event(RuntimeEvent::Suspended).unwrap();
        assert!(!rig.camera.started());
        assert!(!rig.trigger.started());
        assert_eq!(rig.camera.stop_calls(), 1);

        // Resume path: everything is re-requested and re-granted.
        runtime.dispatch_event(RuntimeEvent::Resumed).unwrap();
        step(&mut runtime);
        assert_eq!(
            rig.privileges.requested().len(),
            config.required_privileges.len() * 2
        );
        rig.grant_all(&config);
        step(&mut runtime);
        assert!(rig.camera.started());
    }

    #[test]
    fn trigger_input_subscribed_only_after_grant() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        // No grant yet: nothing listens to the controller.
        assert!(!rig.trigger.started());
        step(&mut runtime);
        assert!(!rig.trigger.started());

        rig.grant_all(&config);
        step(&mut runtime);
        assert!(rig.trigger.started());
    }

    #[test]
    fn trigger_start_failure_disables_the_feature() {
        let rig = Rig {
            trigger: ScriptedTrigger::failing(),
            ..Rig::new()
        };
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        for _ in 0..3 {
            step(&mut runtime);
        }
        assert!(!rig.camera.started());
        assert_eq!(rig.camera.capture_calls(), 0);
    }

    #[test]
    fn press_during_suspend_is_dropped_not_replayed() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);
        assert!(rig.trigger.started());

        runtime.dispatch_event(RuntimeEvent::Suspended).unwrap();
        assert!(!rig.trigger.started());

        // Press lands while suspended; the subscription is down.
        rig.trigger.push_event(TriggerEvent::Capture);

        runtime.dispatch_event(RuntimeEvent::Resumed).unwrap();
        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);
        assert!(rig.trigger.started());
        assert!(rig.camera.started());

        // The stale press must not replay as a capture.
        step(&mut runtime);
        assert_eq!(rig.camera.capture_calls(), 0);

        // A fresh press after resume still works.
        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);
        assert_eq!(rig.camera.capture_calls(), 1);
    }

    #[test]
    fn frame_completing_after_teardown_changes_nothing() {
        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = runtime_with(rig.flow(config.clone()));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);
        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);

        runtime.teardown().unwrap();
        assert!(!rig.camera.started());
        assert!(!rig.trigger.started());

        // The completion lands late; the runtime discards it.
        rig.camera.push_frame(frame());
        rig.decoder.push_result(Ok(Some("late".into())));
        step(&mut runtime);
        assert!(!runtime.panel().is_open());
        assert_eq!(rig.decoder.decode_calls(), 0);
        assert_eq!(rig.camera.pending_frames(), 1);
    }

    #[test]
    fn panel_held_by_gaze_blocks_the_result_panel() {
        struct GazeHolder;
        impl InteractionFeature for GazeHolder {
            fn init(&mut self, ctx: &mut RuntimeContext<'_>) -> Result<()> {
                ctx.request_panel_open(PanelDriver::Gaze, Vec3::ZERO, Side::Left);
                Ok(())
            }

            fn on_event(
                &mut self,
                _ctx: &mut RuntimeContext<'_>,
                _event: &RuntimeEvent,
            ) -> Result<EventFlow> {
                Ok(EventFlow::Continue)
            }
        }

        let rig = Rig::new();
        let config = CaptureConfig::default();
        let mut runtime = InteractionRuntime::new();
        runtime.register_feature(GazeHolder);
        runtime.register_feature(rig.flow(config.clone()));
        runtime.init().unwrap();
        assert_eq!(runtime.panel().driver(), Some(PanelDriver::Gaze));

        step(&mut runtime);
        rig.grant_all(&config);
        step(&mut runtime);
        rig.trigger.push_event(TriggerEvent::Capture);
        step(&mut runtime);
        rig.camera.push_frame(frame());
        rig.decoder.push_result(Ok(Some("blocked".into())));
        step(&mut runtime);

        // The result is dropped, the gaze panel stays, the camera is not
        // parked and remains ready for a retry.
        assert_eq!(runtime.panel().driver(), Some(PanelDriver::Gaze));
        assert_eq!(runtime.panel().text(), "");
        assert!(rig.camera.started());
    }

    #[test]
    fn config_round_trips_through_json() {
        let json = r#"{"required_privileges":["camera_capture","audio"],"panel_forward_offset":1.5}"#;
        let config: CaptureConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.required_privileges.len(), 2);
        assert_eq!(config.panel_forward_offset, 1.5);
        assert_eq!(config.side, Side::Left);
    }
}
