//! Tick-driven interaction runtime.
//!
//! The host owns the frame cadence: it calls [`InteractionRuntime::init`]
//! once, [`InteractionRuntime::tick`] once per frame, and
//! [`InteractionRuntime::teardown`] exactly once before dropping the
//! runtime. Features never block; asynchronous hardware completions are
//! polled as state on later ticks. `run_script` replays a fixed event
//! sequence for deterministic tests and benches.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::error::{GateError, Result};
use crate::geometry::{AnchorTransform, Side, Vec3};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::RuntimeMetrics;
use crate::panel::{AttachedPanelController, PanelDriver, PanelSnapshot};

pub mod audit;

use audit::{NullRuntimeAudit, RuntimeAudit, RuntimeAuditEventBuilder, RuntimeAuditStage};

/// Configuration knobs for the runtime loop.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Cadence the host is expected to call `tick` at. Informational; the
    /// runtime never sleeps.
    pub tick_interval: Duration,
    /// Optional structured logger used by the runtime.
    pub logger: Option<Logger>,
    /// Metrics accumulator used for periodic snapshots.
    pub metrics: Option<Arc<Mutex<RuntimeMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "gazekit::runtime.metrics".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(RuntimeMetrics::new())));
        }
    }

    /// Disable metrics collection and prevent further snapshots.
    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<RuntimeMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// High-level events delivered to features.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Tick { elapsed: Duration },
    /// The tracked anchor moved; features update their cached transform.
    AnchorMoved(AnchorTransform),
    /// Application suspend. Grants and hardware sessions do not survive it.
    Suspended,
    Resumed,
}

/// Control the propagation of an event across features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Consumed,
}

enum PanelRequest {
    Open {
        driver: PanelDriver,
        position: Vec3,
        side: Side,
    },
    Close {
        driver: PanelDriver,
    },
    SetText(String),
}

/// Context passed to features so they can interact with the runtime safely.
///
/// Panel traffic is queued and applied after the feature returns, which
/// keeps the controller's open flag authoritative and lets the runtime
/// account for every transition.
pub struct RuntimeContext<'a> {
    panel: &'a AttachedPanelController,
    requests: Vec<PanelRequest>,
}

impl<'a> RuntimeContext<'a> {
    fn new(panel: &'a AttachedPanelController) -> Self {
        Self {
            panel,
            requests: Vec::new(),
        }
    }

    /// Panel owner as of the start of this dispatch.
    pub fn panel_driver(&self) -> Option<PanelDriver> {
        self.panel.driver()
    }

    /// Queue a panel open. Applied after the feature completes; the
    /// controller still arbitrates exclusivity.
    pub fn request_panel_open(&mut self, driver: PanelDriver, position: Vec3, side: Side) {
        self.requests.push(PanelRequest::Open {
            driver,
            position,
            side,
        });
    }

    pub fn request_panel_close(&mut self, driver: PanelDriver) {
        self.requests.push(PanelRequest::Close { driver });
    }

    pub fn set_panel_text(&mut self, text: impl Into<String>) {
        self.requests.push(PanelRequest::SetText(text.into()));
    }

    fn into_outcome(self) -> ContextOutcome {
        ContextOutcome {
            requests: self.requests,
        }
    }
}

struct ContextOutcome {
    requests: Vec<PanelRequest>,
}

/// Behaviour injection point for the runtime. The gaze path and the capture
/// path are both features; they only meet at the panel controller.
pub trait InteractionFeature: Send {
    fn name(&self) -> &str {
        "interaction_feature"
    }

    fn init(&mut self, _ctx: &mut RuntimeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_event(
        &mut self,
        _ctx: &mut RuntimeContext<'_>,
        _event: &RuntimeEvent,
    ) -> Result<EventFlow> {
        Ok(EventFlow::Continue)
    }

    fn teardown(&mut self, _ctx: &mut RuntimeContext<'_>) -> Result<()> {
        Ok(())
    }
}

pub struct InteractionRuntime {
    panel: AttachedPanelController,
    features: Vec<Box<dyn InteractionFeature>>,
    config: RuntimeConfig,
    audit: Arc<dyn RuntimeAudit>,
    initialized: bool,
    torn_down: bool,
    ticks: u64,
    start_instant: Option<Instant>,
    last_metrics_emit: Option<Instant>,
}

impl Default for InteractionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionRuntime {
    pub fn new() -> Self {
        let runtime = Self {
            panel: AttachedPanelController::new(),
            features: Vec::new(),
            config: RuntimeConfig::default(),
            audit: Arc::new(NullRuntimeAudit),
            initialized: false,
            torn_down: false,
            ticks: 0,
            start_instant: None,
            last_metrics_emit: None,
        };
        runtime.record_audit(RuntimeAuditEventBuilder::new(
            RuntimeAuditStage::RuntimeConstructed,
        ));
        runtime
    }

    pub fn config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.config
    }

    pub fn set_audit(&mut self, audit: Arc<dyn RuntimeAudit>) {
        self.audit = audit;
    }

    pub fn register_feature<F>(&mut self, feature: F)
    where
        F: InteractionFeature + 'static,
    {
        let mut builder = RuntimeAuditEventBuilder::new(RuntimeAuditStage::FeatureRegistered);
        builder.detail("feature", json!(feature.name()));
        self.record_audit(builder);
        self.features.push(Box::new(feature));
    }

    pub fn panel(&self) -> &AttachedPanelController {
        &self.panel
    }

    /// Drain the panel's dirty flag for the host renderer.
    pub fn take_panel_update(&mut self) -> Option<PanelSnapshot> {
        self.panel.take_update()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run every feature's `init` hook. Must be called exactly once, before
    /// the first tick.
    pub fn init(&mut self) -> Result<()> {
        if self.torn_down {
            return Err(GateError::TornDown);
        }
        if self.initialized {
            return Err(GateError::AlreadyInitialized);
        }
        self.initialized = true;
        self.ensure_metrics_initialized();
        let now = Instant::now();
        self.start_instant = Some(now);
        self.last_metrics_emit = Some(now);
        self.record_audit(RuntimeAuditEventBuilder::new(RuntimeAuditStage::InitStarted));
        self.log_runtime_event(
            LogLevel::Info,
            "runtime_started",
            [json_kv("features", json!(self.features.len()))],
        );

        for idx in 0..self.features.len() {
            let outcome = {
                let feature = &mut self.features[idx];
                let feature_name = feature.name().to_string();
                let mut ctx = RuntimeContext::new(&self.panel);
                feature.init(&mut ctx)?;
                let mut builder =
                    RuntimeAuditEventBuilder::new(RuntimeAuditStage::FeatureInitialized);
                builder.detail("feature", json!(feature_name.clone()));
                self.record_audit(builder);
                self.log_runtime_event(
                    LogLevel::Debug,
                    "feature_initialized",
                    [json_kv("feature", json!(feature_name))],
                );
                ctx.into_outcome()
            };
            self.apply_outcome(outcome);
        }
        Ok(())
    }

    /// One frame of work. Privilege polling, gaze raycasts, and capture
    /// completions all run from here.
    pub fn tick(&mut self, elapsed: Duration) -> Result<()> {
        self.dispatch_event(RuntimeEvent::Tick { elapsed })?;
        if !self.torn_down {
            self.ticks = self.ticks.saturating_add(1);
            self.record_tick_metric();
            self.record_audit(RuntimeAuditEventBuilder::new(
                RuntimeAuditStage::TickDispatched,
            ));
            self.maybe_emit_metrics();
        }
        Ok(())
    }

    /// Propagate one event through the features in registration order.
    ///
    /// After teardown this is a silent no-op: a completion arriving late
    /// must not mutate anything.
    pub fn dispatch_event(&mut self, event: RuntimeEvent) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        if !self.initialized {
            return Err(GateError::NotInitialized);
        }

        let mut consumed = false;
        for idx in 0..self.features.len() {
            let (flow, outcome) = {
                let feature = &mut self.features[idx];
                let mut ctx = RuntimeContext::new(&self.panel);
                let flow = feature.on_event(&mut ctx, &event)?;
                (flow, ctx.into_outcome())
            };
            self.apply_outcome(outcome);
            if matches!(flow, EventFlow::Consumed) {
                consumed = true;
                break;
            }
        }
        self.record_event_metric();
        self.log_runtime_event(
            LogLevel::Debug,
            "event_dispatched",
            [
                json_kv("event", json!(Self::describe_event(&event))),
                json_kv("consumed", json!(consumed)),
            ],
        );
        let mut builder = RuntimeAuditEventBuilder::new(RuntimeAuditStage::EventDispatched);
        builder.detail("event", json!(Self::describe_event(&event)));
        self.record_audit(builder);
        Ok(())
    }

    /// Replay a fixed event sequence: init, dispatch, teardown.
    pub fn run_script<I>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = RuntimeEvent>,
    {
        self.init()?;
        for event in events.into_iter() {
            match event {
                RuntimeEvent::Tick { elapsed } => self.tick(elapsed)?,
                other => self.dispatch_event(other)?,
            }
        }
        self.teardown()
    }

    /// Tear down every feature and force-close the panel. Runs exactly once;
    /// a second call is an error, and all later events are discarded.
    pub fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Err(GateError::TornDown);
        }
        if !self.initialized {
            return Err(GateError::NotInitialized);
        }

        for idx in 0..self.features.len() {
            let outcome = {
                let feature = &mut self.features[idx];
                let mut ctx = RuntimeContext::new(&self.panel);
                feature.teardown(&mut ctx)?;
                ctx.into_outcome()
            };
            self.apply_outcome(outcome);
        }

        // Scoped acquisition: the panel never outlives its owner.
        if self.panel.force_close() {
            self.record_panel_close_metric();
            self.record_audit(RuntimeAuditEventBuilder::new(RuntimeAuditStage::PanelClosed));
        }

        self.torn_down = true;
        let uptime_ms = self
            .start_instant
            .map(|start| start.elapsed().as_millis())
            .unwrap_or(0);
        self.log_runtime_event(
            LogLevel::Info,
            "runtime_stopped",
            [
                json_kv("uptime_ms", json!(uptime_ms)),
                json_kv("ticks", json!(self.ticks)),
            ],
        );
        self.record_audit(RuntimeAuditEventBuilder::new(
            RuntimeAuditStage::RuntimeStopped,
        ));
        Ok(())
    }

    fn apply_outcome(&mut self, outcome: ContextOutcome) {
        for request in outcome.requests {
            match request {
                PanelRequest::Open {
                    driver,
                    position,
                    side,
                } => {
                    if self.panel.request_open(driver, position, side) {
                        self.record_panel_open_metric();
                        let mut builder =
                            RuntimeAuditEventBuilder::new(RuntimeAuditStage::PanelOpened);
                        builder.detail("driver", json!(format!("{:?}", driver)));
                        self.record_audit(builder);
                        self.log_runtime_event(
                            LogLevel::Info,
                            "panel_opened",
                            [
                                json_kv("driver", json!(format!("{:?}", driver))),
                                json_kv("side", json!(format!("{:?}", side))),
                            ],
                        );
                    }
                }
                PanelRequest::Close { driver } => {
                    if self.panel.request_close(driver) {
                        self.record_panel_close_metric();
                        let mut builder =
                            RuntimeAuditEventBuilder::new(RuntimeAuditStage::PanelClosed);
                        builder.detail("driver", json!(format!("{:?}", driver)));
                        self.record_audit(builder);
                        self.log_runtime_event(
                            LogLevel::Info,
                            "panel_closed",
                            [json_kv("driver", json!(format!("{:?}", driver)))],
                        );
                    }
                }
                PanelRequest::SetText(text) => {
                    if self.panel.set_text(text) {
                        self.log_runtime_event(
                            LogLevel::Debug,
                            "panel_text_updated",
                            std::iter::empty(),
                        );
                    }
                }
            }
        }
    }

    fn ensure_metrics_initialized(&mut self) {
        if self.config.metrics.is_none() && self.config.metrics_interval > Duration::from_millis(0)
        {
            self.config.metrics = Some(Arc::new(Mutex::new(RuntimeMetrics::new())));
        }
    }

    fn log_runtime_event<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, "gazekit::runtime", message, fields);
            let _ = logger.log_event(event);
        }
    }

    fn record_audit(&self, builder: RuntimeAuditEventBuilder) {
        self.audit.record(builder.finish());
    }

    fn record_tick_metric(&mut self) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_tick();
            }
        }
    }

    fn record_event_metric(&mut self) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_event();
            }
        }
    }

    fn record_panel_open_metric(&mut self) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_panel_open();
            }
        }
    }

    fn record_panel_close_metric(&mut self) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_panel_close();
            }
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.config.metrics.is_none() {
            return;
        }

        if self.config.metrics_interval == Duration::from_millis(0) {
            return;
        }

        let now = Instant::now();
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.config.metrics_interval => {
                return;
            }
            _ => {
                self.last_metrics_emit = Some(now);
            }
        }

        let uptime = self
            .start_instant
            .map(|start| now.duration_since(start))
            .unwrap_or_default();

        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let target = self.config.metrics_target.as_str();
                let snapshot_event = guard.snapshot(uptime).to_log_event(target);
                let _ = logger.log_event(snapshot_event);
            }
        }
    }

    fn describe_event(event: &RuntimeEvent) -> &'static str {
        match event {
            RuntimeEvent::Tick { .. } => "tick",
            RuntimeEvent::AnchorMoved(_) => "anchor_moved",
            RuntimeEvent::Suspended => "suspended",
            RuntimeEvent::Resumed => "resumed",
        }
    }
}
