use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::geometry::{AnchorTransform, Side};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::RuntimeMetrics;
use crate::panel::PanelDriver;
use crate::ports::{GazeSensor, RayCaster, SurfaceId};
use crate::runtime::{EventFlow, InteractionFeature, RuntimeContext, RuntimeEvent};

/// Whether the wearer's gaze currently rests on the tracked surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Unfocused,
    Focused,
}

/// Configuration for the gaze path. The miss threshold and the two sustain
/// flags varied across device revisions, so all three are explicit knobs
/// rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    pub side: Side,
    /// Consecutive non-qualifying ticks before focus is retracted.
    pub miss_threshold: u32,
    pub max_ray_range: f32,
    pub forward_offset: f32,
    pub lateral_magnitude: f32,
    /// Whether gazing at the open panel itself counts as sustained focus.
    pub panel_hit_sustains_focus: bool,
    /// Whether gazing at a tagged reading surface counts as sustained focus.
    pub exempt_hit_sustains_focus: bool,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            side: Side::Left,
            miss_threshold: 8,
            max_ray_range: 10.0,
            forward_offset: 0.0,
            lateral_magnitude: 0.75,
            panel_hit_sustains_focus: true,
            exempt_hit_sustains_focus: true,
        }
    }
}

/// Identity of the tracked surface and of its attached panel, as reported by
/// the ray intersection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GazeTarget {
    pub surface: SurfaceId,
    pub panel_surface: SurfaceId,
}

/// Focus snapshot readable by consumers (material feedback lives outside
/// this crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusSample {
    pub focused: bool,
    pub side: Side,
}

/// Shared focus signal. The tracker writes it; any number of consumers hold
/// a clone of the [`SharedFocusSignal`] handle and read it per frame.
#[derive(Default)]
pub struct FocusSignal {
    inner: RwLock<FocusSample>,
}

impl FocusSignal {
    fn set(&self, focused: bool, side: Side) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = FocusSample { focused, side };
        }
    }

    pub fn current(&self) -> FocusSample {
        self.inner.read().map(|guard| *guard).unwrap_or_default()
    }
}

pub type SharedFocusSignal = Arc<FocusSignal>;

enum HitClass {
    Target,
    AttachedSurface,
    Exempt,
    Other,
    Miss,
}

/// Hysteresis-smoothed gaze focus tracking for one surface.
///
/// Each tick a ray is cast from the anchor toward the fixation point, capped
/// at `max_ray_range`. A hit on the tracked surface focuses and opens the
/// panel; hits on the panel or an exempt surface sustain whatever is shown;
/// anything else counts toward the miss threshold before focus is retracted.
/// With the anchor or target unset the tracker is inert.
pub struct GazeFocusTracker {
    config: GazeConfig,
    sensor: Box<dyn GazeSensor>,
    rays: Box<dyn RayCaster>,
    target: Option<GazeTarget>,
    anchor: Option<AnchorTransform>,
    signal: SharedFocusSignal,
    focus: FocusState,
    missed: u32,
    active: bool,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<RuntimeMetrics>>>,
}

impl GazeFocusTracker {
    pub fn new(
        config: GazeConfig,
        sensor: impl GazeSensor + 'static,
        rays: impl RayCaster + 'static,
    ) -> Self {
        let side = config.side;
        let signal: SharedFocusSignal = Arc::new(FocusSignal::default());
        signal.set(false, side);
        Self {
            config,
            sensor: Box::new(sensor),
            rays: Box::new(rays),
            target: None,
            anchor: None,
            signal,
            focus: FocusState::Unfocused,
            missed: 0,
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

    pub fn with_target(mut self, target: GazeTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_anchor(mut self, anchor: AnchorTransform) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn set_target(&mut self, target: GazeTarget) {
        self.target = Some(target);
    }

    pub fn set_anchor(&mut self, anchor: AnchorTransform) {
        self.anchor = Some(anchor);
    }

    /// Handle consumers read the focus state through.
    pub fn focus_signal(&self) -> SharedFocusSignal {
        Arc::clone(&self.signal)
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus
    }

    pub fn missed_ticks(&self) -> u32 {
        self.missed
    }

    fn classify(&mut self, target: GazeTarget, anchor: AnchorTransform) -> HitClass {
        let Some(fixation) = self.sensor.fixation_point() else {
            return HitClass::Miss;
        };
        let heading = fixation - anchor.position;
        let Some(hit) = self
            .rays
            .cast(anchor.position, heading, self.config.max_ray_range)
        else {
            return HitClass::Miss;
        };

        if hit.surface == target.surface {
            HitClass::Target
        } else if hit.surface == target.panel_surface {
            HitClass::AttachedSurface
        } else if hit.reading_surface {
            HitClass::Exempt
        } else {
            HitClass::Other
        }
    }

    fn set_focus(&mut self, focused: bool) {
        let next = if focused {
            FocusState::Focused
        } else {
            FocusState::Unfocused
        };
        if self.focus == next {
            return;
        }
        self.focus = next;
        self.signal.set(focused, self.config.side);
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_focus_change();
            }
        }
        self.log(
            LogLevel::Info,
            if focused { "focus_gained" } else { "focus_lost" },
            [json_kv("missed_ticks", json!(self.missed))],
        );
    }

    fn on_tick(&mut self, ctx: &mut RuntimeContext<'_>) {
        if !self.active {
            return;
        }
        let (Some(target), Some(anchor)) = (self.target, self.anchor) else {
            return;
        };

        // The sensor is restarted opportunistically; a failed start is a
        // miss this tick, not a terminal condition.
        if !self.sensor.is_running() && !self.sensor.start() {
            return;
        }

        let class = self.classify(target, anchor);
        match class {
            HitClass::Target => {
                self.missed = 0;
                self.set_focus(true);
                if ctx.panel_driver().is_none() {
                    let position = anchor.panel_point(
                        self.config.forward_offset,
                        self.config.side,
                        self.config.lateral_magnitude,
                    );
                    ctx.request_panel_open(PanelDriver::Gaze, position, self.config.side);
                }
            }
            HitClass::AttachedSurface if self.config.panel_hit_sustains_focus => {
                self.missed = 0;
            }
            HitClass::Exempt if self.config.exempt_hit_sustains_focus => {
                self.missed = 0;
            }
            HitClass::AttachedSurface | HitClass::Exempt | HitClass::Other | HitClass::Miss => {
                self.missed = self.missed.saturating_add(1);
                if self.missed >= self.config.miss_threshold {
                    self.set_focus(false);
                    ctx.request_panel_close(PanelDriver::Gaze);
                }
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(level, "gazekit::gaze", message, fields);
            let _ = logger.log_event(event);
        }
    }
}

impl InteractionFeature for GazeFocusTracker {
    fn name(&self) -> &str {
        "gaze.focus_tracker"
    }

    fn init(&mut self, _ctx: &mut RuntimeContext<'_>) -> Result<()> {
        if !self.sensor.start() {
            // Tick retries; log so a persistently dead sensor is visible.
            self.log(LogLevel::Warn, "gaze_sensor_start_failed", std::iter::empty());
        }
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
            RuntimeEvent::Suspended | RuntimeEvent::Resumed => {}
        }
        Ok(EventFlow::Continue)
    }

    fn teardown(&mut self, ctx: &mut RuntimeContext<'_>) -> Result<()> {
        self.sensor.stop();
        self.active = false;
        self.set_focus(false);
        ctx.request_panel_close(PanelDriver::Gaze);
        self.log(LogLevel::Info, "gaze_tracking_stopped", std::iter::empty());
        Ok(())
    }
}
