//! Scripted port implementations for deterministic runs.
//!
//! Each double is a cloneable handle over shared state, so a test or bench
//! can keep one clone to feed signals and inspect calls while the component
//! owns the other. Queued values are consumed front-to-back; when a queue is
//! empty the configured default applies.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::geometry::Vec3;
use crate::ports::{
    CameraService, DecoderFault, GazeSensor, PrivilegeId, PrivilegeService, PrivilegeUpdate,
    RawFrame, RayCaster, RayHit, SymbolDecoder, TriggerEvent, TriggerInput,
};

fn lock<T>(inner: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    inner.lock().expect("scripted port mutex poisoned")
}

#[derive(Default)]
struct GazeSensorState {
    start_ok: bool,
    running: bool,
    start_calls: u32,
    points: VecDeque<Option<Vec3>>,
    default_point: Option<Vec3>,
}

/// Scripted gaze sensor. Fixation points are served from the queue, falling
/// back to the configured default point.
#[derive(Clone)]
pub struct ScriptedGazeSensor {
    inner: Arc<Mutex<GazeSensorState>>,
}

impl ScriptedGazeSensor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(GazeSensorState {
                start_ok: true,
                ..GazeSensorState::default()
            })),
        }
    }

    pub fn failing() -> Self {
        let sensor = Self::new();
        lock(&sensor.inner).start_ok = false;
        sensor
    }

    pub fn with_default_point(self, point: Vec3) -> Self {
        lock(&self.inner).default_point = Some(point);
        self
    }

    pub fn push_point(&self, point: Option<Vec3>) {
        lock(&self.inner).points.push_back(point);
    }

    pub fn start_calls(&self) -> u32 {
        lock(&self.inner).start_calls
    }

    pub fn running(&self) -> bool {
        lock(&self.inner).running
    }
}

impl Default for ScriptedGazeSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl GazeSensor for ScriptedGazeSensor {
    fn start(&mut self) -> bool {
        let mut state = lock(&self.inner);
        state.start_calls += 1;
        state.running = state.start_ok;
        state.start_ok
    }

    fn stop(&mut self) {
        lock(&self.inner).running = false;
    }

    fn is_running(&self) -> bool {
        lock(&self.inner).running
    }

    fn fixation_point(&mut self) -> Option<Vec3> {
        let mut state = lock(&self.inner);
        match state.points.pop_front() {
            Some(point) => point,
            None => state.default_point,
        }
    }
}

#[derive(Default)]
struct RayCasterState {
    hits: VecDeque<Option<RayHit>>,
    default_hit: Option<RayHit>,
    casts: Vec<(Vec3, Vec3, f32)>,
}

/// Scripted ray intersection service recording every cast.
#[derive(Clone, Default)]
pub struct ScriptedRayCaster {
    inner: Arc<Mutex<RayCasterState>>,
}

impl ScriptedRayCaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_hit(self, hit: RayHit) -> Self {
        lock(&self.inner).default_hit = Some(hit);
        self
    }

    pub fn push_hit(&self, hit: Option<RayHit>) {
        lock(&self.inner).hits.push_back(hit);
    }

    pub fn casts(&self) -> Vec<(Vec3, Vec3, f32)> {
        lock(&self.inner).casts.clone()
    }
}

impl RayCaster for ScriptedRayCaster {
    fn cast(&mut self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        let mut state = lock(&self.inner);
        state.casts.push((origin, direction, max_distance));
        match state.hits.pop_front() {
            Some(hit) => hit,
            None => state.default_hit,
        }
    }
}

#[derive(Default)]
struct PrivilegeServiceState {
    start_ok: bool,
    started: bool,
    stop_calls: u32,
    fail_enqueue: HashSet<PrivilegeId>,
    requested: Vec<PrivilegeId>,
    pending: VecDeque<PrivilegeUpdate>,
}

/// Scripted privilege subsystem. Grant/deny outcomes are queued by the test
/// and drained by the component on later ticks.
#[derive(Clone)]
pub struct ScriptedPrivilegeService {
    inner: Arc<Mutex<PrivilegeServiceState>>,
}

impl ScriptedPrivilegeService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PrivilegeServiceState {
                start_ok: true,
                ..PrivilegeServiceState::default()
            })),
        }
    }

    pub fn failing() -> Self {
        let service = Self::new();
        lock(&service.inner).start_ok = false;
        service
    }

    /// Make `request` refuse to enqueue the given identifier.
    pub fn fail_enqueue(&self, id: impl Into<PrivilegeId>) {
        lock(&self.inner).fail_enqueue.insert(id.into());
    }

    pub fn push_update(&self, id: impl Into<PrivilegeId>, granted: bool) {
        lock(&self.inner).pending.push_back(PrivilegeUpdate {
            id: id.into(),
            granted,
        });
    }

    pub fn requested(&self) -> Vec<PrivilegeId> {
        lock(&self.inner).requested.clone()
    }

    pub fn started(&self) -> bool {
        lock(&self.inner).started
    }

    pub fn stop_calls(&self) -> u32 {
        lock(&self.inner).stop_calls
    }
}

impl Default for ScriptedPrivilegeService {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeService for ScriptedPrivilegeService {
    fn start(&mut self) -> bool {
        let mut state = lock(&self.inner);
        state.started = state.start_ok;
        state.start_ok
    }

    fn stop(&mut self) {
        let mut state = lock(&self.inner);
        state.started = false;
        state.stop_calls += 1;
    }

    fn request(&mut self, id: &PrivilegeId) -> bool {
        let mut state = lock(&self.inner);
        if state.fail_enqueue.contains(id) {
            return false;
        }
        state.requested.push(id.clone());
        true
    }

    fn poll_updates(&mut self) -> Vec<PrivilegeUpdate> {
        lock(&self.inner).pending.drain(..).collect()
    }
}

#[derive(Default)]
struct CameraState {
    start_ok: bool,
    connect_ok: bool,
    capture_ok: bool,
    started: bool,
    connected: bool,
    capture_calls: u32,
    disconnect_calls: u32,
    stop_calls: u32,
    frames: VecDeque<RawFrame>,
}

/// Scripted camera hardware. Captured frames are queued by the test and
/// surface through `poll_frame` as if the completion fired later.
#[derive(Clone)]
pub struct ScriptedCamera {
    inner: Arc<Mutex<CameraState>>,
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CameraState {
                start_ok: true,
                connect_ok: true,
                capture_ok: true,
                ..CameraState::default()
            })),
        }
    }

    pub fn failing_start() -> Self {
        let camera = Self::new();
        lock(&camera.inner).start_ok = false;
        camera
    }

    pub fn failing_connect() -> Self {
        let camera = Self::new();
        lock(&camera.inner).connect_ok = false;
        camera
    }

    pub fn refuse_capture(&self) {
        lock(&self.inner).capture_ok = false;
    }

    pub fn push_frame(&self, frame: RawFrame) {
        lock(&self.inner).frames.push_back(frame);
    }

    pub fn pending_frames(&self) -> usize {
        lock(&self.inner).frames.len()
    }

    pub fn started(&self) -> bool {
        lock(&self.inner).started
    }

    pub fn connected(&self) -> bool {
        lock(&self.inner).connected
    }

    pub fn capture_calls(&self) -> u32 {
        lock(&self.inner).capture_calls
    }

    pub fn disconnect_calls(&self) -> u32 {
        lock(&self.inner).disconnect_calls
    }

    pub fn stop_calls(&self) -> u32 {
        lock(&self.inner).stop_calls
    }
}

impl Default for ScriptedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraService for ScriptedCamera {
    fn start(&mut self) -> bool {
        let mut state = lock(&self.inner);
        state.started = state.start_ok;
        state.start_ok
    }

    fn connect(&mut self) -> bool {
        let mut state = lock(&self.inner);
        state.connected = state.started && state.connect_ok;
        state.connected
    }

    fn disconnect(&mut self) {
        let mut state = lock(&self.inner);
        state.connected = false;
        state.disconnect_calls += 1;
    }

    fn stop(&mut self) {
        let mut state = lock(&self.inner);
        state.started = false;
        state.stop_calls += 1;
    }

    fn capture_async(&mut self) -> bool {
        let mut state = lock(&self.inner);
        if !state.started || !state.connected || !state.capture_ok {
            return false;
        }
        state.capture_calls += 1;
        true
    }

    fn poll_frame(&mut self) -> Option<RawFrame> {
        lock(&self.inner).frames.pop_front()
    }
}

#[derive(Default)]
struct TriggerState {
    start_ok: bool,
    started: bool,
    stop_calls: u32,
    events: VecDeque<TriggerEvent>,
}

/// Scripted controller input.
#[derive(Clone)]
pub struct ScriptedTrigger {
    inner: Arc<Mutex<TriggerState>>,
}

impl ScriptedTrigger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TriggerState {
                start_ok: true,
                ..TriggerState::default()
            })),
        }
    }

    pub fn failing() -> Self {
        let trigger = Self::new();
        lock(&trigger.inner).start_ok = false;
        trigger
    }

    /// Deliver one controller event. Presses only land while the
    /// subscription is live; anything pushed while stopped is lost, the
    /// same way an unregistered callback never fires.
    pub fn push_event(&self, event: TriggerEvent) {
        let mut state = lock(&self.inner);
        if !state.started {
            return;
        }
        state.events.push_back(event);
    }

    pub fn started(&self) -> bool {
        lock(&self.inner).started
    }

    pub fn stop_calls(&self) -> u32 {
        lock(&self.inner).stop_calls
    }
}

impl Default for ScriptedTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerInput for ScriptedTrigger {
    fn start(&mut self) -> bool {
        let mut state = lock(&self.inner);
        state.started = state.start_ok;
        state.start_ok
    }

    fn stop(&mut self) {
        let mut state = lock(&self.inner);
        state.started = false;
        state.stop_calls += 1;
        // Undelivered events die with the subscription.
        state.events.clear();
    }

    fn poll_events(&mut self) -> Vec<TriggerEvent> {
        let mut state = lock(&self.inner);
        if !state.started {
            return Vec::new();
        }
        state.events.drain(..).collect()
    }
}

type DecodeScript = VecDeque<Result<Option<String>, DecoderFault>>;

#[derive(Default)]
struct DecoderState {
    script: DecodeScript,
    decode_calls: u32,
}

/// Scripted decode capability. Each queued result answers one decode call;
/// an exhausted script reports "no payload".
#[derive(Clone, Default)]
pub struct ScriptedDecoder {
    inner: Arc<Mutex<DecoderState>>,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(self, text: impl Into<String>) -> Self {
        self.push_result(Ok(Some(text.into())));
        self
    }

    pub fn with_fault(self, message: impl Into<String>) -> Self {
        self.push_result(Err(DecoderFault(message.into())));
        self
    }

    pub fn push_result(&self, result: Result<Option<String>, DecoderFault>) {
        lock(&self.inner).script.push_back(result);
    }

    pub fn decode_calls(&self) -> u32 {
        lock(&self.inner).decode_calls
    }
}

impl SymbolDecoder for ScriptedDecoder {
    fn decode(
        &mut self,
        _bytes: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Option<String>, DecoderFault> {
        let mut state = lock(&self.inner);
        state.decode_calls += 1;
        state.script.pop_front().unwrap_or(Ok(None))
    }
}
