use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated by the interaction runtime across its lifetime.
#[derive(Debug, Default, Clone)]
pub struct RuntimeMetrics {
    ticks: u64,
    events: u64,
    focus_changes: u64,
    panel_opens: u64,
    panel_closes: u64,
    captures: u64,
    decode_hits: u64,
    decode_misses: u64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub fn record_event(&mut self) {
        self.events = self.events.saturating_add(1);
    }

    pub fn record_focus_change(&mut self) {
        self.focus_changes = self.focus_changes.saturating_add(1);
    }

    pub fn record_panel_open(&mut self) {
        self.panel_opens = self.panel_opens.saturating_add(1);
    }

    pub fn record_panel_close(&mut self) {
        self.panel_closes = self.panel_closes.saturating_add(1);
    }

    pub fn record_capture(&mut self) {
        self.captures = self.captures.saturating_add(1);
    }

    pub fn record_decode(&mut self, found_payload: bool) {
        if found_payload {
            self.decode_hits = self.decode_hits.saturating_add(1);
        } else {
            self.decode_misses = self.decode_misses.saturating_add(1);
        }
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            ticks: self.ticks,
            events: self.events,
            focus_changes: self.focus_changes,
            panel_opens: self.panel_opens,
            panel_closes: self.panel_closes,
            captures: self.captures,
            decode_hits: self.decode_hits,
            decode_misses: self.decode_misses,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub ticks: u64,
    pub events: u64,
    pub focus_changes: u64,
    pub panel_opens: u64,
    pub panel_closes: u64,
    pub captures: u64,
    pub decode_hits: u64,
    pub decode_misses: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("ticks".to_string(), json!(self.ticks));
        map.insert("events".to_string(), json!(self.events));
        map.insert("focus_changes".to_string(), json!(self.focus_changes));
        map.insert("panel_opens".to_string(), json!(self.panel_opens));
        map.insert("panel_closes".to_string(), json!(self.panel_closes));
        map.insert("captures".to_string(), json!(self.captures));
        map.insert("decode_hits".to_string(), json!(self.decode_hits));
        map.insert("decode_misses".to_string(), json!(self.decode_misses));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "runtime_metrics".to_string(),
            self.as_fields(),
        )
    }
}
