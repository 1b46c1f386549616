use blake3::Hash;

use crate::geometry::{Side, Vec3};

/// Which interaction path currently drives the panel. The panel is an
/// exclusive resource: while one driver holds it open, requests from the
/// other are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelDriver {
    Gaze,
    Capture,
}

/// Anchored placement of an open panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelPlacement {
    pub position: Vec3,
    pub side: Side,
}

/// Last known panel state handed to the host for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSnapshot {
    pub open: bool,
    pub placement: Option<PanelPlacement>,
    pub text: String,
}

/// Owns the attached panel's open/closed flag, placement, and display text.
///
/// Open and close are idempotent; a second identical request is a no-op and
/// reports `false`. Text updates are hash-deduplicated so re-decoding the
/// same payload does not mark the panel dirty.
#[derive(Debug, Default)]
pub struct AttachedPanelController {
    open_by: Option<PanelDriver>,
    placement: Option<PanelPlacement>,
    text: String,
    text_hash: Option<Hash>,
    dirty: bool,
}

impl AttachedPanelController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open_by.is_some()
    }

    pub fn driver(&self) -> Option<PanelDriver> {
        self.open_by
    }

    pub fn placement(&self) -> Option<PanelPlacement> {
        self.placement
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Open the panel for `driver` at the given placement. Rejected while the
    /// panel is already open, including when the same driver asks again.
    pub fn request_open(&mut self, driver: PanelDriver, position: Vec3, side: Side) -> bool {
        if self.open_by.is_some() {
            return false;
        }
        self.open_by = Some(driver);
        self.placement = Some(PanelPlacement { position, side });
        self.dirty = true;
        true
    }

    /// Close the panel if `driver` is the one holding it open. A close from
    /// the non-owning driver is a no-op.
    pub fn request_close(&mut self, driver: PanelDriver) -> bool {
        if self.open_by != Some(driver) {
            return false;
        }
        self.open_by = None;
        self.placement = None;
        self.dirty = true;
        true
    }

    /// Unconditional close used on teardown, regardless of owner.
    pub fn force_close(&mut self) -> bool {
        if self.open_by.is_none() {
            return false;
        }
        self.open_by = None;
        self.placement = None;
        self.dirty = true;
        true
    }

    /// Replace the display text. Returns whether the content changed.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        let new_hash = blake3::hash(text.as_bytes());
        if self.text_hash.map(|h| h == new_hash).unwrap_or(false) {
            return false;
        }
        self.text = text;
        self.text_hash = Some(new_hash);
        self.dirty = true;
        true
    }

    /// Drain the dirty flag, returning a snapshot when anything changed since
    /// the last call. The host renders from this.
    pub fn take_update(&mut self) -> Option<PanelSnapshot> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(PanelSnapshot {
            open: self.is_open(),
            placement: self.placement,
            text: self.text.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Vec3 {
        Vec3::new(1.0, 2.0, 3.0)
    }

    #[test]
    fn open_is_idempotent() {
        let mut panel = AttachedPanelController::new();
        assert!(panel.request_open(PanelDriver::Gaze, position(), Side::Left));
        assert!(!panel.request_open(PanelDriver::Gaze, position(), Side::Left));
        assert!(panel.is_open());
    }

    #[test]
    fn second_driver_is_rejected_until_closed() {
        let mut panel = AttachedPanelController::new();
        assert!(panel.request_open(PanelDriver::Gaze, position(), Side::Left));
        assert!(!panel.request_open(PanelDriver::Capture, position(), Side::Right));
        assert_eq!(panel.driver(), Some(PanelDriver::Gaze));

        assert!(panel.request_close(PanelDriver::Gaze));
        assert!(panel.request_open(PanelDriver::Capture, position(), Side::Right));
        assert_eq!(panel.driver(), Some(PanelDriver::Capture));
    }

    #[test]
    fn close_by_non_owner_is_noop() {
        let mut panel = AttachedPanelController::new();
        panel.request_open(PanelDriver::Capture, position(), Side::Right);
        assert!(!panel.request_close(PanelDriver::Gaze));
        assert!(panel.is_open());
    }

    #[test]
    fn close_is_idempotent() {
        let mut panel = AttachedPanelController::new();
        assert!(!panel.request_close(PanelDriver::Gaze));
        panel.request_open(PanelDriver::Gaze, position(), Side::Left);
        assert!(panel.request_close(PanelDriver::Gaze));
        assert!(!panel.request_close(PanelDriver::Gaze));
    }

    #[test]
    fn force_close_ignores_owner() {
        let mut panel = AttachedPanelController::new();
        panel.request_open(PanelDriver::Capture, position(), Side::Right);
        assert!(panel.force_close());
        assert!(!panel.is_open());
        assert!(panel.placement().is_none());
        assert!(!panel.force_close());
    }

    #[test]
    fn set_text_detects_changes() {
        let mut panel = AttachedPanelController::new();
        assert!(panel.set_text("hello"));
        panel.take_update();
        assert!(!panel.set_text("hello"));
        assert!(panel.take_update().is_none());
        assert!(panel.set_text("world"));
        let snapshot = panel.take_update().unwrap();
        assert_eq!(snapshot.text, "world");
    }

    #[test]
    fn take_update_reports_placement() {
        let mut panel = AttachedPanelController::new();
        panel.request_open(PanelDriver::Gaze, position(), Side::Right);
        let snapshot = panel.take_update().unwrap();
        assert!(snapshot.open);
        assert_eq!(
            snapshot.placement,
            Some(PanelPlacement {
                position: position(),
                side: Side::Right,
            })
        );
        assert!(panel.take_update().is_none());
    }
}
