//! Screen recognition and input injection.
//!
//! [`ScreenEngine`] is the raw capability: capture, template lookup in
//! physical capture pixels, pointer and keyboard injection, clipboard.
//! [`Screen`] wraps an engine with display-scale correction, paced input and
//! the confidence-ladder wait primitive the workflow gates on.

use crate::errors::AutomationError;
use crate::templates::Template;
use std::sync::Arc;
use std::time::Duration;

pub mod desktop;
pub mod keys;
pub mod locator;

pub use keys::Key;
pub use locator::{ConfidenceLadder, Screen};

/// A screen coordinate. Physical when it comes from a capture, logical when
/// it goes to the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.0}, {:.0})", self.x, self.y)
    }
}

pub trait ScreenEngine: Send + Sync {
    /// Size of the logical input space (what the pointer addresses).
    fn display_size(&self) -> Result<(f64, f64), AutomationError>;

    /// Size of a physical capture of the primary monitor.
    fn capture_size(&self) -> Result<(f64, f64), AutomationError>;

    /// Center of the best match of `template` in capture pixels and its
    /// normalised score. One capture per call.
    fn best_match(&self, template: &Template) -> Result<Option<(Point, f32)>, AutomationError>;

    /// Moves to a logical point over `travel` and left-clicks.
    fn click_at(&self, point: Point, travel: Duration) -> Result<(), AutomationError>;

    fn move_to(&self, point: Point, travel: Duration) -> Result<(), AutomationError>;

    fn press_key(&self, key: Key) -> Result<(), AutomationError>;

    /// Holds `modifiers` in order, taps `key`, releases in reverse.
    fn hotkey(&self, modifiers: &[Key], key: Key) -> Result<(), AutomationError>;

    fn set_clipboard(&self, text: &str) -> Result<(), AutomationError>;

    /// Literal keystrokes, used when clipboard paste fails.
    fn type_literal(&self, text: &str) -> Result<(), AutomationError>;
}

/// Create the engine for the current desktop session.
pub fn create_engine() -> Result<Arc<dyn ScreenEngine>, AutomationError> {
    Ok(Arc::new(desktop::DesktopEngine::new()?))
}
