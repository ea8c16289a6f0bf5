use super::{Key, Point, ScreenEngine};
use crate::errors::AutomationError;
use crate::pacing::{Pacing, Pause};
use crate::templates::{Marker, TemplateSet};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Confidence thresholds tried in order on every polling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceLadder(Vec<f32>);

impl ConfidenceLadder {
    pub fn exact(confidence: f32) -> Self {
        Self(vec![confidence])
    }

    /// The click ladder: configured level first, then 0.80 down to 0.60.
    pub fn descending(confidence: f32) -> Self {
        Self(vec![confidence, 0.80, 0.75, 0.70, 0.65, 0.60])
    }

    /// Shorter ladder for the step-2 upload button, floor 0.70.
    pub fn upload_button(confidence: f32) -> Self {
        Self(vec![confidence, 0.80, 0.75, 0.70])
    }

    pub fn levels(&self) -> &[f32] {
        &self.0
    }
}

/// Screen locator: template lookup plus paced, scale-corrected input.
///
/// Never call concurrently with itself: it drives the one physical pointer.
pub struct Screen {
    engine: Arc<dyn ScreenEngine>,
    templates: TemplateSet,
    pacing: Pacing,
    scale: OnceCell<(f64, f64)>,
}

impl Screen {
    pub fn new(engine: Arc<dyn ScreenEngine>, templates: TemplateSet, pacing: Pacing) -> Self {
        Self {
            engine,
            templates,
            pacing,
            scale: OnceCell::new(),
        }
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    pub async fn pause(&self, pause: Pause) {
        self.pacing.pause(pause).await
    }

    /// Capture pixels per logical pixel, computed once.
    pub fn scale(&self) -> (f64, f64) {
        self.scale
            .get_or_try_init(|| -> Result<(f64, f64), AutomationError> {
                let (dw, dh) = self.engine.display_size()?;
                let (cw, ch) = self.engine.capture_size()?;
                let sx = if dw > 0.0 { cw / dw } else { 1.0 };
                let sy = if dh > 0.0 { ch / dh } else { 1.0 };
                info!("Display scale: {sx:.2} x {sy:.2}");
                Ok((sx, sy))
            })
            .copied()
            .unwrap_or_else(|e| {
                warn!("Could not compute display scale, assuming 1.0: {e}");
                (1.0, 1.0)
            })
    }

    pub fn to_logical(&self, physical: Point) -> Point {
        let (sx, sy) = self.scale();
        Point::new((physical.x / sx).trunc(), (physical.y / sy).trunc())
    }

    /// Best match of `marker` on the current screen. Engine errors count as a miss.
    fn best_match(&self, marker: Marker) -> Option<(Point, f32)> {
        let template = self.templates.resolve(marker);
        match self.engine.best_match(&template) {
            Ok(found) => found,
            Err(e) => {
                debug!("Lookup of {marker} failed: {e}");
                None
            }
        }
    }

    /// One capture, accepted when the score reaches `confidence`.
    pub fn locate(&self, marker: Marker, confidence: f32) -> Option<Point> {
        self.best_match(marker)
            .filter(|(_, score)| *score >= confidence)
            .map(|(pos, _)| pos)
    }

    pub fn is_visible(&self, marker: Marker, confidence: f32) -> bool {
        self.locate(marker, confidence).is_some()
    }

    /// One capture, scored against the ladder. Returns the first level the
    /// match reaches.
    pub fn locate_any(&self, marker: Marker, ladder: &ConfidenceLadder) -> Option<(Point, f32)> {
        let (pos, score) = self.best_match(marker)?;
        ladder
            .levels()
            .iter()
            .find(|&&level| score >= level)
            .map(|&level| (pos, level))
    }

    /// Polls until `marker` appears or `timeout` elapses, sweeping the whole
    /// ladder on every pass.
    #[instrument(level = "debug", skip(self, ladder))]
    pub async fn await_marker(
        &self,
        marker: Marker,
        timeout: Duration,
        ladder: &ConfidenceLadder,
    ) -> Result<Point, AutomationError> {
        info!("Waiting for {marker}...");
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some((pos, conf)) = self.locate_any(marker, ladder) {
                info!("Found {marker} at {pos} conf={conf:.2}");
                return Ok(pos);
            }
            tokio::time::sleep(self.pacing.retry_interval()).await;
        }
        warn!("Not found: {marker}");
        Err(AutomationError::RecognitionTimeout(format!(
            "{marker} not seen within {}s",
            timeout.as_secs()
        )))
    }

    pub async fn wait_for(
        &self,
        marker: Marker,
        timeout: Duration,
        confidence: f32,
    ) -> Result<Point, AutomationError> {
        self.await_marker(marker, timeout, &ConfidenceLadder::exact(confidence))
            .await
    }

    /// Waits with the descending ladder, then clicks the match.
    pub async fn click_marker(
        &self,
        marker: Marker,
        timeout: Duration,
        confidence: f32,
    ) -> Result<Point, AutomationError> {
        let pos = self
            .await_marker(marker, timeout, &ConfidenceLadder::descending(confidence))
            .await?;
        self.click(pos)?;
        Ok(pos)
    }

    /// Clicks a physical (capture-space) point.
    pub fn click(&self, physical: Point) -> Result<(), AutomationError> {
        let logical = self.to_logical(physical);
        self.engine.click_at(logical, self.pacing.mouse_travel())
    }

    /// Parks the pointer in the corner so it does not cover a marker.
    pub fn move_away(&self) -> Result<(), AutomationError> {
        self.engine
            .move_to(Point::new(10.0, 10.0), Duration::from_millis(100))
    }

    pub fn key(&self, key: Key) -> Result<(), AutomationError> {
        self.engine.press_key(key)
    }

    /// Presses `key` `times` times with a `pause` after each.
    pub async fn press(&self, key: Key, times: usize, pause: Pause) -> Result<(), AutomationError> {
        for _ in 0..times {
            self.engine.press_key(key)?;
            self.pacing.pause(pause).await;
        }
        Ok(())
    }

    pub fn hotkey(&self, modifiers: &[Key], key: Key) -> Result<(), AutomationError> {
        self.engine.hotkey(modifiers, key)
    }

    pub async fn ctrl(&self, c: char) -> Result<(), AutomationError> {
        self.engine.hotkey(&[Key::Ctrl], Key::Char(c))?;
        self.pacing.pause(Pause::Tiny).await;
        Ok(())
    }

    /// Clipboard paste of `text`, typed key by key when the clipboard is
    /// unavailable.
    pub async fn paste_text(&self, text: &str) -> Result<(), AutomationError> {
        if let Err(e) = self.engine.set_clipboard(text) {
            warn!("Paste failed, typing instead: {e}");
            self.engine.type_literal(text)?;
            self.pacing.pause(Pause::Tiny).await;
            return Ok(());
        }
        self.pacing.pause(Pause::Tiny).await;
        self.engine.hotkey(&[Key::Ctrl], Key::Char('v'))?;
        self.pacing.pause(Pause::Tiny).await;
        Ok(())
    }
}
