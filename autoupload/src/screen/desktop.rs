//! Engine backed by the real desktop: `xcap` capture, `imageproc` template
//! matching, `rdev` input injection and `arboard` clipboard.

use super::keys::char_key;
use super::{Key, Point, ScreenEngine};
use crate::errors::AutomationError;
use crate::templates::Template;
use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use rdev::{simulate, Button, EventType};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

// Delay between synthetic events so the OS registers each one.
const EVENT_GAP: Duration = Duration::from_millis(20);
const TRAVEL_STEPS: u32 = 12;
// Matching runs on images shrunk by this factor.
const DEFAULT_DOWNSAMPLE: u32 = 2;

pub struct DesktopEngine {
    templates: Mutex<HashMap<PathBuf, Arc<GrayImage>>>,
    cursor: Mutex<Option<Point>>,
    downsample: u32,
}

impl DesktopEngine {
    pub fn new() -> Result<Self, AutomationError> {
        primary_monitor()?;
        Ok(Self {
            templates: Mutex::new(HashMap::new()),
            cursor: Mutex::new(None),
            downsample: DEFAULT_DOWNSAMPLE,
        })
    }

    fn template_image(&self, template: &Template) -> Result<Arc<GrayImage>, AutomationError> {
        let mut cache = self.templates.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(img) = cache.get(&template.path) {
            return Ok(img.clone());
        }
        let img = image::open(&template.path)
            .map_err(|e| {
                AutomationError::PlatformError(format!(
                    "Failed to load template {}: {e}",
                    template.path.display()
                ))
            })?
            .to_luma8();
        let img = Arc::new(self.shrink(&img));
        cache.insert(template.path.clone(), img.clone());
        Ok(img)
    }

    fn shrink(&self, img: &GrayImage) -> GrayImage {
        if self.downsample <= 1 {
            return img.clone();
        }
        let w = (img.width() / self.downsample).max(1);
        let h = (img.height() / self.downsample).max(1);
        imageops::resize(img, w, h, FilterType::Triangle)
    }

    fn capture_gray(&self) -> Result<GrayImage, AutomationError> {
        let monitor = primary_monitor()?;
        let image = monitor.capture_image().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to capture screen: {e}"))
        })?;
        Ok(imageops::grayscale(&image))
    }

    fn send(&self, event: EventType) -> Result<(), AutomationError> {
        simulate(&event).map_err(|e| {
            AutomationError::PlatformError(format!("Failed to send {event:?}: {e:?}"))
        })?;
        thread::sleep(EVENT_GAP);
        Ok(())
    }

    fn tap(&self, key: rdev::Key) -> Result<(), AutomationError> {
        self.send(EventType::KeyPress(key))?;
        self.send(EventType::KeyRelease(key))
    }
}

fn primary_monitor() -> Result<xcap::Monitor, AutomationError> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| AutomationError::PlatformError(format!("Failed to get monitors: {e}")))?;
    let mut fallback = None;
    for monitor in monitors {
        match monitor.is_primary() {
            Ok(true) => return Ok(monitor),
            Ok(false) => {
                if fallback.is_none() {
                    fallback = Some(monitor);
                }
            }
            Err(e) => {
                return Err(AutomationError::PlatformError(format!(
                    "Error checking monitor primary status: {e}"
                )));
            }
        }
    }
    fallback.ok_or_else(|| AutomationError::PlatformError("No monitor found".to_string()))
}

impl ScreenEngine for DesktopEngine {
    fn display_size(&self) -> Result<(f64, f64), AutomationError> {
        let (w, h) = rdev::display_size().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to read display size: {e:?}"))
        })?;
        Ok((w as f64, h as f64))
    }

    fn capture_size(&self) -> Result<(f64, f64), AutomationError> {
        let shot = self.capture_gray()?;
        Ok((shot.width() as f64, shot.height() as f64))
    }

    fn best_match(&self, template: &Template) -> Result<Option<(Point, f32)>, AutomationError> {
        let needle = self.template_image(template)?;
        let haystack = self.shrink(&self.capture_gray()?);
        if needle.width() > haystack.width() || needle.height() > haystack.height() {
            warn!("Template {} is larger than the screen", template.marker);
            return Ok(None);
        }

        let scores = match_template(
            &haystack,
            &needle,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&scores);
        debug!("Best score for {}: {:.3}", template.marker, extremes.max_value);

        let (x, y) = extremes.max_value_location;
        let factor = self.downsample as f64;
        let center = Point::new(
            (x as f64 + needle.width() as f64 / 2.0) * factor,
            (y as f64 + needle.height() as f64 / 2.0) * factor,
        );
        Ok(Some((center, extremes.max_value)))
    }

    fn click_at(&self, point: Point, travel: Duration) -> Result<(), AutomationError> {
        self.move_to(point, travel)?;
        self.send(EventType::ButtonPress(Button::Left))?;
        self.send(EventType::ButtonRelease(Button::Left))
    }

    fn move_to(&self, point: Point, travel: Duration) -> Result<(), AutomationError> {
        let start = *self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        // Position unknown until our first move: jump straight there.
        if let Some(start) = start {
            let step_gap = travel / TRAVEL_STEPS;
            for step in 1..TRAVEL_STEPS {
                let t = step as f64 / TRAVEL_STEPS as f64;
                self.send(EventType::MouseMove {
                    x: start.x + (point.x - start.x) * t,
                    y: start.y + (point.y - start.y) * t,
                })?;
                thread::sleep(step_gap.saturating_sub(EVENT_GAP));
            }
        }
        self.send(EventType::MouseMove {
            x: point.x,
            y: point.y,
        })?;
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner()) = Some(point);
        Ok(())
    }

    fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        if let Key::Char(c) = key {
            return self.type_literal(&c.to_string());
        }
        let raw = key.to_rdev().ok_or_else(|| {
            AutomationError::InvalidArgument(format!("No key mapping for {key:?}"))
        })?;
        self.tap(raw)
    }

    fn hotkey(&self, modifiers: &[Key], key: Key) -> Result<(), AutomationError> {
        let mods = modifiers
            .iter()
            .map(|m| {
                m.to_rdev().ok_or_else(|| {
                    AutomationError::InvalidArgument(format!("No key mapping for {m:?}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let raw = key.to_rdev().ok_or_else(|| {
            AutomationError::InvalidArgument(format!("No key mapping for {key:?}"))
        })?;

        for m in &mods {
            self.send(EventType::KeyPress(*m))?;
        }
        let tapped = self.tap(raw);
        for m in mods.iter().rev() {
            self.send(EventType::KeyRelease(*m))?;
        }
        tapped
    }

    fn set_clipboard(&self, text: &str) -> Result<(), AutomationError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to access clipboard: {e}"))
        })?;
        clipboard.set_text(text.to_string()).map_err(|e| {
            AutomationError::PlatformError(format!("Failed to set clipboard: {e}"))
        })
    }

    fn type_literal(&self, text: &str) -> Result<(), AutomationError> {
        for c in text.chars() {
            let Some((key, shifted)) = char_key(c) else {
                warn!("Cannot type {c:?} without clipboard, skipped");
                continue;
            };
            if shifted {
                self.send(EventType::KeyPress(rdev::Key::ShiftLeft))?;
            }
            let tapped = self.tap(key);
            if shifted {
                self.send(EventType::KeyRelease(rdev::Key::ShiftLeft))?;
            }
            tapped?;
        }
        Ok(())
    }
}
