mod cache_tests;
mod queue_tests;
mod workflow_tests;

use crate::browser::BrowserControl;
use crate::cache::RowMatrix;
use crate::clock::Clock;
use crate::config::Timing;
use crate::errors::AutomationError;
use crate::job::{input_col, source_col};
use crate::pacing::Pacing;
use crate::screen::{Key, Point, Screen, ScreenEngine};
use crate::sheets::SheetBackend;
use crate::templates::{Marker, Template, TemplateSet};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_test_writer()
        .try_init();
}

pub fn local_time(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
    let naive = NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, 0))
        .expect("valid test date");
    Local
        .from_local_datetime(&naive)
        .earliest()
        .expect("representable local time")
}

pub struct FakeClock {
    now: Mutex<DateTime<Local>>,
}

impl FakeClock {
    pub fn at(now: DateTime<Local>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub sheet: String,
    pub row: usize,
    pub col: usize,
    pub value: String,
}

/// In-memory sheets. Reads can be scripted to fail with a rate limit.
#[derive(Default)]
pub struct FakeSheets {
    sheets: Mutex<HashMap<String, RowMatrix>>,
    reads: AtomicUsize,
    rate_limited_reads: AtomicU32,
    always_rate_limited: std::sync::atomic::AtomicBool,
    writes: Mutex<Vec<CellWrite>>,
}

impl FakeSheets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_rows(&self, sheet: &str, rows: RowMatrix) {
        self.sheets.lock().unwrap().insert(sheet.to_string(), rows);
    }

    pub fn rows(&self, sheet: &str) -> RowMatrix {
        self.sheets.lock().unwrap().get(sheet).cloned().unwrap_or_default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<CellWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// The next `n` reads fail with HTTP 429.
    pub fn fail_reads_with_quota(&self, n: u32) {
        self.rate_limited_reads.store(n, Ordering::SeqCst);
    }

    pub fn quota_exhausted(&self) {
        self.always_rate_limited.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SheetBackend for FakeSheets {
    async fn get_all_values(&self, sheet: &str) -> Result<RowMatrix, AutomationError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.always_rate_limited.load(Ordering::SeqCst) {
            return Err(AutomationError::RateLimited("429 Quota exceeded".to_string()));
        }
        let scripted = self
            .rate_limited_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if scripted.is_ok() {
            return Err(AutomationError::RateLimited("429 Quota exceeded".to_string()));
        }
        Ok(self.rows(sheet))
    }

    async fn update_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<(), AutomationError> {
        let mut sheets = self.sheets.lock().unwrap();
        let rows = sheets.entry(sheet.to_string()).or_default();
        if let Some(cells) = rows.get_mut(row - 1) {
            if cells.len() < col {
                cells.resize(col, String::new());
            }
            cells[col - 1] = value.to_string();
        }
        self.writes.lock().unwrap().push(CellWrite {
            sheet: sheet.to_string(),
            row,
            col,
            value: value.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click(Point),
    Move(Point),
    Key(Key),
    Hotkey(Vec<Key>, Key),
    Clipboard(String),
    Type(String),
}

/// Every marker's best match is at (100, 200) with score 1.0 unless hidden
/// or given a lower score.
pub struct FakeEngine {
    hidden: Mutex<HashSet<Marker>>,
    scores: Mutex<HashMap<Marker, f32>>,
    lookups: Mutex<HashMap<Marker, usize>>,
    actions: Mutex<Vec<Action>>,
    capture: (f64, f64),
    clipboard_broken: bool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_capture((1920.0, 1080.0)))
    }

    pub fn with_capture(capture: (f64, f64)) -> Self {
        Self {
            hidden: Mutex::new(HashSet::new()),
            scores: Mutex::new(HashMap::new()),
            lookups: Mutex::new(HashMap::new()),
            actions: Mutex::new(Vec::new()),
            capture,
            clipboard_broken: false,
        }
    }

    pub fn without_clipboard(mut self) -> Self {
        self.clipboard_broken = true;
        self
    }

    pub fn hide(&self, marker: Marker) {
        self.hidden.lock().unwrap().insert(marker);
    }

    pub fn show(&self, marker: Marker) {
        self.hidden.lock().unwrap().remove(&marker);
    }

    pub fn set_score(&self, marker: Marker, score: f32) {
        self.scores.lock().unwrap().insert(marker, score);
    }

    pub fn lookups(&self, marker: Marker) -> usize {
        self.lookups.lock().unwrap().get(&marker).copied().unwrap_or(0)
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn clipboard_history(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Clipboard(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn key_presses(&self, key: Key) -> usize {
        self.actions()
            .iter()
            .filter(|a| **a == Action::Key(key))
            .count()
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

impl ScreenEngine for FakeEngine {
    fn display_size(&self) -> Result<(f64, f64), AutomationError> {
        Ok((1920.0, 1080.0))
    }

    fn capture_size(&self) -> Result<(f64, f64), AutomationError> {
        Ok(self.capture)
    }

    fn best_match(&self, template: &Template) -> Result<Option<(Point, f32)>, AutomationError> {
        *self.lookups.lock().unwrap().entry(template.marker).or_default() += 1;
        if self.hidden.lock().unwrap().contains(&template.marker) {
            return Ok(None);
        }
        let score = self
            .scores
            .lock()
            .unwrap()
            .get(&template.marker)
            .copied()
            .unwrap_or(1.0);
        Ok(Some((Point::new(100.0, 200.0), score)))
    }

    fn click_at(&self, point: Point, _travel: Duration) -> Result<(), AutomationError> {
        self.record(Action::Click(point));
        Ok(())
    }

    fn move_to(&self, point: Point, _travel: Duration) -> Result<(), AutomationError> {
        self.record(Action::Move(point));
        Ok(())
    }

    fn press_key(&self, key: Key) -> Result<(), AutomationError> {
        self.record(Action::Key(key));
        Ok(())
    }

    fn hotkey(&self, modifiers: &[Key], key: Key) -> Result<(), AutomationError> {
        self.record(Action::Hotkey(modifiers.to_vec(), key));
        Ok(())
    }

    fn set_clipboard(&self, text: &str) -> Result<(), AutomationError> {
        if self.clipboard_broken {
            return Err(AutomationError::PlatformError("clipboard unavailable".to_string()));
        }
        self.record(Action::Clipboard(text.to_string()));
        Ok(())
    }

    fn type_literal(&self, text: &str) -> Result<(), AutomationError> {
        self.record(Action::Type(text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBrowser {
    pub closes: AtomicUsize,
    pub launches: AtomicUsize,
}

#[async_trait]
impl BrowserControl for FakeBrowser {
    async fn close_all(&self) -> Result<usize, AutomationError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn launch(&self) -> Result<(), AutomationError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Short budgets; tests run on paused time anyway.
pub fn fast_timing() -> Timing {
    Timing {
        tiny: 0.01..0.02,
        small: 0.02..0.03,
        medium: 0.03..0.04,
        long: 0.05..0.06,
        mouse_travel: 0.01..0.02,
        screen_retry_interval: 0.5..0.6,
        browser_launch_wait_secs: 1.0..2.0,
        click_timeout_secs: 5.0..6.0,
        click_confidence: 0.85..0.86,
        step2_load_timeout_secs: 8.0..9.0,
    }
}

pub fn test_screen(engine: Arc<FakeEngine>) -> Arc<Screen> {
    Arc::new(Screen::new(
        engine,
        TemplateSet::new("icon"),
        Pacing::new(fast_timing()),
    ))
}

pub fn input_header() -> Vec<String> {
    let mut row = vec![String::new(); input_col::TIME + 1];
    row[input_col::CODE] = "CODE".to_string();
    row[input_col::CHANNEL] = "CHANNEL".to_string();
    row[input_col::STATUS] = "STATUS".to_string();
    row[input_col::DATE] = "DATE".to_string();
    row[input_col::TIME] = "TIME".to_string();
    row
}

pub fn input_row(code: &str, channel: &str, status: &str, date: &str, time: &str) -> Vec<String> {
    let mut row = vec![String::new(); input_col::TIME + 1];
    row[input_col::CODE] = code.to_string();
    row[input_col::CHANNEL] = channel.to_string();
    row[input_col::STATUS] = status.to_string();
    row[input_col::TITLE] = format!("Title of {code}");
    row[input_col::DESCRIPTION] = format!("Description of {code}");
    row[input_col::DATE] = date.to_string();
    row[input_col::TIME] = time.to_string();
    row
}

pub fn with_links(mut row: Vec<String>, links: &[&str]) -> Vec<String> {
    for (idx, link) in input_col::LINKS.iter().zip(links) {
        row[*idx] = link.to_string();
    }
    row
}

pub fn source_rows(codes: &[&str]) -> RowMatrix {
    let blank = || vec![String::new(); source_col::STATUS + 1];
    let mut header = blank();
    header[source_col::CODE] = "CODE".to_string();
    header[source_col::STATUS] = "STATUS".to_string();
    let mut rows = vec![header];
    for code in codes {
        let mut row = blank();
        row[source_col::CODE] = code.to_string();
        rows.push(row);
    }
    rows
}

/// Creates `dir` with one video, one subtitle and one image.
pub fn write_media(dir: &std::path::Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("a.mp4"), b"video-bytes").unwrap();
    std::fs::write(dir.join("a.srt"), b"1\n00:00:01,000 --> 00:00:02,000\nhi\n").unwrap();
    std::fs::write(dir.join("a.jpg"), b"jpeg").unwrap();
}
