//! Screen-template driven video publishing.
//!
//! Jobs come from a spreadsheet queue, media is staged from a server share to
//! a local folder, and each job is pushed through the upload UI by a state
//! machine whose every transition waits for a known image on screen.

pub mod browser;
pub mod cache;
pub mod choreography;
pub mod clock;
pub mod config;
pub mod errors;
pub mod job;
pub mod orchestrator;
pub mod pacing;
pub mod queue;
pub mod retry;
pub mod screen;
pub mod selector;
pub mod sheets;
pub mod staging;
pub mod templates;
#[cfg(test)]
mod tests;
pub mod update;
pub mod workflow;

pub use browser::{BrowserControl, DesktopBrowser};
pub use cache::{CacheKey, RowCache, RowMatrix};
pub use clock::{Clock, SystemClock};
pub use config::{Config, Timing, UpdateConfig};
pub use errors::AutomationError;
pub use job::JobRecord;
pub use orchestrator::{Orchestrator, PassOutcome, PassReport};
pub use queue::QueueClient;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use screen::{create_engine, ConfidenceLadder, Point, Screen, ScreenEngine};
pub use sheets::{GoogleSheets, SheetBackend};
pub use staging::{FileStager, StageOutcome};
pub use templates::{Marker, TemplateSet};
pub use update::{UpdateStatus, Updater};
pub use workflow::{JobOutcome, UploadWorkflow, WorkflowState};
