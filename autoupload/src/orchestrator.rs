//! The outer operator loop: one pass per cycle, forever.

use crate::browser::{BrowserControl, DesktopBrowser};
use crate::cache::{RowCache, DEFAULT_CACHE_TTL};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::errors::AutomationError;
use crate::job::{JobRecord, INPUT_SHEET};
use crate::pacing::{Pacing, Pause};
use crate::queue::{purpose, QueueClient};
use crate::screen::{create_engine, Screen};
use crate::selector::{due_today, due_tomorrow, find_row_by_code, posted_codes};
use crate::sheets::GoogleSheets;
use crate::staging::FileStager;
use crate::templates::TemplateSet;
use crate::update::{UpdateStatus, Updater};
use crate::workflow::{JobOutcome, UploadWorkflow};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

pub const DEFAULT_CYCLE_REST: Duration = Duration::from_secs(3 * 60 * 60);
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// How long the loop sleeps after a pass.
#[derive(Debug, Clone, Copy)]
pub struct CycleTiming {
    pub rest: Duration,
    pub rate_limit_cooldown: Duration,
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self {
            rest: DEFAULT_CYCLE_REST,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub purged: usize,
    pub due: Vec<String>,
    pub staged: Vec<String>,
    pub published: Vec<String>,
    pub skipped: Vec<String>,
    pub prestaged_tomorrow: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassReport),
    /// An update was installed over the running binary.
    RestartRequired { version: String },
}

pub struct Orchestrator {
    channel: String,
    clock: Arc<dyn Clock>,
    queue: QueueClient,
    stager: FileStager,
    browser: Arc<dyn BrowserControl>,
    workflow: UploadWorkflow,
    pacing: Pacing,
    updater: Option<Updater>,
    cycle: CycleTiming,
}

impl Orchestrator {
    pub fn new(
        channel: impl Into<String>,
        clock: Arc<dyn Clock>,
        queue: QueueClient,
        stager: FileStager,
        browser: Arc<dyn BrowserControl>,
        workflow: UploadWorkflow,
        pacing: Pacing,
    ) -> Self {
        Self {
            channel: channel.into(),
            clock,
            queue,
            stager,
            browser,
            workflow,
            pacing,
            updater: None,
            cycle: CycleTiming::default(),
        }
    }

    /// Wires the real desktop, spreadsheet and browser backends for `config`.
    pub fn from_config(config: &Config) -> Result<Self, AutomationError> {
        let templates = TemplateSet::new(&config.template_dir);
        let missing = templates.missing();
        if !missing.is_empty() {
            warn!(
                "{} template image(s) missing from {}: {missing:?}",
                missing.len(),
                templates.dir().display()
            );
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sheets = GoogleSheets::from_credential_file(
            &config.credential_path,
            config.spreadsheet_name.clone(),
            config.spreadsheet_id.clone(),
        )?;
        let cache = Arc::new(RowCache::new(clock.clone(), DEFAULT_CACHE_TTL));
        let queue = QueueClient::new(Arc::new(sheets), cache);

        let pacing = Pacing::new(config.timing.clone());
        let screen = Arc::new(Screen::new(create_engine()?, templates, pacing.clone()));
        let workflow = UploadWorkflow::new(screen, queue.clone(), config.upload_url.clone());
        let stager = FileStager::new(&config.local_root, &config.server_root)
            .delete_server_after_copy(config.delete_server_after_copy);
        let browser = Arc::new(DesktopBrowser::new(&config.browser_exe));

        let orchestrator = Self::new(
            config.channel_code.clone(),
            clock,
            queue,
            stager,
            browser,
            workflow,
            pacing,
        );
        Ok(if config.update.is_enabled() {
            orchestrator.with_updater(Updater::new(config.update.clone(), &config.install_dir))
        } else {
            orchestrator
        })
    }

    pub fn with_updater(mut self, updater: Updater) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn with_cycle(mut self, cycle: CycleTiming) -> Self {
        self.cycle = cycle;
        self
    }

    /// Loops until an update asks for a restart. Returns the new version.
    pub async fn run_forever(&self) -> String {
        loop {
            match self.browser.close_all().await {
                Ok(n) if n > 0 => info!("Closed {n} browser process(es)"),
                Ok(_) => {}
                Err(e) => warn!("Closing browsers failed: {e}"),
            }
            self.pacing.pause(Pause::Small).await;

            let rest = match self.run_once().await {
                Ok(PassOutcome::RestartRequired { version }) => return version,
                Ok(PassOutcome::Completed(report)) => {
                    info!(
                        "Pass done: {} published, {} skipped, {} pre-staged for tomorrow",
                        report.published.len(),
                        report.skipped.len(),
                        report.prestaged_tomorrow.len()
                    );
                    self.cycle.rest
                }
                Err(e) if e.is_rate_limited() => {
                    error!("Quota exceeded, cooling down: {e}");
                    self.cycle.rate_limit_cooldown
                }
                Err(e) => {
                    error!("Pass failed: {e}");
                    self.cycle.rest
                }
            };

            info!("Sleeping {} minutes...", rest.as_secs() / 60);
            tokio::time::sleep(rest).await;
        }
    }

    /// One full pass over today's queue.
    #[instrument(skip(self), fields(channel = %self.channel))]
    pub async fn run_once(&self) -> Result<PassOutcome, AutomationError> {
        if let Some(updater) = &self.updater {
            match updater.check().await {
                Ok(UpdateStatus::Installed { to, .. }) => {
                    info!("Restarting into {to}");
                    return Ok(PassOutcome::RestartRequired { version: to });
                }
                Ok(status) => tracing::debug!("Update check: {status:?}"),
                Err(e) => warn!("Update check failed: {e}"),
            }
        }

        let mut report = PassReport {
            purged: self.cleanup_posted().await,
            ..Default::default()
        };

        let rows = self.queue.fetch(INPUT_SHEET, purpose::ROWS).await?;
        let now = self.clock.now();
        report.due = due_today(&rows, &self.channel, now);

        if report.due.is_empty() {
            info!("No codes for {} today", self.channel);
            report.prestaged_tomorrow = self.prestage_tomorrow(&rows, now);
            return Ok(PassOutcome::Completed(report));
        }

        let codes: Vec<String> = report
            .due
            .iter()
            .filter(|code| {
                let ok = self.stager.has_media(code);
                if !ok {
                    warn!("No media for {code}, dropping it from this pass");
                }
                ok
            })
            .cloned()
            .collect();
        if codes.is_empty() {
            info!("No codes with media left");
            return Ok(PassOutcome::Completed(report));
        }

        info!("Publishing {} code(s): {codes:?}", codes.len());
        report.staged = self.stager.stage_all(&codes);

        self.browser.launch().await?;
        tokio::time::sleep(self.pacing.browser_launch_wait()).await;

        let total = codes.len();
        let mut processed = HashSet::new();
        let mut first_job = true;
        for (idx, code) in codes.iter().enumerate() {
            if processed.contains(code) {
                continue;
            }
            info!("=== [{}/{total}] CODE: {code} ===", idx + 1);

            let Some(row) = find_row_by_code(&rows, code) else {
                warn!("Row for {code} disappeared");
                report.skipped.push(code.clone());
                continue;
            };
            let job = JobRecord::from_row(row);

            if let Err(e) = self.stager.ensure_local(code) {
                warn!("Skipping {code}: {e}");
                report.skipped.push(code.clone());
                continue;
            }
            let folder = self.stager.local_folder(code);

            let outcome = self.workflow.run_job(&job, &folder, first_job).await;
            first_job = false;
            match outcome {
                JobOutcome::Published { fallback_used, .. } => {
                    let note = if fallback_used { " (after fallback)" } else { "" };
                    info!("Published {code}{note}");
                    processed.insert(code.clone());
                    report.published.push(code.clone());
                }
                JobOutcome::Skipped { state, reason, .. } => {
                    warn!("{code} skipped at {state:?}: {reason}");
                    report.skipped.push(code.clone());
                }
            }
        }

        info!("Completed {}/{total}", report.published.len());
        report.prestaged_tomorrow = self.prestage_tomorrow(&rows, now);
        Ok(PassOutcome::Completed(report))
    }

    /// Deletes local folders of posted jobs. Never fails the pass.
    async fn cleanup_posted(&self) -> usize {
        match self.queue.fetch(INPUT_SHEET, purpose::CLEANUP).await {
            Ok(rows) => self.stager.purge_local(&posted_codes(&rows)),
            Err(e) => {
                warn!("Cleanup skipped: {e}");
                0
            }
        }
    }

    fn prestage_tomorrow(
        &self,
        rows: &[Vec<String>],
        now: chrono::DateTime<chrono::Local>,
    ) -> Vec<String> {
        let codes = due_tomorrow(rows, &self.channel, now);
        if codes.is_empty() {
            return codes;
        }
        info!("Pre-staging {} code(s) for tomorrow", codes.len());
        self.stager.stage_all(&codes)
    }
}
