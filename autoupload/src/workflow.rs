//! Per-job upload state machine.
//!
//! ```text
//! START -> SELECT_FILE -> METADATA -> STEP2 -> SCHEDULE_PUBLISH -> DONE
//!                                       \                 ^
//!                                        -> FALLBACK -----+
//! ```
//!
//! Every transition is gated on a screen marker. A marker that never shows
//! up is a `RecognitionTimeout`; only STEP2 recovers from it (through
//! FALLBACK), the other steps end the job.

use crate::choreography::{self, CARD_TIMESTAMPS};
use crate::errors::AutomationError;
use crate::job::{JobRecord, STATUS_POSTED};
use crate::pacing::Pause;
use crate::queue::QueueClient;
use crate::screen::{ConfidenceLadder, Key, Screen};
use crate::templates::Marker;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Confidence used by the schedule/publish steps.
pub const PUBLISH_CONFIDENCE: f32 = 0.85;
pub const STEP2_ENTRY_ATTEMPTS: usize = 5;
pub const UPLOAD_BUTTON_PASSES: usize = 3;
const UPLOAD_BUTTON_SETTLE: Duration = Duration::from_secs(15);
const CONTINUE_CONFIDENCE: f32 = 0.70;
const EXPERIMENTAL_UI_CONFIDENCE: f32 = 0.80;
const UNDERSTOOD_TIMEOUT: Duration = Duration::from_secs(15);
const UNDERSTOOD_CONFIDENCE: f32 = 0.80;
const SELECT_RETRY_TIMEOUT: Duration = Duration::from_secs(60);
const STEP2_ALT_ENTRY_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_PANEL_TIMEOUT: Duration = Duration::from_secs(10);
const STEP2_REDETECT_TIMEOUT: Duration = Duration::from_secs(15);
const STEP2_ALT_REDETECT_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_SETTLE: Duration = Duration::from_secs(5);

pub const FALLBACK_WAIT: Duration = Duration::from_secs(10 * 60);
pub const PUBLISH_SETTLE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowState {
    Start,
    SelectFile,
    Metadata,
    Step2,
    Fallback,
    SchedulePublish,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobOutcome {
    Published {
        code: String,
        fallback_used: bool,
        status_written: bool,
    },
    Skipped {
        code: String,
        state: WorkflowState,
        reason: String,
    },
}

pub struct UploadWorkflow {
    screen: Arc<Screen>,
    queue: QueueClient,
    upload_url: String,
}

impl UploadWorkflow {
    pub fn new(screen: Arc<Screen>, queue: QueueClient, upload_url: impl Into<String>) -> Self {
        Self {
            screen,
            queue,
            upload_url: upload_url.into(),
        }
    }

    /// Drives one job from an idle browser tab to a scheduled video.
    #[instrument(skip(self, job, folder), fields(code = %job.code))]
    pub async fn run_job(&self, job: &JobRecord, folder: &Path, first_job: bool) -> JobOutcome {
        let mut state = WorkflowState::Start;
        let mut fallback_used = false;
        let mut status_written = false;

        loop {
            info!("{} -> {:?}", job.code, state);
            state = match state {
                WorkflowState::Start => WorkflowState::SelectFile,
                WorkflowState::SelectFile => match self.select_file(folder, first_job).await {
                    Ok(()) => WorkflowState::Metadata,
                    Err(e) => return skipped(job, state, e),
                },
                WorkflowState::Metadata => {
                    // Carries on regardless: a broken form surfaces in step 2.
                    if let Err(e) = self.enter_metadata(job).await {
                        warn!("Metadata incomplete for {}: {e}", job.code);
                    }
                    WorkflowState::Step2
                }
                WorkflowState::Step2 => match self.step2(job).await {
                    Ok(cards) => {
                        info!("Step 2 done with {cards} video card(s)");
                        WorkflowState::SchedulePublish
                    }
                    Err(e) => {
                        warn!("Step 2 failed for {}: {e}", job.code);
                        WorkflowState::Fallback
                    }
                },
                WorkflowState::Fallback => {
                    fallback_used = true;
                    // Optimistic past this point whatever the fallback reports.
                    if let Err(e) = self.fallback().await {
                        error!("Fallback error: {e}");
                    }
                    WorkflowState::SchedulePublish
                }
                WorkflowState::SchedulePublish => match self.schedule_publish(job).await {
                    Ok(written) => {
                        status_written = written;
                        WorkflowState::Done
                    }
                    Err(e) => return skipped(job, state, e),
                },
                WorkflowState::Done => {
                    return JobOutcome::Published {
                        code: job.code.clone(),
                        fallback_used,
                        status_written,
                    }
                }
            };
        }
    }

    /// Opens the upload page and picks the staged video in the file dialog.
    pub async fn select_file(&self, folder: &Path, first_job: bool) -> Result<(), AutomationError> {
        let screen = &*self.screen;
        let timeout = screen.pacing().click_timeout();
        let conf = screen.pacing().click_confidence();

        choreography::navigate(screen, &self.upload_url, !first_job).await?;

        if screen
            .click_marker(Marker::SelectFiles, timeout, conf)
            .await
            .is_err()
        {
            screen.press(Key::F5, 1, Pause::Medium).await?;
            screen
                .click_marker(Marker::SelectFiles, SELECT_RETRY_TIMEOUT, conf)
                .await?;
        }

        screen.wait_for(Marker::OpenDialog, timeout, conf).await?;
        choreography::select_first_video(screen, folder).await?;
        screen.wait_for(Marker::Next, timeout, conf).await?;
        Ok(())
    }

    /// Title, description, thumbnail, playlist, then "Next".
    pub async fn enter_metadata(&self, job: &JobRecord) -> Result<(), AutomationError> {
        let screen = &*self.screen;
        let timeout = screen.pacing().click_timeout();
        let conf = screen.pacing().click_confidence();

        let preview: String = job.title.chars().take(50).collect();
        info!("Title: {preview}...");
        screen.pause(Pause::Long).await;
        screen.ctrl('a').await?;
        screen.paste_text(&job.title).await?;

        let experimental = screen.is_visible(Marker::ExperimentalUi, EXPERIMENTAL_UI_CONFIDENCE);
        choreography::title_to_description(screen, experimental).await?;

        info!("Description...");
        screen.ctrl('a').await?;
        screen.paste_text(&job.description).await?;
        choreography::open_thumbnail_picker(screen).await?;

        if let Err(e) = screen.wait_for(Marker::OpenDialog, timeout, conf).await {
            error!("Thumbnail dialog never opened");
            return Err(e);
        }
        choreography::select_thumbnail(screen).await?;

        if let Ok(pos) = screen.wait_for(Marker::Playlist, timeout, conf).await {
            screen.click(pos)?;
            screen.pause(Pause::Small).await;
            choreography::choose_first_playlist(screen).await?;
        }

        match screen.wait_for(Marker::Next, timeout, conf).await {
            Ok(pos) => screen.click(pos)?,
            Err(_) => warn!("Next button not found"),
        }
        Ok(())
    }

    /// Subtitle, end screen and cards. Returns how many video cards stuck.
    pub async fn step2(&self, job: &JobRecord) -> Result<usize, AutomationError> {
        let screen = &*self.screen;
        let conf = screen.pacing().click_confidence();
        let timeout = screen.pacing().step2_timeout();

        info!("Entering step 2...");
        self.enter_step2_panel(timeout, conf).await?;
        self.open_subtitle_upload(conf).await?;

        match screen.click_marker(Marker::Continue, timeout, conf).await {
            Ok(_) => screen.pause(Pause::Long).await,
            Err(_) => choreography::continue_by_keyboard(screen).await?,
        }

        screen.wait_for(Marker::OpenDialog, timeout, conf).await?;
        choreography::select_subtitle(screen).await?;

        let done = screen.wait_for(Marker::Done, timeout, conf).await?;
        screen.pause(Pause::Medium).await;
        screen.click(done)?;
        screen.pause(Pause::Medium).await;

        screen.wait_for(Marker::EndScreen, timeout, conf).await?;
        choreography::open_end_screen_picker(screen).await?;
        screen
            .click_marker(Marker::ChooseEndScreen, timeout, conf)
            .await?;
        choreography::fill_end_screen_elements(screen).await?;

        if let Ok(pos) = screen.wait_for(Marker::Subscribe, timeout, conf).await {
            screen.click(pos)?;
            screen.pause(Pause::Small).await;
        }

        let save = screen.wait_for(Marker::Save, timeout, conf).await?;
        screen.click(save)?;
        screen.pause(Pause::Medium).await;

        screen
            .wait_for(Marker::EndScreenSaved, timeout, conf)
            .await?;
        choreography::open_cards_panel(screen).await?;

        if self.open_card_menu(timeout, conf).await? {
            choreography::add_playlist_card(screen).await?;
        }

        let mut linked = Vec::new();
        for link in &job.links {
            if self.add_video_card(link, timeout, conf).await? {
                linked.push(link.as_str());
            }
        }
        if linked.is_empty() {
            return Err(AutomationError::RecognitionTimeout(
                "no video card was accepted".to_string(),
            ));
        }

        for timestamp in CARD_TIMESTAMPS {
            if self.open_card_menu(timeout, conf).await? {
                choreography::enter_card_timestamp(screen, timestamp).await?;
            }
        }

        if let Ok(save) = screen.wait_for(Marker::Save, timeout, conf).await {
            screen.click(save)?;
            screen.pause(Pause::Medium).await;
        }

        info!("Step 2 complete");
        Ok(linked.len())
    }

    /// Clicks into step 2 until the upload row shows, re-finding the entry
    /// icon between attempts.
    async fn enter_step2_panel(&self, timeout: Duration, conf: f32) -> Result<(), AutomationError> {
        let screen = &*self.screen;
        let mut entry = match screen.wait_for(Marker::Step2, timeout, conf).await {
            Ok(pos) => pos,
            Err(_) => screen
                .wait_for(Marker::Step2Add, STEP2_ALT_ENTRY_TIMEOUT, conf)
                .await
                .inspect_err(|_| error!("Could not enter step 2"))?,
        };

        for attempt in 1..=STEP2_ENTRY_ATTEMPTS {
            screen.click(entry)?;
            screen.pause(Pause::Small).await;
            choreography::open_subtitle_panel(screen).await?;

            if screen
                .wait_for(Marker::UploadFile, UPLOAD_PANEL_TIMEOUT, conf)
                .await
                .is_ok()
            {
                return Ok(());
            }
            warn!("Step 2 panel not open after attempt {attempt}/{STEP2_ENTRY_ATTEMPTS}");

            entry = match screen
                .wait_for(Marker::Step2, STEP2_REDETECT_TIMEOUT, conf)
                .await
            {
                Ok(pos) => pos,
                Err(_) => {
                    screen
                        .wait_for(Marker::Step2Add, STEP2_ALT_REDETECT_TIMEOUT, conf)
                        .await?
                }
            };
        }

        Err(AutomationError::RecognitionTimeout(format!(
            "step 2 panel did not open after {STEP2_ENTRY_ATTEMPTS} attempts"
        )))
    }

    /// Clicks the upload button until the "continue" prompt appears.
    async fn open_subtitle_upload(&self, conf: f32) -> Result<(), AutomationError> {
        let screen = &*self.screen;
        let ladder = ConfidenceLadder::upload_button(conf);

        tokio::time::sleep(UPLOAD_BUTTON_SETTLE).await;
        for _ in 0..UPLOAD_BUTTON_PASSES {
            if let Some((pos, _)) = screen.locate_any(Marker::UploadFile, &ladder) {
                screen.click(pos)?;
            }
            tokio::time::sleep(UPLOAD_BUTTON_SETTLE).await;
            if screen.is_visible(Marker::Continue, CONTINUE_CONFIDENCE) {
                return Ok(());
            }
        }
        Err(AutomationError::RecognitionTimeout(
            "subtitle upload prompt never appeared".to_string(),
        ))
    }

    async fn open_card_menu(&self, timeout: Duration, conf: f32) -> Result<bool, AutomationError> {
        let screen = &*self.screen;
        if let Err(e) = screen.move_away() {
            tracing::debug!("Could not park pointer: {e}");
        }
        match screen.wait_for(Marker::Card, timeout, conf).await {
            Ok(pos) => {
                screen.click(pos)?;
                screen.pause(Pause::Small).await;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn add_video_card(
        &self,
        link: &str,
        timeout: Duration,
        conf: f32,
    ) -> Result<bool, AutomationError> {
        let screen = &*self.screen;
        let Ok(pos) = screen.wait_for(Marker::CardAlt, timeout, conf).await else {
            return Ok(false);
        };
        screen.click(pos)?;
        screen.pause(Pause::Tiny).await;
        choreography::open_video_card(screen).await?;

        let Ok(choose) = screen
            .wait_for(Marker::ChooseSpecificVideo, timeout, conf)
            .await
        else {
            return Ok(false);
        };
        screen.click(choose)?;
        choreography::enter_card_link(screen, link).await?;

        let accepted = match screen.wait_for(Marker::TagVideo, timeout, conf).await {
            Ok(tag) => {
                screen.click(tag)?;
                true
            }
            Err(_) => false,
        };
        screen.pause(Pause::Medium).await;
        Ok(accepted)
    }

    /// Assume the video is still uploading: wait it out, then refresh.
    pub async fn fallback(&self) -> Result<(), AutomationError> {
        let screen = &*self.screen;
        warn!("Step 2 failed, starting safe fallback...");
        self.wait_for_upload().await;

        info!("Refreshing the page...");
        screen.key(Key::F5)?;
        screen.pause(Pause::Long).await;
        // dismiss a possible "leave page?" dialog
        screen.key(Key::Enter)?;
        screen.pause(Pause::Medium).await;
        tokio::time::sleep(FALLBACK_SETTLE).await;
        info!("Refreshed, continuing");
        Ok(())
    }

    async fn wait_for_upload(&self) {
        let minutes = FALLBACK_WAIT.as_secs() / 60;
        info!("Waiting {minutes} minutes for the upload to finish...");
        let minute = Duration::from_secs(60);
        let mut remaining = FALLBACK_WAIT;
        while !remaining.is_zero() {
            info!("{} minute(s) left...", remaining.as_secs().div_ceil(60));
            let step = remaining.min(minute);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }

    /// Visibility -> schedule date/time -> confirm, then marks the job posted.
    ///
    /// Returns whether the status cell was written.
    pub async fn schedule_publish(&self, job: &JobRecord) -> Result<bool, AutomationError> {
        let screen = &*self.screen;
        let timeout = screen.pacing().click_timeout();

        screen
            .click_marker(Marker::Visibility, timeout, PUBLISH_CONFIDENCE)
            .await?;
        screen.pause(Pause::Medium).await;
        screen
            .click_marker(Marker::Schedule, timeout, PUBLISH_CONFIDENCE)
            .await?;
        screen.pause(Pause::Medium).await;

        choreography::open_schedule_date(screen).await?;
        choreography::replace_field(screen, &job.scheduled_date).await?;

        let time_field = screen
            .wait_for(Marker::TimeField, timeout, PUBLISH_CONFIDENCE)
            .await?;
        screen.click(time_field)?;
        screen.pause(Pause::Small).await;
        choreography::replace_field(screen, &job.scheduled_time).await?;

        let publish = screen
            .wait_for(Marker::SchedulePublish, timeout, PUBLISH_CONFIDENCE)
            .await?;
        screen.click(publish)?;
        screen.pause(Pause::Medium).await;

        if screen
            .click_marker(Marker::Understood, UNDERSTOOD_TIMEOUT, UNDERSTOOD_CONFIDENCE)
            .await
            .is_ok()
        {
            info!("Dismissed the notice dialog");
        }

        let status_written = match self.queue.update_source_status(&job.code, STATUS_POSTED).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Status update failed for {}: {e}", job.code);
                false
            }
        };

        info!(
            "Waiting {} minutes for publish processing...",
            PUBLISH_SETTLE.as_secs() / 60
        );
        tokio::time::sleep(PUBLISH_SETTLE).await;
        Ok(status_written)
    }
}

fn skipped(job: &JobRecord, state: WorkflowState, e: AutomationError) -> JobOutcome {
    warn!("Skipping {} at {:?}: {e}", job.code, state);
    JobOutcome::Skipped {
        code: job.code.clone(),
        state,
        reason: e.to_string(),
    }
}
