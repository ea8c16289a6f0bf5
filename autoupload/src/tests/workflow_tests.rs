use super::{
    input_row, local_time, source_rows, test_screen, with_links, Action, FakeClock, FakeEngine,
    FakeSheets,
};
use crate::cache::{RowCache, DEFAULT_CACHE_TTL};
use crate::choreography;
use crate::job::{JobRecord, SOURCE_SHEET, STATUS_POSTED, STATUS_READY};
use crate::queue::QueueClient;
use crate::screen::Key;
use crate::templates::Marker;
use crate::workflow::{JobOutcome, UploadWorkflow, WorkflowState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Harness {
    engine: Arc<FakeEngine>,
    sheets: Arc<FakeSheets>,
    workflow: UploadWorkflow,
}

fn harness() -> Harness {
    harness_with(FakeEngine::new())
}

fn harness_with(engine: Arc<FakeEngine>) -> Harness {
    super::init_tracing();
    let sheets = FakeSheets::new();
    sheets.set_rows(SOURCE_SHEET, source_rows(&["V001"]));
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let cache = Arc::new(RowCache::new(clock, DEFAULT_CACHE_TTL));
    let queue = QueueClient::new(sheets.clone(), cache);
    let workflow = UploadWorkflow::new(
        test_screen(engine.clone()),
        queue,
        "https://studio.example/upload",
    );
    Harness {
        engine,
        sheets,
        workflow,
    }
}

fn job(links: &[&str]) -> JobRecord {
    let row = with_links(
        input_row("V001", "CH1", STATUS_READY, "19/10/2026", "10:00"),
        links,
    );
    JobRecord::from_row(&row)
}

const FOLDER: &str = "C:/Users/op/Desktop/DONE/V001";

#[tokio::test(start_paused = true)]
async fn test_happy_path_publishes_and_marks_posted() {
    let h = harness();
    let start = Instant::now();

    let outcome = h
        .workflow
        .run_job(
            &job(&["https://youtu.be/a", "https://youtu.be/b"]),
            Path::new(FOLDER),
            true,
        )
        .await;

    assert_eq!(
        outcome,
        JobOutcome::Published {
            code: "V001".to_string(),
            fallback_used: false,
            status_written: true,
        }
    );

    let pasted = h.engine.clipboard_history();
    for expected in [
        "https://studio.example/upload",
        FOLDER,
        "*.mp4",
        "Title of V001",
        "Description of V001",
        "*.srt",
        "https://youtu.be/a",
        "https://youtu.be/b",
        "30:00:00",
        "25:00:00",
        "19/10/2026",
        "10:00",
    ] {
        assert!(pasted.iter().any(|p| p == expected), "missing paste {expected:?}");
    }

    let writes = h.sheets.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!((writes[0].row, writes[0].col), (2, 13));
    assert_eq!(writes[0].value, STATUS_POSTED);

    // publish processing wait
    assert!(Instant::now() - start >= Duration::from_secs(10 * 60));
}

#[tokio::test(start_paused = true)]
async fn test_first_job_reuses_the_tab() {
    let h = harness();
    h.workflow.select_file(Path::new(FOLDER), true).await.unwrap();
    let new_tab = Action::Hotkey(vec![Key::Ctrl], Key::Char('t'));
    assert!(!h.engine.actions().contains(&new_tab));

    h.workflow.select_file(Path::new(FOLDER), false).await.unwrap();
    assert!(h.engine.actions().contains(&new_tab));
}

#[tokio::test(start_paused = true)]
async fn test_missing_step2_entry_goes_through_fallback() {
    let h = harness();
    h.engine.hide(Marker::Step2);
    h.engine.hide(Marker::Step2Add);
    let start = Instant::now();

    let outcome = h
        .workflow
        .run_job(&job(&["https://youtu.be/a"]), Path::new(FOLDER), true)
        .await;

    assert_eq!(
        outcome,
        JobOutcome::Published {
            code: "V001".to_string(),
            fallback_used: true,
            status_written: true,
        }
    );
    // 10 minutes of fallback plus 10 minutes of publish processing
    assert!(Instant::now() - start >= Duration::from_secs(20 * 60));
    // navigation refresh plus the fallback refresh
    assert_eq!(h.engine.key_presses(Key::F5), 2);
    // no card links were ever entered
    let pasted = h.engine.clipboard_history();
    assert!(!pasted.iter().any(|p| p == "https://youtu.be/a"));
}

#[tokio::test(start_paused = true)]
async fn test_select_file_types_when_clipboard_is_unavailable() {
    let h = harness_with(Arc::new(
        FakeEngine::with_capture((1920.0, 1080.0)).without_clipboard(),
    ));

    h.workflow
        .select_file(Path::new(FOLDER), true)
        .await
        .unwrap();

    let typed: Vec<String> = h
        .engine
        .actions()
        .into_iter()
        .filter_map(|a| match a {
            Action::Type(text) => Some(text),
            _ => None,
        })
        .collect();
    assert!(typed.contains(&"https://studio.example/upload".to_string()));
    assert!(typed.contains(&FOLDER.to_string()));
    assert!(typed.contains(&"*.mp4".to_string()));
    assert!(h.engine.clipboard_history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_subtitle_completion_fails_step2() {
    let h = harness();
    h.engine.hide(Marker::Done);
    let job = job(&["https://youtu.be/a"]);

    let err = h.workflow.step2(&job).await.unwrap_err();
    assert!(err.is_recognition_timeout());

    let outcome = h.workflow.run_job(&job, Path::new(FOLDER), true).await;
    assert!(matches!(outcome, JobOutcome::Published { fallback_used: true, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_missing_end_screen_fails_step2() {
    let h = harness();
    h.engine.hide(Marker::EndScreen);
    let job = job(&["https://youtu.be/a"]);

    let err = h.workflow.step2(&job).await.unwrap_err();
    assert!(err.is_recognition_timeout());
    // cards come after the end screen
    let pasted = h.engine.clipboard_history();
    assert!(!pasted.iter().any(|p| p == "https://youtu.be/a"));

    let outcome = h.workflow.run_job(&job, Path::new(FOLDER), true).await;
    assert!(matches!(outcome, JobOutcome::Published { fallback_used: true, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_zero_accepted_cards_fails_step2() {
    let h = harness();
    h.engine.hide(Marker::TagVideo);

    let outcome = h
        .workflow
        .run_job(&job(&["https://youtu.be/a"]), Path::new(FOLDER), true)
        .await;

    assert!(matches!(outcome, JobOutcome::Published { fallback_used: true, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_job_without_links_fails_step2() {
    let h = harness();
    let err = h.workflow.step2(&job(&[])).await.unwrap_err();
    assert!(err.is_recognition_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_step2_entry_is_retried_five_times() {
    let h = harness();
    h.engine.hide(Marker::UploadFile);

    let err = h
        .workflow
        .step2(&job(&["https://youtu.be/a"]))
        .await
        .unwrap_err();
    assert!(err.is_recognition_timeout());

    let entry_clicks = h
        .engine
        .actions()
        .iter()
        .filter(|a| matches!(a, Action::Click(_)))
        .count();
    assert_eq!(entry_clicks, 5);
}

#[tokio::test(start_paused = true)]
async fn test_upload_prompt_missing_fails_after_three_passes() {
    let h = harness();
    h.engine.hide(Marker::Continue);
    let start = Instant::now();

    let err = h
        .workflow
        .step2(&job(&["https://youtu.be/a"]))
        .await
        .unwrap_err();
    assert!(err.is_recognition_timeout());
    // initial settle plus one settle per pass
    assert!(Instant::now() - start >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_missing_select_button_skips_job() {
    let h = harness();
    h.engine.hide(Marker::SelectFiles);

    let outcome = h
        .workflow
        .run_job(&job(&["https://youtu.be/a"]), Path::new(FOLDER), true)
        .await;

    assert!(matches!(
        outcome,
        JobOutcome::Skipped {
            state: WorkflowState::SelectFile,
            ..
        }
    ));
    // one refresh from navigation and one before the retry
    assert_eq!(h.engine.key_presses(Key::F5), 2);
    assert!(h.sheets.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_visibility_skips_without_status_write() {
    let h = harness();
    h.engine.hide(Marker::Visibility);

    let outcome = h
        .workflow
        .run_job(&job(&["https://youtu.be/a"]), Path::new(FOLDER), true)
        .await;

    assert!(matches!(
        outcome,
        JobOutcome::Skipped {
            state: WorkflowState::SchedulePublish,
            ..
        }
    ));
    assert!(h.sheets.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_metadata_tolerates_missing_playlist_and_next() {
    let h = harness();
    h.engine.hide(Marker::Playlist);
    h.engine.hide(Marker::Next);

    let job = job(&["https://youtu.be/a"]);
    assert!(h.workflow.enter_metadata(&job).await.is_ok());
    h.engine.show(Marker::Next);
    assert!(h.workflow.step2(&job).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_experimental_form_needs_an_extra_tab() {
    let engine = FakeEngine::new();
    let screen = test_screen(engine.clone());

    choreography::title_to_description(&screen, false).await.unwrap();
    assert_eq!(engine.key_presses(Key::Tab), 2);
    choreography::title_to_description(&screen, true).await.unwrap();
    assert_eq!(engine.key_presses(Key::Tab), 5);
}
