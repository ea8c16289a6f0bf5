use super::{input_header, input_row, local_time, source_rows, CellWrite, FakeClock, FakeSheets};
use crate::cache::{RowCache, DEFAULT_CACHE_TTL};
use crate::job::{INPUT_SHEET, SOURCE_SHEET, STATUS_POSTED, STATUS_READY};
use crate::queue::{purpose, QueueClient};
use std::sync::Arc;

fn client(sheets: Arc<FakeSheets>, clock: Arc<FakeClock>) -> QueueClient {
    let cache = Arc::new(RowCache::new(clock, DEFAULT_CACHE_TTL));
    QueueClient::new(sheets, cache)
}

fn seeded() -> Arc<FakeSheets> {
    let sheets = FakeSheets::new();
    sheets.set_rows(
        INPUT_SHEET,
        vec![
            input_header(),
            input_row("V001", "CH1", STATUS_READY, "19/10/2026", "10:00"),
        ],
    );
    sheets.set_rows(SOURCE_SHEET, source_rows(&["V000", "V001", "V001"]));
    sheets
}

#[tokio::test]
async fn test_fetch_is_cached_per_purpose() {
    let sheets = seeded();
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let queue = client(sheets.clone(), clock.clone());

    let first = queue.fetch(INPUT_SHEET, purpose::ROWS).await.unwrap();
    let second = queue.fetch(INPUT_SHEET, purpose::ROWS).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sheets.reads(), 1);

    queue.fetch(INPUT_SHEET, purpose::CLEANUP).await.unwrap();
    assert_eq!(sheets.reads(), 2);

    clock.advance(chrono::Duration::seconds(121));
    queue.fetch(INPUT_SHEET, purpose::ROWS).await.unwrap();
    assert_eq!(sheets.reads(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_retries_rate_limited_reads() {
    let sheets = seeded();
    sheets.fail_reads_with_quota(2);
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let queue = client(sheets.clone(), clock);

    let rows = queue.fetch(INPUT_SHEET, purpose::ROWS).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(sheets.reads(), 3);
}

#[tokio::test]
async fn test_status_write_hits_first_matching_row() {
    let sheets = seeded();
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let queue = client(sheets.clone(), clock);

    let found = queue.update_source_status("V001", STATUS_POSTED).await.unwrap();
    assert!(found);

    // header is row 1, V000 row 2, first V001 row 3; status is column M
    assert_eq!(
        sheets.writes(),
        vec![CellWrite {
            sheet: SOURCE_SHEET.to_string(),
            row: 3,
            col: 13,
            value: STATUS_POSTED.to_string(),
        }]
    );
    let rows = sheets.rows(SOURCE_SHEET);
    assert_eq!(rows[2][12], STATUS_POSTED);
    assert_eq!(rows[3][12], "");
}

#[tokio::test]
async fn test_status_write_invalidates_the_sheet() {
    let sheets = seeded();
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let queue = client(sheets.clone(), clock);

    queue.fetch(SOURCE_SHEET, purpose::ROWS).await.unwrap();
    let reads_before = sheets.reads();

    queue.update_source_status("V000", STATUS_POSTED).await.unwrap();
    // the write itself read through the "source" slot
    assert_eq!(sheets.reads(), reads_before + 1);

    let rows = queue.fetch(SOURCE_SHEET, purpose::ROWS).await.unwrap();
    assert_eq!(sheets.reads(), reads_before + 2);
    assert_eq!(rows[1][12], STATUS_POSTED);
}

#[tokio::test]
async fn test_status_write_for_unknown_code_is_a_noop() {
    let sheets = seeded();
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let queue = client(sheets.clone(), clock);

    let found = queue.update_source_status("NOPE", STATUS_POSTED).await.unwrap();
    assert!(!found);
    assert!(sheets.writes().is_empty());
}

#[tokio::test]
async fn test_header_row_never_matches() {
    let sheets = seeded();
    let clock = FakeClock::at(local_time(2026, 10, 19, 9, 0));
    let queue = client(sheets.clone(), clock);

    let found = queue.update_source_status("CODE", STATUS_POSTED).await.unwrap();
    assert!(!found);
}
