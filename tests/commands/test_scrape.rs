//! Tests for the scrape pipeline

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use telegram_scraper::commands::scrape::{
    self, progress_text, OutputFormat, ScrapeOutcome, ScrapeRequest, NO_MESSAGES_TEXT,
};
use telegram_scraper::export::SHEET_NAME;
use telegram_scraper::{ChannelRef, MessageRecord};

use super::fakes::{history, private_channel, public_channel, FakeSource, RecordingReporter};

fn request(args: &[&str]) -> ScrapeRequest {
    ScrapeRequest::from_args(args).expect("valid request")
}

fn sheet_rows(data: &[u8]) -> Vec<Vec<Data>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data)).expect("open xlsx");
    let range = workbook.worksheet_range(SHEET_NAME).expect("data sheet");
    range.rows().map(|row| row.to_vec()).collect()
}

fn as_number(cell: &Data) -> f64 {
    match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        other => panic!("expected a number, got {:?}", other),
    }
}

#[tokio::test]
async fn test_scrape_delivers_spreadsheet() {
    let source = FakeSource::new(public_channel(), history(3));
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["@testchannel"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 3 });

    let deliveries = reporter.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].file_name, "Test Channel.xlsx");
    assert_eq!(deliveries[0].caption, "✅ 3 rows • Test Channel");

    let rows = sheet_rows(&deliveries[0].data);
    assert_eq!(rows.len(), 4);
    let header: Vec<String> = rows[0].iter().map(|c| c.to_string()).collect();
    assert_eq!(header, MessageRecord::COLUMNS.to_vec());

    let ids: Vec<f64> = rows[1..].iter().map(|r| as_number(&r[3])).collect();
    assert_eq!(ids, vec![3.0, 2.0, 1.0]);
    assert_eq!(
        rows[1][5],
        Data::String("https://t.me/testchannel/3".to_string())
    );
    assert_eq!(rows[1][6], Data::String("3.jpg".to_string()));
    assert_eq!(rows[1][2], Data::String("No".to_string()));

    assert_eq!(reporter.finished(), 1);
    assert!(reporter.updates().is_empty());
}

#[tokio::test]
async fn test_scrape_private_channel_links_by_id() {
    let source = FakeSource::new(private_channel(), history(2));
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(
        &source,
        &request(&["https://t.me/c/555000111"]),
        &reporter,
    )
    .await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 2 });
    assert_eq!(
        source.resolved.lock().unwrap().as_slice(),
        &[ChannelRef::PrivateChannel(555000111)]
    );

    let deliveries = reporter.deliveries.lock().unwrap();
    assert_eq!(deliveries[0].file_name, "Secret_ Room.xlsx");
    let rows = sheet_rows(&deliveries[0].data);
    assert_eq!(rows[1][2], Data::String("Yes".to_string()));
    assert_eq!(
        rows[1][5],
        Data::String("https://t.me/c/555000111/2".to_string())
    );
}

#[tokio::test]
async fn test_scrape_range_is_inclusive() {
    let source = FakeSource::new(public_channel(), history(10));
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["news", "3", "5"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 3 });

    let deliveries = reporter.deliveries.lock().unwrap();
    let rows = sheet_rows(&deliveries[0].data);
    let ids: Vec<f64> = rows[1..].iter().map(|r| as_number(&r[3])).collect();
    assert_eq!(ids, vec![5.0, 4.0, 3.0]);
}

#[tokio::test]
async fn test_scrape_inverted_range_is_empty() {
    let source = FakeSource::new(public_channel(), history(10));
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["news", "9", "3"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::Empty);
    assert_eq!(reporter.updates(), vec![NO_MESSAGES_TEXT.to_string()]);
    assert!(reporter.deliveries.lock().unwrap().is_empty());
    assert_eq!(reporter.finished(), 0);
}

#[tokio::test]
async fn test_scrape_oversized_start_id_is_empty() {
    for args in [
        &["news", "3000000000", "5"][..],
        &["news", "3000000000"][..],
    ] {
        let source = FakeSource::new(public_channel(), history(10));
        let reporter = RecordingReporter::default();

        let outcome = scrape::execute(&source, &request(args), &reporter).await;
        assert_eq!(outcome, ScrapeOutcome::Empty, "{:?}", args);
        assert_eq!(reporter.updates(), vec![NO_MESSAGES_TEXT.to_string()]);
    }
}

#[tokio::test]
async fn test_scrape_oversized_end_id_is_open() {
    let source = FakeSource::new(public_channel(), history(10));
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["news", "8", "3000000000"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 3 });
}

#[tokio::test]
async fn test_scrape_reports_progress_every_500() {
    let source = FakeSource::new(public_channel(), history(1000));
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["news"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 1000 });
    assert_eq!(
        reporter.updates(),
        vec![progress_text(500), progress_text(1000)]
    );
}

#[tokio::test]
async fn test_scrape_ignores_failed_progress_edits() {
    let source = FakeSource::new(public_channel(), history(600));
    let reporter = RecordingReporter {
        fail_updates: true,
        ..RecordingReporter::default()
    };

    let outcome = scrape::execute(&source, &request(&["news"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 600 });
    assert_eq!(reporter.updates(), vec![progress_text(500)]);
}

#[tokio::test]
async fn test_scrape_ignores_failed_status_cleanup() {
    let source = FakeSource::new(public_channel(), history(2));
    let reporter = RecordingReporter {
        fail_finish: true,
        ..RecordingReporter::default()
    };

    let outcome = scrape::execute(&source, &request(&["news"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 2 });
    assert_eq!(reporter.finished(), 1);
    assert!(reporter.updates().is_empty());
}

#[tokio::test]
async fn test_scrape_rate_limit_discards_records() {
    let mut source = FakeSource::new(public_channel(), history(10));
    source.fail_after = Some(2);
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["news"]), &reporter).await;
    assert_eq!(outcome, ScrapeOutcome::RateLimited { seconds: Some(42) });
    assert!(reporter.deliveries.lock().unwrap().is_empty());
    assert_eq!(
        reporter.updates(),
        vec!["Rate limited. Try later. (A wait of 42 seconds is required)".to_string()]
    );
}

#[tokio::test]
async fn test_scrape_unknown_chat_fails() {
    let mut source = FakeSource::new(public_channel(), history(1));
    source.missing = true;
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["@ghost"]), &reporter).await;
    assert!(matches!(outcome, ScrapeOutcome::Failed { .. }));
    let updates = reporter.updates();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].starts_with("Error: Chat not found"));
}

#[tokio::test]
async fn test_scrape_invalid_reference_fails_before_resolving() {
    let source = FakeSource::new(public_channel(), history(1));
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(&source, &request(&["@"]), &reporter).await;
    assert!(matches!(outcome, ScrapeOutcome::Failed { .. }));
    assert!(source.resolved.lock().unwrap().is_empty());
    assert!(reporter.updates()[0].starts_with("Error: Invalid channel reference"));
}

#[tokio::test]
async fn test_scrape_invite_join_is_best_effort() {
    let mut source = FakeSource::new(private_channel(), history(2));
    source.join_succeeds = false;
    let reporter = RecordingReporter::default();

    let outcome = scrape::execute(
        &source,
        &request(&["https://t.me/+AbCdEf123"]),
        &reporter,
    )
    .await;
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 2 });
    assert_eq!(
        source.joined.lock().unwrap().as_slice(),
        &["AbCdEf123".to_string()]
    );
}

#[tokio::test]
async fn test_scrape_username_skips_invite_join() {
    let source = FakeSource::new(public_channel(), history(1));
    let reporter = RecordingReporter::default();

    scrape::execute(&source, &request(&["https://t.me/testchannel"]), &reporter).await;
    assert!(source.joined.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_scrape_to_dir_writes_xlsx() {
    let source = FakeSource::new(public_channel(), history(4));
    let dir = tempfile::tempdir().expect("tempdir");

    let outcome = scrape::run_to_dir(&source, &request(&["news"]), dir.path(), OutputFormat::Xlsx)
        .await
        .expect("scrape");
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 4 });

    let data = std::fs::read(dir.path().join("Test Channel.xlsx")).expect("xlsx written");
    assert_eq!(sheet_rows(&data).len(), 5);
}

#[tokio::test]
async fn test_scrape_to_dir_writes_json_lines() {
    let source = FakeSource::new(public_channel(), history(3));
    let dir = tempfile::tempdir().expect("tempdir");

    let outcome = scrape::run_to_dir(&source, &request(&["news"]), dir.path(), OutputFormat::Json)
        .await
        .expect("scrape");
    assert_eq!(outcome, ScrapeOutcome::Delivered { rows: 3 });

    let content =
        std::fs::read_to_string(dir.path().join("Test Channel.jsonl")).expect("jsonl written");
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["message_id"], 3);
    assert_eq!(lines[0]["file_name"], "3.jpg");
    assert!(lines[1]["file_name"].is_null());
}

#[tokio::test]
async fn test_scrape_to_dir_empty_writes_nothing() {
    let source = FakeSource::new(public_channel(), Vec::new());
    let dir = tempfile::tempdir().expect("tempdir");

    let outcome = scrape::run_to_dir(&source, &request(&["news"]), dir.path(), OutputFormat::Xlsx)
        .await
        .expect("scrape");
    assert_eq!(outcome, ScrapeOutcome::Empty);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
