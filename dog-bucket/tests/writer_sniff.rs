mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing_test::traced_test;

use common::{create_test_context, Event, RecordingDriver};
use dog_bucket::{BlobError, Bucket, BucketConfig, WriterOptions, DEFAULT_SNIFF_LEN};

fn recording_bucket(config: BucketConfig) -> (Bucket, Arc<Mutex<Vec<Event>>>) {
    let driver = RecordingDriver::new();
    let events = driver.events.clone();
    (Bucket::with_config(driver, config), events)
}

fn open(key: &str, content_type: &str) -> Event {
    Event::Open {
        key: key.to_string(),
        content_type: content_type.to_string(),
    }
}

/// S1. Exactly a full window stays buffered; one more byte opens and flushes
#[tokio::test]
async fn test_window_boundary() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let mut writer = bucket.new_writer(&ctx, "blob", WriterOptions::new()).await.unwrap();

    // Arrange: fill the window across two writes
    let head = vec![b'a'; DEFAULT_SNIFF_LEN - 12];
    let tail = vec![b'b'; 12];
    assert_eq!(writer.write(&head).await.unwrap(), head.len());
    assert_eq!(writer.write(&tail).await.unwrap(), tail.len());
    assert!(events.lock().is_empty());
    assert_eq!(writer.content_type(), None);

    // Act: one byte past the window
    assert_eq!(writer.write(b"c").await.unwrap(), 1);

    // Assert: open, buffered bytes, then the new byte
    let mut buffered = head.clone();
    buffered.extend_from_slice(&tail);
    assert_eq!(
        *events.lock(),
        vec![
            open("blob", "text/plain; charset=utf-8"),
            Event::Write(buffered),
            Event::Write(b"c".to_vec()),
        ]
    );
    assert_eq!(writer.content_type(), Some("text/plain; charset=utf-8"));

    writer.close().await.unwrap();
    assert_eq!(events.lock().last(), Some(&Event::Close));
}

/// S2. Closing below the threshold opens, flushes, then closes
#[tokio::test]
async fn test_close_before_threshold() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let mut writer = bucket
        .new_writer(&ctx, "notes.txt", WriterOptions::new())
        .await
        .unwrap();

    writer.write(b"hello").await.unwrap();
    assert!(events.lock().is_empty());
    writer.close().await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            open("notes.txt", "text/plain"),
            Event::Write(b"hello".to_vec()),
            Event::Close,
        ]
    );
}

/// S3. Closing an untouched writer still creates the (empty) object
#[tokio::test]
async fn test_close_without_writes() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let mut writer = bucket.new_writer(&ctx, "empty", WriterOptions::new()).await.unwrap();

    writer.close().await.unwrap();
    assert_eq!(
        *events.lock(),
        vec![open("empty", "text/plain; charset=utf-8"), Event::Close]
    );
}

/// S4. A single oversized first write is sniffed from its own head
#[tokio::test]
async fn test_oversized_first_write() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let mut writer = bucket.new_writer(&ctx, "image", WriterOptions::new()).await.unwrap();

    let mut png = b"\x89PNG\r\n\x1A\n".to_vec();
    png.resize(600, 0);
    writer.write(&png).await.unwrap();
    writer.close().await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![open("image", "image/png"), Event::Write(png), Event::Close]
    );
}

/// S5. A declared content type opens the driver writer immediately
#[tokio::test]
async fn test_declared_type_skips_sniffing() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let opts = WriterOptions::new().with_content_type("application/json");
    let mut writer = bucket.new_writer(&ctx, "data.bin", opts).await.unwrap();

    assert_eq!(*events.lock(), vec![open("data.bin", "application/json")]);
    assert_eq!(writer.content_type(), Some("application/json"));

    writer.write(b"{}").await.unwrap();
    writer.close().await.unwrap();
    assert_eq!(
        *events.lock(),
        vec![
            open("data.bin", "application/json"),
            Event::Write(b"{}".to_vec()),
            Event::Close,
        ]
    );
}

/// S6. An empty declared content type means "sniff"
#[tokio::test]
async fn test_empty_declared_type_sniffs() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let opts = WriterOptions::new().with_content_type("");
    let mut writer = bucket.new_writer(&ctx, "page", opts).await.unwrap();

    writer.write(b"<html><body>hi</body></html>").await.unwrap();
    assert!(events.lock().is_empty());
    writer.close().await.unwrap();
    assert_eq!(events.lock()[0], open("page", "text/html; charset=utf-8"));
}

/// S7. The window follows the bucket configuration
#[tokio::test]
async fn test_configured_window() {
    let (bucket, events) = recording_bucket(BucketConfig::new().with_sniff_len(4));
    let ctx = create_test_context();
    let mut writer = bucket.new_writer(&ctx, "k", WriterOptions::new()).await.unwrap();

    writer.write(b"%PDF").await.unwrap();
    assert!(events.lock().is_empty());
    writer.write(b"-1.7").await.unwrap();

    // Only the first window's worth of bytes was sniffed
    assert_eq!(events.lock()[0], open("k", "text/plain; charset=utf-8"));
    writer.close().await.unwrap();
}

/// S8. The sniffed prefix spans the buffer and the overflowing write
#[tokio::test]
async fn test_sniff_spans_buffer_and_next_write() {
    let (bucket, events) = recording_bucket(BucketConfig::new().with_sniff_len(8));
    let ctx = create_test_context();
    let mut writer = bucket.new_writer(&ctx, "k", WriterOptions::new()).await.unwrap();

    writer.write(b"%PD").await.unwrap();
    writer.write(b"F-1.7 and more").await.unwrap();
    assert_eq!(events.lock()[0], open("k", "application/pdf"));
    writer.close().await.unwrap();
}

/// S9. Writes and closes after close fail without reaching the driver
#[tokio::test]
async fn test_use_after_close() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let mut writer = bucket.new_writer(&ctx, "k", WriterOptions::new()).await.unwrap();
    writer.close().await.unwrap();
    let seen = events.lock().len();

    assert!(matches!(writer.write(b"x").await, Err(BlobError::Closed { .. })));
    assert!(matches!(writer.close().await, Err(BlobError::Closed { .. })));
    assert!(writer.is_closed());
    assert_eq!(events.lock().len(), seen);
}

/// S10. write_all through a sniffing writer lands every byte in order
#[tokio::test]
async fn test_write_all_through_sniffing_writer() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();

    let data: Vec<u8> = (0..2000u32).map(|i| (i % 26) as u8 + b'a').collect();
    bucket
        .write_all(&ctx, "letters", &data, WriterOptions::new())
        .await
        .unwrap();

    let written: Vec<u8> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            Event::Write(bytes) => Some(bytes.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(written, data);
    assert_eq!(events.lock().last(), Some(&Event::Close));
}

/// S11. A writer dropped without close is logged and commits nothing
#[tokio::test]
#[traced_test]
async fn test_dropped_writer_is_logged() {
    let (bucket, events) = recording_bucket(BucketConfig::default());
    let ctx = create_test_context();
    let mut writer = bucket.new_writer(&ctx, "k", WriterOptions::new()).await.unwrap();

    writer.write(b"abc").await.unwrap();
    drop(writer);

    assert!(events.lock().is_empty());
    assert!(logs_contain("writer dropped without close"));
}
