mod common;

use std::sync::Arc;
use std::time::Duration;

use channel_digest::core::models::ChannelCursor;
use channel_digest::cursor::{CursorStore, MemoryCursorStore};
use channel_digest::platform::ChatPlatform;
use channel_digest::source::{ChannelSource, PlatformSource};
use channel_digest::worker::{Aggregator, ChannelOutcome, SourceChannel};
use common::{FailingCursorStore, FakePlatform, ScriptedSource, empty_msg, text_msg};

const TIMEOUT: Duration = Duration::from_secs(5);

fn aggregator(
    platform: Arc<FakePlatform>,
    store: Arc<dyn CursorStore>,
    channels: &[&str],
    fetch_limit: u32,
) -> Aggregator {
    let platform: Arc<dyn ChatPlatform> = platform;
    let source: Arc<dyn ChannelSource> = Arc::new(PlatformSource::new(platform, TIMEOUT));
    let channels = channels
        .iter()
        .map(|id| SourceChannel::new(*id, Arc::clone(&source)))
        .collect();
    Aggregator::new(store, channels, fetch_limit, TIMEOUT)
}

fn references(aggregation: &channel_digest::worker::Aggregation) -> Vec<String> {
    aggregation
        .batch
        .iter()
        .map(|m| m.reference.clone())
        .collect()
}

#[tokio::test]
async fn test_batch_follows_configuration_order() {
    let platform = Arc::new(
        FakePlatform::new()
            .with_history("markets", vec![text_msg(3, "m3"), text_msg(1, "m1")])
            .with_history("news", vec![text_msg(2, "n2")]),
    );
    let store = Arc::new(MemoryCursorStore::new());
    let agg = aggregator(platform, store.clone(), &["news", "markets"], 10);

    let result = agg.fetch_all().await;

    assert_eq!(references(&result), vec!["news:2", "markets:1", "markets:3"]);
    assert_eq!(store.get("news").await.unwrap(), 2);
    assert_eq!(store.get("markets").await.unwrap(), 3);
}

#[tokio::test]
async fn test_empty_message_advances_cursor_but_is_not_batched() {
    let platform = Arc::new(FakePlatform::new().with_history(
        "news",
        vec![
            text_msg(6, "six"),
            text_msg(7, "seven"),
            empty_msg(8),
            text_msg(9, "nine"),
        ],
    ));
    let store = Arc::new(MemoryCursorStore::with_cursors([ChannelCursor {
        channel_id: "news".to_string(),
        last_message_id: 5,
    }]));
    let agg = aggregator(platform, store.clone(), &["news"], 10);

    let result = agg.fetch_all().await;

    assert_eq!(references(&result), vec!["news:6", "news:7", "news:9"]);
    assert_eq!(store.get("news").await.unwrap(), 9);
}

#[tokio::test]
async fn test_failing_channel_is_isolated() {
    let platform = Arc::new(
        FakePlatform::new()
            .with_history("news", vec![text_msg(4, "fresh")])
            .failing("broken"),
    );
    let store = Arc::new(MemoryCursorStore::with_cursors([ChannelCursor {
        channel_id: "broken".to_string(),
        last_message_id: 42,
    }]));
    let agg = aggregator(platform, store.clone(), &["broken", "news"], 10);

    let result = agg.fetch_all().await;

    assert_eq!(references(&result), vec!["news:4"]);
    assert_eq!(store.get("broken").await.unwrap(), 42);
    assert_eq!(store.get("news").await.unwrap(), 4);
    assert!(matches!(
        result.reports[0].outcome,
        ChannelOutcome::FetchFailed { .. }
    ));
    assert!(!result.reports[1].outcome.is_failure());
}

#[tokio::test]
async fn test_cursor_read_failure_skips_channel() {
    let platform = Arc::new(
        FakePlatform::new()
            .with_history("news", vec![text_msg(1, "one")])
            .with_history("markets", vec![text_msg(2, "two")]),
    );
    let store = Arc::new(FailingCursorStore::new().failing_get("news"));
    let agg = aggregator(platform, store.clone(), &["news", "markets"], 10);

    let result = agg.fetch_all().await;

    assert_eq!(references(&result), vec!["markets:2"]);
    assert!(matches!(
        result.reports[0].outcome,
        ChannelOutcome::CursorStoreFailed { .. }
    ));
    assert!(!store.inner().contains("news"));
}

#[tokio::test]
async fn test_cursor_write_failure_drops_that_channels_messages() {
    let platform = Arc::new(
        FakePlatform::new()
            .with_history("news", vec![text_msg(1, "one")])
            .with_history("markets", vec![text_msg(2, "two")]),
    );
    let store = Arc::new(FailingCursorStore::new().failing_set("news"));
    let agg = aggregator(platform, store.clone(), &["news", "markets"], 10);

    let result = agg.fetch_all().await;

    assert_eq!(references(&result), vec!["markets:2"]);
    assert!(result.reports[0].outcome.is_failure());
    assert_eq!(store.inner().get("markets").await.unwrap(), 2);
}

#[tokio::test]
async fn test_fetch_limit_takes_oldest_and_rest_follows_next_run() {
    let history = (1..=25).map(|id| text_msg(id, "x")).collect();
    let platform = Arc::new(FakePlatform::new().with_history("news", history));
    let store = Arc::new(MemoryCursorStore::new());
    let agg = aggregator(platform, store.clone(), &["news"], 10);

    let first = agg.fetch_all().await;
    assert_eq!(first.batch.len(), 10);
    assert_eq!(first.batch.messages()[0].reference, "news:1");
    assert_eq!(store.get("news").await.unwrap(), 10);

    let second = agg.fetch_all().await;
    assert_eq!(second.batch.messages()[0].reference, "news:11");
    assert_eq!(store.get("news").await.unwrap(), 20);

    let third = agg.fetch_all().await;
    assert_eq!(third.batch.len(), 5);
    assert_eq!(store.get("news").await.unwrap(), 25);
}

#[tokio::test]
async fn test_no_message_is_fetched_twice() {
    let platform = Arc::new(FakePlatform::new().with_history("news", vec![text_msg(1, "a")]));
    let store = Arc::new(MemoryCursorStore::new());
    let agg = aggregator(platform.clone(), store.clone(), &["news"], 10);

    let first = agg.fetch_all().await;
    platform.push_messages("news", vec![text_msg(2, "b"), text_msg(3, "c")]);
    let second = agg.fetch_all().await;
    let third = agg.fetch_all().await;

    assert_eq!(references(&first), vec!["news:1"]);
    assert_eq!(references(&second), vec!["news:2", "news:3"]);
    assert!(third.batch.is_empty());
    assert_eq!(store.get("news").await.unwrap(), 3);
}

#[tokio::test]
async fn test_quiet_first_run_leaves_no_cursor_record() {
    let platform = Arc::new(FakePlatform::new());
    let store = Arc::new(MemoryCursorStore::new());
    let agg = aggregator(platform, store.clone(), &["news"], 10);

    let result = agg.fetch_all().await;

    assert!(result.batch.is_empty());
    assert!(!store.contains("news"));
    assert_eq!(
        result.reports[0].outcome,
        ChannelOutcome::Fetched {
            messages: 0,
            previous_cursor: 0,
            new_cursor: 0
        }
    );
}

fn scripted_aggregator(source: Arc<ScriptedSource>, store: Arc<dyn CursorStore>) -> Aggregator {
    let source: Arc<dyn ChannelSource> = source;
    Aggregator::new(store, vec![SourceChannel::new("news", source)], 10, TIMEOUT)
}

fn stored_at(cursor: u64) -> Arc<MemoryCursorStore> {
    Arc::new(MemoryCursorStore::with_cursors([ChannelCursor {
        channel_id: "news".to_string(),
        last_message_id: cursor,
    }]))
}

#[tokio::test]
async fn test_cursor_behind_stored_keeps_stored_and_drops_messages() {
    let source = Arc::new(ScriptedSource::new(
        &[(41, "replayed"), (42, "replayed too")],
        |stored| stored - 1,
    ));
    let store = stored_at(50);
    let agg = scripted_aggregator(source.clone(), store.clone());

    let result = agg.fetch_all().await;

    assert_eq!(source.fetches(), 1);
    assert!(result.batch.is_empty());
    assert_eq!(store.get("news").await.unwrap(), 50);
    assert_eq!(
        result.reports[0].outcome,
        ChannelOutcome::Fetched {
            messages: 0,
            previous_cursor: 50,
            new_cursor: 50
        }
    );
}

#[tokio::test]
async fn test_messages_without_cursor_advance_are_dropped() {
    let source = Arc::new(ScriptedSource::new(&[(50, "already seen")], |stored| stored));
    let store = stored_at(50);
    let agg = scripted_aggregator(source, store.clone());

    let result = agg.fetch_all().await;

    assert!(result.batch.is_empty());
    assert_eq!(store.get("news").await.unwrap(), 50);
    assert_eq!(
        result.reports[0].outcome,
        ChannelOutcome::Fetched {
            messages: 0,
            previous_cursor: 50,
            new_cursor: 50
        }
    );
}

#[tokio::test]
async fn test_cursor_advance_from_scripted_source_is_committed() {
    let source = Arc::new(ScriptedSource::new(&[(51, "fresh")], |stored| stored + 1));
    let store = stored_at(50);
    let agg = scripted_aggregator(source, store.clone());

    let result = agg.fetch_all().await;

    assert_eq!(references(&result), vec!["news:51"]);
    assert_eq!(store.get("news").await.unwrap(), 51);
}
