use super::*;
use crate::error::Error;
use crate::types::{AttachmentKind, Comment, MediaAttachment, MediaKind, SeenKey};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeSource {
    /// Missing source = fetch fails
    listings: HashMap<String, Vec<Item>>,
    /// Missing item = comment fetch fails
    comments: HashMap<String, Vec<Comment>>,
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_latest(&self, source: &str, limit: u32) -> Result<Vec<Item>> {
        self.listings
            .get(source)
            .map(|items| items.iter().take(limit as usize).cloned().collect())
            .ok_or_else(|| Error::source_unavailable(source, "HTTP 503"))
    }

    async fn fetch_top_comments(&self, item: &Item, n: usize) -> Result<Vec<Comment>> {
        self.comments
            .get(&item.id)
            .map(|c| c.iter().take(n).cloned().collect())
            .ok_or_else(|| Error::comment_fetch(&item.id, "HTTP 500"))
    }
}

#[derive(Default)]
struct FakeDeliverer {
    sent: Mutex<Vec<(i64, Outgoing)>>,
    reports: Mutex<Vec<String>>,
    /// Sends whose text contains this fail
    fail_on: Option<String>,
}

impl FakeDeliverer {
    fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(i64, Outgoing)> {
        self.sent.lock().unwrap().clone()
    }

    fn reports(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deliverer for FakeDeliverer {
    async fn send(&self, topic_id: i64, message: &Outgoing) -> Result<()> {
        if let Some(needle) = &self.fail_on
            && message.text.contains(needle.as_str())
        {
            return Err(Error::delivery(topic_id, "Bad Request: chat not found"));
        }
        self.sent.lock().unwrap().push((topic_id, message.clone()));
        Ok(())
    }

    async fn report_error(&self, message: &str) {
        self.reports.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
struct MemoryStore {
    keys: Mutex<HashSet<SeenKey>>,
    flushes: AtomicUsize,
}

impl MemoryStore {
    fn with(keys: &[SeenKey]) -> Self {
        Self {
            keys: Mutex::new(keys.iter().cloned().collect()),
            ..Default::default()
        }
    }

    fn has(&self, key: &SeenKey) -> bool {
        self.keys.lock().unwrap().contains(key)
    }
}

#[async_trait]
impl SeenStore for MemoryStore {
    async fn load(&self) -> Result<()> {
        Ok(())
    }

    async fn contains(&self, key: &SeenKey) -> Result<bool> {
        Ok(self.has(key))
    }

    async fn record(&self, key: &SeenKey) -> Result<()> {
        self.keys.lock().unwrap().insert(key.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn media_item(source: &str, id: &str) -> Item {
    Item {
        id: id.to_string(),
        source: source.to_string(),
        title: format!("title-{}", id),
        author: "alice".to_string(),
        url: format!("https://www.reddit.com/r/{}/comments/{}/", source, id),
        media: MediaKind::Image,
        attachments: vec![MediaAttachment::new(
            format!("https://i.redd.it/{}.jpg", id),
            AttachmentKind::Photo,
        )],
        ..Default::default()
    }
}

fn text_item(source: &str, id: &str) -> Item {
    Item {
        media: MediaKind::None,
        attachments: Vec::new(),
        ..media_item(source, id)
    }
}

struct Harness {
    relay: Relay,
    deliverer: Arc<FakeDeliverer>,
    store: Arc<MemoryStore>,
}

fn harness(
    routes: Vec<SourceRoute>,
    source: FakeSource,
    deliverer: FakeDeliverer,
    store: MemoryStore,
    config: Config,
) -> Harness {
    let deliverer = Arc::new(deliverer);
    let store = Arc::new(store);
    let relay = Relay::new(
        routes,
        Arc::new(source),
        deliverer.clone(),
        store.clone(),
        config,
    );
    Harness {
        relay,
        deliverer,
        store,
    }
}

fn source_with(listings: Vec<(&str, Vec<Item>)>) -> FakeSource {
    FakeSource {
        listings: listings
            .into_iter()
            .map(|(name, items)| (name.to_string(), items))
            .collect(),
        comments: HashMap::new(),
    }
}

// ---------------------------------------------------------------------------
// Pass semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_new_media_item_delivered_and_recorded_once() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![("aww", vec![media_item("aww", "p1")])]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    let report = h.relay.run_pass().await;

    assert_eq!(report.delivered, 1);
    let sent = h.deliverer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 789);
    assert!(sent[0].1.text.contains("title-p1"));
    assert_eq!(sent[0].1.attachments.len(), 1);
    assert!(h.store.has(&SeenKey::new("aww", "p1")));
}

#[tokio::test]
async fn test_seen_item_not_delivered() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![("aww", vec![media_item("aww", "p1")])]),
        FakeDeliverer::default(),
        MemoryStore::with(&[SeenKey::new("aww", "p1")]),
        Config::default(),
    );

    let report = h.relay.run_pass().await;

    assert_eq!(report.delivered, 0);
    assert_eq!(report.skipped_seen, 1);
    assert!(h.deliverer.sent().is_empty());
}

#[tokio::test]
async fn test_non_media_items_never_delivered() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![(
            "aww",
            vec![text_item("aww", "fresh"), text_item("aww", "old")],
        )]),
        FakeDeliverer::default(),
        MemoryStore::with(&[SeenKey::new("aww", "old")]),
        Config::default(),
    );

    let report = h.relay.run_pass().await;

    assert_eq!(report.skipped_no_media, 2);
    assert!(h.deliverer.sent().is_empty());
    assert!(!h.store.has(&SeenKey::new("aww", "fresh")));
}

#[tokio::test]
async fn test_failed_delivery_leaves_item_unseen() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![(
            "aww",
            vec![media_item("aww", "good"), media_item("aww", "bad")],
        )]),
        FakeDeliverer::failing_on("title-bad"),
        MemoryStore::default(),
        Config::default(),
    );

    let report = h.relay.run_pass().await;

    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed_deliveries, vec![SeenKey::new("aww", "bad")]);
    assert!(h.store.has(&SeenKey::new("aww", "good")));
    assert!(!h.store.has(&SeenKey::new("aww", "bad")));
    assert_eq!(h.deliverer.reports().len(), 1);
}

#[tokio::test]
async fn test_failed_source_does_not_abort_pass() {
    // a: one new media item and one already seen; b: fetch fails
    let h = harness(
        vec![SourceRoute::new("a", 1), SourceRoute::new("b", 2)],
        source_with(vec![(
            "a",
            vec![media_item("a", "new"), media_item("a", "old")],
        )]),
        FakeDeliverer::default(),
        MemoryStore::with(&[SeenKey::new("a", "old")]),
        Config::default(),
    );

    let report = h.relay.run_pass().await;

    assert_eq!(report.sources, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.skipped_seen, 1);
    assert_eq!(report.failed_sources, vec!["b"]);

    let sent = h.deliverer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1);

    let reports = h.deliverer.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("r/b unavailable"), "{:?}", reports);
}

#[tokio::test]
async fn test_comment_failure_still_delivers() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![("aww", vec![media_item("aww", "p1")])]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    let report = h.relay.run_pass().await;

    assert_eq!(report.delivered, 1);
    assert!(!h.deliverer.sent()[0].1.text.contains("Top Comments"));
}

#[tokio::test]
async fn test_comments_are_included() {
    let mut source = source_with(vec![("aww", vec![media_item("aww", "p1")])]);
    source.comments.insert(
        "p1".to_string(),
        vec![
            Comment::new("c1", "hi"),
            Comment::new("c2", "yo"),
            Comment::new("c3", "hey"),
            Comment::new("c4", "extra"),
        ],
    );

    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source,
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );
    h.relay.run_pass().await;

    let text = &h.deliverer.sent()[0].1.text;
    assert!(text.contains("hi") && text.contains("yo") && text.contains("hey"));
    assert!(!text.contains("extra"));
}

#[tokio::test]
async fn test_items_delivered_oldest_first() {
    // Listings arrive newest first
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![(
            "aww",
            vec![
                media_item("aww", "p3"),
                media_item("aww", "p2"),
                media_item("aww", "p1"),
            ],
        )]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    h.relay.run_pass().await;

    let order: Vec<String> = h
        .deliverer
        .sent()
        .iter()
        .map(|(_, m)| m.attachments[0].url.clone())
        .collect();
    assert_eq!(
        order,
        vec![
            "https://i.redd.it/p1.jpg",
            "https://i.redd.it/p2.jpg",
            "https://i.redd.it/p3.jpg"
        ]
    );
}

#[tokio::test]
async fn test_second_pass_delivers_nothing_new() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![(
            "aww",
            vec![media_item("aww", "p1"), media_item("aww", "p2")],
        )]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    assert_eq!(h.relay.run_pass().await.delivered, 2);
    let second = h.relay.run_pass().await;
    assert_eq!(second.delivered, 0);
    assert_eq!(second.skipped_seen, 2);
    assert_eq!(h.deliverer.sent().len(), 2);
}

#[tokio::test]
async fn test_same_id_in_two_sources_is_two_items() {
    let h = harness(
        vec![SourceRoute::new("a", 1), SourceRoute::new("b", 2)],
        source_with(vec![
            ("a", vec![media_item("a", "same")]),
            ("b", vec![media_item("b", "same")]),
        ]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    assert_eq!(h.relay.run_pass().await.delivered, 2);
}

#[tokio::test]
async fn test_shared_destination_topic() {
    let h = harness(
        vec![SourceRoute::new("a", 5), SourceRoute::new("b", 5)],
        source_with(vec![
            ("a", vec![media_item("a", "x")]),
            ("b", vec![media_item("b", "y")]),
        ]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    h.relay.run_pass().await;
    assert!(h.deliverer.sent().iter().all(|(topic, _)| *topic == 5));
}

#[tokio::test]
async fn test_concurrent_sources() {
    let names: Vec<String> = (0..6).map(|i| format!("sub{}", i)).collect();
    let routes = names
        .iter()
        .enumerate()
        .map(|(i, n)| SourceRoute::new(n, i as i64))
        .collect();
    let source = FakeSource {
        listings: names
            .iter()
            .map(|n| (n.clone(), vec![media_item(n, "a"), media_item(n, "b")]))
            .collect(),
        comments: HashMap::new(),
    };
    let config = Config {
        max_concurrent_sources: 4,
        ..Config::default()
    };

    let h = harness(
        routes,
        source,
        FakeDeliverer::default(),
        MemoryStore::default(),
        config,
    );
    let report = h.relay.run_pass().await;

    assert_eq!(report.sources, 6);
    assert_eq!(report.delivered, 12);
    for name in &names {
        assert!(h.store.has(&SeenKey::new(name, "a")));
        assert!(h.store.has(&SeenKey::new(name, "b")));
    }
}

#[tokio::test]
async fn test_store_flushed_after_pass() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![("aww", vec![])]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    h.relay.run_pass().await;
    h.relay.run_pass().await;
    assert_eq!(h.store.flushes.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_stops_on_cancel_during_sleep() {
    let config = Config {
        poll_interval: Duration::from_secs(3600),
        ..Config::default()
    };
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![("aww", vec![media_item("aww", "p1")])]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        config,
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), h.relay.run(shutdown))
        .await
        .expect("relay should stop promptly after cancellation");

    assert_eq!(h.deliverer.sent().len(), 1, "first pass ran before sleeping");
}

#[tokio::test]
async fn test_run_with_cancelled_token_does_nothing() {
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![("aww", vec![media_item("aww", "p1")])]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        Config::default(),
    );

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    h.relay.run(shutdown).await;

    assert!(h.deliverer.sent().is_empty());
}

#[tokio::test]
async fn test_run_repeats_passes() {
    let config = Config {
        poll_interval: Duration::from_millis(20),
        ..Config::default()
    };
    let h = harness(
        vec![SourceRoute::new("aww", 789)],
        source_with(vec![("aww", vec![])]),
        FakeDeliverer::default(),
        MemoryStore::default(),
        config,
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });
    h.relay.run(shutdown).await;

    assert!(h.store.flushes.load(Ordering::SeqCst) >= 2);
}
