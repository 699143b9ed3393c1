//! End-to-end write path: submit → serialized apply → rebuild → ticket
//! outcome, plus the mutual-exclusion and ordering guarantees.

mod support;

use std::sync::Arc;
use std::time::Duration;

use orso::application::context::AppContext;
use orso::cache::MemoryCache;
use orso::queue::processor::QueueProcessor;
use orso::queue::{JobKind, JobOutcome, JobQueue};

use support::MemoryStore;

async fn start_context(store: &Arc<MemoryStore>, tick: Duration) -> AppContext {
    AppContext::initialize(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        tick,
    )
    .await
    .expect("context initializes")
}

fn create_bear(name: &str, size: i64, colors: &[&str]) -> JobKind {
    JobKind::CreateBear {
        name: name.to_string(),
        size,
        colors: colors.iter().map(|c| c.to_string()).collect(),
    }
}

#[tokio::test]
async fn created_bear_lands_in_the_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let context = start_context(&store, Duration::from_millis(5)).await;

    let ticket = context.submit(create_bear("Gummy", 5, &[]));
    assert_eq!(ticket.outcome().await, JobOutcome::Applied);

    let cache = context.cache();
    assert!(cache.bears_in_size_range(0, 4).is_empty());
    let hits = cache.bears_in_size_range(5, 320);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Gummy");

    context.shutdown().await;
}

#[tokio::test]
async fn color_filter_finds_the_tagged_bear() {
    let store = Arc::new(MemoryStore::new());
    let context = start_context(&store, Duration::from_millis(5)).await;

    let ticket = context.submit(JobKind::CreateColor {
        name: "black".to_string(),
        hex: "#000000".to_string(),
    });
    assert_eq!(ticket.outcome().await, JobOutcome::Applied);

    let ticket = context.submit(create_bear("Grizzly", 320, &["black"]));
    assert_eq!(ticket.outcome().await, JobOutcome::Applied);

    let cache = context.cache();
    let black = cache
        .all_colors()
        .iter()
        .find(|color| color.name == "black")
        .expect("black exists")
        .id;

    let hits = cache.bears_with_colors_in_range(&[black], 0, 330);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Grizzly");

    context.shutdown().await;
}

#[tokio::test]
async fn deleting_a_color_takes_its_bears_with_it() {
    let store = Arc::new(MemoryStore::new());
    let context = start_context(&store, Duration::from_millis(5)).await;

    let first = context.submit(create_bear("Kodiak", 100, &["black"]));
    let second = context.submit(create_bear("Spirit", 90, &["black"]));
    assert_eq!(first.outcome().await, JobOutcome::Applied);
    assert_eq!(second.outcome().await, JobOutcome::Applied);
    assert_eq!(context.cache().bears_in_size_range(0, 9999).len(), 2);

    let ticket = context.submit(JobKind::DeleteColor {
        name: "black".to_string(),
    });
    assert_eq!(ticket.outcome().await, JobOutcome::Applied);

    let cache = context.cache();
    assert!(cache.bears_in_size_range(0, 9999).is_empty());
    assert!(cache.all_colors().is_empty());

    context.shutdown().await;
}

#[tokio::test]
async fn rename_then_resize_apply_in_submission_order() {
    let store = Arc::new(MemoryStore::new());
    let context = start_context(&store, Duration::from_millis(5)).await;

    let ticket = context.submit(create_bear("Cub", 10, &[]));
    assert_eq!(ticket.outcome().await, JobOutcome::Applied);
    let id = context.cache().bears_in_size_range(0, 9999)[0].id;

    let rename = context.submit(JobKind::RenameBear {
        id,
        name: "Boar".to_string(),
    });
    let resize = context.submit(JobKind::ResizeBear { id, size: 25 });
    assert_eq!(rename.outcome().await, JobOutcome::Applied);
    assert_eq!(resize.outcome().await, JobOutcome::Applied);

    let hits = context.cache().bears_in_size_range(25, 25);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Boar");
    assert_eq!(
        store.applied_ops(),
        vec![
            "create_bear Cub".to_string(),
            format!("rename_bear {id} Boar"),
            format!("resize_bear {id} 25"),
        ]
    );

    context.shutdown().await;
}

#[tokio::test]
async fn backlog_drains_in_fifo_order() {
    let store = Arc::new(MemoryStore::new());
    let context = start_context(&store, Duration::from_millis(2)).await;

    let names: Vec<String> = (0..10).map(|i| format!("bear-{i:02}")).collect();
    let tickets: Vec<_> = names
        .iter()
        .map(|name| context.submit(create_bear(name, 1, &[])))
        .collect();
    for ticket in tickets {
        assert_eq!(ticket.outcome().await, JobOutcome::Applied);
    }

    let expected: Vec<String> = names
        .iter()
        .map(|name| format!("create_bear {name}"))
        .collect();
    assert_eq!(store.applied_ops(), expected);

    context.shutdown().await;
}

#[tokio::test]
async fn failed_job_is_discarded_without_blocking_the_next() {
    let store = Arc::new(MemoryStore::new());
    let context = start_context(&store, Duration::from_millis(5)).await;

    let good = context.submit(create_bear("Panda", 50, &[]));
    let bad = context.submit(JobKind::RenameBear {
        id: 999,
        name: "Ghost".to_string(),
    });
    let after = context.submit(create_bear("Sloth", 60, &[]));

    assert_eq!(good.outcome().await, JobOutcome::Applied);
    assert!(matches!(bad.outcome().await, JobOutcome::Failed(_)));
    assert_eq!(after.outcome().await, JobOutcome::Applied);

    let mut names: Vec<String> = context
        .cache()
        .bears_in_size_range(0, 9999)
        .into_iter()
        .map(|bear| bear.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["Panda", "Sloth"]);

    context.shutdown().await;
}

#[tokio::test]
async fn shutdown_abandons_whatever_is_still_queued() {
    let store = Arc::new(MemoryStore::new());
    // A tick period long enough that the job is never picked up.
    let context = start_context(&store, Duration::from_secs(600)).await;

    let ticket = context.submit(create_bear("Never", 1, &[]));
    context.shutdown().await;

    assert_eq!(ticket.outcome().await, JobOutcome::Abandoned);
    assert!(store.applied_ops().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ticks_never_overlap_store_writes() {
    let store = Arc::new(MemoryStore::with_apply_delay(Duration::from_millis(10)));
    let queue = Arc::new(JobQueue::new());
    let cache = Arc::new(MemoryCache::new(store.clone(), store.clone()));
    cache.rebuild().await.expect("initial rebuild");

    let processor = Arc::new(QueueProcessor::new(
        queue.clone(),
        store.clone(),
        store.clone(),
        cache,
    ));

    let names: Vec<String> = (0..6).map(|i| format!("bear-{i}")).collect();
    let tickets: Vec<_> = names
        .iter()
        .map(|name| queue.submit(create_bear(name, 1, &[])))
        .collect();

    let mut drains = Vec::new();
    for _ in 0..8 {
        let processor = processor.clone();
        let queue = queue.clone();
        drains.push(tokio::spawn(async move {
            while !queue.is_empty() {
                processor.tick().await;
                tokio::task::yield_now().await;
            }
        }));
    }
    for drain in drains {
        drain.await.expect("drain task");
    }
    for ticket in tickets {
        assert_eq!(ticket.outcome().await, JobOutcome::Applied);
    }

    assert_eq!(store.max_observed_concurrency(), 1);
    let expected: Vec<String> = names
        .iter()
        .map(|name| format!("create_bear {name}"))
        .collect();
    assert_eq!(store.applied_ops(), expected);
}
