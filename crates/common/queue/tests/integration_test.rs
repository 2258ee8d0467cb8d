use std::{sync::Arc, time::Duration};

use taskgrid_queue::{MemoryQueue, NeverBreak, Queue};
use tokio::time::sleep;

#[tokio::test]
async fn blocked_consumer_wakes_on_put() {
    let q: Arc<MemoryQueue<u32>> = Arc::new(MemoryQueue::new("wake"));

    let consumer = {
        let q = q.clone();
        tokio::spawn(async move { q.get(Some(Duration::from_secs(2))).await.unwrap() })
    };

    sleep(Duration::from_millis(50)).await;
    q.put(99).await.unwrap();

    assert_eq!(consumer.await.unwrap(), Some(99));
}

#[tokio::test]
async fn concurrent_consumers_each_get_one_element() {
    let q: Arc<MemoryQueue<u32>> = Arc::new(MemoryQueue::new("fanout"));

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let q = q.clone();
            tokio::spawn(async move { q.get(Some(Duration::from_secs(2))).await.unwrap() })
        })
        .collect();

    sleep(Duration::from_millis(20)).await;
    for i in 0..4 {
        q.put(i).await.unwrap();
    }

    let mut got = Vec::new();
    for consumer in consumers {
        got.push(consumer.await.unwrap().expect("consumer timed out"));
    }
    got.sort_unstable();
    assert_eq!(got, vec![0, 1, 2, 3]);
    assert!(q.empty().await);
}

#[tokio::test]
async fn watch_and_get_with_never_break_behaves_like_get() {
    let q: MemoryQueue<u32> = MemoryQueue::new("plain");
    q.put(5).await.unwrap();

    let got = q.watch_and_get(&NeverBreak, None).await.unwrap();
    assert_eq!(got, Some(5));

    let got = q
        .watch_and_get(&NeverBreak, Some(Duration::from_millis(30)))
        .await
        .unwrap();
    assert_eq!(got, None);
}

#[tokio::test]
async fn ordering_is_preserved_under_a_single_consumer() {
    let q: Arc<MemoryQueue<u32>> = Arc::new(MemoryQueue::new("fifo"));

    let producer = {
        let q = q.clone();
        tokio::spawn(async move {
            for i in 0..100 {
                q.put(i).await.unwrap();
                if i % 10 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    let mut seen = Vec::new();
    while seen.len() < 100 {
        if let Some(v) = q.get(Some(Duration::from_secs(2))).await.unwrap() {
            seen.push(v);
        }
    }
    producer.await.unwrap();

    assert_eq!(seen, (0..100).collect::<Vec<_>>());
}
