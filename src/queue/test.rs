use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

// Records which tasks ran, in order, and how many ran at the same time.
#[derive(Debug, Default)]
struct Tracker {
    order: Mutex<Vec<usize>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

// Submits a task that marks itself running, sleeps for `delay`, and records `index`.
fn track(tracker: &Arc<Tracker>, queue: &SerialQueue, index: usize, delay: u64) -> Completion<usize> {
    let tracker = tracker.clone();
    queue.submit(move || async move {
        let now = tracker.running.fetch_add(1, Ordering::SeqCst) + 1;
        tracker.max_running.fetch_max(now, Ordering::SeqCst);
        sleep(Duration::from_millis(delay)).await;
        tracker.order.lock().unwrap().push(index);
        tracker.running.fetch_sub(1, Ordering::SeqCst);
        Ok(index)
    })
}

mod submit {
    use super::*;

    #[tokio::test]
    async fn runs_in_submission_order() {
        let queue = SerialQueue::new();
        let tracker = Arc::new(Tracker::default());

        // Earlier tasks take longer, so any overlap would reorder them.
        let completions: Vec<_> = (0..5)
            .map(|i| track(&tracker, &queue, i, 5 * (5 - i as u64)))
            .collect();

        for (i, completion) in completions.into_iter().enumerate() {
            assert_eq!(i, completion.wait().await.unwrap());
        }
        assert_eq!(vec![0, 1, 2, 3, 4], *tracker.order.lock().unwrap());
        assert_eq!(1, tracker.max_running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn concurrent_producers_never_overlap() {
        let queue = SerialQueue::new();
        let tracker = Arc::new(Tracker::default());

        let mut producers = Vec::new();
        for producer in 0..4 {
            let queue = queue.clone();
            let tracker = tracker.clone();
            producers.push(tokio::spawn(async move {
                let mut completions = Vec::new();
                for i in 0..10 {
                    completions.push(track(&tracker, &queue, producer * 10 + i, 1));
                    tokio::task::yield_now().await;
                }
                for completion in completions {
                    completion.wait().await.unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let order = tracker.order.lock().unwrap();
        assert_eq!(40, order.len());
        assert_eq!(1, tracker.max_running.load(Ordering::SeqCst));

        // Each producer's own tasks still ran in the order it submitted them.
        for producer in 0..4 {
            let own: Vec<_> = order.iter().filter(|i| *i / 10 == producer).collect();
            assert!(own.windows(2).all(|w| w[0] < w[1]), "{own:?}");
        }
    }

    #[tokio::test]
    async fn error_is_passed_through() {
        let queue = SerialQueue::new();
        let failed = queue.submit(|| async { Err::<(), _>(anyhow!("no terminal")) });
        let next = queue.submit(|| async { Ok(7) });

        let error = failed.wait().await.unwrap_err();
        assert_eq!("no terminal", error.to_string());
        assert_eq!(7, next.wait().await.unwrap());
    }

    #[tokio::test]
    async fn panicking_task_does_not_stall_queue() {
        let queue = SerialQueue::new();
        let panicked = queue.submit(|| -> std::future::Ready<anyhow::Result<()>> {
            panic!("synchronous failure")
        });
        let next = queue.submit(|| async { Ok("still running") });

        assert!(panicked.wait().await.is_err());
        assert_eq!("still running", next.wait().await.unwrap());
    }

    #[tokio::test]
    async fn panic_while_running_does_not_stall_queue() {
        let queue = SerialQueue::new();
        let panicked = queue.submit(|| async {
            tokio::task::yield_now().await;
            if true {
                panic!("asynchronous failure");
            }
            Ok(())
        });
        let next = queue.submit(|| async { Ok(1) });

        assert!(panicked.wait().await.is_err());
        assert_eq!(1, next.wait().await.unwrap());
    }

    #[tokio::test]
    async fn dropped_completion_still_runs() {
        let queue = SerialQueue::new();
        let tracker = Arc::new(Tracker::default());

        drop(track(&tracker, &queue, 0, 0));
        track(&tracker, &queue, 1, 0).wait().await.unwrap();

        assert_eq!(vec![0, 1], *tracker.order.lock().unwrap());
    }

    #[tokio::test]
    async fn stalled_task_holds_queue() {
        let queue = SerialQueue::new();
        let (release, released) = oneshot::channel::<()>();

        let stalled = queue.submit(move || async move {
            released.await.map_err(|e| anyhow!(e))
        });
        let behind = queue.submit(|| async { Ok(()) }).wait();
        tokio::pin!(behind);

        assert!(timeout(Duration::from_millis(50), &mut behind).await.is_err());

        release.send(()).unwrap();
        stalled.wait().await.unwrap();
        behind.await.unwrap();
    }
}

mod wait_blocking {
    use super::*;

    #[tokio::test]
    async fn works_from_blocking_thread() {
        let queue = SerialQueue::new();
        let handle = queue.clone();
        let result = tokio::task::spawn_blocking(move || {
            handle.submit(|| async { Ok("answered") }).wait_blocking()
        })
        .await
        .unwrap();

        assert_eq!("answered", result.unwrap());
    }

    #[tokio::test]
    async fn interleaves_with_async_submitters_in_order() {
        let queue = SerialQueue::new();
        let tracker = Arc::new(Tracker::default());

        let first = track(&tracker, &queue, 0, 20);
        let blocking_tracker = tracker.clone();
        let blocking_queue = queue.clone();
        let blocking = tokio::task::spawn_blocking(move || {
            track(&blocking_tracker, &blocking_queue, 1, 0).wait_blocking()
        });

        first.wait().await.unwrap();
        assert_eq!(1, blocking.await.unwrap().unwrap());
        assert_eq!(vec![0, 1], *tracker.order.lock().unwrap());
    }
}
