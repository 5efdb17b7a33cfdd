use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub type Sender<T> = mpsc::Sender<T>;

/// Receiving half of a bounded queue that several workers pull from.
///
/// Each item goes to exactly one caller of [`SharedReceiver::recv`]. The
/// underlying receiver is dropped once every clone is gone, which makes
/// further sends fail.
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> SharedReceiver<T> {
    /// Wait for the next item; `None` once every sender is dropped and the queue is empty.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Create a bounded channel with the specified buffer size
pub fn create_channel<T>(buffer_size: usize) -> (Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (
        tx,
        SharedReceiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_each_item_delivered_once() {
        let (tx, rx) = create_channel::<u32>(16);

        let mut consumers = Vec::new();
        for _ in 0..3 {
            let rx = rx.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = rx.recv().await {
                    seen.push(item);
                }
                seen
            }));
        }
        drop(rx);

        for i in 0..100 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_full_queue_blocks_sender() {
        let (tx, rx) = create_channel::<u32>(2);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();

        let blocked = timeout(Duration::from_millis(50), tx.send(3)).await;
        assert!(blocked.is_err(), "send into a full queue must wait");

        assert_eq!(rx.recv().await, Some(1));
        timeout(Duration::from_millis(50), tx.send(3))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_fails_after_all_receivers_dropped() {
        let (tx, rx) = create_channel::<u32>(2);
        let other = rx.clone();
        drop(rx);
        assert!(tx.send(1).await.is_ok());

        drop(other);
        assert!(tx.send(2).await.is_err());
    }
}
