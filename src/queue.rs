//! Job queue abstraction
//!
//! Scan runs are dispatched by id through a queue with at-least-once
//! delivery; handlers stay idempotent via status guards (a redelivered
//! job whose run is no longer pending is skipped).

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Handler invoked by queue workers for each dequeued job id
pub type JobHandler = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Queue of job ids with at-least-once delivery
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job id
    async fn enqueue(&self, id: &str) -> Result<()>;

    /// Start pull-based workers feeding the handler. Handler errors are
    /// logged, never retried by the in-process queue itself.
    async fn subscribe(&self, handler: JobHandler, workers: usize) -> Result<()>;
}

/// In-process queue backed by an unbounded channel
pub struct InMemoryQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, id: &str) -> Result<()> {
        self.tx
            .send(id.to_string())
            .map_err(|e| Error::Queue(format!("enqueue failed: {}", e)))
    }

    async fn subscribe(&self, handler: JobHandler, workers: usize) -> Result<()> {
        let rx = self
            .rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Queue("queue already subscribed".to_string()))?;
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = rx.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(id) = job else {
                        tracing::debug!("Queue worker {} shutting down", worker);
                        break;
                    };
                    tracing::debug!("Worker {} picked up job {}", worker, id);
                    if let Err(e) = handler(id.clone()).await {
                        tracing::warn!("Job {} failed: {}", id, e);
                    }
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_jobs_reach_handler() {
        let queue = InMemoryQueue::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let handler: JobHandler = Arc::new(move |_id| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
        queue.subscribe(handler, 2).await.unwrap();

        for i in 0..5 {
            queue.enqueue(&format!("job-{}", i)).await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_double_subscribe_rejected() {
        let queue = InMemoryQueue::new();
        let handler: JobHandler = Arc::new(|_id| Box::pin(async { Ok(()) }));
        queue.subscribe(handler.clone(), 1).await.unwrap();
        assert!(queue.subscribe(handler, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_worker() {
        let queue = InMemoryQueue::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let handler: JobHandler = Arc::new(move |id| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if id == "job-bad" {
                    return Err(Error::Internal("boom".to_string()));
                }
                Ok(())
            })
        });
        queue.subscribe(handler, 1).await.unwrap();

        queue.enqueue("job-bad").await.unwrap();
        queue.enqueue("job-good").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
