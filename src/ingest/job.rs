//! Jobs and the bounded queue between the planner and the worker.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::{CourierError, Result};

/// Trigger for one ingestion cycle of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: String,
}

impl Job {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Receiving half of the job queue, owned by the worker.
pub type JobReceiver = mpsc::Receiver<Job>;

/// Create a job queue holding at most `capacity` pending jobs.
pub fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobSender { tx }, rx)
}

/// Sending half of the job queue, one clone per scheduled source.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Job>,
}

impl JobSender {
    /// Put a job on the queue.
    ///
    /// When the queue is full this logs a warning and waits for room; jobs
    /// are never dropped.
    pub async fn enqueue(&self, job: Job) -> Result<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!(
                    "Job queue full ({} slots), waiting to enqueue {}",
                    self.tx.max_capacity(),
                    job.source
                );
                self.tx.send(job).await.map_err(|_| CourierError::QueueClosed)
            }
            Err(TrySendError::Closed(_)) => Err(CourierError::QueueClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_enqueue_fifo() {
        let (sender, mut rx) = job_queue(4);
        sender.enqueue(Job::new("a")).await.unwrap();
        sender.enqueue(Job::new("b")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().source, "a");
        assert_eq!(rx.recv().await.unwrap().source, "b");
    }

    #[tokio::test]
    async fn test_enqueue_blocks_when_full() {
        let (sender, mut rx) = job_queue(1);
        sender.enqueue(Job::new("first")).await.unwrap();

        let blocked = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.enqueue(Job::new("second")).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        assert_eq!(rx.recv().await.unwrap().source, "first");
        blocked.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.unwrap().source, "second");
    }

    #[tokio::test]
    async fn test_enqueue_closed() {
        let (sender, rx) = job_queue(1);
        drop(rx);

        let err = sender.enqueue(Job::new("a")).await.unwrap_err();
        assert!(matches!(err, CourierError::QueueClosed));
    }
}
