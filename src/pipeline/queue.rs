use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::warn;

use crate::domain::{ChainRequest, OptionQuote};
use crate::error::{ConfigError, Error, Result};

/// One admitted request, owned by the queue until the dispatcher dequeues it.
pub struct QueueItem {
    pub request: ChainRequest,
    pub submitted_at: Instant,
    /// Response slot; dropped unreplied only if the pipeline shuts down.
    pub reply: oneshot::Sender<Result<OptionQuote>>,
}

/// The dispatcher's end of the admission queue.
pub type QueueReceiver = mpsc::Receiver<QueueItem>;

/// Bounded FIFO admission queue with drop-newest load shedding.
///
/// `submit` never blocks: it either enqueues or rejects immediately with
/// [`Error::Overloaded`]. Already-admitted items are never displaced. The
/// bounded channel's `try_send` resolves races for the last slot atomically,
/// so accepted-but-undequeued items can never exceed the capacity.
pub struct AdmissionQueue {
    tx: mpsc::Sender<QueueItem>,
    capacity: usize,
}

impl AdmissionQueue {
    /// Create a queue of the given capacity. Capacity 0 is invalid.
    pub fn bounded(capacity: usize) -> Result<(Self, QueueReceiver)> {
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_capacity",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok((Self { tx, capacity }, rx))
    }

    /// Admit `item`, or shed it if the queue is full.
    pub fn submit(&self, item: QueueItem) -> Result<()> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(item)) => {
                warn!(
                    symbol = %item.request.symbol,
                    capacity = self.capacity,
                    "admission queue full, shedding request"
                );
                Err(Error::Overloaded)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::PipelineClosed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OptionType;

    fn item(symbol: &str) -> (QueueItem, oneshot::Receiver<Result<OptionQuote>>) {
        let (tx, rx) = oneshot::channel();
        (
            QueueItem {
                request: ChainRequest::new(symbol, OptionType::Call),
                submitted_at: Instant::now(),
                reply: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected_at_construction() {
        assert!(AdmissionQueue::bounded(0).is_err());
    }

    #[tokio::test]
    async fn drop_newest_sheds_exactly_the_overflow() {
        let (queue, mut rx) = AdmissionQueue::bounded(5).unwrap();

        let mut rejected = 0;
        for i in 0..6 {
            let (item, _reply) = item(&format!("SYM{i}"));
            match queue.submit(item) {
                Ok(()) => {}
                Err(Error::Overloaded) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(rejected, 1);

        // The five accepted items come out in submission order; the shed one
        // (the newest) is gone.
        for i in 0..5 {
            let next = rx.recv().await.unwrap();
            assert_eq!(next.request.symbol, format!("SYM{i}"));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dequeue_frees_a_slot() {
        let (queue, mut rx) = AdmissionQueue::bounded(1).unwrap();

        let (first, _r1) = item("A");
        queue.submit(first).unwrap();
        let (second, _r2) = item("B");
        assert!(matches!(queue.submit(second), Err(Error::Overloaded)));

        rx.recv().await.unwrap();
        let (third, _r3) = item("C");
        assert!(queue.submit(third).is_ok());
    }

    #[tokio::test]
    async fn submit_after_receiver_dropped_reports_closed_pipeline() {
        let (queue, rx) = AdmissionQueue::bounded(2).unwrap();
        drop(rx);
        let (it, _reply) = item("A");
        assert!(matches!(queue.submit(it), Err(Error::PipelineClosed)));
    }
}
