use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::workflow::SettlementTicket;

/// Deferred-task scheduler for system-step settlements.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, ticket: SettlementTicket);
}

/// Queues tickets until the caller drains them. Delays are ignored, which
/// lets tests fire settlements deterministically.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<SettlementTicket>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<SettlementTicket> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, _delay: Duration, ticket: SettlementTicket) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(ticket);
    }
}

/// Sleeps on the tokio timer and posts the ticket back to the runner.
///
/// Must be used from inside a tokio runtime. Pending timers are dropped when
/// the cancellation token fires.
pub struct ChannelScheduler {
    sender: mpsc::UnboundedSender<SettlementTicket>,
    cancel: CancellationToken,
}

impl ChannelScheduler {
    pub fn new(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<SettlementTicket>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender, cancel }, receiver)
    }
}

impl Scheduler for ChannelScheduler {
    fn schedule(&self, delay: Duration, ticket: SettlementTicket) {
        let sender = self.sender.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(invoice_id = %ticket.invoice_id, step_id = %ticket.step_id, "settlement timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if sender.send(ticket).is_err() {
                        debug!("runner stopped before settlement fired");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn ticket(step_id: &str) -> SettlementTicket {
        SettlementTicket {
            invoice_id: "INV-1".to_string(),
            step_id: step_id.to_string(),
            workflow_epoch: 1,
        }
    }

    #[test]
    fn manual_scheduler_drains_in_order() {
        let scheduler = ManualScheduler::new();
        scheduler.schedule(Duration::from_secs(5), ticket("L3"));
        scheduler.schedule(Duration::ZERO, ticket("L4"));

        assert_eq!(scheduler.len(), 2);
        assert_eq!(scheduler.drain(), vec![ticket("L3"), ticket("L4")]);
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn channel_scheduler_fires_after_delay() {
        let (scheduler, mut receiver) = ChannelScheduler::new(CancellationToken::new());
        scheduler.schedule(Duration::from_millis(2500), ticket("L3"));

        tokio::time::sleep(Duration::from_millis(2400)).await;
        assert!(receiver.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(receiver.try_recv().unwrap(), ticket("L3"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_fire() {
        let cancel = CancellationToken::new();
        let (scheduler, mut receiver) = ChannelScheduler::new(cancel.clone());
        scheduler.schedule(Duration::from_millis(100), ticket("L3"));

        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(receiver.try_recv().is_err());
    }
}
