//! Sequential consumer of payment notifications.

use custody_types::{CustodyError, Notification};
use tokio::sync::mpsc;

use crate::payment::{Outcome, PaymentFlow};

/// Counters reported when the listener stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub received: u64,
    pub assigned: u64,
    pub ignored: u64,
    pub failed: u64,
}

/// Processes notifications one at a time, in arrival order.
#[derive(Debug)]
pub struct NotificationListener {
    flow: PaymentFlow,
}

impl NotificationListener {
    #[must_use]
    pub fn new(flow: PaymentFlow) -> Self {
        Self { flow }
    }

    /// Drain `receiver` until every sender is dropped. Failures are logged
    /// and the notification is dropped; the payer gets no feedback.
    pub async fn run(self, mut receiver: mpsc::Receiver<Notification>) -> ListenerStats {
        let mut stats = ListenerStats::default();
        while let Some(notification) = receiver.recv().await {
            stats.received += 1;
            match self.flow.handle(&notification).await {
                Ok(Outcome::Assigned(node)) => {
                    stats.assigned += 1;
                    tracing::info!(
                        custody = %node.key(),
                        app_id = ?node.app_id,
                        "payment processed"
                    );
                }
                Ok(Outcome::Ignored(_)) => stats.ignored += 1,
                Err(err) => {
                    stats.failed += 1;
                    log_failure(&notification, &err);
                }
            }
        }
        tracing::info!(?stats, "notification channel closed");
        stats
    }
}

fn log_failure(notification: &Notification, err: &CustodyError) {
    match err {
        CustodyError::InvalidPayload { .. }
        | CustodyError::OutOfCapacity
        | CustodyError::NodeNotFound { .. } => {
            tracing::warn!(memo = %notification.memo, error = %err, "payment rejected");
        }
        _ => {
            tracing::error!(memo = %notification.memo, error = %err, "payment processing failed");
        }
    }
}
