//! Post-commit notification dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEvent {
    BookingConfirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingNotification {
    pub event: NotificationEvent,
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One-way message send, called only after a successful commit. Must not
/// block and must never fail the reservation it reports on.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent, order_id: Uuid);
}

/// Notifier backed by an unbounded channel. The host hands the receiver to a
/// [`NotificationWorker`] or to its own mailer consumer.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<BookingNotification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BookingNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: NotificationEvent, order_id: Uuid) {
        let note = BookingNotification {
            event,
            order_id,
            created_at: Utc::now(),
        };
        if self.tx.send(note).is_err() {
            warn!(%order_id, "notification channel closed, dropping event");
        }
    }
}

/// Drains the channel and logs each event. Stands in for the background
/// confirmation-mail worker, which lives outside this core.
pub struct NotificationWorker {
    rx: mpsc::UnboundedReceiver<BookingNotification>,
}

impl NotificationWorker {
    pub fn new(rx: mpsc::UnboundedReceiver<BookingNotification>) -> Self {
        Self { rx }
    }

    pub async fn run(mut self) {
        while let Some(note) = self.rx.recv().await {
            info!(
                order_id = %note.order_id,
                event = ?note.event,
                "dispatching booking notification"
            );
        }
    }
}
