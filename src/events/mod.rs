use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Domain events emitted by the core engines after their transaction
/// commits. Consumers (dashboards, webhooks) subscribe out of band; a
/// failed send never fails the originating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Request lifecycle
    RequestSubmitted {
        request_id: Uuid,
        material_id: Uuid,
        buyer_id: Uuid,
    },
    RequestDeclined(Uuid),

    // Allocation outcomes
    OrderCreated {
        order_id: Uuid,
        request_id: Uuid,
        partial: bool,
    },
    MaterialSoldOut(Uuid),

    // Inventory movement
    StockTransferred {
        transfer_id: Uuid,
        material_id: Uuid,
        quantity: i32,
    },
    MaterialListed(Uuid),
    MaterialDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Builds a bounded event channel. The receiver half is handed to whatever
/// consumer the host process wires up.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}
