use crate::entities::stock_ledger_entry::Direction;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Sender half of the in-process event channel. Cheap to clone; services hold
/// one and publish after their transaction commits.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
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

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    MedicineCreated(i64),

    // Stock events
    StockAdjusted {
        medicine_id: i64,
        direction: Direction,
        quantity: i32,
        stock_on_hand: i32,
        reason: String,
        acting_user_id: i64,
        batches_touched: usize,
    },
    LowStockWarning {
        medicine_id: i64,
        stock_on_hand: i32,
        min_stock_level: i32,
    },
}

// Function to process incoming events and distribute them to the handlers below.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::MedicineCreated(medicine_id) => {
                if let Err(e) = handle_medicine_created(medicine_id).await {
                    error!(
                        "Failed to handle medicine created event: medicine_id={}, error={}",
                        medicine_id, e
                    );
                }
            }
            Event::StockAdjusted {
                medicine_id,
                direction,
                quantity,
                stock_on_hand,
                reason,
                acting_user_id,
                batches_touched,
            } => {
                if let Err(e) = handle_stock_adjusted(
                    medicine_id,
                    direction,
                    quantity,
                    stock_on_hand,
                    &reason,
                    acting_user_id,
                    batches_touched,
                )
                .await
                {
                    error!(
                        "Failed to handle stock adjusted event: medicine_id={}, error={}",
                        medicine_id, e
                    );
                }
            }
            Event::LowStockWarning {
                medicine_id,
                stock_on_hand,
                min_stock_level,
            } => {
                if let Err(e) =
                    handle_low_stock_warning(medicine_id, stock_on_hand, min_stock_level).await
                {
                    error!(
                        "Failed to handle low stock warning: medicine_id={}, error={}",
                        medicine_id, e
                    );
                }
            }
        }
    }

    warn!("Event processing loop has ended");
}

// Handler functions for specific events

async fn handle_medicine_created(medicine_id: i64) -> Result<(), String> {
    info!("Medicine {} added to the catalog", medicine_id);
    Ok(())
}

async fn handle_stock_adjusted(
    medicine_id: i64,
    direction: Direction,
    quantity: i32,
    stock_on_hand: i32,
    reason: &str,
    acting_user_id: i64,
    batches_touched: usize,
) -> Result<(), String> {
    info!(
        medicine_id,
        direction = direction.as_str(),
        quantity,
        stock_on_hand,
        reason,
        acting_user_id,
        batches_touched,
        "Stock adjustment recorded"
    );
    Ok(())
}

async fn handle_low_stock_warning(
    medicine_id: i64,
    stock_on_hand: i32,
    min_stock_level: i32,
) -> Result<(), String> {
    warn!(
        "Low stock alert: medicine {} has {} units on hand (minimum {})",
        medicine_id, stock_on_hand, min_stock_level
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::MedicineCreated(1)).await.is_err());
    }

    #[tokio::test]
    async fn processing_drains_the_channel() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::LowStockWarning {
                medicine_id: 1,
                stock_on_hand: 2,
                min_stock_level: 10,
            })
            .await
            .unwrap();
        drop(sender);
        process_events(rx).await;
    }
}
