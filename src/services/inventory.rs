use crate::{
    db::DbPool,
    entities::{
        medicine::{self, Entity as Medicine},
        medicine_batch::{self, Entity as MedicineBatch},
        stock_ledger_entry::{self, Direction, Entity as StockLedgerEntry},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A stock adjustment request, inbound (receipt) or outbound (issue).
#[derive(Debug, Clone)]
pub struct AdjustStockCommand {
    pub medicine_id: i64,
    pub direction: Direction,
    pub quantity: i32,
    pub reason: String,
    pub acting_user_id: i64,
    /// Required for inbound adjustments; ignored for outbound.
    pub expiry_date: Option<NaiveDate>,
}

impl AdjustStockCommand {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be a positive integer".to_string(),
            ));
        }
        if self.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "reason must not be empty".to_string(),
            ));
        }
        if self.direction == Direction::Inbound && self.expiry_date.is_none() {
            return Err(ServiceError::ValidationError(
                "expiry_date is required for inbound adjustments".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CreateMedicineCommand {
    pub name: String,
    pub unit: String,
    pub min_stock_level: i32,
}

impl CreateMedicineCommand {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "name must not be empty".to_string(),
            ));
        }
        if self.unit.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "unit must not be empty".to_string(),
            ));
        }
        if self.min_stock_level < 0 {
            return Err(ServiceError::ValidationError(
                "min_stock_level must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// One batch touched by an adjustment and the quantity applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentLine {
    pub batch_id: i64,
    pub batch_code: String,
    pub quantity: i32,
}

/// Outcome of a committed stock adjustment.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub medicine_id: i64,
    pub direction: Direction,
    pub total: i32,
    pub lines: Vec<AdjustmentLine>,
    pub stock_on_hand: i32,
}

/// A medicine joined with its current on-hand total.
#[derive(Debug, Clone)]
pub struct MedicineWithStock {
    pub medicine: medicine::Model,
    pub stock_on_hand: i32,
}

/// A planned decrement against one batch, in depletion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTake {
    pub batch_id: i64,
    pub batch_code: String,
    pub take: i32,
}

#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Applies a stock adjustment atomically.
    ///
    /// Inbound receipts create one batch plus one positive ledger entry.
    /// Outbound issues deplete batches in ascending expiry order (ties by
    /// creation order), one negative ledger entry per batch touched. Any
    /// failure rolls the whole adjustment back; nothing partial is ever
    /// visible.
    #[instrument(skip(self, cmd), fields(medicine_id = cmd.medicine_id, direction = cmd.direction.as_str(), quantity = cmd.quantity))]
    pub async fn adjust_stock(
        &self,
        cmd: AdjustStockCommand,
    ) -> Result<StockAdjustment, ServiceError> {
        cmd.validate()?;

        let db = self.db_pool.as_ref();
        let direction = cmd.direction;
        let quantity = cmd.quantity;
        let reason = cmd.reason.clone();
        let acting_user_id = cmd.acting_user_id;

        let started = std::time::Instant::now();
        let outcome = db
            .transaction::<_, (StockAdjustment, i32), ServiceError>(move |txn| {
                Box::pin(async move { apply_adjustment(txn, cmd).await })
            })
            .await;

        let (adjustment, min_stock_level) = match outcome {
            Ok(result) => {
                crate::db::record_transaction_metrics(started, true);
                result
            }
            Err(e) => {
                crate::db::record_transaction_metrics(started, false);
                return Err(match e {
                    TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                    TransactionError::Transaction(service_err) => service_err,
                });
            }
        };

        counter!("meditrack_inventory.adjustments", 1, "direction" => direction.as_str());

        info!(
            medicine_id = adjustment.medicine_id,
            direction = direction.as_str(),
            total = adjustment.total,
            batches = adjustment.lines.len(),
            stock_on_hand = adjustment.stock_on_hand,
            "Stock adjustment committed"
        );

        // The adjustment is already committed; a full or closed event channel
        // must not fail the request at this point.
        let stock_event = Event::StockAdjusted {
            medicine_id: adjustment.medicine_id,
            direction,
            quantity,
            stock_on_hand: adjustment.stock_on_hand,
            reason,
            acting_user_id,
            batches_touched: adjustment.lines.len(),
        };
        if let Err(e) = self.event_sender.send(stock_event).await {
            warn!("Failed to publish stock adjusted event: {}", e);
        }
        if adjustment.stock_on_hand < min_stock_level {
            let low_stock = Event::LowStockWarning {
                medicine_id: adjustment.medicine_id,
                stock_on_hand: adjustment.stock_on_hand,
                min_stock_level,
            };
            if let Err(e) = self.event_sender.send(low_stock).await {
                warn!("Failed to publish low stock warning: {}", e);
            }
        }

        Ok(adjustment)
    }

    /// Adds a medicine to the catalog.
    #[instrument(skip(self, cmd), fields(name = %cmd.name))]
    pub async fn create_medicine(
        &self,
        cmd: CreateMedicineCommand,
    ) -> Result<medicine::Model, ServiceError> {
        cmd.validate()?;

        let db = self.db_pool.as_ref();

        let existing = Medicine::find()
            .filter(medicine::Column::Name.eq(cmd.name.trim()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Medicine '{}' already exists",
                cmd.name.trim()
            )));
        }

        let now = Utc::now();
        let model = medicine::ActiveModel {
            name: Set(cmd.name.trim().to_string()),
            unit: Set(cmd.unit.trim().to_string()),
            min_stock_level: Set(cmd.min_stock_level),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = model.insert(db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::MedicineCreated(created.medicine_id))
            .await
        {
            warn!("Failed to publish medicine created event: {}", e);
        }

        Ok(created)
    }

    /// Lists medicines with their on-hand totals, paginated.
    #[instrument(skip(self))]
    pub async fn list_medicines(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<MedicineWithStock>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let paginator = Medicine::find()
            .order_by_asc(medicine::Column::Name)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let medicines = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<i64> = medicines.iter().map(|m| m.medicine_id).collect();
        let on_hand = stock_on_hand_by_medicine(db, &ids).await?;

        let items = medicines
            .into_iter()
            .map(|medicine| {
                let stock_on_hand = on_hand.get(&medicine.medicine_id).copied().unwrap_or(0);
                MedicineWithStock {
                    medicine,
                    stock_on_hand,
                }
            })
            .collect();

        Ok((items, total))
    }

    /// Fetches one medicine with its on-hand total.
    #[instrument(skip(self))]
    pub async fn get_medicine(&self, medicine_id: i64) -> Result<MedicineWithStock, ServiceError> {
        let db = self.db_pool.as_ref();

        let medicine = Medicine::find_by_id(medicine_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Medicine {} not found", medicine_id)))?;

        let stock_on_hand = stock_on_hand(db, medicine_id).await?;

        Ok(MedicineWithStock {
            medicine,
            stock_on_hand,
        })
    }

    /// Lists a medicine's batches in depletion order. Depleted batches are
    /// hidden unless `include_depleted` is set.
    #[instrument(skip(self))]
    pub async fn list_batches(
        &self,
        medicine_id: i64,
        include_depleted: bool,
    ) -> Result<Vec<medicine_batch::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        self.ensure_medicine_exists(medicine_id).await?;

        let mut query = MedicineBatch::find()
            .filter(medicine_batch::Column::MedicineId.eq(medicine_id))
            .order_by_asc(medicine_batch::Column::ExpiryDate)
            .order_by_asc(medicine_batch::Column::BatchId);

        if !include_depleted {
            query = query.filter(medicine_batch::Column::QuantityAvailable.gt(0));
        }

        query.all(db).await.map_err(ServiceError::db_error)
    }

    /// Lists a medicine's ledger entries newest first, paginated, optionally
    /// narrowed to one batch.
    #[instrument(skip(self))]
    pub async fn list_ledger(
        &self,
        medicine_id: i64,
        batch_id: Option<i64>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<stock_ledger_entry::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        self.ensure_medicine_exists(medicine_id).await?;

        let mut query = StockLedgerEntry::find()
            .filter(stock_ledger_entry::Column::MedicineId.eq(medicine_id))
            .order_by_desc(stock_ledger_entry::Column::CreatedAt);

        if let Some(batch_id) = batch_id {
            query = query.filter(stock_ledger_entry::Column::BatchId.eq(batch_id));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let entries = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((entries, total))
    }

    /// Current on-hand total for one medicine.
    pub async fn stock_on_hand(&self, medicine_id: i64) -> Result<i32, ServiceError> {
        stock_on_hand(self.db_pool.as_ref(), medicine_id).await
    }

    async fn ensure_medicine_exists(&self, medicine_id: i64) -> Result<(), ServiceError> {
        let exists = Medicine::find_by_id(medicine_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if exists.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Medicine {} not found",
                medicine_id
            )));
        }
        Ok(())
    }
}

/// Plans which batches an outbound quantity comes from. `batches` must
/// already be in depletion order with `quantity_available > 0`.
pub fn plan_depletion(
    batches: &[medicine_batch::Model],
    requested: i32,
) -> Result<Vec<PlannedTake>, ServiceError> {
    let available: i64 = batches.iter().map(|b| b.quantity_available as i64).sum();
    if i64::from(requested) > available {
        return Err(ServiceError::InsufficientStock(format!(
            "requested {} units but only {} available",
            requested, available
        )));
    }

    let mut remaining = requested;
    let mut plan = Vec::new();
    for batch in batches {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity_available);
        if take == 0 {
            continue;
        }
        plan.push(PlannedTake {
            batch_id: batch.batch_id,
            batch_code: batch.batch_code.clone(),
            take,
        });
        remaining -= take;
    }

    Ok(plan)
}

async fn apply_adjustment(
    txn: &DatabaseTransaction,
    cmd: AdjustStockCommand,
) -> Result<(StockAdjustment, i32), ServiceError> {
    let medicine = Medicine::find_by_id(cmd.medicine_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .filter(|m| m.active)
        .ok_or_else(|| ServiceError::NotFound(format!("Medicine {} not found", cmd.medicine_id)))?;

    let lines = match cmd.direction {
        Direction::Inbound => {
            let expiry_date = cmd.expiry_date.ok_or_else(|| {
                ServiceError::ValidationError(
                    "expiry_date is required for inbound adjustments".to_string(),
                )
            })?;
            let now = Utc::now();
            let batch = medicine_batch::ActiveModel {
                medicine_id: Set(medicine.medicine_id),
                batch_code: Set(generate_batch_code(now)),
                quantity: Set(cmd.quantity),
                quantity_available: Set(cmd.quantity),
                expiry_date: Set(expiry_date),
                created_at: Set(now),
                ..Default::default()
            };
            let batch = batch.insert(txn).await.map_err(ServiceError::db_error)?;

            record_ledger_entry(
                txn,
                medicine.medicine_id,
                batch.batch_id,
                cmd.quantity,
                &cmd.reason,
                cmd.acting_user_id,
            )
            .await?;

            vec![AdjustmentLine {
                batch_id: batch.batch_id,
                batch_code: batch.batch_code,
                quantity: cmd.quantity,
            }]
        }
        Direction::Outbound => {
            let batches = MedicineBatch::find()
                .filter(medicine_batch::Column::MedicineId.eq(medicine.medicine_id))
                .filter(medicine_batch::Column::QuantityAvailable.gt(0))
                .order_by_asc(medicine_batch::Column::ExpiryDate)
                .order_by_asc(medicine_batch::Column::BatchId)
                .all(txn)
                .await
                .map_err(ServiceError::db_error)?;

            let plan = plan_depletion(&batches, cmd.quantity)?;
            let mut lines = Vec::with_capacity(plan.len());

            for planned in plan {
                // Conditional decrement: zero rows affected means another
                // adjuster consumed this batch after we planned against it.
                let update = MedicineBatch::update_many()
                    .col_expr(
                        medicine_batch::Column::QuantityAvailable,
                        Expr::col(medicine_batch::Column::QuantityAvailable).sub(planned.take),
                    )
                    .filter(medicine_batch::Column::BatchId.eq(planned.batch_id))
                    .filter(medicine_batch::Column::QuantityAvailable.gte(planned.take))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                if update.rows_affected == 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Batch {} was adjusted concurrently; resubmit the adjustment",
                        planned.batch_code
                    )));
                }

                record_ledger_entry(
                    txn,
                    medicine.medicine_id,
                    planned.batch_id,
                    -planned.take,
                    &cmd.reason,
                    cmd.acting_user_id,
                )
                .await?;

                lines.push(AdjustmentLine {
                    batch_id: planned.batch_id,
                    batch_code: planned.batch_code,
                    quantity: planned.take,
                });
            }

            lines
        }
    };

    let stock_on_hand = stock_on_hand(txn, medicine.medicine_id).await?;

    Ok((
        StockAdjustment {
            medicine_id: medicine.medicine_id,
            direction: cmd.direction,
            total: cmd.quantity,
            lines,
            stock_on_hand,
        },
        medicine.min_stock_level,
    ))
}

async fn record_ledger_entry<C: ConnectionTrait>(
    conn: &C,
    medicine_id: i64,
    batch_id: i64,
    delta: i32,
    reason: &str,
    acting_user_id: i64,
) -> Result<stock_ledger_entry::Model, ServiceError> {
    let entry = stock_ledger_entry::ActiveModel {
        entry_id: Set(Uuid::new_v4()),
        medicine_id: Set(medicine_id),
        batch_id: Set(batch_id),
        delta: Set(delta),
        reason: Set(reason.to_string()),
        acting_user_id: Set(acting_user_id),
        ..Default::default()
    };

    entry.insert(conn).await.map_err(ServiceError::db_error)
}

/// Sum of `quantity_available` across a medicine's batches.
pub async fn stock_on_hand<C: ConnectionTrait>(
    conn: &C,
    medicine_id: i64,
) -> Result<i32, ServiceError> {
    let total: Option<Option<i64>> = MedicineBatch::find()
        .select_only()
        .column_as(medicine_batch::Column::QuantityAvailable.sum(), "total")
        .filter(medicine_batch::Column::MedicineId.eq(medicine_id))
        .into_tuple()
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(total.flatten().unwrap_or(0) as i32)
}

async fn stock_on_hand_by_medicine<C: ConnectionTrait>(
    conn: &C,
    medicine_ids: &[i64],
) -> Result<HashMap<i64, i32>, ServiceError> {
    if medicine_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i64, Option<i64>)> = MedicineBatch::find()
        .select_only()
        .column(medicine_batch::Column::MedicineId)
        .column_as(medicine_batch::Column::QuantityAvailable.sum(), "total")
        .filter(medicine_batch::Column::MedicineId.is_in(medicine_ids.iter().copied()))
        .group_by(medicine_batch::Column::MedicineId)
        .into_tuple()
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(rows
        .into_iter()
        .map(|(id, total)| (id, total.unwrap_or(0) as i32))
        .collect())
}

fn generate_batch_code(received_at: DateTime<Utc>) -> String {
    let suffix: u16 = rand::random();
    format!("B{}-{:04x}", received_at.format("%Y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn batch(batch_id: i64, expiry: &str, available: i32) -> medicine_batch::Model {
        medicine_batch::Model {
            batch_id,
            medicine_id: 1,
            batch_code: format!("B-{}", batch_id),
            quantity: available,
            quantity_available: available,
            expiry_date: expiry.parse().unwrap(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn depletion_spans_batches_in_order() {
        let batches = vec![batch(1, "2025-01-01", 5), batch(2, "2025-06-01", 10)];
        let plan = plan_depletion(&batches, 8).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].batch_id, plan[0].take), (1, 5));
        assert_eq!((plan[1].batch_id, plan[1].take), (2, 3));
    }

    #[test]
    fn depletion_stops_at_exact_fit() {
        let batches = vec![batch(1, "2025-01-01", 5), batch(2, "2025-06-01", 10)];
        let plan = plan_depletion(&batches, 5).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!((plan[0].batch_id, plan[0].take), (1, 5));
    }

    #[test]
    fn depletion_rejects_insufficient_stock() {
        let batches = vec![batch(1, "2025-01-01", 5), batch(2, "2025-06-01", 10)];
        let err = plan_depletion(&batches, 20).unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock(_)));
    }

    #[test]
    fn depletion_of_empty_stock_is_insufficient() {
        let err = plan_depletion(&[], 1).unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock(_)));
    }

    #[test]
    fn batch_codes_embed_the_receipt_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let code = generate_batch_code(at);
        assert!(code.starts_with("B20250314092653-"));
        assert_eq!(code.len(), "B20250314092653-".len() + 4);
    }

    #[test]
    fn inbound_requires_expiry_date() {
        let cmd = AdjustStockCommand {
            medicine_id: 1,
            direction: Direction::Inbound,
            quantity: 10,
            reason: "delivery".into(),
            acting_user_id: 1,
            expiry_date: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let cmd = AdjustStockCommand {
            medicine_id: 1,
            direction: Direction::Outbound,
            quantity: 0,
            reason: "dispense".into(),
            acting_user_id: 1,
            expiry_date: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
