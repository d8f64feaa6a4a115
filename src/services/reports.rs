use crate::{
    db::DbPool,
    entities::{
        medicine::{self, Entity as Medicine},
        medicine_batch::{self, Entity as MedicineBatch},
        stock_ledger_entry::{self, Entity as StockLedgerEntry},
    },
    errors::ServiceError,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// One medicine's row in the period consumption report. Every figure is a
/// sum of signed ledger deltas; batch state is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRow {
    pub medicine_id: i64,
    pub name: String,
    pub unit: String,
    pub beginning: i32,
    pub received: i32,
    pub consumed: i32,
    pub ending: i32,
}

/// One medicine's row in the current stock-position report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPositionRow {
    pub medicine_id: i64,
    pub name: String,
    pub unit: String,
    pub stock_on_hand: i32,
    pub min_stock_level: i32,
    pub low_stock: bool,
    pub earliest_expiry: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Per-medicine consumption over [from, to]: beginning balance, units
    /// received, units consumed, and the ending balance they imply.
    #[instrument(skip(self))]
    pub async fn consumption_report(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ConsumptionRow>, ServiceError> {
        if from > to {
            return Err(ServiceError::ValidationError(
                "'from' must not be after 'to'".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();

        let medicines = Medicine::find()
            .order_by_asc(medicine::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let period_start = start_of_day(from);
        let period_end = start_of_day(to.succ_opt().unwrap_or(to));

        let entries = StockLedgerEntry::find()
            .filter(stock_ledger_entry::Column::CreatedAt.lt(period_end))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut beginning: HashMap<i64, i64> = HashMap::new();
        let mut received: HashMap<i64, i64> = HashMap::new();
        let mut consumed: HashMap<i64, i64> = HashMap::new();

        for entry in entries {
            if entry.created_at < period_start {
                *beginning.entry(entry.medicine_id).or_default() += i64::from(entry.delta);
            } else if entry.delta > 0 {
                *received.entry(entry.medicine_id).or_default() += i64::from(entry.delta);
            } else {
                *consumed.entry(entry.medicine_id).or_default() += i64::from(-entry.delta);
            }
        }

        let rows = medicines
            .into_iter()
            .map(|m| {
                let beginning = beginning.get(&m.medicine_id).copied().unwrap_or(0) as i32;
                let received = received.get(&m.medicine_id).copied().unwrap_or(0) as i32;
                let consumed = consumed.get(&m.medicine_id).copied().unwrap_or(0) as i32;
                ConsumptionRow {
                    medicine_id: m.medicine_id,
                    name: m.name,
                    unit: m.unit,
                    beginning,
                    received,
                    consumed,
                    ending: beginning + received - consumed,
                }
            })
            .collect();

        Ok(rows)
    }

    /// Current on-hand position per medicine, flagged against the minimum
    /// stock threshold, with the earliest expiry among non-empty batches.
    #[instrument(skip(self))]
    pub async fn stock_position(&self) -> Result<Vec<StockPositionRow>, ServiceError> {
        let db = self.db_pool.as_ref();

        let medicines = Medicine::find()
            .order_by_asc(medicine::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let totals: Vec<(i64, Option<i64>, Option<NaiveDate>)> = MedicineBatch::find()
            .select_only()
            .column(medicine_batch::Column::MedicineId)
            .column_as(medicine_batch::Column::QuantityAvailable.sum(), "total")
            .column_as(medicine_batch::Column::ExpiryDate.min(), "earliest")
            .filter(medicine_batch::Column::QuantityAvailable.gt(0))
            .group_by(medicine_batch::Column::MedicineId)
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let by_medicine: HashMap<i64, (i64, Option<NaiveDate>)> = totals
            .into_iter()
            .map(|(id, total, earliest)| (id, (total.unwrap_or(0), earliest)))
            .collect();

        let rows = medicines
            .into_iter()
            .map(|m| {
                let (on_hand, earliest) = by_medicine
                    .get(&m.medicine_id)
                    .copied()
                    .unwrap_or((0, None));
                let stock_on_hand = on_hand as i32;
                StockPositionRow {
                    medicine_id: m.medicine_id,
                    low_stock: stock_on_hand < m.min_stock_level,
                    name: m.name,
                    unit: m.unit,
                    stock_on_hand,
                    min_stock_level: m.min_stock_level,
                    earliest_expiry: earliest,
                }
            })
            .collect();

        Ok(rows)
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap_or_default(), Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_boundaries_are_utc_midnight() {
        let start = start_of_day("2025-03-14".parse().unwrap());
        assert_eq!(start.to_rfc3339(), "2025-03-14T00:00:00+00:00");
    }
}
