use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A received lot of a medicine. Created only by inbound adjustments; never
/// deleted, only decremented. `quantity_available` stays within
/// `0..=quantity` and is non-increasing after creation.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "medicine_batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub batch_id: i64,
    pub medicine_id: i64,
    /// Unique per medicine; generated at receipt.
    pub batch_code: String,
    /// Quantity originally received.
    pub quantity: i32,
    pub quantity_available: i32,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::medicine::Entity",
        from = "Column::MedicineId",
        to = "super::medicine::Column::MedicineId"
    )]
    Medicine,
    #[sea_orm(has_many = "super::stock_ledger_entry::Entity")]
    StockLedgerEntries,
}

impl Related<super::medicine::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Medicine.def()
    }
}

impl Related<super::stock_ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_depleted(&self) -> bool {
        self.quantity_available == 0
    }
}
