use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A medicine in the health-center catalog. Read-only from the adjuster's
/// point of view; stock lives in `medicine_batches`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "medicines")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub medicine_id: i64,
    #[sea_orm(unique)]
    pub name: String,
    /// Unit of measure shown on reports, e.g. "tablet", "bottle".
    pub unit: String,
    /// On-hand below this threshold flags the medicine as low stock.
    pub min_stock_level: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::medicine_batch::Entity")]
    MedicineBatches,
    #[sea_orm(has_many = "super::stock_ledger_entry::Entity")]
    StockLedgerEntries,
}

impl Related<super::medicine_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MedicineBatches.def()
    }
}

impl Related<super::stock_ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
