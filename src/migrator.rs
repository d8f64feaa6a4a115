use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_medicines_table::Migration),
            Box::new(m20250301_000002_create_medicine_batches_table::Migration),
            Box::new(m20250301_000003_create_stock_ledger_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_medicines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_medicines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Medicines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Medicines::MedicineId)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Medicines::Name).string().not_null())
                        .col(ColumnDef::new(Medicines::Unit).string().not_null())
                        .col(
                            ColumnDef::new(Medicines::MinStockLevel)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Medicines::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Medicines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Medicines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_medicines_name")
                        .table(Medicines::Table)
                        .col(Medicines::Name)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Medicines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Medicines {
        Table,
        MedicineId,
        Name,
        Unit,
        MinStockLevel,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_medicine_batches_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_medicine_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MedicineBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MedicineBatches::BatchId)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MedicineBatches::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MedicineBatches::BatchCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MedicineBatches::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MedicineBatches::QuantityAvailable)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MedicineBatches::ExpiryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MedicineBatches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_medicine_batches_medicine_id")
                                .from(MedicineBatches::Table, MedicineBatches::MedicineId)
                                .to(Medicines::Table, Medicines::MedicineId)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Uniqueness backing generated batch codes
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_medicine_batches_medicine_id_batch_code")
                        .table(MedicineBatches::Table)
                        .col(MedicineBatches::MedicineId)
                        .col(MedicineBatches::BatchCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // Depletion-order scans
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_medicine_batches_medicine_id_expiry_date")
                        .table(MedicineBatches::Table)
                        .col(MedicineBatches::MedicineId)
                        .col(MedicineBatches::ExpiryDate)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MedicineBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MedicineBatches {
        Table,
        BatchId,
        MedicineId,
        BatchCode,
        Quantity,
        QuantityAvailable,
        ExpiryDate,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Medicines {
        Table,
        MedicineId,
    }
}

mod m20250301_000003_create_stock_ledger_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_stock_ledger_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLedger::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLedger::EntryId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedger::MedicineId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedger::BatchId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLedger::Delta).integer().not_null())
                        .col(ColumnDef::new(StockLedger::Reason).string().not_null())
                        .col(
                            ColumnDef::new(StockLedger::ActingUserId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedger::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_ledger_medicine_id")
                                .from(StockLedger::Table, StockLedger::MedicineId)
                                .to(Medicines::Table, Medicines::MedicineId)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_ledger_batch_id")
                                .from(StockLedger::Table, StockLedger::BatchId)
                                .to(MedicineBatches::Table, MedicineBatches::BatchId)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_ledger_batch_id")
                        .table(StockLedger::Table)
                        .col(StockLedger::BatchId)
                        .to_owned(),
                )
                .await?;

            // Period reports scan by medicine and entry time
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_ledger_medicine_id_created_at")
                        .table(StockLedger::Table)
                        .col(StockLedger::MedicineId)
                        .col(StockLedger::CreatedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLedger::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockLedger {
        Table,
        EntryId,
        MedicineId,
        BatchId,
        Delta,
        Reason,
        ActingUserId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Medicines {
        Table,
        MedicineId,
    }

    #[derive(DeriveIden)]
    enum MedicineBatches {
        Table,
        BatchId,
    }
}
