pub mod medicine;
pub mod medicine_batch;
pub mod stock_ledger_entry;
