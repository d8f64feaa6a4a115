pub mod inventory;
pub mod medicines;
pub mod reports;
