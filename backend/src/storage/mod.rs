pub mod db_manager;
pub mod ledger;

pub use db_manager::DbManager;
pub use ledger::LedgerStore;
