pub mod postgres_cart_store;
pub mod postgres_ledger;
pub mod postgres_user_directory;

pub use postgres_cart_store::PostgresCartStore;
pub use postgres_ledger::PostgresLedger;
pub use postgres_user_directory::PostgresUserDirectory;
