pub mod cart;
pub mod transaction;

pub use cart::{Cart, LineItem, User, checkout_total, order_total};
pub use transaction::{GatewayKind, Transaction, TransactionStatus};
