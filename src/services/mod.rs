pub mod checkout;

pub use checkout::{CheckoutService, CheckoutSession, SettlementReceipt};
