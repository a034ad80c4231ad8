pub mod addresses;
pub mod transactions;
