//! Hydra chain model: transactions with their contract receipts, native addresses, HRC20 token
//! events and the node interface used to fetch them.

pub mod address;
pub mod block;
pub mod codec;
pub mod hrc20;
pub mod rpc;
pub mod types;
