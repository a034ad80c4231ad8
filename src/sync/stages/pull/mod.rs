pub mod stage;

pub use stage::{Stage, fetch_block};
