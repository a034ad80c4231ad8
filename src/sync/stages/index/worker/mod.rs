pub mod context;
pub mod stage;
