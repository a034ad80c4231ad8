pub mod indexers;
pub mod worker;
