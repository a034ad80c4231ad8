use std::fmt;

use bitcoin::BlockHash;

use crate::chain::types::Block;

pub mod index;
pub mod pull;

pub type BlockHeight = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub height: BlockHeight,
    pub hash: BlockHash,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.height, self.hash)
    }
}

impl From<&Block> for Point {
    fn from(block: &Block) -> Self {
        Self {
            height: block.height,
            hash: block.hash,
        }
    }
}

/// A block pulled from the node, along with the node's best height at the time.
#[derive(Debug, Clone)]
pub struct ChainEvent {
    pub block: Block,
    pub tip: BlockHeight,
}
