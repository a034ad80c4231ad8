use std::fmt;

use serde::Deserialize;

use crate::chain::address::Network;

pub mod pipeline;
pub mod stages;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub network: Network,
    pub node: NodeConfig,
    /// How contract receipts are fetched for each block
    #[serde(default)]
    pub receipt_mode: ReceiptMode,
    /// First height to index when the database is empty (default 0)
    pub start_height: Option<u32>,
    /// Seconds to wait before polling the node again once at the tip
    pub poll_interval_secs: Option<u64>,

    /// Max in-flight blocks between the pull and index stage
    pub stage_queue_size: Option<usize>,
    pub stage_timeout_secs: Option<u64>,

    /// Stop indexing once this height has been processed
    pub stop_after: Option<u32>,
    /// Max number of contracts kept in the contract info cache
    pub contract_cache_size: Option<u64>,
}

#[derive(Deserialize, Clone)]
pub struct NodeConfig {
    pub rpc_address: String,
    pub rpc_user: String,
    pub rpc_pass: String,
}

// the run command logs the whole config at startup
impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("rpc_address", &self.rpc_address)
            .field("rpc_user", &self.rpc_user)
            .field("rpc_pass", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptMode {
    /// One `gettransactionreceipt` call per contract transaction
    #[default]
    PerTransaction,
    /// One `searchlogs` call per block
    Batch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_rpc_password() {
        let config = Config {
            network: Network::Mainnet,
            node: NodeConfig {
                rpc_address: "http://127.0.0.1:3389".into(),
                rpc_user: "hydra".into(),
                rpc_pass: "s3cret-pass".into(),
            },
            receipt_mode: ReceiptMode::default(),
            start_height: None,
            poll_interval_secs: None,
            stage_queue_size: None,
            stage_timeout_secs: None,
            stop_after: None,
            contract_cache_size: None,
        };

        let out = format!("{config:?}");

        assert!(!out.contains("s3cret-pass"));
        assert!(out.contains("<redacted>"));
        assert!(out.contains("http://127.0.0.1:3389"));
    }
}
