use std::collections::HashMap;

use bitcoin::BlockHash;
use bitcoincore_rpc::{Auth, Client, RpcApi};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use crate::{error::Error, storage::encdec::decode_hex};

use super::types::{Log, Receipt, ReceiptStatus, canonical_hex};

/// Everything the indexer needs from a Hydra node.
///
/// Implementations own retry and timeout behaviour; callers treat every error as a failure of
/// the current block.
pub trait ChainSource {
    fn best_height(&self) -> Result<u32, Error>;

    fn block_hash(&self, height: u32) -> Result<BlockHash, Error>;

    /// Serialized block, including the proof-of-stake header extension.
    fn raw_block(&self, hash: &BlockHash) -> Result<Vec<u8>, Error>;

    /// Receipt of one transaction, `None` if it executed no contract.
    fn transaction_receipt(&self, txid: &str) -> Result<Option<Receipt>, Error>;

    /// Receipts of every transaction which emitted logs in the inclusive height range, keyed by
    /// lowercase txid.
    fn search_logs(&self, from: u32, to: u32) -> Result<HashMap<String, Receipt>, Error>;

    /// Executes a read-only contract call and returns its hex output.
    fn call_contract(&self, contract: &str, data: &str) -> Result<String, Error>;
}

/// Receipt entry as returned by `gettransactionreceipt` and `searchlogs`, one per contract
/// output of the transaction.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    #[serde(default)]
    gas_used: u64,
    excepted: Option<String>,
    #[serde(default)]
    log: Vec<RpcLog>,
}

#[derive(Deserialize, Debug, Clone)]
struct RpcLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

fn status_from_excepted(excepted: Option<&str>) -> ReceiptStatus {
    match excepted {
        None => ReceiptStatus::Unknown,
        Some("None") => ReceiptStatus::Ok,
        Some("Revert") => ReceiptStatus::Failure,
        Some(_) => ReceiptStatus::Pending,
    }
}

fn status_rank(status: ReceiptStatus) -> u8 {
    match status {
        ReceiptStatus::Ok => 0,
        ReceiptStatus::Unknown => 1,
        ReceiptStatus::Pending => 2,
        ReceiptStatus::Failure => 3,
    }
}

/// Folds the per-output entries of one transaction into a single receipt. Gas is summed, logs
/// keep their order and the least successful status wins.
fn merge_receipts(entries: Vec<RpcReceipt>) -> Option<Receipt> {
    let mut entries = entries.into_iter();
    let first = entries.next()?;

    let mut receipt = Receipt {
        gas_used: 0,
        gas_limit: 0,
        gas_price: 0,
        status: status_from_excepted(first.excepted.as_deref()),
        logs: vec![],
    };

    for entry in std::iter::once(first).chain(entries) {
        let status = status_from_excepted(entry.excepted.as_deref());
        if status_rank(status) > status_rank(receipt.status) {
            receipt.status = status;
        }

        receipt.gas_used = receipt.gas_used.saturating_add(entry.gas_used);

        receipt.logs.extend(entry.log.into_iter().map(|log| Log {
            address: canonical_hex(&log.address),
            topics: log.topics.iter().map(|t| canonical_hex(t)).collect(),
            data: canonical_hex(&log.data),
        }));
    }

    Some(receipt)
}

/// [`ChainSource`] backed by the node's JSON-RPC interface.
pub struct NodeClient {
    client: Client,
}

impl NodeClient {
    pub fn new(rpc_address: &str, rpc_user: &str, rpc_pass: &str) -> Result<Self, Error> {
        let auth = Auth::UserPass(rpc_user.to_string(), rpc_pass.to_string());

        Ok(Self {
            client: Client::new(rpc_address, auth)?,
        })
    }
}

impl ChainSource for NodeClient {
    fn best_height(&self) -> Result<u32, Error> {
        let count = self.client.get_block_count()?;

        u32::try_from(count).map_err(|_| Error::Custom(format!("block count {count} out of range")))
    }

    fn block_hash(&self, height: u32) -> Result<BlockHash, Error> {
        Ok(self.client.get_block_hash(height.into())?)
    }

    fn raw_block(&self, hash: &BlockHash) -> Result<Vec<u8>, Error> {
        let raw = self.client.get_block_hex(hash)?;

        Ok(decode_hex(|| format!("block {hash}"), &raw)?)
    }

    fn transaction_receipt(&self, txid: &str) -> Result<Option<Receipt>, Error> {
        let entries: Vec<RpcReceipt> = self
            .client
            .call("gettransactionreceipt", &[json!(txid)])?;

        trace!(txid, entries = entries.len(), "fetched receipt");

        Ok(merge_receipts(entries))
    }

    fn search_logs(&self, from: u32, to: u32) -> Result<HashMap<String, Receipt>, Error> {
        let entries: Vec<RpcReceipt> = self
            .client
            .call("searchlogs", &[json!(from), json!(to)])?;

        trace!(from, to, entries = entries.len(), "searched logs");

        let mut by_tx: IndexMap<String, Vec<RpcReceipt>> = IndexMap::new();
        for entry in entries {
            by_tx
                .entry(entry.transaction_hash.to_lowercase())
                .or_default()
                .push(entry);
        }

        Ok(by_tx
            .into_iter()
            .filter_map(|(txid, entries)| merge_receipts(entries).map(|r| (txid, r)))
            .collect())
    }

    fn call_contract(&self, contract: &str, data: &str) -> Result<String, Error> {
        let result: serde_json::Value = self
            .client
            .call("callcontract", &[json!(contract), json!(data)])?;

        result
            .pointer("/executionResult/output")
            .and_then(|output| output.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Custom(format!("callcontract {contract} returned no output")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(value: serde_json::Value) -> Vec<RpcReceipt> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn receipt_entries_are_merged_in_order() {
        let raw = entries(json!([
            {
                "transactionHash": "aa",
                "gasUsed": 100,
                "excepted": "None",
                "log": [{ "address": "EE00", "topics": ["0A"], "data": "64" }]
            },
            {
                "transactionHash": "aa",
                "gasUsed": 50,
                "excepted": "None",
                "log": [{ "address": "ff00", "topics": [], "data": "" }]
            }
        ]));

        let receipt = merge_receipts(raw).unwrap();

        assert_eq!(receipt.gas_used, 150);
        assert_eq!(receipt.status, ReceiptStatus::Ok);
        assert_eq!(
            receipt.logs,
            vec![
                Log {
                    address: "0xee00".into(),
                    topics: vec!["0x0a".into()],
                    data: "0x64".into()
                },
                Log {
                    address: "0xff00".into(),
                    topics: vec![],
                    data: "0x".into()
                },
            ]
        );
    }

    #[test]
    fn status_mapping() {
        let status = |value: serde_json::Value| merge_receipts(entries(value)).unwrap().status;

        assert_eq!(
            status(json!([{ "transactionHash": "a", "excepted": "Revert" }])),
            ReceiptStatus::Failure
        );
        assert_eq!(
            status(json!([{ "transactionHash": "a", "excepted": "OutOfGas" }])),
            ReceiptStatus::Pending
        );
        assert_eq!(
            status(json!([{ "transactionHash": "a" }])),
            ReceiptStatus::Unknown
        );
        assert_eq!(
            status(json!([
                { "transactionHash": "a", "excepted": "None" },
                { "transactionHash": "a", "excepted": "Revert" }
            ])),
            ReceiptStatus::Failure
        );
    }

    #[test]
    fn no_entries_means_no_receipt() {
        assert_eq!(merge_receipts(vec![]), None);
    }
}
