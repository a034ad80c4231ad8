//! HRC20 token support: `Transfer` event decoding and read-only contract queries.

use std::time::Duration;

use alloy_primitives::U256;
use mini_moka::sync::Cache;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{error::Error, storage::encdec::decode_hex_fixed};

use super::{
    address::{ACCOUNT_DESCRIPTOR_LEN, AddressCodec, AddressError},
    rpc::ChainSource,
    types::Log,
};

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_EVENT_SIGNATURE: &str =
    "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

const NAME_SIGNATURE: &str = "06fdde03";
const SYMBOL_SIGNATURE: &str = "95d89b41";
const DECIMALS_SIGNATURE: &str = "313ce567";
const BALANCE_OF_SIGNATURE: &str = "70a08231";

const DEFAULT_DECIMALS: u8 = 18;

pub type ContractId = [u8; ACCOUNT_DESCRIPTOR_LEN];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("log {log}: invalid transfer amount {value:?}")]
    Amount { log: usize, value: String },
    #[error("log {log}: topic {topic} is not an account: {reason}")]
    Topic {
        log: usize,
        topic: usize,
        reason: String,
    },
    #[error("log {log}: invalid contract address {address:?}")]
    Contract { log: usize, address: String },
    #[error(transparent)]
    Address(#[from] AddressError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub contract: ContractId,
    /// Native address of the sender
    pub from: String,
    /// Native address of the recipient
    pub to: String,
    pub amount: U256,
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn is_transfer_event(log: &Log) -> bool {
    log.topics.len() == 3
        && strip_hex_prefix(&log.topics[0]).eq_ignore_ascii_case(TRANSFER_EVENT_SIGNATURE)
}

/// Decodes every token `Transfer` event of a receipt, in log order. Any malformed event fails
/// the whole receipt so transfers are never indexed partially.
pub fn extract_transfers(
    logs: &[Log],
    codec: &impl AddressCodec,
) -> Result<Vec<TokenTransfer>, ResolutionError> {
    let mut transfers = vec![];

    for (i, log) in logs.iter().enumerate() {
        if !is_transfer_event(log) {
            continue;
        }

        let contract = decode_hex_fixed(String::new, &log.address).map_err(|_| {
            ResolutionError::Contract {
                log: i,
                address: log.address.clone(),
            }
        })?;

        let from = topic_account(i, 1, &log.topics[1])?;
        let to = topic_account(i, 2, &log.topics[2])?;

        transfers.push(TokenTransfer {
            contract,
            from: codec.account_to_address(&from),
            to: codec.account_to_address(&to),
            amount: parse_amount(i, &log.data)?,
        });
    }

    Ok(transfers)
}

/// Account held in a 32-byte topic, left padded with zeros.
fn topic_account(log: usize, topic: usize, value: &str) -> Result<ContractId, ResolutionError> {
    let err = |reason: String| ResolutionError::Topic { log, topic, reason };

    let raw: [u8; 32] = decode_hex_fixed(String::new, value).map_err(|e| err(e.to_string()))?;

    let significant = raw
        .iter()
        .position(|b| *b != 0)
        .map_or(&raw[32..], |start| &raw[start..]);

    if significant.len() > ACCOUNT_DESCRIPTOR_LEN {
        return Err(err(format!(
            "{} significant bytes exceed account width",
            significant.len()
        )));
    }

    let mut account = [0u8; ACCOUNT_DESCRIPTOR_LEN];
    account[ACCOUNT_DESCRIPTOR_LEN - significant.len()..].copy_from_slice(significant);

    Ok(account)
}

fn parse_amount(log: usize, data: &str) -> Result<U256, ResolutionError> {
    let digits = strip_hex_prefix(data);

    let invalid = || ResolutionError::Amount {
        log,
        value: data.to_string(),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    U256::from_str_radix(digits, 16).map_err(|_| invalid())
}

/// Decoded ABI `uint256` result, `None` if the output is too short or not hex.
pub fn parse_numeric_property(output: &str) -> Option<U256> {
    let digits = strip_hex_prefix(output);

    let word = digits.get(..64)?;

    U256::from_str_radix(word, 16).ok()
}

/// Decoded ABI `string` result. Contracts returning a `bytes32` are handled too.
pub fn parse_string_property(output: &str) -> Option<String> {
    let raw = hex::decode(strip_hex_prefix(output)).ok()?;

    if raw.len() >= 64 {
        let len = U256::from_be_slice(&raw[32..64]);
        let len = usize::try_from(len).ok()?;

        let value = raw.get(64..64usize.checked_add(len)?)?;

        return String::from_utf8(value.to_vec()).ok();
    }

    if raw.len() == 32 {
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());

        return String::from_utf8(raw[..end].to_vec()).ok();
    }

    None
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ContractInfo {
    pub contract: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Memoised contract metadata, owned by whoever runs the lookups. `None` entries record
/// contracts which are not tokens.
#[derive(Clone)]
pub struct ContractInfoCache {
    cache: Cache<ContractId, Option<ContractInfo>>,
}

impl ContractInfoCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(Duration::from_secs(24 * 60 * 60))
                .build(),
        }
    }

    pub fn get(&self, contract: &ContractId) -> Option<Option<ContractInfo>> {
        self.cache.get(contract)
    }

    pub fn insert(&self, contract: ContractId, info: Option<ContractInfo>) {
        self.cache.insert(contract, info);
    }

    pub fn log(&self) -> String {
        format!("entries={}", self.cache.entry_count())
    }
}

/// Name, symbol and decimals of a token contract, `None` if the contract has no name.
pub fn contract_info(
    source: &impl ChainSource,
    cache: &ContractInfoCache,
    contract: &ContractId,
) -> Result<Option<ContractInfo>, Error> {
    if let Some(info) = cache.get(contract) {
        return Ok(info);
    }

    let address = hex::encode(contract);

    let name = parse_string_property(&source.call_contract(&address, NAME_SIGNATURE)?)
        .filter(|name| !name.is_empty());

    let info = match name {
        Some(name) => {
            let symbol = parse_string_property(&source.call_contract(&address, SYMBOL_SIGNATURE)?)
                .unwrap_or_default();

            let decimals =
                parse_numeric_property(&source.call_contract(&address, DECIMALS_SIGNATURE)?)
                    .and_then(|d| u8::try_from(d).ok())
                    .unwrap_or(DEFAULT_DECIMALS);

            Some(ContractInfo {
                contract: address,
                name,
                symbol,
                decimals,
            })
        }
        None => {
            debug!(contract = %address, "contract has no token name");
            None
        }
    };

    cache.insert(*contract, info.clone());

    Ok(info)
}

/// Token balance of `account` held in `contract`.
pub fn contract_balance(
    source: &impl ChainSource,
    contract: &ContractId,
    account: &ContractId,
) -> Result<U256, Error> {
    let address = hex::encode(contract);
    let data = format!("{BALANCE_OF_SIGNATURE}{:0>64}", hex::encode(account));

    let output = source.call_contract(&address, &data)?;

    parse_numeric_property(&output)
        .ok_or_else(|| Error::Custom(format!("balanceOf on {address} returned {output:?}")))
}

/// Renders raw token units with `decimals` fractional digits, e.g. `1500` with 3 decimals is
/// `1.500`.
pub fn format_token_amount(amount: U256, decimals: u8) -> String {
    let dec = decimals as usize;
    let digits = amount.to_string();

    if dec == 0 {
        return digits;
    }

    if digits.len() <= dec {
        format!("0.{digits:0>dec$}")
    } else {
        let (whole, frac) = digits.split_at(digits.len() - dec);
        format!("{whole}.{frac}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use bitcoin::BlockHash;

    use super::*;
    use crate::chain::{
        address::{HydraAddressCodec, Network},
        types::Receipt,
    };

    pub fn pad_topic(account: &ContractId) -> String {
        format!("0x{:0>64}", hex::encode(account))
    }

    pub fn transfer_log(contract: &ContractId, from: &ContractId, to: &ContractId, data: &str) -> Log {
        Log {
            address: hex::encode(contract),
            topics: vec![
                format!("0x{TRANSFER_EVENT_SIGNATURE}"),
                pad_topic(from),
                pad_topic(to),
            ],
            data: data.into(),
        }
    }

    const TOKEN: ContractId = [0xee; 20];
    const A: ContractId = [0xaa; 20];
    const B: ContractId = [0xbb; 20];

    fn codec() -> HydraAddressCodec {
        HydraAddressCodec::new(Network::Mainnet)
    }

    #[test]
    fn decodes_transfer_event() {
        let logs = vec![transfer_log(&TOKEN, &A, &B, "0x64")];

        let transfers = extract_transfers(&logs, &codec()).unwrap();

        assert_eq!(
            transfers,
            vec![TokenTransfer {
                contract: TOKEN,
                from: codec().account_to_address(&A),
                to: codec().account_to_address(&B),
                amount: U256::from(100),
            }]
        );
    }

    #[test]
    fn ignores_other_events() {
        let mut approval = transfer_log(&TOKEN, &A, &B, "0x01");
        approval.topics[0] = format!("0x{}", "8c".repeat(32));

        let mut anonymous = transfer_log(&TOKEN, &A, &B, "0x01");
        anonymous.topics.pop();

        let upper = Log {
            topics: vec![
                TRANSFER_EVENT_SIGNATURE.to_uppercase(),
                pad_topic(&B),
                pad_topic(&A),
            ],
            ..transfer_log(&TOKEN, &A, &B, "ff")
        };

        let transfers = extract_transfers(&[approval, anonymous, upper], &codec()).unwrap();

        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, U256::from(255));
        assert_eq!(transfers[0].from, codec().account_to_address(&B));
    }

    #[test]
    fn non_numeric_amount_fails_whole_receipt() {
        let logs = vec![
            transfer_log(&TOKEN, &A, &B, "0x64"),
            transfer_log(&TOKEN, &B, &A, "0xnotanumber"),
        ];

        assert_eq!(
            extract_transfers(&logs, &codec()),
            Err(ResolutionError::Amount {
                log: 1,
                value: "0xnotanumber".into()
            })
        );

        let empty = vec![transfer_log(&TOKEN, &A, &B, "0x")];
        assert!(extract_transfers(&empty, &codec()).is_err());
    }

    #[test]
    fn oversized_topic_account_is_rejected() {
        let mut log = transfer_log(&TOKEN, &A, &B, "0x1");
        log.topics[2] = format!("0x01{}", "00".repeat(31));

        assert!(matches!(
            extract_transfers(&[log], &codec()),
            Err(ResolutionError::Topic { log: 0, topic: 2, .. })
        ));
    }

    #[test]
    fn zero_topic_resolves_to_zero_account() {
        let log = transfer_log(&TOKEN, &[0; 20], &B, "0x10");

        let transfers = extract_transfers(&[log], &codec()).unwrap();
        assert_eq!(transfers[0].from, codec().account_to_address(&[0; 20]));
    }

    #[test]
    fn abi_property_parsing() {
        let mut string_output = String::new();
        string_output.push_str(&format!("{:0>64}", "20"));
        string_output.push_str(&format!("{:0>64}", "5"));
        string_output.push_str(&format!("{:0<64}", hex::encode("Hydra")));
        assert_eq!(parse_string_property(&string_output).as_deref(), Some("Hydra"));

        let bytes32 = format!("{:0<64}", hex::encode("HYD"));
        assert_eq!(parse_string_property(&bytes32).as_deref(), Some("HYD"));

        assert_eq!(parse_string_property(""), None);

        assert_eq!(
            parse_numeric_property(&format!("{:0>64}", "08")),
            Some(U256::from(8))
        );
        assert_eq!(parse_numeric_property("08"), None);
    }

    #[derive(Default)]
    struct ContractNode {
        outputs: HashMap<String, String>,
        calls: RefCell<usize>,
    }

    impl ChainSource for ContractNode {
        fn best_height(&self) -> Result<u32, Error> {
            unimplemented!()
        }

        fn block_hash(&self, _: u32) -> Result<BlockHash, Error> {
            unimplemented!()
        }

        fn raw_block(&self, _: &BlockHash) -> Result<Vec<u8>, Error> {
            unimplemented!()
        }

        fn transaction_receipt(&self, _: &str) -> Result<Option<Receipt>, Error> {
            unimplemented!()
        }

        fn search_logs(&self, _: u32, _: u32) -> Result<HashMap<String, Receipt>, Error> {
            unimplemented!()
        }

        fn call_contract(&self, _: &str, data: &str) -> Result<String, Error> {
            *self.calls.borrow_mut() += 1;

            self.outputs
                .get(&data[..8])
                .cloned()
                .ok_or_else(|| Error::Custom("call reverted".into()))
        }
    }

    #[test]
    fn contract_info_is_cached_and_defaults_decimals() {
        let mut node = ContractNode::default();
        node.outputs.insert(NAME_SIGNATURE.into(), format!("{:0<64}", hex::encode("Token")));
        node.outputs.insert(SYMBOL_SIGNATURE.into(), format!("{:0<64}", hex::encode("TKN")));
        node.outputs.insert(DECIMALS_SIGNATURE.into(), "".into());
        node.outputs.insert(BALANCE_OF_SIGNATURE.into(), format!("{:0>64}", "2a"));

        let cache = ContractInfoCache::new(10);

        let info = contract_info(&node, &cache, &TOKEN).unwrap().unwrap();
        assert_eq!(info.name, "Token");
        assert_eq!(info.symbol, "TKN");
        assert_eq!(info.decimals, DEFAULT_DECIMALS);
        assert_eq!(*node.calls.borrow(), 3);

        // served from the cache
        assert_eq!(contract_info(&node, &cache, &TOKEN).unwrap(), Some(info));
        assert_eq!(*node.calls.borrow(), 3);

        assert_eq!(contract_balance(&node, &TOKEN, &A).unwrap(), U256::from(42));
    }

    #[test]
    fn failed_calls_are_not_swallowed() {
        let node = ContractNode::default();
        let cache = ContractInfoCache::new(10);

        assert!(contract_info(&node, &cache, &TOKEN).is_err());
        assert_eq!(cache.get(&TOKEN), None);
    }

    #[test]
    fn token_amounts_are_scaled_by_decimals() {
        assert_eq!(format_token_amount(U256::from(1500), 3), "1.500");
        assert_eq!(format_token_amount(U256::from(15), 3), "0.015");
        assert_eq!(format_token_amount(U256::from(150), 3), "0.150");
        assert_eq!(format_token_amount(U256::from(7), 0), "7");
        assert_eq!(format_token_amount(U256::ZERO, 2), "0.00");
        assert_eq!(
            format_token_amount(U256::from(10).pow(U256::from(18)), DEFAULT_DECIMALS),
            "1.000000000000000000"
        );
    }
}
