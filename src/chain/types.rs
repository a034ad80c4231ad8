use serde::Serialize;
use utoipa::ToSchema;

/// Transaction hash in display byte order, as used in index keys.
pub type TxHash = [u8; 32];

/// A transaction together with the optional result of its contract execution.
///
/// Hex strings are lowercase. Receipt hex values carry a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Tx {
    pub txid: String,
    pub hex: String,
    pub version: i32,
    pub lock_time: u32,
    pub block_time: u64,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    pub receipt: Option<Receipt>,
}

impl Tx {
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].txid.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Vin {
    /// Previous transaction id, `None` for coinbase inputs
    pub txid: Option<String>,
    pub vout: u32,
    pub sequence: u32,
    pub script_sig: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Vout {
    pub value: u64,
    pub n: u32,
    pub script_pubkey: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Ok,
    Failure,
    /// The node did not report an outcome
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Receipt {
    pub gas_used: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub status: ReceiptStatus,
    pub logs: Vec<Log>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Log {
    /// Emitting contract
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// A block ready for indexing: parsed transactions with receipts attached.
#[derive(Debug, Clone)]
pub struct Block {
    pub height: u32,
    pub hash: bitcoin::BlockHash,
    pub prev_hash: bitcoin::BlockHash,
    pub time: u32,
    pub txs: Vec<Tx>,
}

/// Lowercase, `0x`-prefixed form of a hex value.
pub fn canonical_hex(value: &str) -> String {
    let stripped = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    format!("0x{}", stripped.to_ascii_lowercase())
}
