use bitcoin::{
    Script,
    base58,
    bech32::{self, Fe32, Hrp},
};
use hydra_indexer_macros::{Decode, Encode};
use serde::Deserialize;
use thiserror::Error;

use super::block::{OP_CALL, OP_CREATE};

/// Length of a contract/account descriptor.
pub const ACCOUNT_DESCRIPTOR_LEN: usize = 20;

/// Descriptors longer than this are not indexed.
pub const MAX_ADDR_DESC_LEN: usize = 1024;

const OP_RETURN: u8 = 0x6a;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 address {0}: {1}")]
    Base58(String, String),
    #[error("invalid bech32 address {0}: {1}")]
    Bech32(String, String),
    #[error("address {0} belongs to another network")]
    WrongNetwork(String),
    #[error("unknown address version byte {0}")]
    UnknownVersion(u8),
    #[error("unexpected address payload length {0}")]
    PayloadLength(usize),
    #[error("script {0} has no address representation")]
    UnsupportedScript(String),
    #[error("{0} cannot hold contract tokens, only key hash addresses and accounts can")]
    NotAnAccount(String),
}

/// Canonical bytes identifying a payable entity: either an output script or a 20-byte
/// contract/account id.
#[derive(Encode, Decode, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct AddressDescriptor(pub Vec<u8>);

impl AddressDescriptor {
    pub fn from_account(account: &[u8; ACCOUNT_DESCRIPTOR_LEN]) -> Self {
        Self(account.to_vec())
    }

    /// Descriptor of the address an output pays to, `None` if it has no owner (empty scripts,
    /// data carriers, contract creation and call payloads).
    pub fn from_output_script(script: &[u8]) -> Option<Self> {
        match (script.first(), script.last()) {
            (None, _) | (Some(&OP_RETURN), _) => None,
            (_, Some(&OP_CREATE | &OP_CALL)) => None,
            _ => Some(Self(script.to_vec())),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_account(&self) -> bool {
        self.0.len() == ACCOUNT_DESCRIPTOR_LEN
    }

    /// Non-empty and short enough to be indexed.
    pub fn is_indexable(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= MAX_ADDR_DESC_LEN
    }

    /// The all-zero account, either raw or as the pay-to-pubkey-hash script token events resolve
    /// it to. Tokens are minted from and burned to it.
    pub fn is_zero_account(&self) -> bool {
        self.token_account()
            .is_ok_and(|account| account == [0u8; ACCOUNT_DESCRIPTOR_LEN])
    }

    /// Fixed-width form used in per-transaction contract records. Pay-to-pubkey-hash scripts map
    /// to their key hash, shorter values are left padded with zeros and anything else is all
    /// zeros.
    pub fn to_fixed_account(&self) -> [u8; ACCOUNT_DESCRIPTOR_LEN] {
        let mut out = [0u8; ACCOUNT_DESCRIPTOR_LEN];

        let script = Script::from_bytes(&self.0);

        if script.is_p2pkh() {
            out.copy_from_slice(&self.0[3..23]);
        } else if self.0.len() <= ACCOUNT_DESCRIPTOR_LEN {
            out[ACCOUNT_DESCRIPTOR_LEN - self.0.len()..].copy_from_slice(&self.0);
        }

        out
    }

    /// Account whose token balances a contract tracks: the key hash of a pay-to-pubkey-hash
    /// script or a raw 20-byte account. Other scripts have none.
    pub fn token_account(&self) -> Result<[u8; ACCOUNT_DESCRIPTOR_LEN], AddressError> {
        if self.is_account() || Script::from_bytes(&self.0).is_p2pkh() {
            Ok(self.to_fixed_account())
        } else {
            Err(AddressError::NotAnAccount(hex::encode(&self.0)))
        }
    }
}

/// Converts between textual addresses and descriptors.
pub trait AddressCodec {
    fn address_to_descriptor(&self, address: &str) -> Result<AddressDescriptor, AddressError>;

    fn descriptor_to_address(&self, descriptor: &AddressDescriptor) -> Result<String, AddressError>;

    /// Native address owning a 20-byte account id.
    fn account_to_address(&self, account: &[u8; ACCOUNT_DESCRIPTOR_LEN]) -> String;
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

#[derive(Debug, Clone)]
pub struct ChainParams {
    pub pubkey_hash_addr_id: u8,
    pub script_hash_addr_id: u8,
    pub bech32_hrp: &'static str,
}

impl Network {
    pub fn params(&self) -> ChainParams {
        match self {
            Self::Mainnet => ChainParams {
                pubkey_hash_addr_id: 40,
                script_hash_addr_id: 63,
                bech32_hrp: "hc",
            },
            Self::Testnet => ChainParams {
                pubkey_hash_addr_id: 120,
                script_hash_addr_id: 110,
                bech32_hrp: "th",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HydraAddressCodec {
    params: ChainParams,
}

impl HydraAddressCodec {
    pub fn new(network: Network) -> Self {
        Self {
            params: network.params(),
        }
    }

    fn decode_segwit(&self, address: &str) -> Result<AddressDescriptor, AddressError> {
        let (hrp, version, program) = bech32::segwit::decode(address)
            .map_err(|e| AddressError::Bech32(address.into(), e.to_string()))?;

        if hrp.to_lowercase() != self.params.bech32_hrp {
            return Err(AddressError::WrongNetwork(address.into()));
        }

        let version_op = match version.to_u8() {
            0 => 0x00,
            v => 0x50 + v,
        };

        let mut script = Vec::with_capacity(2 + program.len());
        script.push(version_op);
        script.push(program.len() as u8);
        script.extend(program);

        Ok(AddressDescriptor(script))
    }

    fn decode_base58(&self, address: &str) -> Result<AddressDescriptor, AddressError> {
        let payload = base58::decode_check(address)
            .map_err(|e| AddressError::Base58(address.into(), e.to_string()))?;

        let (version, hash) = match payload.split_first() {
            Some((version, hash)) if hash.len() == ACCOUNT_DESCRIPTOR_LEN => (*version, hash),
            _ => return Err(AddressError::PayloadLength(payload.len())),
        };

        let script = if version == self.params.pubkey_hash_addr_id {
            [&[0x76, 0xa9, 0x14][..], hash, &[0x88, 0xac]].concat()
        } else if version == self.params.script_hash_addr_id {
            [&[0xa9, 0x14][..], hash, &[0x87]].concat()
        } else {
            return Err(AddressError::UnknownVersion(version));
        };

        Ok(AddressDescriptor(script))
    }

    fn encode_base58(&self, version: u8, hash: &[u8]) -> String {
        let mut payload = Vec::with_capacity(1 + hash.len());
        payload.push(version);
        payload.extend_from_slice(hash);

        base58::encode_check(&payload)
    }
}

impl AddressCodec for HydraAddressCodec {
    fn address_to_descriptor(&self, address: &str) -> Result<AddressDescriptor, AddressError> {
        let stripped = address.strip_prefix("0x").unwrap_or(address);

        // contract/account ids are written as 40 hex characters
        if stripped.len() == 2 * ACCOUNT_DESCRIPTOR_LEN {
            if let Ok(account) = hex::decode(stripped) {
                return Ok(AddressDescriptor(account));
            }
        }

        let segwit_prefix = format!("{}1", self.params.bech32_hrp);
        if address.to_lowercase().starts_with(&segwit_prefix) {
            return self.decode_segwit(address);
        }

        self.decode_base58(address)
    }

    fn descriptor_to_address(&self, descriptor: &AddressDescriptor) -> Result<String, AddressError> {
        let bytes = descriptor.as_bytes();

        if descriptor.is_account() {
            return Ok(hex::encode(bytes));
        }

        let script = Script::from_bytes(bytes);

        if script.is_p2pkh() {
            Ok(self.encode_base58(self.params.pubkey_hash_addr_id, &bytes[3..23]))
        } else if script.is_p2sh() {
            Ok(self.encode_base58(self.params.script_hash_addr_id, &bytes[2..22]))
        } else if script.is_witness_program() {
            let version = match bytes[0] {
                0x00 => 0,
                op => op - 0x50,
            };

            let unsupported = || AddressError::UnsupportedScript(hex::encode(bytes));

            let hrp = Hrp::parse(self.params.bech32_hrp).map_err(|_| unsupported())?;
            let version = Fe32::try_from(version).map_err(|_| unsupported())?;

            bech32::segwit::encode(hrp, version, &bytes[2..]).map_err(|_| unsupported())
        } else {
            Err(AddressError::UnsupportedScript(hex::encode(bytes)))
        }
    }

    fn account_to_address(&self, account: &[u8; ACCOUNT_DESCRIPTOR_LEN]) -> String {
        self.encode_base58(self.params.pubkey_hash_addr_id, account)
    }
}
