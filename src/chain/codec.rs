//! Binary record of a transaction and its receipt, as stored in the transactions table.
//!
//! Layout: a 4-byte big-endian block height followed by the encoded [`TxRecord`].

use hydra_indexer_macros::{Decode, Encode};

use crate::storage::encdec::{
    Decode, DecodingError, DecodingResult, Encode, decode_hex, decode_hex_fixed,
};

use super::types::{Log, Receipt, ReceiptStatus, Tx, TxHash, Vin, Vout};

const STATUS_FAILURE: u8 = 0;
const STATUS_OK: u8 = 1;
const STATUS_PENDING: u8 = 2;
/// Reserved for a receipt whose outcome was never reported.
const STATUS_UNKNOWN: u8 = 0xFF;

/// Transaction hash followed by the big-endian height of its block.
#[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PackedTxId(pub [u8; 36]);

impl PackedTxId {
    pub fn new(tx_hash: &TxHash, height: u32) -> Self {
        let mut raw = [0u8; 36];
        raw[..32].copy_from_slice(tx_hash);
        raw[32..].copy_from_slice(&height.to_be_bytes());
        Self(raw)
    }

    pub fn tx_hash(&self) -> TxHash {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&self.0[..32]);
        hash
    }

    pub fn height(&self) -> u32 {
        let mut height = [0u8; 4];
        height.copy_from_slice(&self.0[32..]);
        u32::from_be_bytes(height)
    }
}

/// Packed transaction bytes, stored verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedTx(pub Vec<u8>);

impl Encode for PackedTx {
    fn encode(&self) -> Vec<u8> {
        self.0.clone()
    }
}

impl Decode for PackedTx {
    fn decode(bytes: &[u8]) -> DecodingResult<Self> {
        Ok((PackedTx(bytes.to_vec()), &[]))
    }
}

#[derive(Encode, Decode, Debug)]
enum PrevTx {
    Coinbase,
    Known([u8; 32]),
}

#[derive(Encode, Decode, Debug)]
struct PackedVin {
    prev_tx: PrevTx,
    vout: u32,
    sequence: u32,
    script_sig: Vec<u8>,
}

#[derive(Encode, Decode, Debug)]
struct PackedVout {
    value: u64,
    n: u32,
    script_pubkey: Vec<u8>,
}

#[derive(Encode, Decode, Debug)]
struct PackedLog {
    address: [u8; 20],
    topics: Vec<[u8; 32]>,
    data: Vec<u8>,
}

#[derive(Encode, Decode, Debug)]
struct PackedReceipt {
    // fixed width so packed receipts compare like their numeric values
    gas_used: [u8; 8],
    gas_limit: [u8; 8],
    gas_price: [u8; 8],
    status: u8,
    logs: Vec<PackedLog>,
}

#[derive(Encode, Decode, Debug)]
struct TxRecord {
    block_time: u64,
    txid: [u8; 32],
    raw: Vec<u8>,
    version: u32,
    lock_time: u32,
    vin: Vec<PackedVin>,
    vout: Vec<PackedVout>,
    receipt: Option<PackedReceipt>,
}

pub fn pack_tx(tx: &Tx, height: u32, block_time: u64) -> Result<Vec<u8>, DecodingError> {
    let vin = tx
        .vin
        .iter()
        .enumerate()
        .map(|(i, input)| -> Result<PackedVin, DecodingError> {
            let prev_tx = match &input.txid {
                Some(txid) => PrevTx::Known(decode_hex_fixed(|| format!("vin[{i}].txid"), txid)?),
                None => PrevTx::Coinbase,
            };

            Ok(PackedVin {
                prev_tx,
                vout: input.vout,
                sequence: input.sequence,
                script_sig: decode_hex(|| format!("vin[{i}].script_sig"), &input.script_sig)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let vout = tx
        .vout
        .iter()
        .enumerate()
        .map(|(i, output)| -> Result<PackedVout, DecodingError> {
            Ok(PackedVout {
                value: output.value,
                n: output.n,
                script_pubkey: decode_hex(
                    || format!("vout[{i}].script_pubkey"),
                    &output.script_pubkey,
                )?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let record = TxRecord {
        block_time,
        txid: decode_hex_fixed(|| "txid".into(), &tx.txid)?,
        raw: decode_hex(|| "hex".into(), &tx.hex)?,
        // two's complement, restored on unpack
        version: tx.version as u32,
        lock_time: tx.lock_time,
        vin,
        vout,
        receipt: tx.receipt.as_ref().map(pack_receipt).transpose()?,
    };

    let mut out = height.to_be_bytes().to_vec();
    out.extend(record.encode());

    Ok(out)
}

fn pack_receipt(receipt: &Receipt) -> Result<PackedReceipt, DecodingError> {
    let logs = receipt
        .logs
        .iter()
        .enumerate()
        .map(|(i, log)| -> Result<PackedLog, DecodingError> {
            let topics = log
                .topics
                .iter()
                .enumerate()
                .map(|(j, topic)| decode_hex_fixed(|| format!("receipt.logs[{i}].topics[{j}]"), topic))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(PackedLog {
                address: decode_hex_fixed(|| format!("receipt.logs[{i}].address"), &log.address)?,
                topics,
                data: decode_hex(|| format!("receipt.logs[{i}].data"), &log.data)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let status = match receipt.status {
        ReceiptStatus::Failure => STATUS_FAILURE,
        ReceiptStatus::Ok => STATUS_OK,
        ReceiptStatus::Pending => STATUS_PENDING,
        ReceiptStatus::Unknown => STATUS_UNKNOWN,
    };

    Ok(PackedReceipt {
        gas_used: receipt.gas_used.to_be_bytes(),
        gas_limit: receipt.gas_limit.to_be_bytes(),
        gas_price: receipt.gas_price.to_be_bytes(),
        status,
        logs,
    })
}

pub fn unpack_tx(bytes: &[u8]) -> Result<(Tx, u32), DecodingError> {
    let (height, rest) = <[u8; 4]>::decode(bytes)?;
    let record = TxRecord::decode_exact(rest)?;

    let vin = record
        .vin
        .into_iter()
        .map(|input| Vin {
            txid: match input.prev_tx {
                PrevTx::Known(txid) => Some(hex::encode(txid)),
                PrevTx::Coinbase => None,
            },
            vout: input.vout,
            sequence: input.sequence,
            script_sig: hex::encode(input.script_sig),
        })
        .collect();

    let vout = record
        .vout
        .into_iter()
        .map(|output| Vout {
            value: output.value,
            n: output.n,
            script_pubkey: hex::encode(output.script_pubkey),
        })
        .collect();

    let tx = Tx {
        txid: hex::encode(record.txid),
        hex: hex::encode(record.raw),
        version: record.version as i32,
        lock_time: record.lock_time,
        block_time: record.block_time,
        vin,
        vout,
        receipt: record.receipt.map(unpack_receipt).transpose()?,
    };

    Ok((tx, u32::from_be_bytes(height)))
}

fn unpack_receipt(receipt: PackedReceipt) -> Result<Receipt, DecodingError> {
    let status = match receipt.status {
        STATUS_FAILURE => ReceiptStatus::Failure,
        STATUS_OK => ReceiptStatus::Ok,
        STATUS_PENDING => ReceiptStatus::Pending,
        STATUS_UNKNOWN => ReceiptStatus::Unknown,
        other => return Err(DecodingError::InvalidEnumKind(vec![other])),
    };

    let logs = receipt
        .logs
        .into_iter()
        .map(|log| Log {
            address: format!("0x{}", hex::encode(log.address)),
            topics: log
                .topics
                .iter()
                .map(|topic| format!("0x{}", hex::encode(topic)))
                .collect(),
            data: format!("0x{}", hex::encode(log.data)),
        })
        .collect();

    Ok(Receipt {
        gas_used: u64::from_be_bytes(receipt.gas_used),
        gas_limit: u64::from_be_bytes(receipt.gas_limit),
        gas_price: u64::from_be_bytes(receipt.gas_price),
        status,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx(receipt: Option<Receipt>) -> Tx {
        Tx {
            txid: "11".repeat(32),
            hex: "0200000001deadbeef".into(),
            version: -2,
            lock_time: 500,
            block_time: 1_650_000_000,
            vin: vec![
                Vin {
                    txid: Some("ab".repeat(32)),
                    vout: 3,
                    sequence: 0xffff_fffe,
                    script_sig: "4730440220".into(),
                },
                Vin {
                    txid: Some("cd".repeat(32)),
                    vout: 0,
                    sequence: 0,
                    script_sig: "".into(),
                },
            ],
            vout: vec![Vout {
                value: 123_456_789,
                n: 0,
                script_pubkey: "76a914".to_string() + &"22".repeat(20) + "88ac",
            }],
            receipt,
        }
    }

    fn sample_receipt(status: ReceiptStatus) -> Receipt {
        Receipt {
            gas_used: 51_234,
            gas_limit: 250_000,
            gas_price: 40,
            status,
            logs: vec![
                Log {
                    address: format!("0x{}", "ee".repeat(20)),
                    topics: vec![
                        format!("0x{}", "ab".repeat(32)),
                        format!("0x{}", "00".repeat(32)),
                    ],
                    data: "0x64".into(),
                },
                Log {
                    address: format!("0x{}", "ef".repeat(20)),
                    topics: vec![],
                    data: "0x".into(),
                },
            ],
        }
    }

    #[test]
    fn roundtrip_with_receipt() {
        let tx = sample_tx(Some(sample_receipt(ReceiptStatus::Ok)));

        let packed = pack_tx(&tx, 654_321, tx.block_time).unwrap();
        assert_eq!(&packed[..4], &654_321u32.to_be_bytes());

        assert_eq!(unpack_tx(&packed).unwrap(), (tx, 654_321));
    }

    #[test]
    fn coinbase_input_uses_sentinel() {
        let mut tx = sample_tx(None);
        tx.vin = vec![Vin {
            txid: None,
            vout: u32::MAX,
            sequence: u32::MAX,
            script_sig: "03a08601".into(),
        }];

        let (unpacked, height) = unpack_tx(&pack_tx(&tx, 1, tx.block_time).unwrap()).unwrap();

        assert_eq!(height, 1);
        assert!(unpacked.is_coinbase());
        assert_eq!(unpacked, tx);
    }

    #[test]
    fn unknown_status_is_not_failure() {
        let unknown = sample_tx(Some(sample_receipt(ReceiptStatus::Unknown)));
        let failed = sample_tx(Some(sample_receipt(ReceiptStatus::Failure)));

        let packed_unknown = pack_tx(&unknown, 7, 0).unwrap();
        let packed_failed = pack_tx(&failed, 7, 0).unwrap();
        assert_ne!(packed_unknown, packed_failed);

        let status = |bytes: &[u8]| unpack_tx(bytes).unwrap().0.receipt.unwrap().status;
        assert_eq!(status(&packed_unknown), ReceiptStatus::Unknown);
        assert_eq!(status(&packed_failed), ReceiptStatus::Failure);
    }

    #[test]
    fn malformed_hex_names_field_and_index() {
        let field_of = |tx: &Tx| match pack_tx(tx, 0, 0) {
            Err(DecodingError::InvalidHex { field, .. }) => field,
            Err(DecodingError::InvalidWidth { field, .. }) => field,
            other => panic!("unexpected {other:?}"),
        };

        let mut tx = sample_tx(None);
        tx.vin[1].script_sig = "0g".into();
        assert_eq!(field_of(&tx), "vin[1].script_sig");

        let mut tx = sample_tx(None);
        tx.vout[0].script_pubkey = "abc".into();
        assert_eq!(field_of(&tx), "vout[0].script_pubkey");

        let mut tx = sample_tx(None);
        tx.hex = "xyz".into();
        assert_eq!(field_of(&tx), "hex");

        let mut tx = sample_tx(Some(sample_receipt(ReceiptStatus::Ok)));
        tx.receipt.as_mut().unwrap().logs[0].topics[1] = format!("0x{}", "00".repeat(31));
        assert_eq!(field_of(&tx), "receipt.logs[0].topics[1]");
    }

    #[test]
    fn truncated_input_is_an_error() {
        let tx = sample_tx(Some(sample_receipt(ReceiptStatus::Pending)));
        let packed = pack_tx(&tx, 99, 5).unwrap();

        for len in 0..packed.len() {
            assert!(unpack_tx(&packed[..len]).is_err(), "prefix of {len} bytes decoded");
        }
    }

    #[test]
    fn trailing_bytes_are_corruption() {
        let mut packed = pack_tx(&sample_tx(None), 3, 0).unwrap();
        packed.push(0);

        assert_eq!(unpack_tx(&packed), Err(DecodingError::TrailingBytes(1)));
    }

    #[test]
    fn invalid_status_byte_is_rejected() {
        let tx = sample_tx(Some(Receipt {
            logs: vec![],
            ..sample_receipt(ReceiptStatus::Ok)
        }));
        let mut packed = pack_tx(&tx, 3, 0).unwrap();

        // status byte sits just before the empty log vector at the end
        let status_pos = packed.len() - 2;
        assert_eq!(packed[status_pos], STATUS_OK);
        packed[status_pos] = 7;

        assert!(matches!(
            unpack_tx(&packed),
            Err(DecodingError::InvalidEnumKind(_))
        ));
    }

    #[test]
    fn packed_txid_is_invertible() {
        let hash = [9u8; 32];
        let id = PackedTxId::new(&hash, 1_234_567);

        assert_eq!(id.tx_hash(), hash);
        assert_eq!(id.height(), 1_234_567);
        assert_eq!(id.encode().len(), 36);
    }
}
