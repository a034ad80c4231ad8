use bitcoin::{
    Transaction,
    block::Header,
    consensus::{Decodable, encode::VarInt},
    script::{Instruction, Script},
};

use crate::error::Error;

use super::types::{Tx, Vin, Vout};

/// State root, UTXO root and the staked prevout which follow the classic 80-byte header.
const POS_HEADER_EXTENSION_LEN: usize = 32 + 32 + 36;

pub const OP_CREATE: u8 = 0xc1;
pub const OP_CALL: u8 = 0xc2;
const OP_SENDER: u8 = 0xc4;

#[derive(Debug)]
pub struct ParsedBlock {
    pub header: Header,
    pub txs: Vec<Transaction>,
}

/// Parses a serialized block: header, proof-of-stake extension, block signature and the
/// transactions.
pub fn parse_block(raw: &[u8]) -> Result<ParsedBlock, Error> {
    let mut reader = raw;

    let header = Header::consensus_decode(&mut reader)?;

    let mut reader = reader
        .get(POS_HEADER_EXTENSION_LEN..)
        .ok_or_else(|| Error::Custom("block truncated in header extension".into()))?;

    let signature_len = VarInt::consensus_decode(&mut reader)?.0;

    let mut reader = usize::try_from(signature_len)
        .ok()
        .and_then(|len| reader.get(len..))
        .ok_or_else(|| Error::Custom("block truncated in block signature".into()))?;

    let txs = Vec::<Transaction>::consensus_decode_from_finite_reader(&mut reader)?;

    if !reader.is_empty() {
        return Err(Error::Custom(format!(
            "{} trailing bytes after block transactions",
            reader.len()
        )));
    }

    Ok(ParsedBlock { header, txs })
}

pub fn tx_from_bitcoin(tx: &Transaction, block_time: u64) -> Tx {
    let coinbase = tx.is_coinbase();

    Tx {
        txid: tx.compute_txid().to_string(),
        hex: bitcoin::consensus::encode::serialize_hex(tx),
        version: tx.version.0,
        lock_time: tx.lock_time.to_consensus_u32(),
        block_time,
        vin: tx
            .input
            .iter()
            .map(|input| Vin {
                txid: (!coinbase).then(|| input.previous_output.txid.to_string()),
                vout: input.previous_output.vout,
                sequence: input.sequence.0,
                script_sig: hex::encode(input.script_sig.as_bytes()),
            })
            .collect(),
        vout: tx
            .output
            .iter()
            .enumerate()
            .map(|(n, output)| Vout {
                value: output.value.to_sat(),
                n: n as u32,
                script_pubkey: hex::encode(output.script_pubkey.as_bytes()),
            })
            .collect(),
        receipt: None,
    }
}

/// Gas limit and gas price of the first contract call or creation in the transaction.
pub fn contract_gas_params(tx: &Transaction) -> Option<(u64, u64)> {
    tx.output.iter().find_map(|output| {
        let script = output.script_pubkey.as_bytes();

        match script.last() {
            Some(&OP_CALL | &OP_CREATE) => script_gas_params(Script::from_bytes(script)),
            _ => None,
        }
    })
}

fn script_gas_params(script: &Script) -> Option<(u64, u64)> {
    let instructions = script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    // sender-signed calls carry the sender proof ahead of the call itself
    let start = instructions
        .iter()
        .position(|ins| matches!(ins, Instruction::Op(op) if op.to_u8() == OP_SENDER))
        .map_or(0, |pos| pos + 1);

    // <version> <gas limit> <gas price> ...
    let gas_limit = script_number(instructions.get(start + 1)?)?;
    let gas_price = script_number(instructions.get(start + 2)?)?;

    Some((gas_limit, gas_price))
}

fn script_number(instruction: &Instruction) -> Option<u64> {
    match instruction {
        Instruction::PushBytes(bytes) => {
            let bytes = bytes.as_bytes();

            if bytes.len() > 8 {
                return None;
            }

            Some(
                bytes
                    .iter()
                    .rev()
                    .fold(0u64, |acc, byte| (acc << 8) | *byte as u64),
            )
        }
        Instruction::Op(op) => match op.to_u8() {
            v @ 0x51..=0x60 => Some((v - 0x50) as u64),
            _ => None,
        },
    }
}
