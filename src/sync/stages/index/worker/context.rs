use std::collections::{HashMap, HashSet, hash_map::Entry};

use itertools::Itertools;
use tracing::{trace, warn};

use crate::{
    chain::{
        address::{AddressCodec, AddressDescriptor},
        codec::{PackedTx, PackedTxId, pack_tx},
        hrc20::{ContractId, ResolutionError, extract_transfers},
        types::{Block, Receipt, Tx, TxHash},
    },
    error::Error,
    storage::{
        encdec::{decode_hex, decode_hex_fixed},
        kv_store::IndexingTask,
    },
    sync::stages::index::indexers::{
        core::{
            addr_balance::{AddrBalance, AddrBalanceKV},
            addr_contracts::{AddrContracts, AddrContractsKV},
            addr_txs::{AddrTxIndex, AddrTxKey, AddrTxsKV},
            transactions::TransactionsKV,
            tx_addresses::{TouchedContract, TxAddresses, TxAddressesKV, TxInput, TxOutput},
            utxos_by_address::{UtxoEntry, UtxosByAddressKV, UtxosByAddressKey},
        },
        types::TxoRef,
    },
};

/// Indexes every transaction of `block` into `task`: outputs first, then inputs, then token
/// transfers. Nothing is committed, the caller applies the finalized task.
pub fn index_block<C: AddressCodec>(
    task: &mut IndexingTask,
    block: &Block,
    codec: &C,
) -> Result<BlockStats, Error> {
    let mut ctx = IndexingContext::new(codec, block.height);

    let stats = ctx.process_block(task, block)?;

    ctx.flush(task)?;

    Ok(stats)
}

/// Block-scoped state of the indexer. Records are read through to storage on first use and
/// written back once the whole block is processed.
struct IndexingContext<'a, C> {
    codec: &'a C,
    height: u32,
    balances: HashMap<AddressDescriptor, AddrBalance>,
    contracts: HashMap<AddressDescriptor, AddrContracts>,
    tx_addresses: HashMap<TxHash, TxAddresses>,
    addr_txs: HashMap<AddrTxKey, Vec<AddrTxIndex>>,
    // first touch of an address within a transaction
    balance_touches: HashSet<(TxHash, AddressDescriptor)>,
    contract_addr_touches: HashSet<(TxHash, AddressDescriptor)>,
    contract_touches: HashSet<(TxHash, AddressDescriptor, ContractId)>,
    // spent transactions known to be absent from storage
    missing_txs: HashSet<TxHash>,
    resolver: ResolverStats,
}

impl<'a, C: AddressCodec> IndexingContext<'a, C> {
    fn new(codec: &'a C, height: u32) -> Self {
        Self {
            codec,
            height,
            balances: HashMap::new(),
            contracts: HashMap::new(),
            tx_addresses: HashMap::new(),
            addr_txs: HashMap::new(),
            balance_touches: HashSet::new(),
            contract_addr_touches: HashSet::new(),
            contract_touches: HashSet::new(),
            missing_txs: HashSet::new(),
            resolver: ResolverStats::default(),
        }
    }

    fn process_block(
        &mut self,
        task: &mut IndexingTask,
        block: &Block,
    ) -> Result<BlockStats, Error> {
        let hashes = block
            .txs
            .iter()
            .map(|tx| decode_hex_fixed(|| "txid".into(), &tx.txid))
            .collect::<Result<Vec<TxHash>, _>>()?;

        self.prefetch_spent_txs(task, block, &hashes)?;

        let mut stats = BlockStats {
            txs: block.txs.len(),
            ..Default::default()
        };

        let mut packed = Vec::with_capacity(block.txs.len());

        for (tx, tx_hash) in block.txs.iter().zip(&hashes) {
            packed.push(self.index_outputs(task, tx, *tx_hash, block.time.into(), &mut stats)?);
        }

        for (tx, tx_hash) in block.txs.iter().zip(&hashes) {
            self.index_inputs(task, tx, *tx_hash, &mut stats)?;
        }

        for ((tx, tx_hash), packed) in block.txs.iter().zip(&hashes).zip(packed) {
            let Some(receipt) = &tx.receipt else {
                continue;
            };

            if !packed {
                stats.skipped_txs += 1;
                continue;
            }

            match self.index_transfers(task, tx, *tx_hash, receipt)? {
                Some(count) => stats.transfers += count,
                None => stats.skipped_txs += 1,
            }
        }

        stats.resolver = self.resolver.clone();

        Ok(stats)
    }

    /// Writes every record touched by the block into the task.
    fn flush(self, task: &mut IndexingTask) -> Result<(), Error> {
        for (address, balance) in self.balances {
            task.set::<AddrBalanceKV>(address, balance)?;
        }

        for (address, contracts) in self.contracts {
            task.set::<AddrContractsKV>(address, contracts)?;
        }

        for (tx_hash, record) in self.tx_addresses {
            task.set::<TxAddressesKV>(tx_hash, record)?;
        }

        for (key, indexes) in self.addr_txs {
            task.set::<AddrTxsKV>(key, indexes)?;
        }

        Ok(())
    }

    /// Loads the address records of transactions spent by the block in one batch.
    fn prefetch_spent_txs(
        &mut self,
        task: &IndexingTask,
        block: &Block,
        hashes: &[TxHash],
    ) -> Result<(), Error> {
        let in_block = hashes.iter().collect::<HashSet<_>>();

        let spent = block
            .txs
            .iter()
            .flat_map(|tx| &tx.vin)
            .filter_map(|vin| vin.txid.as_deref())
            .filter_map(|txid| decode_hex_fixed::<32>(String::new, txid).ok())
            .filter(|hash| !in_block.contains(hash))
            .unique()
            .collect::<Vec<_>>();

        for (tx_hash, record) in task.multi_get::<TxAddressesKV>(spent)? {
            self.resolver.misses += 1;

            match record {
                Some(record) => {
                    self.tx_addresses.insert(tx_hash, record);
                }
                None => {
                    self.missing_txs.insert(tx_hash);
                }
            }
        }

        Ok(())
    }

    /// Credits outputs and stores the packed transaction. Returns whether packing succeeded.
    fn index_outputs(
        &mut self,
        task: &mut IndexingTask,
        tx: &Tx,
        tx_hash: TxHash,
        block_time: u64,
        stats: &mut BlockStats,
    ) -> Result<bool, Error> {
        let height = self.height;

        let packed = match pack_tx(tx, height, block_time) {
            Ok(bytes) => {
                task.set::<TransactionsKV>(PackedTxId::new(&tx_hash, height), PackedTx(bytes))?;
                true
            }
            Err(e) => {
                warn!(height, txid = %tx.txid, "unable to pack transaction: {e}");
                false
            }
        };

        let mut outputs = Vec::with_capacity(tx.vout.len());

        for (i, vout) in tx.vout.iter().enumerate() {
            let address = match decode_hex(|| format!("vout[{i}].script_pubkey"), &vout.script_pubkey) {
                Ok(script) => AddressDescriptor::from_output_script(&script),
                Err(e) => {
                    warn!(height, txid = %tx.txid, vout = i, "skipping output: {e}");
                    None
                }
            };

            let address = match address {
                Some(address) if address.is_indexable() => address,
                Some(address) => {
                    warn!(
                        height,
                        txid = %tx.txid,
                        vout = i,
                        len = address.len(),
                        "skipping oversized address descriptor"
                    );
                    AddressDescriptor::default()
                }
                None => {
                    trace!(height, txid = %tx.txid, vout = i, "output has no address");
                    AddressDescriptor::default()
                }
            };

            if !address.is_empty() {
                let txo_ref = TxoRef {
                    tx_hash,
                    vout: i as u32,
                };

                self.balance_mut(task, &address, &tx_hash)?.credit(vout.value);

                task.set::<UtxosByAddressKV>(
                    UtxosByAddressKey {
                        address: address.clone(),
                        txo_ref,
                    },
                    UtxoEntry {
                        height,
                        value: vout.value,
                    },
                )?;

                self.add_addr_tx(&address, tx_hash, AddrTxIndex::Output(i as u32));

                stats.outputs += 1;
            }

            outputs.push(TxOutput {
                address,
                value: vout.value,
                spent: false,
            });
        }

        self.tx_addresses.insert(
            tx_hash,
            TxAddresses {
                height,
                inputs: vec![],
                outputs,
                contracts: vec![],
            },
        );

        Ok(packed)
    }

    /// Marks spent outputs and debits their owners.
    fn index_inputs(
        &mut self,
        task: &mut IndexingTask,
        tx: &Tx,
        tx_hash: TxHash,
        stats: &mut BlockStats,
    ) -> Result<(), Error> {
        let height = self.height;

        let mut inputs = Vec::with_capacity(tx.vin.len());

        for (i, vin) in tx.vin.iter().enumerate() {
            let Some(prev_txid) = &vin.txid else {
                inputs.push(TxInput::default());
                continue;
            };

            let prev_hash = match decode_hex_fixed(|| format!("vin[{i}].txid"), prev_txid) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(height, txid = %tx.txid, input = i, "skipping input: {e}");
                    inputs.push(TxInput::default());
                    continue;
                }
            };

            let Some(prev) = self.tx_addresses_mut(task, &prev_hash)? else {
                warn!(
                    height,
                    txid = %tx.txid,
                    input = i,
                    prev_txid,
                    "input spends unknown transaction, skipping"
                );
                inputs.push(TxInput::default());
                continue;
            };

            let outputs = prev.outputs.len();

            let Some(output) = prev.outputs.get_mut(vin.vout as usize) else {
                warn!(
                    height,
                    txid = %tx.txid,
                    input = i,
                    prev_txid,
                    vout = vin.vout,
                    outputs,
                    "input spends output out of bounds, skipping"
                );
                inputs.push(TxInput::default());
                continue;
            };

            let already_spent = output.spent;
            output.spent = true;

            let address = output.address.clone();
            let value = output.value;

            inputs.push(TxInput {
                address: address.clone(),
                value,
            });

            if already_spent {
                warn!(
                    height,
                    txid = %tx.txid,
                    input = i,
                    prev_txid,
                    vout = vin.vout,
                    "double spend of output, balance not debited again"
                );
                continue;
            }

            if address.is_empty() {
                continue;
            }

            task.delete::<UtxosByAddressKV>(UtxosByAddressKey {
                address: address.clone(),
                txo_ref: TxoRef {
                    tx_hash: prev_hash,
                    vout: vin.vout,
                },
            })?;

            if !self.balance_mut(task, &address, &tx_hash)?.debit(value) {
                warn!(
                    height,
                    txid = %tx.txid,
                    input = i,
                    value,
                    "balance underflow, clamped to zero"
                );
            }

            self.add_addr_tx(&address, tx_hash, AddrTxIndex::Input(i as u32));

            stats.inputs += 1;
        }

        if let Some(record) = self.tx_addresses.get_mut(&tx_hash) {
            record.inputs = inputs;
        }

        Ok(())
    }

    /// Folds the transaction's token transfers into the contract records. Returns `None` if the
    /// receipt could not be resolved, in which case nothing is recorded for it.
    fn index_transfers(
        &mut self,
        task: &mut IndexingTask,
        tx: &Tx,
        tx_hash: TxHash,
        receipt: &Receipt,
    ) -> Result<Option<usize>, Error> {
        let codec = self.codec;

        let resolved = extract_transfers(&receipt.logs, codec).and_then(|transfers| {
            transfers
                .into_iter()
                .map(|t| -> Result<_, ResolutionError> {
                    Ok((
                        t.contract,
                        codec.address_to_descriptor(&t.from)?,
                        codec.address_to_descriptor(&t.to)?,
                    ))
                })
                .collect::<Result<Vec<_>, _>>()
        });

        let transfers = match resolved {
            Ok(transfers) => transfers,
            Err(e) => {
                warn!(
                    height = self.height,
                    txid = %tx.txid,
                    "skipping token transfers: {e}"
                );
                return Ok(None);
            }
        };

        let mut touched = vec![];

        for (contract, from, to) in &transfers {
            let self_transfer = from == to;

            if let Some(n) = self.touch_contract(task, to, contract, &tx_hash, true)? {
                self.add_addr_tx(to, tx_hash, AddrTxIndex::TokenReceived(n));
            }

            if let Some(n) = self.touch_contract(task, from, contract, &tx_hash, !self_transfer)? {
                self.add_addr_tx(from, tx_hash, AddrTxIndex::TokenSent(n));
            }

            touched.push(TouchedContract {
                address: from.to_fixed_account(),
                contract: *contract,
            });

            if !self_transfer {
                touched.push(TouchedContract {
                    address: to.to_fixed_account(),
                    contract: *contract,
                });
            }
        }

        if let Some(record) = self.tx_addresses.get_mut(&tx_hash) {
            record.contracts = touched;
        }

        Ok(Some(transfers.len()))
    }

    /// Records that `address` interacted with `contract`, returning the 1-based position of the
    /// contract in the address's list. The zero account is never recorded.
    fn touch_contract(
        &mut self,
        task: &IndexingTask,
        address: &AddressDescriptor,
        contract: &ContractId,
        tx_hash: &TxHash,
        count_tx: bool,
    ) -> Result<Option<u32>, Error> {
        if address.is_zero_account() {
            return Ok(None);
        }

        let first_address_touch = count_tx
            && self
                .contract_addr_touches
                .insert((*tx_hash, address.clone()));

        let first_contract_touch = count_tx
            && self
                .contract_touches
                .insert((*tx_hash, address.clone(), *contract));

        let record = match self.contracts.entry(address.clone()) {
            Entry::Occupied(entry) => {
                self.resolver.hits += 1;
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.resolver.misses += 1;
                entry.insert(task.get::<AddrContractsKV>(address)?.unwrap_or_default())
            }
        };

        if first_address_touch {
            record.total_tx_count += 1;
        }

        let position = record.position_or_insert(contract);

        if first_contract_touch {
            record.contracts[position].tx_count += 1;
        }

        Ok(Some(position as u32 + 1))
    }

    fn balance_mut(
        &mut self,
        task: &IndexingTask,
        address: &AddressDescriptor,
        tx_hash: &TxHash,
    ) -> Result<&mut AddrBalance, Error> {
        let first_touch = self.balance_touches.insert((*tx_hash, address.clone()));

        let balance = match self.balances.entry(address.clone()) {
            Entry::Occupied(entry) => {
                self.resolver.hits += 1;
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.resolver.misses += 1;
                entry.insert(task.get::<AddrBalanceKV>(address)?.unwrap_or_default())
            }
        };

        if first_touch {
            balance.tx_count += 1;
        }

        Ok(balance)
    }

    fn tx_addresses_mut(
        &mut self,
        task: &IndexingTask,
        tx_hash: &TxHash,
    ) -> Result<Option<&mut TxAddresses>, Error> {
        if self.tx_addresses.contains_key(tx_hash) {
            self.resolver.hits += 1;
        } else if self.missing_txs.contains(tx_hash) {
            self.resolver.hits += 1;
            return Ok(None);
        } else {
            self.resolver.misses += 1;

            match task.get::<TxAddressesKV>(tx_hash)? {
                Some(record) => {
                    self.tx_addresses.insert(*tx_hash, record);
                }
                None => {
                    self.missing_txs.insert(*tx_hash);
                    return Ok(None);
                }
            }
        }

        Ok(self.tx_addresses.get_mut(tx_hash))
    }

    fn add_addr_tx(&mut self, address: &AddressDescriptor, tx_hash: TxHash, index: AddrTxIndex) {
        let indexes = self
            .addr_txs
            .entry(AddrTxKey {
                address: address.clone(),
                height: self.height,
                tx_hash,
            })
            .or_default();

        if !indexes.contains(&index) {
            indexes.push(index);
        }
    }
}

/// Lookups served from block state versus storage.
#[derive(Debug, Default, Clone)]
pub struct ResolverStats {
    pub hits: usize,
    pub misses: usize,
}

impl ResolverStats {
    pub fn log(&self) -> String {
        format!("hits={} misses={}", self.hits, self.misses)
    }
}

#[derive(Debug, Default, Clone)]
pub struct BlockStats {
    pub txs: usize,
    pub outputs: usize,
    pub inputs: usize,
    pub transfers: usize,
    /// Transactions whose token transfers could not be indexed
    pub skipped_txs: usize,
    pub resolver: ResolverStats,
}

#[cfg(test)]
mod tests {
    use bitcoin::{BlockHash, hashes::Hash};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        chain::{
            address::{HydraAddressCodec, Network},
            codec::unpack_tx,
            hrc20::tests::transfer_log,
            types::{ReceiptStatus, Vin, Vout},
        },
        storage::{kv_store::StorageHandler, table::Table},
    };

    const A: [u8; 20] = [0xaa; 20];
    const B: [u8; 20] = [0xbb; 20];
    const C: [u8; 20] = [0xcc; 20];
    const TOKEN: ContractId = [0xee; 20];
    const OTHER_TOKEN: ContractId = [0xef; 20];

    fn p2pkh(hash: &[u8; 20]) -> AddressDescriptor {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend(hash);
        script.extend([0x88, 0xac]);
        AddressDescriptor(script)
    }

    fn hash(id: u8) -> TxHash {
        [id; 32]
    }

    fn tx(id: u8, spends: &[(u8, u32)], pays: &[([u8; 20], u64)], receipt: Option<Receipt>) -> Tx {
        Tx {
            txid: hex::encode(hash(id)),
            hex: "0200".into(),
            version: 2,
            lock_time: 0,
            block_time: 0,
            vin: spends
                .iter()
                .map(|(prev, vout)| Vin {
                    txid: Some(hex::encode(hash(*prev))),
                    vout: *vout,
                    sequence: u32::MAX,
                    script_sig: "00".into(),
                })
                .collect(),
            vout: pays
                .iter()
                .enumerate()
                .map(|(n, (to, value))| Vout {
                    value: *value,
                    n: n as u32,
                    script_pubkey: hex::encode(p2pkh(to).as_bytes()),
                })
                .collect(),
            receipt,
        }
    }

    fn receipt(logs: Vec<crate::chain::types::Log>) -> Option<Receipt> {
        Some(Receipt {
            gas_used: 21000,
            gas_limit: 250000,
            gas_price: 40,
            status: ReceiptStatus::Ok,
            logs,
        })
    }

    struct Harness {
        _dir: TempDir,
        db: StorageHandler,
        codec: HydraAddressCodec,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db = StorageHandler::open(dir.path(), false, 64 * 1024 * 1024).unwrap();

            Self {
                _dir: dir,
                db,
                codec: HydraAddressCodec::new(Network::Mainnet),
            }
        }

        fn index(&self, height: u32, txs: Vec<Tx>) -> BlockStats {
            let block = Block {
                height,
                hash: BlockHash::from_byte_array([height as u8; 32]),
                prev_hash: BlockHash::all_zeros(),
                time: 1_700_000_000 + height,
                txs,
            };

            let mut task = self.db.begin_indexing_task();
            let stats = index_block(&mut task, &block, &self.codec).unwrap();
            self.db.apply_indexing_task(task.finalize()).unwrap();

            stats
        }

        fn balance(&self, owner: &[u8; 20]) -> AddrBalance {
            self.db
                .reader()
                .get::<AddrBalanceKV>(&p2pkh(owner))
                .unwrap()
                .unwrap_or_default()
        }

        fn contracts(&self, owner: &[u8; 20]) -> Option<AddrContracts> {
            self.db
                .reader()
                .get::<AddrContractsKV>(&p2pkh(owner))
                .unwrap()
        }

        fn tx_addresses(&self, id: u8) -> TxAddresses {
            self.db
                .reader()
                .get::<TxAddressesKV>(&hash(id))
                .unwrap()
                .unwrap()
        }

        fn utxos(&self, owner: &[u8; 20]) -> Vec<(UtxosByAddressKey, UtxoEntry)> {
            let reader = self.db.reader();

            reader
                .iter_kvs::<UtxosByAddressKV>(UtxosByAddressKV::prefix_range(&p2pkh(owner)), false)
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap()
        }

        fn addr_txs(&self, owner: &[u8; 20], height: u32, id: u8) -> Vec<AddrTxIndex> {
            self.db
                .reader()
                .get::<AddrTxsKV>(&AddrTxKey {
                    address: p2pkh(owner),
                    height,
                    tx_hash: hash(id),
                })
                .unwrap()
                .unwrap_or_default()
        }
    }

    fn balance(total_received: u64, total_sent: u64, balance: u64, tx_count: u64) -> AddrBalance {
        AddrBalance {
            total_received,
            total_sent,
            balance,
            tx_count,
        }
    }

    #[test]
    fn native_value_moves_between_addresses() {
        let h = Harness::new();

        h.index(1, vec![tx(1, &[], &[(A, 500)], None)]);

        assert_eq!(h.balance(&A), balance(500, 0, 500, 1));

        let utxos = h.utxos(&A);
        assert_eq!(utxos.len(), 1);
        assert_eq!(
            utxos[0].0.txo_ref,
            TxoRef {
                tx_hash: hash(1),
                vout: 0
            }
        );
        assert_eq!(utxos[0].1, UtxoEntry { height: 1, value: 500 });

        h.index(2, vec![tx(2, &[(1, 0)], &[(B, 500)], None)]);

        assert_eq!(h.balance(&A), balance(500, 500, 0, 2));
        assert_eq!(h.balance(&B), balance(500, 0, 500, 1));
        assert!(h.utxos(&A).is_empty());
        assert_eq!(h.utxos(&B).len(), 1);

        assert!(h.tx_addresses(1).outputs[0].spent);
        assert_eq!(
            h.tx_addresses(2).inputs,
            vec![TxInput {
                address: p2pkh(&A),
                value: 500
            }]
        );

        assert_eq!(h.addr_txs(&A, 2, 2), vec![AddrTxIndex::Input(0)]);
        assert_eq!(h.addr_txs(&B, 2, 2), vec![AddrTxIndex::Output(0)]);

        // the packed transaction is stored under its id and height
        let (stored, height) = h
            .db
            .reader()
            .get::<TransactionsKV>(&PackedTxId::new(&hash(2), 2))
            .unwrap()
            .map(|PackedTx(bytes)| unpack_tx(&bytes).unwrap())
            .unwrap();
        assert_eq!(height, 2);
        assert_eq!(stored.txid, hex::encode(hash(2)));
    }

    #[test]
    fn second_spend_does_not_debit_again() {
        let h = Harness::new();

        h.index(1, vec![tx(1, &[], &[(A, 500)], None)]);
        h.index(2, vec![tx(2, &[(1, 0)], &[(B, 500)], None)]);
        h.index(3, vec![tx(3, &[(1, 0)], &[(C, 500)], None)]);

        assert_eq!(h.balance(&A), balance(500, 500, 0, 2));
        assert_eq!(h.balance(&C), balance(500, 0, 500, 1));

        // the input is still recorded with what it claimed to spend
        assert_eq!(h.tx_addresses(3).inputs[0].address, p2pkh(&A));
    }

    #[test]
    fn output_spent_in_same_block_leaves_no_utxo() {
        let h = Harness::new();

        let stats = h.index(
            1,
            vec![
                tx(1, &[], &[(A, 500), (A, 20)], None),
                tx(2, &[(1, 0)], &[(B, 300), (A, 200)], None),
            ],
        );

        assert_eq!(stats.outputs, 4);
        assert_eq!(stats.inputs, 1);

        assert_eq!(h.balance(&A), balance(720, 500, 220, 2));
        assert_eq!(h.balance(&B), balance(300, 0, 300, 1));

        let remaining = h
            .utxos(&A)
            .into_iter()
            .map(|(key, _)| key.txo_ref)
            .collect::<Vec<_>>();

        assert_eq!(
            remaining,
            vec![
                TxoRef {
                    tx_hash: hash(1),
                    vout: 1
                },
                TxoRef {
                    tx_hash: hash(2),
                    vout: 1
                },
            ]
        );
    }

    #[test]
    fn unresolvable_inputs_are_skipped() {
        let h = Harness::new();

        h.index(1, vec![tx(1, &[], &[(A, 500)], None)]);
        let stats = h.index(2, vec![tx(2, &[(9, 0), (1, 5), (1, 0)], &[(B, 100)], None)]);

        // each spent transaction is read once, the unknown one included
        assert_eq!(stats.resolver.misses, 4);
        assert_eq!(stats.resolver.hits, 3);

        assert_eq!(h.balance(&A), balance(500, 500, 0, 2));
        assert_eq!(h.balance(&B), balance(100, 0, 100, 1));

        let inputs = h.tx_addresses(2).inputs;
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0], TxInput::default());
        assert_eq!(inputs[1], TxInput::default());
        assert_eq!(inputs[2].value, 500);
    }

    #[test]
    fn balance_underflow_is_clamped() {
        let h = Harness::new();

        h.index(1, vec![tx(1, &[], &[(A, 500)], None)]);

        // storage disagrees with the recorded output
        let mut task = h.db.begin_indexing_task();
        task.set::<AddrBalanceKV>(p2pkh(&A), balance(100, 0, 100, 1))
            .unwrap();
        h.db.apply_indexing_task(task.finalize()).unwrap();

        h.index(2, vec![tx(2, &[(1, 0)], &[(B, 500)], None)]);

        assert_eq!(h.balance(&A), balance(100, 500, 0, 2));
    }

    #[test]
    fn token_transfer_updates_both_parties() {
        let h = Harness::new();

        let logs = vec![transfer_log(&TOKEN, &A, &B, "0x64")];

        let stats = h.index(1, vec![tx(1, &[], &[(C, 1)], receipt(logs))]);
        assert_eq!(stats.transfers, 1);

        let expected = AddrContracts {
            total_tx_count: 1,
            non_contract_tx_count: 0,
            contracts: vec![
                crate::sync::stages::index::indexers::core::addr_contracts::AddrContract {
                    contract: TOKEN,
                    tx_count: 1,
                },
            ],
        };

        assert_eq!(h.contracts(&A), Some(expected.clone()));
        assert_eq!(h.contracts(&B), Some(expected));

        assert_eq!(
            h.tx_addresses(1).contracts,
            vec![
                TouchedContract {
                    address: A,
                    contract: TOKEN
                },
                TouchedContract {
                    address: B,
                    contract: TOKEN
                },
            ]
        );

        assert_eq!(h.addr_txs(&A, 1, 1), vec![AddrTxIndex::TokenSent(1)]);
        assert_eq!(h.addr_txs(&B, 1, 1), vec![AddrTxIndex::TokenReceived(1)]);
    }

    #[test]
    fn self_transfer_counts_once() {
        let h = Harness::new();

        let logs = vec![transfer_log(&TOKEN, &A, &A, "0x64")];

        h.index(1, vec![tx(1, &[], &[(C, 1)], receipt(logs))]);

        let contracts = h.contracts(&A).unwrap();
        assert_eq!(contracts.total_tx_count, 1);
        assert_eq!(contracts.contracts.len(), 1);
        assert_eq!(contracts.contracts[0].tx_count, 1);

        assert_eq!(
            h.tx_addresses(1).contracts,
            vec![TouchedContract {
                address: A,
                contract: TOKEN
            }]
        );
    }

    #[test]
    fn contract_positions_follow_first_seen_order() {
        let h = Harness::new();

        let logs = vec![
            transfer_log(&OTHER_TOKEN, &A, &B, "0x01"),
            transfer_log(&TOKEN, &A, &B, "0x02"),
            transfer_log(&OTHER_TOKEN, &B, &A, "0x03"),
        ];

        h.index(1, vec![tx(1, &[], &[(C, 1)], receipt(logs))]);
        h.index(
            2,
            vec![tx(2, &[], &[(C, 1)], receipt(vec![transfer_log(&TOKEN, &B, &A, "0x04")]))],
        );

        let a = h.contracts(&A).unwrap();
        assert_eq!(a.total_tx_count, 2);
        assert_eq!(
            a.contracts
                .iter()
                .map(|c| (c.contract, c.tx_count))
                .collect::<Vec<_>>(),
            vec![(OTHER_TOKEN, 1), (TOKEN, 2)]
        );

        assert_eq!(
            h.addr_txs(&A, 1, 1),
            vec![
                AddrTxIndex::TokenSent(1),
                AddrTxIndex::TokenSent(2),
                AddrTxIndex::TokenReceived(1)
            ]
        );
        assert_eq!(h.addr_txs(&A, 2, 2), vec![AddrTxIndex::TokenReceived(2)]);
    }

    #[test]
    fn zero_account_has_no_contract_record() {
        let h = Harness::new();

        let logs = vec![transfer_log(&TOKEN, &[0; 20], &B, "0x64")];

        h.index(1, vec![tx(1, &[], &[(C, 1)], receipt(logs))]);

        assert_eq!(h.contracts(&[0; 20]), None);
        assert_eq!(h.contracts(&B).unwrap().contracts[0].tx_count, 1);

        // the touch list still names both sides
        assert_eq!(h.tx_addresses(1).contracts.len(), 2);
    }

    #[test]
    fn malformed_receipt_only_skips_its_transaction() {
        let h = Harness::new();

        let bad = vec![
            transfer_log(&TOKEN, &A, &B, "0x64"),
            transfer_log(&TOKEN, &A, &C, "0xzz"),
        ];
        let good = vec![transfer_log(&TOKEN, &B, &C, "0x01")];

        let stats = h.index(
            1,
            vec![
                tx(1, &[], &[(A, 10)], receipt(bad)),
                tx(2, &[], &[(B, 10)], receipt(good)),
            ],
        );

        assert_eq!(stats.skipped_txs, 1);
        assert_eq!(stats.transfers, 1);

        // native value of the skipped transaction is still indexed
        assert_eq!(h.balance(&A), balance(10, 0, 10, 1));

        assert_eq!(h.contracts(&A), None);
        assert!(h.tx_addresses(1).contracts.is_empty());
        assert_eq!(h.contracts(&B).unwrap().contracts[0].tx_count, 1);
        assert_eq!(h.contracts(&C).unwrap().contracts[0].tx_count, 1);
    }

    #[test]
    fn unpackable_transaction_keeps_native_value_only() {
        let h = Harness::new();

        h.index(1, vec![tx(1, &[], &[(A, 100)], None)]);

        // odd-length data cannot be packed, although the amount itself would parse
        let logs = vec![transfer_log(&TOKEN, &A, &C, "0x1")];
        let stats = h.index(2, vec![tx(2, &[(1, 0)], &[(B, 100)], receipt(logs))]);

        assert_eq!(stats.skipped_txs, 1);
        assert_eq!(stats.transfers, 0);
        assert_eq!(stats.inputs, 1);

        assert_eq!(h.balance(&A), balance(100, 100, 0, 2));
        assert_eq!(h.balance(&B), balance(100, 0, 100, 1));

        let reader = h.db.reader();
        assert!(TransactionsKV::find(&reader, &hash(2)).unwrap().is_none());
        assert!(TransactionsKV::find(&reader, &hash(1)).unwrap().is_some());

        assert_eq!(h.contracts(&A), None);
        assert_eq!(h.contracts(&C), None);
        assert!(h.tx_addresses(2).contracts.is_empty());
    }

    #[test]
    fn balances_stay_consistent_across_blocks() {
        let h = Harness::new();

        h.index(
            1,
            vec![
                tx(1, &[], &[(A, 1000)], None),
                tx(2, &[(1, 0)], &[(B, 400), (C, 350), (A, 250)], None),
            ],
        );
        h.index(2, vec![tx(3, &[(2, 0), (2, 2)], &[(C, 600), (B, 50)], None)]);
        h.index(3, vec![tx(4, &[(3, 0), (2, 1)], &[(A, 950)], None)]);

        for owner in [A, B, C] {
            let b = h.balance(&owner);
            assert_eq!(b.balance, b.total_received - b.total_sent);

            let unspent: u64 = h.utxos(&owner).iter().map(|(_, entry)| entry.value).sum();
            assert_eq!(unspent, b.balance);
        }

        assert_eq!(h.balance(&A).balance, 950);
        assert_eq!(h.balance(&C).balance, 0);
    }
}
