pub mod addr_balance;
pub mod addr_contracts;
pub mod addr_txs;
pub mod hash_by_height;
pub mod transactions;
pub mod tx_addresses;
pub mod utxos_by_address;

#[repr(u8)]
pub enum IndexTable {
    AddrBalance = b'B',
    AddrContracts = b'C',
    AddrTxs = b'X',
    HashByHeight = b'H',
    Transactions = b'T',
    TxAddresses = b'A',
    UtxosByAddress = b'U',
}
