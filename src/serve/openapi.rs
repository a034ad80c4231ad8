use super::{routes::*, types::*};
use crate::{
    chain::types::{Log, Receipt, ReceiptStatus, Tx, Vin, Vout},
    sync::stages::index::indexers::core::{
        addr_balance::AddrBalance,
        addr_contracts::{AddrContract, AddrContracts},
        addr_txs::AddrTxIndex,
    },
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hydra Indexer",
        version = "v0.1.0",
        description = "Address, UTXO and HRC20 token index for the Hydra chain.",
        license(
            name = "Apache 2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0.txt"
        )
    ),
    paths(
        super::tip,
        addresses::balance::addresses_balance,
        addresses::contracts::addresses_contracts,
        addresses::txs::addresses_txs,
        addresses::utxos::addresses_utxos,
        transactions::transactions_by_txid,
    ),
    components(schemas(
        IndexerInfo,
        ChainTip,
        // --
        ServeResponse<AddrBalance>,
        ServeResponse<AddrContracts>,
        ServeResponse<Vec<AddressTx>>,
        ServeResponse<Vec<AddressUtxo>>,
        ServeResponse<TransactionWithTransfers>,
        // ---
        AddrBalance,
        AddrContract,
        AddrContracts,
        AddrTxIndex,
        AddressTx,
        AddressUtxo,
        TokenTransferView,
        TransactionWithTransfers,
        Tx,
        Vin,
        Vout,
        Receipt,
        ReceiptStatus,
        Log,
    )),
)]
pub struct APIDoc;
