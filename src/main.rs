use std::path::PathBuf;
use std::time::Duration;

use chain::{
    address::{AddressCodec, HydraAddressCodec},
    hrc20::{ContractInfoCache, contract_balance, contract_info, format_token_amount},
    rpc::NodeClient,
};
use clap::{Parser, Subcommand};
use error::Error;
use serde::{Deserialize, Serialize};
use storage::{encdec::decode_hex_fixed, kv_store::StorageHandler, table::Table};
use sync::stages::index::indexers::core::{
    addr_balance::AddrBalanceKV, addr_contracts::AddrContractsKV, transactions::TransactionsKV,
    utxos_by_address::UtxosByAddressKV,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub use storage::encdec::{DecodingError, DecodingResult};

pub mod chain;
mod error;
pub mod serve;
mod shutdown;
pub mod storage;
pub mod sync;

const DEFAULT_CONTRACT_CACHE_SIZE: u64 = 10_000;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Cli::parse();

    let config = Config::new(&args.config)?;

    let db_path = config.storage.db_path();
    let memory_budget = config.storage.rocksdb_memory_budget_bytes();

    match args.command {
        Command::Run(_) => {
            info!("running hydra indexer with config: {config:?}");
            info!("using db path: {}", db_path.display());

            let db = StorageHandler::open(&db_path, false, memory_budget)?;

            tokio::spawn(storage::stats_logger::start_stats_logger(db.clone()));

            let daemon = sync::pipeline::pipeline(config.sync, db.clone())?;

            let finished = shutdown::ShutdownManager::new()
                .run_until_shutdown(async {
                    while !daemon.should_stop() {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                })
                .await;

            if finished.is_none() {
                info!("stopping pipeline...");
            }

            daemon.teardown();

            info!("flushing db...");
            db.flush()?;
        }
        Command::Serve(_) => {
            // a secondary instance, following whichever process is indexing
            let db = StorageHandler::open(&db_path, true, memory_budget)?;

            let codec = HydraAddressCodec::new(config.sync.network);
            let state = serve::AppState::new(db, codec);

            let address = config
                .server
                .address
                .as_deref()
                .unwrap_or(serve::DEFAULT_SERVE_ADDRESS);

            let served = shutdown::ShutdownManager::new()
                .run_until_shutdown(serve::run(state, address))
                .await;

            if let Some(result) = served {
                result?;
            }
        }
        Command::Query(query) => {
            let db = StorageHandler::open(&db_path, true, memory_budget)?;

            run_query(&config.sync, &db, query)?;
        }
    }

    Ok(())
}

fn run_query(config: &sync::Config, db: &StorageHandler, query: QueryArgs) -> Result<(), Error> {
    let codec = HydraAddressCodec::new(config.network);
    let reader = db.reader();

    match query.query {
        Query::Balance { address } => {
            let descriptor = codec.address_to_descriptor(&address)?;
            let balance = reader.get::<AddrBalanceKV>(&descriptor)?.unwrap_or_default();

            print_json(&balance)?;
        }
        Query::Utxos { address } => {
            let descriptor = codec.address_to_descriptor(&address)?;
            let range = UtxosByAddressKV::prefix_range(&descriptor);

            for kv in reader.iter_kvs::<UtxosByAddressKV>(range, false)? {
                let (key, entry) = kv?;

                println!(
                    "{}:{} height={} value={}",
                    hex::encode(key.txo_ref.tx_hash),
                    key.txo_ref.vout,
                    entry.height,
                    entry.value
                );
            }
        }
        Query::Contracts { address, info } => {
            let descriptor = codec.address_to_descriptor(&address)?;
            let contracts = reader.get::<AddrContractsKV>(&descriptor)?.unwrap_or_default();

            if !info {
                return print_json(&contracts);
            }

            let account = descriptor.token_account()?;

            let node = NodeClient::new(
                &config.node.rpc_address,
                &config.node.rpc_user,
                &config.node.rpc_pass,
            )?;
            let cache = ContractInfoCache::new(
                config
                    .contract_cache_size
                    .unwrap_or(DEFAULT_CONTRACT_CACHE_SIZE),
            );
            let mut holdings = Vec::with_capacity(contracts.contracts.len());

            for entry in &contracts.contracts {
                let Some(token) = contract_info(&node, &cache, &entry.contract)? else {
                    warn!(contract = %hex::encode(entry.contract), "not a token contract");
                    continue;
                };

                let balance = contract_balance(&node, &entry.contract, &account)?;

                holdings.push(TokenHolding {
                    balance: format_token_amount(balance, token.decimals),
                    tx_count: entry.tx_count,
                    token,
                });
            }

            info!("contract cache: {}", cache.log());

            print_json(&holdings)?;
        }
        Query::Tx { txid } => {
            let tx_hash = decode_hex_fixed(|| "txid".into(), &txid)?;

            match TransactionsKV::find(&reader, &tx_hash)? {
                Some((tx, height)) => {
                    println!("confirmed at height {height}");
                    print_json(&tx)?;
                }
                None => println!("transaction {txid} not indexed"),
            }
        }
    }

    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<(), Error> {
    let out = serde_json::to_string_pretty(value).map_err(|e| Error::Custom(e.to_string()))?;

    println!("{out}");

    Ok(())
}

#[derive(Serialize)]
struct TokenHolding {
    token: chain::hrc20::ContractInfo,
    balance: String,
    tx_count: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow the node and index new blocks
    Run(Args),
    /// Serve the index over HTTP
    Serve(Args),
    /// Inspect the index from the command line
    Query(QueryArgs),
}

#[derive(Debug, clap::Args)]
pub struct Args {}

#[derive(Debug, clap::Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    query: Query,
}

#[derive(Debug, Subcommand)]
enum Query {
    /// Native balance of an address
    Balance { address: String },
    /// Unspent outputs of an address
    Utxos { address: String },
    /// Token contracts an address has interacted with
    Contracts {
        address: String,
        /// Look up token metadata and current balances on the node
        #[arg(long)]
        info: bool,
    },
    /// An indexed transaction with its receipt
    Tx { txid: String },
}

#[derive(Debug, Parser)]
#[clap(name = "hydra-indexer")]
#[clap(bin_name = "hydra-indexer")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub storage: storage::Config,
    pub sync: sync::Config,
    #[serde(default)]
    pub server: serve::ServerConfig,
}

impl Config {
    pub fn new(config_path: &Option<PathBuf>) -> Result<Self, config::ConfigError> {
        let mut s = config::Config::builder();

        s = s.add_source(config::File::with_name("hydra.toml").required(false));

        if let Some(explicit) = config_path.as_ref().and_then(|x| x.to_str()) {
            s = s.add_source(config::File::with_name(explicit).required(true));
        }

        s = s.add_source(config::Environment::with_prefix("HYDRA").separator("_"));

        s.build()?.try_deserialize()
    }
}
