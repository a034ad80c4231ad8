use std::time::Duration;

use bitcoin::BlockHash;
use gasket::framework::*;
use tokio::time::Instant;
use tracing::{error, info};

use crate::{
    chain::{
        block::{contract_gas_params, parse_block, tx_from_bitcoin},
        rpc::{ChainSource, NodeClient},
        types::Block,
    },
    error::Error,
    storage::kv_store::StorageHandler,
    sync::{
        self, NodeConfig, ReceiptMode,
        stages::{BlockHeight, ChainEvent, index::indexers::core::hash_by_height::HashByHeightKV},
    },
};

/*
    Pull Stage

    Polls the node for new blocks, fetches each block together with the receipts of its contract
    transactions and passes it downstream to the indexing stage.
*/

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

pub type DownstreamPort = gasket::messaging::OutputPort<ChainEvent>;

#[derive(Stage)]
#[stage(name = "pull", unit = "ChainEvent", worker = "Worker")]
pub struct Stage {
    node: NodeConfig,
    receipt_mode: ReceiptMode,
    poll_interval: Duration,

    // next height to fetch and the hash its block must build on
    next_height: BlockHeight,
    expected_prev: Option<BlockHash>,

    pub downstream: DownstreamPort,
}

impl Stage {
    pub fn new(config: &sync::Config, db: &StorageHandler) -> Result<Self, Error> {
        let tip = HashByHeightKV::tip(&db.reader())?;

        let (next_height, expected_prev) = match tip {
            Some(point) => (point.height + 1, Some(point.hash)),
            None => (config.start_height.unwrap_or(0), None),
        };

        info!(next_height, "starting pull stage");

        Ok(Self {
            node: config.node.clone(),
            receipt_mode: config.receipt_mode,
            poll_interval: Duration::from_secs(
                config
                    .poll_interval_secs
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            next_height,
            expected_prev,
            downstream: Default::default(),
        })
    }
}

pub struct Worker {
    source: NodeClient,
    stats: PullStats,
}

#[async_trait::async_trait(?Send)]
impl gasket::framework::Worker<Stage> for Worker {
    async fn bootstrap(stage: &Stage) -> Result<Self, WorkerError> {
        info!("connecting to node {}...", stage.node.rpc_address);

        let source = NodeClient::new(
            &stage.node.rpc_address,
            &stage.node.rpc_user,
            &stage.node.rpc_pass,
        )
        .or_retry()?;

        let best = source.best_height().or_retry()?;

        info!(
            node = %stage.node.rpc_address,
            best_height = best,
            "connected to upstream node"
        );

        Ok(Worker {
            source,
            stats: PullStats::new(),
        })
    }

    async fn schedule(&mut self, stage: &mut Stage) -> Result<WorkSchedule<ChainEvent>, WorkerError> {
        let tip = self.source.best_height().or_restart()?;

        if stage.next_height > tip {
            tokio::time::sleep(stage.poll_interval).await;
            return Ok(WorkSchedule::Idle);
        }

        let block = fetch_block(&self.source, stage.next_height, stage.receipt_mode).or_restart()?;

        if let Some(expected) = stage.expected_prev {
            if block.prev_hash != expected {
                error!(
                    height = block.height,
                    prev_hash = %block.prev_hash,
                    expected = %expected,
                    "block does not build on the indexed chain, rollbacks are unsupported"
                );
                return Err(WorkerError::Panic);
            }
        }

        Ok(WorkSchedule::Unit(ChainEvent { block, tip }))
    }

    async fn execute(&mut self, unit: &ChainEvent, stage: &mut Stage) -> Result<(), WorkerError> {
        stage
            .downstream
            .send(unit.clone().into())
            .await
            .or_panic()?;

        stage.next_height = unit.block.height + 1;
        stage.expected_prev = Some(unit.block.hash);

        self.stats.block_pulled();

        Ok(())
    }
}

/// Fetches the block at `height` with receipts attached to its contract transactions. Both
/// receipt modes produce the same block.
pub fn fetch_block<S: ChainSource>(
    source: &S,
    height: BlockHeight,
    mode: ReceiptMode,
) -> Result<Block, Error> {
    let hash = source.block_hash(height)?;
    let raw = source.raw_block(&hash)?;

    let parsed = parse_block(&raw)?;
    let time = parsed.header.time;

    let mut batch = match mode {
        ReceiptMode::Batch => Some(source.search_logs(height, height)?),
        ReceiptMode::PerTransaction => None,
    };

    let mut txs = Vec::with_capacity(parsed.txs.len());

    for raw_tx in &parsed.txs {
        let mut tx = tx_from_bitcoin(raw_tx, time.into());

        let Some((gas_limit, gas_price)) = contract_gas_params(raw_tx) else {
            txs.push(tx);
            continue;
        };

        // contract executions without logs are absent from the batch
        let receipt = match batch.as_mut().and_then(|receipts| receipts.remove(&tx.txid)) {
            Some(receipt) => Some(receipt),
            None => source.transaction_receipt(&tx.txid)?,
        };

        tx.receipt = receipt.map(|mut receipt| {
            receipt.gas_limit = gas_limit;
            receipt.gas_price = gas_price;
            receipt
        });

        txs.push(tx);
    }

    Ok(Block {
        height,
        hash,
        prev_hash: parsed.header.prev_blockhash,
        time,
        txs,
    })
}

pub struct PullStats {
    processed: usize,
    last_checkpoint: Instant,
}

impl PullStats {
    pub fn new() -> Self {
        Self {
            processed: 0,
            last_checkpoint: Instant::now(),
        }
    }

    pub fn block_pulled(&mut self) {
        self.processed += 1;

        if self.processed % 1000 == 0 {
            let time_taken = self.last_checkpoint.elapsed();

            info!(
                "last 1000 blocks pulled in {time_taken:?} ({:.2} b/s)",
                1000_f64 / time_taken.as_secs_f64()
            );

            self.last_checkpoint = Instant::now();
        }
    }
}
