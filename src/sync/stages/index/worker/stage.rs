use std::time::{Duration, Instant};

use bitcoin::hashes::Hash;
use gasket::framework::*;
use tracing::{error, info, warn};

use crate::{
    chain::address::HydraAddressCodec,
    error::Error,
    storage::kv_store::StorageHandler,
    sync::{
        self,
        stages::{
            ChainEvent, Point,
            index::{
                indexers::core::hash_by_height::HashByHeightKV,
                worker::context::{BlockStats, index_block},
            },
        },
    },
};

/*
    Index Stage

    After receiving a new block from the Pull stage, the indexing stage runs the three indexing
    passes (outputs, inputs, token transfers) and commits every resulting mutation for the block
    in a single write.
*/

pub type UpstreamPort = gasket::messaging::InputPort<ChainEvent>;

#[derive(Stage)]
#[stage(name = "index", unit = "ChainEvent", worker = "Worker")]
pub struct Stage {
    db: StorageHandler,
    codec: HydraAddressCodec,
    // tip of our processed chain in db
    last_processed: Option<Point>,
    start_height: u32,
    stop_after: Option<u32>,

    pub upstream: UpstreamPort,
}

impl Stage {
    pub fn new(config: &sync::Config, db: StorageHandler) -> Result<Self, Error> {
        let last_processed = HashByHeightKV::tip(&db.reader())?;

        info!(
            "starting indexer stage (last processed: {})",
            last_processed.map_or("none".to_string(), |p| p.to_string())
        );

        Ok(Self {
            db,
            codec: HydraAddressCodec::new(config.network),
            last_processed,
            start_height: config.start_height.unwrap_or(0),
            stop_after: config.stop_after,
            upstream: Default::default(),
        })
    }

    fn expected_height(&self) -> u32 {
        self.last_processed
            .map_or(self.start_height, |point| point.height + 1)
    }
}

pub struct Worker;

#[async_trait::async_trait(?Send)]
impl gasket::framework::Worker<Stage> for Worker {
    async fn bootstrap(_stage: &Stage) -> Result<Self, WorkerError> {
        Ok(Worker)
    }

    async fn schedule(&mut self, stage: &mut Stage) -> Result<WorkSchedule<ChainEvent>, WorkerError> {
        let event = stage.upstream.recv().await.or_panic()?.payload;

        if let Some(stop) = stage.stop_after {
            if event.block.height > stop {
                info!("passed stop after height, compacting db then stopping indexer...");
                stage.db.flush_and_compact().or_panic()?;

                return Ok(WorkSchedule::Done);
            }
        }

        Ok(WorkSchedule::Unit(event))
    }

    async fn execute(&mut self, unit: &ChainEvent, stage: &mut Stage) -> Result<(), WorkerError> {
        let ChainEvent { block, tip } = unit;
        let point = Point::from(block);

        /* check received block against processed chain */

        let expected_height = stage.expected_height();
        if block.height != expected_height {
            // blocks already in the queue when the pull stage restarted
            warn!("received block {point} while expecting height {expected_height}, skipping");
            return Ok(());
        }

        if let Some(last) = stage.last_processed {
            if block.prev_hash != last.hash {
                error!(%point, prev_hash = %block.prev_hash, "previous block hash mismatch");
                return Err(WorkerError::Panic);
            }
        }

        /* index the block */

        let total_start = Instant::now();
        let mut timings = IndexingTimings::default();

        let mut task = stage.db.begin_indexing_task();

        let passes_start = Instant::now();
        let stats = index_block(&mut task, block, &stage.codec).or_restart()?;
        timings.passes = passes_start.elapsed();

        task.set::<HashByHeightKV>(block.height, block.hash.to_byte_array())
            .or_restart()?;

        let mutations = task.pending();
        let task = task.finalize();

        let apply_task_start = Instant::now();
        stage.db.apply_indexing_task(task).or_restart()?;
        timings.apply_task = apply_task_start.elapsed();

        stage.last_processed = Some(point);

        timings.total = total_start.elapsed();

        if timings.total.as_secs() >= 10 {
            warn!("block processed slowly, dumping RocksDB metrics...");
            stage.db.log_perf_snapshot();
        }

        let progress = if *tip > 0 {
            (block.height as f64 / *tip as f64 * 100.0).min(100.0)
        } else {
            100.0
        };

        let BlockStats {
            txs,
            outputs,
            inputs,
            transfers,
            skipped_txs,
            resolver,
        } = stats;

        info!(
            %point,
            timings = timings.log(),
            muts = mutations,
            txs,
            outputs,
            inputs,
            transfers,
            skipped_txs,
            resolver = resolver.log(),
            progress = format!("{:.2}%", progress),
            "indexed block",
        );

        Ok(())
    }
}

#[derive(Default, Debug)]
struct IndexingTimings {
    /// Time spent running the indexing passes
    passes: Duration,
    apply_task: Duration,
    total: Duration,
}

impl IndexingTimings {
    fn log(&self) -> String {
        let mut result = String::with_capacity(64);

        result.push_str("total=");
        Self::append_duration(&mut result, &self.total);
        result.push_str(" passes=");
        Self::append_duration(&mut result, &self.passes);
        result.push_str(" apply=");
        Self::append_duration(&mut result, &self.apply_task);

        result
    }

    #[inline]
    fn append_duration(result: &mut String, duration: &Duration) {
        let nanos = duration.as_nanos();

        if nanos >= 1_000_000_000 {
            result.push_str(&duration.as_secs().to_string());
            result.push('s');
        } else if nanos >= 1_000_000 {
            result.push_str(&duration.as_millis().to_string());
            result.push_str("ms");
        } else if nanos >= 1_000 {
            result.push_str(&duration.as_micros().to_string());
            result.push_str("µs");
        } else {
            result.push_str(&nanos.to_string());
            result.push_str("ns");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timings_pick_readable_units() {
        let timings = IndexingTimings {
            passes: Duration::from_micros(1500),
            apply_task: Duration::from_nanos(20),
            total: Duration::from_secs(2),
        };

        assert_eq!(timings.log(), "total=2s passes=1ms apply=20ns");
    }
}
