use std::time::Duration;

use crate::{error::Error, storage::kv_store::StorageHandler, sync::stages::index};

use super::{Config, stages::pull};

const DEFAULT_SYNC_STAGE_QUEUE_SIZE: usize = 20;
const DEFAULT_SYNC_STAGE_TIMEOUT_SECS: u64 = 600;

fn gasket_policy(stage_timeout: u64) -> gasket::runtime::Policy {
    let default_retries = gasket::retries::Policy {
        max_retries: 20,
        backoff_unit: Duration::from_secs(1),
        backoff_factor: 2,
        max_backoff: Duration::from_secs(60),
        ..Default::default()
    };

    gasket::runtime::Policy {
        tick_timeout: Duration::from_secs(stage_timeout).into(),
        bootstrap_retry: default_retries.clone(),
        work_retry: default_retries.clone(),
        teardown_retry: default_retries,
    }
}

pub fn pipeline(config: Config, db: StorageHandler) -> Result<gasket::daemon::Daemon, Error> {
    // both stages resume from the tip recorded in storage
    let mut pull = pull::Stage::new(&config, &db)?;
    let mut index = index::worker::stage::Stage::new(&config, db)?;

    let queue_size = config
        .stage_queue_size
        .unwrap_or(DEFAULT_SYNC_STAGE_QUEUE_SIZE);
    let stage_timeout = config
        .stage_timeout_secs
        .unwrap_or(DEFAULT_SYNC_STAGE_TIMEOUT_SECS);

    let (pull_to_index, index_from_pull) = gasket::messaging::tokio::mpsc_channel(queue_size);
    pull.downstream.connect(pull_to_index);
    index.upstream.connect(index_from_pull);

    let policy = gasket_policy(stage_timeout);

    let pull = gasket::runtime::spawn_stage(pull, policy.clone());
    let index = gasket::runtime::spawn_stage(index, policy);

    Ok(gasket::daemon::Daemon::new(vec![pull, index]))
}
