//! Production effect wiring for one unit process

use crate::config::{LeaderSource, ProxyConfig};
use anyhow::{Context, Result};
use sshproxy_cluster::UnitRuntime;
use sshproxy_core::effects::LeadershipEffects;
use sshproxy_effects::{
    FileLeadershipHandler, FilesystemDirectoryHandler, FilesystemStorageHandler,
    RealCryptoHandler, SshCommandExecutor, StaticConfigHandler, StaticLeadershipHandler,
    TracingStatusHandler, UnitEffectSystem,
};
use std::sync::Arc;

/// File that names the current leader, inside the directory root
const LEADER_FILE: &str = "leader";

pub async fn build_runtime(config: &ProxyConfig) -> Result<UnitRuntime<UnitEffectSystem>> {
    let unit = config.unit_id()?;
    let storage = Arc::new(FilesystemStorageHandler::new(&config.unit.state_dir));

    let directory = FilesystemDirectoryHandler::new(&config.unit.directory_dir, unit.clone());
    directory
        .join()
        .await
        .with_context(|| format!("joining directory {}", config.unit.directory_dir.display()))?;

    let leadership: Arc<dyn LeadershipEffects> = match config.unit.leader {
        LeaderSource::File => Arc::new(FileLeadershipHandler::new(
            config.unit.directory_dir.join(LEADER_FILE),
            unit.clone(),
        )),
        LeaderSource::Always => Arc::new(StaticLeadershipHandler::new(true)),
        LeaderSource::Never => Arc::new(StaticLeadershipHandler::new(false)),
    };

    let identity_file = storage
        .path_for(sshproxy_cluster::identity::PRIVATE_KEY_PATH)
        .context("resolving identity file")?;
    let remote = SshCommandExecutor::new(identity_file)
        .with_connect_timeout(config.connect_timeout())
        .with_command_timeout(config.command_timeout());

    let effects = UnitEffectSystem::builder(unit.clone())
        .leadership(leadership)
        .crypto(Arc::new(RealCryptoHandler::new()))
        .storage(storage.clone())
        .directory(Arc::new(directory))
        .remote(Arc::new(remote))
        .config(Arc::new(StaticConfigHandler::new(config.remote_target())))
        .status(Arc::new(TracingStatusHandler::new(unit.clone(), storage)))
        .build()
        .context("assembling effect handlers")?;

    tracing::debug!(unit = %unit, state_dir = %config.unit.state_dir.display(), "Unit runtime ready");
    Ok(UnitRuntime::new(Arc::new(effects)))
}
