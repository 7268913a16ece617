//! CLI command implementations
//!
//! `serve` and `check` share one boot path: load config, install logging,
//! build chain readers and the verification service.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chain::efp::EfpClient;
use crate::chain::{
    Chain, ChainError, EvmChainReader, FollowerSource, JsonRpcClient, MockChainReader,
    MockChainState, SnapshotCollector,
};
use crate::config::{ChainsConfig, GateConfig};
use crate::credential::InMemoryCredentialRepository;
use crate::gating::{Address, CategoryRegistry, GatingLock, InMemoryLockRepository};
use crate::http_server::{GateService, HttpServer};
use crate::observability::{self, log_event, Event};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config, port } => serve(&config, port),
        Command::Check {
            config,
            lock,
            addresses,
            ethereum_state,
            lukso_state,
        } => {
            let offline = OfflineState {
                ethereum: ethereum_state.as_deref(),
                lukso: lukso_state.as_deref(),
            };
            let status = check(&config, &lock, addresses, offline)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

/// Write a default configuration file
///
/// Refuses to overwrite an existing file.
pub fn init(config_path: &Path) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::already_initialized(
            &config_path.display().to_string(),
        ));
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CliError::io_error(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let json = serde_json::to_string_pretty(&GateConfig::default())?;
    fs::write(config_path, json).map_err(|e| {
        CliError::io_error(format!("Failed to write {}: {}", config_path.display(), e))
    })?;

    println!("Wrote default config to {}", config_path.display());
    Ok(())
}

/// Load config, build the service and serve HTTP until Ctrl-C
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = boot(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    if config.uses_dev_secret() {
        warn!("credential.jwt_secret is the development default; set GATEPOST_JWT_SECRET");
    }
    if config.server.admin_token.is_none() {
        warn!("no admin token configured; lock writes are unauthenticated");
    }

    let collector = live_collector(&config.chains)
        .map_err(|e| CliError::boot_failed(format!("Failed to create chain readers: {}", e)))?;
    let chains: Vec<&str> = collector.chains().iter().map(|c| c.as_str()).collect();
    info!(?chains, "chain readers ready");

    let service = build_service(&config, collector);
    let server = HttpServer::new(config.server.clone(), service);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Chain state files for offline evaluation
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineState<'a> {
    pub ethereum: Option<&'a Path>,
    pub lukso: Option<&'a Path>,
}

impl OfflineState<'_> {
    fn is_set(&self) -> bool {
        self.ethereum.is_some() || self.lukso.is_some()
    }
}

/// Evaluate a lock file against claimed addresses
///
/// Reads live chains unless offline state files are given.
pub fn check(
    config_path: &Path,
    lock_path: &Path,
    addresses: Vec<(String, Address)>,
    offline: OfflineState<'_>,
) -> CliResult<crate::gating::VerificationStatus> {
    let config = if config_path.exists() {
        boot(config_path)?
    } else {
        GateConfig::default()
    };

    let content = fs::read_to_string(lock_path).map_err(|e| {
        CliError::io_error(format!("Failed to read {}: {}", lock_path.display(), e))
    })?;
    let lock: GatingLock = serde_json::from_str(&content)?;

    let collector = if offline.is_set() {
        offline_collector(offline)
    } else {
        live_collector(&config.chains)
    }
    .map_err(|e| CliError::boot_failed(format!("Failed to create chain readers: {}", e)))?;

    const POST_ID: &str = "cli-check";
    let service = build_service(&config, collector);
    service.set_lock(POST_ID, lock)?;

    let addresses: BTreeMap<String, Address> = addresses.into_iter().collect();
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;
    let status = rt.block_on(service.pre_verify(POST_ID, &addresses))?;
    Ok(status)
}

fn boot(config_path: &Path) -> CliResult<GateConfig> {
    log_event(Event::BootStart);
    let config = GateConfig::load(config_path)?;
    // A second init in the same process (tests) keeps the first subscriber.
    if let Err(e) = observability::logging::init(&config.logging) {
        eprintln!("logging not initialised: {}", e);
    }
    info!(
        event = Event::ConfigLoaded.as_str(),
        path = %config_path.display(),
        "config loaded"
    );
    Ok(config)
}

fn build_service(config: &GateConfig, collector: SnapshotCollector) -> GateService {
    GateService::new(
        CategoryRegistry::with_defaults(),
        InMemoryLockRepository::new(),
        InMemoryCredentialRepository::new(),
        collector,
        config.credential.token_config(),
        config.challenge.clone(),
    )
}

/// Readers for every chain with a configured RPC endpoint
pub fn live_collector(chains: &ChainsConfig) -> Result<SnapshotCollector, ChainError> {
    let timeout = chains.request_timeout();
    let mut collector = SnapshotCollector::new();

    if let Some(url) = &chains.ethereum_rpc_url {
        let rpc = JsonRpcClient::new(url.clone(), timeout)?;
        let efp = EfpClient::new(chains.efp_api_url.clone(), timeout)?;
        let reader = EvmChainReader::new(Chain::Ethereum, rpc)
            .with_ens_registry(chains.ens_registry)
            .with_followers(FollowerSource::Efp(efp));
        collector = collector.with_reader(Arc::new(reader));
    }

    if let Some(url) = &chains.lukso_rpc_url {
        let rpc = JsonRpcClient::new(url.clone(), timeout)?;
        let reader = EvmChainReader::new(Chain::Lukso, rpc).with_followers(FollowerSource::Lsp26 {
            registry: chains.lsp26_registry,
        });
        collector = collector.with_reader(Arc::new(reader));
    }

    Ok(collector)
}

fn offline_collector(offline: OfflineState<'_>) -> Result<SnapshotCollector, ChainError> {
    let mut collector = SnapshotCollector::new();
    for (chain, path) in [
        (Chain::Ethereum, offline.ethereum),
        (Chain::Lukso, offline.lukso),
    ] {
        if let Some(path) = path {
            let state = MockChainState::load(path)?;
            collector = collector.with_reader(Arc::new(MockChainReader::with_state(chain, state)));
        }
    }
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gating::CategoryState;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("gatepost.json");

        init(&path).unwrap();
        let config = GateConfig::load(&path).unwrap();
        assert_eq!(config, {
            let mut expected = GateConfig::default();
            expected.apply_overrides(|key| std::env::var(key).ok());
            expected
        });

        let err = init(&path).unwrap_err();
        assert_eq!(err.code_str(), "GATEPOST_CLI_ALREADY_INITIALIZED");
    }

    #[test]
    fn test_live_collector_only_configured_chains() {
        let mut chains = ChainsConfig::default();
        assert!(live_collector(&chains).unwrap().chains().is_empty());

        chains.lukso_rpc_url = Some("http://127.0.0.1:1".to_string());
        assert_eq!(live_collector(&chains).unwrap().chains(), vec![Chain::Lukso]);
    }

    #[test]
    fn test_check_offline() {
        let dir = TempDir::new().unwrap();
        let holder: Address = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse().unwrap();

        let mut state = MockChainState::default();
        state.account_mut(holder).native_balance = "2000000000000000000".parse().unwrap();
        let state_path = dir.path().join("ethereum.json");
        fs::write(&state_path, serde_json::to_string(&state).unwrap()).unwrap();

        let lock_path = dir.path().join("lock.json");
        fs::write(
            &lock_path,
            r#"{
                "fulfillment": "all",
                "categories": [{
                    "category_type": "ethereum_profile",
                    "enabled": true,
                    "config": {
                        "fulfillment": "all",
                        "requirements": [{"type": "eth_balance", "min": "1000000000000000000"}]
                    }
                }]
            }"#,
        )
        .unwrap();

        let status = check(
            &dir.path().join("missing.json"),
            &lock_path,
            vec![("ethereum_profile".to_string(), holder)],
            OfflineState {
                ethereum: Some(&state_path),
                lukso: None,
            },
        )
        .unwrap();

        assert!(status.can_comment);
        assert_eq!(status.categories[0].state, CategoryState::Passed);
    }
}
