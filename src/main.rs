//! mintmark command-line entry point
//!
//! Stores files through the persistence helper, reads them back, and waits
//! for transactions submitted elsewhere to reach finality.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mintmark::config::Config;
use mintmark::rpc::RestNetworkClient;
use mintmark::storage::{
    HttpRemoteStore, KeyValueStore, MemoryStore, Payload, PersistenceHelper, PersistenceKeys, SledStore,
    StorageCategory,
};
use mintmark::TransactionLifecycleManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mintmark.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    dump_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Persist a file to every configured target
    Store {
        file: PathBuf,

        /// Validate the file as JSON and store it as a structured value
        #[arg(long)]
        json: bool,

        /// generic, event or certificate
        #[arg(long, default_value = "generic")]
        category: StorageCategory,
    },

    /// Read a payload back from the first target that has it
    Retrieve {
        #[arg(long)]
        remote_hash: Option<String>,

        #[arg(long)]
        digest: Option<String>,

        #[arg(long)]
        local_key: Option<String>,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show local storage usage and the backup registry size
    Stats,

    /// Poll the configured node until a transaction is finalized
    Wait {
        tx_id: String,

        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(args.verbose, config.monitoring.json_logs)?;
    config.validate().context("Invalid configuration")?;

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Store { file, json, category } => store(&config, &file, json, category).await?,
        Command::Retrieve {
            remote_hash,
            digest,
            local_key,
            out,
        } => {
            let keys = PersistenceKeys {
                remote_hash,
                encoded_digest: digest,
                local_key,
            };
            retrieve(&config, &keys, out.as_deref()).await?
        }
        Command::Stats => {
            let helper = build_persistence(&config)?;
            let stats = helper.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            println!("registry entries: {}", helper.registry().len());
        }
        Command::Wait {
            tx_id,
            timeout_ms,
            poll_interval_ms,
        } => wait(&config, &tx_id, timeout_ms, poll_interval_ms).await?,
        Command::Config => println!("{}", toml::to_string_pretty(&config.redacted())?),
    }

    if args.dump_metrics && config.monitoring.enable_metrics {
        print!("{}", mintmark::metrics::metrics().render()?);
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_filter = if verbose {
        "mintmark=debug,info"
    } else {
        "mintmark=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::from_file_with_env(path).with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        // logging is not up yet
        eprintln!("Config file '{}' not found, using defaults", path.display());
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }
}

fn build_persistence(config: &Config) -> Result<PersistenceHelper> {
    let storage = &config.storage;
    let kv: Arc<dyn KeyValueStore> = match &storage.data_dir {
        Some(dir) => Arc::new(
            SledStore::open(dir)
                .with_context(|| format!("Failed to open local store at {}", dir.display()))?
                .with_quota(storage.quota_bytes),
        ),
        None => {
            warn!("storage.data_dir not set, local targets are in-memory only");
            Arc::new(MemoryStore::with_quota(storage.quota_bytes))
        }
    };

    let remote = HttpRemoteStore::new(
        &storage.endpoint,
        &storage.api_key,
        &storage.network,
        config.network.request_timeout(),
    )
    .context("Failed to build remote store client")?;

    Ok(PersistenceHelper::new(kv).with_remote(Arc::new(remote)))
}

async fn store(config: &Config, file: &Path, json: bool, category: StorageCategory) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "payload".to_string());

    let helper = build_persistence(config)?;
    let result = if json {
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).with_context(|| format!("{} is not valid JSON", file.display()))?;
        helper.store_json(&name, &value, category).await
    } else {
        helper.store_with_category(&Payload::blob(name, bytes), category).await
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.succeeded() {
        bail!("no storage target accepted the payload");
    }
    Ok(())
}

async fn retrieve(config: &Config, keys: &PersistenceKeys, out: Option<&Path>) -> Result<()> {
    if keys.is_empty() {
        bail!("pass at least one of --remote-hash, --digest, --local-key");
    }
    let helper = build_persistence(config)?;
    let Some(bytes) = helper.retrieve(keys).await else {
        bail!("payload not found in any target");
    };

    match out {
        Some(path) => tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}

async fn wait(
    config: &Config,
    tx_id: &str,
    timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
) -> Result<()> {
    let mut lifecycle = config.transactions.lifecycle();
    if let Some(ms) = timeout_ms {
        lifecycle.timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = poll_interval_ms {
        lifecycle.poll_interval = Duration::from_millis(ms);
    }
    if lifecycle.poll_interval.is_zero() || lifecycle.poll_interval >= lifecycle.timeout {
        bail!("poll interval must be positive and shorter than the timeout");
    }

    let client = RestNetworkClient::new(&config.network.node_url, config.network.request_timeout())
        .context("Failed to build node client")?;
    let manager = TransactionLifecycleManager::new(lifecycle);

    info!(tx_id = %tx_id, node = %client.node_url(), "Waiting for confirmation");
    let record = manager.wait_for_confirmation(&client, tx_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_command() {
        let args = Args::try_parse_from(["mintmark", "store", "event.json", "--json", "--category", "event"]).unwrap();
        match args.command {
            Command::Store { file, json, category } => {
                assert_eq!(file, PathBuf::from("event.json"));
                assert!(json);
                assert_eq!(category, StorageCategory::Event);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_wait_command() {
        let args = Args::try_parse_from(["mintmark", "-v", "wait", "0xabc", "--timeout-ms", "5000"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Wait {
                tx_id,
                timeout_ms,
                poll_interval_ms,
            } => {
                assert_eq!(tx_id, "0xabc");
                assert_eq!(timeout_ms, Some(5000));
                assert_eq!(poll_interval_ms, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/mintmark.toml")).unwrap();
        assert_eq!(config.transactions.timeout_ms, 30_000);
    }

    #[test]
    fn test_build_persistence_with_sled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().join("db"));
        let helper = build_persistence(&config).unwrap();
        assert!(!helper.stats().unwrap().remote_available);
    }
}
