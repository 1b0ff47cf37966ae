//! `alderd` — the alder transparency log daemon.
//!
//! Binary entrypoint that wires storage, the sequencer, and the CT
//! HTTP front-end into a running log node.
//!
//! # Usage
//!
//! ```text
//! alderd start                            # start the log node
//! alderd start -c alder.toml              # start with a config file
//! alderd start -d ./log2 -l 127.0.0.1:7962  # second instance
//! alderd start --memory                   # no disk persistence
//! alderd status                           # show the latest tree head
//! alderd sign-root                        # force a fresh tree head
//! ```

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alder_ct::{CertPool, CtConfig, CtServer, CtServerConfig, StaticPoolValidator, StorageBackend};
use alder_merkle::TreeHasher;
use alder_sequencer::{Sequencer, SequencerTuning};
use alder_storage::{FjallLogStorage, LogReader as _, LogStorage, MemoryLogStorage};
use alder_types::{Ed25519Signer, Signer, SystemTimeSource};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "alderd", version, about = "Alder transparency log daemon")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the log node.
    Start {
        /// Override data directory (useful for running multiple instances).
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Override the CT API listen address (e.g. "127.0.0.1:6962").
        #[arg(short = 'l', long)]
        listen_addr: Option<String>,

        /// Override the trusted-roots PEM bundle.
        #[arg(short, long)]
        roots: Option<PathBuf>,

        /// Run fully in-memory (no disk persistence).
        #[arg(short, long)]
        memory: bool,
    },

    /// Show the latest signed tree head and queue depth.
    Status,

    /// Force a fresh signed tree head on an idle log.
    SignRoot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    telemetry::init(&config.log.level);

    match cli.command {
        Commands::Start {
            data_dir,
            listen_addr,
            roots,
            memory,
        } => {
            // CLI args override config file values.
            if let Some(dir) = data_dir {
                config.node.data_dir = dir;
            }
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            if let Some(path) = roots {
                config.ct.roots_pem_file = Some(path);
            }
            if memory {
                config.storage.backend = "memory".to_string();
            }
            cmd_start(config).await
        }
        Commands::Status => cmd_status(&config),
        Commands::SignRoot => cmd_sign_root(&config),
    }
}

// -----------------------------------------------------------------------
// alderd start
// -----------------------------------------------------------------------

async fn cmd_start(config: CliConfig) -> Result<()> {
    info!("starting alderd");
    info!(
        data_dir = %config.node.data_dir.display(),
        listen_addr = %config.node.listen_addr,
        backend = %config.storage.backend,
        log_id = config.log_id(),
        batch_limit = config.batch_limit(),
        "node configuration"
    );

    let memory_mode = config.storage.backend == "memory";

    if !memory_mode {
        std::fs::create_dir_all(&config.node.data_dir)
            .context("failed to create data directory")?;
    }

    // --- Log signing key ---
    let signer = if memory_mode {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        info!("generated ephemeral log key (memory mode)");
        Arc::new(Ed25519Signer::from_seed(&seed))
    } else {
        Arc::new(load_or_create_signing_key(&config.node.data_dir)?)
    };
    info!(key_id = %hex::encode(signer.key_id()), "log identity");

    // --- Storage ---
    let storage: Arc<dyn LogStorage> = if memory_mode {
        info!("using in-memory log storage");
        Arc::new(MemoryLogStorage::new(config.log_id()))
    } else {
        let store_path = config.node.data_dir.join("log");
        info!(path = %store_path.display(), "using fjall log storage");
        Arc::new(
            FjallLogStorage::open(&store_path, config.log_id())
                .context("failed to open log storage")?,
        )
    };

    // --- Trusted roots ---
    let mut pool = CertPool::new();
    match &config.ct.roots_pem_file {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read roots bundle {}", path.display()))?;
            let added = pool
                .add_pem(&pem)
                .map_err(|e| anyhow::anyhow!("failed to parse roots bundle: {e}"))?;
            info!(count = added, path = %path.display(), "loaded trusted roots");
        }
        None => {
            warn!("no trusted roots configured, all submissions will be rejected");
        }
    }
    let roots = Arc::new(pool);

    // --- Sequencer ---
    let time_source = Arc::new(SystemTimeSource);
    let sequencer = Arc::new(Sequencer::new(
        TreeHasher,
        time_source.clone(),
        storage.clone(),
        signer.clone(),
    ));
    let tuning = SequencerTuning {
        batch_limit: config.batch_limit(),
        tick: config.tick(),
        max_root_age: config.max_root_age(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sequencer_task = tokio::spawn(alder_sequencer::run(
        sequencer,
        tuning,
        shutdown_rx,
    ));

    // --- CT HTTP API ---
    let server = CtServer::new(CtServerConfig {
        backend: Arc::new(StorageBackend::new(storage)),
        validator: Arc::new(StaticPoolValidator::new(roots.clone())),
        roots,
        signer,
        time_source,
        config: CtConfig {
            rpc_timeout: config.rpc_timeout(),
            max_get_entries: config.max_get_entries(),
        },
    });

    info!(addr = %config.node.listen_addr, "CT API ready");
    server
        .serve_with_shutdown(&config.node.listen_addr, shutdown_signal())
        .await
        .context("CT server failed")?;

    // --- Graceful shutdown sequence ---
    let _ = shutdown_tx.send(true);
    let _ = sequencer_task.await;

    info!("shutdown complete");
    Ok(())
}

// -----------------------------------------------------------------------
// Signal handling
// -----------------------------------------------------------------------

/// Wait for a SIGTERM or SIGINT (Ctrl-C) signal.
///
/// On the first signal, the returned future resolves and initiates
/// graceful shutdown. If a second signal arrives while shutdown is in
/// progress, the process exits immediately.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT (Ctrl-C), initiating graceful shutdown"),
        () = terminate => info!("received SIGTERM, initiating graceful shutdown"),
    }

    // If a second signal arrives during shutdown, exit immediately.
    tokio::spawn(async {
        let second = async {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut term =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("failed to install second SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = term.recv() => {},
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.ok();
            }
        };
        second.await;
        warn!("received second signal during shutdown, forcing exit");
        std::process::exit(1);
    });
}

// -----------------------------------------------------------------------
// Key management
// -----------------------------------------------------------------------

/// Load or create the log's signing key seed at `data_dir/log.key`.
///
/// On first run, generates a random 32-byte seed and persists it. On
/// subsequent runs, loads the existing seed so the log identity is stable
/// across restarts.
fn load_or_create_signing_key(data_dir: &Path) -> Result<Ed25519Signer> {
    let key_path = data_dir.join("log.key");
    if key_path.exists() {
        let bytes = std::fs::read(&key_path).context("failed to read log.key")?;
        anyhow::ensure!(bytes.len() == 32, "log.key must be exactly 32 bytes");
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        let signer = Ed25519Signer::from_seed(&seed);
        info!(key_id = %hex::encode(signer.key_id()), "loaded existing log key");
        Ok(signer)
    } else {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        std::fs::write(&key_path, seed).context("failed to write log.key")?;
        let signer = Ed25519Signer::from_seed(&seed);
        info!(
            path = %key_path.display(),
            key_id = %hex::encode(signer.key_id()),
            "generated new log key"
        );
        Ok(signer)
    }
}

// -----------------------------------------------------------------------
// alderd status
// -----------------------------------------------------------------------

fn cmd_status(config: &CliConfig) -> Result<()> {
    let store_path = config.node.data_dir.join("log");
    let storage = FjallLogStorage::open(&store_path, config.log_id()).map_err(|e| {
        anyhow::anyhow!(
            "cannot open log storage at {} ({e}). Has the node run yet?",
            store_path.display(),
        )
    })?;

    let root = storage
        .snapshot()
        .map_err(|e| anyhow::anyhow!("snapshot failed: {e}"))?
        .latest_signed_log_root()
        .map_err(|e| anyhow::anyhow!("failed to read tree head: {e}"))?;

    if root.is_fresh() {
        println!("No signed tree head yet (fresh log).");
    } else {
        println!("Tree size:     {}", root.tree_size);
        println!("Tree revision: {}", root.tree_revision);
        println!("Timestamp:     {} ms", root.timestamp_millis());
        println!("Root hash:     {}", hex::encode(&root.root_hash));
    }

    let pending = storage
        .pending_count()
        .map_err(|e| anyhow::anyhow!("failed to read queue: {e}"))?;
    println!("Pending leaves: {pending}");

    Ok(())
}

// -----------------------------------------------------------------------
// alderd sign-root
// -----------------------------------------------------------------------

fn cmd_sign_root(config: &CliConfig) -> Result<()> {
    let store_path = config.node.data_dir.join("log");
    let storage: Arc<dyn LogStorage> = Arc::new(
        FjallLogStorage::open(&store_path, config.log_id())
            .map_err(|e| anyhow::anyhow!("cannot open log storage: {e}"))?,
    );
    let signer = Arc::new(load_or_create_signing_key(&config.node.data_dir)?);

    let sequencer = Sequencer::new(
        TreeHasher,
        Arc::new(SystemTimeSource),
        storage.clone(),
        signer,
    );
    sequencer
        .sign_root()
        .map_err(|e| anyhow::anyhow!("sign-root failed: {e}"))?;

    let root = storage
        .snapshot()
        .map_err(|e| anyhow::anyhow!("snapshot failed: {e}"))?
        .latest_signed_log_root()
        .map_err(|e| anyhow::anyhow!("failed to read tree head: {e}"))?;
    println!(
        "Signed tree head: size {} revision {}",
        root.tree_size, root.tree_revision
    );

    Ok(())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_start_flags() {
        let cli = Cli::try_parse_from([
            "alderd",
            "start",
            "--data-dir",
            "/tmp/alder",
            "--listen-addr",
            "127.0.0.1:7000",
            "--memory",
        ])
        .expect("CLI should parse");

        match cli.command {
            Commands::Start {
                data_dir,
                listen_addr,
                memory,
                ..
            } => {
                assert_eq!(data_dir, Some(PathBuf::from("/tmp/alder")));
                assert_eq!(listen_addr.as_deref(), Some("127.0.0.1:7000"));
                assert!(memory);
            }
            _ => panic!("expected Start command"),
        }
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::try_parse_from(["alderd", "status", "-c", "alder.toml"])
            .expect("CLI should parse");
        assert_eq!(cli.config, Some(PathBuf::from("alder.toml")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_signing_key_persistence() {
        let dir = tempfile::tempdir().unwrap();

        let first = load_or_create_signing_key(dir.path()).unwrap();
        let second = load_or_create_signing_key(dir.path()).unwrap();

        assert_eq!(first.key_id(), second.key_id());
    }

    #[test]
    fn test_signing_key_rejects_bad_length() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("log.key"), [0u8; 7]).unwrap();
        assert!(load_or_create_signing_key(dir.path()).is_err());
    }
}
