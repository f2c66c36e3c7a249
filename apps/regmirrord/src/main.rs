//! # regmirrord
//!
//! Registry mirror daemon.
//!
//! ## Usage
//! ```text
//! regmirrord [--config <path>]                  run the sync timer until SIGINT/SIGTERM
//! regmirrord [--config <path>] sync             one sync, then print the status
//! regmirrord [--config <path>] install <name>
//! regmirrord [--config <path>] update <name>
//! regmirrord [--config <path>] publish <dir>
//! ```
//!
//! ## Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MirrorConfig ──► Store::open(root)                                     │
//! │       │                                                                 │
//! │       ├──► HttpRegistry   ─┐                                            │
//! │       ├──► NpmCli          ├──► SyncEngine ──► spawn(interval)          │
//! │       ├──► LockerIndexer  ─┘        │                                   │
//! │       └──► LockerIdentity ──► IdentityCache ──► PublishCoordinator      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use regmirror_store::Store;
use regmirror_sync::{
    HttpRegistry, IdentityCache, KeyedDigest, LockerIdentity, LockerIndexer, MirrorConfig, NpmCli,
    PublishCoordinator, PublishRequest, SyncEngine, SyncOutcome,
};

/// What the process was asked to do.
#[derive(Debug)]
enum Command {
    Run,
    Sync,
    Install(String),
    Update(String),
    Publish(PathBuf),
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<(Option<PathBuf>, Command)> {
    let mut config_path = None;
    let mut rest = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config needs a path")?;
            config_path = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }

    let command = match rest.as_slice() {
        [] => Command::Run,
        [cmd] if cmd == "sync" => Command::Sync,
        [cmd, name] if cmd == "install" => Command::Install(name.clone()),
        [cmd, name] if cmd == "update" => Command::Update(name.clone()),
        [cmd, dir] if cmd == "publish" => Command::Publish(PathBuf::from(dir)),
        other => bail!("unrecognized arguments: {}", other.join(" ")),
    };
    Ok((config_path, command))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let (config_path, command) = parse_args(std::env::args().skip(1))?;

    // Load configuration
    let config = MirrorConfig::load(config_path).context("loading configuration")?;
    info!(
        root = %config.paths.root.display(),
        registry = %config.registry.base_url,
        locker = %config.locker.base_url,
        "Configuration loaded"
    );

    // Open local state
    let store = Store::open(config.layout()).await.context("opening installation root")?;
    let auth = store.auth().clone();

    // Collaborators
    let registry = Arc::new(HttpRegistry::from_config(&config)?);
    let installer = Arc::new(NpmCli::from_config(&config));
    let indexer = Arc::new(LockerIndexer::from_config(&config)?);

    let engine = Arc::new(
        SyncEngine::builder(store)
            .with_registry(registry.clone())
            .with_installer(installer.clone())
            .with_indexer(indexer)
            .build()
            .await
            .context("starting sync engine")?,
    );

    match command {
        Command::Run => {
            let handle = engine.spawn(config.sync_interval());
            info!(interval_secs = config.registry.sync_interval_secs, "Mirror running");

            shutdown_signal().await;

            handle.shutdown().await;
            engine.queue().wait_idle().await;
            info!("Mirror stopped");
        }
        Command::Sync => {
            if let SyncOutcome::Failed(e) = engine.sync().await {
                bail!("sync failed: {e}");
            }
            println!("{}", serde_json::to_string_pretty(&engine.status().await)?);
        }
        Command::Install(name) => {
            let manifest = engine.install(&name).await?;
            println!("{} {}", manifest.name, manifest.version);
        }
        Command::Update(name) => {
            let manifest = engine.update(&name).await?;
            println!("{} {}", manifest.name, manifest.version);
        }
        Command::Publish(dir) => {
            let identity = Arc::new(IdentityCache::new(Arc::new(LockerIdentity::from_config(&config)?)));
            let deriver = Arc::new(KeyedDigest::from_store(&auth).await?);
            let coordinator =
                PublishCoordinator::new(engine.clone(), identity, auth, registry, installer, deriver)
                    .with_settings(config.publish.clone());

            let report = coordinator.publish(PublishRequest::new(dir)).await?;
            println!("{} {}", report.name, report.version);
            engine.queue().wait_idle().await;
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<(Option<PathBuf>, Command)> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse(&[]).unwrap(), (None, Command::Run)));
        assert!(matches!(parse(&["sync"]).unwrap().1, Command::Sync));
        assert!(matches!(parse(&["install", "links"]).unwrap().1, Command::Install(n) if n == "links"));
        assert!(matches!(parse(&["publish", "/tmp/app"]).unwrap().1, Command::Publish(_)));

        let (path, command) = parse(&["--config", "/etc/mirror.toml", "update", "links"]).unwrap();
        assert_eq!(path, Some(PathBuf::from("/etc/mirror.toml")));
        assert!(matches!(command, Command::Update(n) if n == "links"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse(&["install"]).is_err());
        assert!(parse(&["frobnicate", "x"]).is_err());
        assert!(parse(&["--config"]).is_err());
    }
}
