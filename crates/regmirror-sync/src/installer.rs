//! # npm Installer
//!
//! [`PackageInstaller`] that shells out to the package tool.
//!
//! ```text
//! install <name>   cwd = root                 npm install <name>
//! update  <name>   cwd = root                 npm update <name>
//! bump_patch dir   cwd = dir                  npm version patch
//! publish dir      cwd = root, auth via env   npm publish <dir>
//! ```
//!
//! Every child gets `npm_config_registry`; the daemon's own working
//! directory is never changed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use regmirror_core::RegistryAuth;

use crate::capability::PackageInstaller;
use crate::config::MirrorConfig;
use crate::error::{SyncError, SyncResult};

/// Package tool driven through child processes.
#[derive(Debug, Clone)]
pub struct NpmCli {
    program: String,
    root: PathBuf,
    registry: String,
}

impl NpmCli {
    pub fn new(program: impl Into<String>, root: impl Into<PathBuf>, registry: impl Into<String>) -> Self {
        NpmCli {
            program: program.into(),
            root: root.into(),
            registry: registry.into(),
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(
            config.installer.program.clone(),
            config.paths.root.clone(),
            config.registry.base_url.clone(),
        )
    }

    fn command(&self, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .current_dir(cwd)
            .env("npm_config_registry", &self.registry)
            .kill_on_drop(true);
        command
    }

    async fn run(&self, mut command: Command, args: &[&str]) -> SyncResult<()> {
        let cmdline = format!("{} {}", self.program, args.join(" "));
        debug!(command = %cmdline, "Running package tool");

        let output = command
            .args(args)
            .output()
            .await
            .map_err(|e| SyncError::CommandFailed {
                command: cmdline.clone(),
                reason: format!("failed to launch: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::CommandFailed {
                command: cmdline,
                reason: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl PackageInstaller for NpmCli {
    async fn install(&self, name: &str) -> SyncResult<()> {
        info!(package = %name, "Installing package");
        self.run(self.command(&self.root), &["install", name]).await
    }

    async fn update(&self, name: &str) -> SyncResult<()> {
        info!(package = %name, "Updating package");
        self.run(self.command(&self.root), &["update", name]).await
    }

    async fn bump_patch(&self, dir: &Path) -> SyncResult<()> {
        self.run(self.command(dir), &["version", "patch"]).await
    }

    async fn publish(&self, dir: &Path, auth: &RegistryAuth) -> SyncResult<()> {
        let mut command = self.command(&self.root);
        command
            .env("npm_config__auth", &auth.auth)
            .env("npm_config_username", &auth.username);

        let dir = dir.to_string_lossy();
        info!(dir = %dir, user = %auth.username, "Publishing package");
        self.run(command, &["publish", dir.as_ref()]).await
    }
}
