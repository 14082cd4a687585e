//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! the `LISTEN` environment variable, then command-line flags.
//!
//! ```yaml
//! listen_addr: "0.0.0.0:8080"
//! root: /srv/www
//! threads: 8
//! slots: 128
//! backend: poll
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// Readiness multiplexer implementation used by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Edge-triggered epoll with an exclusive listener registration.
    #[default]
    Epoll,
    /// Level-triggered `poll(2)` over the registered set.
    Poll,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub root: PathBuf,
    pub index: String,
    pub list_directories: bool,
    pub threads: usize,
    pub slots: usize,
    pub backend: Backend,
    pub chroot: bool,
    pub user: Option<String>,
    pub group: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            root: PathBuf::from("."),
            index: "index.html".to_string(),
            list_directories: true,
            threads: 4,
            slots: 64,
            backend: Backend::default(),
            chroot: false,
            user: None,
            group: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid configuration")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    /// Defaults, or the given YAML file, with `LISTEN` applied on top.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(addr) = std::env::var("LISTEN") {
            cfg.listen_addr = addr;
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threads == 0 {
            bail!("threads must be at least 1");
        }
        if self.slots == 0 {
            bail!("slots must be at least 1");
        }
        if self.index.is_empty() || self.index.contains('/') {
            bail!("index must be a plain file name, got {:?}", self.index);
        }
        Ok(())
    }

    /// File descriptors the process needs: stdio, one listener, one
    /// multiplexer per worker, every slot, plus a few per worker for files
    /// and directories opened while producing bodies.
    pub fn fd_budget(&self) -> u64 {
        let t = self.threads as u64;
        let s = self.slots as u64;
        3 + t + t * s + 5 * t
    }
}

/// Command-line flags. Every flag left out keeps the configured value.
#[derive(Debug, Default, Parser)]
#[command(name = "statik", version, about = "Serve a directory over HTTP")]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "STATIK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Directory to serve
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Index file name looked up in directories
    #[arg(long)]
    pub index: Option<String>,

    /// Answer 403 instead of listing directories without an index
    #[arg(long)]
    pub no_listing: bool,

    /// Number of worker threads
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Connection slots per worker
    #[arg(short, long)]
    pub slots: Option<usize>,

    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// chroot into the served directory before serving
    #[arg(long)]
    pub chroot: bool,

    /// Drop privileges to this user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Drop privileges to this group
    #[arg(short, long)]
    pub group: Option<String>,

    /// trace, debug, info, warn or error
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn apply(self, cfg: &mut Config) {
        if let Some(listen) = self.listen {
            cfg.listen_addr = listen;
        }
        if let Some(root) = self.root {
            cfg.root = root;
        }
        if let Some(index) = self.index {
            cfg.index = index;
        }
        if self.no_listing {
            cfg.list_directories = false;
        }
        if let Some(threads) = self.threads {
            cfg.threads = threads;
        }
        if let Some(slots) = self.slots {
            cfg.slots = slots;
        }
        if let Some(backend) = self.backend {
            cfg.backend = backend;
        }
        if self.chroot {
            cfg.chroot = true;
        }
        if self.user.is_some() {
            cfg.user = self.user;
        }
        if self.group.is_some() {
            cfg.group = self.group;
        }
        if let Some(level) = self.log_level {
            cfg.log_level = level;
        }
    }
}
