use anyhow::Context;
use clap::Parser;
use tracing::Level;

use statik::config::{Cli, Config};
use statik::server;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = Config::load(cli.config.as_deref())?;
    cli.apply(&mut cfg);
    cfg.validate()?;

    let level: Level = cfg
        .log_level
        .parse()
        .with_context(|| format!("invalid log level {:?}", cfg.log_level))?;
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .init();

    cfg.root = cfg
        .root
        .canonicalize()
        .with_context(|| format!("cannot serve {}", cfg.root.display()))?;

    server::listener::run(cfg)
}
