use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::{process, thread};

use anyhow::{Context, anyhow};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{error, info};

use crate::config::Config;
use crate::server::privilege;
use crate::server::worker::Worker;

const BACKLOG: i32 = 1024;

/// Creates the non-blocking listening socket shared by all workers.
pub fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = addr
        .to_socket_addrs()
        .with_context(|| format!("invalid listen address {addr}"))?
        .next()
        .ok_or_else(|| anyhow!("listen address {addr} did not resolve"))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .context("failed to create socket")?;
    socket.set_reuse_address(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind {addr}"))?;
    socket.listen(BACKLOG).context("failed to listen")?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Binds, drops privileges and runs the worker pool. Only returns if a
/// worker thread could not be started or panicked.
pub fn run(mut cfg: Config) -> anyhow::Result<()> {
    let listener = bind(&cfg.listen_addr)?;
    info!(
        addr = %listener.local_addr()?,
        root = %cfg.root.display(),
        threads = cfg.threads,
        slots = cfg.slots,
        "listening"
    );

    privilege::raise_fd_limit(cfg.fd_budget());
    privilege::drop_privileges(&mut cfg)?;

    let cfg = Arc::new(cfg);
    let listener = Arc::new(listener);

    let mut handles = Vec::with_capacity(cfg.threads);
    for id in 0..cfg.threads {
        let mut worker = Worker::new(id, Arc::clone(&cfg), Arc::clone(&listener))?;
        let handle = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || {
                if let Err(e) = worker.run() {
                    error!(worker = id, error = %format!("{e:#}"), "worker failed");
                    process::exit(1);
                }
            })
            .with_context(|| format!("failed to spawn worker {id}"))?;
        handles.push(handle);
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("worker thread panicked"))?;
    }

    Ok(())
}
