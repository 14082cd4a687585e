//! statik - static file HTTP server
//!
//! Non-blocking sockets multiplexed across a fixed pool of worker threads,
//! each with its own bounded connection table.

pub mod buffer;
pub mod config;
pub mod error;
pub mod http;
pub mod server;
