//! Connection engine: worker pool, event loop and connection slots.

pub mod connection;
pub mod listener;
pub mod privilege;
pub mod queue;
pub mod table;
pub mod worker;
