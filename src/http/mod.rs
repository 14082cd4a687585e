//! HTTP protocol implementation.
//!
//! This module implements the request/response side of a static file
//! server. Every connection carries exactly one exchange and is closed
//! afterwards.
//!
//! # Architecture
//!
//! - **`parser`**: Parses the raw header block into a [`request::Request`]
//! - **`request`**: Request representation and the recognized header fields
//! - **`resolve`**: Maps a request onto the filesystem (normalization, index files,
//!   conditional and range requests)
//! - **`response`**: Response descriptor, status codes and header fields
//! - **`writer`**: Non-blocking header receipt, header serialization and buffer draining
//! - **`body`**: Resumable producers for file, directory listing and error bodies
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │ RecvHeader  │ ← read until the blank line (suspend on WouldBlock)
//!        └──────┬──────┘
//!               │ parse + resolve (errors become error responses)
//!               │ serialize header
//!               ▼
//!        ┌─────────────┐
//!        │ SendHeader  │ ← drain header (suspend on WouldBlock)
//!        └──────┬──────┘
//!               ├─ HEAD or header-only response → Closed
//!               ▼
//!        ┌─────────────┐
//!        │  SendBody   │ ← refill from producer, drain, repeat
//!        └──────┬──────┘
//!               │ producer exhausted
//!               └─ Closed
//! ```

pub mod body;
pub mod mime;
pub mod parser;
pub mod request;
pub mod resolve;
pub mod response;
pub mod writer;
