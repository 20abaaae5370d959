//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.1 message engine with support for
//! keep-alive connections, form bodies and single byte-range replies.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The main connection handler implementing the request-response state machine
//! - **`parser`**: Incremental request parser fed from a byte buffer
//! - **`form`**: Decoding of urlencoded and multipart form bodies
//! - **`request`**: HTTP request representation
//! - **`response`**: Status table and the file-backed response builder
//! - **`range`**: Range header parsing and page-aligned windows
//! - **`mapping`**: Memory mappings of served files
//! - **`etag`**: File version validators
//! - **`writer`**: Writes header bytes and the mapped body to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Feed bytes to the parser until a request is complete
//!        └──────┬──────┘
//!               │ Request received            Malformed
//!               ▼                                 │
//!        ┌──────────────────┐            ┌────────▼────────┐
//!        │   Processing     │            │    Rejecting    │ ← 400 page
//!        └──────┬───────────┘            └────────┬────────┘
//!               │ Headers built, file mapped      │
//!               ▼                                 │
//!        ┌──────────────────┐                     │
//!        │    Writing       │ ◄───────────────────┘
//!        └──────┬───────────┘   headers, then mapped body, then release
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection, parser re-initialized)
//!               └─ Close → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pagewire::auth::MemoryCredentialStore;
//! use pagewire::server::{listener, ServerContext};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let ctx = ServerContext::new("./resources", Arc::new(MemoryCredentialStore::new()));
//!     listener::serve(listener, Arc::new(ctx)).await
//! }
//! ```

pub mod connection;
pub mod etag;
pub mod form;
pub mod mapping;
pub mod mime;
pub mod parser;
pub mod range;
pub mod request;
pub mod response;
pub mod writer;
