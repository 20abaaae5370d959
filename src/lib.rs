//! Pagewire - a small static file server
//!
//! Core library: incremental request parsing, form decoding, and
//! range-aware responses over memory-mapped files.

pub mod auth;
pub mod buffer;
pub mod config;
pub mod http;
pub mod server;
