//! services/api/src/lib.rs
//!
//! Library half of the `api` service: configuration, vendor and storage
//! adapters, and the axum HTTP surface. The binaries in `src/bin` wire these
//! together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
