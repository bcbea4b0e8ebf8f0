//! Top-level fatal-startup error (spec.md §7's "Fatal startup" row).
//!
//! Grounded in `flux-communication::error`'s shape: a small `#[derive(Error)]`
//! enum, one variant per failure mode, `#[from]` where a lower-level error
//! maps 1:1. Everything here is terminal, `main` prints it and exits
//! non-zero, mirroring `original_source`'s `err(1, ...)` calls on bind/listen
//! /open-store failure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to open store at {path}: {source}")]
    OpenStore { path: String, #[source] source: resp_store::StoreError },

    #[error("failed to bind/listen on {addr}: {source}")]
    Bind { addr: std::net::SocketAddr, #[source] source: std::io::Error },

    #[error("event loop failed: {0}")]
    EventLoop(#[source] std::io::Error),
}
