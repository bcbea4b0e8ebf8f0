//! Process-wide configuration, built once in `main` (REDESIGN FLAGS item 2 /
//! SPEC_FULL.md §3): replaces `original_source/src/server.cc`'s file-scope
//! mutable globals (`db`, `nosync`, `inmem`, `readonly`, `dir`) with one
//! immutable value handed to every collaborator that needs it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;

pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub sync: bool,
    pub inmem: bool,
    pub readonly: bool,
    pub keepalive: Option<Duration>,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], args.port)),
            data_dir: PathBuf::from(args.data_dir),
            sync: args.sync,
            inmem: args.inmem,
            readonly: args.readonly,
            keepalive: args.keepalive,
        }
    }
}
