//! Connection protocol engine: RESP/inline parsing, buffered I/O, and the
//! single-inflight command dispatcher.
//!
//! This crate owns everything between "bytes arrived on a socket" and "a
//! command's argument vector is ready to hand to a caller-supplied
//! [`Handler`]", and the reverse direction, turning a handler's reply bytes
//! back into a flushed write. It knows nothing about what the arguments
//! *mean*; that's `resp-commands`' job.

mod buffer;
mod connection;
mod dispatcher;
mod encoder;
mod errors;
mod parser;
mod workers;

use std::sync::Arc;

pub use buffer::InputBuffer;
pub use connection::{Connection, State};
pub use dispatcher::{Dispatcher, DispatcherConfig, ExecutionMode};
pub use encoder::{
    write_bulk, write_byte, write_bytes, write_error, write_int, write_multibulk, write_null_bulk,
    write_simple,
};
pub use errors::{expected_got, unknown_command};
pub use parser::{parse, ParseOutcome};
pub use workers::{WorkItem, WorkerPool, WorkResult};

/// A command handler: takes a parsed argument vector, appends the RESP reply
/// to `out`. Shared across threads so the same handler can run inline on the
/// event loop or be cloned into a [`WorkerPool`]'s worker threads.
pub type Handler = Arc<dyn Fn(&[Vec<u8>], &mut Vec<u8>) + Send + Sync>;
