//! Per-connection state: buffers, lifecycle, and scratch storage.
//!
//! Field-for-field this mirrors `original_source/src/server.h`'s `client_t`
//! (`buf`/`buf_idx`/`buf_len` -> [`crate::buffer::InputBuffer`], `args` ->
//! owned `Vec<Vec<u8>>`, `output*` -> `out_buf`/`out_offset`, `tmp_err` ->
//! dropped entirely since Rust's `String`/`format!` make the scratch-slot
//! trick unnecessary), reshaped around an owned `mio::net::TcpStream`
//! instead of a `uv_tcp_t` embedded as the struct's first field. See
//! `State::AwaitingBytes` etc. below for the state machine spec.md §4.3
//! specifies.

use std::net::SocketAddr;

use mio::Token;
use mio::net::TcpStream;

use crate::buffer::InputBuffer;

/// Lifecycle state of a [`Connection`]. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingBytes,
    Parsing,
    Executing,
    Writing,
    Closing,
}

pub struct Connection {
    pub stream: TcpStream,
    pub token: Token,
    /// Printable remote address; `[unknown]` if introspection failed.
    pub peer: String,

    pub in_buf: InputBuffer,
    pub out_buf: Vec<u8>,
    /// Bytes of `out_buf` already handed to the kernel by an outstanding
    /// (partial) write.
    pub out_offset: usize,

    pub state: State,
    /// Whether `Interest::WRITABLE` is currently registered with the poll.
    pub writable_armed: bool,
    /// Whether `Interest::READABLE` is currently registered with the poll.
    pub readable_armed: bool,
    /// Set by the parser's error path; flushed with the terminal write
    /// callback before the connection closes.
    pub closing_after_flush: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, token: Token, peer_addr: Option<SocketAddr>) -> Self {
        let peer = peer_addr.map_or_else(|| "[unknown]".to_string(), |a| a.to_string());
        Self {
            stream,
            token,
            peer,
            in_buf: InputBuffer::new(),
            out_buf: Vec::new(),
            out_offset: 0,
            state: State::AwaitingBytes,
            writable_armed: false,
            readable_armed: false,
            closing_after_flush: false,
        }
    }

    /// Clears the output buffer between commands, once a prior reply has
    /// been fully flushed (spec.md §4.1 `clear`).
    pub fn clear_output(&mut self) {
        self.out_buf.clear();
        self.out_offset = 0;
    }

    /// Bytes still waiting to be written to the kernel.
    pub fn pending_output(&self) -> &[u8] {
        &self.out_buf[self.out_offset..]
    }
}
