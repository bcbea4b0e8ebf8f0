//! The event loop: accept, read, parse, execute, reply.
//!
//! Built directly on one `mio::Poll`, the way `flux_network`'s
//! `ConnectionManager`/`TcpConnector` drive every socket from a single poll
//! instance, reshaped around RESP framing and a blocking `poll.poll(...,
//! None)` call (rather than the teacher's caller-driven zero-timeout
//! `poll_with`, since this dispatcher owns its own thread instead of being
//! ticked by an outer loop) plus a `mio::Waker` so worker-pool completions
//! (spec.md §4.4.1 pooled mode) can interrupt a blocked poll the same way a
//! socket readiness event would.
//!
//! Token->connection lookup replaces the pointer-casting trick spec.md §9
//! flags in `original_source` (the first field of `client_t` was a
//! `uv_tcp_t` so a socket handle could be reinterpreted as a `client*`):
//! here every `mio::Token` is just a key into a `HashMap<Token, Connection>`.

use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, State};
use crate::encoder::write_error;
use crate::parser::{self, ParseOutcome};
use crate::workers::{WorkItem, WorkerPool};
use crate::Handler;

const LISTENER_TOKEN: Token = Token(0);
const WAKER_TOKEN: Token = Token(1);
const FIRST_CONN_TOKEN: usize = 2;

/// Read chunk size per readable event; matches `flux_network`'s `RX_BUF_SIZE`
/// choice of a generous, fixed-size staging read.
const READ_CHUNK: usize = 32 * 1024;

/// How a parsed command gets executed (spec.md §4.4.1). Chosen once at
/// startup, never per-command: "predictable latency behavior and no race
/// on the slot" per spec.md §9.
pub enum ExecutionMode {
    /// Runs the handler synchronously on the event loop thread. Only sound
    /// when the store can never block (`--inmem`).
    Inline(Handler),
    /// Posts the handler to a worker pool; the event loop keeps servicing
    /// other connections while it runs.
    Pooled(WorkerPool),
}

pub struct DispatcherConfig {
    pub bind_addr: SocketAddr,
    /// `None` disables TCP keepalive.
    pub keepalive: Option<Duration>,
}

pub struct Dispatcher {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    waker: Arc<Waker>,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    mode: ExecutionMode,
    keepalive: Option<Duration>,
}

impl Dispatcher {
    pub fn bind(config: DispatcherConfig, mode: ExecutionMode) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(config.bind_addr)?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        if let ExecutionMode::Pooled(pool) = &mode {
            pool.set_waker(Arc::clone(&waker));
        }

        Ok(Self {
            poll,
            events: Events::with_capacity(1024),
            listener,
            waker,
            connections: HashMap::new(),
            next_token: FIRST_CONN_TOKEN,
            mode,
            keepalive: config.keepalive,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the event loop until the process is killed. Never returns `Ok`.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.tick(None)?;
        }
    }

    /// Runs one iteration of the loop, blocking for at most `timeout`
    /// (or indefinitely if `None`). Exposed separately so tests can drive
    /// the loop deterministically without spawning a background thread.
    pub fn tick(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.poll.poll(&mut self.events, timeout)?;

        let tokens: Vec<Token> = self.events.iter().map(Event::token).collect();
        for token in tokens {
            match token {
                LISTENER_TOKEN => self.accept_all()?,
                WAKER_TOKEN => {}
                token => self.handle_connection_event(token),
            }
        }

        self.drain_worker_results();
        Ok(())
    }

    fn accept_all(&mut self) -> io::Result<()> {
        loop {
            let (mut stream, addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return Ok(());
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "couldn't set TCP_NODELAY");
            }
            apply_keepalive(&stream, self.keepalive);

            let token = Token(self.next_token);
            self.next_token += 1;

            if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                error!(peer = ?addr, error = %e, "couldn't register accepted connection");
                continue;
            }

            let mut conn = Connection::new(stream, token, Some(addr));
            conn.readable_armed = true;
            info!(peer = %conn.peer, "accepted connection");
            self.connections.insert(token, conn);
        }
    }

    fn handle_connection_event(&mut self, token: Token) {
        let Some(event) = self.events.iter().find(|e| e.token() == token) else { return };
        let readable = event.is_readable();
        let writable = event.is_writable();

        if writable {
            self.try_flush(token);
            if !self.connections.contains_key(&token) {
                return;
            }
        }
        if readable {
            self.do_read(token);
        }
    }

    fn do_read(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else { return };
        if !matches!(conn.state, State::AwaitingBytes | State::Parsing) {
            // Reads are logically disabled (Executing/Writing/Closing); an
            // mio readiness event that arrived anyway is simply ignored.
            return;
        }

        let tail = conn.in_buf.reserve_tail(READ_CHUNK);
        match conn.stream.read(tail) {
            Ok(0) => self.close(token),
            Ok(n) => {
                conn.in_buf.commit(n);
                self.pump(token);
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                warn!(peer = %conn.peer, error = %e, "read error");
                self.close(token);
            }
        }
    }

    /// One parse attempt against the connection's buffer, followed by
    /// whatever spec.md §4.4's pump table says to do with the outcome.
    /// Loops only to skip zero-argument inline no-ops (spec.md §4.2.2).
    fn pump(&mut self, token: Token) {
        loop {
            let Some(conn) = self.connections.get_mut(&token) else { return };
            resp_utils::safe_assert!(
                matches!(conn.state, State::AwaitingBytes | State::Parsing),
                "pump() entered with connection in {:?}, single-inflight invariant violated",
                conn.state
            );
            match parser::parse(&mut conn.in_buf) {
                ParseOutcome::Complete(args) if args.is_empty() => {
                    // No-op: re-enable reads and, if more bytes are already
                    // buffered (pipelined empty lines), keep pumping.
                    continue;
                }
                ParseOutcome::Complete(args) => {
                    conn.state = State::Executing;
                    self.set_readable(token, false);
                    if let Some(conn) = self.connections.get_mut(&token) {
                        conn.clear_output();
                    }
                    self.dispatch(token, args);
                    return;
                }
                ParseOutcome::NeedMore => {
                    conn.state = State::AwaitingBytes;
                    self.set_readable(token, true);
                    return;
                }
                ParseOutcome::Malformed(msg) => {
                    warn!(peer = %conn.peer, %msg, "malformed request");
                    write_error(&mut conn.out_buf, &msg);
                    conn.state = State::Closing;
                    conn.closing_after_flush = true;
                    self.set_readable(token, false);
                    self.try_flush(token);
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, token: Token, args: Vec<Vec<u8>>) {
        match &self.mode {
            ExecutionMode::Inline(handler) => {
                let mut out = Vec::new();
                handler(&args, &mut out);
                if let Some(conn) = self.connections.get_mut(&token) {
                    conn.out_buf = out;
                    conn.state = State::Writing;
                }
                self.try_flush(token);
            }
            ExecutionMode::Pooled(pool) => {
                pool.submit(WorkItem { token, args });
            }
        }
    }

    fn drain_worker_results(&mut self) {
        let ExecutionMode::Pooled(pool) = &self.mode else { return };
        for result in pool.drain_results() {
            if let Some(conn) = self.connections.get_mut(&result.token) {
                conn.out_buf = result.out;
                conn.state = State::Writing;
                self.try_flush(result.token);
            }
        }
    }

    /// Writes as much of `out_buf` as the kernel accepts without blocking.
    /// Mirrors `flux_network::tcp::stream::TcpStream::drain_backlog`'s
    /// loop-until-blocked shape applied to one connection's reply instead
    /// of a backlog queue.
    fn try_flush(&mut self, token: Token) {
        loop {
            let Some(conn) = self.connections.get_mut(&token) else { return };
            if conn.pending_output().is_empty() {
                break;
            }
            match conn.stream.write(conn.pending_output()) {
                Ok(0) => {
                    warn!(peer = %conn.peer, "write returned zero, disconnecting");
                    self.close(token);
                    return;
                }
                Ok(n) => conn.out_offset += n,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    self.set_writable(token, true);
                    return;
                }
                Err(e) => {
                    warn!(peer = %conn.peer, error = %e, "write error");
                    self.close(token);
                    return;
                }
            }
        }

        let Some(conn) = self.connections.get_mut(&token) else { return };
        self.set_writable(token, false);
        conn.clear_output();

        if conn.closing_after_flush {
            self.close(token);
            return;
        }

        conn.state = State::Parsing;
        self.pump(token);
    }

    fn set_readable(&mut self, token: Token, on: bool) {
        self.reregister(token, |c| c.readable_armed = on);
    }

    fn set_writable(&mut self, token: Token, on: bool) {
        self.reregister(token, |c| c.writable_armed = on);
    }

    fn reregister(&mut self, token: Token, set: impl FnOnce(&mut Connection)) {
        let Some(conn) = self.connections.get_mut(&token) else { return };
        set(conn);
        let mut interest = None;
        if conn.readable_armed {
            interest = Some(Interest::READABLE);
        }
        if conn.writable_armed {
            interest = Some(interest.map_or(Interest::WRITABLE, |i| i | Interest::WRITABLE));
        }
        let result = match interest {
            Some(interest) => self.poll.registry().reregister(&mut conn.stream, token, interest),
            None => self.poll.registry().deregister(&mut conn.stream),
        };
        if let Err(e) = result {
            warn!(peer = %conn.peer, error = %e, "couldn't update poll interest");
        }
    }

    fn close(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            debug!(peer = %conn.peer, "closed connection");
        }
    }

    /// Exposed so the worker pool can interrupt a blocked `poll.poll`.
    pub fn waker(&self) -> Arc<Waker> {
        Arc::clone(&self.waker)
    }
}

fn apply_keepalive(stream: &TcpStream, keepalive: Option<Duration>) {
    use std::os::fd::AsRawFd;
    let fd = stream.as_raw_fd();
    let Some(interval) = keepalive else {
        return;
    };

    unsafe {
        let on: libc::c_int = 1;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            std::ptr::from_ref(&on).cast(),
            core::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );

        #[cfg(target_os = "linux")]
        {
            let secs = interval.as_secs() as libc::c_int;
            libc::setsockopt(
                fd,
                libc::IPPROTO_TCP,
                libc::TCP_KEEPIDLE,
                std::ptr::from_ref(&secs).cast(),
                core::mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }
    }
}
