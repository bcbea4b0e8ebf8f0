//! Drives a real loopback `mio` TCP connection against [`resp_network::Dispatcher`],
//! covering the literal end-to-end scenarios and ordering/closing properties.
//!
//! Shaped like `flux_network`'s `tcp_roundtrip.rs`: bind on an ephemeral
//! port, run the event loop on a background thread, talk to it with a plain
//! blocking `std::net::TcpStream` client.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use resp_network::{Dispatcher, DispatcherConfig, ExecutionMode, WorkerPool};

/// Replies `+OK\r\n` to SET, `$3\r\nbar\r\n` to GET, `+PONG\r\n` to PING.
fn echo_handler() -> resp_network::Handler {
    Arc::new(|args, out| {
        if args.is_empty() {
            return;
        }
        match args[0].to_ascii_uppercase().as_slice() {
            b"SET" => out.extend_from_slice(b"+OK\r\n"),
            b"GET" => out.extend_from_slice(b"$3\r\nbar\r\n"),
            b"PING" => out.extend_from_slice(b"+PONG\r\n"),
            _ => out.extend_from_slice(b"-ERR unknown command\r\n"),
        }
    })
}

fn spawn_inline_server() -> std::net::SocketAddr {
    let config = DispatcherConfig { bind_addr: "127.0.0.1:0".parse().unwrap(), keepalive: None };
    let mut dispatcher = Dispatcher::bind(config, ExecutionMode::Inline(echo_handler())).unwrap();
    let addr = dispatcher.local_addr().unwrap();
    thread::spawn(move || {
        let _ = dispatcher.run();
    });
    addr
}

fn read_at_least(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    while out.len() < n {
        let read = stream.read(&mut chunk).expect("read");
        if read == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..read]);
    }
    out
}

#[test]
fn e1_basic_set() {
    let addr = spawn_inline_server();
    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap();
    assert_eq!(read_at_least(&mut client, 5), b"+OK\r\n");
}

#[test]
fn e2_inline_get_lf_only() {
    let addr = spawn_inline_server();
    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"GET foo\n").unwrap();
    assert_eq!(read_at_least(&mut client, 9), b"$3\r\nbar\r\n");
}

#[test]
fn e3_pipelined_preserves_order() {
    let addr = spawn_inline_server();
    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n").unwrap();
    assert_eq!(read_at_least(&mut client, 14), b"+PONG\r\n+PONG\r\n");
}

#[test]
fn e4_chunked_arrival_matches_e1() {
    let addr = spawn_inline_server();
    let mut client = TcpStream::connect(addr).unwrap();
    for chunk in [&b"*3\r\n"[..], b"$3\r\nSE", b"T\r\n$3\r\nfoo\r\n$3\r\nbar\r\n"] {
        client.write_all(chunk).unwrap();
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(read_at_least(&mut client, 5), b"+OK\r\n");
}

#[test]
fn e5_malformed_bulk_length_closes_connection() {
    let addr = spawn_inline_server();
    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"*1\r\n$x\r\nGET\r\n").unwrap();
    let got = read_at_least(&mut client, 1);
    assert!(got.starts_with(b"-ERR Protocol error: invalid bulk length\r\n"), "got {got:?}");

    // The server closes after flushing the error: a further read observes EOF.
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut trailing = [0u8; 16];
    let n = client.read(&mut trailing).unwrap();
    assert_eq!(n, 0, "expected EOF after malformed frame, got {n} more bytes");
}

#[test]
fn e6_quoted_inline_and_unbalanced_quotes() {
    let addr = spawn_inline_server();
    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"SET \"hello world\" 1\n").unwrap();
    assert_eq!(read_at_least(&mut client, 5), b"+OK\r\n");
    drop(client);

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"SET \"hello\n").unwrap();
    let got = read_at_least(&mut client, 1);
    assert!(got.starts_with(b"-ERR Protocol error: unbalanced quotes in request\r\n"), "got {got:?}");
}

#[test]
fn pooled_execution_is_single_inflight_per_connection() {
    // One connection sends two pipelined PING commands to a deliberately
    // slow pooled handler. A handler that sleeps briefly records (id,
    // "start"/"end") markers to a shared log; since the dispatcher only
    // re-enables reads (and so only re-parses the second pipelined command)
    // once the first command's reply has been fully flushed, the second
    // execution's "start" marker must follow the first's "end" marker even
    // though four worker threads are available to run them concurrently.
    let order: Arc<Mutex<Vec<(usize, &'static str)>>> = Arc::new(Mutex::new(Vec::new()));
    let counter = Arc::new(AtomicUsize::new(0));

    let order_for_handler = Arc::clone(&order);
    let counter_for_handler = Arc::clone(&counter);
    let handler: resp_network::Handler = Arc::new(move |args, out| {
        let id = counter_for_handler.fetch_add(1, Ordering::SeqCst);
        order_for_handler.lock().unwrap().push((id, "start"));
        thread::sleep(Duration::from_millis(15));
        order_for_handler.lock().unwrap().push((id, "end"));
        let _ = args;
        out.extend_from_slice(b"+PONG\r\n");
    });

    let pool = WorkerPool::new(4, handler);
    let config = DispatcherConfig { bind_addr: "127.0.0.1:0".parse().unwrap(), keepalive: None };
    let mut dispatcher = Dispatcher::bind(config, ExecutionMode::Pooled(pool)).unwrap();
    let addr = dispatcher.local_addr().unwrap();
    thread::spawn(move || {
        let _ = dispatcher.run();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n").unwrap();
    let got = read_at_least(&mut client, 14);
    assert_eq!(got, b"+PONG\r\n+PONG\r\n");

    let log = order.lock().unwrap();
    assert_eq!(log.len(), 4, "expected two start/end pairs, got {log:?}");
    assert_eq!(log[0], (0, "start"));
    assert_eq!(log[1], (0, "end"));
    assert_eq!(log[2], (1, "start"));
    assert_eq!(log[3], (1, "end"));
}
