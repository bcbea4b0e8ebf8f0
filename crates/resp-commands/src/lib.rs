//! RESP command catalogue (SPEC_FULL.md §4.7).
//!
//! Shaped like `camigeneral-tp-grupal-taller/redis_server/src/commands/string.rs`'s
//! one-function-per-command handlers (arity checked first, then the actual
//! work), but adapted from that crate's in-process `HashMap<String, Vec<String>>`
//! document store to dispatch against [`resp_store::Store`], and to emit
//! RESP replies directly via `resp_network::encoder` instead of building an
//! intermediate response enum.

mod glob;

use resp_network::{unknown_command, write_bulk, write_error, write_int, write_multibulk, write_null_bulk, write_simple};
use resp_store::Store;

/// How many entries one `Store::scan` call is allowed to pull back at a
/// time while a command (`KEYS`, unbounded `SCAN`) walks the whole keyspace.
/// Bounds peak memory for a single command; the caller sees the full result
/// regardless, just assembled over more round trips to the store.
const SCAN_CHUNK: usize = 1024;

/// Parses and executes one command, appending its RESP reply to `out`.
/// This is the function `resp-server` wraps into a [`resp_network::Handler`].
pub fn dispatch(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    let Some(name) = args.first() else { return };
    let name_upper = name.to_ascii_uppercase();

    match name_upper.as_slice() {
        b"PING" => cmd_ping(args, out),
        b"ECHO" => cmd_echo(args, out),
        b"GET" => cmd_get(store, args, out),
        b"SET" => cmd_set(store, args, out),
        b"DEL" => cmd_del(store, args, out),
        b"EXISTS" => cmd_exists(store, args, out),
        b"KEYS" => cmd_keys(store, args, out),
        b"SCAN" => cmd_scan(store, args, out),
        b"FLUSHALL" => cmd_flushall(store, args, out),
        b"COMMAND" => cmd_command(out),
        b"INFO" => cmd_info(out),
        _ => write_error(out, &unknown_command(name)),
    }
}

fn wrong_arity(out: &mut Vec<u8>, name: &[u8]) {
    write_error(out, &format!("wrong number of arguments for '{}' command", String::from_utf8_lossy(name).to_lowercase()));
}

fn cmd_ping(args: &[Vec<u8>], out: &mut Vec<u8>) {
    match args.len() {
        1 => write_simple(out, "PONG"),
        2 => write_bulk(out, &args[1]),
        _ => wrong_arity(out, b"ping"),
    }
}

fn cmd_echo(args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() != 2 {
        return wrong_arity(out, b"echo");
    }
    write_bulk(out, &args[1]);
}

fn cmd_get(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() != 2 {
        return wrong_arity(out, b"get");
    }
    match store.get(&args[1]) {
        Ok(Some(value)) => write_bulk(out, &value),
        Ok(None) => write_null_bulk(out),
        Err(e) => write_error(out, &e.to_string()),
    }
}

fn cmd_set(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() != 3 {
        return wrong_arity(out, b"set");
    }
    match store.put(&args[1], &args[2]) {
        Ok(()) => write_simple(out, "OK"),
        Err(e) => write_error(out, &e.to_string()),
    }
}

fn cmd_del(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() < 2 {
        return wrong_arity(out, b"del");
    }
    let mut deleted = 0i64;
    for key in &args[1..] {
        match store.delete(key) {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => return write_error(out, &e.to_string()),
        }
    }
    write_int(out, deleted);
}

fn cmd_exists(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() < 2 {
        return wrong_arity(out, b"exists");
    }
    let mut count = 0i64;
    for key in &args[1..] {
        match store.get(key) {
            Ok(Some(_)) => count += 1,
            Ok(None) => {}
            Err(e) => return write_error(out, &e.to_string()),
        }
    }
    write_int(out, count);
}

fn cmd_keys(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() != 2 {
        return wrong_arity(out, b"keys");
    }
    let pattern = &args[1];
    let matches: Vec<Vec<u8>> = match scan_all(store) {
        Ok(all) => all.into_iter().map(|(k, _)| k).filter(|k| glob::glob_match(pattern, k)).collect(),
        Err(e) => return write_error(out, &e.to_string()),
    };
    write_multibulk(out, matches.len());
    for key in matches {
        write_bulk(out, &key);
    }
}

/// `SCAN cursor [MATCH pattern] [COUNT n]`. The cursor is the last key
/// observed by the previous call (or empty/`"0"` to start); the next
/// cursor returned is `"0"` once the keyspace is exhausted, matching the
/// Redis client contract of "stop when the server hands you back 0".
fn cmd_scan(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() < 2 {
        return wrong_arity(out, b"scan");
    }
    let cursor = if args[1] == b"0" { Vec::new() } else { args[1].clone() };

    let mut pattern: Option<Vec<u8>> = None;
    let mut count: usize = SCAN_CHUNK;
    let mut i = 2;
    while i < args.len() {
        match args[i].to_ascii_uppercase().as_slice() {
            b"MATCH" if i + 1 < args.len() => {
                pattern = Some(args[i + 1].clone());
                i += 2;
            }
            b"COUNT" if i + 1 < args.len() => {
                count = std::str::from_utf8(&args[i + 1]).ok().and_then(|s| s.parse().ok()).unwrap_or(count);
                i += 2;
            }
            _ => return write_error(out, "syntax error"),
        }
    }

    let page = match store.scan(&cursor, count + 1) {
        Ok(page) => page,
        Err(e) => return write_error(out, &e.to_string()),
    };

    // `scan` is inclusive of `from`, and `from` is the previous call's last
    // key; skip it here rather than re-emitting it.
    let mut page = page;
    if !cursor.is_empty() && page.first().is_some_and(|(k, _)| k == &cursor) {
        page.remove(0);
    }

    let exhausted = page.len() <= count;
    page.truncate(count);
    let next_cursor = if exhausted { b"0".to_vec() } else { page.last().map(|(k, _)| k.clone()).unwrap_or_else(|| b"0".to_vec()) };

    let keys: Vec<Vec<u8>> = page
        .into_iter()
        .map(|(k, _)| k)
        .filter(|k| pattern.as_ref().is_none_or(|p| glob::glob_match(p, k)))
        .collect();

    write_multibulk(out, 2);
    write_bulk(out, &next_cursor);
    write_multibulk(out, keys.len());
    for key in keys {
        write_bulk(out, &key);
    }
}

fn cmd_flushall(store: &dyn Store, args: &[Vec<u8>], out: &mut Vec<u8>) {
    if args.len() != 1 {
        return wrong_arity(out, b"flushall");
    }
    match store.flush() {
        Ok(()) => write_simple(out, "OK"),
        Err(e) => write_error(out, &e.to_string()),
    }
}

/// Minimal stub so generic Redis clients complete their connection
/// handshake (SPEC_FULL.md §4.7); the full `COMMAND` introspection payload
/// is out of scope.
fn cmd_command(out: &mut Vec<u8>) {
    write_multibulk(out, 0);
}

fn cmd_info(out: &mut Vec<u8>) {
    let body = "# Server\r\nresp_mode:standalone\r\n";
    write_bulk(out, body.as_bytes());
}

fn scan_all(store: &dyn Store) -> resp_store::StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut all = Vec::new();
    let mut from = Vec::new();
    loop {
        let page = store.scan(&from, SCAN_CHUNK + 1)?;
        if page.is_empty() {
            break;
        }
        let mut page = page;
        if !from.is_empty() && page.first().is_some_and(|(k, _)| k == &from) {
            page.remove(0);
        }
        let exhausted = page.len() <= SCAN_CHUNK;
        page.truncate(SCAN_CHUNK);
        let Some(last_key) = page.last().map(|(k, _)| k.clone()) else { break };
        all.extend(page);
        if exhausted {
            break;
        }
        from = last_key;
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use resp_store::MemStore;

    use super::*;

    fn run(store: &dyn Store, cmd: &[&[u8]]) -> Vec<u8> {
        let args: Vec<Vec<u8>> = cmd.iter().map(|s| s.to_vec()).collect();
        let mut out = Vec::new();
        dispatch(store, &args, &mut out);
        out
    }

    #[test]
    fn ping_without_arg() {
        let store = MemStore::new();
        assert_eq!(run(&store, &[b"PING"]), b"+PONG\r\n");
    }

    #[test]
    fn ping_echoes_argument() {
        let store = MemStore::new();
        assert_eq!(run(&store, &[b"PING", b"hi"]), b"$2\r\nhi\r\n");
    }

    #[test]
    fn get_missing_key_is_null_bulk() {
        let store = MemStore::new();
        assert_eq!(run(&store, &[b"GET", b"missing"]), b"$-1\r\n");
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = MemStore::new();
        assert_eq!(run(&store, &[b"SET", b"k", b"v"]), b"+OK\r\n");
        assert_eq!(run(&store, &[b"GET", b"k"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn del_counts_only_existing_keys() {
        let store = MemStore::new();
        store.put(b"a", b"1").unwrap();
        assert_eq!(run(&store, &[b"DEL", b"a", b"b"]), b":1\r\n");
    }

    #[test]
    fn wrong_arity_reports_command_name() {
        let store = MemStore::new();
        assert_eq!(run(&store, &[b"GET"]), b"-ERR wrong number of arguments for 'get' command\r\n");
    }

    #[test]
    fn unknown_command_is_reported_without_protocol_prefix() {
        let store = MemStore::new();
        assert_eq!(run(&store, &[b"NOSUCHCOMMAND"]), b"-ERR unknown command 'NOSUCHCOMMAND'\r\n");
    }

    #[test]
    fn keys_glob_filters_by_pattern() {
        let store = MemStore::new();
        for k in [&b"foo"[..], b"foobar", b"bar"] {
            store.put(k, b"x").unwrap();
        }
        let out = run(&store, &[b"KEYS", b"foo*"]);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("foo"));
        assert!(text.contains("foobar"));
        assert!(!text.contains("bar\r\n"));
    }

    #[test]
    fn scan_exhausts_with_cursor_zero() {
        let store = MemStore::new();
        for k in [&b"a"[..], b"b", b"c"] {
            store.put(k, b"x").unwrap();
        }
        let out = run(&store, &[b"SCAN", b"0", b"COUNT", b"10"]);
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with("*2\r\n$1\r\n0\r\n"));
    }

    #[test]
    fn flushall_clears_store() {
        let store = MemStore::new();
        store.put(b"k", b"v").unwrap();
        assert_eq!(run(&store, &[b"FLUSHALL"]), b"+OK\r\n");
        assert_eq!(store.get(b"k").unwrap(), None);
    }
}
