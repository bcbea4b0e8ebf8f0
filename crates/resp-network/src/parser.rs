//! RESP multi-bulk and inline-telnet frame parsing.
//!
//! Ported from `original_source/src/client.cc`'s `client_parse_command` /
//! `client_parse_telnet_command`, keeping the exact error-message wording
//! so client-side string matching on `-ERR Protocol error: ...` still works.
//! Argument bytes are copied out of the input buffer as they're recognized
//! (rather than returned as slices into it), the "robust alternative"
//! spec.md §9 calls out, which sidesteps the aliasing hazard of growing
//! `in_buf` while a parsed command's arguments are still referenced.

use crate::buffer::InputBuffer;
use crate::errors::expected_got;

/// Result of one `parse` call.
pub enum ParseOutcome {
    /// A full command was parsed and consumed from the buffer.
    Complete(Vec<Vec<u8>>),
    /// Not enough bytes yet; the buffer is untouched.
    NeedMore,
    /// Framing is unrecoverable. Carries the `-ERR `-ready message text
    /// (without the leading "-ERR " or trailing "\r\n").
    Malformed(String),
}

/// Parses one command from `buf`'s unconsumed bytes.
///
/// Dispatches to the RESP multi-bulk sub-parser when the first unconsumed
/// byte is `'*'`, otherwise to the inline-telnet sub-parser.
pub fn parse(buf: &mut InputBuffer) -> ParseOutcome {
    if buf.is_empty() {
        return ParseOutcome::NeedMore;
    }
    if buf.unconsumed()[0] == b'*' {
        parse_multibulk(buf)
    } else {
        parse_inline(buf)
    }
}

fn find_crlf(data: &[u8], from: usize) -> Option<usize> {
    data[from..].iter().position(|&b| b == b'\n').map(|p| from + p)
}

/// Parses an ASCII decimal integer (optional leading `-`). `None` on any
/// non-digit byte or an empty span.
fn parse_decimal(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return None;
    }
    let (neg, digits) = match bytes[0] {
        b'-' => (true, &bytes[1..]),
        _ => (false, bytes),
    };
    if digits.is_empty() {
        return None;
    }
    let mut val: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        val = val.checked_mul(10)?.checked_add((b - b'0') as i64)?;
    }
    Some(if neg { -val } else { val })
}

fn malformed(msg: &str) -> ParseOutcome {
    ParseOutcome::Malformed(format!("Protocol error: {msg}"))
}

fn parse_multibulk(buf: &mut InputBuffer) -> ParseOutcome {
    let data = buf.unconsumed();
    let mut i = 1usize; // skip '*'

    let Some(nl) = find_crlf(data, i) else {
        return ParseOutcome::NeedMore;
    };
    if nl == 0 || data[nl - 1] != b'\r' {
        return malformed("invalid multibulk length");
    }
    let Some(count) = parse_decimal(&data[i..nl - 1]) else {
        return malformed("invalid multibulk length");
    };
    if count < 0 {
        return malformed("invalid multibulk length");
    }
    i = nl + 1;

    let mut args = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if i >= data.len() {
            return ParseOutcome::NeedMore;
        }
        if data[i] != b'$' {
            return ParseOutcome::Malformed(expected_got('$', data[i] as char));
        }
        i += 1;

        let Some(nl) = find_crlf(data, i) else {
            return ParseOutcome::NeedMore;
        };
        if nl == i || data[nl - 1] != b'\r' {
            return malformed("invalid bulk length");
        }
        let Some(size) = parse_decimal(&data[i..nl - 1]) else {
            return malformed("invalid bulk length");
        };
        if size < 0 {
            return malformed("invalid bulk length");
        }
        let size = size as usize;
        i = nl + 1;

        if data.len() < i + size + 2 {
            return ParseOutcome::NeedMore;
        }
        if data[i + size] != b'\r' || data[i + size + 1] != b'\n' {
            return malformed("invalid bulk data");
        }
        args.push(data[i..i + size].to_vec());
        i += size + 2;
    }

    buf.advance(i);
    ParseOutcome::Complete(args)
}

fn parse_inline(buf: &mut InputBuffer) -> ParseOutcome {
    let data = buf.unconsumed();
    let z = data.len();
    let mut i = 0usize;
    let mut args = Vec::new();
    let mut s = 0usize;
    let mut first = true;

    while i < z {
        match data[i] {
            b'\'' | b'"' => {
                if !first {
                    return malformed("unbalanced quotes in request");
                }
                let quote = data[i];
                i += 1;
                s = i;
                let mut closed = false;
                let mut hit_eol = false;
                while i < z {
                    if data[i] == quote {
                        let ok_follow =
                            i + 1 >= z || matches!(data[i + 1], b' ' | b'\r' | b'\n');
                        if ok_follow {
                            args.push(data[s..i].to_vec());
                            closed = true;
                        } else {
                            return malformed("unbalanced quotes");
                        }
                        break;
                    }
                    if data[i] == b'\n' {
                        // The line ended before the quote closed, no further
                        // bytes on this line will ever close it.
                        hit_eol = true;
                        break;
                    }
                    i += 1;
                }
                if hit_eol {
                    return malformed("unbalanced quotes in request");
                }
                if !closed {
                    return ParseOutcome::NeedMore;
                }
                i += 1;
            }
            b'\n' => {
                if !first {
                    let e = if i > s && data[i - 1] == b'\r' { i - 1 } else { i };
                    args.push(data[s..e].to_vec());
                }
                i += 1;
                buf.advance(i);
                return ParseOutcome::Complete(args);
            }
            b' ' => {
                if !first {
                    args.push(data[s..i].to_vec());
                    first = true;
                }
                i += 1;
            }
            _ => {
                if first {
                    s = i;
                    first = false;
                }
                i += 1;
            }
        }
    }

    ParseOutcome::NeedMore
}
