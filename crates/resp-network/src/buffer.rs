//! Growable byte buffers backing each [`crate::connection::Connection`].
//!
//! Mirrors the capacity-doubling discipline `flux_network`'s `TcpStream` uses
//! for its send/receive buffers, but tracks an explicit `idx`/`len` pair on
//! the input side so a partially consumed RESP frame can be released without
//! shifting the whole buffer on every read.

/// Input buffer for one connection.
///
/// `idx` marks the start of unconsumed bytes, `len` their count. Capacity
/// only ever grows (by repeated doubling from 1), never shrinks. The spec's
/// bound is on drift (`idx`/`len` returning to 0), not on memory given back
/// to the allocator.
#[derive(Default)]
pub struct InputBuffer {
    data: Vec<u8>,
    idx: usize,
    len: usize,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new(), idx: 0, len: 0 }
    }

    #[inline]
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.idx..self.idx + self.len]
    }

    #[inline]
    pub fn idx(&self) -> usize {
        self.idx
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reserves at least `want` bytes of tail space after the unconsumed
    /// region, doubling capacity until it fits, and returns that tail as a
    /// mutable slice for the caller to read into.
    pub fn reserve_tail(&mut self, want: usize) -> &mut [u8] {
        let required = self.idx + self.len + want;
        if self.data.len() < required {
            let mut cap = self.data.len().max(1);
            while cap < required {
                cap *= 2;
            }
            self.data.resize(cap, 0);
        }
        &mut self.data[self.idx + self.len..self.idx + self.len + want]
    }

    /// Records that `n` freshly read bytes landed in the tail reserved by
    /// the most recent `reserve_tail` call.
    #[inline]
    pub fn commit(&mut self, n: usize) {
        self.len += n;
    }

    /// Releases the first `n` unconsumed bytes (a fully parsed command).
    /// Resets `idx` to 0 once the buffer runs dry, bounding drift per the
    /// buffer-drift invariant.
    pub fn advance(&mut self, n: usize) {
        resp_utils::safe_assert!(n <= self.len, "advance({n}) past {} unconsumed bytes", self.len);
        self.idx += n;
        self.len -= n;
        if self.len == 0 {
            self.idx = 0;
        }
    }
}
