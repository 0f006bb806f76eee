//! Grow-only message buffers
//!
//! A transport owns one receive buffer and one reply buffer for its whole
//! lifetime. Both only ever grow; bytes already in the buffer survive a
//! grow so an in-flight decode never loses data.

/// A byte buffer that never shrinks
#[derive(Debug, Clone, Default)]
pub struct MessageBuffer {
    data: Vec<u8>,
    reallocations: usize,
}

impl MessageBuffer {
    /// Creates a zeroed buffer of `len` bytes
    pub fn with_len(len: usize) -> Self {
        Self {
            data: vec![0; len],
            reallocations: 0,
        }
    }

    /// Grows the buffer to at least `len` bytes
    ///
    /// Returns true when the buffer had to grow.
    pub fn ensure(&mut self, len: usize) -> bool {
        if len <= self.data.len() {
            return false;
        }
        self.data.resize(len, 0);
        self.reallocations += 1;
        true
    }

    /// Current size in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of times the buffer grew
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The first `len` bytes, clamped to the buffer size
    pub fn head(&self, len: usize) -> &[u8] {
        &self.data[..len.min(self.data.len())]
    }
}
