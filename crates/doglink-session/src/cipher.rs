//! Rolling-key XOR stream cipher.
//!
//! Byte `i` of a message is XORed with `key[(index + i) % 32]` and the index
//! then moves past every byte used. Encryption and decryption are the same
//! operation, so the FARMER and DOG stay in step only while neither side
//! drops a command.

use std::fmt;

use doglink_frame::packet::ENCRYPTION_KEY_LEN;

use crate::error::{Result, SessionError};

pub const KEY_LEN: usize = ENCRYPTION_KEY_LEN;

/// A 32-byte cipher key.
pub type Key = [u8; KEY_LEN];

/// XOR `data` against `key` starting at `index`.
///
/// Returns the transformed bytes and the index for the next message.
pub fn decode_stream(key: &Key, index: usize, data: &[u8]) -> (Vec<u8>, usize) {
    let out = data
        .iter()
        .enumerate()
        .map(|(i, byte)| key[(index + i) % KEY_LEN] ^ byte)
        .collect();
    (out, (index + data.len()) % KEY_LEN)
}

/// Key plus current stream position.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamCipher {
    key: Key,
    index: usize,
}

impl StreamCipher {
    pub fn new(key: Key) -> Self {
        Self { key, index: 0 }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: Key = key.try_into().map_err(|_| SessionError::KeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        })?;
        Ok(Self::new(key))
    }

    /// Current key offset, always below 32.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Transform `data` and advance the stream position.
    pub fn apply(&mut self, data: &[u8]) -> Vec<u8> {
        let (out, next) = decode_stream(&self.key, self.index, data);
        self.index = next;
        out
    }

    /// Restart the key stream at offset 0.
    pub fn reset(&mut self) -> usize {
        self.index = 0;
        self.index
    }
}

// Key material stays out of logs.
impl fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCipher")
            .field("key", &"<redacted>")
            .field("index", &self.index)
            .finish()
    }
}
