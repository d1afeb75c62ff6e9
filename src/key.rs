use std::{cmp::Ordering, fmt};

/// Upper bound on key length. The wire format prefixes a key with a
/// single `u8` length byte, so no key can be longer than this regardless
/// of what a particular deployment's node handlers allow.
pub const MAX_KEY_SIZE: usize = 255;

/// A delete target, a separator, or a scratch key produced mid-repair
/// (the "key to remove" / "replacement key" pair threaded through
/// `level`).
///
/// Stored as a fixed-size inline buffer rather than a `Vec<u8>` — scratch
/// keys produced during merge/level never outlive the step that produced
/// them and never need to grow past `MAX_KEY_SIZE`, so there is nothing
/// for a heap allocation to buy here.
#[derive(Clone, Copy)]
pub struct Key {
    len: u8,
    bytes: [u8; MAX_KEY_SIZE],
}

impl Key {
    pub fn from_slice(bytes: &[u8]) -> Self {
        assert!(
            bytes.len() <= MAX_KEY_SIZE,
            "key of {} bytes exceeds MAX_KEY_SIZE ({})",
            bytes.len(),
            MAX_KEY_SIZE
        );
        let mut buf = [0u8; MAX_KEY_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            len: bytes.len() as u8,
            bytes: buf,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Encode in the `{ uint8 size, byte contents[size] }` wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.len());
        out.push(self.len);
        out.extend_from_slice(self.as_bytes());
        out
    }

    /// Decode a key previously written by `encode`. Returns the key and
    /// the number of bytes consumed from `buf`.
    pub fn decode(buf: &[u8]) -> (Self, usize) {
        let len = buf[0] as usize;
        let key = Self::from_slice(&buf[1..1 + len]);
        (key, 1 + len)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "key({})", hex::encode(self.as_bytes()))
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self::from_slice(bytes)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::from_slice(s.as_bytes())
    }
}
