//! Per-chunk response mode selection and checksum.

/// First byte that switches a chunk into checksum mode.
pub const UPSTREAM_MARKER: u8 = b'U';

/// Checksum modulus; results are always in `0..CHECKSUM_MODULUS`.
const CHECKSUM_MODULUS: u32 = 128;

/// How a single received chunk is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Write back the chunk verbatim.
    Echo,
    /// Write back one checksum byte.
    Checksum,
}

impl Mode {
    /// Select the mode for one chunk from its first byte.
    pub fn detect(chunk: &[u8]) -> Self {
        match chunk.first() {
            Some(&UPSTREAM_MARKER) => Mode::Checksum,
            _ => Mode::Echo,
        }
    }
}

/// Sum of the chunk's byte values modulo 128.
pub fn checksum(chunk: &[u8]) -> u8 {
    let sum = chunk
        .iter()
        .fold(0u32, |s, &b| (s + u32::from(b)) % CHECKSUM_MODULUS);
    sum as u8
}

/// Response to a single chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply<'a> {
    Echo(&'a [u8]),
    Checksum([u8; 1]),
}

impl<'a> Reply<'a> {
    /// Build the reply for `chunk`.
    pub fn for_chunk(chunk: &'a [u8]) -> Self {
        match Mode::detect(chunk) {
            Mode::Echo => Reply::Echo(chunk),
            Mode::Checksum => Reply::Checksum([checksum(chunk)]),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Reply::Echo(_) => Mode::Echo,
            Reply::Checksum(_) => Mode::Checksum,
        }
    }

    /// Bytes to write back to the peer.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Reply::Echo(chunk) => *chunk,
            Reply::Checksum(byte) => &byte[..],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Mode::detect(b"hello"), Mode::Echo);
        assert_eq!(Mode::detect(b"U"), Mode::Checksum);
        assert_eq!(Mode::detect(b"Upload"), Mode::Checksum);
        assert_eq!(Mode::detect(b"u"), Mode::Echo);
        assert_eq!(Mode::detect(b"xU"), Mode::Echo);
        assert_eq!(Mode::detect(b""), Mode::Echo);
    }

    #[test]
    fn test_checksum_scenario() {
        let mut chunk = vec![b'U'];
        chunk.extend_from_slice(&[1u8; 10]);
        assert_eq!(checksum(&chunk), 0x5f);
    }

    #[test]
    fn test_checksum_wraps() {
        // 'U' (85) + 43 = 128 -> 0
        assert_eq!(checksum(&[b'U', 43]), 0);
        // high bytes count as unsigned: 85 + 255 = 340, 340 % 128 = 84
        assert_eq!(checksum(&[b'U', 0xff]), 84);
        assert!(checksum(&[0xff; 4096]) < 128);
    }

    #[test]
    fn test_checksum_matches_final_modulo() {
        let chunk: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let total: u64 = chunk.iter().map(|&b| u64::from(b)).sum();
        assert_eq!(u64::from(checksum(&chunk)), total % 128);
    }

    #[test]
    fn test_reply_bytes() {
        let reply = Reply::for_chunk(b"hello");
        assert_eq!(reply.mode(), Mode::Echo);
        assert_eq!(reply.as_bytes(), b"hello");

        let reply = Reply::for_chunk(b"UU");
        assert_eq!(reply.mode(), Mode::Checksum);
        // 85 + 85 = 170, 170 % 128 = 42
        assert_eq!(reply.as_bytes(), &[42]);
    }
}
