//! Startup memory padding.
//!
//! Inflates the process footprint for memory tests. The region is filled
//! once and never read again.

use std::collections::TryReserveError;

/// Byte written across the padding region.
pub const FILL_BYTE: u8 = b'*';

const MIB: usize = 1024 * 1024;

/// A filled throwaway allocation held for the life of the process.
pub struct Padding {
    region: Vec<u8>,
}

impl Padding {
    /// Allocate and fill `mb` MiB. Zero allocates nothing.
    pub fn allocate(mb: usize) -> Result<Self, TryReserveError> {
        let len = mb.saturating_mul(MIB);
        let mut region = Vec::new();
        region.try_reserve_exact(len)?;
        region.resize(len, FILL_BYTE);

        // Keep the fill from being optimized away.
        std::hint::black_box(&region);

        Ok(Self { region })
    }

    /// Size of the region in bytes.
    pub fn len(&self) -> usize {
        self.region.len()
    }
}
