//! Packed cell storage: one byte buffer, three fixed regions.
//!
//! Layout (this is also the wire format):
//!   counts   = cells * i32 (LE)
//!   id_sums  = cells * id_octets
//!   hash_sums= cells * hash_octets

use crate::consts::COUNT_BYTES;
use crate::errors::{IbfError, Result};
use crate::utils::{get_i32, is_zero, put_i32, xor_into};
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct CellStore {
    buf: Vec<u8>,
    cells: usize,
    id_octets: usize,
    hash_octets: usize,
    id_off: usize,
    hash_off: usize,
}

impl CellStore {
    /// Total buffer length for the given shape, `None` on overflow.
    pub fn byte_len(cells: usize, id_octets: usize, hash_octets: usize) -> Option<usize> {
        let counts = cells.checked_mul(COUNT_BYTES)?;
        let ids = cells.checked_mul(id_octets)?;
        let hashes = cells.checked_mul(hash_octets)?;
        counts.checked_add(ids)?.checked_add(hashes)
    }

    pub fn zeroed(cells: usize, id_octets: usize, hash_octets: usize) -> Result<Self> {
        let len = Self::byte_len(cells, id_octets, hash_octets)
            .ok_or_else(|| IbfError::Configuration("filter size overflows usize".into()))?;
        Self::from_bytes(cells, id_octets, hash_octets, vec![0u8; len])
    }

    /// Adopt an existing buffer. Its length must match the shape exactly.
    pub fn from_bytes(cells: usize, id_octets: usize, hash_octets: usize, buf: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(cells, id_octets, hash_octets)
            .ok_or_else(|| IbfError::Configuration("filter size overflows usize".into()))?;
        if buf.len() != expected {
            return Err(IbfError::Configuration(format!(
                "wrong size buffer: expected {expected} bytes, received {} bytes",
                buf.len()
            )));
        }
        let id_off = cells * COUNT_BYTES;
        let hash_off = id_off + cells * id_octets;
        Ok(Self { buf, cells, id_octets, hash_octets, id_off, hash_off })
    }

    #[inline] pub fn cells(&self) -> usize { self.cells }
    #[inline] pub fn id_octets(&self) -> usize { self.id_octets }
    #[inline] pub fn hash_octets(&self) -> usize { self.hash_octets }

    #[inline]
    pub fn count(&self, i: usize) -> i32 {
        let off = i * COUNT_BYTES;
        get_i32(&self.buf[off..off + COUNT_BYTES])
    }

    #[inline]
    pub fn id_sum(&self, i: usize) -> &[u8] {
        let off = self.id_off + i * self.id_octets;
        &self.buf[off..off + self.id_octets]
    }

    #[inline]
    pub fn hash_sum(&self, i: usize) -> &[u8] {
        let off = self.hash_off + i * self.hash_octets;
        &self.buf[off..off + self.hash_octets]
    }

    /// The cell update primitive shared by insert/remove, subtract and peeling.
    /// Counts wrap like the fixed-width 32-bit cells they are.
    pub(crate) fn apply(&mut self, i: usize, delta: i32, id: &[u8], digest: &[u8]) {
        assert!(i < self.cells, "cell {i} out of range ({} cells)", self.cells);
        let off = i * COUNT_BYTES;
        let slot = &mut self.buf[off..off + COUNT_BYTES];
        let next = get_i32(slot).wrapping_add(delta);
        put_i32(slot, next);

        let off = self.id_off + i * self.id_octets;
        xor_into(&mut self.buf[off..off + self.id_octets], id);

        let off = self.hash_off + i * self.hash_octets;
        xor_into(&mut self.buf[off..off + self.hash_octets], digest);
    }

    #[inline]
    pub fn is_zero_cell(&self, i: usize) -> bool {
        self.count(i) == 0 && is_zero(self.id_sum(i)) && is_zero(self.hash_sum(i))
    }

    pub fn as_bytes(&self) -> &[u8] { &self.buf }
    pub fn into_bytes(self) -> Vec<u8> { self.buf }
}

impl fmt::Debug for CellStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellStore")
            .field("cells", &self.cells)
            .field("id_octets", &self.id_octets)
            .field("hash_octets", &self.hash_octets)
            .field("bytes", &self.buf.len())
            .finish()
    }
}
