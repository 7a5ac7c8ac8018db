//! The filter itself: mutation, membership queries and cell-wise subtraction.
use crate::cells::CellStore;
use crate::config::{FilterConfig, Shape};
use crate::errors::{IbfError, Result};
use std::fmt;
use std::sync::Arc;

/// Invertible Bloom filter over fixed-width byte identifiers.
///
/// `Clone` copies the cell buffer and shares only the (immutable) configuration,
/// so a clone can be mutated independently of the original.
#[derive(Clone)]
pub struct Filter {
    shape: Arc<Shape>,
    store: CellStore,
}

impl Filter {
    /// Fresh, zeroed filter.
    pub fn new(config: FilterConfig) -> Result<Self> {
        let shape = config.validate()?;
        let store = CellStore::zeroed(shape.cell_count, shape.id_sum_octets, shape.hash_sum_octets)?;
        Ok(Self { shape: Arc::new(shape), store })
    }

    /// Filter over a caller-supplied wire buffer of exactly the configured length.
    pub fn with_buffer(config: FilterConfig, buf: Vec<u8>) -> Result<Self> {
        let shape = config.validate()?;
        let store = CellStore::from_bytes(shape.cell_count, shape.id_sum_octets, shape.hash_sum_octets, buf)?;
        Ok(Self { shape: Arc::new(shape), store })
    }

    /// Construct and insert every identifier of `ids`.
    pub fn summarize<I, T>(config: FilterConfig, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut f = Self::new(config)?;
        for id in ids {
            f.insert(id.as_ref())?;
        }
        Ok(f)
    }

    /// A zeroed filter sharing this one's configuration.
    pub fn empty_like(&self) -> Result<Self> {
        let store = CellStore::zeroed(self.cell_count(), self.id_sum_octets(), self.hash_sum_octets())?;
        Ok(Self { shape: self.shape.clone(), store })
    }

    /// This filter's configuration over another peer's wire buffer.
    pub fn with_same_config(&self, buf: Vec<u8>) -> Result<Self> {
        let store = CellStore::from_bytes(self.cell_count(), self.id_sum_octets(), self.hash_sum_octets(), buf)?;
        Ok(Self { shape: self.shape.clone(), store })
    }

    #[inline] pub fn cell_count(&self) -> usize { self.shape.cell_count }
    #[inline] pub fn id_sum_octets(&self) -> usize { self.shape.id_sum_octets }
    #[inline] pub fn hash_sum_octets(&self) -> usize { self.shape.hash_sum_octets }
    #[inline] pub fn key_hash_count(&self) -> usize { self.shape.key_hashes.len() }

    pub fn cells(&self) -> &CellStore { &self.store }
    pub fn as_bytes(&self) -> &[u8] { self.store.as_bytes() }
    pub fn into_bytes(self) -> Vec<u8> { self.store.into_bytes() }

    pub fn insert(&mut self, id: &[u8]) -> Result<()> { self.change(id, 1) }
    pub fn remove(&mut self, id: &[u8]) -> Result<()> { self.change(id, -1) }

    fn change(&mut self, id: &[u8], delta: i32) -> Result<()> {
        let positions = self.positions(id)?;
        let digest = self.shape.check_hash.digest(id);
        if digest.len() != self.hash_sum_octets() {
            return Err(IbfError::Argument(format!(
                "check hash returned {} bytes, expected {}",
                digest.len(),
                self.hash_sum_octets()
            )));
        }
        for index in positions {
            self.store.apply(index, delta, id, &digest);
        }
        Ok(())
    }

    /// All k cell indices of `id`, validated before anything is touched.
    fn positions(&self, id: &[u8]) -> Result<Vec<usize>> {
        if id.len() != self.id_sum_octets() {
            return Err(IbfError::Argument(format!(
                "identifier is {} bytes, expected {}",
                id.len(),
                self.id_sum_octets()
            )));
        }
        let cells = self.cell_count();
        self.shape
            .key_hashes
            .iter()
            .map(|h| {
                let index = h.index(id);
                if index < cells {
                    Ok(index)
                } else {
                    Err(IbfError::Argument(format!("key hash returned {index}, outside {cells} cells")))
                }
            })
            .collect()
    }

    fn every_count(&self, id: &[u8], pred: impl Fn(i32) -> bool) -> Result<bool> {
        Ok(self.positions(id)?.into_iter().all(|i| pred(self.store.count(i))))
    }

    /// Probably present: every addressed count is non-zero.
    pub fn has(&self, id: &[u8]) -> Result<bool> { self.every_count(id, |c| c != 0) }
    /// Every addressed count is positive.
    pub fn additional(&self, id: &[u8]) -> Result<bool> { self.every_count(id, |c| c > 0) }
    /// Every addressed count is negative.
    pub fn missing(&self, id: &[u8]) -> Result<bool> { self.every_count(id, |c| c < 0) }

    /// `self -= other`, cell by cell. Afterwards `self` summarizes the
    /// symmetric difference of the two identifier multisets.
    pub fn subtract(&mut self, other: &Filter) -> Result<()> {
        self.ensure_same_shape(other)?;
        for i in 0..other.cell_count() {
            let theirs = &other.store;
            self.store.apply(i, theirs.count(i).wrapping_neg(), theirs.id_sum(i), theirs.hash_sum(i));
        }
        Ok(())
    }

    pub(crate) fn ensure_same_shape(&self, other: &Filter) -> Result<()> {
        let pairs = [
            ("cell_count", self.cell_count(), other.cell_count()),
            ("id_sum_octets", self.id_sum_octets(), other.id_sum_octets()),
            ("hash_sum_octets", self.hash_sum_octets(), other.hash_sum_octets()),
        ];
        for (field, ours, theirs) in pairs {
            if ours != theirs {
                return Err(IbfError::ConfigMismatch { field, ours, theirs });
            }
        }
        Ok(())
    }

    /// Count is ±1 and the hash-sum is the check hash of the id-sum.
    pub fn is_pure(&self, i: usize) -> bool {
        let count = self.store.count(i);
        if count != 1 && count != -1 {
            return false;
        }
        self.shape.check_hash.digest(self.store.id_sum(i)) == self.store.hash_sum(i)
    }

    /// Every cell is zero (count, id-sum and hash-sum).
    pub fn is_empty(&self) -> bool {
        self.first_nonzero_cell().is_none()
    }

    pub(crate) fn first_nonzero_cell(&self) -> Option<usize> {
        (0..self.cell_count()).find(|&i| !self.store.is_zero_cell(i))
    }

    pub(crate) fn pure_cells(&self) -> Vec<usize> {
        (0..self.cell_count()).filter(|&i| self.is_pure(i)).collect()
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("cell_count", &self.cell_count())
            .field("id_sum_octets", &self.id_sum_octets())
            .field("hash_sum_octets", &self.hash_sum_octets())
            .field("key_hashes", &self.key_hash_count())
            .finish()
    }
}
