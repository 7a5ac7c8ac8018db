use crate::cells::CellStore;
use crate::consts::{DEFAULT_HASH_OCTETS, DEFAULT_ID_OCTETS, DEFAULT_KEY_HASHES};
use crate::errors::{IbfError, Result};
use crate::filter::Filter;
use crate::hashing::{default_key_hashes, Blake3Check, CheckHash, KeyHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Construction options for a [`Filter`]. Validated by `Filter::new`.
#[derive(Clone, Default)]
pub struct FilterConfig {
    pub cell_count: usize,
    pub id_sum_octets: usize,
    pub hash_sum_octets: usize,
    pub check_hash: Option<Arc<dyn CheckHash>>,
    pub key_hashes: Vec<Arc<dyn KeyHash>>,
}

impl FilterConfig {
    pub fn new(cell_count: usize, id_sum_octets: usize, hash_sum_octets: usize) -> Self {
        Self { cell_count, id_sum_octets, hash_sum_octets, ..Default::default() }
    }

    pub fn check_hash(mut self, h: impl CheckHash + 'static) -> Self {
        self.check_hash = Some(Arc::new(h));
        self
    }

    pub fn key_hash(mut self, h: impl KeyHash + 'static) -> Self {
        self.key_hashes.push(Arc::new(h));
        self
    }

    pub fn key_hashes(mut self, hs: impl IntoIterator<Item = Arc<dyn KeyHash>>) -> Self {
        self.key_hashes.extend(hs);
        self
    }

    pub(crate) fn validate(self) -> Result<Shape> {
        fn invalid(option: &str, why: &str) -> IbfError {
            IbfError::Configuration(format!("invalid {option}: {why}"))
        }
        if self.cell_count == 0 { return Err(invalid("cell_count", "must be positive")); }
        if self.id_sum_octets == 0 { return Err(invalid("id_sum_octets", "must be positive")); }
        if self.hash_sum_octets == 0 { return Err(invalid("hash_sum_octets", "must be positive")); }
        let check_hash = self.check_hash.ok_or_else(|| invalid("check_hash", "missing"))?;
        if self.key_hashes.is_empty() { return Err(invalid("key_hashes", "at least one is required")); }
        if CellStore::byte_len(self.cell_count, self.id_sum_octets, self.hash_sum_octets).is_none() {
            return Err(invalid("cell_count", "filter size overflows usize"));
        }
        Ok(Shape {
            cell_count: self.cell_count,
            id_sum_octets: self.id_sum_octets,
            hash_sum_octets: self.hash_sum_octets,
            check_hash,
            key_hashes: self.key_hashes,
        })
    }
}

impl fmt::Debug for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterConfig")
            .field("cell_count", &self.cell_count)
            .field("id_sum_octets", &self.id_sum_octets)
            .field("hash_sum_octets", &self.hash_sum_octets)
            .field("check_hash", &self.check_hash.as_ref().map(|_| "<fn>"))
            .field("key_hashes", &self.key_hashes.len())
            .finish()
    }
}

/// Validated, immutable configuration shared by a filter and its clones.
pub(crate) struct Shape {
    pub cell_count: usize,
    pub id_sum_octets: usize,
    pub hash_sum_octets: usize,
    pub check_hash: Arc<dyn CheckHash>,
    pub key_hashes: Vec<Arc<dyn KeyHash>>,
}

/// Serializable description of a filter on the default hash family
/// (BLAKE3 check hash, seeded XXH3 key hashes). Two peers holding equal
/// params build filters whose buffers can be subtracted from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    pub cell_count: usize,
    pub id_sum_octets: usize,
    pub hash_sum_octets: usize,
    pub key_hash_count: usize,
    #[serde(default)]
    pub seed: u64,
}

impl FilterParams {
    pub fn new(cell_count: usize) -> Self {
        Self {
            cell_count,
            id_sum_octets: DEFAULT_ID_OCTETS,
            hash_sum_octets: DEFAULT_HASH_OCTETS,
            key_hash_count: DEFAULT_KEY_HASHES,
            seed: 0,
        }
    }

    /// Sized for an expected symmetric difference of `expected` identifiers:
    /// 1.5 cells per difference, never fewer cells than key hashes.
    pub fn for_difference(expected: usize) -> Self {
        let cells = expected.saturating_mul(3).saturating_add(1) / 2;
        Self::new(cells.max(DEFAULT_KEY_HASHES))
    }

    pub fn byte_len(&self) -> Option<usize> {
        CellStore::byte_len(self.cell_count, self.id_sum_octets, self.hash_sum_octets)
    }

    pub fn config(&self) -> FilterConfig {
        FilterConfig::new(self.cell_count, self.id_sum_octets, self.hash_sum_octets)
            .check_hash(Blake3Check { octets: self.hash_sum_octets })
            .key_hashes(default_key_hashes(self.cell_count, self.key_hash_count, self.seed))
    }

    pub fn build(&self) -> Result<Filter> { Filter::new(self.config()) }

    pub fn build_with_buffer(&self, buf: Vec<u8>) -> Result<Filter> {
        Filter::with_buffer(self.config(), buf)
    }
}
