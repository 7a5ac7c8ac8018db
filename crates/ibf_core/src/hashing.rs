//! Pluggable hash functions for the filter, plus the default BLAKE3/XXH3 family.
//!
//! Both traits must be pure: identical input must give identical output for the
//! lifetime of every filter that holds them, or subtract/decode stop lining up.
use std::sync::Arc;

/// Fingerprint of an identifier, XOR-accumulated into each cell's hash-sum.
pub trait CheckHash: Send + Sync {
    fn digest(&self, id: &[u8]) -> Vec<u8>;
}

/// Maps an identifier to a cell index in `[0, cell_count)`.
pub trait KeyHash: Send + Sync {
    fn index(&self, id: &[u8]) -> usize;
}

impl<F> CheckHash for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn digest(&self, id: &[u8]) -> Vec<u8> { self(id) }
}

impl<F> KeyHash for F
where
    F: Fn(&[u8]) -> usize + Send + Sync,
{
    fn index(&self, id: &[u8]) -> usize { self(id) }
}

/// First `octets` bytes of the BLAKE3 extendable output.
#[derive(Clone, Copy, Debug)]
pub struct Blake3Check {
    pub octets: usize,
}

impl CheckHash for Blake3Check {
    fn digest(&self, id: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; self.octets];
        let mut h = blake3::Hasher::new();
        h.update(id);
        h.finalize_xof().fill(&mut out);
        out
    }
}

/// Seeded XXH3 reduced into the cell window `[start, start + len)`.
#[derive(Clone, Copy, Debug)]
pub struct Xxh3KeyHash {
    pub seed: u64,
    pub start: usize,
    pub len: usize,
}

impl KeyHash for Xxh3KeyHash {
    #[inline]
    fn index(&self, id: &[u8]) -> usize {
        let h = xxhash_rust::xxh3::xxh3_64_with_seed(id, self.seed);
        self.start + (h % self.len as u64) as usize
    }
}

/// `j * cells / k` without intermediate overflow; `j <= k` keeps the result `<= cells`.
#[inline]
fn window_edge(j: usize, cells: usize, k: usize) -> usize {
    (j as u128 * cells as u128 / k as u128) as usize
}

/// `k` key hashes seeded `seed, seed+1, ...`.
///
/// With `cells >= k` the cell range is split into `k` contiguous windows, one per
/// hash, so an identifier always lands on `k` distinct cells. Smaller filters fall
/// back to every hash spanning all cells.
pub fn default_key_hashes(cells: usize, k: usize, seed: u64) -> Vec<Arc<dyn KeyHash>> {
    let partitioned = k > 0 && cells >= k;
    (0..k)
        .map(|j| {
            let (start, len) = if partitioned {
                let start = window_edge(j, cells, k);
                let end = window_edge(j + 1, cells, k);
                (start, end - start)
            } else {
                (0, cells)
            };
            Arc::new(Xxh3KeyHash { seed: seed.wrapping_add(j as u64), start, len }) as Arc<dyn KeyHash>
        })
        .collect()
}
