//! Peeling decoder.
//!
//! PEELING scans for pure cells and retracts each recovered identifier from all
//! of its cells; FINALIZE checks that nothing is left. A failed decode never
//! returns the identifiers it managed to peel.
use crate::errors::{IbfError, Result};
use crate::filter::Filter;
use serde::{Deserialize, Serialize};

/// Both sides of a recovered symmetric difference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    /// Net count +1: present here, absent on the subtracted side.
    pub additional: Vec<Vec<u8>>,
    /// Net count -1: absent here, present on the subtracted side.
    pub missing: Vec<Vec<u8>>,
}

impl Decoded {
    pub fn len(&self) -> usize { self.additional.len() + self.missing.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Peeling,
    Finalize,
}

impl Filter {
    /// Drain the filter by peeling pure cells.
    ///
    /// On success the filter is left all-zero. On [`IbfError::DecodeFailure`]
    /// the filter keeps whatever state peeling reached; the error reports the
    /// first cell that is still non-zero.
    pub fn decode(&mut self) -> Result<Decoded> {
        let mut out = Decoded::default();
        // Bounds oscillation on fake pure cells (check-hash collisions).
        let budget = self.cell_count().saturating_mul(self.key_hash_count());
        let mut phase = Phase::Peeling;

        loop {
            match phase {
                Phase::Peeling => {
                    let worklist = self.pure_cells();
                    if worklist.is_empty() || out.len() > budget {
                        phase = Phase::Finalize;
                        continue;
                    }
                    for index in worklist {
                        // an earlier peel in this pass may have touched the cell
                        if !self.is_pure(index) {
                            continue;
                        }
                        let id = self.cells().id_sum(index).to_vec();
                        if self.cells().count(index) > 0 {
                            self.remove(&id)?;
                            out.additional.push(id);
                        } else {
                            self.insert(&id)?;
                            out.missing.push(id);
                        }
                    }
                }
                Phase::Finalize => {
                    return match self.first_nonzero_cell() {
                        None => Ok(out),
                        Some(index) => {
                            let cells = self.cells();
                            Err(IbfError::DecodeFailure {
                                index,
                                count: cells.count(index),
                                id_sum: cells.id_sum(index).to_vec(),
                                hash_sum: cells.hash_sum(index).to_vec(),
                            })
                        }
                    };
                }
            }
        }
    }
}
