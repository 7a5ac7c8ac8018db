//! Set reconciliation on top of subtract + decode.
//!
//! After exchanging wire buffers, each peer subtracts the remote filter from a
//! copy of its own and peels the result: `additional` holds the identifiers only
//! the local side has, `missing` the ones only the remote side has.
use crate::decode::Decoded;
use crate::errors::Result;
use crate::filter::Filter;

impl Filter {
    /// Symmetric difference against `other`, leaving both filters untouched.
    pub fn difference(&self, other: &Filter) -> Result<Decoded> {
        let mut diff = self.clone();
        diff.subtract(other)?;
        diff.decode()
    }

    /// Like [`Filter::difference`], with the remote side given as its wire
    /// buffer. Both peers must use the same configuration and hash functions.
    pub fn reconcile_wire(&self, remote: &[u8]) -> Result<Decoded> {
        let theirs = self.with_same_config(remote.to_vec())?;
        self.difference(&theirs)
    }
}
