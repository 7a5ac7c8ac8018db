//! Invertible Bloom filters for set reconciliation.
//!
//! A [`Filter`] summarizes fixed-width identifiers in a constant-size cell
//! buffer. Subtracting a peer's filter and peeling the result recovers the exact
//! symmetric difference of the two sets, as long as it fits the filter.
pub mod consts;
pub mod errors;
pub mod utils;
pub mod hashing;
pub mod cells;
pub mod config;
pub mod filter;
pub mod decode;
pub mod reconcile;
pub mod envelope;

pub use cells::CellStore;
pub use config::{FilterConfig, FilterParams};
pub use decode::Decoded;
pub use envelope::{decode_envelope, encode_envelope, EnvelopeReader, EnvelopeWriter};
pub use errors::{IbfError, Result};
pub use filter::Filter;
pub use hashing::{default_key_hashes, Blake3Check, CheckHash, KeyHash, Xxh3KeyHash};
