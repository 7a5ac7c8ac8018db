// crates/ibf_core/src/consts.rs

use core::mem::size_of;

/// Bytes per cell count on the wire (signed 32-bit, little-endian).
pub const COUNT_BYTES: usize = size_of::<i32>();

pub const MAGIC_ENV: &[u8; 4] = b"IBFS";
pub const VERSION: u16 = 1;

pub const HDR_SIZE: usize = 48;

pub const FLAG_ZSTD: u16 = 0x0001;

/// Upper bound on key hashes accepted from an envelope header.
pub const MAX_KEY_HASHES: usize = 64;

/// Defaults used by `FilterParams::for_difference`.
pub const DEFAULT_ID_OCTETS: usize = 32;
pub const DEFAULT_HASH_OCTETS: usize = 4;
pub const DEFAULT_KEY_HASHES: usize = 3;

const _: () = { assert!(COUNT_BYTES == 4); };
