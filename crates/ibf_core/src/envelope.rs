//! Envelope file format & IO for default-family filters.
//!
//! Header (LE, 48 bytes):
//!   magic[4]    = "IBFS"
//!   version[2]  = 1
//!   flags[2]    = bit0: payload is zstd-compressed
//!   cells[8]    = cell count
//!   id_oct[4]   = id-sum octets
//!   hash_oct[4] = hash-sum octets
//!   k[4]        = key hash count
//!   seed[8]     = hash family seed
//!   plen[8]     = stored payload length
//!   crc[4]      = crc32(raw wire buffer)
//!
//! Payload: the raw wire buffer (counts | id_sums | hash_sums), or its zstd frame.

use crate::config::FilterParams;
use crate::consts::{FLAG_ZSTD, HDR_SIZE, MAGIC_ENV, MAX_KEY_HASHES, VERSION};
use crate::errors::{IbfError, Result};
use crate::filter::Filter;
use crate::utils::{crc32, read_u16, read_u32, read_u64, write_u16, write_u32, write_u64};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let f = std::fs::OpenOptions::new().read(true).custom_flags(libc::O_DIRECTORY).open(parent_dir(path))?;
    f.sync_all()
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> { Ok(()) }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    flags: u16,
    params: FilterParams,
    payload_len: u64,
    crc: u32,
}

impl Header {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut hdr = Vec::with_capacity(HDR_SIZE);
        hdr.extend_from_slice(MAGIC_ENV);
        write_u16(&mut hdr, VERSION)?;
        write_u16(&mut hdr, self.flags)?;
        write_u64(&mut hdr, self.params.cell_count as u64)?;
        write_u32(&mut hdr, narrow(self.params.id_sum_octets)?)?;
        write_u32(&mut hdr, narrow(self.params.hash_sum_octets)?)?;
        write_u32(&mut hdr, narrow(self.params.key_hash_count)?)?;
        write_u64(&mut hdr, self.params.seed)?;
        write_u64(&mut hdr, self.payload_len)?;
        write_u32(&mut hdr, self.crc)?;
        debug_assert_eq!(hdr.len(), HDR_SIZE);
        Ok(hdr)
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HDR_SIZE || &bytes[0..4] != MAGIC_ENV { return Err(IbfError::BadHeader); }
        let mut cur = Cursor::new(&bytes[4..HDR_SIZE]);
        if read_u16(&mut cur)? != VERSION { return Err(IbfError::BadHeader); }
        let flags = read_u16(&mut cur)?;
        let cell_count = widen(read_u64(&mut cur)?)?;
        let id_sum_octets = read_u32(&mut cur)? as usize;
        let hash_sum_octets = read_u32(&mut cur)? as usize;
        let key_hash_count = read_u32(&mut cur)? as usize;
        let seed = read_u64(&mut cur)?;
        let payload_len = read_u64(&mut cur)?;
        let crc = read_u32(&mut cur)?;
        if flags & !FLAG_ZSTD != 0 { return Err(IbfError::BadHeader); }
        let params = FilterParams { cell_count, id_sum_octets, hash_sum_octets, key_hash_count, seed };
        // shape must be buildable before anything is sized from it
        if cell_count == 0 || id_sum_octets == 0 || hash_sum_octets == 0 { return Err(IbfError::BadHeader); }
        if key_hash_count == 0 || key_hash_count > MAX_KEY_HASHES { return Err(IbfError::BadHeader); }
        if params.byte_len().is_none() { return Err(IbfError::BadHeader); }
        Ok(Self { flags, params, payload_len, crc })
    }
}

fn narrow(v: usize) -> Result<u32> {
    u32::try_from(v).map_err(|_| IbfError::Configuration(format!("{v} does not fit the envelope header")))
}

fn widen(v: u64) -> Result<usize> {
    usize::try_from(v).map_err(|_| IbfError::BadHeader)
}

#[cfg(feature = "zstd")]
fn compress(raw: &[u8]) -> Result<Vec<u8>> { Ok(zstd::encode_all(raw, 0)?) }
#[cfg(not(feature = "zstd"))]
fn compress(_raw: &[u8]) -> Result<Vec<u8>> {
    Err(IbfError::Configuration("built without zstd support".into()))
}

/// Inflate at most `expected + 1` bytes; any other output length is corruption.
#[cfg(feature = "zstd")]
fn decompress(stored: &[u8], expected: usize) -> Result<Vec<u8>> {
    use std::io::Read;
    let dec = zstd::stream::read::Decoder::new(stored).map_err(|_| IbfError::Corrupt)?;
    let mut raw = Vec::new();
    dec.take(expected as u64 + 1).read_to_end(&mut raw).map_err(|_| IbfError::Corrupt)?;
    if raw.len() != expected { return Err(IbfError::Corrupt); }
    Ok(raw)
}
#[cfg(not(feature = "zstd"))]
fn decompress(_stored: &[u8], _expected: usize) -> Result<Vec<u8>> { Err(IbfError::BadHeader) }

/// Serialize `filter` (built from `params`) into envelope bytes.
pub fn encode_envelope(params: &FilterParams, filter: &Filter, compressed: bool) -> Result<Vec<u8>> {
    check_params(params, filter)?;
    let raw = filter.as_bytes();
    let stored = if compressed { compress(raw)? } else { raw.to_vec() };
    let hdr = Header {
        flags: if compressed { FLAG_ZSTD } else { 0 },
        params: *params,
        payload_len: stored.len() as u64,
        crc: crc32(raw),
    };
    let mut out = hdr.to_bytes()?;
    out.extend_from_slice(&stored);
    Ok(out)
}

/// Parse envelope bytes back into params and a filter on the default hash family.
pub fn decode_envelope(bytes: &[u8]) -> Result<(FilterParams, Filter)> {
    let hdr = Header::parse(bytes)?;
    let filter = open_payload(&hdr, &bytes[HDR_SIZE..])?;
    Ok((hdr.params, filter))
}

fn check_params(params: &FilterParams, filter: &Filter) -> Result<()> {
    let pairs = [
        ("cell_count", params.cell_count, filter.cell_count()),
        ("id_sum_octets", params.id_sum_octets, filter.id_sum_octets()),
        ("hash_sum_octets", params.hash_sum_octets, filter.hash_sum_octets()),
        ("key_hash_count", params.key_hash_count, filter.key_hash_count()),
    ];
    for (field, ours, theirs) in pairs {
        if ours != theirs { return Err(IbfError::ConfigMismatch { field, ours, theirs }); }
    }
    Ok(())
}

fn open_payload(hdr: &Header, payload: &[u8]) -> Result<Filter> {
    if payload.len() as u64 != hdr.payload_len { return Err(IbfError::Corrupt); }
    let expected = hdr.params.byte_len().ok_or(IbfError::BadHeader)?;
    let raw = if hdr.flags & FLAG_ZSTD != 0 {
        decompress(payload, expected)?
    } else {
        if payload.len() != expected { return Err(IbfError::Corrupt); }
        payload.to_vec()
    };
    if crc32(&raw) != hdr.crc { return Err(IbfError::Corrupt); }
    hdr.params.build_with_buffer(raw)
}

/// Writer: stages the envelope in a temp file next to the target, then publishes atomically.
pub struct EnvelopeWriter {
    path_final: PathBuf,
    tmp: NamedTempFile,
    params: FilterParams,
    compressed: bool,
}

impl EnvelopeWriter {
    pub fn create(path: impl AsRef<Path>, params: FilterParams) -> Result<Self> {
        let path_final = path.as_ref().to_path_buf();
        let tmp = tempfile::Builder::new().prefix("ibf_env_").tempfile_in(parent_dir(&path_final))?;
        Ok(Self { path_final, tmp, params, compressed: false })
    }

    pub fn set_compressed(&mut self, on: bool) { self.compressed = on; }

    pub fn finalize(mut self, filter: &Filter) -> Result<PathBuf> {
        let bytes = encode_envelope(&self.params, filter, self.compressed)?;
        {
            let f = self.tmp.as_file_mut();
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        let _persisted = self.tmp.persist(&self.path_final)?;
        let _ = fsync_dir(&self.path_final);
        Ok(self.path_final)
    }
}

/// Reader: maps the file and validates the header up front; `load` checks the payload.
pub struct EnvelopeReader {
    _f: File,
    mmap: Mmap,
    hdr: Header,
}

impl EnvelopeReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::open(path)?;
        if f.metadata()?.len() < HDR_SIZE as u64 { return Err(IbfError::BadHeader); }
        let mmap = unsafe { Mmap::map(&f)? };
        let hdr = Header::parse(&mmap)?;
        if (mmap.len() - HDR_SIZE) as u64 != hdr.payload_len { return Err(IbfError::Corrupt); }
        Ok(Self { _f: f, mmap, hdr })
    }

    pub fn params(&self) -> FilterParams { self.hdr.params }
    pub fn is_compressed(&self) -> bool { self.hdr.flags & FLAG_ZSTD != 0 }

    pub fn load(&self) -> Result<Filter> {
        open_payload(&self.hdr, &self.mmap[HDR_SIZE..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> (FilterParams, Filter) {
        let p = FilterParams { seed: 42, ..FilterParams::new(24) };
        let f = Filter::summarize(p.config(), (0u32..10).map(|n| blake3::hash(&n.to_le_bytes()).as_bytes().to_vec()))
            .unwrap();
        (p, f)
    }

    #[test]
    fn header_is_48_bytes() {
        let (p, f) = sample();
        let bytes = encode_envelope(&p, &f, false).unwrap();
        assert_eq!(bytes.len(), HDR_SIZE + f.as_bytes().len());
        assert_eq!(&bytes[..4], b"IBFS");
        assert_eq!(&bytes[HDR_SIZE..], f.as_bytes());
    }

    #[test]
    fn file_publish_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("set.ibf");
        let (p, f) = sample();
        let mut w = EnvelopeWriter::create(&path, p).unwrap();
        w.set_compressed(true);
        w.finalize(&f).unwrap();

        let r = EnvelopeReader::open(&path).unwrap();
        assert_eq!(r.params(), p);
        assert!(r.is_compressed());
        let g = r.load().unwrap();
        assert_eq!(g.as_bytes(), f.as_bytes());
    }

    #[test]
    fn corrupt_payload_is_detected() {
        let (p, f) = sample();
        let mut bytes = encode_envelope(&p, &f, false).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(decode_envelope(&bytes), Err(IbfError::Corrupt)));
        bytes.truncate(last);
        assert!(matches!(decode_envelope(&bytes), Err(IbfError::Corrupt)));
    }

    fn forged(params: FilterParams, flags: u16, payload: &[u8], raw: &[u8]) -> Vec<u8> {
        let hdr = Header { flags, params, payload_len: payload.len() as u64, crc: crc32(raw) };
        let mut out = hdr.to_bytes().unwrap();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn unbuildable_shapes_are_rejected_before_allocation() {
        let huge = FilterParams { cell_count: 1 << 62, id_sum_octets: 1, hash_sum_octets: 1, key_hash_count: 8, seed: 0 };
        assert!(matches!(decode_envelope(&forged(huge, 0, &[], &[])), Err(IbfError::BadHeader)));

        let base = FilterParams::new(24);
        for k in [0usize, MAX_KEY_HASHES + 1, u32::MAX as usize] {
            let bad = FilterParams { key_hash_count: k, ..base };
            assert!(matches!(decode_envelope(&forged(bad, 0, &[], &[])), Err(IbfError::BadHeader)), "k={k}");
        }
        for bad in [
            FilterParams { cell_count: 0, ..base },
            FilterParams { id_sum_octets: 0, ..base },
            FilterParams { hash_sum_octets: 0, ..base },
        ] {
            assert!(matches!(decode_envelope(&forged(bad, 0, &[], &[])), Err(IbfError::BadHeader)));
        }
    }

    #[test]
    fn payload_must_match_the_declared_shape() {
        let (p, f) = sample();
        let raw = f.as_bytes();
        // consistent plen and crc, but one byte short of the buffer the params describe
        let short = &raw[..raw.len() - 1];
        assert!(matches!(decode_envelope(&forged(p, 0, short, short)), Err(IbfError::Corrupt)));
        let mut long = raw.to_vec();
        long.push(0);
        assert!(matches!(decode_envelope(&forged(p, 0, &long, &long)), Err(IbfError::Corrupt)));
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn inflated_size_must_match_the_declared_shape() {
        let (p, f) = sample();
        let raw = f.as_bytes();
        let short = &raw[..raw.len() - 1];
        let packed = compress(short).unwrap();
        assert!(matches!(decode_envelope(&forged(p, FLAG_ZSTD, &packed, short)), Err(IbfError::Corrupt)));

        let mut long = raw.to_vec();
        long.extend_from_slice(&[0u8; 4096]);
        let packed = compress(&long).unwrap();
        assert!(matches!(decode_envelope(&forged(p, FLAG_ZSTD, &packed, &long)), Err(IbfError::Corrupt)));

        assert!(matches!(decode_envelope(&forged(p, FLAG_ZSTD, b"not zstd", raw)), Err(IbfError::Corrupt)));
    }

    #[test]
    fn truncated_files_are_rejected_on_open() {
        let dir = tempdir().unwrap();
        let (p, f) = sample();
        let good = encode_envelope(&p, &f, false).unwrap();

        let empty = dir.path().join("empty.ibf");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(EnvelopeReader::open(&empty), Err(IbfError::BadHeader)));

        let stub = dir.path().join("stub.ibf");
        std::fs::write(&stub, &good[..20]).unwrap();
        assert!(matches!(EnvelopeReader::open(&stub), Err(IbfError::BadHeader)));

        let cut = dir.path().join("cut.ibf");
        std::fs::write(&cut, &good[..good.len() - 3]).unwrap();
        assert!(matches!(EnvelopeReader::open(&cut), Err(IbfError::Corrupt)));
    }

    #[test]
    fn bad_magic_and_version_are_rejected() {
        let (p, f) = sample();
        let good = encode_envelope(&p, &f, false).unwrap();
        let mut bad = good.clone();
        bad[0] = b'X';
        assert!(matches!(decode_envelope(&bad), Err(IbfError::BadHeader)));
        let mut bad = good;
        bad[4] = 9;
        assert!(matches!(decode_envelope(&bad), Err(IbfError::BadHeader)));
        assert!(matches!(decode_envelope(b"IBFS"), Err(IbfError::BadHeader)));
    }

    #[test]
    fn params_must_describe_the_filter() {
        let (p, f) = sample();
        let wrong = FilterParams { key_hash_count: 4, ..p };
        assert!(matches!(
            encode_envelope(&wrong, &f, false),
            Err(IbfError::ConfigMismatch { field: "key_hash_count", .. })
        ));
    }
}
