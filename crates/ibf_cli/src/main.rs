use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use ibf_core::{EnvelopeReader, EnvelopeWriter, Filter, FilterParams, IbfError};

#[derive(Parser)]
#[command(name = "ibf", about = "IBF CLI — summarize sets and reconcile them")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create an empty filter file
    Init {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        cells: usize,
        #[arg(long, default_value_t = 32)]
        id_octets: usize,
        #[arg(long, default_value_t = 4)]
        hash_octets: usize,
        /// number of key hashes (k)
        #[arg(long, default_value_t = 3)]
        hashes: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// store the payload zstd-compressed
        #[arg(long, default_value_t = false)]
        compress: bool,
    },

    Insert {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_name = "HEX", num_args = 1.., value_delimiter = ',')]
        id_hex: Vec<String>,
    },

    Remove {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_name = "HEX", num_args = 1.., value_delimiter = ',')]
        id_hex: Vec<String>,
    },

    /// Insert every hex id of a file (one per line)
    Summarize {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        ids: PathBuf,
    },

    Query {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_name = "HEX")]
        id_hex: String,
    },

    /// Write FILE minus OTHER to OUT (default: FILE)
    Subtract {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        other: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Peel FILE and print both sides of the difference; FILE is left as is
    Decode {
        #[arg(long)]
        file: PathBuf,
    },

    Info {
        #[arg(long)]
        file: PathBuf,
    },
}

struct Loaded {
    params: FilterParams,
    filter: Filter,
    compressed: bool,
}

fn load(path: &Path) -> Result<Loaded> {
    let r = EnvelopeReader::open(path).with_context(|| format!("open {}", path.display()))?;
    let filter = r.load().with_context(|| format!("load {}", path.display()))?;
    debug!(path = %path.display(), cells = filter.cell_count(), compressed = r.is_compressed(), "loaded filter");
    Ok(Loaded { params: r.params(), filter, compressed: r.is_compressed() })
}

fn store(path: &Path, loaded: &Loaded) -> Result<()> {
    let mut w = EnvelopeWriter::create(path, loaded.params)?;
    w.set_compressed(loaded.compressed);
    w.finalize(&loaded.filter)?;
    Ok(())
}

fn parse_id(hex_id: &str) -> Result<Vec<u8>> {
    hex::decode(hex_id.trim()).with_context(|| format!("bad hex id {hex_id:?}"))
}

#[derive(Serialize)]
struct QueryOut {
    has: bool,
    additional: bool,
    missing: bool,
}

#[derive(Serialize)]
struct DecodeOut {
    additional: Vec<String>,
    missing: Vec<String>,
}

#[derive(Serialize)]
struct InfoOut {
    #[serde(flatten)]
    params: FilterParams,
    compressed: bool,
    bytes: usize,
    nonzero_cells: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init { file, cells, id_octets, hash_octets, hashes, seed, compress } => {
            let params = FilterParams {
                cell_count: cells,
                id_sum_octets: id_octets,
                hash_sum_octets: hash_octets,
                key_hash_count: hashes,
                seed,
            };
            let filter = params.build()?;
            store(&file, &Loaded { params, filter, compressed: compress })?;
            info!(path = %file.display(), cells, hashes, "initialized filter");
            println!("init: {}", file.display());
        }
        Cmd::Insert { file, id_hex } => {
            let mut l = load(&file)?;
            for h in &id_hex {
                l.filter.insert(&parse_id(h)?)?;
            }
            store(&file, &l)?;
            info!(path = %file.display(), count = id_hex.len(), "inserted ids");
            println!("inserted: {}", id_hex.len());
        }
        Cmd::Remove { file, id_hex } => {
            let mut l = load(&file)?;
            for h in &id_hex {
                l.filter.remove(&parse_id(h)?)?;
            }
            store(&file, &l)?;
            info!(path = %file.display(), count = id_hex.len(), "removed ids");
            println!("removed: {}", id_hex.len());
        }
        Cmd::Summarize { file, ids } => {
            let text = std::fs::read_to_string(&ids).with_context(|| format!("read {}", ids.display()))?;
            let mut l = load(&file)?;
            let mut n = 0usize;
            for (lineno, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let id = parse_id(line).with_context(|| format!("{}:{}", ids.display(), lineno + 1))?;
                l.filter.insert(&id)?;
                n += 1;
            }
            store(&file, &l)?;
            info!(path = %file.display(), count = n, "summarized ids");
            println!("summarized: {n}");
        }
        Cmd::Query { file, id_hex } => {
            let l = load(&file)?;
            let id = parse_id(&id_hex)?;
            let out = QueryOut {
                has: l.filter.has(&id)?,
                additional: l.filter.additional(&id)?,
                missing: l.filter.missing(&id)?,
            };
            println!("{}", serde_json::to_string(&out)?);
        }
        Cmd::Subtract { file, other, out } => {
            let mut l = load(&file)?;
            let o = load(&other)?;
            if l.params != o.params {
                return Err(anyhow!("{} and {} use different filter params", file.display(), other.display()));
            }
            l.filter.subtract(&o.filter)?;
            let dest = out.unwrap_or_else(|| file.clone());
            store(&dest, &l)?;
            info!(from = %file.display(), other = %other.display(), out = %dest.display(), "subtracted");
            println!("subtract: {}", dest.display());
        }
        Cmd::Decode { file } => {
            let mut l = load(&file)?;
            match l.filter.decode() {
                Ok(d) => {
                    info!(additional = d.additional.len(), missing = d.missing.len(), "decoded");
                    let out = DecodeOut {
                        additional: d.additional.iter().map(hex::encode).collect(),
                        missing: d.missing.iter().map(hex::encode).collect(),
                    };
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                Err(e @ IbfError::DecodeFailure { .. }) => {
                    warn!(path = %file.display(), "decode failed: {e}");
                    return Err(anyhow!(e).context("difference exceeds filter capacity; retry with more cells"));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Cmd::Info { file } => {
            let l = load(&file)?;
            let cells = l.filter.cells();
            let nonzero_cells = (0..cells.cells()).filter(|&i| !cells.is_zero_cell(i)).count();
            let out = InfoOut {
                params: l.params,
                compressed: l.compressed,
                bytes: l.filter.as_bytes().len(),
                nonzero_cells,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
