//! Sequential readers for pointer and L files.
//!
//! One logical interface, two implementations: a memory-mapped cursor and
//! a plain buffered reader. The merge and the extraction sweep only ever
//! consume these files front to back, so both implementations expose a
//! `next()` cursor; which one is built follows the caller's `--mmap`
//! choice. The two are observationally identical.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use memmap2::Mmap;

/// Cursor over a `.ptable` (or spill chunk) file: host-endian `u32`
/// element offsets.
pub enum OffsetReader {
    Mapped { map: Mmap, pos: usize },
    Buffered { inner: BufReader<File>, left: usize },
}

impl OffsetReader {
    pub fn open(path: &Path, use_mmap: bool) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("unable to open pointer file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("unable to stat pointer file {}", path.display()))?
            .len();
        if len % 4 != 0 {
            bail!(
                "pointer file {} has length {len}, not a multiple of 4",
                path.display()
            );
        }
        let entries = (len / 4) as usize;
        if use_mmap && entries > 0 {
            let map = unsafe { Mmap::map(&file) }
                .with_context(|| format!("unable to mmap pointer file {}", path.display()))?;
            Ok(OffsetReader::Mapped { map, pos: 0 })
        } else {
            Ok(OffsetReader::Buffered {
                inner: BufReader::new(file),
                left: entries,
            })
        }
    }

    /// Number of entries not yet consumed.
    pub fn remaining(&self) -> usize {
        match self {
            OffsetReader::Mapped { map, pos } => map.len() / 4 - pos,
            OffsetReader::Buffered { left, .. } => *left,
        }
    }

    /// Next offset, or `None` at end of file.
    pub fn next(&mut self) -> Result<Option<u32>> {
        match self {
            OffsetReader::Mapped { map, pos } => {
                let byte = *pos * 4;
                if byte >= map.len() {
                    return Ok(None);
                }
                let raw: [u8; 4] = map[byte..byte + 4]
                    .try_into()
                    .context("truncated pointer entry")?;
                *pos += 1;
                Ok(Some(u32::from_ne_bytes(raw)))
            }
            OffsetReader::Buffered { inner, left } => {
                if *left == 0 {
                    return Ok(None);
                }
                let mut raw = [0u8; 4];
                inner
                    .read_exact(&mut raw)
                    .context("unable to read pointer entry")?;
                *left -= 1;
                Ok(Some(u32::from_ne_bytes(raw)))
            }
        }
    }
}

/// Cursor over a `.ltable` file: one `u8` LCP value per pointer entry.
pub enum LcpReader {
    Mapped { map: Mmap, pos: usize },
    Buffered { inner: BufReader<File>, left: usize },
}

impl LcpReader {
    pub fn open(path: &Path, use_mmap: bool) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("unable to open L file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("unable to stat L file {}", path.display()))?
            .len() as usize;
        if use_mmap && len > 0 {
            let map = unsafe { Mmap::map(&file) }
                .with_context(|| format!("unable to mmap L file {}", path.display()))?;
            Ok(LcpReader::Mapped { map, pos: 0 })
        } else {
            Ok(LcpReader::Buffered {
                inner: BufReader::new(file),
                left: len,
            })
        }
    }

    pub fn remaining(&self) -> usize {
        match self {
            LcpReader::Mapped { map, pos } => map.len() - pos,
            LcpReader::Buffered { left, .. } => *left,
        }
    }

    pub fn next(&mut self) -> Result<Option<u8>> {
        match self {
            LcpReader::Mapped { map, pos } => {
                if *pos >= map.len() {
                    return Ok(None);
                }
                let v = map[*pos];
                *pos += 1;
                Ok(Some(v))
            }
            LcpReader::Buffered { inner, left } => {
                if *left == 0 {
                    return Ok(None);
                }
                let mut raw = [0u8; 1];
                inner
                    .read_exact(&mut raw)
                    .context("unable to read L entry")?;
                *left -= 1;
                Ok(Some(raw[0]))
            }
        }
    }
}
