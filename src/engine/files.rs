//! Artifact and temp-file layout, plus the host-endian writers.
//!
//! A corpus base path `<base>` expands to four artifacts:
//! `<base>.ngram` (raw elements, one trailing terminator), `<base>.ptable`
//! (raw `u32` element offsets), `<base>.ltable` (one `u8` LCP value per
//! pointer), and in word mode `<base>.vocab`. All multi-byte values are
//! host byte order; the formats carry no byte-order marker, so artifacts
//! are not portable across differently-ordered hosts.
//!
//! Per-chunk spill files are named `<prefix>.<node>.<pid>.<counter>.tmp`
//! so concurrent runs in one directory cannot collide.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::alphabet::Element;

/// Derived artifact paths for one corpus base.
#[derive(Clone, Debug)]
pub struct ArtifactPaths {
    base: PathBuf,
}

impl ArtifactPaths {
    pub fn new(base: &Path) -> Self {
        ArtifactPaths {
            base: base.to_owned(),
        }
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s: OsString = self.base.as_os_str().to_owned();
        s.push(suffix);
        PathBuf::from(s)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn ngram(&self) -> PathBuf {
        self.with_suffix(".ngram")
    }

    pub fn ptable(&self) -> PathBuf {
        self.with_suffix(".ptable")
    }

    pub fn ltable(&self) -> PathBuf {
        self.with_suffix(".ltable")
    }

    pub fn vocab(&self) -> PathBuf {
        self.with_suffix(".vocab")
    }

    /// Directory the artifacts land in; spill files default to the same
    /// place.
    pub fn dir(&self) -> PathBuf {
        self.base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_owned)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Builds the next spill-file path inside `dir`.
pub fn temp_chunk_path(dir: &Path, prefix: &str, counter: u32) -> PathBuf {
    let node = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned());
    dir.join(format!(
        "{prefix}.{node}.{pid}.{counter}.tmp",
        pid = std::process::id()
    ))
}

/// Writes `elems` to `out` in host byte order.
pub fn write_elements<E: Element, W: Write>(out: &mut W, elems: &[E]) -> Result<()> {
    let mut scratch = [0u8; 8];
    for &e in elems {
        e.write_ne(&mut scratch);
        out.write_all(&scratch[..E::BYTES])
            .context("unable to write corpus elements")?;
    }
    Ok(())
}

/// Writes pointer offsets to `out`, biasing each by `bias` to make them
/// absolute within the concatenated corpus. Fails if an offset leaves the
/// 32-bit space.
pub fn write_offsets<W: Write>(out: &mut W, offsets: &[u32], bias: u64) -> Result<()> {
    for &off in offsets {
        let absolute = bias + u64::from(off);
        let Ok(absolute) = u32::try_from(absolute) else {
            bail!("corpus exceeds the 32-bit pointer space at element {absolute}");
        };
        out.write_all(&absolute.to_ne_bytes())
            .context("unable to write pointer table")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_append_suffixes() {
        let p = ArtifactPaths::new(Path::new("dir/corpus.v1"));
        assert_eq!(p.ngram(), PathBuf::from("dir/corpus.v1.ngram"));
        assert_eq!(p.ptable(), PathBuf::from("dir/corpus.v1.ptable"));
        assert_eq!(p.ltable(), PathBuf::from("dir/corpus.v1.ltable"));
        assert_eq!(p.vocab(), PathBuf::from("dir/corpus.v1.vocab"));
        assert_eq!(p.dir(), PathBuf::from("dir"));
        assert_eq!(ArtifactPaths::new(Path::new("bare")).dir(), PathBuf::from("."));
    }

    #[test]
    fn temp_chunk_paths_differ_by_counter() {
        let a = temp_chunk_path(Path::new("/tmp"), "text2ngram", 1);
        let b = temp_chunk_path(Path::new("/tmp"), "text2ngram", 2);
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".1.tmp"));
    }

    #[test]
    fn element_writer_uses_host_order() {
        let mut out = Vec::new();
        write_elements::<u16, _>(&mut out, &[0x1234, 0]).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(u16::from_ne_bytes([out[0], out[1]]), 0x1234);
    }

    #[test]
    fn offset_writer_biases_and_checks_range() {
        let mut out = Vec::new();
        write_offsets(&mut out, &[1, 2], 10).unwrap();
        assert_eq!(u32::from_ne_bytes(out[0..4].try_into().unwrap()), 11);
        assert_eq!(u32::from_ne_bytes(out[4..8].try_into().unwrap()), 12);
        assert!(write_offsets(&mut Vec::new(), &[5], u64::from(u32::MAX)).is_err());
    }
}
