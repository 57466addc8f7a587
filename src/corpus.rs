//! Random-access element views over a corpus.
//!
//! The sort, merge, L-table, and extraction code all read single elements at
//! arbitrary positions; [`ElementSource`] is that seam. During parsing the
//! source is the in-RAM buffer (`&[E]`); after `parse_end` it is the
//! `.ngram` file, either memory-mapped or read whole, exposed through
//! [`RawCorpus`] which decodes host-endian bytes on the fly (no alignment
//! requirement on the mapping).

use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use anyhow::{bail, Context, Result};
use memmap2::Mmap;

use crate::alphabet::Element;

/// Anything that yields one element per index. Implementations must hold a
/// terminator at their final index so that bounded suffix walks never run
/// off the end.
pub trait ElementSource<E: Element> {
    fn len(&self) -> usize;
    fn get(&self, idx: usize) -> E;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Element> ElementSource<E> for [E] {
    #[inline]
    fn len(&self) -> usize {
        <[E]>::len(self)
    }

    #[inline]
    fn get(&self, idx: usize) -> E {
        self[idx]
    }
}

/// Element view over raw host-endian bytes (a mapped or fully-read
/// `.ngram` file).
pub struct RawCorpus<'a, E: Element> {
    bytes: &'a [u8],
    _elem: PhantomData<E>,
}

impl<'a, E: Element> RawCorpus<'a, E> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() % E::BYTES != 0 {
            bail!(
                "corpus image length {} is not a multiple of the element size {}",
                bytes.len(),
                E::BYTES
            );
        }
        Ok(RawCorpus {
            bytes,
            _elem: PhantomData,
        })
    }
}

impl<E: Element> ElementSource<E> for RawCorpus<'_, E> {
    #[inline]
    fn len(&self) -> usize {
        self.bytes.len() / E::BYTES
    }

    #[inline]
    fn get(&self, idx: usize) -> E {
        E::read_ne(&self.bytes[idx * E::BYTES..])
    }
}

/// A `.ngram` file held either as a memory map or as owned bytes.
///
/// The merge and extraction passes only need `&[u8]`; which backing they
/// get is the caller's `--mmap` choice.
pub enum CorpusImage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl CorpusImage {
    /// Opens `path`, mapping it when `use_mmap` is set and reading it whole
    /// otherwise.
    pub fn open(path: &Path, use_mmap: bool) -> Result<Self> {
        if use_mmap {
            let file = File::open(path)
                .with_context(|| format!("unable to open corpus file {}", path.display()))?;
            let len = file
                .metadata()
                .with_context(|| format!("unable to stat corpus file {}", path.display()))?
                .len();
            if len == 0 {
                // zero-length maps are not portable
                return Ok(CorpusImage::Owned(Vec::new()));
            }
            let map = unsafe { Mmap::map(&file) }
                .with_context(|| format!("unable to mmap corpus file {}", path.display()))?;
            Ok(CorpusImage::Mapped(map))
        } else {
            let bytes = std::fs::read(path)
                .with_context(|| format!("unable to read corpus file {}", path.display()))?;
            Ok(CorpusImage::Owned(bytes))
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            CorpusImage::Mapped(map) => map,
            CorpusImage::Owned(bytes) => bytes,
        }
    }

    pub fn view<E: Element>(&self) -> Result<RawCorpus<'_, E>> {
        RawCorpus::new(self.bytes())
    }
}
