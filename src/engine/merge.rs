//! K-way merge of per-chunk pointer files and the trailing L-table pass.
//!
//! Each spill leaves a pointer file that is already sorted under the final
//! suffix order (chunk offsets are absolute within the concatenated
//! corpus), so producing `.ptable` is a plain k-way merge: keep one cursor
//! per chunk, repeatedly pick the cursor whose current suffix is smallest,
//! and append it. The number of chunks is small, so the winner is found by
//! linear scan rather than a heap.
//!
//! The `.ltable` is built afterwards by streaming adjacent `.ptable`
//! entries against the corpus image.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::alphabet::{bounded_lcp, suffix_cmp, Element};
use crate::corpus::ElementSource;
use crate::displaylevel;
use crate::engine::reader::OffsetReader;

/// Merges `chunks` into the final `.ptable` at `ptable_path`. Returns the
/// number of pointer entries written.
pub fn merge_chunks<E, S>(
    corpus: &S,
    chunks: &[PathBuf],
    ptable_path: &Path,
    use_mmap: bool,
) -> Result<u64>
where
    E: Element,
    S: ElementSource<E> + ?Sized,
{
    let mut readers = Vec::with_capacity(chunks.len());
    let mut frontier: Vec<Option<u32>> = Vec::with_capacity(chunks.len());
    for path in chunks {
        let mut rd = OffsetReader::open(path, use_mmap)?;
        frontier.push(rd.next()?);
        readers.push(rd);
    }

    let out = File::create(ptable_path)
        .with_context(|| format!("unable to create pointer file {}", ptable_path.display()))?;
    let mut out = BufWriter::new(out);

    displaylevel!(3, "merging {} pointer chunks\n", chunks.len());

    let mut written: u64 = 0;
    loop {
        let mut winner: Option<(usize, u32)> = None;
        for (k, slot) in frontier.iter().enumerate() {
            let Some(off) = *slot else { continue };
            winner = match winner {
                None => Some((k, off)),
                Some((_, best))
                    if suffix_cmp(corpus, off as usize, best as usize).is_lt() =>
                {
                    Some((k, off))
                }
                keep => keep,
            };
        }
        let Some((k, off)) = winner else { break };
        out.write_all(&off.to_ne_bytes())
            .context("unable to write merged pointer table")?;
        written += 1;
        frontier[k] = readers[k].next()?;
    }

    out.flush().context("unable to flush merged pointer table")?;
    Ok(written)
}

/// Streams the final `.ptable` against the corpus image to produce the
/// `.ltable`. Returns the number of L entries, which equals the number of
/// pointer entries.
pub fn write_ltable_streaming<E, S>(
    corpus: &S,
    ptable_path: &Path,
    ltable_path: &Path,
    use_mmap: bool,
) -> Result<u64>
where
    E: Element,
    S: ElementSource<E> + ?Sized,
{
    let mut ptable = OffsetReader::open(ptable_path, use_mmap)?;
    let out = File::create(ltable_path)
        .with_context(|| format!("unable to create L file {}", ltable_path.display()))?;
    let mut out = BufWriter::new(out);

    let mut written: u64 = 0;
    let mut prev: Option<u32> = None;
    while let Some(cur) = ptable.next()? {
        let l = match prev {
            None => 0,
            Some(prev) => bounded_lcp(corpus, prev as usize, cur as usize),
        };
        out.write_all(&[l]).context("unable to write L file")?;
        written += 1;
        prev = Some(cur);
    }

    out.flush().context("unable to flush L file")?;
    Ok(written)
}
