//! The extraction sweep: one pass over the sorted pointer table and its
//! L-table, emitting every n-gram of the requested lengths whose run of
//! adjacent suffixes is long enough.
//!
//! A run of suffixes sharing at least `j` leading elements all start with
//! the same `j`-gram, so the L-table alone decides where runs of each
//! length end. The fixed-length walk keeps a single accumulator; the
//! general walk keeps one per length in `n..=m` and splits runs at the
//! L value. Both visit each table entry exactly once and must produce the
//! same multiset when `n == m`.

use anyhow::{bail, Result};

use crate::alphabet::Element;
use crate::corpus::ElementSource;
use crate::displaylevel;
use crate::engine::reader::{LcpReader, OffsetReader};

const PROGRESS_STRIDE: u64 = 1 << 20;

/// Sequential source of `(pointer, lcp)` pairs.
pub trait EntryCursor {
    fn next_entry(&mut self) -> Result<Option<(u32, u8)>>;
}

/// Cursor over in-RAM tables.
pub struct SliceCursor<'a> {
    ptable: &'a [u32],
    ltable: &'a [u8],
    idx: usize,
}

impl<'a> SliceCursor<'a> {
    pub fn new(ptable: &'a [u32], ltable: &'a [u8]) -> Self {
        debug_assert_eq!(ptable.len(), ltable.len());
        SliceCursor {
            ptable,
            ltable,
            idx: 0,
        }
    }
}

impl EntryCursor for SliceCursor<'_> {
    fn next_entry(&mut self) -> Result<Option<(u32, u8)>> {
        if self.idx >= self.ptable.len() {
            return Ok(None);
        }
        let entry = (self.ptable[self.idx], self.ltable[self.idx]);
        self.idx += 1;
        Ok(Some(entry))
    }
}

/// Cursor over on-disk `.ptable`/`.ltable` artifacts.
pub struct FileCursor {
    offsets: OffsetReader,
    lcps: LcpReader,
}

impl FileCursor {
    pub fn new(offsets: OffsetReader, lcps: LcpReader) -> Result<Self> {
        if offsets.remaining() != lcps.remaining() {
            bail!(
                "pointer table has {} entries but L table has {}",
                offsets.remaining(),
                lcps.remaining()
            );
        }
        Ok(FileCursor { offsets, lcps })
    }
}

impl EntryCursor for FileCursor {
    fn next_entry(&mut self) -> Result<Option<(u32, u8)>> {
        match (self.offsets.next()?, self.lcps.next()?) {
            (Some(p), Some(l)) => Ok(Some((p, l))),
            (None, None) => Ok(None),
            _ => bail!("pointer and L tables ended at different positions"),
        }
    }
}

/// Reads `want` elements starting at `at` into `out`; leaves `out` empty
/// when a terminator interrupts the window.
fn fetch_into<E, S>(src: &S, at: usize, want: usize, out: &mut Vec<E>)
where
    E: Element,
    S: ElementSource<E> + ?Sized,
{
    out.clear();
    for t in 0..want {
        let e = src.get(at + t);
        if e.is_terminator() {
            out.clear();
            return;
        }
        out.push(e);
    }
}

#[inline]
fn emit_if<E: Element>(text: &[E], count: u32, freq: u32, sink: &mut impl FnMut(&[E], u32)) {
    if count >= freq && !text.is_empty() {
        sink(text, count);
    }
}

/// Runs the sweep, choosing the fixed-length walk when `n == m`.
pub fn sweep<E, S, C, F>(src: &S, cursor: &mut C, n: usize, m: usize, freq: u32, sink: &mut F) -> Result<()>
where
    E: Element,
    S: ElementSource<E> + ?Sized,
    C: EntryCursor,
    F: FnMut(&[E], u32),
{
    if n == m {
        sweep_fixed(src, cursor, n, freq, sink)
    } else {
        sweep_range(src, cursor, n, m, freq, sink)
    }
}

fn sweep_fixed<E, S, C, F>(src: &S, cursor: &mut C, n: usize, freq: u32, sink: &mut F) -> Result<()>
where
    E: Element,
    S: ElementSource<E> + ?Sized,
    C: EntryCursor,
    F: FnMut(&[E], u32),
{
    let Some((p0, _)) = cursor.next_entry()? else {
        return Ok(());
    };
    let mut current = Vec::with_capacity(n);
    fetch_into(src, p0 as usize, n, &mut current);
    let mut count: u32 = 1;
    let mut seen: u64 = 1;

    while let Some((p, l)) = cursor.next_entry()? {
        if usize::from(l) >= n {
            count += 1;
        } else {
            emit_if(&current, count, freq, sink);
            fetch_into(src, p as usize, n, &mut current);
            count = 1;
        }
        seen += 1;
        if seen % PROGRESS_STRIDE == 0 {
            displaylevel!(3, "\r{seen} suffixes scanned");
        }
    }
    emit_if(&current, count, freq, sink);
    if seen >= PROGRESS_STRIDE {
        displaylevel!(3, "\r{seen} suffixes scanned\n");
    }
    Ok(())
}

fn sweep_range<E, S, C, F>(
    src: &S,
    cursor: &mut C,
    n: usize,
    m: usize,
    freq: u32,
    sink: &mut F,
) -> Result<()>
where
    E: Element,
    S: ElementSource<E> + ?Sized,
    C: EntryCursor,
    F: FnMut(&[E], u32),
{
    let Some((p0, _)) = cursor.next_entry()? else {
        return Ok(());
    };
    // one accumulator per length in n..=m
    let mut accs: Vec<(Vec<E>, u32)> = (n..=m).map(|j| (Vec::with_capacity(j), 1)).collect();
    for (j, acc) in accs.iter_mut().enumerate() {
        fetch_into(src, p0 as usize, n + j, &mut acc.0);
    }
    let mut seen: u64 = 1;

    while let Some((p, l)) = cursor.next_entry()? {
        let l = usize::from(l);
        if l < n {
            // every run ends here
            for (text, count) in &accs {
                emit_if(text, *count, freq, sink);
            }
            for (j, acc) in accs.iter_mut().enumerate() {
                fetch_into(src, p as usize, n + j, &mut acc.0);
                acc.1 = 1;
            }
        } else if l >= m {
            for acc in &mut accs {
                acc.1 += 1;
            }
        } else {
            // lengths up to l continue, the longer ones start over
            for acc in &mut accs[..=l - n] {
                acc.1 += 1;
            }
            for (j, acc) in accs.iter_mut().enumerate().skip(l + 1 - n) {
                emit_if(&acc.0, acc.1, freq, sink);
                fetch_into(src, p as usize, n + j, &mut acc.0);
                acc.1 = 1;
            }
        }
        seen += 1;
        if seen % PROGRESS_STRIDE == 0 {
            displaylevel!(3, "\r{seen} suffixes scanned");
        }
    }
    for (text, count) in &accs {
        emit_if(text, *count, freq, sink);
    }
    if seen >= PROGRESS_STRIDE {
        displaylevel!(3, "\r{seen} suffixes scanned\n");
    }
    Ok(())
}
