//! The n-gram statistics engine: memory-budgeted ingestion, suffix-pointer
//! sorting, out-of-core spilling and merging, and the extraction sweep.
//!
//! One [`NGramStat`] instance owns a contiguous element buffer, the pointer
//! table over it, and (after `parse_end`) the L-table. Ingestion runs
//! through a strict state machine:
//!
//! ```text
//! Idle --parse_begin--> Parsing --parse_end--> Flushed --clear--> Idle
//! ```
//!
//! `parse_buf` admits normalized element runs while in `Parsing`, spilling
//! sorted pointer chunks plus finalized corpus elements to disk whenever
//! the buffer fills (only possible with an artifact base configured).
//! `extract_ngram` is valid only in `Flushed` and reads either the in-RAM
//! tables (no base) or the `.ngram`/`.ptable`/`.ltable` artifacts.
//!
//! The engine is single-threaded and synchronous; separate instances over
//! disjoint files are independent.

pub mod files;
pub mod merge;
pub mod reader;
pub mod sort;
pub mod sweep;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::alphabet::{Element, MAX_NGRAM_LEN};
use crate::corpus::CorpusImage;
use crate::displaylevel;
use files::{temp_chunk_path, write_elements, write_offsets, ArtifactPaths};
use reader::{LcpReader, OffsetReader};
use sweep::{FileCursor, SliceCursor};

/// Slack beyond the pointered region: room for roughly twenty maximum-length
/// n-grams, so every admitted pointer keeps a full comparison window in RAM
/// when its chunk is spilled.
const TAIL_SLACK: usize = 20 * MAX_NGRAM_LEN;

/// A spill is forced when fewer than this many free slots remain.
const SPILL_MARGIN: usize = 30;

/// Free slots always left unused by a single copy.
const COPY_MARGIN: usize = 20;

/// In-RAM bytes per admitted element: the element itself, its pointer
/// entry, and its L byte.
fn per_element_cost<E: Element>() -> usize {
    E::BYTES + 4 + 1
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Parsing,
    Flushed,
}

pub struct NGramStat<E: Element> {
    state: State,
    base: Option<ArtifactPaths>,
    use_mmap: bool,
    temp_dir: Option<PathBuf>,
    main_capacity: usize,
    capacity: usize,

    buffer: Vec<E>,
    buf_off: usize,
    last_word_end: usize,
    start_offset: u64,
    buf_remain: Vec<E>,

    ptable: Vec<u32>,
    ltable: Vec<u8>,

    ngram_out: Option<BufWriter<File>>,
    chunk_files: Vec<PathBuf>,
    temp_counter: u32,
}

impl<E: Element> NGramStat<E> {
    /// Creates an engine with a memory budget of `mem_bytes`. With a `base`
    /// the artifacts `<base>.ngram/.ptable/.ltable` are produced and the
    /// corpus may exceed the budget; without one everything stays in RAM.
    pub fn new(mem_bytes: usize, base: Option<&Path>, use_mmap: bool) -> Result<Self> {
        // pointer entries are 32-bit, so the buffer can never need more
        let main_capacity = (mem_bytes / per_element_cost::<E>())
            .min(u32::MAX as usize - TAIL_SLACK - 1);
        if main_capacity == 0 {
            bail!("memory budget of {mem_bytes} bytes is too small for even one element");
        }
        Ok(NGramStat {
            state: State::Idle,
            base: base.map(ArtifactPaths::new),
            use_mmap,
            temp_dir: None,
            main_capacity,
            capacity: main_capacity + TAIL_SLACK,
            buffer: Vec::new(),
            buf_off: 0,
            last_word_end: 0,
            start_offset: 0,
            buf_remain: Vec::new(),
            ptable: Vec::new(),
            ltable: Vec::new(),
            ngram_out: None,
            chunk_files: Vec::new(),
            temp_counter: 0,
        })
    }

    /// Attaches to an existing artifact bundle for extraction only.
    pub fn from_artifacts(base: &Path, use_mmap: bool) -> Self {
        NGramStat {
            state: State::Flushed,
            base: Some(ArtifactPaths::new(base)),
            use_mmap,
            temp_dir: None,
            main_capacity: 0,
            capacity: TAIL_SLACK,
            buffer: Vec::new(),
            buf_off: 0,
            last_word_end: 0,
            start_offset: 0,
            buf_remain: Vec::new(),
            ptable: Vec::new(),
            ltable: Vec::new(),
            ngram_out: None,
            chunk_files: Vec::new(),
            temp_counter: 0,
        }
    }

    /// Directory for spill files; defaults to the artifact directory.
    pub fn set_temp_dir(&mut self, dir: impl Into<PathBuf>) {
        self.temp_dir = Some(dir.into());
    }

    pub fn artifact_paths(&self) -> Option<&ArtifactPaths> {
        self.base.as_ref()
    }

    /// Resets all tables and opens the corpus output stream.
    pub fn parse_begin(&mut self) -> Result<()> {
        self.buffer.clear();
        self.buffer.resize(self.capacity + 1, E::TERMINATOR);
        self.buf_off = 0;
        self.last_word_end = 0;
        self.start_offset = 0;
        self.buf_remain.clear();
        self.ptable.clear();
        self.ltable.clear();
        self.chunk_files.clear();
        self.temp_counter = 0;
        self.ngram_out = match &self.base {
            Some(paths) => {
                let file = File::create(paths.ngram()).with_context(|| {
                    format!("unable to create corpus file {}", paths.ngram().display())
                })?;
                Some(BufWriter::new(file))
            }
            None => None,
        };
        self.state = State::Parsing;
        Ok(())
    }

    /// Admits one normalized element run. Runs longer than the pointered
    /// buffer region are diagnosed and skipped.
    pub fn parse_buf(&mut self, chunk: &[E]) -> Result<()> {
        if self.state != State::Parsing {
            bail!("parse_buf called outside a parse_begin/parse_end bracket");
        }
        if chunk.is_empty() {
            return Ok(());
        }
        if chunk.len() > self.main_capacity {
            displaylevel!(
                2,
                "warning: skipping an input run of {} elements (capacity {})\n",
                chunk.len(),
                self.main_capacity
            );
            return Ok(());
        }
        if self.buf_off + SPILL_MARGIN >= self.capacity {
            self.spill()?;
        }
        debug_assert!(self.buf_remain.is_empty());
        let room = self.capacity - self.buf_off - COPY_MARGIN;
        let taken = chunk.len().min(room);
        self.buffer[self.buf_off..self.buf_off + taken].copy_from_slice(&chunk[..taken]);
        self.buf_off += taken;
        self.buffer[self.buf_off] = E::TERMINATOR;
        if taken < chunk.len() {
            self.buf_remain.extend_from_slice(&chunk[taken..]);
        }
        self.admit_pointers();
        Ok(())
    }

    /// Finalizes the corpus: sorts (or merges) the pointer table and builds
    /// the L-table, in RAM or as artifact files.
    pub fn parse_end(&mut self) -> Result<()> {
        if self.state != State::Parsing {
            bail!("parse_end called outside a parse_begin/parse_end bracket");
        }
        if !self.buf_remain.is_empty() {
            self.spill()?;
        }
        // the tail slack finally gets its pointers
        for p in self.last_word_end..self.buf_off {
            self.ptable.push(p as u32);
        }
        self.last_word_end = self.buf_off;
        self.buffer[self.buf_off] = E::TERMINATOR;

        displaylevel!(3, "sorting {} pointers\n", self.ptable.len());
        sort::sort_pointers(&self.buffer[..=self.buf_off], &mut self.ptable);

        match &self.base {
            None => {
                self.ltable = sort::build_ltable(&self.buffer[..=self.buf_off], &self.ptable);
            }
            Some(paths) => {
                let paths = paths.clone();
                if self.chunk_files.is_empty() {
                    self.finish_single_chunk(&paths)?;
                } else {
                    self.finish_merge(&paths)?;
                }
            }
        }
        self.state = State::Flushed;
        Ok(())
    }

    /// Emits every n-gram of length `n..=m` occurring at least `freq`
    /// times. Valid only after `parse_end` (or on an attached bundle).
    pub fn extract_ngram<F>(&self, n: usize, m: usize, freq: u32, sink: &mut F) -> Result<()>
    where
        F: FnMut(&[E], u32),
    {
        if self.state != State::Flushed {
            bail!("extract_ngram requires a finalized corpus");
        }
        check_bounds(n, m, freq)?;
        match &self.base {
            None => {
                if self.buffer.is_empty() {
                    bail!("no corpus has been parsed");
                }
                let src = &self.buffer[..=self.buf_off];
                let mut cursor = SliceCursor::new(&self.ptable, &self.ltable);
                sweep::sweep(src, &mut cursor, n, m, freq, sink)
            }
            Some(paths) => {
                let image = CorpusImage::open(&paths.ngram(), self.use_mmap)?;
                let view = image.view::<E>()?;
                let offsets = OffsetReader::open(&paths.ptable(), self.use_mmap)?;
                let lcps = LcpReader::open(&paths.ltable(), self.use_mmap)?;
                let mut cursor = FileCursor::new(offsets, lcps)?;
                sweep::sweep(&view, &mut cursor, n, m, freq, sink)
            }
        }
    }

    /// Releases every table and returns to `Idle`. The artifact base and
    /// mmap preference are kept.
    pub fn clear(&mut self) {
        self.buffer = Vec::new();
        self.buf_off = 0;
        self.last_word_end = 0;
        self.start_offset = 0;
        self.buf_remain = Vec::new();
        self.ptable = Vec::new();
        self.ltable = Vec::new();
        self.ngram_out = None;
        self.chunk_files = Vec::new();
        self.temp_counter = 0;
        self.state = State::Idle;
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Appends pointer entries for every new position below the pointered
    /// region boundary.
    fn admit_pointers(&mut self) {
        let end = self.buf_off.min(self.main_capacity);
        for p in self.last_word_end..end {
            self.ptable.push(p as u32);
        }
        if end > self.last_word_end {
            self.last_word_end = end;
        }
    }

    /// Flushes the pointered prefix of the buffer: sorted chunk pointer
    /// file to the temp dir, finalized elements to `.ngram`, then slides
    /// the unpointered tail (and any retained overflow) to the front.
    fn spill(&mut self) -> Result<()> {
        let Some(paths) = self.base.clone() else {
            bail!(
                "memory budget exhausted and no artifact base is configured; \
                 pass an output base to enable spilling"
            );
        };
        debug_assert!(!self.ptable.is_empty());

        sort::sort_pointers(&self.buffer[..=self.buf_off], &mut self.ptable);

        let dir = self.temp_dir.clone().unwrap_or_else(|| paths.dir());
        self.temp_counter += 1;
        let chunk_path = temp_chunk_path(&dir, "ngramstat", self.temp_counter);
        displaylevel!(
            3,
            "spilling {} pointers to {}\n",
            self.ptable.len(),
            chunk_path.display()
        );
        let file = File::create(&chunk_path).with_context(|| {
            format!("unable to create chunk pointer file {}", chunk_path.display())
        })?;
        let mut out = BufWriter::new(file);
        write_offsets(&mut out, &self.ptable, self.start_offset)?;
        out.flush().context("unable to flush chunk pointer file")?;
        self.chunk_files.push(chunk_path);

        let ngram_out = self
            .ngram_out
            .as_mut()
            .context("corpus output stream is not open")?;
        write_elements(ngram_out, &self.buffer[..self.last_word_end])?;

        // slide the live tail home and re-admit it
        let tail = self.buf_off - self.last_word_end;
        self.buffer.copy_within(self.last_word_end..self.buf_off, 0);
        self.buffer[tail..tail + self.buf_remain.len()].copy_from_slice(&self.buf_remain);
        self.buf_off = tail + self.buf_remain.len();
        self.buffer[self.buf_off] = E::TERMINATOR;
        self.buf_remain.clear();
        self.start_offset += self.last_word_end as u64;
        self.last_word_end = 0;
        self.ptable.clear();
        self.admit_pointers();
        Ok(())
    }

    /// No spill happened: the whole corpus is in RAM, so write all three
    /// artifacts directly.
    fn finish_single_chunk(&mut self, paths: &ArtifactPaths) -> Result<()> {
        let ptable_path = paths.ptable();
        let file = File::create(&ptable_path)
            .with_context(|| format!("unable to create pointer file {}", ptable_path.display()))?;
        let mut out = BufWriter::new(file);
        write_offsets(&mut out, &self.ptable, 0)?;
        out.flush().context("unable to flush pointer file")?;

        let mut ngram_out = self
            .ngram_out
            .take()
            .context("corpus output stream is not open")?;
        write_elements(&mut ngram_out, &self.buffer[..self.buf_off])?;
        write_elements(&mut ngram_out, &[E::TERMINATOR])?;
        ngram_out
            .flush()
            .context("unable to flush corpus file")?;
        drop(ngram_out);

        let image = CorpusImage::open(&paths.ngram(), self.use_mmap)?;
        let view = image.view::<E>()?;
        merge::write_ltable_streaming(&view, &ptable_path, &paths.ltable(), self.use_mmap)?;

        self.release_tables();
        Ok(())
    }

    /// At least one spill happened: flush the final chunk, then k-way merge
    /// everything against the on-disk corpus.
    fn finish_merge(&mut self, paths: &ArtifactPaths) -> Result<()> {
        if !self.ptable.is_empty() {
            let dir = self.temp_dir.clone().unwrap_or_else(|| paths.dir());
            self.temp_counter += 1;
            let chunk_path = temp_chunk_path(&dir, "ngramstat", self.temp_counter);
            let file = File::create(&chunk_path).with_context(|| {
                format!("unable to create chunk pointer file {}", chunk_path.display())
            })?;
            let mut out = BufWriter::new(file);
            write_offsets(&mut out, &self.ptable, self.start_offset)?;
            out.flush().context("unable to flush chunk pointer file")?;
            self.chunk_files.push(chunk_path);
        }

        let mut ngram_out = self
            .ngram_out
            .take()
            .context("corpus output stream is not open")?;
        write_elements(&mut ngram_out, &self.buffer[..self.buf_off])?;
        write_elements(&mut ngram_out, &[E::TERMINATOR])?;
        ngram_out
            .flush()
            .context("unable to flush corpus file")?;
        drop(ngram_out);

        self.release_tables();

        let image = CorpusImage::open(&paths.ngram(), self.use_mmap)?;
        let view = image.view::<E>()?;
        let merged =
            merge::merge_chunks(&view, &self.chunk_files, &paths.ptable(), self.use_mmap)?;
        let lcount =
            merge::write_ltable_streaming(&view, &paths.ptable(), &paths.ltable(), self.use_mmap)?;
        if merged != lcount {
            bail!("pointer/L table length mismatch after merge: {merged} vs {lcount}");
        }

        for path in self.chunk_files.drain(..) {
            if let Err(err) = std::fs::remove_file(&path) {
                displaylevel!(2, "warning: unable to remove {}: {err}\n", path.display());
            }
        }
        Ok(())
    }

    /// Frees the in-RAM working set once the artifacts own the data.
    fn release_tables(&mut self) {
        self.buffer = Vec::new();
        self.ptable = Vec::new();
        self.ltable = Vec::new();
        self.buf_off = 0;
        self.last_word_end = 0;
    }
}

/// Validates the extraction bounds shared by every tool.
pub fn check_bounds(n: usize, m: usize, freq: u32) -> Result<()> {
    if !(1 <= n && n <= m && m <= MAX_NGRAM_LEN && freq >= 1) {
        bail!(
            "out-of-range n-gram bounds (accepted: 1 <= N <= M <= {MAX_NGRAM_LEN}, freq >= 1); \
             got N={n} M={m} freq={freq}"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn elems(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn extract_map(engine: &NGramStat<u16>, n: usize, m: usize, freq: u32) -> BTreeMap<String, u32> {
        let mut got = BTreeMap::new();
        engine
            .extract_ngram(n, m, freq, &mut |t: &[u16], c| {
                got.insert(String::from_utf16(t).unwrap(), c);
            })
            .unwrap();
        got
    }

    #[test]
    fn in_memory_bigrams() {
        let mut engine: NGramStat<u16> = NGramStat::new(1 << 20, None, false).unwrap();
        engine.parse_begin().unwrap();
        engine.parse_buf(&elems("abab")).unwrap();
        engine.parse_end().unwrap();
        let got = extract_map(&engine, 2, 2, 1);
        assert_eq!(got.get("ab"), Some(&2));
        assert_eq!(got.get("ba"), Some(&1));
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn state_machine_is_enforced() {
        let mut engine: NGramStat<u16> = NGramStat::new(1 << 20, None, false).unwrap();
        assert!(engine.parse_buf(&elems("ab")).is_err());
        assert!(engine.parse_end().is_err());
        engine.parse_begin().unwrap();
        assert!(engine.extract_ngram(1, 1, 1, &mut |_, _| {}).is_err());
        engine.parse_end().unwrap();
        engine.clear();
        assert!(engine.parse_buf(&elems("ab")).is_err());
    }

    #[test]
    fn bounds_are_checked() {
        assert!(check_bounds(0, 1, 1).is_err());
        assert!(check_bounds(2, 1, 1).is_err());
        assert!(check_bounds(1, 256, 1).is_err());
        assert!(check_bounds(1, 1, 0).is_err());
        assert!(check_bounds(1, 255, 1).is_ok());
    }

    #[test]
    fn in_memory_overflow_is_an_error() {
        // budget for ~36 elements, no artifact base
        let mut engine: NGramStat<u16> = NGramStat::new(256, None, false).unwrap();
        engine.parse_begin().unwrap();
        let line = elems("abcdefgh");
        let mut failed = false;
        for _ in 0..2000 {
            if engine.parse_buf(&line).is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed, "filling the buffer without a base must fail");
    }

    #[test]
    fn oversized_chunk_is_skipped() {
        let mut engine: NGramStat<u16> = NGramStat::new(70, None, false).unwrap();
        engine.parse_begin().unwrap();
        let big = vec![0x61u16; 4096];
        engine.parse_buf(&big).unwrap();
        engine.parse_end().unwrap();
        assert_eq!(extract_map(&engine, 1, 1, 1).len(), 0);
    }

    #[test]
    fn artifact_mode_single_chunk_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("corpus");
        let mut engine: NGramStat<u16> = NGramStat::new(1 << 20, Some(base.as_path()), false).unwrap();
        engine.parse_begin().unwrap();
        engine.parse_buf(&elems("mississippi")).unwrap();
        engine.parse_end().unwrap();

        let ptable_len = std::fs::metadata(dir.path().join("corpus.ptable")).unwrap().len();
        let ltable_len = std::fs::metadata(dir.path().join("corpus.ltable")).unwrap().len();
        assert_eq!(ptable_len / 4, ltable_len);

        let attached: NGramStat<u16> = NGramStat::from_artifacts(&base, false);
        let got = extract_map(&attached, 2, 2, 2);
        assert_eq!(got.get("is"), Some(&2));
        assert_eq!(got.get("si"), Some(&2));
        assert_eq!(got.get("ss"), Some(&2));
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn spilled_run_matches_in_memory_run() {
        // a budget small enough to force many spills on a few KB of text
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("spilled");
        // ~8k elements against a ~580-element pointered region: several spills
        let text: String = (0..2000)
            .map(|i| ["abra", "cada", "bra ", "abab", "miss"][i % 5])
            .collect();

        let mut small: NGramStat<u16> = NGramStat::new(4 << 10, Some(base.as_path()), false).unwrap();
        small.parse_begin().unwrap();
        for chunk in text.as_bytes().chunks(16) {
            small.parse_buf(&elems(std::str::from_utf8(chunk).unwrap())).unwrap();
        }
        small.parse_end().unwrap();

        let mut large: NGramStat<u16> = NGramStat::new(8 << 20, None, false).unwrap();
        large.parse_begin().unwrap();
        for chunk in text.as_bytes().chunks(16) {
            large.parse_buf(&elems(std::str::from_utf8(chunk).unwrap())).unwrap();
        }
        large.parse_end().unwrap();

        for (n, m, freq) in [(1, 1, 1), (2, 2, 1), (3, 5, 3), (2, 4, 2)] {
            let spilled = extract_map(&small, n, m, freq);
            let in_mem = extract_map(&large, n, m, freq);
            assert_eq!(spilled, in_mem, "N={n} M={m} f={freq}");
        }
        // chunk files are cleaned up after the merge
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|x| x == "tmp")
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn mmap_and_buffered_extraction_agree() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("corpus");
        let mut engine: NGramStat<u16> = NGramStat::new(1 << 20, Some(base.as_path()), false).unwrap();
        engine.parse_begin().unwrap();
        engine.parse_buf(&elems("abcabcabc")).unwrap();
        engine.parse_end().unwrap();

        let buffered: NGramStat<u16> = NGramStat::from_artifacts(&base, false);
        let mapped: NGramStat<u16> = NGramStat::from_artifacts(&base, true);
        assert_eq!(extract_map(&buffered, 2, 3, 2), extract_map(&mapped, 2, 3, 2));
        let expected: BTreeMap<String, u32> = [
            ("ab", 3u32),
            ("bc", 3),
            ("ca", 2),
            ("abc", 3),
            ("bca", 2),
            ("cab", 2),
        ]
        .into_iter()
        .map(|(s, c)| (s.to_owned(), c))
        .collect();
        assert_eq!(extract_map(&buffered, 2, 3, 2), expected);
    }

    #[test]
    fn word_mode_engine_counts_token_pairs() {
        use crate::vocab::Vocab;
        let mut vocab = Vocab::new();
        let ids: Vec<u32> = ["the", "cat", "sat", "the", "cat", "ran"]
            .iter()
            .map(|w| vocab.add(w))
            .collect();
        let mut engine: NGramStat<u32> = NGramStat::new(1 << 20, None, false).unwrap();
        engine.parse_begin().unwrap();
        engine.parse_buf(&ids).unwrap();
        engine.parse_end().unwrap();

        let mut got: Vec<(Vec<u32>, u32)> = Vec::new();
        engine
            .extract_ngram(2, 2, 2, &mut |t: &[u32], c| got.push((t.to_vec(), c)))
            .unwrap();
        let the = vocab.id("the").unwrap();
        let cat = vocab.id("cat").unwrap();
        assert_eq!(got, vec![(vec![the, cat], 2)]);
    }
}
