//! File-level parse drivers: raw input files → normalized element runs →
//! the engine.
//!
//! Character mode decodes each line with the configured transcoder and
//! feeds UTF-16 code units; word mode splits on whitespace and feeds
//! vocabulary ids. Either way a line break reaches the normalizer as one
//! whitespace element, and a line that cannot be decoded is reported and
//! skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::displaylevel;
use crate::engine::NGramStat;
use crate::normalize::{char_normalizer, word_normalizer};
use crate::transcode::Transcoder;
use crate::vocab::{Vocab, WordId};

/// Parses `files` as character streams into `engine`, bracketed by
/// `parse_begin`/`parse_end`.
pub fn parse_char_files(
    engine: &mut NGramStat<u16>,
    files: &[PathBuf],
    transcoder: &Transcoder,
) -> Result<()> {
    engine.parse_begin()?;
    let mut norm = char_normalizer();
    let mut staged: Vec<u16> = Vec::new();

    for path in files {
        let file = File::open(path)
            .with_context(|| format!("unable to open input file {}", path.display()))?;
        displaylevel!(2, "Parsing file: {}\n", path.display());
        for line in BufReader::new(file).split(b'\n') {
            let mut line =
                line.with_context(|| format!("unable to read input file {}", path.display()))?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            let Some(units) = transcoder.decode_units(&line) else {
                displaylevel!(
                    1,
                    "warning: skipping a line that is not valid {}\n",
                    transcoder.name()
                );
                continue;
            };
            staged.clear();
            norm.push_all(&units, &mut staged);
            norm.push_break(&mut staged);
            engine.parse_buf(&staged)?;
        }
    }
    engine.parse_end()
}

/// Parses `files` as whitespace-separated token streams into `engine`,
/// registering every token in `vocab`.
pub fn parse_word_files(
    engine: &mut NGramStat<WordId>,
    files: &[PathBuf],
    vocab: &mut Vocab,
) -> Result<()> {
    engine.parse_begin()?;
    let mut norm = word_normalizer();
    let mut staged: Vec<WordId> = Vec::new();

    for path in files {
        let file = File::open(path)
            .with_context(|| format!("unable to open input file {}", path.display()))?;
        displaylevel!(2, "Parsing file: {}\n", path.display());
        for line in BufReader::new(file).split(b'\n') {
            let line =
                line.with_context(|| format!("unable to read input file {}", path.display()))?;
            let Ok(line) = std::str::from_utf8(&line) else {
                displaylevel!(1, "warning: skipping a line that is not valid UTF-8\n");
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            staged.clear();
            for token in line.split_whitespace() {
                norm.push(vocab.add(token), &mut staged);
            }
            norm.push_break(&mut staged);
            engine.parse_buf(&staged)?;
        }
    }
    engine.parse_end()
}
