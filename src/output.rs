//! Emission sinks for extracted n-grams.
//!
//! The engine hands every `(ngram, count)` pair to a caller-supplied
//! closure; these types are the closures the CLI tools use. Character mode
//! suppresses any n-gram containing a filtered code unit (whitespace
//! always, punctuation with `--nopunct`) and transcodes the rest for
//! output; word mode renders ids through the vocabulary and suppresses
//! n-grams containing the space id or, with `--nopunct`, a punctuation
//! sentinel. Counting variants report only how many n-grams survive.
//!
//! Sink closures cannot return errors, so printers latch the first I/O
//! failure and report it from [`CharPrinter::finish`] / [`WordPrinter::finish`].

use std::io::Write;

use anyhow::{Context, Result};

use crate::filter::{word_is_punct, FilterTable};
use crate::transcode::Transcoder;
use crate::vocab::{Vocab, WordId, ID_SPACE};

// ── Character mode ───────────────────────────────────────────────────────

pub struct CharPrinter<'a, W: Write> {
    out: W,
    filter: &'a FilterTable,
    transcoder: &'a Transcoder,
    error: Option<std::io::Error>,
}

impl<'a, W: Write> CharPrinter<'a, W> {
    pub fn new(out: W, filter: &'a FilterTable, transcoder: &'a Transcoder) -> Self {
        CharPrinter {
            out,
            filter,
            transcoder,
            error: None,
        }
    }

    pub fn emit(&mut self, ngram: &[u16], count: u32) {
        if self.error.is_some() || self.filter.blocks(ngram) {
            return;
        }
        let Some(bytes) = self.transcoder.encode_units(ngram) else {
            return;
        };
        let result = self
            .out
            .write_all(&bytes)
            .and_then(|()| writeln!(self.out, " {count}"));
        if let Err(err) = result {
            self.error = Some(err);
        }
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err).context("unable to write extracted n-grams");
        }
        self.out.flush().context("unable to flush extracted n-grams")
    }
}

pub struct CharCounter<'a> {
    filter: &'a FilterTable,
    count: u64,
}

impl<'a> CharCounter<'a> {
    pub fn new(filter: &'a FilterTable) -> Self {
        CharCounter { filter, count: 0 }
    }

    pub fn emit(&mut self, ngram: &[u16], _count: u32) {
        if !self.filter.blocks(ngram) {
            self.count += 1;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

// ── Word mode ────────────────────────────────────────────────────────────

fn word_blocked(ngram: &[WordId], nopunct: bool) -> bool {
    ngram.iter().any(|&id| id == ID_SPACE)
        || (nopunct && ngram.iter().any(|&id| word_is_punct(id)))
}

pub struct WordPrinter<'a, W: Write> {
    out: W,
    vocab: &'a Vocab,
    nopunct: bool,
    error: Option<std::io::Error>,
}

impl<'a, W: Write> WordPrinter<'a, W> {
    pub fn new(out: W, vocab: &'a Vocab, nopunct: bool) -> Self {
        WordPrinter {
            out,
            vocab,
            nopunct,
            error: None,
        }
    }

    pub fn emit(&mut self, ngram: &[WordId], count: u32) {
        if self.error.is_some() || word_blocked(ngram, self.nopunct) {
            return;
        }
        let mut line = String::new();
        for &id in ngram {
            let Some(token) = self.vocab.token(id) else {
                // an id the vocabulary has never handed out: not printable
                return;
            };
            line.push_str(token);
            line.push(' ');
        }
        if let Err(err) = writeln!(self.out, "{line}{count}") {
            self.error = Some(err);
        }
    }

    pub fn finish(mut self) -> Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err).context("unable to write extracted n-grams");
        }
        self.out.flush().context("unable to flush extracted n-grams")
    }
}

pub struct WordCounter {
    nopunct: bool,
    count: u64,
}

impl WordCounter {
    pub fn new(nopunct: bool) -> Self {
        WordCounter { nopunct, count: 0 }
    }

    pub fn emit(&mut self, ngram: &[WordId], _count: u32) {
        if !word_blocked(ngram, self.nopunct) {
            self.count += 1;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}
