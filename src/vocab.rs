//! Word-mode vocabulary: a dense, first-seen-order bijection between token
//! strings and `u32` ids.
//!
//! Id 0 is the corpus terminator and never names a real token. Ids 1..=9 are
//! reserved sentinels (whitespace characters, sentence-final punctuation,
//! BOS/EOS) registered before any corpus token, so corpus tokens always
//! start at [`FIRST_REGULAR_ID`]. A `.vocab` file stores only the regular
//! tokens, one per line, in id order; reloading reconstructs identical ids
//! for an identical corpus.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::displaylevel;

pub type WordId = u32;

pub const ID_TERMINATOR: WordId = 0;
pub const ID_SPACE: WordId = 1;
pub const ID_TAB: WordId = 2;
pub const ID_VT: WordId = 3;
pub const ID_PERIOD: WordId = 4;
pub const ID_QUESTION: WordId = 5;
pub const ID_SEMICOLON: WordId = 6;
pub const ID_EXCLAMATION: WordId = 7;
pub const ID_BOS: WordId = 8;
pub const ID_EOS: WordId = 9;

/// First id handed out to a corpus token.
pub const FIRST_REGULAR_ID: WordId = ID_EOS + 1;

/// Sentinel ids that stand for sentence-final punctuation tokens.
pub const PUNCT_SENTINEL_IDS: [WordId; 4] =
    [ID_PERIOD, ID_QUESTION, ID_SEMICOLON, ID_EXCLAMATION];

const SENTINEL_TOKENS: [&str; 10] =
    ["__NULL__", " ", "\t", "\u{b}", ".", "?", ";", "!", "BOS", "EOS"];

pub struct Vocab {
    index: Vec<String>,
    ids: HashMap<String, WordId>,
}

impl Vocab {
    /// Creates a vocabulary with the terminator placeholder and the nine
    /// sentinel tokens pre-registered.
    pub fn new() -> Self {
        let mut v = Vocab {
            index: Vec::new(),
            ids: HashMap::new(),
        };
        for tok in SENTINEL_TOKENS {
            v.add(tok);
        }
        debug_assert_eq!(v.index.len() as WordId, FIRST_REGULAR_ID);
        v
    }

    /// Returns the id of `token`, registering it with the next free id if
    /// it has not been seen before.
    pub fn add(&mut self, token: &str) -> WordId {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.index.len() as WordId;
        self.index.push(token.to_owned());
        self.ids.insert(token.to_owned(), id);
        id
    }

    pub fn id(&self, token: &str) -> Option<WordId> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: WordId) -> Option<&str> {
        self.index.get(id as usize).map(String::as_str)
    }

    /// Total number of ids handed out, sentinels included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Loads a `.vocab` file written by [`Vocab::save`]: a fresh sentinel
    /// block followed by every stored token in order.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("unable to open vocab file {}", path.display()))?;
        let mut v = Vocab::new();
        for line in BufReader::new(file).lines() {
            let line = line
                .with_context(|| format!("unable to read vocab file {}", path.display()))?;
            v.add(&line);
        }
        displaylevel!(2, "{} words loaded\n", v.len());
        Ok(v)
    }

    /// Saves the regular tokens (ids from [`FIRST_REGULAR_ID`] up), one per
    /// line. Tokens containing line separators cannot round-trip and are
    /// rejected.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("unable to open vocab file {} to write", path.display()))?;
        let mut out = BufWriter::new(file);
        displaylevel!(2, "Writing vocab to: {}\n", path.display());
        for token in &self.index[FIRST_REGULAR_ID as usize..] {
            if token.contains('\n') || token.contains('\r') {
                bail!("vocab token {token:?} contains a line separator");
            }
            writeln!(out, "{token}")
                .with_context(|| format!("unable to write vocab file {}", path.display()))?;
        }
        Ok(())
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Vocab::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_ids_are_fixed() {
        let v = Vocab::new();
        assert_eq!(v.id(" "), Some(ID_SPACE));
        assert_eq!(v.id("\t"), Some(ID_TAB));
        assert_eq!(v.id("."), Some(ID_PERIOD));
        assert_eq!(v.id("EOS"), Some(ID_EOS));
        assert_eq!(v.len() as WordId, FIRST_REGULAR_ID);
    }

    #[test]
    fn first_seen_order_is_dense_and_stable() {
        let mut v = Vocab::new();
        assert_eq!(v.add("the"), FIRST_REGULAR_ID);
        assert_eq!(v.add("cat"), FIRST_REGULAR_ID + 1);
        assert_eq!(v.add("the"), FIRST_REGULAR_ID);
        assert_eq!(v.token(FIRST_REGULAR_ID + 1), Some("cat"));
    }

    #[test]
    fn save_load_roundtrip_excludes_sentinels() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("corpus.vocab");
        let mut v = Vocab::new();
        v.add("alpha");
        v.add("beta");
        v.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "alpha\nbeta\n");

        let loaded = Vocab::load(&path).unwrap();
        assert_eq!(loaded.id("alpha"), v.id("alpha"));
        assert_eq!(loaded.id("beta"), v.id("beta"));
        assert_eq!(loaded.len(), v.len());
    }

    #[test]
    fn save_rejects_embedded_newline() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut v = Vocab::new();
        v.add("bad\ntoken");
        assert!(v.save(&dir.path().join("v.vocab")).is_err());
    }
}
