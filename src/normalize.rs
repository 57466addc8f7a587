//! Input normalization.
//!
//! Every element run admitted into the corpus passes through a
//! [`Normalizer`], which rewrites whitespace runs into a single canonical
//! space element and never lets a terminator through. The normalizer is
//! stateful across calls, so the postcondition (no two adjacent space
//! elements, no leading space) holds over the whole corpus, not just
//! within one chunk.
//!
//! Sentence padding (BOS/EOS ids around sentence-final punctuation) is the
//! natural extension of [`Normalizer::push`]; the ids are already reserved
//! in the vocabulary.

use crate::alphabet::Element;
use crate::filter::word_is_space;
use crate::vocab::{WordId, ID_SPACE};

pub struct Normalizer<E: Element> {
    space: E,
    is_space: fn(E) -> bool,
    last_was_space: bool,
}

impl<E: Element> Normalizer<E> {
    pub fn new(space: E, is_space: fn(E) -> bool) -> Self {
        Normalizer {
            space,
            is_space,
            // swallow leading whitespace
            last_was_space: true,
        }
    }

    /// Appends the normalized form of `e` to `out`: whitespace becomes one
    /// space element unless the previous output element already was one;
    /// terminators are dropped; everything else is passed through.
    pub fn push(&mut self, e: E, out: &mut Vec<E>) {
        if e.is_terminator() {
            return;
        }
        if (self.is_space)(e) {
            if !self.last_was_space {
                out.push(self.space);
                self.last_was_space = true;
            }
        } else {
            out.push(e);
            self.last_was_space = false;
        }
    }

    pub fn push_all(&mut self, elems: &[E], out: &mut Vec<E>) {
        for &e in elems {
            self.push(e, out);
        }
    }

    /// Marks a token-stream break (end of line / end of file): equivalent
    /// to seeing one whitespace element.
    pub fn push_break(&mut self, out: &mut Vec<E>) {
        self.push(self.space, out);
    }

    pub fn reset(&mut self) {
        self.last_was_space = true;
    }
}

fn char_is_space(u: u16) -> bool {
    matches!(u, 0x09..=0x0D | 0x20 | 0x3000)
}

/// Character-mode normalizer: ASCII control whitespace, space, and the
/// ideographic space all collapse to U+0020.
pub fn char_normalizer() -> Normalizer<u16> {
    Normalizer::new(0x20, char_is_space)
}

/// Word-mode normalizer: whitespace sentinel ids collapse to the space id.
pub fn word_normalizer() -> Normalizer<WordId> {
    Normalizer::new(ID_SPACE, word_is_space)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm_str(s: &str) -> String {
        let mut n = char_normalizer();
        let mut out = Vec::new();
        n.push_all(&s.encode_utf16().collect::<Vec<_>>(), &mut out);
        String::from_utf16(&out).unwrap()
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(norm_str("a \t\u{b} b"), "a b");
        assert_eq!(norm_str("ab"), "ab");
    }

    #[test]
    fn swallows_leading_whitespace() {
        assert_eq!(norm_str("   ab"), "ab");
    }

    #[test]
    fn state_spans_chunks() {
        let mut n = char_normalizer();
        let mut out = Vec::new();
        n.push_all(&"a ".encode_utf16().collect::<Vec<_>>(), &mut out);
        n.push_all(&" b".encode_utf16().collect::<Vec<_>>(), &mut out);
        assert_eq!(String::from_utf16(&out).unwrap(), "a b");
    }

    #[test]
    fn push_break_is_one_space() {
        let mut n = char_normalizer();
        let mut out = Vec::new();
        n.push_all(&"ab".encode_utf16().collect::<Vec<_>>(), &mut out);
        n.push_break(&mut out);
        n.push_break(&mut out);
        n.push_all(&"cd".encode_utf16().collect::<Vec<_>>(), &mut out);
        assert_eq!(String::from_utf16(&out).unwrap(), "ab cd");
    }

    #[test]
    fn drops_terminator() {
        let mut n = char_normalizer();
        let mut out = Vec::new();
        n.push_all(&[0x61, 0, 0x62], &mut out);
        assert_eq!(out, vec![0x61, 0x62]);
    }

    #[test]
    fn word_normalizer_collapses_space_ids() {
        use crate::vocab::{ID_TAB, ID_VT};
        let mut n = word_normalizer();
        let mut out = Vec::new();
        n.push_all(&[10, ID_SPACE, ID_TAB, ID_VT, 11], &mut out);
        assert_eq!(out, vec![10, ID_SPACE, 11]);
    }
}
