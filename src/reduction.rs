//! Statistical substring reduction.
//!
//! An n-gram is redundant when some longer n-gram contains it and their
//! frequencies differ by less than the threshold `f0`: every occurrence of
//! the short gram is then explained by the long one. Four algorithms remove
//! the redundant entries; on n-gram sets with genuine occurrence counts
//! (where a substring is never rarer than its superstring) they agree
//! exactly.
//!
//! Counts are carried as `i64` and compared through `abs()`: the sorting
//! algorithms mark an entry by flipping its count negative, so a marked
//! entry keeps participating in later threshold tests with its original
//! magnitude.

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::alphabet::Element;

/// One n-gram with its (possibly sign-flipped) count.
pub type Pair<E> = (Vec<E>, i64);

#[inline]
fn within<E: Element>(a: &Pair<E>, b: &Pair<E>, f0: i64) -> bool {
    a.1.abs() - b.1.abs() < f0
}

/// `s1` is a non-empty proper substring of `s2`.
fn is_substr<E: Element>(s1: &[E], s2: &[E]) -> bool {
    !s1.is_empty() && s1.len() < s2.len() && s2.windows(s1.len()).any(|w| w == s1)
}

/// `s1` is a proper prefix of `s2`.
fn is_left_substr<E: Element>(s1: &[E], s2: &[E]) -> bool {
    s1.len() < s2.len() && &s2[..s1.len()] == s1
}

fn mark<E: Element>(pair: &mut Pair<E>) {
    if pair.1 > 0 {
        pair.1 = -pair.1;
    }
}

fn drop_marked<E: Element>(items: &mut Vec<Pair<E>>) {
    items.retain(|p| p.1 >= 0);
}

/// Algorithm 1: compare every entry against every other. Quadratic, the
/// reference the faster algorithms are checked against.
pub fn reduce_quadratic<E: Element>(items: &mut Vec<Pair<E>>, f0: i64) {
    let n = items.len();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if within(&items[i], &items[j], f0) && is_substr(&items[i].0, &items[j].0) {
                mark(&mut items[i]);
                break;
            }
        }
    }
    drop_marked(items);
}

/// One adjacent-pair marking pass over a lexicographically sorted slice:
/// an entry that is a prefix of its successor within the threshold is
/// marked. Prefixes sort immediately before their extensions, so adjacency
/// is enough.
fn mark_adjacent_prefixes<E: Element>(items: &mut [Pair<E>], f0: i64) {
    for i in 1..items.len() {
        let (left, right) = items.split_at_mut(i);
        let a = &mut left[i - 1];
        let b = &right[0];
        if within(a, b, f0) && is_left_substr(&a.0, &b.0) {
            mark(a);
        }
    }
}

fn reverse_texts<E: Element>(items: &mut [Pair<E>]) {
    for (text, _) in items.iter_mut() {
        text.reverse();
    }
}

fn sort_by_text<E: Element>(items: &mut [Pair<E>]) {
    items.sort_unstable_by(|a, b| a.0.cmp(&b.0));
}

/// Algorithm 2: two sorted passes. The first catches left substrings; the
/// second, run on reversed strings, catches right substrings (any inner
/// substring of a longer gram is a left or right substring of some other
/// extracted gram, which chains the suppression).
pub fn reduce_sorted<E: Element>(items: &mut Vec<Pair<E>>, f0: i64) {
    sort_by_text(items);
    mark_adjacent_prefixes(items, f0);
    reverse_texts(items);
    sort_by_text(items);
    mark_adjacent_prefixes(items, f0);
    reverse_texts(items);
    drop_marked(items);
}

/// One compacting pass: like [`mark_adjacent_prefixes`] but entries are
/// deleted on the spot by sliding survivors down.
fn compact_adjacent_prefixes<E: Element>(items: &mut Vec<Pair<E>>, f0: i64) {
    let n = items.len();
    if n < 2 {
        return;
    }
    let mut write = 0;
    for read in 0..n - 1 {
        let absorbed = {
            let (a, b) = (&items[read], &items[read + 1]);
            within(a, b, f0) && is_left_substr(&a.0, &b.0)
        };
        if !absorbed {
            items.swap(write, read);
            write += 1;
        }
    }
    items.swap(write, n - 1);
    items.truncate(write + 1);
}

/// Algorithm 3: the compacting variant of algorithm 2. Valid only for
/// `f0 == 1`, where entries absorbed by an equal-count superstring are
/// guaranteed to sit immediately next to it after each sort.
pub fn reduce_compacting<E: Element>(items: &mut Vec<Pair<E>>, f0: i64) -> Result<()> {
    if f0 != 1 {
        bail!("the compacting reduction only accepts a frequency threshold of 1");
    }
    sort_by_text(items);
    compact_adjacent_prefixes(items, f0);
    reverse_texts(items);
    sort_by_text(items);
    compact_adjacent_prefixes(items, f0);
    reverse_texts(items);
    Ok(())
}

/// Algorithm 4: hash every n-gram, then for each entry probe all of its
/// substrings of length `m1..len` and suppress the ones found within the
/// threshold. Duplicate input texts collapse, last count wins.
pub fn reduce_hashed<E: Element>(items: Vec<Pair<E>>, m1: usize, f0: i64) -> Vec<Pair<E>> {
    let mut table: HashMap<Vec<E>, (i64, bool)> = HashMap::with_capacity(items.len());
    for (text, count) in items {
        table.insert(text, (count, false));
    }

    let texts: Vec<Vec<E>> = table.keys().cloned().collect();
    for text in &texts {
        let own = table[text].0;
        for len in m1..text.len() {
            for start in 0..=text.len() - len {
                let sub = &text[start..start + len];
                if let Some(entry) = table.get_mut(sub) {
                    if entry.0.abs() - own.abs() < f0 {
                        entry.1 = true;
                    }
                }
            }
        }
    }

    table
        .into_iter()
        .filter(|(_, (_, suppressed))| !suppressed)
        .map(|(text, (count, _))| (text, count))
        .collect()
}

/// Splits one `ngram … count` input line: the count is the last
/// whitespace-separated token, the n-gram is everything before it.
pub fn parse_pair_line(line: &str) -> Option<(&str, i64)> {
    let (text, count) = line.rsplit_once([' ', '\t'])?;
    let count: i64 = count.trim().parse().ok()?;
    let text = text.trim_end_matches([' ', '\t']);
    if text.is_empty() {
        return None;
    }
    Some((text, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pairs(input: &[(&str, i64)]) -> Vec<Pair<u16>> {
        input
            .iter()
            .map(|&(s, c)| (s.encode_utf16().collect(), c))
            .collect()
    }

    fn names(items: &[Pair<u16>]) -> BTreeSet<(String, i64)> {
        items
            .iter()
            .map(|(t, c)| (String::from_utf16(t).unwrap(), *c))
            .collect()
    }

    fn run_all(input: &[(&str, i64)], f0: i64) -> Vec<BTreeSet<(String, i64)>> {
        let mut v1 = pairs(input);
        reduce_quadratic(&mut v1, f0);
        let mut v2 = pairs(input);
        reduce_sorted(&mut v2, f0);
        let v4 = reduce_hashed(pairs(input), 1, f0);
        vec![names(&v1), names(&v2), names(&v4)]
    }

    #[test]
    fn threshold_two_reduces_equal_count_substring() {
        // |5 - 5| < 2, so "ab" is absorbed by "abc"
        let got = run_all(&[("ab", 5), ("abc", 5), ("xyz", 7)], 2);
        let want: BTreeSet<(String, i64)> =
            [("abc".into(), 5), ("xyz".into(), 7)].into_iter().collect();
        for g in got {
            assert_eq!(g, want);
        }
    }

    #[test]
    fn threshold_one_keeps_distinct_counts() {
        // |6 - 5| < 1 is false: nothing absorbed
        let got = run_all(&[("ab", 6), ("abc", 5), ("xyz", 7)], 1);
        let want: BTreeSet<(String, i64)> =
            [("ab".into(), 6), ("abc".into(), 5), ("xyz".into(), 7)]
                .into_iter()
                .collect();
        for g in got {
            assert_eq!(g, want);
        }
    }

    #[test]
    fn threshold_one_absorbs_equal_counts() {
        // |5 - 5| = 0 < 1: "ab" is explained by "abc"
        let got = run_all(&[("ab", 5), ("abc", 5), ("xyz", 7)], 1);
        let want: BTreeSet<(String, i64)> =
            [("abc".into(), 5), ("xyz".into(), 7)].into_iter().collect();
        for g in got {
            assert_eq!(g, want);
        }
    }

    #[test]
    fn inner_substrings_are_caught() {
        // "ss" is an inner substring of "ssis"; counts from "mississippi"-like data
        let input = [("ss", 2), ("ssi", 2), ("ssis", 2), ("is", 2), ("si", 2)];
        for g in run_all(&input, 1) {
            assert!(!g.iter().any(|(s, _)| s == "ss"), "{g:?}");
            assert!(g.iter().any(|(s, _)| s == "ssis"));
        }
    }

    #[test]
    fn algorithms_agree_on_extraction_like_input() {
        // counts are genuine window counts of "abcabcabc"
        let input = [
            ("ab", 3),
            ("bc", 3),
            ("ca", 2),
            ("abc", 3),
            ("bca", 2),
            ("cab", 2),
            ("abca", 2),
            ("bcab", 2),
            ("cabc", 2),
        ];
        for f0 in 1..=3 {
            let got = run_all(&input, f0);
            assert_eq!(got[0], got[1], "f0={f0}");
            assert_eq!(got[0], got[2], "f0={f0}");
        }
    }

    #[test]
    fn compacting_matches_sorted_for_unit_threshold() {
        let input = [
            ("ab", 3),
            ("abc", 3),
            ("bc", 3),
            ("ca", 2),
            ("bca", 2),
            ("cab", 2),
        ];
        let mut sorted = pairs(&input);
        reduce_sorted(&mut sorted, 1);
        let mut compacted = pairs(&input);
        reduce_compacting(&mut compacted, 1).unwrap();
        assert_eq!(names(&sorted), names(&compacted));
    }

    #[test]
    fn compacting_rejects_other_thresholds() {
        let mut v = pairs(&[("ab", 1)]);
        assert!(reduce_compacting(&mut v, 2).is_err());
    }

    #[test]
    fn reduction_is_idempotent() {
        let input = [("ab", 5), ("abc", 5), ("abcd", 5), ("xy", 9)];
        for f0 in [1, 2, 5] {
            let mut once = pairs(&input);
            reduce_sorted(&mut once, f0);
            let mut twice = once.clone();
            reduce_sorted(&mut twice, f0);
            assert_eq!(names(&once), names(&twice), "f0={f0}");

            let once4 = reduce_hashed(pairs(&input), 1, f0);
            let twice4 = reduce_hashed(once4.clone(), 1, f0);
            assert_eq!(names(&once4), names(&twice4), "f0={f0}");
        }
    }

    #[test]
    fn hashed_respects_minimum_substring_length() {
        // with m1 = 3 the bigram "ab" is never probed, so it survives
        let input = [("ab", 5), ("abcd", 5), ("abc", 5)];
        let got = names(&reduce_hashed(pairs(&input), 3, 2));
        assert!(got.iter().any(|(s, _)| s == "ab"));
        assert!(!got.iter().any(|(s, _)| s == "abc"));
    }

    #[test]
    fn word_id_pairs_reduce_too() {
        let items: Vec<Pair<u32>> = vec![
            (vec![10, 11], 4),
            (vec![10, 11, 12], 4),
            (vec![20, 21], 9),
        ];
        let mut v = items.clone();
        reduce_sorted(&mut v, 1);
        assert_eq!(v.len(), 2);
        assert!(v.iter().all(|(t, _)| t != &vec![10, 11]));
    }

    #[test]
    fn pair_line_parsing() {
        assert_eq!(parse_pair_line("abc 12"), Some(("abc", 12)));
        assert_eq!(parse_pair_line("the cat 7"), Some(("the cat", 7)));
        assert_eq!(parse_pair_line("x\t3"), Some(("x", 3)));
        assert_eq!(parse_pair_line("justoneword"), None);
        assert_eq!(parse_pair_line("word nonnumber"), None);
        assert_eq!(parse_pair_line(" 5"), None);
    }
}
