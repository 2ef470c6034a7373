#![forbid(unsafe_code)]
/*!
Suffix array construction by induced sorting (SA-IS).

The array has one entry per suffix of the source plus the virtual empty
suffix, which sorts before everything else; `sa[0]` is therefore always the
source length. Built once per diff and discarded afterwards.
*/

/// Max length of indexable source data.
pub const MAX_LENGTH: usize = u32::max_value() as usize - 1;

const EMPTY: u32 = u32::max_value();

/// Build the suffix array of `source`.
///
/// Panics if the source is longer than `MAX_LENGTH`.
pub fn suffix_array(source: &[u8]) -> Vec<u32> {
    if source.len() > MAX_LENGTH {
        panic!("source data is too large to be indexed");
    }
    sais(&Bytes(source), 256)
}

/// Text abstraction letting the recursion run on summary strings without
/// copying the byte buffer into a wider representation.
trait Text {
    fn len(&self) -> usize;
    fn at(&self, i: usize) -> u32;
}

struct Bytes<'a>(&'a [u8]);

impl<'a> Text for Bytes<'a> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn at(&self, i: usize) -> u32 {
        u32::from(self.0[i])
    }
}

struct Symbols<'a>(&'a [u32]);

impl<'a> Text for Symbols<'a> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn at(&self, i: usize) -> u32 {
        self.0[i]
    }
}

fn sais<T: Text>(text: &T, alphabet_size: usize) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return vec![0];
    }

    let stypes = build_types(text);
    let sizes = bucket_sizes(text, alphabet_size);

    // First guess: LMS suffixes dropped at their bucket tails in text order.
    let mut sa = vec![EMPTY; n + 1];
    let mut tails = bucket_tails(&sizes);
    for i in 0..n {
        if is_lms(&stypes, i) {
            let b = text.at(i) as usize;
            sa[tails[b]] = i as u32;
            tails[b] -= 1;
        }
    }
    sa[0] = n as u32;
    induce_l(text, &stypes, &sizes, &mut sa);
    induce_s(text, &stypes, &sizes, &mut sa);

    // Name the LMS substrings in their guessed order; equal substrings get
    // equal names, so the summary string preserves their relative order.
    let (summary, offsets, summary_alphabet) = summarize(text, &stypes, &sa);

    let summary_sa = if summary_alphabet == summary.len() {
        // All names distinct: the summary order inverts directly.
        let mut ssa = vec![0u32; summary.len() + 1];
        ssa[0] = summary.len() as u32;
        for (i, &name) in summary.iter().enumerate() {
            ssa[name as usize + 1] = i as u32;
        }
        ssa
    } else {
        sais(&Symbols(&summary), summary_alphabet)
    };

    // Exact LMS placement from the summary order, then induce once more.
    let mut sa = vec![EMPTY; n + 1];
    let mut tails = bucket_tails(&sizes);
    for i in (2..summary_sa.len()).rev() {
        let pos = offsets[summary_sa[i] as usize];
        let b = text.at(pos as usize) as usize;
        sa[tails[b]] = pos;
        tails[b] -= 1;
    }
    sa[0] = n as u32;
    induce_l(text, &stypes, &sizes, &mut sa);
    induce_s(text, &stypes, &sizes, &mut sa);
    sa
}

/// S/L classification; `true` means S-type. The virtual terminator is
/// S-type and, when the text is non-empty, the last position is L-type.
fn build_types<T: Text>(text: &T) -> Vec<bool> {
    let n = text.len();
    let mut stypes = vec![false; n + 1];
    stypes[n] = true;
    if n == 0 {
        return stypes;
    }
    for i in (0..n - 1).rev() {
        stypes[i] = text.at(i) < text.at(i + 1) || (text.at(i) == text.at(i + 1) && stypes[i + 1]);
    }
    stypes
}

/// An LMS position is an S-type position immediately preceded by an L-type
/// position; the terminator position qualifies.
fn is_lms(stypes: &[bool], i: usize) -> bool {
    i > 0 && stypes[i] && !stypes[i - 1]
}

fn bucket_sizes<T: Text>(text: &T, alphabet_size: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; alphabet_size];
    for i in 0..text.len() {
        sizes[text.at(i) as usize] += 1;
    }
    sizes
}

/// First free slot at the front of each bucket. Slot 0 belongs to the
/// virtual empty suffix.
fn bucket_heads(sizes: &[usize]) -> Vec<usize> {
    let mut heads = Vec::with_capacity(sizes.len());
    let mut offset = 1;
    for &size in sizes {
        heads.push(offset);
        offset += size;
    }
    heads
}

/// Last slot of each bucket.
fn bucket_tails(sizes: &[usize]) -> Vec<usize> {
    let mut tails = Vec::with_capacity(sizes.len());
    let mut offset = 1;
    for &size in sizes {
        offset += size;
        tails.push(offset - 1);
    }
    tails
}

/// Left-to-right pass placing L-type predecessors at bucket heads.
fn induce_l<T: Text>(text: &T, stypes: &[bool], sizes: &[usize], sa: &mut [u32]) {
    let mut heads = bucket_heads(sizes);
    for i in 0..sa.len() {
        if sa[i] == EMPTY || sa[i] == 0 {
            continue;
        }
        let j = (sa[i] - 1) as usize;
        if !stypes[j] {
            let b = text.at(j) as usize;
            sa[heads[b]] = j as u32;
            heads[b] += 1;
        }
    }
}

/// Right-to-left pass placing S-type predecessors at bucket tails.
fn induce_s<T: Text>(text: &T, stypes: &[bool], sizes: &[usize], sa: &mut [u32]) {
    let mut tails = bucket_tails(sizes);
    for i in (0..sa.len()).rev() {
        if sa[i] == EMPTY || sa[i] == 0 {
            continue;
        }
        let j = (sa[i] - 1) as usize;
        if stypes[j] {
            let b = text.at(j) as usize;
            sa[tails[b]] = j as u32;
            tails[b] -= 1;
        }
    }
}

/// Walk the guessed suffix array and name each LMS substring; returns the
/// summary string (names in text order), the text offset of each summary
/// symbol, and the summary alphabet size.
fn summarize<T: Text>(text: &T, stypes: &[bool], sa: &[u32]) -> (Vec<u32>, Vec<u32>, usize) {
    let n = text.len();
    let mut names = vec![EMPTY; n + 1];
    let mut current = 0u32;
    // sa[0] is the terminator position, always the first LMS suffix.
    let mut last = sa[0] as usize;
    names[last] = 0;
    for &entry in &sa[1..] {
        let i = entry as usize;
        if !is_lms(stypes, i) {
            continue;
        }
        if !lms_equal(text, stypes, last, i) {
            current += 1;
        }
        last = i;
        names[i] = current;
    }

    let mut summary = Vec::new();
    let mut offsets = Vec::new();
    for (i, &name) in names.iter().enumerate() {
        if name != EMPTY {
            summary.push(name);
            offsets.push(i as u32);
        }
    }
    (summary, offsets, current as usize + 1)
}

/// Two LMS substrings are equal iff they have identical bytes and length
/// and no internal LMS boundary differs. The terminator substring equals
/// nothing else.
fn lms_equal<T: Text>(text: &T, stypes: &[bool], a: usize, b: usize) -> bool {
    let n = text.len();
    if a == n || b == n {
        return false;
    }
    let mut i = 0;
    loop {
        let a_lms = is_lms(stypes, a + i);
        let b_lms = is_lms(stypes, b + i);
        if i > 0 && a_lms && b_lms {
            return true;
        }
        if a_lms != b_lms {
            return false;
        }
        if text.at(a + i) != text.at(b + i) {
            return false;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn naive(source: &[u8]) -> Vec<u32> {
        let mut sa: Vec<u32> = (0..=source.len() as u32).collect();
        sa.sort_by_key(|&i| &source[i as usize..]);
        sa
    }

    #[test]
    fn empty_source() {
        assert_eq!(suffix_array(b""), [0]);
    }

    #[test]
    fn single_byte() {
        assert_eq!(suffix_array(b"x"), [1, 0]);
    }

    #[test]
    fn known_vectors() {
        assert_eq!(suffix_array(b"banana"), [6, 5, 3, 1, 0, 4, 2]);
        assert_eq!(suffix_array(b"aaaa"), [4, 3, 2, 1, 0]);
        assert_eq!(suffix_array(b"cabbage"), naive(b"cabbage"));
    }

    #[test]
    fn recursion_on_repetitive_input() {
        // Repeated LMS substrings force non-unique names and a recursive level.
        let s = b"mmiissiissiippii";
        assert_eq!(suffix_array(s), naive(s));
        let t: Vec<u8> = b"ab".iter().cycle().take(64).cloned().collect();
        assert_eq!(suffix_array(&t), naive(&t));
    }

    #[test]
    fn full_byte_range() {
        let s: Vec<u8> = (0..=255u8).rev().collect();
        assert_eq!(suffix_array(&s), naive(&s));
    }

    #[quickcheck]
    fn matches_naive_sort(source: Vec<u8>) -> bool {
        suffix_array(&source) == naive(&source)
    }

    #[quickcheck]
    fn is_sorted_permutation(source: Vec<u8>) -> bool {
        let sa = suffix_array(&source);
        let mut seen = vec![false; sa.len()];
        for &i in &sa {
            if seen[i as usize] {
                return false;
            }
            seen[i as usize] = true;
        }
        sa.windows(2)
            .all(|w| source[w[0] as usize..] < source[w[1] as usize..])
    }
}
