//! Trigram similarity with `pg_trgm` semantics.
//!
//! Each word (a run of alphanumerics, lowercased) is padded with two leading
//! spaces and one trailing space and split into trigrams. Similarity is the
//! number of shared trigrams over the number of distinct trigrams of both
//! strings.

use std::collections::HashSet;

pub fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(" ".chars())
            .collect();
        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }
    set
}

/// `similarity(a, b)` in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = trigrams(a);
    let b = trigrams(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}
