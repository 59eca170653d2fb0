//! Name similarity scoring for duplicate-entity detection.

use std::collections::HashSet;

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized edit-distance ratio in [0, 1]; 1.0 for identical strings.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Jaccard overlap of whitespace-split tokens; 0.0 when either side has none.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

/// Combined name similarity over lower-cased names:
/// `0.6 * sequence_ratio + 0.4 * token_jaccard`, with two special cases:
/// identical names score 1.0, and when one name contains the other (shorter
/// side at least 3 chars, e.g. "Acme Corp" within "Acme Corporation") the
/// score is floored at 0.85, since truncated variants of one entity rarely
/// clear the threshold on edit distance alone.
pub fn name_similarity(name1: &str, name2: &str) -> f64 {
    let a = name1.to_lowercase();
    let b = name2.to_lowercase();
    if a == b {
        return 1.0;
    }
    let combined = 0.6 * sequence_ratio(&a, &b) + 0.4 * token_jaccard(&a, &b);
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if short.len() >= 3 && long.contains(short.as_str()) {
        return combined.max(0.85);
    }
    combined
}
