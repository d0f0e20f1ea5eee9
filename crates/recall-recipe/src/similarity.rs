//! Question similarity scoring for recipe retrieval.
//!
//! Scores blend three token-based measures computed over the sorted,
//! space-joined token sets of both questions (canonicalizing word order, so
//! "nyc hotels find" matches "find hotels in nyc"):
//!
//! - a token-set similarity ratio,
//! - a partial token-set similarity,
//! - a token-overlap balance: `min(|q∩s|/|q|, |q∩s|/|s|) * 100`.
//!
//! Final score is `(0.55*set + 0.25*partial + 0.20*balance) / 100`, landing
//! in `[0, 1]`. An exact match after normalization scores `1.0`. The blend
//! rewards literal token overlap as well as lexical closeness, so a purely
//! fuzzy string match cannot outrank a recipe sharing real words with the
//! query.

use std::collections::BTreeSet;

/// Lowercase, collapse whitespace, trim.
pub fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase alphanumeric token runs, as a sorted set.
pub fn tokens(question: &str) -> BTreeSet<String> {
    question
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Length of the longest common subsequence of two char sequences.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Normalized indel similarity of two strings, in `[0, 100]`.
///
/// Only insertions and deletions are counted, so the similarity is
/// `2*LCS / (|a| + |b|) * 100`. Two empty strings are identical.
fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Best indel similarity of the shorter string against any equal-length
/// window of the longer one, in `[0, 100]`.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_chars: Vec<char> = short.chars().collect();
    let long_chars: Vec<char> = long.chars().collect();
    if short_chars.is_empty() {
        return if long_chars.is_empty() { 100.0 } else { 0.0 };
    }

    let window = short_chars.len();
    let mut best = 0.0f64;
    for start in 0..=(long_chars.len() - window) {
        let candidate: String = long_chars[start..start + window].iter().collect();
        let score = indel_ratio(short, &candidate);
        if score > best {
            best = score;
        }
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn joined<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| t.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-set similarity: compare the common-token string against each side's
/// common-plus-difference string and the two full strings against each
/// other, taking the best ratio. A full subset relation scores 100.
fn token_set_ratio(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let sect: Vec<&String> = a.intersection(b).collect();
    let diff_ab: Vec<&String> = a.difference(b).collect();
    let diff_ba: Vec<&String> = b.difference(a).collect();

    let sect_str = joined(sect.iter().map(|s| s.as_str()));
    let ab_str = if sect_str.is_empty() {
        joined(diff_ab.iter().map(|s| s.as_str()))
    } else if diff_ab.is_empty() {
        sect_str.clone()
    } else {
        format!("{} {}", sect_str, joined(diff_ab.iter().map(|s| s.as_str())))
    };
    let ba_str = if sect_str.is_empty() {
        joined(diff_ba.iter().map(|s| s.as_str()))
    } else if diff_ba.is_empty() {
        sect_str.clone()
    } else {
        format!("{} {}", sect_str, joined(diff_ba.iter().map(|s| s.as_str())))
    };

    let mut best = indel_ratio(&ab_str, &ba_str);
    if !sect_str.is_empty() {
        best = best
            .max(indel_ratio(&sect_str, &ab_str))
            .max(indel_ratio(&sect_str, &ba_str));
    }
    best
}

/// Partial token-set similarity: any shared token scores 100 outright,
/// otherwise the best window alignment of the two difference strings.
fn partial_token_set_ratio(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.intersection(b).next().is_some() {
        return 100.0;
    }
    partial_ratio(&joined(a.iter()), &joined(b.iter()))
}

/// Similarity of a query question against a stored question, in `[0, 1]`.
pub fn similarity(query: &str, stored: &str) -> f64 {
    let q_norm = normalize_question(query);
    let s_norm = normalize_question(stored);
    if q_norm.is_empty() || s_norm.is_empty() {
        return 0.0;
    }
    if q_norm == s_norm {
        return 1.0;
    }

    let q_tokens = tokens(query);
    let s_tokens = tokens(stored);
    if q_tokens.is_empty() || s_tokens.is_empty() {
        return 0.0;
    }

    let base = token_set_ratio(&q_tokens, &s_tokens);
    let extra = partial_token_set_ratio(&q_tokens, &s_tokens);

    let shared = q_tokens.intersection(&s_tokens).count() as f64;
    let overlap = shared / q_tokens.len().max(1) as f64;
    let coverage = shared / s_tokens.len().max(1) as f64;
    let token_balance = overlap.min(coverage) * 100.0;

    (0.55 * base + 0.25 * extra + 0.20 * token_balance) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        assert_eq!(similarity("top hotels by rating", "top hotels by rating"), 1.0);
        // Normalization differences still count as exact.
        assert_eq!(similarity("  Top   Hotels ", "top hotels"), 1.0);
    }

    #[test]
    fn empty_questions_score_zero() {
        assert_eq!(similarity("", "top hotels"), 0.0);
        assert_eq!(similarity("top hotels", "   "), 0.0);
        // Punctuation-only input tokenizes to nothing.
        assert_eq!(similarity("!!!", "???"), 0.0);
    }

    #[test]
    fn token_order_is_canonicalized() {
        let reordered = similarity("find hotels in nyc", "nyc hotels find");
        let unrelated = similarity("find hotels in nyc", "delete stale invoices");
        assert!(reordered > 0.9, "reordered = {reordered}");
        assert!(reordered > unrelated);
    }

    #[test]
    fn closer_question_outscores_unrelated_one() {
        let hotels = similarity("best hotels", "top hotels by rating");
        let users = similarity("best hotels", "list users by age");
        assert!(hotels > users, "hotels = {hotels}, users = {users}");
        assert!(hotels > 0.0);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        for (q, s) in [
            ("a", "b"),
            ("list users", "list all users ordered by signup date"),
            ("find flights from sfo", "flights sfo"),
        ] {
            let score = similarity(q, s);
            assert!((0.0..=1.0).contains(&score), "{q} vs {s} -> {score}");
        }
    }

    #[test]
    fn indel_ratio_basics() {
        assert_eq!(indel_ratio("abc", "abc"), 100.0);
        assert_eq!(indel_ratio("", ""), 100.0);
        assert_eq!(indel_ratio("abc", "xyz"), 0.0);
        // "ab" vs "abc": LCS 2, total 5.
        assert!((indel_ratio("ab", "abc") - 80.0).abs() < 1e-9);
    }

    #[test]
    fn subset_token_sets_score_full_set_ratio() {
        let a = tokens("find hotels nyc");
        let b = tokens("find hotels in nyc");
        assert_eq!(token_set_ratio(&a, &b), 100.0);
    }

    #[test]
    fn tokens_extract_alphanumeric_runs() {
        let t = tokens("Find  top-10 hotels, NYC!");
        let expected: Vec<&str> = vec!["10", "find", "hotels", "nyc", "top"];
        assert_eq!(t.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }
}
