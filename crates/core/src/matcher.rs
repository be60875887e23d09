//! Fuzzy name matching between a missing-model reference and a candidate.
//!
//! One scoring pipeline serves two call sites with different tuning:
//! on-disk candidate scanning (token-subset first, weighted hybrid tail)
//! and online search ranking (containment bands first, banded word
//! overlap tail). The constants for each live in a [`MatchProfile`] so
//! the call sites share the pipeline instead of duplicating it.
//!
//! Scoring is a pure function of the input strings and the profile.

use std::collections::BTreeSet;

use crate::validate::ALLOWED_EXTENSIONS;

/// Generic model vocabulary ignored during token scoring.
const STOPWORDS: &[&str] = &[
    "model", "checkpoint", "ckpt", "lora", "vae", "clip", "unet", "diffusion", "stable", "sd",
    "comfyui",
];

/// Scoring band applied when one token set is a subset of the other.
#[derive(Debug, Clone, Copy)]
pub struct SubsetBand {
    /// Score with zero extra tokens in the larger set.
    pub base: f64,
    /// Penalty per extra token.
    pub per_extra: f64,
    /// Lower bound for the band.
    pub floor: f64,
    /// `(max_extra, fallback)`: above `max_extra` extras, score
    /// `fallback` flat instead of the linear penalty.
    pub loose: Option<(usize, f64)>,
}

impl SubsetBand {
    fn apply(&self, extra: usize) -> f64 {
        if let Some((max_extra, fallback)) = self.loose {
            if extra > max_extra {
                return fallback;
            }
        }
        (self.base - self.per_extra * extra as f64).max(self.floor)
    }
}

/// How the tail of the pipeline combines weaker signals.
#[derive(Debug, Clone, Copy)]
pub enum CombineRule {
    /// Weighted sum of Jaccard overlap and edit similarity, plus a
    /// contiguous-substring bonus, capped so it never outranks a subset
    /// match. `degenerate_max` scales the pure edit-similarity fallback
    /// used when token sets are empty.
    Weighted {
        jaccard_weight: f64,
        edit_weight: f64,
        substring_bonus: f64,
        substring_min_len: usize,
        cap: f64,
        degenerate_max: f64,
    },
    /// Fixed bands keyed off Jaccard overlap, then partial word
    /// containment, then a low floor.
    Banded,
}

/// Tuning constants for one scoring call site.
#[derive(Debug, Clone, Copy)]
pub struct MatchProfile {
    /// Strip bracketed/parenthetical segments during normalization.
    pub strip_brackets: bool,
    /// Reject targets whose normalized form is shorter than this.
    pub min_target_len: Option<usize>,
    /// Drop stopwords and single-character tokens before token scoring.
    pub filter_tokens: bool,
    /// Apply containment bands before any token scoring.
    pub containment_bands: bool,
    pub subset_forward: SubsetBand,
    pub subset_reverse: Option<SubsetBand>,
    pub combine: CombineRule,
}

impl MatchProfile {
    /// Profile for matching missing references against on-disk files.
    pub fn disk_candidates() -> Self {
        let band = SubsetBand {
            base: 98.0,
            per_extra: 3.0,
            floor: 80.0,
            loose: None,
        };
        Self {
            strip_brackets: true,
            min_target_len: Some(4),
            filter_tokens: true,
            containment_bands: false,
            subset_forward: band,
            subset_reverse: Some(band),
            combine: CombineRule::Weighted {
                jaccard_weight: 60.0,
                edit_weight: 30.0,
                substring_bonus: 10.0,
                substring_min_len: 5,
                cap: 95.0,
                degenerate_max: 80.0,
            },
        }
    }

    /// Profile for ranking online search results against a query.
    pub fn search_ranking() -> Self {
        Self {
            strip_brackets: false,
            min_target_len: None,
            filter_tokens: false,
            containment_bands: true,
            subset_forward: SubsetBand {
                base: 96.0,
                per_extra: 3.0,
                floor: 0.0,
                loose: Some((2, 88.0)),
            },
            subset_reverse: Some(SubsetBand {
                base: 94.0,
                per_extra: 3.0,
                floor: 0.0,
                loose: Some((2, 85.0)),
            }),
            combine: CombineRule::Banded,
        }
    }
}

/// Score how well `candidate` (with an optional auxiliary filename)
/// matches `target`. Returns `(score 0..=100, diagnostic reason)`.
pub fn score(target: &str, candidate: &str, aux: &str, profile: &MatchProfile) -> (u8, String) {
    if target.is_empty() || candidate.is_empty() {
        return (0, "no_match".to_string());
    }
    if target == candidate {
        return (100, "exact_basename".to_string());
    }

    let t_norm = normalize(target, profile.strip_brackets);
    let c_norm = normalize(candidate, profile.strip_brackets);
    let f_norm = normalize(aux, profile.strip_brackets);

    if let Some(min) = profile.min_target_len {
        if t_norm.chars().count() < min {
            return (0, "query_too_short".to_string());
        }
    }

    if t_norm == c_norm || (!f_norm.is_empty() && t_norm == f_norm) {
        return (100, "exact_normalized".to_string());
    }

    if profile.containment_bands {
        if let Some(result) = containment_score(&t_norm, &c_norm, &f_norm) {
            return result;
        }
    }

    let t_tokens = tokenize(&t_norm, profile.filter_tokens);
    let mut c_tokens = tokenize(&c_norm, profile.filter_tokens);
    c_tokens.extend(tokenize(&f_norm, profile.filter_tokens));

    if t_tokens.is_empty() || c_tokens.is_empty() {
        if let CombineRule::Weighted { degenerate_max, .. } = profile.combine {
            let ratio = edit_similarity(&t_norm, &c_norm);
            return ((ratio * degenerate_max) as u8, "fuzzy_fallback".to_string());
        }
    }

    if !t_tokens.is_empty() && !c_tokens.is_empty() {
        if t_tokens.is_subset(&c_tokens) {
            let extra = c_tokens.difference(&t_tokens).count();
            return (
                profile.subset_forward.apply(extra) as u8,
                "token_subset".to_string(),
            );
        }
        if let Some(reverse) = &profile.subset_reverse {
            if c_tokens.is_subset(&t_tokens) {
                let extra = t_tokens.difference(&c_tokens).count();
                return (reverse.apply(extra) as u8, "candidate_subset".to_string());
            }
        }
    }

    match profile.combine {
        CombineRule::Weighted {
            jaccard_weight,
            edit_weight,
            substring_bonus,
            substring_min_len,
            cap,
            ..
        } => {
            let intersection = t_tokens.intersection(&c_tokens).count();
            let union = t_tokens.union(&c_tokens).count();
            let jaccard = if union > 0 {
                intersection as f64 / union as f64
            } else {
                0.0
            };
            let fuzzy = edit_similarity(&t_norm, &c_norm);
            let mut combined = jaccard * jaccard_weight + fuzzy * edit_weight;
            if t_norm.chars().count() > substring_min_len
                && (c_norm.contains(&t_norm) || t_norm.contains(&c_norm))
            {
                combined += substring_bonus;
            }
            (
                combined.min(cap) as u8,
                format!("hybrid (j:{jaccard:.2}, f:{fuzzy:.2})"),
            )
        }
        CombineRule::Banded => banded_tail(&t_tokens, &c_tokens),
    }
}

/// Containment bands used by the search-ranking profile: reward the
/// query appearing verbatim inside the candidate, scaled by how much of
/// the candidate it covers, and penalize the reverse direction.
fn containment_score(t_norm: &str, c_norm: &str, f_norm: &str) -> Option<(u8, String)> {
    if t_norm.is_empty() {
        return None;
    }
    let in_cand = c_norm.contains(t_norm);
    let in_file = !f_norm.is_empty() && f_norm.contains(t_norm);
    if in_cand || in_file {
        let container = if in_cand { c_norm } else { f_norm };
        let ratio = t_norm.len() as f64 / container.len().max(1) as f64;
        return Some(if ratio > 0.7 {
            (95, "near_exact_contains".to_string())
        } else if ratio > 0.4 {
            (90, "contains_query".to_string())
        } else {
            (70, "contains_query_partial".to_string())
        });
    }

    let cand_in = !c_norm.is_empty() && t_norm.contains(c_norm);
    let file_in = !f_norm.is_empty() && t_norm.contains(f_norm);
    if cand_in || file_in {
        let contained = if cand_in { c_norm } else { f_norm };
        let ratio = contained.len() as f64 / t_norm.len().max(1) as f64;
        return Some(if ratio > 0.5 {
            (60, "subset_match".to_string())
        } else {
            (20, "weak_match".to_string())
        });
    }
    None
}

/// Banded tail for the search-ranking profile: Jaccard bands, then
/// partial word containment, then a low floor.
fn banded_tail(t_tokens: &BTreeSet<String>, c_tokens: &BTreeSet<String>) -> (u8, String) {
    if !t_tokens.is_empty() || !c_tokens.is_empty() {
        let common = t_tokens.intersection(c_tokens).count();
        let union = t_tokens.union(c_tokens).count();
        let jaccard = common as f64 / union.max(1) as f64;
        if jaccard >= 0.7 {
            return (80, "high_word_overlap".to_string());
        }
        if jaccard >= 0.5 {
            return (70, "good_word_overlap".to_string());
        }
        if jaccard > 0.3 {
            return (60, "some_word_overlap".to_string());
        }
    }

    let mut partial: f64 = 0.0;
    for q in t_tokens {
        for c in c_tokens {
            if q.chars().count() >= 4 && c.contains(q.as_str()) {
                partial += 10.0;
            } else if c.chars().count() >= 4 && q.contains(c.as_str()) {
                partial += 8.0;
            }
        }
    }
    if partial > 0.0 {
        return ((30.0 + partial).min(50.0) as u8, "partial_word_match".to_string());
    }

    (10, "poor_match".to_string())
}

/// Normalize a name for matching: drop the weight-file extension,
/// optionally drop bracketed segments, collapse separators and
/// non-alphanumerics to single spaces, lowercase.
pub fn normalize(value: &str, strip_brackets: bool) -> String {
    let mut s = value.to_lowercase();
    for ext in ALLOWED_EXTENSIONS {
        if s.ends_with(ext) {
            s.truncate(s.len() - ext.len());
            break;
        }
    }
    if strip_brackets {
        s = strip_bracketed(&s);
    }
    let replaced: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove `[...]`, `(...)`, and `{...}` segments. An opener with no
/// closer anywhere after it is left in place.
fn strip_bracketed(value: &str) -> String {
    const OPENERS: &[char] = &['[', '(', '{'];
    const CLOSERS: &[char] = &[']', ')', '}'];

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(open_idx) = rest.find(OPENERS) {
        let after_open = &rest[open_idx + 1..];
        match after_open.find(CLOSERS) {
            Some(close_idx) => {
                out.push_str(&rest[..open_idx]);
                out.push(' ');
                rest = &after_open[close_idx + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn tokenize(norm: &str, filter: bool) -> BTreeSet<String> {
    norm.split_whitespace()
        .filter(|t| !filter || (t.chars().count() > 1 && !STOPWORDS.contains(t)))
        .map(|t| t.to_string())
        .collect()
}

/// Edit similarity between two strings in `0.0..=1.0`, derived from the
/// Levenshtein distance normalized by the longer length.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let dist = levenshtein(&a_chars, &b_chars);
    1.0 - dist as f64 / a_chars.len().max(b_chars.len()) as f64
}

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
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
