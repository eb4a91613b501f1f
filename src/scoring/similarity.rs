//! Text similarity between a reference workflow and a candidate.
//!
//! Both documents are normalized before scoring: parsed as YAML, re-dumped
//! with mapping keys sorted, lowercased and split on whitespace. Absent,
//! empty or unparsable inputs score 0.0.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};

/// A similarity metric over normalized workflow tokens.
pub trait SimilarityScorer: Send + Sync {
    /// Field-friendly metric name.
    fn name(&self) -> &'static str;

    /// Score already-normalized token sequences.
    fn score_tokens(&self, reference: &[String], candidate: &[String]) -> f64;

    /// Score two raw documents.
    fn score(&self, reference: Option<&str>, candidate: Option<&str>) -> f64 {
        let (Some(reference), Some(candidate)) = (reference, candidate) else {
            return 0.0;
        };
        match (normalize(reference), normalize(candidate)) {
            (Some(r), Some(c)) if !r.is_empty() && !c.is_empty() => self.score_tokens(&r, &c),
            _ => 0.0,
        }
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut entries: Vec<(Value, Value)> = map.into_iter().collect();
            entries.sort_by_cached_key(|(k, _)| match k {
                Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other).unwrap_or_default(),
            });
            let mut sorted = Mapping::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Mapping(sorted)
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(sort_keys).collect()),
        Value::Tagged(mut tagged) => {
            tagged.value = sort_keys(tagged.value);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

/// Normalize a YAML document into lowercase whitespace-separated tokens.
///
/// Returns `None` for empty or unparsable input.
pub fn normalize(document: &str) -> Option<Vec<String>> {
    if document.trim().is_empty() {
        return None;
    }
    let value: Value = serde_yaml::from_str(document).ok()?;
    let dumped = serde_yaml::to_string(&sort_keys(value)).ok()?;
    Some(
        dumped
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    )
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

/// Sentence BLEU with uniform 4-gram weights and brevity penalty, no smoothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bleu;

impl Bleu {
    const MAX_ORDER: usize = 4;
}

impl SimilarityScorer for Bleu {
    fn name(&self) -> &'static str {
        "bleu"
    }

    fn score_tokens(&self, reference: &[String], candidate: &[String]) -> f64 {
        let weight = 1.0 / Self::MAX_ORDER as f64;
        let mut log_sum = 0.0;

        for n in 1..=Self::MAX_ORDER {
            let candidate_counts = ngram_counts(candidate, n);
            let reference_counts = ngram_counts(reference, n);
            let total: usize = candidate_counts.values().sum();
            let clipped: usize = candidate_counts
                .iter()
                .map(|(gram, count)| (*count).min(reference_counts.get(gram).copied().unwrap_or(0)))
                .sum();
            if clipped == 0 {
                return 0.0;
            }
            log_sum += weight * (clipped as f64 / total.max(1) as f64).ln();
        }

        let c = candidate.len() as f64;
        let r = reference.len() as f64;
        let brevity_penalty = if c > r { 1.0 } else { (1.0 - r / c).exp() };
        brevity_penalty * log_sum.exp()
    }
}

/// METEOR over exact unigram matches.
#[derive(Debug, Clone, Copy)]
pub struct Meteor {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for Meteor {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            beta: 3.0,
            gamma: 0.5,
        }
    }
}

impl Meteor {
    /// Exact-match alignment as `(candidate_idx, reference_idx)` pairs.
    ///
    /// Candidate words are taken from last to first, each matched against the
    /// last free occurrence in the reference.
    fn align(reference: &[String], candidate: &[String]) -> Vec<(usize, usize)> {
        let mut free_reference: Vec<(usize, &String)> = reference.iter().enumerate().collect();
        let mut matches = Vec::new();
        for (ci, word) in candidate.iter().enumerate().rev() {
            if let Some(pos) = free_reference.iter().rposition(|(_, r)| *r == word) {
                let (ri, _) = free_reference.remove(pos);
                matches.push((ci, ri));
            }
        }
        matches.sort_unstable();
        matches
    }

    fn chunks(matches: &[(usize, usize)]) -> usize {
        if matches.is_empty() {
            return 0;
        }
        1 + matches
            .windows(2)
            .filter(|w| !(w[1].0 == w[0].0 + 1 && w[1].1 == w[0].1 + 1))
            .count()
    }
}

impl SimilarityScorer for Meteor {
    fn name(&self) -> &'static str {
        "meteor"
    }

    fn score_tokens(&self, reference: &[String], candidate: &[String]) -> f64 {
        let matches = Self::align(reference, candidate);
        let matched = matches.len() as f64;
        if matched == 0.0 {
            return 0.0;
        }
        let precision = matched / candidate.len() as f64;
        let recall = matched / reference.len() as f64;
        let fmean = precision * recall / (self.alpha * precision + (1.0 - self.alpha) * recall);
        let fragmentation = Self::chunks(&matches) as f64 / matched;
        let penalty = self.gamma * fragmentation.powf(self.beta);
        (1.0 - penalty) * fmean
    }
}
