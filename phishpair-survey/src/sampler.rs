//! Pair sampler
//!
//! Draws the per-session sequence of distinct unordered pairs. Every
//! unordered pair of corpus items has a rank in `0..C(n,2)`; a session draws
//! `count` ranks uniformly without replacement and unranks them. No
//! retry loop is involved, so sampling always terminates, and asking for
//! more pairs than exist fails up front.

use crate::corpus::CorpusIndex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Pair sampling errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplerError {
    /// Fewer than two items to pair
    #[error("Insufficient corpus: {available} eligible item(s), at least 2 required")]
    InsufficientCorpus { available: usize },

    /// Requested more pairs than the corpus can form
    #[error("Exhausted corpus: {requested} pairs requested but only {available_pairs} distinct pairs exist")]
    ExhaustedCorpus {
        requested: usize,
        available_pairs: usize,
    },
}

/// Two filenames shown side by side; left/right is screen position only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub left: String,
    pub right: String,
}

impl Pair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Order-insensitive identity of the pair
    pub fn dedup_key(&self) -> (&str, &str) {
        if self.left <= self.right {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        }
    }
}

/// Ordered pair sequence for one session, in presentation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampledSequence(Vec<Pair>);

impl SampledSequence {
    pub fn pairs(&self) -> &[Pair] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Pair> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when no two pairs share a dedup key and no pair repeats an item
    pub fn is_valid(&self) -> bool {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .all(|p| p.left != p.right && seen.insert(p.dedup_key()))
    }
}

/// Number of distinct unordered pairs over `n` items, `None` on overflow
pub fn pair_count(n: usize) -> Option<usize> {
    if n < 2 {
        return Some(0);
    }
    let (a, b) = if n % 2 == 0 { (n / 2, n - 1) } else { (n, (n - 1) / 2) };
    a.checked_mul(b)
}

/// Map a rank in `0..C(n,2)` to item indices `(i, j)` with `i < j`
///
/// Ranks enumerate pairs lexicographically: (0,1), (0,2), ... (0,n-1), (1,2), ...
fn unrank(mut rank: usize, n: usize) -> (usize, usize) {
    let mut i = 0;
    loop {
        let row = n - 1 - i;
        if rank < row {
            return (i, i + 1 + rank);
        }
        rank -= row;
        i += 1;
    }
}

/// Draw `count` distinct unordered pairs from the corpus
pub fn sample<R: Rng + ?Sized>(
    corpus: &CorpusIndex,
    count: usize,
    rng: &mut R,
) -> Result<SampledSequence, SamplerError> {
    let n = corpus.len();
    if n < 2 {
        return Err(SamplerError::InsufficientCorpus { available: n });
    }

    let available_pairs = pair_count(n).unwrap_or(usize::MAX);
    if count > available_pairs {
        return Err(SamplerError::ExhaustedCorpus {
            requested: count,
            available_pairs,
        });
    }

    let items = corpus.items();
    let pairs = rand::seq::index::sample(rng, available_pairs, count)
        .into_iter()
        .map(|rank| {
            let (i, j) = unrank(rank, n);
            let (a, b) = (&items[i].filename, &items[j].filename);
            if rng.gen::<bool>() {
                Pair::new(a.clone(), b.clone())
            } else {
                Pair::new(b.clone(), a.clone())
            }
        })
        .collect();

    Ok(SampledSequence(pairs))
}

#[cfg(test)]
pub(crate) fn sequence_from_pairs(pairs: Vec<Pair>) -> SampledSequence {
    SampledSequence(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corpus(n: usize) -> CorpusIndex {
        CorpusIndex::from_filenames((0..n).map(|i| format!("phish_item{:02}.html", i)))
    }

    #[test]
    fn test_pair_count() {
        assert_eq!(pair_count(0), Some(0));
        assert_eq!(pair_count(1), Some(0));
        assert_eq!(pair_count(2), Some(1));
        assert_eq!(pair_count(12), Some(66));
        assert_eq!(pair_count(usize::MAX), None);
    }

    #[test]
    fn test_unrank_covers_every_pair_once() {
        let n = 7;
        let total = pair_count(n).unwrap();
        let mut seen = HashSet::new();
        for rank in 0..total {
            let (i, j) = unrank(rank, n);
            assert!(i < j && j < n);
            assert!(seen.insert((i, j)));
        }
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn test_sample_returns_unique_pairs() {
        let corpus = corpus(12);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let sequence = sample(&corpus, 10, &mut rng).unwrap();
            assert_eq!(sequence.len(), 10);
            assert!(sequence.is_valid());
            for pair in sequence.pairs() {
                assert!(corpus.get(&pair.left).is_some());
                assert!(corpus.get(&pair.right).is_some());
            }
        }
    }

    #[test]
    fn test_sample_entire_pair_space() {
        let corpus = corpus(3);
        let mut rng = StdRng::seed_from_u64(1);
        let sequence = sample(&corpus, 3, &mut rng).unwrap();
        assert_eq!(sequence.len(), 3);
        assert!(sequence.is_valid());
    }

    #[test]
    fn test_sample_insufficient_corpus() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            sample(&corpus(1), 1, &mut rng),
            Err(SamplerError::InsufficientCorpus { available: 1 })
        );
        assert_eq!(
            sample(&CorpusIndex::default(), 0, &mut rng),
            Err(SamplerError::InsufficientCorpus { available: 0 })
        );
    }

    #[test]
    fn test_sample_exhausted_corpus() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            sample(&corpus(4), 7, &mut rng),
            Err(SamplerError::ExhaustedCorpus {
                requested: 7,
                available_pairs: 6
            })
        );
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let corpus = corpus(8);
        let a = sample(&corpus, 5, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sample(&corpus, 5, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_both_screen_positions_used() {
        // With two items every sequence is the same pair; the side varies
        let corpus = corpus(2);
        let mut rng = StdRng::seed_from_u64(3);
        let lefts: HashSet<String> = (0..40)
            .map(|_| sample(&corpus, 1, &mut rng).unwrap().pairs()[0].left.clone())
            .collect();
        assert_eq!(lefts.len(), 2);
    }

    #[test]
    fn test_dedup_key_ignores_order() {
        let a = Pair::new("phish_a.html", "ai_b.html");
        let b = Pair::new("ai_b.html", "phish_a.html");
        assert_eq!(a.dedup_key(), b.dedup_key());

        let sequence = sequence_from_pairs(vec![a, b]);
        assert!(!sequence.is_valid());
    }
}
