//! Per-age index pools
//!
//! Each age within the configured bounds maps to a randomly permuted list of
//! dataset indices. Drawing proceeds in rounds: round `k` takes the `k`-th
//! index of every pool that still has one, in ascending age order. A pool
//! smaller than the quota simply drops out once it is exhausted, so no index
//! is ever drawn twice.

use std::collections::BTreeMap;

use ndarray::ArrayView1;
use rand::Rng;
use rand::seq::SliceRandom;

/// Permuted dataset indices grouped by age label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgePool {
    pools: BTreeMap<i64, Vec<usize>>,
}

impl AgePool {
    /// Group indices of labels in `[lower, upper)` and permute each group
    pub fn build<R: Rng + ?Sized>(
        labels: ArrayView1<'_, i64>,
        lower: i64,
        upper: i64,
        rng: &mut R,
    ) -> Self {
        let mut pools: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (index, &age) in labels.iter().enumerate() {
            if age >= lower && age < upper {
                pools.entry(age).or_default().push(index);
            }
        }
        for indices in pools.values_mut() {
            indices.shuffle(rng);
        }
        Self { pools }
    }

    /// Ages present, ascending
    pub fn ages(&self) -> impl Iterator<Item = i64> + '_ {
        self.pools.keys().copied()
    }

    #[must_use]
    pub fn class_size(&self, age: i64) -> usize {
        self.pools.get(&age).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Size of the largest pool
    #[must_use]
    pub fn max_class_size(&self) -> usize {
        self.pools.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Index at `position` of every pool long enough, ascending by age
    #[must_use]
    pub fn draw(&self, position: usize) -> Vec<usize> {
        self.pools
            .values()
            .filter_map(|indices| indices.get(position).copied())
            .collect()
    }

    /// Iterator over draw rounds `0..quota`
    #[must_use]
    pub fn rounds(&self, quota: usize) -> Rounds<'_> {
        Rounds {
            pool: self,
            position: 0,
            end: quota.min(self.max_class_size()),
        }
    }
}

/// Round-robin cursor over an [`AgePool`]
#[derive(Debug, Clone)]
pub struct Rounds<'a> {
    pool: &'a AgePool,
    position: usize,
    end: usize,
}

impl Iterator for Rounds<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }
        let round = self.pool.draw(self.position);
        self.position += 1;
        Some(round)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rounds<'_> {}
