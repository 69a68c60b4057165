//! Class-balanced resampling without replacement
//!
//! Every age in `[lower, upper)` contributes `min(quota, class size)` distinct
//! samples. Ages outside the bounds are dropped.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rand::Rng;

use super::Dataset;
use super::pool::AgePool;
use crate::config::RebalanceConfig;
use crate::error::Result;

/// Resampled dataset and per-age counts
#[derive(Debug, Clone)]
pub struct ResampleOutcome {
    pub dataset: Dataset,
    /// Samples available per in-bounds age before resampling
    pub available: BTreeMap<i64, usize>,
    /// Samples drawn per age
    pub drawn: BTreeMap<i64, usize>,
}

/// Draw a class-balanced subset of `dataset`
pub fn rebalance<R: Rng + ?Sized>(
    dataset: &Dataset,
    config: &RebalanceConfig,
    rng: &mut R,
) -> Result<ResampleOutcome> {
    config.validate()?;
    let pool = AgePool::build(dataset.labels(), config.lower_age, config.upper_age, rng);
    if pool.is_empty() {
        warn!(
            "No samples with ages in [{}, {}), nothing to resample",
            config.lower_age, config.upper_age
        );
    }

    let mut indices = Vec::new();
    for (round, drawn) in pool.rounds(config.target_quota).enumerate() {
        debug!("Resampling round {round}: {} samples", drawn.len());
        indices.extend(drawn);
    }

    let available: BTreeMap<i64, usize> = pool.ages().map(|age| (age, pool.class_size(age))).collect();
    let drawn = available
        .iter()
        .map(|(&age, &size)| (age, size.min(config.target_quota)))
        .collect();

    info!(
        "Resampled {} of {} samples across {} ages in [{}, {})",
        indices.len(),
        dataset.len(),
        available.len(),
        config.lower_age,
        config.upper_age
    );

    Ok(ResampleOutcome {
        dataset: dataset.select(&indices),
        available,
        drawn,
    })
}
