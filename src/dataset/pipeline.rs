//! Rebalancing pipeline: resample, augment, shuffle, write
//!
//! Classes are augmented in parallel. Each class gets its own RNG seeded
//! from the run's master RNG before any work starts, so a seeded run gives
//! the same output whatever the thread count.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, BooleanArray, Int64Array, RecordBatch, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::augment::{ClassAugmentation, augment_class};
use super::resample::rebalance;
use super::{Dataset, npz};
use crate::config::{AugmentationConfig, PipelineConfig, RebalanceConfig};
use crate::error::Result;
use crate::utils::logging::{create_group_progress_bar, finish_progress_bar};

/// Outcome for one age class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassReport {
    pub age: i64,
    /// Real samples of this age in the input
    pub available: usize,
    /// Real samples kept by resampling
    pub drawn: usize,
    /// Synthetic samples added
    pub generated: usize,
    /// `drawn + generated`
    pub total: usize,
    /// Class ended below the target quota
    pub under_quota: bool,
}

/// Per-class counts for a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    pub target_quota: usize,
    pub input_samples: usize,
    pub output_samples: usize,
    pub classes: Vec<ClassReport>,
}

impl RebalanceReport {
    /// Classes that did not reach the quota
    pub fn under_quota(&self) -> impl Iterator<Item = &ClassReport> {
        self.classes.iter().filter(|c| c.under_quota)
    }

    /// Report as a table with one row per age
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let counts = |f: fn(&ClassReport) -> usize| -> ArrayRef {
            Arc::new(UInt64Array::from_iter_values(
                self.classes.iter().map(|c| f(c) as u64),
            ))
        };
        let schema = Schema::new(vec![
            Field::new("age", DataType::Int64, false),
            Field::new("available", DataType::UInt64, false),
            Field::new("drawn", DataType::UInt64, false),
            Field::new("generated", DataType::UInt64, false),
            Field::new("total", DataType::UInt64, false),
            Field::new("under_quota", DataType::Boolean, false),
        ]);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(self.classes.iter().map(|c| c.age))),
            counts(|c| c.available),
            counts(|c| c.drawn),
            counts(|c| c.generated),
            counts(|c| c.total),
            Arc::new(BooleanArray::from(
                self.classes.iter().map(|c| c.under_quota).collect::<Vec<_>>(),
            )),
        ];
        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }
}

fn master_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Resample, top up under-filled classes and shuffle the result
pub fn rebalance_and_augment(
    dataset: &Dataset,
    rebalance_config: &RebalanceConfig,
    augmentation: &AugmentationConfig,
) -> Result<(Dataset, RebalanceReport)> {
    rebalance_config.validate()?;
    augmentation.validate()?;
    let mut rng = master_rng(rebalance_config.seed);

    let resampled = rebalance(dataset, rebalance_config, &mut rng)?;
    let classes: Vec<(i64, Vec<usize>, u64)> = resampled
        .drawn
        .keys()
        .map(|&age| (age, resampled.dataset.indices_of(age), rng.random::<u64>()))
        .collect();

    let pb = create_group_progress_bar(classes.len() as u64, Some("Augmenting classes"));
    let augmented: Vec<ClassAugmentation> = classes
        .par_iter()
        .map(|(age, indices, seed)| {
            let class = resampled.dataset.select(indices);
            let mut class_rng = StdRng::seed_from_u64(*seed);
            let out = augment_class(
                class.images(),
                *age,
                rebalance_config.target_quota,
                rebalance_config.batch_size,
                augmentation,
                rebalance_config.trim_to_quota,
                &mut class_rng,
            );
            pb.inc(1);
            out
        })
        .collect::<Result<_>>()?;
    finish_progress_bar(&pb, Some("Augmentation complete"));

    let mut report = RebalanceReport {
        target_quota: rebalance_config.target_quota,
        input_samples: dataset.len(),
        ..RebalanceReport::default()
    };
    let mut parts = vec![resampled.dataset];
    for class in augmented {
        let available = resampled.available.get(&class.age).copied().unwrap_or(0);
        let total = class.total();
        let under_quota = total < rebalance_config.target_quota;
        if under_quota {
            warn!(
                "Age {} has {total} samples, below the quota of {}",
                class.age, rebalance_config.target_quota
            );
        }
        report.classes.push(ClassReport {
            age: class.age,
            available,
            drawn: class.original,
            generated: class.generated(),
            total,
            under_quota,
        });
        if class.generated() > 0 {
            parts.push(Dataset::new(class.images, class.labels)?);
        }
    }

    let combined = Dataset::concat(&parts)?;
    let shuffled = combined.shuffled(&mut rng);
    report.output_samples = shuffled.len();
    info!(
        "Rebalanced {} samples into {} across {} ages",
        report.input_samples,
        report.output_samples,
        report.classes.len()
    );
    Ok((shuffled, report))
}

/// Read one or more archives, rebalance them and write the result
pub fn run_rebalance<P: AsRef<Path>>(
    inputs: &[P],
    output: &Path,
    config: &PipelineConfig,
) -> Result<RebalanceReport> {
    let start = Instant::now();
    let dataset = npz::read_datasets(inputs)?;
    let (rebalanced, report) = rebalance_and_augment(&dataset, &config.rebalance, &config.augmentation)?;
    npz::write_dataset(output, &rebalanced)?;
    info!("Rebalancing finished in {:?}", start.elapsed());
    Ok(report)
}

/// One line per age: `age: count`
#[must_use]
pub fn format_label_histogram(dataset: &Dataset) -> String {
    dataset
        .label_counts()
        .iter()
        .map(|(age, count)| format!("{age:>4}: {count}"))
        .collect::<Vec<_>>()
        .join("\n")
}
