use faceage::config::RebalanceConfig;
use faceage::dataset::{AgePool, rebalance};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::utils::synthetic_dataset;

#[test]
fn each_age_gets_min_of_quota_and_class_size() {
    let classes = [(18, 1), (19, 5), (40, 12), (104, 3), (105, 9), (10, 4)];
    let data = synthetic_dataset(&classes, 4);
    let quota = 5;
    let config = RebalanceConfig::builder().target_quota(quota).build();

    for seed in 0..5 {
        let out = rebalance(&data, &config, &mut StdRng::seed_from_u64(seed)).unwrap();
        let counts = out.dataset.label_counts();
        for &(age, size) in &classes {
            let expected = if config.contains(age) { size.min(quota) } else { 0 };
            assert_eq!(counts.get(&age).copied().unwrap_or(0), expected, "age {age}");
        }
    }
}

#[test]
fn samples_are_drawn_without_replacement() {
    let data = synthetic_dataset(&[(30, 40), (31, 7)], 2);
    let config = RebalanceConfig::builder().target_quota(25).build();
    let out = rebalance(&data, &config, &mut StdRng::seed_from_u64(7)).unwrap();

    let mut rows: Vec<u8> = (0..out.dataset.len())
        .map(|i| out.dataset.images()[[i, 0, 0, 0]])
        .collect();
    rows.sort_unstable();
    rows.dedup();
    assert_eq!(rows.len(), 25 + 7);
}

#[test]
fn images_keep_their_labels() {
    let data = synthetic_dataset(&[(20, 6), (21, 6), (22, 2)], 3);
    let config = RebalanceConfig::builder().target_quota(4).build();
    let out = rebalance(&data, &config, &mut StdRng::seed_from_u64(1)).unwrap();
    for (i, &label) in out.dataset.labels().iter().enumerate() {
        assert_eq!(i64::from(out.dataset.images()[[i, 0, 0, 1]]), label);
    }
}

#[test]
fn draw_order_is_round_robin() {
    let data = synthetic_dataset(&[(50, 3), (60, 1), (70, 2)], 1);
    let pool = AgePool::build(data.labels(), 18, 105, &mut StdRng::seed_from_u64(2));
    let rounds: Vec<Vec<usize>> = pool.rounds(10).collect();

    assert_eq!(rounds.len(), 3);
    let ages = |round: &[usize]| round.iter().map(|&i| data.labels()[i]).collect::<Vec<_>>();
    assert_eq!(ages(&rounds[0]), vec![50, 60, 70]);
    assert_eq!(ages(&rounds[1]), vec![50, 70]);
    assert_eq!(ages(&rounds[2]), vec![50]);
}

#[test]
fn invalid_bounds_are_rejected() {
    let data = synthetic_dataset(&[(30, 1)], 1);
    let config = RebalanceConfig::builder().age_bounds(50, 50).build();
    assert!(rebalance(&data, &config, &mut StdRng::seed_from_u64(0)).is_err());
}

#[test]
fn no_ages_in_bounds_gives_empty_subset() {
    let data = synthetic_dataset(&[(10, 3), (110, 2)], 2);
    let config = RebalanceConfig::builder().target_quota(4).build();
    let pool = AgePool::build(data.labels(), config.lower_age, config.upper_age, &mut StdRng::seed_from_u64(0));
    assert!(pool.is_empty());

    let out = rebalance(&data, &config, &mut StdRng::seed_from_u64(0)).unwrap();
    assert!(out.dataset.is_empty());
    assert!(out.available.is_empty());
    assert_eq!(out.dataset.image_size(), (2, 2));
}
