use faceage::config::{AugmentationConfig, PipelineConfig, RebalanceConfig};
use faceage::dataset::npz::{read_dataset, read_datasets, write_dataset};
use faceage::dataset::pipeline::run_rebalance;
use faceage::dataset::{Dataset, rebalance_and_augment};
use ndarray::{Array1, Array4};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::utils::{scratch_dir, synthetic_dataset};

#[test]
fn shuffle_is_a_joint_permutation() {
    let labels = vec![1i64, 1, 2, 2, 2];
    let images = Array4::from_shape_fn((5, 1, 1, 3), |(i, _, _, c)| if c == 0 { i as u8 } else { labels[i] as u8 });
    let data = Dataset::new(images, Array1::from(labels)).unwrap();

    for seed in 0..10 {
        let shuffled = data.shuffled(&mut StdRng::seed_from_u64(seed));
        let mut order: Vec<u8> = (0..5).map(|i| shuffled.images()[[i, 0, 0, 0]]).collect();
        for (i, &label) in shuffled.labels().iter().enumerate() {
            assert_eq!(i64::from(shuffled.images()[[i, 0, 0, 1]]), label);
        }
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(shuffled.label_counts(), data.label_counts());
    }
}

#[test]
fn every_class_reaches_the_quota() {
    let data = synthetic_dataset(&[(20, 1), (21, 4), (22, 12), (90, 30)], 6);
    let config = RebalanceConfig::builder().target_quota(10).batch_size(3).seed(42).build();
    let (out, report) = rebalance_and_augment(&data, &config, &AugmentationConfig::default()).unwrap();

    let counts = out.label_counts();
    assert_eq!(counts.len(), 4);
    for (&age, &count) in &counts {
        assert!(count >= 10, "age {age} has {count}");
        assert!(count <= 10 + 3, "age {age} has {count}");
    }
    assert_eq!(counts[&22], 10);
    assert_eq!(counts[&90], 10);
    assert_eq!(report.under_quota().count(), 0);
    assert_eq!(report.output_samples, out.len());

    let class_20 = report.classes.iter().find(|c| c.age == 20).unwrap();
    assert_eq!((class_20.available, class_20.drawn), (1, 1));
    assert_eq!(class_20.total, counts[&20]);
}

#[test]
fn trimmed_run_is_exactly_balanced() {
    let data = synthetic_dataset(&[(30, 2), (31, 5), (32, 9)], 4);
    let config = RebalanceConfig::builder()
        .target_quota(8)
        .batch_size(5)
        .trim_to_quota(true)
        .seed(3)
        .build();
    let (out, _) = rebalance_and_augment(&data, &config, &AugmentationConfig::default()).unwrap();
    assert!(out.label_counts().values().all(|&n| n == 8));
}

#[test]
fn rebalance_reads_several_archives() {
    let dir = scratch_dir("rebalance-npz");
    let first = dir.join("part1.npz");
    let second = dir.join("part2.npz");
    let output = dir.join("balanced.npz");
    write_dataset(&first, &synthetic_dataset(&[(40, 3)], 5)).unwrap();
    write_dataset(&second, &synthetic_dataset(&[(41, 2), (40, 1)], 5)).unwrap();

    let both = read_datasets(&[&first, &second]).unwrap();
    assert_eq!(both.labels().to_vec(), vec![40, 40, 40, 41, 41, 40]);

    let mut config = PipelineConfig::default();
    config.rebalance = RebalanceConfig::builder().target_quota(6).batch_size(2).seed(9).build();
    let report = run_rebalance(&[&first, &second], &output, &config).unwrap();

    let written = read_dataset(&output).unwrap();
    assert_eq!(written.len(), report.output_samples);
    assert_eq!(written.image_size(), (5, 5));
    assert!(written.label_counts().values().all(|&n| n >= 6));
}
