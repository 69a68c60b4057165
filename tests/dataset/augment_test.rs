use faceage::config::{AugmentationConfig, FillMode};
use faceage::dataset::{AugmentationStream, augment_class, generate_until};
use ndarray::{Array4, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn augmentation_terminates_within_one_batch_of_quota() {
    let config = AugmentationConfig::default();
    for (original, quota, batch) in [(1, 150, 20), (7, 150, 20), (149, 150, 20), (3, 10, 7), (5, 6, 1)] {
        let images = Array4::<u8>::from_elem((original, 8, 8, 3), 90);
        let mut rng = StdRng::seed_from_u64(original as u64);
        let out = augment_class(images.view(), 33, quota, batch, &config, false, &mut rng).unwrap();
        assert!(out.total() >= quota, "{original}/{quota}/{batch}");
        assert!(out.total() <= quota + batch, "{original}/{quota}/{batch}");
    }
}

#[test]
fn trimming_hits_the_quota_exactly() {
    let images = Array4::<u8>::from_elem((4, 6, 6, 3), 10);
    let mut rng = StdRng::seed_from_u64(3);
    let out = augment_class(images.view(), 60, 50, 20, &AugmentationConfig::default(), true, &mut rng)
        .unwrap();
    assert_eq!(out.total(), 50);
    assert_eq!(out.images.len_of(Axis(0)), 46);
}

#[test]
fn synthetic_labels_match_the_class() {
    let images = Array4::<u8>::from_elem((2, 5, 5, 3), 200);
    let mut rng = StdRng::seed_from_u64(8);
    let out = augment_class(images.view(), 77, 30, 4, &AugmentationConfig::default(), false, &mut rng)
        .unwrap();
    assert!(out.generated() > 0);
    assert_eq!(out.labels.len(), out.images.len_of(Axis(0)));
    assert!(out.labels.iter().all(|&age| age == 77));
}

#[test]
fn identity_config_reproduces_inputs() {
    let images = Array4::from_shape_fn((3, 4, 4, 3), |(i, y, x, c)| (i * 50 + y * 4 + x + c) as u8);
    let config = AugmentationConfig::identity();
    let mut rng = StdRng::seed_from_u64(0);
    let batch = AugmentationStream::new(images.view(), &config, 3, &mut rng)
        .unwrap()
        .next()
        .unwrap();

    // same images, shuffled
    let mut seen: Vec<u8> = batch.axis_iter(Axis(0)).map(|img| img[[0, 0, 0]]).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 50, 100]);
    for img in batch.axis_iter(Axis(0)) {
        let i = usize::from(img[[0, 0, 0]] / 50);
        assert_eq!(img, images.index_axis(Axis(0), i));
    }
}

#[test]
fn stop_policy_is_injectable() {
    let images = Array4::<u8>::zeros((5, 2, 2, 3));
    let config = AugmentationConfig::builder().fill_mode(FillMode::Nearest).build();
    let mut rng = StdRng::seed_from_u64(2);
    let stream = AugmentationStream::new(images.view(), &config, 2, &mut rng).unwrap();
    let (batches, generated) = generate_until(stream, &|n: usize| n >= 9);
    // batch sizes 2, 2, 1, 2, 2
    assert_eq!(generated, 9);
    assert_eq!(batches.len(), 5);
}

#[test]
fn empty_class_generates_nothing() {
    let images = Array4::<u8>::zeros((0, 4, 4, 3));
    let mut rng = StdRng::seed_from_u64(0);
    let out = augment_class(images.view(), 20, 10, 5, &AugmentationConfig::default(), false, &mut rng)
        .unwrap();
    assert_eq!(out.generated(), 0);
}
