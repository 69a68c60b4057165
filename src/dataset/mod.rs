//! Labelled face datasets and the rebalancing pipeline
//!
//! A [`Dataset`] is an `N×H×W×3` pixel array with an `N`-long age label
//! array. Every reordering goes through an index list that is applied to both
//! arrays, so images and labels never drift apart.

pub mod augment;
pub mod npz;
pub mod pipeline;
pub mod pool;
pub mod resample;

use std::collections::BTreeMap;

use image::RgbImage;
use ndarray::{Array1, Array4, ArrayView1, ArrayView4, Axis, concatenate};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{FaceAgeError, Result};

pub use augment::{
    AugmentationStream, ClassAugmentation, RandomTransform, StopCondition, StopPolicy, apply_transform,
    augment_class, generate_until,
};
pub use pipeline::{ClassReport, RebalanceReport, rebalance_and_augment};
pub use pool::AgePool;
pub use resample::{ResampleOutcome, rebalance};

/// Number of colour channels of every image
pub const CHANNELS: usize = 3;

/// Images and age labels in lockstep
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    images: Array4<u8>,
    labels: Array1<i64>,
}

impl Dataset {
    /// Pair an image array with its labels
    pub fn new(images: Array4<u8>, labels: Array1<i64>) -> Result<Self> {
        if images.len_of(Axis(0)) != labels.len() {
            return Err(FaceAgeError::shape(format!(
                "{} images but {} labels",
                images.len_of(Axis(0)),
                labels.len()
            )));
        }
        if images.len_of(Axis(3)) != CHANNELS {
            return Err(FaceAgeError::shape(format!(
                "expected {CHANNELS} channels, got {}",
                images.len_of(Axis(3))
            )));
        }
        Ok(Self { images, labels })
    }

    /// Build from equally sized RGB images
    pub fn from_faces(faces: &[RgbImage], labels: Vec<i64>) -> Result<Self> {
        Self::new(faces_to_array(faces)?, Array1::from(labels))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn images(&self) -> ArrayView4<'_, u8> {
        self.images.view()
    }

    #[must_use]
    pub fn labels(&self) -> ArrayView1<'_, i64> {
        self.labels.view()
    }

    /// `(height, width)` of every image
    #[must_use]
    pub fn image_size(&self) -> (usize, usize) {
        (self.images.len_of(Axis(1)), self.images.len_of(Axis(2)))
    }

    /// Rows at `indices`, in that order (indices may repeat)
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            images: self.images.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Indices of every sample labelled `age`
    #[must_use]
    pub fn indices_of(&self, age: i64) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, &label)| (label == age).then_some(i))
            .collect()
    }

    /// Concatenate datasets with the same image size
    pub fn concat(parts: &[Self]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(FaceAgeError::shape("cannot concatenate zero datasets"));
        };
        if let Some(bad) = parts.iter().find(|p| p.image_size() != first.image_size()) {
            return Err(FaceAgeError::shape(format!(
                "image size {:?} does not match {:?}",
                bad.image_size(),
                first.image_size()
            )));
        }
        let images: Vec<_> = parts.iter().map(|p| p.images.view()).collect();
        let labels: Vec<_> = parts.iter().map(|p| p.labels.view()).collect();
        Self::new(
            concatenate(Axis(0), &images)?,
            concatenate(Axis(0), &labels)?,
        )
    }

    /// Apply one uniformly random permutation to images and labels alike
    #[must_use]
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut permutation: Vec<usize> = (0..self.len()).collect();
        permutation.shuffle(rng);
        self.select(&permutation)
    }

    /// Number of samples per age, in ascending age order
    #[must_use]
    pub fn label_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }
}

/// Stack equally sized RGB images into an `N×H×W×3` array
pub fn faces_to_array(faces: &[RgbImage]) -> Result<Array4<u8>> {
    let Some(first) = faces.first() else {
        return Ok(Array4::zeros((0, 0, 0, CHANNELS)));
    };
    let (width, height) = first.dimensions();
    let mut pixels = Vec::with_capacity(faces.len() * (width * height) as usize * CHANNELS);
    for face in faces {
        if face.dimensions() != (width, height) {
            return Err(FaceAgeError::shape(format!(
                "face of size {:?} in a batch of {:?}",
                face.dimensions(),
                (width, height)
            )));
        }
        pixels.extend_from_slice(face.as_raw());
    }
    Ok(Array4::from_shape_vec(
        (faces.len(), height as usize, width as usize, CHANNELS),
        pixels,
    )?)
}
