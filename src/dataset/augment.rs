//! Random geometric augmentation of one age class
//!
//! [`AugmentationStream`] is an endless source of transformed batches: it
//! walks the class in shuffled order, reshuffles after every pass and never
//! ends on its own. [`augment_class`] drains it under a [`StopPolicy`] and
//! is the only place that decides when a class has enough samples.

use log::debug;
use ndarray::{Array1, Array3, Array4, ArrayView3, ArrayView4, Axis, Slice, concatenate, stack};
use rand::Rng;
use rand::seq::SliceRandom;

use super::CHANNELS;
use crate::config::{AugmentationConfig, FillMode};
use crate::error::{FaceAgeError, Result};

/// One sampled transform, applied about the image centre
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomTransform {
    /// Rotation in radians
    pub rotation: f64,
    /// Horizontal shift in pixels
    pub shift_x: f64,
    /// Vertical shift in pixels
    pub shift_y: f64,
    /// Shear angle in radians
    pub shear: f64,
    pub zoom_x: f64,
    pub zoom_y: f64,
    pub flip_horizontal: bool,
}

impl RandomTransform {
    /// Transform that maps every pixel to itself
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            rotation: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
            shear: 0.0,
            zoom_x: 1.0,
            zoom_y: 1.0,
            flip_horizontal: false,
        }
    }

    /// Draw a transform for a `height × width` image
    pub fn sample<R: Rng + ?Sized>(
        config: &AugmentationConfig,
        height: usize,
        width: usize,
        rng: &mut R,
    ) -> Self {
        let (zoom_x, zoom_y) = if config.zoom_range > 0.0 {
            let range = (1.0 - config.zoom_range)..=(1.0 + config.zoom_range);
            (rng.random_range(range.clone()), rng.random_range(range))
        } else {
            (1.0, 1.0)
        };
        Self {
            rotation: symmetric(rng, config.rotation_range).to_radians(),
            shift_x: symmetric(rng, config.width_shift_range) * width as f64,
            shift_y: symmetric(rng, config.height_shift_range) * height as f64,
            shear: symmetric(rng, config.shear_range),
            zoom_x,
            zoom_y,
            flip_horizontal: config.horizontal_flip && rng.random_bool(0.5),
        }
    }

    /// Matrix taking centred output coordinates to centred input coordinates
    fn matrix(&self) -> [[f64; 3]; 3] {
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let rotation = [[cos_r, -sin_r, 0.0], [sin_r, cos_r, 0.0], [0.0, 0.0, 1.0]];
        let shift = [[1.0, 0.0, self.shift_x], [0.0, 1.0, self.shift_y], [0.0, 0.0, 1.0]];
        let shear = [[1.0, -self.shear.sin(), 0.0], [0.0, self.shear.cos(), 0.0], [0.0, 0.0, 1.0]];
        let zoom = [[self.zoom_x, 0.0, 0.0], [0.0, self.zoom_y, 0.0], [0.0, 0.0, 1.0]];
        mat_mul(&mat_mul(&mat_mul(&rotation, &shift), &shear), &zoom)
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, range: f64) -> f64 {
    if range > 0.0 {
        rng.random_range(-range..=range)
    } else {
        0.0
    }
}

fn mat_mul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Map a possibly out-of-range index into `0..len`, or `None` for constant fill
fn resolve_index(index: i64, len: usize, fill: FillMode) -> Option<usize> {
    let n = len as i64;
    if (0..n).contains(&index) {
        return Some(index as usize);
    }
    match fill {
        FillMode::Constant { .. } => None,
        FillMode::Nearest => Some(index.clamp(0, n - 1) as usize),
        FillMode::Reflect => {
            let m = index.rem_euclid(2 * n);
            Some(if m >= n { 2 * n - 1 - m } else { m } as usize)
        }
        FillMode::Wrap => Some(index.rem_euclid(n) as usize),
    }
}

/// Apply a transform to one `H×W×3` image with bilinear sampling
#[must_use]
pub fn apply_transform(image: ArrayView3<'_, u8>, transform: &RandomTransform, fill: FillMode) -> Array3<u8> {
    let (height, width, channels) = image.dim();
    if height == 0 || width == 0 {
        return image.to_owned();
    }
    let constant = match fill {
        FillMode::Constant { value } => f64::from(value),
        _ => 0.0,
    };
    let m = transform.matrix();
    let cx = (width as f64 - 1.0) / 2.0;
    let cy = (height as f64 - 1.0) / 2.0;

    let mut out = Array3::<u8>::zeros((height, width, channels));
    for y in 0..height {
        for x in 0..width {
            let ox = if transform.flip_horizontal { width - 1 - x } else { x };
            let u = ox as f64 - cx;
            let v = y as f64 - cy;
            let sx = m[0][0] * u + m[0][1] * v + m[0][2] + cx;
            let sy = m[1][0] * u + m[1][1] * v + m[1][2] + cy;

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = sx - x0;
            let fy = sy - y0;
            let corners = [
                (x0 as i64, y0 as i64, (1.0 - fx) * (1.0 - fy)),
                (x0 as i64 + 1, y0 as i64, fx * (1.0 - fy)),
                (x0 as i64, y0 as i64 + 1, (1.0 - fx) * fy),
                (x0 as i64 + 1, y0 as i64 + 1, fx * fy),
            ];
            for c in 0..channels {
                let mut value = 0.0;
                for &(ix, iy, weight) in &corners {
                    if weight == 0.0 {
                        continue;
                    }
                    let sample = match (resolve_index(ix, width, fill), resolve_index(iy, height, fill)) {
                        (Some(px), Some(py)) => f64::from(image[[py, px, c]]),
                        _ => constant,
                    };
                    value += weight * sample;
                }
                out[[y, x, c]] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Endless stream of transformed batches drawn from one class
///
/// Each pass visits every input image once in a fresh random order. The last
/// batch of a pass may be shorter than `batch_size`. Yields `None` only when
/// the input is empty.
pub struct AugmentationStream<'a, 'r, R: Rng + ?Sized> {
    images: ArrayView4<'a, u8>,
    config: &'r AugmentationConfig,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
    rng: &'r mut R,
}

impl<'a, 'r, R: Rng + ?Sized> AugmentationStream<'a, 'r, R> {
    pub fn new(
        images: ArrayView4<'a, u8>,
        config: &'r AugmentationConfig,
        batch_size: usize,
        rng: &'r mut R,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(FaceAgeError::invalid_parameter("batch_size", 0));
        }
        config.validate()?;
        let order = (0..images.len_of(Axis(0))).collect();
        Ok(Self {
            images,
            config,
            batch_size,
            order,
            cursor: 0,
            rng,
        })
    }
}

impl<R: Rng + ?Sized> Iterator for AugmentationStream<'_, '_, R> {
    type Item = Array4<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.order.is_empty() {
            return None;
        }
        if self.cursor == 0 || self.cursor >= self.order.len() {
            self.order.shuffle(&mut *self.rng);
            self.cursor = 0;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let (_, height, width, _) = self.images.dim();

        let transformed: Vec<Array3<u8>> = self.order[self.cursor..end]
            .iter()
            .map(|&i| {
                let transform = RandomTransform::sample(self.config, height, width, &mut *self.rng);
                apply_transform(self.images.index_axis(Axis(0), i), &transform, self.config.fill_mode)
            })
            .collect();
        self.cursor = end;

        let views: Vec<_> = transformed.iter().map(Array3::view).collect();
        stack(Axis(0), &views).ok()
    }
}

/// Decides, after each batch, whether generation is finished
pub trait StopPolicy {
    fn should_stop(&self, generated: usize) -> bool;
}

impl<F: Fn(usize) -> bool> StopPolicy for F {
    fn should_stop(&self, generated: usize) -> bool {
        self(generated)
    }
}

/// Stop once more than `deficit` samples have been generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopCondition {
    pub deficit: usize,
}

impl StopCondition {
    /// Deficit of a class holding `original` samples against `quota`
    #[must_use]
    pub const fn for_quota(quota: usize, original: usize) -> Self {
        Self {
            deficit: quota.saturating_sub(original),
        }
    }
}

impl StopPolicy for StopCondition {
    fn should_stop(&self, generated: usize) -> bool {
        generated > self.deficit
    }
}

/// Synthetic samples produced for one age
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAugmentation {
    pub age: i64,
    /// Real samples of the class that went into the generator
    pub original: usize,
    /// Synthetic images only
    pub images: Array4<u8>,
    pub labels: Array1<i64>,
    pub batches: usize,
}

impl ClassAugmentation {
    #[must_use]
    pub fn generated(&self) -> usize {
        self.labels.len()
    }

    /// Real plus synthetic samples
    #[must_use]
    pub fn total(&self) -> usize {
        self.original + self.generated()
    }
}

/// Pull batches from `stream` until `policy` is satisfied
///
/// Returns the batches and the number of samples they hold. Ends early if
/// the stream runs dry.
pub fn generate_until<I, P>(stream: I, policy: &P) -> (Vec<Array4<u8>>, usize)
where
    I: Iterator<Item = Array4<u8>>,
    P: StopPolicy + ?Sized,
{
    let mut batches = Vec::new();
    let mut generated = 0;
    for batch in stream {
        generated += batch.len_of(Axis(0));
        batches.push(batch);
        if policy.should_stop(generated) {
            break;
        }
    }
    (batches, generated)
}

/// Generate synthetic samples for a class until it exceeds `quota`
///
/// A class already at or above the quota gets no synthetic samples. With
/// `trim` the overshoot of the final batch is dropped so the class ends at
/// exactly `quota`.
pub fn augment_class<R: Rng + ?Sized>(
    images: ArrayView4<'_, u8>,
    age: i64,
    quota: usize,
    batch_size: usize,
    config: &AugmentationConfig,
    trim: bool,
    rng: &mut R,
) -> Result<ClassAugmentation> {
    let (original, height, width, _) = images.dim();
    let empty = |original| ClassAugmentation {
        age,
        original,
        images: Array4::zeros((0, height, width, CHANNELS)),
        labels: Array1::zeros(0),
        batches: 0,
    };
    if original == 0 || original >= quota {
        return Ok(empty(original));
    }

    let stop = StopCondition::for_quota(quota, original);
    let stream = AugmentationStream::new(images, config, batch_size, rng)?;
    let (batches, generated) = generate_until(stream, &stop);
    if batches.is_empty() {
        return Ok(empty(original));
    }

    let views: Vec<_> = batches.iter().map(Array4::view).collect();
    let mut synthetic = concatenate(Axis(0), &views)?;
    let mut count = generated;
    if trim && count > stop.deficit {
        synthetic = synthetic
            .slice_axis(Axis(0), Slice::from(..stop.deficit))
            .to_owned();
        count = stop.deficit;
    }
    debug!(
        "Age {age}: {original} real + {count} synthetic in {} batches",
        batches.len()
    );

    Ok(ClassAugmentation {
        age,
        original,
        images: synthetic,
        labels: Array1::from_elem(count, age),
        batches: batches.len(),
    })
}
