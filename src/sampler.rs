use glam::{Mat3, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// One importance-sampled direction around the +Y pole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereSample {
    pub direction: Vec3,
    /// Cosine to the pole, kept so callers need not recompute it after rotation.
    pub cos_pole: f32,
}

/// Builds cosine-power distributed hemisphere samples with its own seeded generator.
pub struct HemisphereSampler {
    rng: SmallRng,
}

impl HemisphereSampler {
    pub fn new(seed: u64) -> Self {
        Self { rng: SmallRng::seed_from_u64(seed) }
    }

    /// Draws `count` directions with density proportional to cos(theta)^shininess.
    pub fn sample_set(&mut self, count: usize, shininess: f32) -> SampleSet {
        let exponent = 1.0 / (shininess.max(0.0) + 1.0);
        let samples = (0..count)
            .map(|_| {
                let u: f32 = self.rng.gen();
                let v: f32 = self.rng.gen();
                let y = (1.0 - u).powf(exponent).clamp(0.0, 1.0);
                let r = (1.0 - y * y).max(0.0).sqrt();
                let t = TAU * v;
                HemisphereSample { direction: Vec3::new(r * t.cos(), y, r * t.sin()), cos_pole: y }
            })
            .collect();
        SampleSet { samples }
    }
}

/// Immutable set of directions around the +Y pole.
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<HemisphereSample>,
}

impl SampleSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[HemisphereSample] {
        &self.samples
    }

    pub fn mean_cosine(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.cos_pole).sum::<f32>() / self.samples.len() as f32
    }

    /// Writes the set re-oriented so its pole points along `target` into `scratch`.
    pub fn rotate_into<'a>(&self, target: Vec3, scratch: &'a mut RotatedSamples) -> &'a [Vec3] {
        scratch.directions.clear();
        match pole_basis(target) {
            Some(basis) => {
                scratch.directions.extend(self.samples.iter().map(|s| basis * s.direction));
            }
            None => scratch.directions.extend(self.samples.iter().map(|s| s.direction)),
        }
        &scratch.directions
    }
}

/// Per-worker buffer for rotated directions, reused from texel to texel.
#[derive(Debug, Default)]
pub struct RotatedSamples {
    directions: Vec<Vec3>,
}

impl RotatedSamples {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { directions: Vec::with_capacity(capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.directions.capacity()
    }
}

/// Basis taking +Y to `n`; `None` when `n` has no horizontal component.
fn pole_basis(n: Vec3) -> Option<Mat3> {
    let a = n.x * n.x + n.z * n.z;
    if a <= 0.0 {
        return None;
    }
    let inv = a.sqrt().recip();
    let u = Vec3::new(-n.z * inv, 0.0, n.x * inv);
    let w = u.cross(n);
    Some(Mat3::from_cols(u, n, w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_unit_length_in_the_upper_hemisphere() {
        let mut sampler = HemisphereSampler::new(7);
        for shininess in [0.0, 1.0, 20.0, 150.0] {
            let set = sampler.sample_set(512, shininess);
            assert_eq!(set.len(), 512);
            for sample in set.samples() {
                assert!((sample.direction.length() - 1.0).abs() < 1e-5);
                assert!((0.0..=1.0).contains(&sample.direction.y));
                assert_eq!(sample.cos_pole, sample.direction.y);
            }
        }
    }

    #[test]
    fn higher_shininess_concentrates_samples_at_the_pole() {
        let mut sampler = HemisphereSampler::new(3);
        let uniform = sampler.sample_set(4096, 0.0).mean_cosine();
        let diffuse = sampler.sample_set(4096, 1.0).mean_cosine();
        let glossy = sampler.sample_set(4096, 100.0).mean_cosine();
        // E[cos] = (n + 1) / (n + 2)
        assert!((uniform - 0.5).abs() < 0.03);
        assert!((diffuse - 2.0 / 3.0).abs() < 0.03);
        assert!(glossy > 0.98);
    }

    #[test]
    fn same_seed_reproduces_the_set() {
        let a = HemisphereSampler::new(42).sample_set(64, 8.0);
        let b = HemisphereSampler::new(42).sample_set(64, 8.0);
        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn rotating_to_the_pole_is_identity() {
        let set = HemisphereSampler::new(1).sample_set(128, 1.0);
        let mut scratch = RotatedSamples::default();
        let rotated = set.rotate_into(Vec3::Y, &mut scratch);
        for (rotated, original) in rotated.iter().zip(set.samples()) {
            assert_eq!(*rotated, original.direction);
        }
    }

    #[test]
    fn rotating_to_the_antipode_copies_the_set_unchanged() {
        let set = HemisphereSampler::new(2).sample_set(128, 6.0);
        let mut scratch = RotatedSamples::with_capacity(set.len());
        let rotated = set.rotate_into(-Vec3::Y, &mut scratch);
        assert_eq!(rotated.len(), set.len());
        for (rotated, original) in rotated.iter().zip(set.samples()) {
            assert_eq!(*rotated, original.direction);
        }
    }

    #[test]
    fn rotation_moves_the_pole_and_preserves_angles() {
        let set = HemisphereSampler::new(9).sample_set(256, 4.0);
        let target = Vec3::new(0.6, 0.3, -0.5).normalize();
        let mut scratch = RotatedSamples::with_capacity(set.len());
        let rotated = set.rotate_into(target, &mut scratch).to_vec();
        for (dir, original) in rotated.iter().zip(set.samples()) {
            assert!((dir.length() - 1.0).abs() < 1e-5);
            assert!((dir.dot(target) - original.cos_pole).abs() < 1e-5);
        }
        let angle_before = set.samples()[0].direction.dot(set.samples()[1].direction);
        let angle_after = rotated[0].dot(rotated[1]);
        assert!((angle_before - angle_after).abs() < 1e-5);
    }

    #[test]
    fn scratch_is_reused_without_growing() {
        let set = HemisphereSampler::new(5).sample_set(100, 1.0);
        let mut scratch = RotatedSamples::with_capacity(set.len());
        let capacity = scratch.capacity();
        for i in 0..10 {
            let target = Vec3::new(i as f32 * 0.1, 1.0, 0.2).normalize();
            set.rotate_into(target, &mut scratch);
        }
        assert_eq!(scratch.capacity(), capacity);
    }
}
