use crate::error::ConfigError;
use crate::panorama::Panorama;
use crate::projection::{paraboloid_to_direction, solid_angle_factor, texel_to_uv, Chart, FisheyeProjection};
use crate::sampler::{RotatedSamples, SampleSet};
use crate::texture::{quantize_rgb, MapTexture};
use glam::Vec3;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Integration strategy selected at runtime.
///
/// Only `Convolution` reproduces a uniform sky exactly at every in-disc texel. `Stochastic` lobes tilted
/// towards the horizon also sample the ground, which contributes the ambient colour, so a uniform gray sky
/// over a darker ambient bakes darker towards the rim by the (1 + cos)/2 sky view factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStrategy {
    /// Point-samples the panorama along importance-sampled directions.
    #[default]
    Stochastic,
    /// Weighted sum over every (budgeted) source pixel in the visible disc.
    Convolution,
}

impl IntegrationStrategy {
    pub fn label(self) -> &'static str {
        match self {
            IntegrationStrategy::Stochastic => "stochastic",
            IntegrationStrategy::Convolution => "convolution",
        }
    }
}

/// Incoming radiance around a direction, in byte units.
pub trait RadianceIntegrator: Send + Sync {
    fn label(&self) -> &'static str;

    /// Expected number of rotated directions per call, used to size worker scratch buffers.
    fn scratch_len(&self) -> usize {
        0
    }

    fn integrate(&self, direction: Vec3, scratch: &mut RotatedSamples) -> Vec3;
}

/// Monte-Carlo estimate using a shared cosine-power sample set.
pub struct StochasticIntegrator<'a> {
    panorama: &'a Panorama,
    fisheye: FisheyeProjection,
    samples: Arc<SampleSet>,
    ambient: Vec3,
}

impl<'a> StochasticIntegrator<'a> {
    /// `ambient` is in [0, 1]; it is scaled to byte units internally.
    pub fn new(panorama: &'a Panorama, fisheye: FisheyeProjection, samples: Arc<SampleSet>, ambient: Vec3) -> Self {
        Self { panorama, fisheye, samples, ambient: ambient * 255.0 }
    }

    fn radiance(&self, dir: Vec3) -> Vec3 {
        let Some(point) = self.fisheye.direction_to_image(dir) else {
            return self.ambient;
        };
        let (x, y) = (point.x.floor() as i64, point.y.floor() as i64);
        self.panorama.try_pixel(x, y).unwrap_or(self.ambient)
    }
}

impl RadianceIntegrator for StochasticIntegrator<'_> {
    fn label(&self) -> &'static str {
        IntegrationStrategy::Stochastic.label()
    }

    fn scratch_len(&self) -> usize {
        self.samples.len()
    }

    fn integrate(&self, direction: Vec3, scratch: &mut RotatedSamples) -> Vec3 {
        if self.samples.is_empty() {
            return self.ambient;
        }
        let rotated = self.samples.rotate_into(direction, scratch);
        let sum = rotated
            .iter()
            .fold(Vec3::ZERO, |acc, &dir| acc + if dir.y <= 0.0 { self.ambient } else { self.radiance(dir) });
        sum / rotated.len() as f32
    }
}

#[derive(Debug, Clone, Copy)]
struct SourceTap {
    direction: Vec3,
    color: Vec3,
    solid_angle: f32,
}

/// Deterministic cosine-power convolution over the visible sky disc.
pub struct ConvolutionIntegrator {
    taps: Vec<SourceTap>,
    shininess: f32,
    ambient: Vec3,
}

impl ConvolutionIntegrator {
    /// Collects at most roughly `budget` source taps, striding the panorama when the disc is larger.
    pub fn new(panorama: &Panorama, fisheye: FisheyeProjection, shininess: f32, budget: usize, ambient: Vec3) -> Self {
        let disc_pixels = std::f32::consts::PI * fisheye.radius() * fisheye.radius();
        let stride = ((disc_pixels / budget.max(1) as f32).sqrt().ceil() as u32).max(1);
        let mut taps = Vec::new();
        for y in (0..panorama.height()).step_by(stride as usize) {
            for x in (0..panorama.width()).step_by(stride as usize) {
                let Some(direction) = fisheye.pixel_direction(x, y) else {
                    continue;
                };
                let theta = direction.y.clamp(-1.0, 1.0).acos();
                taps.push(SourceTap { direction, color: panorama.pixel(x, y), solid_angle: solid_angle_factor(theta) });
            }
        }
        debug!("convolution integrator: {} taps (stride {stride}) for shininess {shininess}", taps.len());
        Self { taps, shininess, ambient: ambient * 255.0 }
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    fn weight(&self, direction: Vec3, tap: &SourceTap) -> f32 {
        let cos = direction.dot(tap.direction);
        if cos <= 0.0 {
            return 0.0;
        }
        cos.powf(self.shininess) * tap.solid_angle
    }

    /// Per-tap (source direction, weight) pairs for a query direction.
    pub fn tap_weights(&self, direction: Vec3) -> Vec<(Vec3, f32)> {
        self.taps.iter().map(|tap| (tap.direction, self.weight(direction, tap))).collect()
    }
}

impl RadianceIntegrator for ConvolutionIntegrator {
    fn label(&self) -> &'static str {
        IntegrationStrategy::Convolution.label()
    }

    fn integrate(&self, direction: Vec3, _scratch: &mut RotatedSamples) -> Vec3 {
        let (sum, total) = self.taps.iter().fold((Vec3::ZERO, 0.0f32), |(sum, total), tap| {
            let weight = self.weight(direction, tap);
            (sum + tap.color * weight, total + weight)
        });
        if total > 0.0 && total.is_finite() {
            sum / total
        } else {
            self.ambient
        }
    }
}

/// Bakes a `size`x`size` upper-paraboloid map. Texels outside the unit disc receive `ambient` exactly.
pub fn bake_map(
    integrator: &dyn RadianceIntegrator,
    size: u32,
    ambient: Vec3,
) -> Result<MapTexture, ConfigError> {
    if size < 2 {
        return Err(ConfigError::Resolution { map: integrator.label(), value: size });
    }
    let border = quantize_rgb(ambient * 255.0);
    let scratch_len = integrator.scratch_len();
    let mut texture = MapTexture::new(size);
    let rows: Vec<&mut [u8]> = texture.rows_mut().collect();
    rows.into_par_iter().enumerate().for_each_init(
        || RotatedSamples::with_capacity(scratch_len),
        |scratch, (y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let uv = texel_to_uv(x as u32, y as u32, size);
                let rgb = match paraboloid_to_direction(uv, Chart::Upper) {
                    Some(direction) => quantize_rgb(integrator.integrate(direction.normalize(), scratch)),
                    None => border,
                };
                px.copy_from_slice(&rgb);
            }
        },
    );
    Ok(texture)
}
