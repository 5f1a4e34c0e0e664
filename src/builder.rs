use crate::error::ConfigError;
use crate::integrator::{
    bake_map, ConvolutionIntegrator, IntegrationStrategy, RadianceIntegrator, StochasticIntegrator,
};
use crate::panorama::{AmbientSource, Panorama};
use crate::projection::FisheyeProjection;
use crate::sampler::{HemisphereSampler, SampleSet};
use crate::texture::{quantize_rgb, MapTexture};
use anyhow::{Context, Result};
use glam::Vec3;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Resolution, sample budget and lobe sharpness of one baked map.
///
/// `samples` is the per-texel budget of either strategy: the size of the stochastic sample set, or the
/// cap on source taps the convolution weighs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    pub resolution: u32,
    pub samples: usize,
    pub shininess: f32,
}

impl MapSettings {
    pub fn irradiance() -> Self {
        Self { resolution: 64, samples: 256, shininess: 1.0 }
    }

    pub fn environment() -> Self {
        Self { resolution: 256, samples: 512, shininess: 60.0 }
    }

    fn validate(&self, map: &'static str) -> Result<(), ConfigError> {
        if !(self.shininess.is_finite() && self.shininess > 0.0) {
            return Err(ConfigError::Shininess { map, value: self.shininess });
        }
        if self.samples == 0 {
            return Err(ConfigError::SampleCount { map });
        }
        if self.resolution <= 1 {
            return Err(ConfigError::Resolution { map, value: self.resolution });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure for that index and keep baking the rest.
    #[default]
    Continue,
    /// Abort the whole batch on the first failure.
    FailFast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BakeSettings {
    pub irradiance: MapSettings,
    pub environment: MapSettings,
    pub strategy: IntegrationStrategy,
    /// Visible sky diameter in source pixels; `None` uses the smaller image side.
    pub sky_diameter: Option<f32>,
    pub ambient: AmbientSource,
    pub seed: u64,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            irradiance: MapSettings::irradiance(),
            environment: MapSettings::environment(),
            strategy: IntegrationStrategy::default(),
            sky_diameter: None,
            ambient: AmbientSource::default(),
            seed: 1,
        }
    }
}

impl BakeSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.irradiance.validate("irradiance")?;
        self.environment.validate("environment")?;
        if let Some(diameter) = self.sky_diameter {
            if !(diameter.is_finite() && diameter > 0.0) {
                return Err(ConfigError::SkyDiameter(diameter));
            }
        }
        Ok(())
    }
}

/// Irradiance and environment maps baked from one panorama.
#[derive(Debug, Clone)]
pub struct BakedMaps {
    pub irradiance: MapTexture,
    pub environment: MapTexture,
    /// Ambient colour in [0, 1]; also the border colour for lookups outside the maps.
    pub border_color: Vec3,
}

impl BakedMaps {
    pub fn border_rgb(&self) -> [u8; 3] {
        quantize_rgb(self.border_color * 255.0)
    }
}

/// Receives each baked pair together with its batch index.
pub trait MapSink {
    fn accept(&mut self, index: usize, maps: &BakedMaps) -> Result<()>;
}

/// Writes `irradiance_NNN.<ext>` and `environment_NNN.<ext>` into a directory.
#[derive(Debug, Clone)]
pub struct DiskSink {
    output_dir: PathBuf,
    extension: String,
}

impl DiskSink {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self { output_dir: output_dir.into(), extension: extension.into() }
    }

    pub fn irradiance_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("irradiance_{index:03}.{}", self.extension))
    }

    pub fn environment_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("environment_{index:03}.{}", self.extension))
    }
}

impl MapSink for DiskSink {
    fn accept(&mut self, index: usize, maps: &BakedMaps) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating output directory '{}'", self.output_dir.display()))?;
        maps.irradiance.save(self.irradiance_path(index))?;
        maps.environment.save(self.environment_path(index))?;
        Ok(())
    }
}

/// In-memory maps addressable by batch index; failed entries stay empty.
#[derive(Debug, Default)]
pub struct MapLibrary {
    maps: Vec<Option<BakedMaps>>,
}

impl MapLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BakedMaps> {
        self.maps.get(index).and_then(Option::as_ref)
    }
}

impl MapSink for MapLibrary {
    fn accept(&mut self, index: usize, maps: &BakedMaps) -> Result<()> {
        if self.maps.len() <= index {
            self.maps.resize_with(index + 1, || None);
        }
        self.maps[index] = Some(maps.clone());
        Ok(())
    }
}

impl<A: MapSink, B: MapSink> MapSink for (A, B) {
    fn accept(&mut self, index: usize, maps: &BakedMaps) -> Result<()> {
        self.0.accept(index, maps)?;
        self.1.accept(index, maps)
    }
}

#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub source: PathBuf,
    pub error: Option<anyhow::Error>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|entry| entry.error.is_none()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|entry| entry.error.is_some())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Bakes irradiance/environment pairs. Sample sets are drawn once and shared by every bake.
pub struct MapBuilder {
    settings: BakeSettings,
    irradiance_samples: Arc<SampleSet>,
    environment_samples: Arc<SampleSet>,
}

impl MapBuilder {
    pub fn new(settings: BakeSettings) -> Result<Self> {
        settings.validate()?;
        let mut sampler = HemisphereSampler::new(settings.seed);
        let irradiance_samples =
            Arc::new(sampler.sample_set(settings.irradiance.samples, settings.irradiance.shininess));
        let environment_samples =
            Arc::new(sampler.sample_set(settings.environment.samples, settings.environment.shininess));
        debug!(
            "sample sets ready: irradiance mean cos {:.3}, environment mean cos {:.3}",
            irradiance_samples.mean_cosine(),
            environment_samples.mean_cosine()
        );
        Ok(Self { settings, irradiance_samples, environment_samples })
    }

    pub fn bake(&self, panorama: &Panorama) -> Result<BakedMaps> {
        let ambient = self.settings.ambient.resolve(panorama)?;
        let diameter = self.settings.sky_diameter.unwrap_or_else(|| panorama.default_sky_diameter());
        let fisheye = FisheyeProjection::new(panorama.sky_center(), diameter);
        let irradiance =
            self.bake_one(panorama, fisheye, &self.settings.irradiance, &self.irradiance_samples, ambient)?;
        let environment =
            self.bake_one(panorama, fisheye, &self.settings.environment, &self.environment_samples, ambient)?;
        Ok(BakedMaps { irradiance, environment, border_color: ambient })
    }

    fn bake_one<'p>(
        &self,
        panorama: &'p Panorama,
        fisheye: FisheyeProjection,
        map: &MapSettings,
        samples: &Arc<SampleSet>,
        ambient: Vec3,
    ) -> Result<MapTexture> {
        let integrator: Box<dyn RadianceIntegrator + 'p> = match self.settings.strategy {
            IntegrationStrategy::Stochastic => {
                Box::new(StochasticIntegrator::new(panorama, fisheye, samples.clone(), ambient))
            }
            IntegrationStrategy::Convolution => Box::new(ConvolutionIntegrator::new(
                panorama,
                fisheye,
                map.shininess,
                map.samples,
                ambient,
            )),
        };
        let started = Instant::now();
        let texture = bake_map(integrator.as_ref(), map.resolution, ambient)?;
        info!(
            "baked {}x{} map (shininess {}, {}) in {:.2?}, mean {:.1?}",
            map.resolution,
            map.resolution,
            map.shininess,
            integrator.label(),
            started.elapsed(),
            texture.mean()
        );
        Ok(texture)
    }

    pub fn bake_path(&self, path: &Path) -> Result<BakedMaps> {
        let panorama = Panorama::load(path)?;
        self.bake(&panorama).with_context(|| format!("baking maps for '{}'", path.display()))
    }

    /// Bakes every source in order; the batch index names the outputs.
    pub fn bake_batch<P: AsRef<Path>>(
        &self,
        sources: &[P],
        sink: &mut dyn MapSink,
        policy: FailurePolicy,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for (index, source) in sources.iter().enumerate() {
            let source = source.as_ref();
            info!("[{index}] baking '{}'", source.display());
            let outcome = self.bake_path(source).and_then(|maps| sink.accept(index, &maps));
            match outcome {
                Ok(()) => report.entries.push(BatchEntry { index, source: source.to_path_buf(), error: None }),
                Err(err) if policy == FailurePolicy::FailFast => {
                    return Err(err.context(format!("batch entry {index} ('{}') failed", source.display())));
                }
                Err(err) => {
                    warn!("[{index}] '{}' failed: {err:#}", source.display());
                    report.entries.push(BatchEntry { index, source: source.to_path_buf(), error: Some(err) });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_settings() -> BakeSettings {
        BakeSettings {
            irradiance: MapSettings { resolution: 8, samples: 64, shininess: 1.0 },
            environment: MapSettings { resolution: 8, samples: 64, shininess: 20.0 },
            ambient: AmbientSource::Color([0.2, 0.2, 0.2]),
            ..BakeSettings::default()
        }
    }

    #[test]
    fn degenerate_settings_are_rejected() {
        let mut settings = small_settings();
        settings.environment.shininess = 0.0;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::Shininess { map: "environment", value: 0.0 })
        );

        let mut settings = small_settings();
        settings.irradiance.samples = 0;
        assert_eq!(settings.validate(), Err(ConfigError::SampleCount { map: "irradiance" }));

        let mut settings = small_settings();
        settings.irradiance.resolution = 1;
        assert!(MapBuilder::new(settings).is_err());

        let mut settings = small_settings();
        settings.sky_diameter = Some(-4.0);
        assert_eq!(settings.validate(), Err(ConfigError::SkyDiameter(-4.0)));
    }

    #[test]
    fn bake_produces_both_maps_at_their_resolutions() {
        let mut settings = small_settings();
        settings.environment.resolution = 12;
        let builder = MapBuilder::new(settings).expect("builder");
        let maps = builder.bake(&Panorama::generated_sky(32)).expect("bake");
        assert_eq!(maps.irradiance.size(), 8);
        assert_eq!(maps.environment.size(), 12);
        assert_eq!(maps.border_rgb(), [51, 51, 51]);
    }

    #[test]
    fn convolution_honours_each_map_budget() {
        let pano = Panorama::generated_sky(64);
        let lobe = MapSettings { resolution: 8, samples: 1, shininess: 8.0 };
        let settings = BakeSettings {
            irradiance: lobe,
            environment: MapSettings { samples: 100_000, ..lobe },
            strategy: IntegrationStrategy::Convolution,
            ..small_settings()
        };
        let maps = MapBuilder::new(settings).expect("builder").bake(&pano).expect("bake");
        // A single-tap budget strides past the whole disc, leaving nothing but ambient.
        assert_eq!(maps.irradiance.texel(4, 4), maps.border_rgb());
        assert_ne!(maps.environment.texel(4, 4), maps.border_rgb());
        assert_ne!(maps.irradiance, maps.environment);
    }

    #[test]
    fn batch_continues_past_unreadable_sources() {
        let dir = tempdir().expect("temp dir");
        let good = dir.path().join("sky.tga");
        let pano = Panorama::generated_sky(16);
        pano.save(&good).expect("write sky");
        let missing = dir.path().join("missing.tga");

        let builder = MapBuilder::new(small_settings()).expect("builder");
        let mut library = MapLibrary::new();
        let report = builder
            .bake_batch(&[missing.clone(), good.clone()], &mut library, FailurePolicy::Continue)
            .expect("batch");
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed().map(|entry| entry.index).collect::<Vec<_>>(), vec![0]);
        assert!(library.get(0).is_none());
        assert!(library.get(1).is_some());
    }

    #[test]
    fn batch_fail_fast_stops_at_first_error() {
        let dir = tempdir().expect("temp dir");
        let builder = MapBuilder::new(small_settings()).expect("builder");
        let mut library = MapLibrary::new();
        let err = builder
            .bake_batch(&[dir.path().join("nope.tga")], &mut library, FailurePolicy::FailFast)
            .unwrap_err();
        assert!(format!("{err:#}").contains("batch entry 0"));
        assert!(library.is_empty());
    }

    #[test]
    fn disk_sink_names_outputs_by_index() {
        let dir = tempdir().expect("temp dir");
        let mut sink = DiskSink::new(dir.path().join("maps"), "tga");
        let builder = MapBuilder::new(small_settings()).expect("builder");
        let maps = builder.bake(&Panorama::generated_sky(16)).expect("bake");
        sink.accept(3, &maps).expect("write maps");
        assert!(dir.path().join("maps/irradiance_003.tga").is_file());
        assert!(dir.path().join("maps/environment_003.tga").is_file());
    }
}
