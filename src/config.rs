use crate::builder::{BakeSettings, FailurePolicy, MapSettings};
use crate::integrator::IntegrationStrategy;
use crate::panorama::AmbientSource;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct BakeConfig {
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default = "BakeConfig::default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "BakeConfig::default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub sky_diameter: Option<f32>,
    #[serde(default)]
    pub ambient: AmbientSource,
    #[serde(default = "MapSettings::irradiance")]
    pub irradiance: MapSettings,
    #[serde(default = "MapSettings::environment")]
    pub environment: MapSettings,
    #[serde(default)]
    pub strategy: IntegrationStrategy,
    #[serde(default = "BakeConfig::default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Default)]
pub struct BakeOverrides {
    pub sources: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub strategy: Option<IntegrationStrategy>,
    pub seed: Option<u64>,
    pub glossiness: Option<f32>,
    pub fail_fast: Option<bool>,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            output_dir: Self::default_output_dir(),
            output_format: Self::default_output_format(),
            sky_diameter: None,
            ambient: AmbientSource::default(),
            irradiance: MapSettings::irradiance(),
            environment: MapSettings::environment(),
            strategy: IntegrationStrategy::default(),
            seed: Self::default_seed(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl BakeConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from("maps")
    }

    fn default_output_format() -> String {
        "tga".to_string()
    }

    const fn default_seed() -> u64 {
        1
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    /// Sources given on the command line replace the configured list.
    pub fn apply_overrides(&mut self, overrides: &BakeOverrides) {
        if !overrides.sources.is_empty() {
            self.sources = overrides.sources.clone();
        }
        if let Some(dir) = overrides.output_dir.as_ref() {
            self.output_dir = dir.clone();
        }
        if let Some(strategy) = overrides.strategy {
            self.strategy = strategy;
        }
        if let Some(seed) = overrides.seed {
            self.seed = seed;
        }
        if let Some(glossiness) = overrides.glossiness {
            self.environment.shininess = glossiness;
        }
        if let Some(fail_fast) = overrides.fail_fast {
            self.failure_policy = if fail_fast { FailurePolicy::FailFast } else { FailurePolicy::Continue };
        }
    }

    pub fn to_settings(&self) -> BakeSettings {
        BakeSettings {
            irradiance: self.irradiance,
            environment: self.environment,
            strategy: self.strategy,
            sky_diameter: self.sky_diameter,
            ambient: self.ambient,
            seed: self.seed,
        }
    }
}

impl BakeOverrides {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
            && self.output_dir.is_none()
            && self.strategy.is_none()
            && self.seed.is_none()
            && self.glossiness.is_none()
            && self.fail_fast.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: BakeConfig = serde_json::from_str(r#"{ "sources": ["a.tga"] }"#).expect("parse");
        assert_eq!(cfg.sources, vec![PathBuf::from("a.tga")]);
        assert_eq!(cfg.output_format, "tga");
        assert_eq!(cfg.irradiance, MapSettings::irradiance());
        assert_eq!(cfg.strategy, IntegrationStrategy::Stochastic);
        assert_eq!(cfg.failure_policy, FailurePolicy::Continue);
        assert!(cfg.to_settings().validate().is_ok());
    }

    #[test]
    fn parses_full_config() {
        let json = r#"{
            "output_dir": "out",
            "sky_diameter": 960,
            "ambient": { "color": [0.2, 0.3, 0.4] },
            "irradiance": { "resolution": 32, "samples": 128, "shininess": 1.0 },
            "environment": { "resolution": 128, "samples": 400, "shininess": 80.0 },
            "strategy": "convolution",
            "seed": 9,
            "failure_policy": "fail_fast"
        }"#;
        let cfg: BakeConfig = serde_json::from_str(json).expect("parse");
        let settings = cfg.to_settings();
        assert_eq!(settings.sky_diameter, Some(960.0));
        assert_eq!(settings.ambient, AmbientSource::Color([0.2, 0.3, 0.4]));
        assert_eq!(settings.environment.samples, 400);
        assert_eq!(settings.strategy, IntegrationStrategy::Convolution);
        assert_eq!(cfg.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn reference_pixel_ambient_parses() {
        let cfg: BakeConfig =
            serde_json::from_str(r#"{ "ambient": { "reference_pixel": { "x": 3, "y": 4 } } }"#).expect("parse");
        assert_eq!(cfg.ambient, AmbientSource::ReferencePixel { x: 3, y: 4 });
    }

    #[test]
    fn overrides_replace_configured_values() {
        let mut cfg = BakeConfig { sources: vec![PathBuf::from("old.tga")], ..BakeConfig::default() };
        let overrides = BakeOverrides {
            sources: vec![PathBuf::from("new.tga")],
            glossiness: Some(120.0),
            fail_fast: Some(true),
            ..BakeOverrides::default()
        };
        assert!(!overrides.is_empty());
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.sources, vec![PathBuf::from("new.tga")]);
        assert_eq!(cfg.environment.shininess, 120.0);
        assert_eq!(cfg.failure_policy, FailurePolicy::FailFast);
        assert_eq!(cfg.seed, 1);
    }

    #[test]
    fn load_reports_missing_files() {
        let err = BakeConfig::load("does/not/exist.json").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.json"));
    }
}
