use thiserror::Error;

/// Bake settings that cannot produce a meaningful map. Raised before any integration starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{map} shininess must be a positive finite number (got {value})")]
    Shininess { map: &'static str, value: f32 },
    #[error("{map} sample count must be at least 1")]
    SampleCount { map: &'static str },
    #[error("{map} resolution must be at least 2 (got {value})")]
    Resolution { map: &'static str, value: u32 },
    #[error("visible sky diameter must be positive (got {0})")]
    SkyDiameter(f32),
}
