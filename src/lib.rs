pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod integrator;
pub mod panorama;
pub mod projection;
pub mod sampler;
pub mod texture;

pub use builder::{BakeSettings, BakedMaps, MapBuilder, MapSettings};
pub use integrator::IntegrationStrategy;
pub use panorama::Panorama;
pub use texture::MapTexture;
