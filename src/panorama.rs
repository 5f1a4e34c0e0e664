use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use image::{DynamicImage, ExtendedColorType, ImageReader};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;
use std::path::Path;

/// Byte order of a single panorama pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb,
    Rgba,
    /// Blue first, as uncompressed TGA stores it.
    Bgr,
    Bgra,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb | PixelLayout::Bgr => 3,
            PixelLayout::Rgba | PixelLayout::Bgra => 4,
        }
    }

    /// Offsets of the red, green and blue bytes inside one pixel.
    fn rgb_offsets(self) -> [usize; 3] {
        match self {
            PixelLayout::Rgb | PixelLayout::Rgba => [0, 1, 2],
            PixelLayout::Bgr | PixelLayout::Bgra => [2, 1, 0],
        }
    }
}

/// Decoded fisheye panorama. Owns its pixel buffer (row-major, top row first).
#[derive(Clone)]
pub struct Panorama {
    width: u32,
    height: u32,
    layout: PixelLayout,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for Panorama {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panorama")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Panorama {
    /// Takes ownership of `pixels`; the buffer must hold exactly `width * height` pixels of `layout`.
    pub fn from_raw(width: u32, height: u32, layout: PixelLayout, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("Panorama dimensions must be non-zero (got {width}x{height})");
        }
        let expected = width as usize * height as usize * layout.channels();
        if pixels.len() != expected {
            bail!(
                "Panorama buffer holds {} bytes, expected {expected} for {width}x{height} {layout:?}",
                pixels.len()
            );
        }
        Ok(Self { width, height, layout, pixels })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = ImageReader::open(path)
            .with_context(|| format!("opening panorama '{}'", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("probing panorama format of '{}'", path.display()))?;
        let image = reader.decode().with_context(|| format!("decoding panorama '{}'", path.display()))?;
        Self::from_dynamic(image)
    }

    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        match image {
            DynamicImage::ImageRgb8(rgb) => Self::from_raw(width, height, PixelLayout::Rgb, rgb.into_raw()),
            DynamicImage::ImageRgba8(rgba) => {
                Self::from_raw(width, height, PixelLayout::Rgba, rgba.into_raw())
            }
            other => Self::from_raw(width, height, PixelLayout::Rgb, other.to_rgb8().into_raw()),
        }
    }

    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let pixels = rgb.iter().copied().cycle().take(count * 3).collect();
        Self { width, height, layout: PixelLayout::Rgb, pixels }
    }

    /// Synthetic fisheye sky: zenith-to-horizon gradient plus a small sun, ground colour outside the disc.
    pub fn generated_sky(size: u32) -> Self {
        let size = size.max(2);
        let radius = size as f32 * 0.5;
        let center = Vec2::splat(radius);
        let sun_dir = Vec3::new(0.45, 0.6, 0.2).normalize();
        let mut pixels = Vec::with_capacity((size * size * 3) as usize);
        for y in 0..size {
            for x in 0..size {
                let offset = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center;
                let r = offset.length() / radius;
                let color = if r > 1.0 {
                    Vec3::new(0.18, 0.16, 0.13)
                } else {
                    let theta = r * FRAC_PI_2;
                    let planar = if r > 0.0 { offset / (r * radius) } else { Vec2::ZERO };
                    let dir = Vec3::new(theta.sin() * planar.x, theta.cos(), theta.sin() * planar.y);
                    let horizon = r * r;
                    let sky = Vec3::new(0.22, 0.36, 0.72) * (1.0 - horizon) + Vec3::new(0.75, 0.8, 0.88) * horizon;
                    let sun = dir.dot(sun_dir).max(0.0).powf(256.0);
                    (sky + Vec3::new(1.0, 0.92, 0.8) * sun).min(Vec3::ONE)
                };
                pixels.extend([
                    (color.x * 255.0).round() as u8,
                    (color.y * 255.0).round() as u8,
                    (color.z * 255.0).round() as u8,
                ]);
            }
        }
        Self { width: size, height: size, layout: PixelLayout::Rgb, pixels }
    }

    /// Encodes the panorama as RGB(A); the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let (bytes, color_type) = match self.layout {
            PixelLayout::Rgb => (self.pixels.clone(), ExtendedColorType::Rgb8),
            PixelLayout::Rgba => (self.pixels.clone(), ExtendedColorType::Rgba8),
            PixelLayout::Bgr | PixelLayout::Bgra => {
                let mut swapped = self.pixels.clone();
                for px in swapped.chunks_exact_mut(self.layout.channels()) {
                    px.swap(0, 2);
                }
                let color_type =
                    if self.layout == PixelLayout::Bgr { ExtendedColorType::Rgb8 } else { ExtendedColorType::Rgba8 };
                (swapped, color_type)
            }
        };
        image::save_buffer(path, &bytes, self.width, self.height, color_type)
            .with_context(|| format!("writing panorama '{}'", path.display()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// RGB in byte units. Caller guarantees `x < width` and `y < height`.
    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        let base = (y as usize * self.width as usize + x as usize) * self.layout.channels();
        let [r, g, b] = self.layout.rgb_offsets();
        Vec3::new(self.pixels[base + r] as f32, self.pixels[base + g] as f32, self.pixels[base + b] as f32)
    }

    pub fn try_pixel(&self, x: i64, y: i64) -> Option<Vec3> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.pixel(x as u32, y as u32))
    }

    pub fn sky_center(&self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }

    pub fn default_sky_diameter(&self) -> f32 {
        self.width.min(self.height) as f32
    }
}

/// Where the ambient/border colour comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientSource {
    /// Linear colour in [0, 1] per channel.
    Color([f32; 3]),
    ReferencePixel { x: u32, y: u32 },
}

impl Default for AmbientSource {
    fn default() -> Self {
        AmbientSource::ReferencePixel { x: 0, y: 0 }
    }
}

impl AmbientSource {
    /// Ambient colour in [0, 1].
    pub fn resolve(&self, panorama: &Panorama) -> Result<Vec3> {
        match *self {
            AmbientSource::Color(rgb) => Ok(Vec3::from_array(rgb).clamp(Vec3::ZERO, Vec3::ONE)),
            AmbientSource::ReferencePixel { x, y } => panorama
                .try_pixel(x as i64, y as i64)
                .map(|rgb| rgb / 255.0)
                .ok_or_else(|| {
                    anyhow!(
                        "Ambient reference pixel ({x}, {y}) is outside the {}x{} panorama",
                        panorama.width(),
                        panorama.height()
                    )
                }),
        }
    }
}
