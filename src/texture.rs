use crate::projection::{direction_to_paraboloid, uv_to_texel, Chart};
use anyhow::{bail, Context, Result};
use glam::Vec3;
use image::{ExtendedColorType, ImageReader};
use std::path::Path;

/// Round-to-nearest quantization of a byte-unit channel value.
pub fn quantize(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

pub fn quantize_rgb(color: Vec3) -> [u8; 3] {
    [quantize(color.x), quantize(color.y), quantize(color.z)]
}

/// Square RGB8 paraboloid map produced by a bake.
#[derive(Clone, PartialEq, Eq)]
pub struct MapTexture {
    size: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for MapTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapTexture").field("size", &self.size).finish_non_exhaustive()
    }
}

impl MapTexture {
    pub fn new(size: u32) -> Self {
        Self { size, pixels: vec![0; size as usize * size as usize * 3] }
    }

    pub(crate) fn from_pixels(size: u32, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != size as usize * size as usize * 3 {
            bail!("Map buffer holds {} bytes, expected {size}x{size} RGB", pixels.len());
        }
        Ok(Self { size, pixels })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Tightly packed RGB rows, top row first; the layout texture uploads expect.
    pub fn as_rgb_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, u8> {
        let row = self.size as usize * 3;
        self.pixels.chunks_exact_mut(row)
    }

    pub fn texel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.size as usize + x as usize) * 3;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    /// Looks the map up by a normal or reflection vector, returning `border` where the map has no data.
    pub fn lookup(&self, direction: Vec3, border: [u8; 3]) -> [u8; 3] {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return border;
        }
        let (uv, chart) = direction_to_paraboloid(dir);
        if chart == Chart::Lower || uv.length_squared() > 1.0 {
            return border;
        }
        let (x, y) = uv_to_texel(uv, self.size);
        self.texel(x, y)
    }

    /// Mean colour over all texels, handy for diagnostics.
    pub fn mean(&self) -> Vec3 {
        let count = (self.size as usize * self.size as usize).max(1) as f32;
        let sum = self
            .pixels
            .chunks_exact(3)
            .fold(Vec3::ZERO, |acc, px| acc + Vec3::new(px[0] as f32, px[1] as f32, px[2] as f32));
        sum / count
    }

    /// Encodes the map; the format follows the file extension (`tga`, `png`).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        image::save_buffer(path, &self.pixels, self.size, self.size, ExtendedColorType::Rgb8)
            .with_context(|| format!("writing map '{}'", path.display()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = ImageReader::open(path)
            .with_context(|| format!("opening map '{}'", path.display()))?
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("decoding map '{}'", path.display()))?;
        if image.width() != image.height() {
            bail!("Map '{}' is {}x{}, expected a square image", path.display(), image.width(), image.height());
        }
        Self::from_pixels(image.width(), image.to_rgb8().into_raw())
    }
}
