use glam::{Vec2, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Which half of the dual paraboloid a direction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chart {
    /// Directions with y >= 0.
    Upper,
    Lower,
}

/// Maps a unit direction onto its paraboloid chart. The result lies inside the unit disc.
pub fn direction_to_paraboloid(dir: Vec3) -> (Vec2, Chart) {
    let chart = if dir.y >= 0.0 { Chart::Upper } else { Chart::Lower };
    let denom = 1.0 + dir.y.abs();
    (Vec2::new(dir.x / denom, dir.z / denom), chart)
}

/// Inverse paraboloid mapping. Returns `None` for points strictly outside the unit disc.
pub fn paraboloid_to_direction(uv: Vec2, chart: Chart) -> Option<Vec3> {
    let m = uv.length_squared();
    let w = 1.0 - m;
    if w < 0.0 {
        return None;
    }
    let s = 1.0 / (1.0 + m);
    let y = match chart {
        Chart::Upper => w,
        Chart::Lower => -w,
    };
    Some(Vec3::new(2.0 * uv.x * s, y * s, 2.0 * uv.y * s))
}

/// Texel index to normalized chart coordinates; the outer texels land on -1 and 1.
pub fn texel_to_uv(x: u32, y: u32, size: u32) -> Vec2 {
    let last = (size.max(2) - 1) as f32;
    Vec2::new(2.0 * x as f32 / last - 1.0, 2.0 * y as f32 / last - 1.0)
}

/// Nearest texel for normalized chart coordinates, inverse of [`texel_to_uv`].
pub fn uv_to_texel(uv: Vec2, size: u32) -> (u32, u32) {
    let last = (size.max(2) - 1) as f32;
    let to_index = |c: f32| ((c + 1.0) * 0.5 * last).round().clamp(0.0, last) as u32;
    (to_index(uv.x), to_index(uv.y))
}

/// sin(theta) / theta, the equidistant-fisheye pixel solid angle relative to the zenith pixel.
pub fn solid_angle_factor(theta: f32) -> f32 {
    if theta.abs() < 1e-6 {
        1.0
    } else {
        theta.sin() / theta
    }
}

/// Equidistant azimuthal mapping between sky directions and panorama pixel coordinates.
///
/// The zenith (0, 1, 0) sits at `center`; the horizon lies on the circle of `radius` pixels.
/// Image +x follows direction +x and image +y (downwards) follows direction +z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FisheyeProjection {
    center: Vec2,
    radius: f32,
}

impl FisheyeProjection {
    pub fn new(center: Vec2, diameter: f32) -> Self {
        Self { center, radius: diameter * 0.5 }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Image-space point for a sky direction, `None` at or below the horizon.
    pub fn direction_to_image(&self, dir: Vec3) -> Option<Vec2> {
        if dir.y <= 0.0 {
            return None;
        }
        let planar = Vec2::new(dir.x, dir.z);
        let planar_len = planar.length();
        if planar_len <= f32::EPSILON {
            return Some(self.center);
        }
        let theta = planar_len.atan2(dir.y);
        let r = theta / FRAC_PI_2 * self.radius;
        if r > self.radius {
            return None;
        }
        Some(self.center + planar / planar_len * r)
    }

    /// Sky direction for an image-space point, `None` outside the visible disc.
    pub fn image_to_direction(&self, point: Vec2) -> Option<Vec3> {
        let offset = point - self.center;
        let r = offset.length();
        if r > self.radius || self.radius <= 0.0 {
            return None;
        }
        if r <= f32::EPSILON {
            return Some(Vec3::Y);
        }
        let theta = r / self.radius * FRAC_PI_2;
        let planar = offset / r * theta.sin();
        Some(Vec3::new(planar.x, theta.cos(), planar.y))
    }

    /// Direction through the center of pixel (x, y).
    pub fn pixel_direction(&self, x: u32, y: u32) -> Option<Vec3> {
        self.image_to_direction(Vec2::new(x as f32 + 0.5, y as f32 + 0.5))
    }
}
