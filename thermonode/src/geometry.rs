// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Camera mounting geometry.
//!
//! Maps sensor pixels onto the monitored surface (the plane `z = 0`) so that a hotspot can be
//! reported as a position in millimetres rather than a pixel index. Each camera hangs `height_mm`
//! above the plane, looking straight down unless tilted. A tilt rotates the optical axis by
//! `tilt_deg` away from vertical, towards the compass direction `tilt_direction_deg`
//! (0° = +X, 90° = +Y).
//!
//! Pixel angles are linear in the pixel index across the field of view, matching the
//! placement study the board layout was derived from.

use micromath::F32Ext;

use crate::frame::Hotspot;
use crate::{FRAME_HEIGHT, FRAME_WIDTH, NUM_CHANNELS};

/// Optical parameters of the MLX90640 (110° lens variant).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CameraSpec {
    pub columns: u8,
    pub rows: u8,
    pub fov_h_deg: f32,
    pub fov_v_deg: f32,
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            columns: FRAME_WIDTH as u8,
            rows: FRAME_HEIGHT as u8,
            fov_h_deg: 110.0,
            fov_v_deg: 75.0,
        }
    }
}

/// Monitored surface the reference layout was designed for.
pub const SURFACE_WIDTH_MM: f32 = 1700.0;
pub const SURFACE_HEIGHT_MM: f32 = 2800.0;
/// Camera height above the surface in the reference layout.
pub const WORKING_DISTANCE_MM: f32 = 350.0;

/// Rays flatter than this (z component of the unit ray) never reach the plane.
const GRAZING_LIMIT: f32 = 1.0e-3;

/// Position and orientation of one camera.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mount {
    pub x_mm: f32,
    pub y_mm: f32,
    pub height_mm: f32,
    pub tilt_deg: f32,
    pub tilt_direction_deg: f32,
    pub spec: CameraSpec,
}

impl Mount {
    /// Camera looking straight down from `(x_mm, y_mm)`.
    pub fn overhead(x_mm: f32, y_mm: f32, height_mm: f32) -> Self {
        Self {
            x_mm,
            y_mm,
            height_mm,
            tilt_deg: 0.0,
            tilt_direction_deg: 0.0,
            spec: CameraSpec::default(),
        }
    }

    pub fn with_tilt(mut self, tilt_deg: f32, tilt_direction_deg: f32) -> Self {
        self.tilt_deg = tilt_deg;
        self.tilt_direction_deg = tilt_direction_deg;
        self
    }

    /// Reference layout: one camera above the centre of each quadrant of the surface.
    pub fn quadrant_layout() -> [Mount; NUM_CHANNELS] {
        let qx = SURFACE_WIDTH_MM / 4.0;
        let qy = SURFACE_HEIGHT_MM / 4.0;
        [
            Mount::overhead(qx, qy, WORKING_DISTANCE_MM),
            Mount::overhead(3.0 * qx, qy, WORKING_DISTANCE_MM),
            Mount::overhead(qx, 3.0 * qy, WORKING_DISTANCE_MM),
            Mount::overhead(3.0 * qx, 3.0 * qy, WORKING_DISTANCE_MM),
        ]
    }

    /// Project the centre of pixel `(px, py)` onto the surface.
    ///
    /// Fractional coordinates are allowed; `(15.5, 11.5)` is the optical centre. Returns `None`
    /// when the ray runs parallel to or away from the surface.
    pub fn pixel_to_surface(&self, px: f32, py: f32) -> Option<[f32; 2]> {
        let cols = self.spec.columns as f32 - 1.0;
        let rows = self.spec.rows as f32 - 1.0;

        let angle_h = (px - cols / 2.0) / cols * self.spec.fov_h_deg.to_radians();
        let angle_v = (py - rows / 2.0) / rows * self.spec.fov_v_deg.to_radians();

        // Ray in the camera frame, camera looking down -Z.
        let (x, y, z) = (angle_h.tan(), angle_v.tan(), -1.0f32);

        let (sin_t, cos_t) = (self.tilt_deg.to_radians().sin(), self.tilt_deg.to_radians().cos());
        let dir = self.tilt_direction_deg.to_radians();
        let (sin_d, cos_d) = (dir.sin(), dir.cos());

        // Align the tilt direction with +X, tilt about Y, rotate back.
        let x1 = cos_d * x + sin_d * y;
        let y1 = -sin_d * x + cos_d * y;
        let z1 = z;

        let x2 = cos_t * x1 - sin_t * z1;
        let y2 = y1;
        let z2 = sin_t * x1 + cos_t * z1;

        let rx = cos_d * x2 - sin_d * y2;
        let ry = sin_d * x2 + cos_d * y2;
        let rz = z2;

        let norm = (rx * rx + ry * ry + rz * rz).sqrt();
        if rz / norm >= -GRAZING_LIMIT {
            return None;
        }

        let t = -self.height_mm / rz;
        Some([self.x_mm + t * rx, self.y_mm + t * ry])
    }

    /// Surface distance covered by one pixel step along each sensor axis, in mm.
    pub fn pixel_resolution(&self, px: f32, py: f32) -> Option<(f32, f32)> {
        let here = self.pixel_to_surface(px, py)?;
        let right = self.pixel_to_surface(px + 1.0, py)?;
        let down = self.pixel_to_surface(px, py + 1.0)?;
        Some((distance(here, right), distance(here, down)))
    }

    /// Projected corners of the sensor, clockwise from pixel `(0, 0)`.
    pub fn footprint(&self) -> Option<[[f32; 2]; 4]> {
        let c = self.spec.columns as f32 - 1.0;
        let r = self.spec.rows as f32 - 1.0;
        Some([
            self.pixel_to_surface(0.0, 0.0)?,
            self.pixel_to_surface(c, 0.0)?,
            self.pixel_to_surface(c, r)?,
            self.pixel_to_surface(0.0, r)?,
        ])
    }

    /// Whether `point` on the surface falls inside this camera's footprint.
    pub fn sees(&self, point: [f32; 2]) -> bool {
        self.footprint().is_some_and(|corners| inside_polygon(point, &corners))
    }

    /// Surface position of a hotspot seen by this camera.
    pub fn locate(&self, hotspot: &Hotspot) -> Option<[f32; 2]> {
        self.pixel_to_surface(hotspot.column as f32, hotspot.row as f32)
    }
}

/// Number of mounts whose footprint contains `point`.
pub fn coverage_count(mounts: &[Mount], point: [f32; 2]) -> usize {
    mounts.iter().filter(|m| m.sees(point)).count()
}

/// Even-odd ray casting. Points on an edge may fall either way.
fn inside_polygon(point: [f32; 2], polygon: &[[f32; 2]]) -> bool {
    let [x, y] = point;
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for (i, &[xi, yi]) in polygon.iter().enumerate() {
        let [xj, yj] = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Tilt angle and direction (degrees) that aim `mount`'s optical axis at `target`.
pub fn tilt_towards(mount: &Mount, target: [f32; 2]) -> (f32, f32) {
    let dx = target[0] - mount.x_mm;
    let dy = target[1] - mount.y_mm;
    let horizontal = (dx * dx + dy * dy).sqrt();
    if horizontal < 1.0 {
        return (0.0, 0.0);
    }
    let tilt = horizontal.atan2(mount.height_mm).to_degrees();
    let direction = dy.atan2(dx).to_degrees();
    (tilt, direction)
}

#[inline]
fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTRE: (f32, f32) = (15.5, 11.5);

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn optical_centre_lands_below_an_untilted_camera() {
        let m = Mount::overhead(100.0, 200.0, 350.0);
        let p = m.pixel_to_surface(CENTRE.0, CENTRE.1).unwrap();
        assert!(close(p[0], 100.0, 0.01) && close(p[1], 200.0, 0.01));
    }

    #[test]
    fn edge_pixel_reaches_half_field_of_view() {
        let m = Mount::overhead(0.0, 0.0, 350.0);
        let p = m.pixel_to_surface(31.0, CENTRE.1).unwrap();
        // 350 mm * tan(55°)
        assert!(close(p[0], 499.85, 1.0), "x = {}", p[0]);
        assert!(close(p[1], 0.0, 0.01));
    }

    #[test]
    fn tilt_moves_the_axis_towards_the_tilt_direction() {
        let m = Mount::overhead(0.0, 0.0, 350.0).with_tilt(30.0, 90.0);
        let p = m.pixel_to_surface(CENTRE.0, CENTRE.1).unwrap();
        // 350 mm * tan(30°), along +Y
        assert!(close(p[0], 0.0, 0.5));
        assert!(close(p[1], 202.07, 0.5), "y = {}", p[1]);
    }

    #[test]
    fn rays_above_the_horizon_do_not_hit_the_surface() {
        let m = Mount::overhead(0.0, 0.0, 350.0).with_tilt(85.0, 0.0);
        assert_eq!(m.pixel_to_surface(31.0, CENTRE.1), None);
        assert!(m.footprint().is_none());
    }

    #[test]
    fn resolution_grows_towards_the_edge() {
        let m = Mount::overhead(0.0, 0.0, 350.0);
        let (centre_x, _) = m.pixel_resolution(15.0, 11.0).unwrap();
        let (edge_x, _) = m.pixel_resolution(30.0, 11.0).unwrap();
        assert!(edge_x > centre_x);
    }

    #[test]
    fn aiming_at_the_surface_centre() {
        let m = Mount::overhead(0.0, 0.0, 350.0);
        let (tilt, dir) = tilt_towards(&m, [350.0, 350.0]);
        // horizontal = 494.97, atan(494.97 / 350) = 54.74°
        assert!(close(tilt, 54.74, 0.1));
        assert!(close(dir, 45.0, 0.1));

        let aimed = m.with_tilt(tilt, dir);
        let p = aimed.pixel_to_surface(CENTRE.0, CENTRE.1).unwrap();
        assert!(close(p[0], 350.0, 1.0) && close(p[1], 350.0, 1.0));

        assert_eq!(tilt_towards(&m, [0.5, 0.0]), (0.0, 0.0));
    }

    #[test]
    fn footprint_bounds_what_a_camera_sees() {
        // 350 mm * tan(55°) by 350 mm * tan(37.5°) either side of the camera
        let m = Mount::overhead(0.0, 0.0, 350.0);
        assert!(m.sees([0.0, 0.0]));
        assert!(m.sees([490.0, 260.0]));
        assert!(m.sees([-490.0, -260.0]));
        assert!(!m.sees([510.0, 0.0]));
        assert!(!m.sees([0.0, 280.0]));

        let tipped = m.with_tilt(85.0, 0.0);
        assert!(!tipped.sees([0.0, 0.0]));
    }

    #[test]
    fn quadrant_layout_coverage() {
        let layout = Mount::quadrant_layout();
        let qx = SURFACE_WIDTH_MM / 4.0;
        let qy = SURFACE_HEIGHT_MM / 4.0;

        assert_eq!(coverage_count(&layout, [qx, qy]), 1);
        assert_eq!(coverage_count(&layout, [3.0 * qx, 3.0 * qy]), 1);
        // Neighbouring footprints overlap across the vertical centre line.
        assert_eq!(coverage_count(&layout, [SURFACE_WIDTH_MM / 2.0, qy]), 2);
        // The reference layout leaves a band across the middle uncovered.
        assert_eq!(coverage_count(&layout, [SURFACE_WIDTH_MM / 2.0, SURFACE_HEIGHT_MM / 2.0]), 0);
        assert_eq!(coverage_count(&layout, [0.0, 0.0]), 0);
        assert_eq!(coverage_count(&[], [qx, qy]), 0);
    }
}
