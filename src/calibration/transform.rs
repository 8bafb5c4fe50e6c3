// src/calibration/transform.rs
//
// Camera → screen mapping. Only scale and translation per axis are
// modelled (b = c = 0); a full 4-point homography is out of reach of the
// data the wizard collects without a perspective model of the setup.

use crate::types::{Point2, TransformFit};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Camera-space extents below this cannot define a scale.
pub const MIN_SOURCE_EXTENT: f64 = 1e-3;
/// Scaling factor guard on the camera-space width / height.
pub const MIN_SCALING_EXTENT: f32 = 0.01;
const MIN_VARIANCE: f64 = 1e-12;

/// Row-vector affine transform: x' = a·x + c·y + tx, y' = b·x + d·y + ty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn scale_translate(sx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            tx,
            ty,
        }
    }

    pub fn apply(&self, p: Point2) -> Point2 {
        let (x, y) = (p.x as f64, p.y as f64);
        Point2::new(
            (self.a * x + self.c * y + self.tx) as f32,
            (self.b * x + self.d * y + self.ty) as f32,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Averaged camera point paired with the screen point it should land on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerMapping {
    pub camera: Point2,
    pub screen: Point2,
}

/// Corner pairs the solvers work from.
#[derive(Debug, Clone, Copy)]
pub struct CornerSet {
    pub top_left: CornerMapping,
    pub top_right: CornerMapping,
    pub bottom_left: CornerMapping,
    pub bottom_right: CornerMapping,
    pub center: Option<CornerMapping>,
}

impl CornerSet {
    fn pairs(&self) -> Vec<CornerMapping> {
        let mut pairs = vec![self.top_left, self.top_right, self.bottom_left, self.bottom_right];
        pairs.extend(self.center);
        pairs
    }
}

pub fn solve(fit: TransformFit, corners: &CornerSet) -> AffineTransform {
    match fit {
        TransformFit::LeastSquares => least_squares(&corners.pairs()),
        TransformFit::AnchorCorners => anchor_corners(corners),
    }
}

/// Independent least-squares line per axis over every pair.
/// An axis with no camera spread keeps unit scale and takes the mean offset.
pub fn least_squares(pairs: &[CornerMapping]) -> AffineTransform {
    if pairs.is_empty() {
        return AffineTransform::IDENTITY;
    }

    let (sx, tx) = fit_axis(pairs.iter().map(|p| (p.camera.x as f64, p.screen.x as f64)), "x");
    let (sy, ty) = fit_axis(pairs.iter().map(|p| (p.camera.y as f64, p.screen.y as f64)), "y");
    AffineTransform::scale_translate(sx, sy, tx, ty)
}

fn fit_axis<I>(samples: I, axis: &str) -> (f64, f64)
where
    I: Iterator<Item = (f64, f64)> + Clone,
{
    let n = samples.clone().count() as f64;
    let mean_src = samples.clone().map(|(s, _)| s).sum::<f64>() / n;
    let mean_dst = samples.clone().map(|(_, d)| d).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (s, d) in samples {
        covariance += (s - mean_src) * (d - mean_dst);
        variance += (s - mean_src) * (s - mean_src);
    }

    if variance < MIN_VARIANCE {
        warn!("⚠️  No camera spread on {} axis, keeping unit scale", axis);
        return (1.0, mean_dst - mean_src);
    }

    let scale = covariance / variance;
    (scale, mean_dst - scale * mean_src)
}

/// Scale from TL→TR for x and TL→BL for y, anchored at TL.
pub fn anchor_corners(corners: &CornerSet) -> AffineTransform {
    let tl = corners.top_left;
    let sx = axis_scale(
        tl.camera.x,
        corners.top_right.camera.x,
        tl.screen.x,
        corners.top_right.screen.x,
        "x",
    );
    let sy = axis_scale(
        tl.camera.y,
        corners.bottom_left.camera.y,
        tl.screen.y,
        corners.bottom_left.screen.y,
        "y",
    );
    let tx = tl.screen.x as f64 - tl.camera.x as f64 * sx;
    let ty = tl.screen.y as f64 - tl.camera.y as f64 * sy;
    AffineTransform::scale_translate(sx, sy, tx, ty)
}

fn axis_scale(src0: f32, src1: f32, dst0: f32, dst1: f32, axis: &str) -> f64 {
    let extent = src1 as f64 - src0 as f64;
    if extent.abs() < MIN_SOURCE_EXTENT {
        warn!("⚠️  Degenerate {} extent {:.5}, keeping unit scale", axis, extent);
        return 1.0;
    }
    (dst1 as f64 - dst0 as f64) / extent
}

/// Screen-units-per-camera-unit from TL→TR width and TL→BL height.
pub fn scaling_factor(corners: &CornerSet) -> Point2 {
    let tl = corners.top_left;
    let src_w = (corners.top_right.camera.x - tl.camera.x).abs();
    let src_h = (corners.bottom_left.camera.y - tl.camera.y).abs();
    let dst_w = (corners.top_right.screen.x - tl.screen.x).abs();
    let dst_h = (corners.bottom_left.screen.y - tl.screen.y).abs();
    Point2::new(
        dst_w / src_w.max(MIN_SCALING_EXTENT),
        dst_h / src_h.max(MIN_SCALING_EXTENT),
    )
}

pub fn translation_offset(corners: &CornerSet) -> Point2 {
    let tl = corners.top_left;
    Point2::new(tl.screen.x - tl.camera.x, tl.screen.y - tl.camera.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(cx: f32, cy: f32, sx: f32, sy: f32) -> CornerMapping {
        CornerMapping {
            camera: Point2::new(cx, cy),
            screen: Point2::new(sx, sy),
        }
    }

    fn corners() -> CornerSet {
        CornerSet {
            top_left: mapping(0.2, 0.2, 0.0, 0.0),
            top_right: mapping(0.8, 0.2, 1920.0, 0.0),
            bottom_left: mapping(0.2, 0.7, 0.0, 1080.0),
            bottom_right: mapping(0.8, 0.7, 1920.0, 1080.0),
            center: None,
        }
    }

    #[test]
    fn test_exact_rectangle_maps_corners() {
        for fit in [TransformFit::LeastSquares, TransformFit::AnchorCorners] {
            let t = solve(fit, &corners());
            let br = t.apply(Point2::new(0.8, 0.7));
            assert!((br.x - 1920.0).abs() < 0.01, "{:?}", fit);
            assert!((br.y - 1080.0).abs() < 0.01, "{:?}", fit);
            assert_eq!(t.b, 0.0);
            assert_eq!(t.c, 0.0);
        }
    }

    #[test]
    fn test_solver_is_deterministic() {
        let mut set = corners();
        set.bottom_right = mapping(0.83, 0.72, 1920.0, 1080.0);
        set.center = Some(mapping(0.51, 0.44, 960.0, 540.0));
        for fit in [TransformFit::LeastSquares, TransformFit::AnchorCorners] {
            let first = solve(fit, &set);
            let second = solve(fit, &set);
            assert_eq!(first.a.to_bits(), second.a.to_bits());
            assert_eq!(first.d.to_bits(), second.d.to_bits());
            assert_eq!(first.tx.to_bits(), second.tx.to_bits());
            assert_eq!(first.ty.to_bits(), second.ty.to_bits());
        }
    }

    #[test]
    fn test_least_squares_uses_every_corner() {
        let mut set = corners();
        // A skewed bottom-right only influences the least-squares fit
        set.bottom_right = mapping(0.9, 0.8, 1920.0, 1080.0);
        let ls = solve(TransformFit::LeastSquares, &set);
        let anchor = solve(TransformFit::AnchorCorners, &set);
        assert!((anchor.a - 3200.0).abs() < 1e-3);
        assert!(ls.a < anchor.a);
    }

    #[test]
    fn test_degenerate_extent_keeps_unit_scale() {
        let mut set = corners();
        set.top_right = mapping(0.2005, 0.2, 1920.0, 0.0);
        let t = anchor_corners(&set);
        assert_eq!(t.a, 1.0);
        assert!(t.a.is_finite() && t.tx.is_finite());

        let collapsed = [mapping(0.5, 0.5, 0.0, 0.0), mapping(0.5, 0.5, 100.0, 50.0)];
        let ls = least_squares(&collapsed);
        assert_eq!((ls.a, ls.d), (1.0, 1.0));
        assert!((ls.tx - 49.5).abs() < 1e-9);
    }

    #[test]
    fn test_scaling_and_translation() {
        let set = corners();
        let s = scaling_factor(&set);
        assert!((s.x - 3200.0).abs() < 0.1);
        assert!((s.y - 2160.0).abs() < 0.1);
        let t = translation_offset(&set);
        assert!((t.x + 0.2).abs() < 1e-6);
        assert!((t.y + 0.2).abs() < 1e-6);
    }
}
