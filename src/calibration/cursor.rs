// src/calibration/cursor.rs

use super::data::CalibrationData;
use super::transform::AffineTransform;
use crate::types::{Config, Point2};
use tracing::debug;

/// Turns index-tip camera positions into smoothed screen positions.
pub struct CursorMapper {
    transform: Option<AffineTransform>,
    screen_width: f32,
    screen_height: f32,
    smoothing_factor: f32,
    movement_sensitivity: f32,
    dead_zone_radius: f32,
    current: Option<Point2>,
}

impl CursorMapper {
    /// A calibrated session keeps its own smoothing; otherwise the
    /// sensitivity section's `smoothing_factor` applies.
    pub fn new(data: &CalibrationData, config: &Config) -> Self {
        // Without a full corner set there is nothing better than plain scaling
        let transform = (data.is_calibrated && data.corners().is_some()).then_some(data.screen_mapping);
        let smoothing_factor = match transform {
            Some(_) => data.smoothing_factor as f32,
            None => {
                debug!("🖱 No calibrated transform, using plain screen scaling");
                config.sensitivity.smoothing_factor
            }
        };

        Self {
            transform,
            screen_width: config.calibration.screen_width.max(1.0),
            screen_height: config.calibration.screen_height.max(1.0),
            smoothing_factor: smoothing_factor.clamp(0.0, 1.0),
            movement_sensitivity: data.movement_sensitivity.max(0.0) as f32,
            dead_zone_radius: data.dead_zone_radius.max(0.0) as f32,
            current: None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.transform.is_some()
    }

    /// Unsmoothed screen point for a camera point, clamped to the screen.
    pub fn target(&self, camera: Point2) -> Point2 {
        let raw = match &self.transform {
            Some(t) => t.apply(camera),
            None => Point2::new(camera.x * self.screen_width, camera.y * self.screen_height),
        };
        self.clamp(raw)
    }

    /// Advance the cursor toward `camera`.
    /// Returns `None` while the movement stays inside the dead zone.
    pub fn update(&mut self, camera: Point2) -> Option<Point2> {
        let target = self.target(camera);
        let Some(prev) = self.current else {
            self.current = Some(target);
            return Some(target);
        };

        let dx = (target.x - prev.x) * self.movement_sensitivity;
        let dy = (target.y - prev.y) * self.movement_sensitivity;
        if dx.hypot(dy) < self.dead_zone_radius {
            return None;
        }

        let next = self.clamp(Point2::new(
            prev.x + dx * self.smoothing_factor,
            prev.y + dy * self.smoothing_factor,
        ));
        self.current = Some(next);
        Some(next)
    }

    pub fn position(&self) -> Option<Point2> {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    fn clamp(&self, p: Point2) -> Point2 {
        Point2::new(p.x.clamp(0.0, self.screen_width), p.y.clamp(0.0, self.screen_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::transform::CornerMapping;

    fn calibrated() -> CalibrationData {
        let m = |cx, cy, sx, sy| {
            Some(CornerMapping {
                camera: Point2::new(cx, cy),
                screen: Point2::new(sx, sy),
            })
        };
        CalibrationData {
            is_calibrated: true,
            top_left_mapping: m(0.2, 0.2, 0.0, 0.0),
            top_right_mapping: m(0.8, 0.2, 1920.0, 0.0),
            bottom_left_mapping: m(0.2, 0.7, 0.0, 1080.0),
            bottom_right_mapping: m(0.8, 0.7, 1920.0, 1080.0),
            screen_mapping: AffineTransform::scale_translate(3200.0, 2160.0, -640.0, -432.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_uncalibrated_scales_to_screen() {
        let mapper = CursorMapper::new(&CalibrationData::default(), &Config::default());
        assert!(!mapper.is_calibrated());
        let p = mapper.target(Point2::new(0.5, 0.25));
        assert_eq!(p, Point2::new(960.0, 270.0));
    }

    #[test]
    fn test_calibrated_transform_clamps_to_screen() {
        let mapper = CursorMapper::new(&calibrated(), &Config::default());
        assert!(mapper.is_calibrated());
        let center = mapper.target(Point2::new(0.5, 0.45));
        assert!((center.x - 960.0).abs() < 0.01);
        assert!((center.y - 540.0).abs() < 0.01);
        assert_eq!(mapper.target(Point2::new(0.0, 0.0)), Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_smoothing_moves_partway() {
        let mut mapper = CursorMapper::new(&CalibrationData::default(), &Config::default());
        assert_eq!(mapper.update(Point2::new(0.0, 0.0)), Some(Point2::new(0.0, 0.0)));
        let next = mapper.update(Point2::new(0.5, 0.0)).unwrap();
        // 0.3 of the way to x = 960
        assert!((next.x - 288.0).abs() < 0.01);
        assert_eq!(next.y, 0.0);
    }

    #[test]
    fn test_smoothing_source_follows_calibration() {
        let mut config = Config::default();
        config.sensitivity.smoothing_factor = 0.5;

        let mut plain = CursorMapper::new(&CalibrationData::default(), &config);
        plain.update(Point2::new(0.0, 0.0));
        let next = plain.update(Point2::new(0.5, 0.0)).unwrap();
        assert!((next.x - 480.0).abs() < 0.01);

        let mut data = calibrated();
        data.smoothing_factor = 0.1;
        let mut mapper = CursorMapper::new(&data, &config);
        mapper.update(Point2::new(0.2, 0.2));
        let next = mapper.update(Point2::new(0.8, 0.2)).unwrap();
        // 0.1 of the way to x = 1920
        assert!((next.x - 192.0).abs() < 0.05);
    }

    #[test]
    fn test_dead_zone_suppresses_jitter() {
        let mut mapper = CursorMapper::new(&CalibrationData::default(), &Config::default());
        mapper.update(Point2::new(0.5, 0.5));
        // 0.001 × 1920 ≈ 1.9 px, inside the 5 px dead zone
        assert_eq!(mapper.update(Point2::new(0.501, 0.5)), None);
        assert_eq!(mapper.position(), Some(Point2::new(960.0, 540.0)));
        mapper.reset();
        assert_eq!(mapper.position(), None);
    }
}
