//! Fading laser-pointer trails. Render-only; never stored or sent.

use crate::shapes::{Element, Shape, Stroke};
use std::time::{Duration, Instant};

/// How long a finished trail stays visible.
pub const LASER_FADE: Duration = Duration::from_secs(2);

/// A finished laser stroke and the time its gesture began.
#[derive(Debug, Clone)]
pub struct LaserTrail {
    pub element: Element,
    pub started: Instant,
}

impl LaserTrail {
    /// Remaining opacity in `[0, 1]`, fading linearly over the window.
    pub fn opacity_at(&self, now: Instant) -> f64 {
        let age = now.saturating_duration_since(self.started);
        (1.0 - age.as_secs_f64() / LASER_FADE.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) > LASER_FADE
    }
}

/// The ephemeral laser collection.
#[derive(Debug, Clone, Default)]
pub struct LaserTrails {
    trails: Vec<LaserTrail>,
}

impl LaserTrails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stroke: Stroke, started: Instant) {
        self.trails.push(LaserTrail {
            element: Element::new(Shape::LaserStroke(stroke)),
            started,
        });
    }

    /// Drop trails older than the fade window.
    pub fn prune(&mut self, now: Instant) {
        self.trails.retain(|t| !t.is_expired(now));
    }

    pub fn iter(&self) -> impl Iterator<Item = &LaserTrail> {
        self.trails.iter()
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_prune_after_fade_window() {
        let t0 = Instant::now();
        let mut trails = LaserTrails::new();
        trails.push(Stroke::from_points(vec![Point::ZERO, Point::new(5.0, 5.0)]), t0);
        trails.push(Stroke::starting_at(Point::ZERO), t0 + Duration::from_millis(1500));

        trails.prune(t0 + Duration::from_millis(1900));
        assert_eq!(trails.len(), 2);
        trails.prune(t0 + Duration::from_millis(2100));
        assert_eq!(trails.len(), 1);
        trails.prune(t0 + Duration::from_secs(10));
        assert!(trails.is_empty());
    }

    #[test]
    fn test_opacity_fades() {
        let t0 = Instant::now();
        let mut trails = LaserTrails::new();
        trails.push(Stroke::starting_at(Point::ZERO), t0);
        let trail = trails.iter().next().unwrap();
        assert_eq!(trail.opacity_at(t0), 1.0);
        assert!((trail.opacity_at(t0 + Duration::from_secs(1)) - 0.5).abs() < 1e-9);
        assert_eq!(trail.opacity_at(t0 + Duration::from_secs(3)), 0.0);
    }
}
