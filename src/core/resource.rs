use crate::core::geometry::Vec2;

/// A circular resource patch that agents deplete while standing on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: usize,
    pub position: Vec2,
    pub radius: f64,
    pub units: f64,
    pub units_left: f64,
    /// Maximum units a single agent can take per step.
    pub quality: f64,
}

impl Resource {
    pub fn new(id: usize, position: Vec2, radius: f64, units: f64, quality: f64) -> Self {
        Self {
            id,
            position,
            radius,
            units,
            units_left: units,
            quality,
        }
    }

    /// Takes up to `requested` units, capped by quality and what is left.
    /// Returns the units removed and whether the patch is now exhausted.
    pub fn deplete(&mut self, requested: f64) -> (f64, bool) {
        let requested = requested.min(self.quality);

        let depleted = if self.units_left >= requested {
            self.units_left -= requested;
            requested
        } else {
            let rest = self.units_left;
            self.units_left = 0.0;
            rest
        };

        (depleted, self.units_left <= 0.0)
    }

    /// Whether a point lies within the patch.
    pub fn contains(&self, point: Vec2) -> bool {
        point.distance(self.position) <= self.radius
    }

    pub fn fraction_left(&self) -> f64 {
        if self.units > 0.0 {
            self.units_left / self.units
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deplete_is_capped_by_quality() {
        let mut patch = Resource::new(0, Vec2::new(0.0, 0.0), 10.0, 5.0, 0.5);
        let (taken, exhausted) = patch.deplete(2.0);
        assert_eq!(taken, 0.5);
        assert!(!exhausted);
        assert_eq!(patch.units_left, 4.5);
    }

    #[test]
    fn test_deplete_cannot_take_more_than_left() {
        let mut patch = Resource::new(0, Vec2::new(0.0, 0.0), 10.0, 1.5, 1.0);
        assert_eq!(patch.deplete(1.0), (1.0, false));
        assert_eq!(patch.deplete(1.0), (0.5, true));
        assert_eq!(patch.deplete(1.0), (0.0, true));
        assert_eq!(patch.fraction_left(), 0.0);
    }

    #[test]
    fn test_contains_includes_edge() {
        let patch = Resource::new(0, Vec2::new(100.0, 100.0), 50.0, 1.0, 1.0);
        assert!(patch.contains(Vec2::new(150.0, 100.0)));
        assert!(!patch.contains(Vec2::new(151.0, 100.0)));
    }
}
