use crate::core::geometry::Vec2;
use crate::domain::model::PerceptClass;
use serde::{Deserialize, Serialize};

/// Circular landmark that blocks movement and occludes walls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Obstacle {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A wall as seen from inside the arena: `left` and `right` are the end
/// points an agent facing the wall sees on its left and right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub class: PerceptClass,
    pub left: Vec2,
    pub right: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    min: Vec2,
    max: Vec2,
}

impl Band {
    fn closest_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x.clamp(self.min.x, self.max.x), p.y.clamp(self.min.y, self.max.y))
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
    pub walls_enabled: bool,
    pub wall_thickness: f64,
    pub obstacles: Vec<Obstacle>,
    walls: [Wall; 4],
    bands: [Band; 4],
}

impl Arena {
    pub fn new(
        width: f64,
        height: f64,
        boundary_scale: f64,
        wall_thickness: f64,
        walls_enabled: bool,
        obstacles: Vec<Obstacle>,
    ) -> Self {
        let s = boundary_scale;
        let tl = Vec2::new(-s, -s);
        let tr = Vec2::new(width + s, -s);
        let bl = Vec2::new(-s, height + s);
        let br = Vec2::new(width + s, height + s);

        let walls = [
            Wall { class: PerceptClass::WallNorth, left: tl, right: tr },
            Wall { class: PerceptClass::WallSouth, left: br, right: bl },
            Wall { class: PerceptClass::WallEast, left: tr, right: br },
            Wall { class: PerceptClass::WallWest, left: bl, right: tl },
        ];

        let t = wall_thickness;
        let bands = [
            Band { min: Vec2::new(0.0, 0.0), max: Vec2::new(width, t) },
            Band { min: Vec2::new(0.0, height - t), max: Vec2::new(width, height) },
            Band { min: Vec2::new(width - t, 0.0), max: Vec2::new(width, height) },
            Band { min: Vec2::new(0.0, 0.0), max: Vec2::new(t, height) },
        ];

        Self {
            width,
            height,
            walls_enabled,
            wall_thickness,
            obstacles,
            walls,
            bands,
        }
    }

    pub fn walls(&self) -> &[Wall; 4] {
        &self.walls
    }

    /// Spawn range for agent centres, `[min, max)` on each axis.
    pub fn spawn_bounds(&self, agent_radius: f64) -> (Vec2, Vec2) {
        let margin = agent_radius * 2.0;
        (
            Vec2::new(margin, margin),
            Vec2::new(self.width - margin, self.height - margin),
        )
    }

    /// Contact points of a circle with the wall bands it overlaps.
    pub fn wall_contacts(&self, center: Vec2, radius: f64) -> Vec<Vec2> {
        if !self.walls_enabled {
            return Vec::new();
        }
        self.bands
            .iter()
            .map(|band| band.closest_point(center))
            .filter(|p| p.distance(center) < radius)
            .collect()
    }

    pub fn max_distance(&self) -> f64 {
        self.width.hypot(self.height)
    }

    /// Flips a screen y coordinate into the plotting frame.
    pub fn flip_y(&self, y: f64) -> f64 {
        self.height - y
    }
}
