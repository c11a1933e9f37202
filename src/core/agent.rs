use crate::core::arena::Arena;
use crate::core::geometry::{
    angle_difference, global_angle, heading, line_intersection, linspace, relative_angle, wrap_angle,
    Vec2,
};
use crate::domain::model::{Mode, PerceptClass};
use crate::domain::ports::Controller;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::{FRAC_PI_2, PI};

/// What other agents see of an agent during the sensing phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentView {
    pub id: usize,
    pub position: Vec2,
    pub radius: f64,
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy)]
pub struct AgentParams {
    pub radius: f64,
    pub max_velocity: f64,
    pub fov: f64,
    pub vision_range: f64,
    pub resolution: usize,
    pub consumption: f64,
    /// Already scaled to radians.
    pub angle_noise_std: f64,
    pub track_distance: bool,
}

/// Angular extent of a visible object relative to the perceiver's heading.
#[derive(Debug, Clone, Copy)]
struct Extent {
    class: PerceptClass,
    distance: f64,
    left: f64,
    right: f64,
}

pub struct Agent {
    pub id: usize,
    pub position: Vec2,
    pub orientation: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub mode: Mode,
    pub collided_points: Vec<Vec2>,
    pub collected: f64,
    pub on_resource: bool,
    /// Index of the patch the agent stands on this step.
    pub resource_target: Option<usize>,
    pub vis_field: Vec<Option<PerceptClass>>,
    pub dist_field: Option<Vec<f64>>,
    pub last_action: f64,
    params: AgentParams,
    phis: Vec<f64>,
    controller: Box<dyn Controller>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("orientation", &self.orientation)
            .field("mode", &self.mode)
            .field("collected", &self.collected)
            .finish()
    }
}

impl Agent {
    pub fn new(
        id: usize,
        position: Vec2,
        orientation: f64,
        params: AgentParams,
        controller: Box<dyn Controller>,
    ) -> Self {
        let phis = linspace(-params.fov * PI, params.fov * PI, params.resolution);
        Self {
            id,
            position,
            orientation,
            velocity: 0.0,
            acceleration: 0.0,
            mode: Mode::Explore,
            collided_points: Vec::new(),
            collected: 0.0,
            on_resource: false,
            resource_target: None,
            vis_field: vec![None; params.resolution],
            dist_field: params.track_distance.then(|| vec![0.0; params.resolution]),
            last_action: 0.0,
            params,
            phis,
            controller,
        }
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    pub fn radius(&self) -> f64 {
        self.params.radius
    }

    pub fn phis(&self) -> &[f64] {
        &self.phis
    }

    /// Front point of the body along the current heading.
    pub fn eye(&self) -> Vec2 {
        self.position + heading(self.orientation) * self.params.radius
    }

    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id,
            position: self.position,
            radius: self.params.radius,
            mode: self.mode,
        }
    }

    pub fn controller_mut(&mut self) -> &mut dyn Controller {
        self.controller.as_mut()
    }

    pub fn reset_step(&mut self) {
        self.collided_points.clear();
        self.mode = Mode::Explore;
        self.on_resource = false;
        self.resource_target = None;
    }

    /// Rebuilds the visual field from walls, obstacles and other agents.
    pub fn visual_sensing<R: Rng + ?Sized>(&mut self, arena: &Arena, agents: &[AgentView], rng: &mut R) {
        self.vis_field.iter_mut().for_each(|v| *v = None);
        if let Some(dist) = self.dist_field.as_mut() {
            dist.iter_mut().for_each(|d| *d = 0.0);
        }

        let noise: f64 = rng.sample::<f64, _>(StandardNormal) * self.params.angle_noise_std;
        let orientation = self.orientation + noise;
        let dir = heading(orientation);
        let eye = self.position + dir * self.params.radius;

        if arena.walls_enabled {
            self.fill_walls(arena, orientation, dir, eye);
            let obstacles = self.obstacle_extents(arena, dir, eye);
            self.fill_nearest(&obstacles, true);
        }
        if agents.len() > 1 {
            let others = self.agent_extents(agents, dir, eye);
            self.fill_nearest(&others, false);
        }
    }

    fn fill_walls(&mut self, arena: &Arena, orientation: f64, dir: Vec2, eye: Vec2) {
        let walls: Vec<(f64, f64, Vec2, Vec2, PerceptClass)> = arena
            .walls()
            .iter()
            .map(|w| {
                (
                    relative_angle(dir, w.left - eye),
                    relative_angle(dir, w.right - eye),
                    w.left,
                    w.right,
                    w.class,
                )
            })
            .collect();

        for i in 0..self.phis.len() {
            let phi = self.phis[i];
            let mut hit = None;
            for &(angle_l, angle_r, left, right, class) in &walls {
                if angle_l <= phi && phi <= angle_r {
                    hit = Some((class, left, right));
                }
            }
            // One end point is behind the agent, so the wall's interval wraps.
            if hit.is_none() {
                for &(angle_l, angle_r, left, right, class) in &walls {
                    if angle_l > angle_r {
                        hit = Some((class, left, right));
                    }
                }
            }

            if let Some((class, left, right)) = hit {
                self.vis_field[i] = Some(class);
                if let Some(dist) = self.dist_field.as_mut() {
                    let ray = eye + heading(orientation - phi);
                    match line_intersection(left, right, eye, ray) {
                        Some(cross) => dist[i] = eye.distance(cross),
                        None => tracing::warn!("Ray {} of agent {} is parallel to a wall", i, self.id),
                    }
                }
            }
        }
    }

    fn in_fov(&self, extent_left: f64, extent_right: f64) -> bool {
        let (lo, hi) = match (self.phis.first(), self.phis.last()) {
            (Some(lo), Some(hi)) => (*lo, *hi),
            _ => return false,
        };
        (lo <= extent_left && extent_left <= hi) || (lo <= extent_right && extent_right <= hi)
    }

    fn obstacle_extents(&self, arena: &Arena, dir: Vec2, eye: Vec2) -> Vec<Extent> {
        arena
            .obstacles
            .iter()
            .filter_map(|obstacle| {
                let between = obstacle.position() - eye;
                let distance = between.length();
                if distance > self.params.vision_range {
                    return None;
                }
                let angle = relative_angle(dir, between);
                let edge = (obstacle.radius / distance).atan();
                let extent = Extent {
                    class: PerceptClass::Obstacle,
                    distance,
                    left: angle - edge,
                    right: angle + edge,
                };
                self.in_fov(extent.left, extent.right).then_some(extent)
            })
            .collect()
    }

    fn agent_extents(&self, agents: &[AgentView], dir: Vec2, eye: Vec2) -> Vec<Extent> {
        agents
            .iter()
            .filter(|other| other.id != self.id)
            .filter_map(|other| {
                let between = other.position - eye;
                let distance = between.length();
                let angle = relative_angle(dir, between);
                let edge = (other.radius / distance).atan();
                let class = match other.mode {
                    Mode::Exploit => PerceptClass::AgentExploit,
                    Mode::Explore | Mode::Collide => PerceptClass::AgentExplore,
                };
                let extent = Extent {
                    class,
                    distance,
                    left: angle - edge,
                    right: angle + edge,
                };
                self.in_fov(extent.left, extent.right).then_some(extent)
            })
            .collect()
    }

    /// Marks each ray with the closest extent covering it. Agents only change
    /// the class; the distance field keeps the wall or obstacle behind them.
    fn fill_nearest(&mut self, extents: &[Extent], write_distance: bool) {
        if extents.is_empty() {
            return;
        }
        for i in 0..self.phis.len() {
            let phi = self.phis[i];
            let nearest = extents
                .iter()
                .filter(|e| e.left <= phi && phi <= e.right)
                .min_by(|a, b| a.distance.total_cmp(&b.distance));
            if let Some(extent) = nearest {
                self.vis_field[i] = Some(extent.class);
                if let Some(dist) = self.dist_field.as_mut().filter(|_| write_distance) {
                    dist[i] = extent.distance;
                }
            }
        }
    }

    /// One-hot matrix (`num_classes x rays`) of the current visual field.
    pub fn encode_one_hot(&self, num_classes: usize) -> Vec<Vec<f64>> {
        let mut encoded = vec![vec![0.0; self.vis_field.len()]; num_classes];
        for (i, percept) in self.vis_field.iter().enumerate() {
            if let Some(row) = percept.and_then(|p| p.encoding_index(num_classes)) {
                encoded[row][i] = 1.0;
            }
        }
        encoded
    }

    /// Turns by `action * π/2`, sets speed from the turn magnitude and moves,
    /// unless a contact point lies ahead.
    pub fn step_motion(&mut self, action: f64) {
        self.orientation = wrap_angle(self.orientation + action * FRAC_PI_2);

        let previous = self.velocity;
        self.velocity = self.params.max_velocity * (1.0 - action.abs());
        self.acceleration = self.velocity - previous;

        if self.mode == Mode::Collide {
            let blocked = self.collided_points.iter().any(|&point| {
                let toward = global_angle(point - self.position);
                angle_difference(self.orientation, toward).abs() < FRAC_PI_2
            });
            if blocked {
                self.velocity = 0.0;
            }
        }

        self.position += heading(self.orientation) * self.velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arena::Obstacle;
    use crate::core::controller::RandomWalk;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(resolution: usize, fov: f64) -> AgentParams {
        AgentParams {
            radius: 10.0,
            max_velocity: 2.0,
            fov,
            vision_range: 1000.0,
            resolution,
            consumption: 1.0,
            angle_noise_std: 0.0,
            track_distance: true,
        }
    }

    fn agent_at(x: f64, y: f64, orientation: f64, resolution: usize, fov: f64) -> Agent {
        Agent::new(
            0,
            Vec2::new(x, y),
            orientation,
            params(resolution, fov),
            Box::new(RandomWalk::new(0.0)),
        )
    }

    #[test]
    fn test_facing_north_wall_sees_north() {
        let arena = Arena::new(1000.0, 1000.0, 0.0, 10.0, true, Vec::new());
        let mut agent = agent_at(500.0, 500.0, FRAC_PI_2, 3, 0.1);
        let mut rng = StdRng::seed_from_u64(1);
        agent.visual_sensing(&arena, &[agent.view()], &mut rng);

        assert!(agent.vis_field.iter().all(|p| *p == Some(PerceptClass::WallNorth)));
        let dist = agent.dist_field.as_ref().unwrap();
        // Eye is one radius ahead of the centre.
        assert!((dist[1] - 490.0).abs() < 1e-6);
    }

    #[test]
    fn test_wide_fov_sees_side_walls() {
        let arena = Arena::new(1000.0, 1000.0, 0.0, 10.0, true, Vec::new());
        let mut agent = agent_at(500.0, 500.0, 0.0, 5, 0.5);
        let mut rng = StdRng::seed_from_u64(1);
        agent.visual_sensing(&arena, &[agent.view()], &mut rng);

        // Facing east: left edge of the field looks north, right edge south.
        assert_eq!(agent.vis_field[0], Some(PerceptClass::WallNorth));
        assert_eq!(agent.vis_field[2], Some(PerceptClass::WallEast));
        assert_eq!(agent.vis_field[4], Some(PerceptClass::WallSouth));
    }

    #[test]
    fn test_wall_behind_agent_wraps_around() {
        let arena = Arena::new(1000.0, 1000.0, 0.0, 10.0, true, Vec::new());
        // Full field of view: the outer rays look straight back at the west wall,
        // whose end points sit on opposite sides of the ±π seam.
        let mut agent = agent_at(500.0, 500.0, 0.0, 5, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        agent.visual_sensing(&arena, &[agent.view()], &mut rng);

        assert_eq!(agent.vis_field[0], Some(PerceptClass::WallWest));
        assert_eq!(agent.vis_field[1], Some(PerceptClass::WallNorth));
        assert_eq!(agent.vis_field[2], Some(PerceptClass::WallEast));
        assert_eq!(agent.vis_field[3], Some(PerceptClass::WallSouth));
        assert_eq!(agent.vis_field[4], Some(PerceptClass::WallWest));
        let dist = agent.dist_field.as_ref().unwrap();
        assert!((dist[0] - 510.0).abs() < 1e-6);
        assert!((dist[4] - 510.0).abs() < 1e-6);
    }

    #[test]
    fn test_obstacle_occludes_farther_wall() {
        let obstacle = Obstacle {
            x: 700.0,
            y: 500.0,
            radius: 40.0,
        };
        let arena = Arena::new(1000.0, 1000.0, 0.0, 10.0, true, vec![obstacle]);
        let mut agent = agent_at(500.0, 500.0, 0.0, 3, 0.1);
        let mut rng = StdRng::seed_from_u64(1);
        agent.visual_sensing(&arena, &[agent.view()], &mut rng);

        assert_eq!(agent.vis_field[1], Some(PerceptClass::Obstacle));
        // Outer rays pass beside the obstacle and still hit the east wall.
        assert_eq!(agent.vis_field[0], Some(PerceptClass::WallEast));
        assert_eq!(agent.vis_field[2], Some(PerceptClass::WallEast));
        let dist = agent.dist_field.as_ref().unwrap();
        assert!((dist[1] - 190.0).abs() < 1e-6);
        assert!(dist[0] > 490.0);
    }

    #[test]
    fn test_agent_keeps_wall_distance() {
        let arena = Arena::new(1000.0, 1000.0, 0.0, 10.0, true, Vec::new());
        let mut agent = agent_at(500.0, 500.0, 0.0, 3, 0.1);
        let other = AgentView {
            id: 1,
            position: Vec2::new(700.0, 500.0),
            radius: 10.0,
            mode: Mode::Explore,
        };
        let mut rng = StdRng::seed_from_u64(1);
        agent.visual_sensing(&arena, &[agent.view(), other], &mut rng);

        assert_eq!(agent.vis_field[1], Some(PerceptClass::AgentExplore));
        let dist = agent.dist_field.as_ref().unwrap();
        assert!((dist[1] - 490.0).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_agent_occludes_by_mode() {
        let arena = Arena::new(1000.0, 1000.0, 0.0, 10.0, false, Vec::new());
        let mut agent = agent_at(100.0, 500.0, 0.0, 3, 0.1);
        let near = AgentView {
            id: 1,
            position: Vec2::new(200.0, 500.0),
            radius: 10.0,
            mode: Mode::Exploit,
        };
        let far = AgentView {
            id: 2,
            position: Vec2::new(400.0, 500.0),
            radius: 10.0,
            mode: Mode::Explore,
        };
        let mut rng = StdRng::seed_from_u64(1);
        agent.visual_sensing(&arena, &[agent.view(), near, far], &mut rng);

        assert_eq!(agent.vis_field[1], Some(PerceptClass::AgentExploit));
        let encoded = agent.encode_one_hot(2);
        assert_eq!(encoded[1][1], 1.0);
        assert_eq!(encoded[0][1], 0.0);
    }

    #[test]
    fn test_motion_speed_depends_on_turn() {
        let mut agent = agent_at(500.0, 500.0, 0.0, 3, 0.1);
        agent.step_motion(0.0);
        assert!((agent.position.x - 502.0).abs() < 1e-9);
        assert_eq!(agent.acceleration, 2.0);

        agent.step_motion(1.0);
        assert!((agent.orientation - FRAC_PI_2).abs() < 1e-9);
        assert_eq!(agent.velocity, 0.0);
        assert_eq!(agent.acceleration, -2.0);
    }

    #[test]
    fn test_action_beyond_unit_range_reverses() {
        let mut agent = agent_at(500.0, 500.0, 0.0, 3, 0.1);
        agent.step_motion(1.5);
        assert_eq!(agent.velocity, -1.0);
        let moved = agent.position - Vec2::new(500.0, 500.0);
        assert!((moved.length() - 1.0).abs() < 1e-9);
        assert!(moved.dot(heading(agent.orientation)) < 0.0);
    }

    #[test]
    fn test_collision_ahead_blocks_motion() {
        let mut agent = agent_at(500.0, 500.0, 0.0, 3, 0.1);
        agent.mode = Mode::Collide;
        agent.collided_points.push(Vec2::new(510.0, 500.0));
        agent.step_motion(0.0);
        assert_eq!(agent.position, Vec2::new(500.0, 500.0));

        // Contact behind the agent does not block.
        agent.collided_points = vec![Vec2::new(490.0, 500.0)];
        agent.step_motion(0.0);
        assert!(agent.position.x > 500.0);
    }
}
