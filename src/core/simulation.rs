//! Episode runner: spawns patches and agents, then steps collisions,
//! sensing, control and movement until the horizon or arrival.

use crate::core::agent::{Agent, AgentParams, AgentView};
use crate::core::arena::{Arena, Obstacle};
use crate::core::geometry::{circles_overlap, Vec2};
use crate::core::perception::{build_observation, other_inputs, DistTransform, PerceptionParams};
use crate::core::resource::Resource;
use crate::domain::model::{AgentFrame, EpisodeOutcome, Mode, PatchRecord, SimType, Trajectory};
use crate::domain::ports::Controller;
use crate::utils::error::{NavError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::TAU;
use std::io::Write;
use std::time::Instant;

/// Spawn retries after which a warning is logged.
const SPAWN_RETRY_WARNING: usize = 10;

/// Everything an episode needs apart from the controller.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub sim_type: SimType,
    pub width: f64,
    pub height: f64,
    pub boundary_scale: f64,
    pub num_agents: usize,
    pub horizon: usize,
    pub agent: AgentParams,
    pub obstacles: Vec<Obstacle>,
    pub patch_positions: Vec<Vec2>,
    pub patch_radius: f64,
    /// `[min, max)` units per patch.
    pub patch_units: (u64, u64),
    /// `[min, max]` quality per patch.
    pub patch_quality: (f64, f64),
    pub regenerate_patches: bool,
    pub other_input_size: usize,
    pub other_input_enabled: bool,
    pub dist_transform: DistTransform,
    pub dist_noise_std: f64,
    /// Fraction of the action range; doubled when applied.
    pub action_noise_std: f64,
    pub record_trajectory: bool,
    pub max_spawn_attempts: usize,
}

impl SimParams {
    pub fn num_percept_classes(&self) -> usize {
        self.sim_type.num_percept_classes(self.num_agents)
    }

    fn unit_range(&self) -> (u64, u64) {
        let (min, max) = self.patch_units;
        if max <= min {
            (min, min + 1)
        } else {
            (min, max)
        }
    }

    fn quality_range(&self) -> (f64, f64) {
        let (min, max) = self.patch_quality;
        (min, max.max(min))
    }
}

pub struct Simulation {
    params: SimParams,
    prototype: Box<dyn Controller>,
}

impl Simulation {
    pub fn new(params: SimParams, prototype: Box<dyn Controller>) -> Self {
        Self { params, prototype }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    fn new_patch<R: Rng + ?Sized>(&self, id: usize, position: Vec2, rng: &mut R) -> Resource {
        let (umin, umax) = self.params.unit_range();
        let (qmin, qmax) = self.params.quality_range();
        let units = rng.gen_range(umin..umax) as f64;
        let quality = rng.gen_range(qmin..=qmax);
        Resource::new(id, position, self.params.patch_radius, units, quality)
    }

    fn spawn_agents<R: Rng + ?Sized>(
        &self,
        arena: &Arena,
        patches: &[Option<Resource>],
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        let p = &self.params;
        let radius = p.agent.radius;
        let (lo, hi) = arena.spawn_bounds(radius);
        if lo.x >= hi.x || lo.y >= hi.y {
            return Err(NavError::SimulationError {
                message: format!(
                    "arena {}x{} leaves no room to spawn agents of radius {}",
                    p.width, p.height, radius
                ),
            });
        }

        let mut agents: Vec<Agent> = Vec::with_capacity(p.num_agents);
        for id in 0..p.num_agents {
            let mut attempts = 0;
            let (position, orientation) = loop {
                if attempts >= p.max_spawn_attempts {
                    return Err(NavError::SimulationError {
                        message: format!(
                            "could not place agent {} without overlap after {} attempts",
                            id, attempts
                        ),
                    });
                }
                attempts += 1;
                if attempts == SPAWN_RETRY_WARNING + 1 {
                    tracing::warn!("Agent {} needed more than {} spawn retries", id, SPAWN_RETRY_WARNING);
                }

                let position = Vec2::new(rng.gen_range(lo.x..hi.x).floor(), rng.gen_range(lo.y..hi.y).floor());
                let orientation = rng.gen_range(0.0..TAU);

                let on_patch = patches
                    .iter()
                    .flatten()
                    .any(|patch| circles_overlap(position, radius, patch.position, patch.radius));
                let on_agent = agents
                    .iter()
                    .any(|other| circles_overlap(position, radius, other.position, other.radius()));
                if !on_patch && !on_agent {
                    break (position, orientation);
                }
            };
            agents.push(Agent::new(id, position, orientation, p.agent, self.prototype.fresh()));
        }
        Ok(agents)
    }

    fn detect_collisions(&self, arena: &Arena, patches: &[Option<Resource>], agents: &mut [Agent]) {
        let bodies: Vec<(Vec2, f64)> = agents.iter().map(|a| (a.position, a.radius())).collect();

        for (i, agent) in agents.iter_mut().enumerate() {
            let (pos, r) = bodies[i];

            let walls = arena.wall_contacts(pos, r);
            if !walls.is_empty() {
                agent.mode = Mode::Collide;
                agent.collided_points.extend(walls);
            }

            if arena.walls_enabled {
                for obstacle in &arena.obstacles {
                    if circles_overlap(pos, r, obstacle.position(), obstacle.radius) {
                        agent.mode = Mode::Collide;
                        agent.collided_points.push((pos + obstacle.position()) * 0.5);
                    }
                }
            }

            for (j, &(other, other_r)) in bodies.iter().enumerate() {
                if i != j && circles_overlap(pos, r, other, other_r) {
                    agent.mode = Mode::Collide;
                    agent.collided_points.push((pos + other) * 0.5);
                }
            }

            for (idx, patch) in patches.iter().enumerate() {
                if let Some(patch) = patch {
                    if patch.contains(pos) {
                        agent.mode = Mode::Exploit;
                        agent.on_resource = true;
                        agent.resource_target = Some(idx);
                        break;
                    }
                }
            }
        }
    }

    fn consume<R: Rng + ?Sized>(
        &self,
        agent: &mut Agent,
        patches: &mut [Option<Resource>],
        next_patch_id: &mut usize,
        trajectory: &mut Trajectory,
        arena: &Arena,
        rng: &mut R,
    ) {
        let Some(idx) = agent.resource_target else {
            return;
        };
        let Some(patch) = patches[idx].as_mut() else {
            agent.mode = Mode::Explore;
            return;
        };

        let (taken, exhausted) = patch.deplete(agent.params().consumption);
        if taken > 0.0 {
            agent.collected += taken;
            agent.mode = Mode::Exploit;
        } else {
            agent.mode = Mode::Explore;
        }

        if exhausted {
            let position = patch.position;
            tracing::debug!("Patch {} exhausted", patch.id);
            patches[idx] = if self.params.regenerate_patches {
                let fresh = self.new_patch(*next_patch_id, position, rng);
                *next_patch_id += 1;
                if self.params.record_trajectory {
                    trajectory.patches.push(patch_record(&fresh, arena));
                }
                Some(fresh)
            } else {
                None
            };
        }
    }

    /// Runs one episode. The same seed always produces the same outcome.
    pub fn run(&self, seed: u64) -> Result<(EpisodeOutcome, Trajectory)> {
        let started = Instant::now();
        let p = &self.params;
        let mut rng = StdRng::seed_from_u64(seed);

        let arena = Arena::new(
            p.width,
            p.height,
            p.boundary_scale,
            p.agent.radius,
            p.sim_type.has_walls(),
            p.obstacles.clone(),
        );

        let mut trajectory = Trajectory::default();
        let mut patches: Vec<Option<Resource>> = Vec::with_capacity(p.patch_positions.len());
        for (id, &position) in p.patch_positions.iter().enumerate() {
            let patch = self.new_patch(id, position, &mut rng);
            if p.record_trajectory {
                trajectory.patches.push(patch_record(&patch, &arena));
            }
            patches.push(Some(patch));
        }
        let mut next_patch_id = patches.len();

        let mut agents = self.spawn_agents(&arena, &patches, &mut rng)?;

        let num_classes = p.num_percept_classes();
        let perception = PerceptionParams {
            transform: p.dist_transform,
            min_dist: p.agent.radius,
            max_dist: arena.max_distance(),
            dist_noise_std: p.dist_noise_std,
            num_classes,
        };
        let action_noise = p.action_noise_std * 2.0;
        let mut first_consume: Option<usize> = None;

        for t in 0..p.horizon {
            agents.iter_mut().for_each(Agent::reset_step);
            self.detect_collisions(&arena, &patches, &mut agents);

            let views: Vec<AgentView> = agents.iter().map(Agent::view).collect();
            for agent in agents.iter_mut() {
                agent.visual_sensing(&arena, &views, &mut rng);
            }

            if p.record_trajectory {
                for agent in &agents {
                    let eye = agent.eye();
                    trajectory.frames.push(AgentFrame {
                        agent: agent.id,
                        step: t,
                        x: eye.x,
                        y: arena.flip_y(eye.y),
                        mode: agent.mode.code(),
                        collected: agent.collected,
                    });
                }
            }

            for agent in agents.iter_mut() {
                let one_hot = agent.encode_one_hot(num_classes);
                let other = other_inputs(
                    p.sim_type,
                    p.other_input_size,
                    p.other_input_enabled,
                    agent.on_resource,
                    agent.acceleration,
                    p.agent.max_velocity,
                );
                let observation =
                    build_observation(one_hot, agent.dist_field.as_deref(), other, &perception, &mut rng);
                let action = agent.controller_mut().act(&observation, &mut rng);
                agent.last_action = action;

                if agent.mode == Mode::Exploit {
                    match p.sim_type {
                        SimType::Walls => {
                            tracing::debug!("Agent {} reached the patch at step {}", agent.id, t);
                            let outcome = EpisodeOutcome {
                                seed,
                                steps: t,
                                distance_to_patch: 0.0,
                                resources_collected: 0.0,
                                first_consume_step: t,
                                elapsed_secs: started.elapsed().as_secs_f64(),
                            };
                            return Ok((outcome, trajectory));
                        }
                        SimType::NoWalls => {
                            first_consume.get_or_insert(t);
                            self.consume(agent, &mut patches, &mut next_patch_id, &mut trajectory, &arena, &mut rng);
                        }
                    }
                } else {
                    let noise: f64 = rng.sample::<f64, _>(StandardNormal) * action_noise;
                    agent.step_motion(action + noise);
                }
            }
        }

        let distance_to_patch = match (agents.first(), patches.first().and_then(Option::as_ref)) {
            (Some(agent), Some(patch)) if p.sim_type.has_walls() => agent.position.distance(patch.position),
            _ => 0.0,
        };
        let outcome = EpisodeOutcome {
            seed,
            steps: p.horizon,
            distance_to_patch,
            resources_collected: agents.iter().map(|a| a.collected).sum(),
            first_consume_step: first_consume.unwrap_or(p.horizon),
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        Ok((outcome, trajectory))
    }
}

fn patch_record(patch: &Resource, arena: &Arena) -> PatchRecord {
    PatchRecord {
        patch: patch.id,
        x: patch.position.x,
        y: arena.flip_y(patch.position.y),
        radius: patch.radius,
    }
}

/// Writes agent frames as CSV rows `agent,step,x,y,mode,collected`.
pub fn write_trajectory_csv<W: Write>(trajectory: &Trajectory, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for frame in &trajectory.frames {
        wtr.serialize(frame)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes patch records as CSV rows `patch,x,y,radius`.
pub fn write_patches_csv<W: Write>(trajectory: &Trajectory, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for patch in &trajectory.patches {
        wtr.serialize(patch)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::RandomWalk;

    fn walls_params() -> SimParams {
        SimParams {
            sim_type: SimType::Walls,
            width: 400.0,
            height: 400.0,
            boundary_scale: 0.0,
            num_agents: 1,
            horizon: 200,
            agent: AgentParams {
                radius: 10.0,
                max_velocity: 2.0,
                fov: 0.4,
                vision_range: 1000.0,
                resolution: 8,
                consumption: 1.0,
                angle_noise_std: 0.0,
                track_distance: true,
            },
            obstacles: Vec::new(),
            patch_positions: vec![Vec2::new(200.0, 200.0)],
            patch_radius: 50.0,
            patch_units: (5, 5),
            patch_quality: (1.0, 1.0),
            regenerate_patches: false,
            other_input_size: 1,
            other_input_enabled: true,
            dist_transform: DistTransform::MaxWf,
            dist_noise_std: 0.0,
            action_noise_std: 0.0,
            record_trajectory: true,
            max_spawn_attempts: 1000,
        }
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let sim = Simulation::new(walls_params(), Box::new(RandomWalk::new(0.5)));
        let (a, ta) = sim.run(7).unwrap();
        let (b, tb) = sim.run(7).unwrap();
        assert_eq!(a.steps, b.steps);
        assert_eq!(a.distance_to_patch, b.distance_to_patch);
        assert_eq!(ta.frames, tb.frames);
    }

    #[test]
    fn test_walls_outcome_is_arrival_or_horizon() {
        let sim = Simulation::new(walls_params(), Box::new(RandomWalk::new(0.5)));
        for seed in 0..5 {
            let (outcome, trajectory) = sim.run(seed).unwrap();
            if outcome.distance_to_patch == 0.0 {
                assert!(outcome.steps < 200);
            } else {
                assert_eq!(outcome.steps, 200);
                assert_eq!(trajectory.steps_recorded(), 200);
            }
            assert_eq!(trajectory.patches.len(), 1);
        }
    }

    #[test]
    fn test_spawn_never_overlaps_patch() {
        let mut params = walls_params();
        params.horizon = 1;
        let sim = Simulation::new(params, Box::new(RandomWalk::new(0.0)));
        for seed in 0..20 {
            let (outcome, _) = sim.run(seed).unwrap();
            // Starting on the patch would end the episode at step 0.
            assert_eq!(outcome.steps, 1);
        }
    }

    #[test]
    fn test_impossible_spawn_is_an_error() {
        let mut params = walls_params();
        params.patch_radius = 1000.0;
        params.max_spawn_attempts = 20;
        let sim = Simulation::new(params, Box::new(RandomWalk::new(0.0)));
        assert!(matches!(sim.run(0), Err(NavError::SimulationError { .. })));
    }

    #[test]
    fn test_foraging_collects_with_regeneration() {
        let mut params = walls_params();
        params.sim_type = SimType::NoWalls;
        params.num_agents = 3;
        params.width = 200.0;
        params.height = 200.0;
        params.patch_positions = vec![Vec2::new(100.0, 100.0)];
        params.patch_radius = 60.0;
        params.patch_units = (3, 4);
        params.regenerate_patches = true;
        params.horizon = 400;
        params.dist_transform = DistTransform::None;
        params.agent.track_distance = false;

        let sim = Simulation::new(params, Box::new(RandomWalk::new(0.3)));
        let (outcome, trajectory) = sim.run(3).unwrap();
        assert_eq!(outcome.steps, 400);
        assert_eq!(outcome.distance_to_patch, 0.0);
        let last: f64 = (0..3)
            .filter_map(|a| trajectory.frames_for(a).last().map(|f| f.collected))
            .sum();
        assert!(outcome.resources_collected >= last);
        if outcome.resources_collected > 3.0 {
            assert!(trajectory.patches.len() > 1);
        }
    }

    #[test]
    fn test_obstacle_contact_blocks_motion() {
        let params = walls_params();
        let sim = Simulation::new(params.clone(), Box::new(RandomWalk::new(0.0)));
        let obstacle = Obstacle {
            x: 225.0,
            y: 100.0,
            radius: 20.0,
        };
        let arena = Arena::new(400.0, 400.0, 0.0, 10.0, true, vec![obstacle]);
        let mut agents = vec![Agent::new(
            0,
            Vec2::new(200.0, 100.0),
            0.0,
            params.agent,
            Box::new(RandomWalk::new(0.0)),
        )];

        sim.detect_collisions(&arena, &[], &mut agents);
        assert_eq!(agents[0].mode, Mode::Collide);
        assert_eq!(agents[0].collided_points, vec![Vec2::new(212.5, 100.0)]);

        agents[0].step_motion(0.0);
        assert_eq!(agents[0].position, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn test_trajectory_csv_has_header_and_rows() {
        let mut params = walls_params();
        params.horizon = 3;
        let sim = Simulation::new(params, Box::new(RandomWalk::new(0.0)));
        let (_, trajectory) = sim.run(1).unwrap();
        let mut buf = Vec::new();
        write_trajectory_csv(&trajectory, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("agent,step,x,y,mode,collected"));
        assert_eq!(lines.count(), trajectory.frames.len());
    }
}
