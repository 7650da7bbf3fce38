use nalgebra as na;
use rand::Rng;

use crate::config::FittingConfig;
use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Particle {
    pub position: na::Point3<f32>,
    pub velocity: na::Vector3<f32>,
    pub fitness: f32,
    pub best_position: na::Point3<f32>,
    pub best_fitness: f32,
}

/// Particle swarm minimising a fitness over 3D positions.
///
/// Particles are spread uniformly in a cube of side `jitter` around the origin and start at rest.
/// The inertia weight falls linearly from `w0` to `wt` over `iterations` steps.
pub struct Swarm {
    particles: Vec<Particle>,
    best_position: na::Point3<f32>,
    best_fitness: f32,
    inertia: f32,
    inertia_step: f32,
    c1: f32,
    c2: f32,
    max_velocity: f32,
}

impl Swarm {
    pub fn new<R, F>(
        config: &FittingConfig,
        origin: na::Point3<f32>,
        rng: &mut R,
        fitness: &mut F,
    ) -> Result<Self, Error>
    where
        R: Rng,
        F: FnMut(&na::Point3<f32>) -> f32,
    {
        let mut particles = Vec::new();
        particles.try_reserve_exact(config.particles)?;

        let mut best_position = origin;
        let mut best_fitness = f32::INFINITY;

        for _ in 0..config.particles {
            let offset = na::Vector3::from_fn(|_, _| rng.gen::<f32>() - 0.5) * config.jitter;
            let position = origin + offset;
            let value = fitness(&position);

            if value < best_fitness {
                best_fitness = value;
                best_position = position;
            }

            particles.push(Particle {
                position,
                velocity: na::Vector3::zeros(),
                fitness: value,
                best_position: position,
                best_fitness: value,
            });
        }

        let iterations = config.iterations.max(1) as f32;

        Ok(Self {
            particles,
            best_position,
            best_fitness,
            inertia: config.w0,
            inertia_step: (config.w0 - config.wt) / iterations,
            c1: config.c1,
            c2: config.c2,
            max_velocity: config.max_velocity,
        })
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Global best position and its fitness
    #[inline]
    pub fn best(&self) -> (na::Point3<f32>, f32) {
        (self.best_position, self.best_fitness)
    }

    #[inline]
    pub fn inertia(&self) -> f32 {
        self.inertia
    }

    pub fn step<R, F>(&mut self, rng: &mut R, fitness: &mut F)
    where
        R: Rng,
        F: FnMut(&na::Point3<f32>) -> f32,
    {
        let vmax = self.max_velocity;

        for p in self.particles.iter_mut() {
            let r1 = na::Vector3::from_fn(|_, _| rng.gen::<f32>());
            let r2 = na::Vector3::from_fn(|_, _| rng.gen::<f32>());

            let cognitive = r1.component_mul(&(p.best_position - p.position)) * self.c1;
            let social = r2.component_mul(&(self.best_position - p.position)) * self.c2;

            p.velocity = (p.velocity * self.inertia + cognitive + social)
                .map(|v| v.clamp(-vmax, vmax));
            p.position += p.velocity;
            p.fitness = fitness(&p.position);

            if p.fitness < p.best_fitness {
                p.best_fitness = p.fitness;
                p.best_position = p.position;
            }

            if p.fitness < self.best_fitness {
                self.best_fitness = p.fitness;
                self.best_position = p.position;
            }
        }

        self.inertia -= self.inertia_step;
    }
}

/// Runs a full swarm from `origin` and returns the best position found with its fitness.
pub fn minimize<R, F>(
    config: &FittingConfig,
    origin: na::Point3<f32>,
    rng: &mut R,
    mut fitness: F,
) -> Result<(na::Point3<f32>, f32), Error>
where
    R: Rng,
    F: FnMut(&na::Point3<f32>) -> f32,
{
    let mut swarm = Swarm::new(config, origin, rng, &mut fitness)?;

    for _ in 0..config.iterations {
        swarm.step(rng, &mut fitness);
    }

    Ok(swarm.best())
}
