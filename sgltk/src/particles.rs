//! GPU particle systems.
//!
//! Particles are simulated in the vertex shader: each one only carries its spawn position, its
//! velocity and a `(start, lifetime)` pair in milliseconds, and the shader derives the current
//! state from the `time` uniform. The CPU side just recycles dead slots.

use cgmath::{Matrix4, Vector2, Vector3};
use log::debug;
use std::{error, fmt, mem, rc::Rc};

use crate::buffer::Usage;
use crate::camera::{Camera, Projection};
use crate::context::Context;
use crate::mesh::{AttribType, Mesh, MeshError, Mode};
use crate::shader::Shader;
use crate::texture::Texture;
use crate::timer::Timer;

const POSITION_NAME: &str = "position_in";
const VELOCITY_NAME: &str = "velocity_in";
const LIFETIME_NAME: &str = "lifetime_in";
const TIME_NAME: &str = "time";

// vertex buffer indices inside the mesh
const POSITION_BUF: usize = 0;
const VELOCITY_BUF: usize = 1;
const LIFETIME_BUF: usize = 2;

/// CPU-side particle storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticlePool {
  positions: Vec<Vector3<f32>>,
  velocities: Vec<Vector3<f32>>,
  lifetimes: Vec<Vector2<f32>>,
}

impl ParticlePool {
  /// A pool of `size` dead particles.
  pub fn new(size: usize) -> Self {
    let mut pool = Self::default();
    pool.resize(size);
    pool
  }

  /// Reset to `size` dead particles.
  pub fn resize(&mut self, size: usize) {
    self.positions = vec![Vector3::new(0., 0., 0.); size];
    self.velocities = vec![Vector3::new(0., 0., 0.); size];
    self.lifetimes = vec![Vector2::new(0., 0.); size];
  }

  /// Number of slots.
  pub fn len(&self) -> usize {
    self.positions.len()
  }

  /// Whether there are no slots.
  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }

  /// Initial positions.
  pub fn positions(&self) -> &[Vector3<f32>] {
    &self.positions
  }

  /// Velocities.
  pub fn velocities(&self) -> &[Vector3<f32>] {
    &self.velocities
  }

  /// `(start, lifetime)` of every particle, in milliseconds.
  pub fn lifetimes(&self) -> &[Vector2<f32>] {
    &self.lifetimes
  }

  /// Whether the particle in `slot` is still alive at time `now`.
  pub fn is_alive(&self, slot: usize, now: f32) -> bool {
    self
      .lifetimes
      .get(slot)
      .map_or(false, |l| l.x + l.y >= now)
  }

  /// Spawn a particle in the first dead slot and return that slot.
  ///
  /// Returns `None` if every particle is still alive.
  pub fn add_particle(
    &mut self,
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    lifetime: f32,
    now: f32,
  ) -> Option<usize> {
    let slot = (0..self.len()).find(|&i| !self.is_alive(i, now))?;

    self.positions[slot] = position;
    self.velocities[slot] = velocity;
    self.lifetimes[slot] = Vector2::new(now, lifetime);

    Some(slot)
  }
}

/// Errors happening while drawing particles.
#[non_exhaustive]
#[derive(Debug)]
pub enum ParticlesError {
  /// No shader was set up.
  NoShader,
  /// The underlying mesh failed.
  MeshError(MeshError),
}

impl fmt::Display for ParticlesError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      ParticlesError::NoShader => f.write_str("no shader set"),
      ParticlesError::MeshError(ref e) => write!(f, "particle mesh error: {}", e),
    }
  }
}

impl error::Error for ParticlesError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      ParticlesError::MeshError(e) => Some(e),
      _ => None,
    }
  }
}

impl From<MeshError> for ParticlesError {
  fn from(e: MeshError) -> Self {
    match e {
      MeshError::NoShader => ParticlesError::NoShader,
      e => ParticlesError::MeshError(e),
    }
  }
}

/// A particle system drawn as points.
///
/// The shader receives the attributes `position_in` (vec3), `velocity_in` (vec3) and
/// `lifetime_in` (vec2) plus the uniform `time`, in milliseconds since the system was created.
#[derive(Debug)]
pub struct Particles {
  ctx: Context,
  mesh: Mesh,
  pool: ParticlePool,
  timer: Timer,
}

impl Particles {
  /// An empty particle system; call [`Particles::resize`] to allocate it.
  pub fn new(ctx: &Context) -> Self {
    Particles {
      ctx: ctx.clone(),
      mesh: Mesh::new(ctx),
      pool: ParticlePool::default(),
      timer: Timer::new(),
    }
  }

  /// Reallocate for `size` particles; every particle is dead afterwards.
  pub fn resize(&mut self, size: usize) {
    self.pool.resize(size);

    let mut mesh = Mesh::new(&self.ctx);
    if let Some(shader) = self.mesh.shader() {
      mesh.setup_shader(shader.clone());
    }
    mesh.setup_camera(self.mesh.view_matrix(), self.mesh.projection_matrix());
    mesh.textures = mem::take(&mut self.mesh.textures);

    mesh.attach_vertex_buffer(self.pool.positions(), Usage::DynamicDraw);
    mesh.attach_vertex_buffer(self.pool.velocities(), Usage::DynamicDraw);
    mesh.attach_vertex_buffer(self.pool.lifetimes(), Usage::DynamicDraw);

    let indices: Vec<u32> = (0..size as u32).collect();
    mesh.attach_index_buffer(&indices);

    self.mesh = mesh;
    self.set_attributes();
  }

  /// Number of slots.
  pub fn len(&self) -> usize {
    self.pool.len()
  }

  /// Whether there are no slots.
  pub fn is_empty(&self) -> bool {
    self.pool.is_empty()
  }

  /// Slot bookkeeping.
  pub fn pool(&self) -> &ParticlePool {
    &self.pool
  }

  /// Use `shader` for drawing.
  pub fn setup_shader(&mut self, shader: Rc<Shader>) {
    self.mesh.setup_shader(shader);
    self.set_attributes();
  }

  /// Copy the view and projection matrices.
  pub fn setup_camera(&mut self, view: Matrix4<f32>, projection: Matrix4<f32>) {
    self.mesh.setup_camera(view, projection);
  }

  /// Copy the camera matrices.
  pub fn setup_camera_from<P>(&mut self, camera: &Camera<P>)
  where
    P: Projection,
  {
    self.mesh.setup_camera_from(camera);
  }

  /// Bind `texture` to the sampler `name` when drawing.
  pub fn attach_texture(&mut self, name: &str, texture: Rc<Texture>) {
    self.mesh.attach_texture(name, texture, 0);
  }

  /// Spawn a particle; it is uploaded on the next [`Particles::update`].
  ///
  /// Returns `false` if every particle is still alive.
  pub fn add_particle(
    &mut self,
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    lifetime: f32,
  ) -> bool {
    let now = self.timer.get_time() as f32;
    self.pool.add_particle(position, velocity, lifetime, now).is_some()
  }

  /// Spawn a particle and upload it right away.
  pub fn add_particle_immediately(
    &mut self,
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    lifetime: f32,
  ) -> Result<bool, ParticlesError> {
    let now = self.timer.get_time() as f32;

    let slot = match self.pool.add_particle(position, velocity, lifetime, now) {
      Some(slot) => slot,
      None => return Ok(false),
    };

    let vec3 = mem::size_of::<Vector3<f32>>();
    let vec2 = mem::size_of::<Vector2<f32>>();

    self.mesh.replace_partial_data(
      POSITION_BUF,
      slot * vec3,
      &self.pool.positions()[slot..=slot],
    )?;
    self.mesh.replace_partial_data(
      VELOCITY_BUF,
      slot * vec3,
      &self.pool.velocities()[slot..=slot],
    )?;
    self.mesh.replace_partial_data(
      LIFETIME_BUF,
      slot * vec2,
      &self.pool.lifetimes()[slot..=slot],
    )?;

    Ok(true)
  }

  /// Upload every particle.
  pub fn update(&mut self) -> Result<(), ParticlesError> {
    self.mesh.replace_buffer_data(POSITION_BUF, self.pool.positions())?;
    self.mesh.replace_buffer_data(VELOCITY_BUF, self.pool.velocities())?;
    self.mesh.replace_buffer_data(LIFETIME_BUF, self.pool.lifetimes())?;

    Ok(())
  }

  /// Draw the particles as points. The `time` uniform receives the timer in milliseconds.
  pub fn draw(&self) -> Result<(), ParticlesError> {
    let shader = self.mesh.shader().ok_or(ParticlesError::NoShader)?;
    shader.set_uniform_by_name(TIME_NAME, self.timer.get_time() as f32);

    self.mesh.draw(Mode::Point, 0, None)?;
    Ok(())
  }

  // Map the attributes onto the buffers; needs both a shader and allocated buffers.
  fn set_attributes(&mut self) {
    if self.mesh.shader().is_none() || self.mesh.num_vertex_buffers() < 3 {
      return;
    }

    let attributes = [
      (POSITION_NAME, POSITION_BUF, 3),
      (VELOCITY_NAME, VELOCITY_BUF, 3),
      (LIFETIME_NAME, LIFETIME_BUF, 2),
    ];

    for &(name, buffer, components) in &attributes {
      if let Err(e) = self
        .mesh
        .set_vertex_attribute(name, buffer, components, AttribType::Float, 0, 0, 0)
      {
        debug!("particle attribute skipped: {}", e);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn v(x: f32) -> Vector3<f32> {
    Vector3::new(x, 0., 0.)
  }

  #[test]
  fn new_pool_is_dead() {
    let pool = ParticlePool::new(3);

    assert_eq!(pool.len(), 3);
    assert!((0..3).all(|i| !pool.is_alive(i, 1.)));
    assert!(!pool.is_alive(3, 1.));
  }

  #[test]
  fn fills_first_dead_slot() {
    let mut pool = ParticlePool::new(3);

    assert_eq!(pool.add_particle(v(1.), v(0.), 100., 10.), Some(0));
    assert_eq!(pool.add_particle(v(2.), v(0.), 100., 20.), Some(1));
    assert_eq!(pool.positions()[1], v(2.));
    assert_eq!(pool.lifetimes()[1], Vector2::new(20., 100.));
  }

  #[test]
  fn full_pool_rejects() {
    let mut pool = ParticlePool::new(2);

    assert!(pool.add_particle(v(1.), v(0.), 100., 10.).is_some());
    assert!(pool.add_particle(v(2.), v(0.), 100., 10.).is_some());
    assert_eq!(pool.add_particle(v(3.), v(0.), 100., 50.), None);
    assert_eq!(pool.positions()[0], v(1.));
  }

  #[test]
  fn expired_slots_are_reused() {
    let mut pool = ParticlePool::new(2);

    pool.add_particle(v(1.), v(0.), 10., 5.);
    pool.add_particle(v(2.), v(0.), 1000., 5.);

    // slot 0 died at 15 ms
    assert_eq!(pool.add_particle(v(3.), v(1.), 10., 16.), Some(0));
    assert_eq!(pool.velocities()[0], v(1.));
  }

  #[test]
  fn resize_kills_everything() {
    let mut pool = ParticlePool::new(1);
    pool.add_particle(v(1.), v(0.), 100., 1.);
    pool.resize(4);

    assert_eq!(pool.len(), 4);
    assert!(!pool.is_alive(0, 2.));
    assert_eq!(pool.positions()[0], v(0.));
  }

  #[test]
  fn empty_pool() {
    let mut pool = ParticlePool::default();

    assert!(pool.is_empty());
    assert_eq!(pool.add_particle(v(1.), v(0.), 1., 1.), None);
  }
}
