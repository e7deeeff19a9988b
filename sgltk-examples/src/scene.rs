use cgmath::{Matrix4, Point3, Rad, Vector3};
use log::{error, info, warn};
use sgltk::{
  AttribType, ClearBuffers, Context, Image, Mesh, Mode, Model, Orthographic, OrthographicCamera,
  Particles, Perspective, PerspectiveCamera, Shader, StageType, Texture, Timer, Usage, Vertex,
};
use sgltk_sdl2::{Handler, Window};
use std::error::Error;
use std::mem;
use std::rc::Rc;

use crate::AppError;

const TEXTURE: &str = "tile.png";
#[cfg(feature = "ttf")]
const FONT: &str = "DejaVuSans.ttf";

const MOVE_SPEED: f32 = 0.005;
const ROLL_SPEED: f32 = 0.001;
const MOUSE_SENSITIVITY: f32 = 0.002;

const HUD_SIZE: f32 = 128.;
const HUD_MARGIN: f32 = 16.;

const PARTICLES: usize = 2000;
const PARTICLE_LIFETIME: f32 = 3000.;
const PARTICLES_PER_FRAME: usize = 4;

pub struct Scene {
  ctx: Context,
  camera: PerspectiveCamera,
  hud_camera: OrthographicCamera,
  shaders: Vec<Rc<Shader>>,
  model_shader: Rc<Shader>,
  quad: Mesh,
  hud: Mesh,
  particles: Particles,
  model: Option<Model>,
  clock: Timer,
  spawned: usize,
  wireframe: bool,
  screenshots: u32,
}

impl Scene {
  pub fn new(window: &Window) -> Result<Self, AppError> {
    let ctx = window.ctx().clone();
    let (width, height) = (window.width() as f32, window.height() as f32);

    let camera = PerspectiveCamera::with_orientation(
      Point3::new(0., 0., 10.),
      Vector3::new(0., 0., -1.),
      Vector3::new(0., 1., 0.),
      Perspective {
        width,
        height,
        ..Perspective::default()
      },
    );

    let hud_camera = OrthographicCamera::new(Orthographic {
      width,
      height,
      ..Orthographic::default()
    });

    let textured = build_shader(&ctx, "textured_vs.glsl", "textured_fs.glsl")?;
    let particle_shader = build_shader(&ctx, "particles_vs.glsl", "particles_fs.glsl")?;
    let model_shader = build_shader(&ctx, "model_vs.glsl", "model_fs.glsl")?;

    let texture = Rc::new(
      Texture::from_image_2d(&ctx, &decorated_image()?)
        .map_err(|e| AppError::CannotLoadTexture(Box::new(e)))?,
    );
    ctx.store_texture(TEXTURE, texture.clone());

    let mut quad = build_quad(&ctx, textured.clone(), texture.clone())?;
    quad.model_matrix = Matrix4::from_scale(4.);

    let hud = build_quad(&ctx, textured.clone(), texture.clone())?;

    let mut particles = Particles::new(&ctx);
    particles.resize(PARTICLES);
    particles.setup_shader(particle_shader.clone());
    particles.attach_texture("tex", texture);

    // particles size themselves in the vertex shader
    unsafe { sgltk::gl::Enable(sgltk::gl::PROGRAM_POINT_SIZE) };

    let mut scene = Scene {
      ctx,
      camera,
      hud_camera,
      shaders: vec![textured, particle_shader, model_shader.clone()],
      model_shader,
      quad,
      hud,
      particles,
      model: None,
      clock: Timer::new(),
      spawned: 0,
      wireframe: false,
      screenshots: 0,
    };

    scene.place_hud();
    Ok(scene)
  }

  pub fn load_model(&mut self, window: &Window, name: &str) -> Result<(), AppError> {
    let mut model = Model::new(window.ctx());
    model
      .load(name)
      .map_err(|e| AppError::CannotLoadModel(Box::new(e)))?;
    model.setup_shader(self.model_shader.clone());

    let [min, max] = model.bounding_box();
    info!("model {} loaded, bounding box {:?} to {:?}", name, min, max);

    self.model = Some(model);
    Ok(())
  }

  // Pin the HUD quad to the top left corner.
  fn place_hud(&mut self) {
    let w = self.hud_camera.projection.width;
    let h = self.hud_camera.projection.height;
    let offset = 0.5 * HUD_SIZE + HUD_MARGIN;

    let corner = Vector3::new(-0.5 * w + offset, 0.5 * h - offset, -1.);
    self.hud.model_matrix = Matrix4::from_translation(corner) * Matrix4::from_scale(HUD_SIZE);
    self.hud.setup_camera_from(&self.hud_camera);
  }

  fn spawn_particles(&mut self) {
    for _ in 0..PARTICLES_PER_FRAME {
      let angle = self.spawned as f32 * 2.399_963;
      let spread = 0.5 + 0.5 * (self.spawned as f32 * 0.37).sin().abs();
      let velocity = Vector3::new(angle.cos() * spread, 3. + spread, angle.sin() * spread);

      match self
        .particles
        .add_particle_immediately(Vector3::new(0., -2., 0.), velocity, PARTICLE_LIFETIME)
      {
        Ok(true) => self.spawned += 1,
        Ok(false) => break,
        Err(e) => {
          error!("cannot spawn particle: {}", e);
          break;
        }
      }
    }
  }

  fn set_wireframe(&mut self, on: bool) {
    self.wireframe = on;
    self.quad.wireframe = on;

    if let Some(ref mut model) = self.model {
      for mesh in model.meshes_mut() {
        mesh.wireframe = on;
      }
    }
  }

  fn recompile_shaders(&self) {
    for shader in &self.shaders {
      if let Err(e) = shader.recompile() {
        error!("shader recompilation failed: {}", e);
      }
    }

    if let Some(ref model) = self.model {
      info!("shaders recompiled, {} model meshes", model.meshes().len());
    }
  }

  fn save_screenshot(&mut self, window: &Window) {
    let path = format!("screenshot_{}.png", self.screenshots);

    match window.take_screenshot().save(&path) {
      Ok(()) => {
        info!("screenshot saved to {}", path);
        self.screenshots += 1;
      }
      Err(e) => error!("cannot save screenshot: {}", e),
    }
  }
}

impl Handler for Scene {
  fn display(&mut self, _window: &mut Window) {
    self.ctx.set_clear_color([0.1, 0.1, 0.15, 1.]);
    self.ctx.clear(ClearBuffers::COLOR_DEPTH);

    self.camera.update_view_matrix();
    self.quad.setup_camera_from(&self.camera);
    self.particles.setup_camera_from(&self.camera);

    self.ctx.set_depth_test(true);
    self.ctx.set_blending(false);

    let spin = Matrix4::from_angle_y(Rad(self.clock.get_time_s() as f32 * 0.5));

    if let Err(e) = self.quad.draw(Mode::Triangle, 0, None) {
      error!("cannot draw quad: {}", e);
    }

    if let Some(ref mut model) = self.model {
      model.setup_camera_from(&self.camera);

      let transform = Matrix4::from_translation(Vector3::new(0., 0., 2.)) * spin;

      if let Err(e) = model.draw(Some(&transform)) {
        error!("cannot draw model: {}", e);
      }
    }

    self.spawn_particles();
    self.ctx.set_blending(true);

    if let Err(e) = self.particles.draw() {
      error!("cannot draw particles: {}", e);
    }

    self.ctx.set_depth_test(false);

    if let Err(e) = self.hud.draw(Mode::Triangle, 0, None) {
      error!("cannot draw HUD: {}", e);
    }
  }

  fn handle_resize(&mut self, _window: &mut Window, width: u32, height: u32) {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);

    self.camera.set_size(w, h);
    self.hud_camera.set_size(w, h);
    self.place_hud();
  }

  fn handle_key_press(&mut self, window: &mut Window, key: &str, pressed: bool) {
    if !pressed {
      return;
    }

    match key {
      "Escape" => window.stop(),
      "L" => {
        let on = !self.wireframe;
        self.set_wireframe(on);
      }
      "P" => self.recompile_shaders(),
      "F2" => self.save_screenshot(window),
      _ => (),
    }
  }

  fn handle_keyboard(&mut self, window: &mut Window, key: &str) {
    let dt = window.delta_time() as f32;
    let step = MOVE_SPEED * dt;

    match key {
      "W" => self.camera.move_forward(step),
      "S" => self.camera.move_forward(-step),
      "D" => self.camera.move_right(step),
      "A" => self.camera.move_right(-step),
      "R" => self.camera.move_up(step),
      "F" => self.camera.move_up(-step),
      "E" => self.camera.roll(ROLL_SPEED * dt),
      "Q" => self.camera.roll(-ROLL_SPEED * dt),
      _ => (),
    }
  }

  fn handle_mouse_motion(&mut self, window: &mut Window, x: i32, y: i32) {
    if !window.relative_mode() {
      return;
    }

    self.camera.yaw(-x as f32 * MOUSE_SENSITIVITY);
    self.camera.pitch(-y as f32 * MOUSE_SENSITIVITY);
  }

  fn handle_gamepad_added(&mut self, window: &mut Window, id: u32) {
    if let Some(pad) = window.gamepad_mut(id) {
      pad.set_deadzone(4000);
      pad.play_rumble(0.5, 200);
    }
  }
}

fn build_shader(ctx: &Context, vs: &str, fs: &str) -> Result<Rc<Shader>, AppError> {
  let mut shader = Shader::new(ctx);

  shader
    .attach_file(vs, StageType::Vertex)
    .map_err(|e| AppError::ShaderCompilationFailed(Box::new(e)))?;
  shader
    .attach_file(fs, StageType::Fragment)
    .map_err(|e| AppError::ShaderCompilationFailed(Box::new(e)))?;
  shader
    .link()
    .map_err(|e| AppError::ShaderCompilationFailed(Box::new(e)))?;

  Ok(Rc::new(shader))
}

// A unit quad in the XY plane facing +Z.
fn build_quad(ctx: &Context, shader: Rc<Shader>, texture: Rc<Texture>) -> Result<Mesh, AppError> {
  let normal = Vector3::new(0., 0., 1.);
  let vertices = [
    Vertex::with_tex_coord(Vector3::new(-0.5, -0.5, 0.), normal, Vector3::new(0., 1., 0.)),
    Vertex::with_tex_coord(Vector3::new(0.5, -0.5, 0.), normal, Vector3::new(1., 1., 0.)),
    Vertex::with_tex_coord(Vector3::new(0.5, 0.5, 0.), normal, Vector3::new(1., 0., 0.)),
    Vertex::with_tex_coord(Vector3::new(-0.5, 0.5, 0.), normal, Vector3::new(0., 0., 0.)),
  ];
  let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];

  let mut mesh = Mesh::new(ctx);
  mesh.setup_shader(shader);

  let buffer = mesh.attach_vertex_buffer(&vertices, Usage::StaticDraw);
  mesh.attach_index_buffer(&indices);

  let stride = mem::size_of::<Vertex>();
  mesh
    .set_vertex_attribute(
      "pos_in",
      buffer,
      4,
      AttribType::Float,
      stride,
      Vertex::OFFSET_POSITION,
      0,
    )
    .and_then(|_| {
      mesh.set_vertex_attribute(
        "tex_coord_in0",
        buffer,
        3,
        AttribType::Float,
        stride,
        Vertex::OFFSET_TEX_COORD,
        0,
      )
    })
    .map_err(|e| AppError::CannotBuildMesh(Box::new(e)))?;

  mesh
    .compute_bounding_box(&vertices, Vertex::OFFSET_POSITION)
    .map_err(|e| AppError::CannotBuildMesh(Box::new(e)))?;
  mesh.attach_texture("tex", texture, 0);

  Ok(mesh)
}

// The base texture with something blended over its centre.
fn decorated_image() -> Result<Image, AppError> {
  let mut image = Image::new();
  image
    .load(TEXTURE)
    .map_err(|e| AppError::CannotLoadTexture(Box::new(e)))?;

  if let Err(e) = decorate(&mut image) {
    warn!("cannot decorate texture: {}", e);
  }

  Ok(image)
}

// Mirrored copy of the centre.
#[cfg(not(feature = "ttf"))]
fn decorate(image: &mut Image) -> Result<(), Box<dyn Error>> {
  let (w, h) = (image.width(), image.height());
  let mut mirrored = image.clone();
  mirrored.horizontal_flip();

  let centre = sgltk::Rect::new(w as i32 / 4, h as i32 / 4, w / 2, h / 2);
  image.copy_rect(&mirrored, centre, centre)?;
  Ok(())
}

// Centred caption.
#[cfg(feature = "ttf")]
fn decorate(image: &mut Image) -> Result<(), Box<dyn Error>> {
  let ttf = sgltk_sdl2::sdl2::ttf::init()?;
  let text = sgltk_sdl2::render_text(&ttf, "sgltk", FONT, 16, [255, 255, 255, 255])?;

  let x = (image.width() as i32 - text.width() as i32) / 2;
  let y = (image.height() as i32 - text.height() as i32) / 2;
  image.copy_from(&text, x, y)?;
  Ok(())
}
