//! sgltk demo.
//!
//! Shows a textured quad, a particle fountain, a HUD drawn with an orthographic camera and,
//! optionally, a Wavefront OBJ model.
//!
//! Controls:
//!
//! - WASD to move, R and F to go up and down, Q and E to roll.
//! - Move the mouse to look around.
//! - L toggles wireframe rendering, P recompiles the shaders.
//! - F2 saves a screenshot in the working directory.
//!
//! Press <escape> to quit or close the window.

mod scene;

use log::{error, info};
use sgltk::paths::chdir_to_bin;
use sgltk::{Image, Model, Shader};
use sgltk_sdl2::{Window, WindowOpt};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use structopt::StructOpt;

use crate::scene::Scene;

#[derive(Debug, StructOpt)]
pub struct CLIOpts {
  #[structopt(short, long, parse(from_os_str))]
  /// Directory holding the shaders, textures and models.
  data: Option<PathBuf>,

  #[structopt(short, long, default_value = "60")]
  /// Frame rate cap; 0 disables it.
  fps: u32,

  #[structopt(long)]
  /// Do not synchronize with the display.
  no_vsync: bool,

  #[structopt(short, long)]
  /// Load this OBJ model, found through the model search paths.
  model: Option<String>,
}

// What can go wrong while running the demo.
#[derive(Debug)]
pub enum AppError {
  CannotCreateWindow(Box<dyn Error>),
  ShaderCompilationFailed(Box<dyn Error>),
  CannotLoadTexture(Box<dyn Error>),
  CannotLoadModel(Box<dyn Error>),
  CannotBuildMesh(Box<dyn Error>),
}

impl fmt::Display for AppError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      AppError::CannotCreateWindow(ref e) => write!(f, "cannot create window: {}", e),
      AppError::ShaderCompilationFailed(ref e) => write!(f, "cannot compile shader: {}", e),
      AppError::CannotLoadTexture(ref e) => write!(f, "cannot load texture: {}", e),
      AppError::CannotLoadModel(ref e) => write!(f, "cannot load model: {}", e),
      AppError::CannotBuildMesh(ref e) => write!(f, "cannot build mesh: {}", e),
    }
  }
}

fn main() {
  if let Err(e) = run(CLIOpts::from_args()) {
    error!("an error occurred: {}", e);
  }
}

fn run(opts: CLIOpts) -> Result<(), AppError> {
  env_logger::init();

  if let Err(e) = chdir_to_bin() {
    error!("cannot change to the executable directory: {}", e);
  }

  add_search_paths(&opts);

  let mut window = Window::new(
    WindowOpt::default()
      .set_title("sgltk demo")
      .set_size(1280, 720)
      .set_num_samples(4),
  )
  .map_err(|e| AppError::CannotCreateWindow(Box::new(e)))?;

  let (major, minor) = window.gl_version();
  info!("running on OpenGL {}.{}", major, minor);

  if !window.enable_vsync(!opts.no_vsync) {
    info!("cannot change vertical synchronization");
  }

  window.set_relative_mode(true);

  let mut scene = Scene::new(&window)?;

  if let Some(ref name) = opts.model {
    scene.load_model(&window, name)?;
  }

  window.run(&mut scene, opts.fps);
  Ok(())
}

fn add_search_paths(opts: &CLIOpts) {
  let mut roots = vec![
    "data".to_owned(),
    "../data".to_owned(),
    "../../sgltk-examples/data".to_owned(),
  ];

  if let Some(dir) = opts.data.as_ref().and_then(|d| d.to_str()) {
    roots.insert(0, dir.trim_end_matches('/').to_owned());
  }

  for root in &roots {
    Shader::add_path(&format!("{}/shaders", root));
    Image::add_path(&format!("{}/textures", root));
    Image::add_path(&format!("{}/fonts", root));
    Model::add_path(&format!("{}/models", root));
  }
}
