//! Graphics state.

use gl::types::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::marker::PhantomData;

// TLS synchronization barrier for `GLState`.
thread_local!(static TLS_ACQUIRE_GFX_STATE: RefCell<Option<()>> = RefCell::new(Some(())));

/// Cached value.
///
/// A cached value is used to prevent issuing costy GPU commands if we know the target value is
/// already set to what the command tries to set. A non-cached (invalidated) value always forces
/// the next command to go through.
#[derive(Debug)]
struct Cached<T>(Option<T>)
where
  T: PartialEq;

impl<T> Cached<T>
where
  T: PartialEq,
{
  fn new(initial: T) -> Self {
    Cached(Some(initial))
  }

  fn invalidate(&mut self) {
    self.0 = None;
  }

  fn set(&mut self, value: T) {
    self.0 = Some(value);
  }

  /// A non-cached value is always invalid; a cached one is invalid if it differs from `new_val`.
  fn is_invalid(&self, new_val: &T) -> bool {
    match &self.0 {
      Some(ref t) => t != new_val,
      _ => true,
    }
  }
}

/// Polygon rasterization mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PolygonMode {
  /// Filled polygons.
  Fill,
  /// Wireframe.
  Line,
  /// Vertices only.
  Point,
}

/// The graphics state.
///
/// Tracks what is currently bound on the GL context of the current thread so that redundant API
/// calls can be skipped.
#[derive(Debug)]
pub struct GLState {
  _a: PhantomData<*const ()>, // !Send and !Sync

  viewport: Cached<[GLint; 4]>,
  clear_color: Cached<[GLfloat; 4]>,

  depth_test: Cached<bool>,
  blending: Cached<bool>,
  face_culling: Cached<bool>,
  polygon_mode: Cached<PolygonMode>,

  // texture
  current_texture_unit: Cached<GLenum>,
  bound_textures: Vec<(GLenum, GLuint)>,

  // buffers, per target and per indexed binding point
  bound_buffers: HashMap<GLenum, GLuint>,
  bound_buffer_bases: HashMap<(GLenum, u32), GLuint>,

  bound_draw_framebuffer: Cached<GLuint>,
  bound_read_framebuffer: Cached<GLuint>,
  bound_renderbuffer: GLuint,
  bound_vertex_array: GLuint,
  current_program: GLuint,
}

impl GLState {
  /// Create a new `GLState`.
  ///
  /// > Note: only one state can be acquired per thread.
  pub(crate) fn new() -> Result<Self, StateQueryError> {
    TLS_ACQUIRE_GFX_STATE.with(|rc| {
      let mut inner = rc.borrow_mut();

      match *inner {
        Some(_) => {
          inner.take();
          Self::get_from_context()
        }

        None => Err(StateQueryError::UnavailableGLState),
      }
    })
  }

  fn get_from_context() -> Result<Self, StateQueryError> {
    unsafe {
      let viewport = Cached::new(get_ctx_viewport()?);
      let clear_color = Cached::new(get_ctx_clear_color()?);
      let depth_test = Cached::new(get_ctx_capability(gl::DEPTH_TEST)?);
      let blending = Cached::new(get_ctx_capability(gl::BLEND)?);
      let face_culling = Cached::new(get_ctx_capability(gl::CULL_FACE)?);
      let polygon_mode = Cached::new(get_ctx_polygon_mode()?);
      let current_texture_unit = Cached::new(get_ctx_current_texture_unit()?);
      let bound_textures = vec![(gl::TEXTURE_2D, 0); 48]; // 48 is the platform minimal requirement
      let bound_draw_framebuffer =
        Cached::new(get_ctx_binding(gl::DRAW_FRAMEBUFFER_BINDING)?);
      let bound_read_framebuffer =
        Cached::new(get_ctx_binding(gl::READ_FRAMEBUFFER_BINDING)?);
      let bound_renderbuffer = get_ctx_binding(gl::RENDERBUFFER_BINDING)?;
      let bound_vertex_array = get_ctx_binding(gl::VERTEX_ARRAY_BINDING)?;
      let current_program = get_ctx_binding(gl::CURRENT_PROGRAM)?;

      Ok(GLState {
        _a: PhantomData,
        viewport,
        clear_color,
        depth_test,
        blending,
        face_culling,
        polygon_mode,
        current_texture_unit,
        bound_textures,
        bound_buffers: HashMap::new(),
        bound_buffer_bases: HashMap::new(),
        bound_draw_framebuffer,
        bound_read_framebuffer,
        bound_renderbuffer,
        bound_vertex_array,
        current_program,
      })
    }
  }

  /// Forget every cached value.
  ///
  /// Use this after issuing raw GL calls that change bindings behind the toolkit's back.
  pub fn invalidate(&mut self) {
    self.viewport.invalidate();
    self.clear_color.invalidate();
    self.depth_test.invalidate();
    self.blending.invalidate();
    self.face_culling.invalidate();
    self.polygon_mode.invalidate();
    self.current_texture_unit.invalidate();

    for t in &mut self.bound_textures {
      *t = (gl::TEXTURE_2D, 0);
    }

    self.bound_buffers.clear();
    self.bound_buffer_bases.clear();
    self.bound_draw_framebuffer.invalidate();
    self.bound_read_framebuffer.invalidate();
    self.bound_renderbuffer = 0;
    self.bound_vertex_array = 0;
    self.current_program = 0;
  }

  /// Invalidate the currently in-use shader program.
  pub fn invalidate_shader_program(&mut self) {
    self.current_program = 0;
  }

  pub(crate) fn viewport(&self) -> Option<[GLint; 4]> {
    self.viewport.0
  }

  pub(crate) unsafe fn set_viewport(&mut self, viewport: [GLint; 4]) {
    if self.viewport.is_invalid(&viewport) {
      gl::Viewport(viewport[0], viewport[1], viewport[2], viewport[3]);
      self.viewport.set(viewport);
    }
  }

  pub(crate) unsafe fn set_clear_color(&mut self, clear_color: [GLfloat; 4]) {
    if self.clear_color.is_invalid(&clear_color) {
      gl::ClearColor(
        clear_color[0],
        clear_color[1],
        clear_color[2],
        clear_color[3],
      );
      self.clear_color.set(clear_color);
    }
  }

  pub(crate) unsafe fn set_depth_test(&mut self, enabled: bool) {
    if self.depth_test.is_invalid(&enabled) {
      set_capability(gl::DEPTH_TEST, enabled);
      self.depth_test.set(enabled);
    }
  }

  pub(crate) unsafe fn set_blending(&mut self, enabled: bool) {
    if self.blending.is_invalid(&enabled) {
      if enabled {
        gl::BlendFunc(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
      }

      set_capability(gl::BLEND, enabled);
      self.blending.set(enabled);
    }
  }

  pub(crate) unsafe fn set_face_culling(&mut self, enabled: bool) {
    if self.face_culling.is_invalid(&enabled) {
      set_capability(gl::CULL_FACE, enabled);
      self.face_culling.set(enabled);
    }
  }

  pub(crate) unsafe fn set_polygon_mode(&mut self, mode: PolygonMode) {
    if self.polygon_mode.is_invalid(&mode) {
      let glmode = match mode {
        PolygonMode::Fill => gl::FILL,
        PolygonMode::Line => gl::LINE,
        PolygonMode::Point => gl::POINT,
      };

      gl::PolygonMode(gl::FRONT_AND_BACK, glmode);
      self.polygon_mode.set(mode);
    }
  }

  pub(crate) unsafe fn set_texture_unit(&mut self, unit: u32) {
    let unit = unit as GLenum;

    if self.current_texture_unit.is_invalid(&unit) {
      gl::ActiveTexture(gl::TEXTURE0 + unit);
      self.current_texture_unit.set(unit);
    }
  }

  /// Bind a texture to the currently active unit.
  pub(crate) unsafe fn bind_texture(&mut self, target: GLenum, handle: GLuint) {
    let unit = match self.current_texture_unit.0 {
      Some(unit) => unit as usize,
      None => {
        // unknown active unit; bind blindly and leave the per-unit cache alone
        gl::BindTexture(target, handle);
        return;
      }
    };

    match self.bound_textures.get(unit).cloned() {
      Some((target_, handle_)) if target != target_ || handle != handle_ => {
        gl::BindTexture(target, handle);
        self.bound_textures[unit] = (target, handle);
      }

      None => {
        gl::BindTexture(target, handle);

        // not enough registered texture units; let’s grow a bit more
        self.bound_textures.resize(unit + 1, (gl::TEXTURE_2D, 0));
        self.bound_textures[unit] = (target, handle);
      }

      _ => (), // cached
    }
  }

  /// Forget a texture that is about to be deleted.
  pub(crate) fn unbind_texture(&mut self, handle: GLuint) {
    for t in self.bound_textures.iter_mut().filter(|t| t.1 == handle) {
      t.1 = 0;
    }
  }

  pub(crate) unsafe fn bind_buffer(&mut self, target: GLenum, handle: GLuint, bind: Bind) {
    let cached = self.bound_buffers.get(&target).copied();

    if bind == Bind::Forced || cached != Some(handle) {
      gl::BindBuffer(target, handle);
      self.bound_buffers.insert(target, handle);
    }
  }

  /// Bind a buffer to an indexed binding point; this also binds it to the generic target.
  pub(crate) unsafe fn bind_buffer_base(&mut self, target: GLenum, index: u32, handle: GLuint) {
    let key = (target, index);

    if self.bound_buffer_bases.get(&key).copied() != Some(handle) {
      gl::BindBufferBase(target, index, handle);
      self.bound_buffer_bases.insert(key, handle);
      self.bound_buffers.insert(target, handle);
    }
  }

  pub(crate) unsafe fn unbind_buffer(&mut self, handle: GLuint) {
    self.bound_buffers.retain(|_, h| *h != handle);
    self.bound_buffer_bases.retain(|_, h| *h != handle);
  }

  pub(crate) unsafe fn bind_framebuffer(&mut self, target: GLenum, handle: GLuint) {
    let draw = target == gl::FRAMEBUFFER || target == gl::DRAW_FRAMEBUFFER;
    let read = target == gl::FRAMEBUFFER || target == gl::READ_FRAMEBUFFER;

    let dirty = (draw && self.bound_draw_framebuffer.is_invalid(&handle))
      || (read && self.bound_read_framebuffer.is_invalid(&handle));

    if dirty {
      gl::BindFramebuffer(target, handle);

      if draw {
        self.bound_draw_framebuffer.set(handle);
      }

      if read {
        self.bound_read_framebuffer.set(handle);
      }
    }
  }

  pub(crate) fn unbind_framebuffer(&mut self, handle: GLuint) {
    if !self.bound_draw_framebuffer.is_invalid(&handle) {
      self.bound_draw_framebuffer.invalidate();
    }

    if !self.bound_read_framebuffer.is_invalid(&handle) {
      self.bound_read_framebuffer.invalidate();
    }
  }

  pub(crate) unsafe fn bind_renderbuffer(&mut self, handle: GLuint) {
    if self.bound_renderbuffer != handle {
      gl::BindRenderbuffer(gl::RENDERBUFFER, handle);
      self.bound_renderbuffer = handle;
    }
  }

  pub(crate) unsafe fn bind_vertex_array(&mut self, handle: GLuint, bind: Bind) {
    if bind == Bind::Forced || self.bound_vertex_array != handle {
      gl::BindVertexArray(handle);
      self.bound_vertex_array = handle;

      // the element array binding is part of the vertex array state
      self.bound_buffers.remove(&gl::ELEMENT_ARRAY_BUFFER);
    }
  }

  pub(crate) unsafe fn unbind_vertex_array(&mut self) {
    self.bind_vertex_array(0, Bind::Cached)
  }

  pub(crate) unsafe fn use_program(&mut self, handle: GLuint) {
    if self.current_program != handle {
      gl::UseProgram(handle);
      self.current_program = handle;
    }
  }

  pub(crate) fn current_program(&self) -> GLuint {
    self.current_program
  }
}

/// Should the binding be cached or forced to the provided value?
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum Bind {
  Forced,
  Cached,
}

/// An error that might happen when the context is queried.
#[non_exhaustive]
#[derive(Debug)]
pub enum StateQueryError {
  /// The [`GLState`] object is unavailable.
  ///
  /// That might occur if you try to have more than one state on the same thread.
  UnavailableGLState,
  /// Corrupted capability state (depth test, blending, face culling).
  UnknownCapabilityState(GLenum, GLboolean),
  /// Corrupted polygon mode.
  UnknownPolygonMode(GLenum),
}

impl fmt::Display for StateQueryError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      StateQueryError::UnavailableGLState => write!(f, "unavailable graphics state"),
      StateQueryError::UnknownCapabilityState(ref cap, ref s) => {
        write!(f, "unknown state for capability {:#x}: {}", cap, s)
      }
      StateQueryError::UnknownPolygonMode(ref m) => write!(f, "unknown polygon mode: {:#x}", m),
    }
  }
}

impl error::Error for StateQueryError {}

unsafe fn set_capability(cap: GLenum, enabled: bool) {
  if enabled {
    gl::Enable(cap);
  } else {
    gl::Disable(cap);
  }
}

unsafe fn get_ctx_viewport() -> Result<[GLint; 4], StateQueryError> {
  let mut data = [0; 4];
  gl::GetIntegerv(gl::VIEWPORT, data.as_mut_ptr());
  Ok(data)
}

unsafe fn get_ctx_clear_color() -> Result<[GLfloat; 4], StateQueryError> {
  let mut data = [0.; 4];
  gl::GetFloatv(gl::COLOR_CLEAR_VALUE, data.as_mut_ptr());
  Ok(data)
}

unsafe fn get_ctx_capability(cap: GLenum) -> Result<bool, StateQueryError> {
  let state = gl::IsEnabled(cap);

  match state {
    gl::TRUE => Ok(true),
    gl::FALSE => Ok(false),
    _ => Err(StateQueryError::UnknownCapabilityState(cap, state)),
  }
}

unsafe fn get_ctx_polygon_mode() -> Result<PolygonMode, StateQueryError> {
  // front and back modes
  let mut modes = [gl::FILL as GLint; 2];
  gl::GetIntegerv(gl::POLYGON_MODE, modes.as_mut_ptr());

  let mode = modes[0] as GLenum;
  match mode {
    gl::FILL => Ok(PolygonMode::Fill),
    gl::LINE => Ok(PolygonMode::Line),
    gl::POINT => Ok(PolygonMode::Point),
    _ => Err(StateQueryError::UnknownPolygonMode(mode)),
  }
}

unsafe fn get_ctx_current_texture_unit() -> Result<GLenum, StateQueryError> {
  let mut active_texture = gl::TEXTURE0 as GLint;
  gl::GetIntegerv(gl::ACTIVE_TEXTURE, &mut active_texture);
  Ok(active_texture as GLenum - gl::TEXTURE0)
}

unsafe fn get_ctx_binding(binding: GLenum) -> Result<GLuint, StateQueryError> {
  let mut bound = 0 as GLint;
  gl::GetIntegerv(binding, &mut bound);
  Ok(bound as GLuint)
}
