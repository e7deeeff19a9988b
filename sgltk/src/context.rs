//! Graphics context.
//!
//! A [`Context`] is the entry point of the toolkit: every GPU object is created from it and
//! shares its cached [`GLState`]. It also owns the named texture registry used by models to avoid
//! loading the same image twice.

use gl::types::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::state::{GLState, PolygonMode, StateQueryError};
use crate::texture::Texture;

/// Buffers to clear with [`Context::clear`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClearBuffers {
  /// Clear the color buffer.
  pub color: bool,
  /// Clear the depth buffer.
  pub depth: bool,
  /// Clear the stencil buffer.
  pub stencil: bool,
}

impl ClearBuffers {
  /// Color and depth.
  pub const COLOR_DEPTH: ClearBuffers = ClearBuffers {
    color: true,
    depth: true,
    stencil: false,
  };

  /// Everything.
  pub const ALL: ClearBuffers = ClearBuffers {
    color: true,
    depth: true,
    stencil: true,
  };

  pub(crate) fn to_glbits(self) -> GLbitfield {
    let mut bits = 0;

    if self.color {
      bits |= gl::COLOR_BUFFER_BIT;
    }

    if self.depth {
      bits |= gl::DEPTH_BUFFER_BIT;
    }

    if self.stencil {
      bits |= gl::STENCIL_BUFFER_BIT;
    }

    bits
  }
}

/// Handle on the graphics state of the current thread.
///
/// Cloning a context is cheap and yields a handle on the same state.
#[derive(Clone, Debug)]
pub struct Context {
  pub(crate) state: Rc<RefCell<GLState>>,
  textures: Rc<RefCell<HashMap<String, Rc<Texture>>>>,
}

impl Context {
  /// Acquire the graphics state of the current thread.
  ///
  /// The GL function pointers must already be loaded. This fails if a context was already
  /// acquired on this thread.
  pub fn new() -> Result<Self, StateQueryError> {
    GLState::new().map(|state| Context {
      state: Rc::new(RefCell::new(state)),
      textures: Rc::new(RefCell::new(HashMap::new())),
    })
  }

  /// Access the cached state directly.
  pub fn state(&self) -> &Rc<RefCell<GLState>> {
    &self.state
  }

  /// Set the viewport.
  pub fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) {
    unsafe {
      self
        .state
        .borrow_mut()
        .set_viewport([x, y, width as GLint, height as GLint])
    };
  }

  /// Currently cached viewport as `[x, y, width, height]`, if known.
  pub fn viewport(&self) -> Option<[i32; 4]> {
    self.state.borrow().viewport()
  }

  /// Set the color used by [`Context::clear`].
  pub fn set_clear_color(&self, color: [f32; 4]) {
    unsafe { self.state.borrow_mut().set_clear_color(color) };
  }

  /// Clear the selected buffers of the bound draw framebuffer.
  pub fn clear(&self, buffers: ClearBuffers) {
    unsafe { gl::Clear(buffers.to_glbits()) };
  }

  /// Enable or disable depth testing.
  pub fn set_depth_test(&self, enabled: bool) {
    unsafe { self.state.borrow_mut().set_depth_test(enabled) };
  }

  /// Enable or disable alpha blending (source alpha, one minus source alpha).
  pub fn set_blending(&self, enabled: bool) {
    unsafe { self.state.borrow_mut().set_blending(enabled) };
  }

  /// Enable or disable back face culling.
  pub fn set_face_culling(&self, enabled: bool) {
    unsafe { self.state.borrow_mut().set_face_culling(enabled) };
  }

  /// Set the polygon rasterization mode.
  pub fn set_polygon_mode(&self, mode: PolygonMode) {
    unsafe { self.state.borrow_mut().set_polygon_mode(mode) };
  }

  /// Register a texture under `name`.
  ///
  /// Returns `false` and leaves the registry untouched if the name is already taken.
  pub fn store_texture(&self, name: impl Into<String>, texture: Rc<Texture>) -> bool {
    store_named(&mut self.textures.borrow_mut(), name.into(), texture)
  }

  /// Look a texture up by name.
  pub fn find_texture(&self, name: &str) -> Option<Rc<Texture>> {
    self.textures.borrow().get(name).cloned()
  }

  /// Remove a texture from the registry, returning it.
  pub fn remove_texture(&self, name: &str) -> Option<Rc<Texture>> {
    self.textures.borrow_mut().remove(name)
  }
}

fn store_named<T>(map: &mut HashMap<String, T>, name: String, value: T) -> bool {
  if map.contains_key(&name) {
    false
  } else {
    map.insert(name, value);
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_named_rejects_duplicates() {
    let mut map = HashMap::new();

    assert!(store_named(&mut map, "diffuse".to_owned(), 1));
    assert!(!store_named(&mut map, "diffuse".to_owned(), 2));
    assert_eq!(map["diffuse"], 1);
  }

  #[test]
  fn clear_bits() {
    let bits = ClearBuffers::COLOR_DEPTH.to_glbits();

    assert_eq!(bits, gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
    assert_eq!(
      ClearBuffers::ALL.to_glbits() & gl::STENCIL_BUFFER_BIT,
      gl::STENCIL_BUFFER_BIT
    );
  }
}
