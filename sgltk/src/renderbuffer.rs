//! Renderbuffers.

use gl::types::*;
use std::cell::RefCell;
use std::rc::Rc;

use crate::context::Context;
use crate::state::GLState;

/// A renderbuffer; framebuffer storage that cannot be sampled.
#[derive(Debug)]
pub struct Renderbuffer {
  handle: GLuint,
  width: u32,
  height: u32,
  internal_format: GLenum,
  state: Rc<RefCell<GLState>>,
}

impl Drop for Renderbuffer {
  fn drop(&mut self) {
    unsafe {
      let mut state = self.state.borrow_mut();
      state.bind_renderbuffer(0);
      gl::DeleteRenderbuffers(1, &self.handle);
    }
  }
}

impl Renderbuffer {
  /// Allocate `width` × `height` storage of `internal_format`, e.g. `gl::DEPTH24_STENCIL8`.
  pub fn new(ctx: &Context, width: u32, height: u32, internal_format: GLenum) -> Self {
    let mut handle: GLuint = 0;

    unsafe {
      gl::GenRenderbuffers(1, &mut handle);
      ctx.state.borrow_mut().bind_renderbuffer(handle);
      gl::RenderbufferStorage(
        gl::RENDERBUFFER,
        internal_format,
        width as GLsizei,
        height as GLsizei,
      );
    }

    Renderbuffer {
      handle,
      width,
      height,
      internal_format,
      state: ctx.state.clone(),
    }
  }

  pub(crate) fn handle(&self) -> GLuint {
    self.handle
  }

  /// Bind the renderbuffer.
  pub fn bind(&self) {
    unsafe { self.state.borrow_mut().bind_renderbuffer(self.handle) };
  }

  /// Bind no renderbuffer.
  pub fn unbind(&self) {
    unsafe { self.state.borrow_mut().bind_renderbuffer(0) };
  }

  /// Width in pixels.
  pub fn width(&self) -> u32 {
    self.width
  }

  /// Height in pixels.
  pub fn height(&self) -> u32 {
    self.height
  }

  /// Internal format.
  pub fn internal_format(&self) -> GLenum {
    self.internal_format
  }
}
