//! Framebuffers.

use gl::types::*;
use std::cell::RefCell;
use std::error;
use std::fmt;
use std::rc::Rc;

use crate::context::{ClearBuffers, Context};
use crate::image::{Image, Rect};
use crate::renderbuffer::Renderbuffer;
use crate::state::GLState;
use crate::texture::Texture;

/// Where a framebuffer is bound.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FramebufferTarget {
  /// Both draw and read.
  Framebuffer,
  /// Draw only.
  Draw,
  /// Read only.
  Read,
}

fn opengl_target(target: FramebufferTarget) -> GLenum {
  match target {
    FramebufferTarget::Framebuffer => gl::FRAMEBUFFER,
    FramebufferTarget::Draw => gl::DRAW_FRAMEBUFFER,
    FramebufferTarget::Read => gl::READ_FRAMEBUFFER,
  }
}

/// Attachment point.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Attachment {
  /// Color attachment `n`.
  Color(u32),
  /// Depth.
  Depth,
  /// Stencil.
  Stencil,
  /// Packed depth and stencil.
  DepthStencil,
}

/// Filter used when a blit scales.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BlitFilter {
  /// Nearest.
  Nearest,
  /// Linear; only valid for color blits.
  Linear,
}

/// Reason a framebuffer is incomplete.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IncompleteReason {
  /// Incomplete framebuffer.
  Undefined,
  /// Incomplete attachment (color / depth).
  IncompleteAttachment,
  /// An attachment was missing.
  MissingAttachment,
  /// Incomplete draw buffer.
  IncompleteDrawBuffer,
  /// Incomplete read buffer.
  IncompleteReadBuffer,
  /// Unsupported.
  Unsupported,
  /// Incomplete multisample configuration.
  IncompleteMultisample,
  /// Incomplete layer targets.
  IncompleteLayerTargets,
  /// Status not known to the toolkit.
  Unknown(GLenum),
}

impl fmt::Display for IncompleteReason {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      IncompleteReason::Undefined => write!(f, "default framebuffer does not exist"),
      IncompleteReason::IncompleteAttachment => write!(f, "incomplete attachment"),
      IncompleteReason::MissingAttachment => write!(f, "missing attachment"),
      IncompleteReason::IncompleteDrawBuffer => write!(f, "incomplete draw buffer"),
      IncompleteReason::IncompleteReadBuffer => write!(f, "incomplete read buffer"),
      IncompleteReason::Unsupported => write!(f, "unsupported"),
      IncompleteReason::IncompleteMultisample => write!(f, "incomplete multisample"),
      IncompleteReason::IncompleteLayerTargets => write!(f, "incomplete layer targets"),
      IncompleteReason::Unknown(status) => write!(f, "unknown status {:#x}", status),
    }
  }
}

/// Framebuffer error.
#[non_exhaustive]
#[derive(Debug, Eq, PartialEq)]
pub enum FramebufferError {
  /// The framebuffer is incomplete.
  Incomplete(IncompleteReason),
  /// A color attachment index is beyond `GL_MAX_COLOR_ATTACHMENTS`.
  ColorAttachmentOutOfRange {
    /// Requested index.
    index: u32,
    /// Number of supported attachments.
    max: u32,
  },
  /// A layer index is beyond the texture's layer count.
  LayerOutOfRange {
    /// Requested layer.
    layer: u32,
    /// Number of layers of the texture.
    layers: u32,
  },
}

impl fmt::Display for FramebufferError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      FramebufferError::Incomplete(ref e) => write!(f, "incomplete framebuffer: {}", e),
      FramebufferError::ColorAttachmentOutOfRange { index, max } => write!(
        f,
        "color attachment {} is out of range ({} available)",
        index, max
      ),
      FramebufferError::LayerOutOfRange { layer, layers } => {
        write!(f, "layer {} is out of range ({} layers)", layer, layers)
      }
    }
  }
}

impl error::Error for FramebufferError {}

impl From<IncompleteReason> for FramebufferError {
  fn from(e: IncompleteReason) -> Self {
    FramebufferError::Incomplete(e)
  }
}

fn attachment_to_glenum(
  attachment: Attachment,
  max_colors: u32,
) -> Result<GLenum, FramebufferError> {
  match attachment {
    Attachment::Color(index) if index < max_colors => Ok(gl::COLOR_ATTACHMENT0 + index),
    Attachment::Color(index) => Err(FramebufferError::ColorAttachmentOutOfRange {
      index,
      max: max_colors,
    }),
    Attachment::Depth => Ok(gl::DEPTH_ATTACHMENT),
    Attachment::Stencil => Ok(gl::STENCIL_ATTACHMENT),
    Attachment::DepthStencil => Ok(gl::DEPTH_STENCIL_ATTACHMENT),
  }
}

fn status_to_result(status: GLenum) -> Result<(), IncompleteReason> {
  match status {
    gl::FRAMEBUFFER_COMPLETE => Ok(()),
    gl::FRAMEBUFFER_UNDEFINED => Err(IncompleteReason::Undefined),
    gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => Err(IncompleteReason::IncompleteAttachment),
    gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => Err(IncompleteReason::MissingAttachment),
    gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => Err(IncompleteReason::IncompleteDrawBuffer),
    gl::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => Err(IncompleteReason::IncompleteReadBuffer),
    gl::FRAMEBUFFER_UNSUPPORTED => Err(IncompleteReason::Unsupported),
    gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => Err(IncompleteReason::IncompleteMultisample),
    gl::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => Err(IncompleteReason::IncompleteLayerTargets),
    _ => Err(IncompleteReason::Unknown(status)),
  }
}

/// Color attachments are drawn to in the order they were first attached.
fn record_draw_buffer(draw_buffers: &mut Vec<GLenum>, attachment: GLenum) {
  let is_color = (gl::COLOR_ATTACHMENT0..=gl::COLOR_ATTACHMENT0 + 31).contains(&attachment);

  if is_color && !draw_buffers.contains(&attachment) {
    draw_buffers.push(attachment);
  }
}

/// A framebuffer object.
///
/// The size is zero until the first attachment, which sets it.
#[derive(Debug)]
pub struct Framebuffer {
  handle: GLuint,
  target: FramebufferTarget,
  width: u32,
  height: u32,
  draw_buffers: Vec<GLenum>,
  state: Rc<RefCell<GLState>>,
}

impl Drop for Framebuffer {
  fn drop(&mut self) {
    self.state.borrow_mut().unbind_framebuffer(self.handle);
    unsafe { gl::DeleteFramebuffers(1, &self.handle) };
  }
}

impl Framebuffer {
  /// Create a framebuffer bound to `target` by default.
  pub fn new(ctx: &Context, target: FramebufferTarget) -> Self {
    let mut handle: GLuint = 0;
    unsafe { gl::GenFramebuffers(1, &mut handle) };

    Framebuffer {
      handle,
      target,
      width: 0,
      height: 0,
      draw_buffers: Vec::new(),
      state: ctx.state.clone(),
    }
  }

  /// Width in pixels.
  pub fn width(&self) -> u32 {
    self.width
  }

  /// Height in pixels.
  pub fn height(&self) -> u32 {
    self.height
  }

  fn bind_raw(&self, target: FramebufferTarget) {
    unsafe {
      self
        .state
        .borrow_mut()
        .bind_framebuffer(opengl_target(target), self.handle)
    };
  }

  fn prepare_attachment(
    &mut self,
    attachment: Attachment,
    size: (u32, u32),
  ) -> Result<GLenum, FramebufferError> {
    let attachment = attachment_to_glenum(attachment, max_color_attachments())?;

    if self.width == 0 && self.height == 0 {
      self.width = size.0;
      self.height = size.1;
    }

    record_draw_buffer(&mut self.draw_buffers, attachment);
    self.bind_raw(self.target);

    Ok(attachment)
  }

  /// Attach level 0 of a texture; cubemaps and arrays are attached layered.
  pub fn attach_texture(
    &mut self,
    attachment: Attachment,
    texture: &Texture) -> Result<(), FramebufferError> {
    let attachment = self.prepare_attachment(attachment, (texture.width(), texture.height()))?;

    unsafe {
      gl::FramebufferTexture(
        opengl_target(self.target),
        attachment,
        texture.handle(),
        0,
      )
    };

    Ok(())
  }

  /// Attach one layer of an array, 3D texture or cubemap.
  pub fn attach_texture_layer(
    &mut self,
    attachment: Attachment,
    texture: &Texture,
    layer: u32,
  ) -> Result<(), FramebufferError> {
    if layer >= texture.num_layers() {
      return Err(FramebufferError::LayerOutOfRange {
        layer,
        layers: texture.num_layers(),
      });
    }

    let attachment = self.prepare_attachment(attachment, (texture.width(), texture.height()))?;

    unsafe {
      gl::FramebufferTextureLayer(
        opengl_target(self.target),
        attachment,
        texture.handle(),
        0,
        layer as GLint,
      )
    };

    Ok(())
  }

  /// Attach a renderbuffer.
  pub fn attach_renderbuffer(
    &mut self,
    attachment: Attachment,
    renderbuffer: &Renderbuffer,
  ) -> Result<(), FramebufferError> {
    let attachment =
      self.prepare_attachment(attachment, (renderbuffer.width(), renderbuffer.height()))?;

    unsafe {
      gl::FramebufferRenderbuffer(
        opengl_target(self.target),
        attachment,
        gl::RENDERBUFFER,
        renderbuffer.handle(),
      )
    };

    Ok(())
  }

  /// Route fragment outputs to the color attachments and check completeness.
  pub fn finalize(&self) -> Result<(), FramebufferError> {
    self.bind_raw(self.target);

    unsafe {
      if self.draw_buffers.is_empty() {
        gl::DrawBuffer(gl::NONE);
      } else {
        gl::DrawBuffers(self.draw_buffers.len() as GLsizei, self.draw_buffers.as_ptr());
      }
    }

    self.get_buffer_status().map_err(|e| {
      log::error!("framebuffer {} is incomplete: {}", self.handle, e);
      FramebufferError::from(e)
    })
  }

  /// Completeness of the framebuffer.
  pub fn get_buffer_status(&self) -> Result<(), IncompleteReason> {
    self.bind_raw(self.target);
    status_to_result(unsafe { gl::CheckFramebufferStatus(opengl_target(self.target)) })
  }

  /// Bind to the default target and set the viewport to the framebuffer size.
  pub fn bind(&self) {
    self.bind_raw(self.target);
    unsafe {
      self
        .state
        .borrow_mut()
        .set_viewport([0, 0, self.width as GLint, self.height as GLint])
    };
  }

  /// Bind to `target`; the viewport is left alone.
  pub fn bind_to(&self, target: FramebufferTarget) {
    self.bind_raw(target);
  }

  /// Bind the default framebuffer to this framebuffer's target.
  pub fn unbind(&self) {
    unsafe {
      self
        .state
        .borrow_mut()
        .bind_framebuffer(opengl_target(self.target), 0)
    };
  }

  /// Copy a region of this framebuffer into `target`, or into the default framebuffer.
  pub fn blit_to(
    &self,
    target: Option<&Framebuffer>,
    src: Rect,
    dst: Rect,
    mask: ClearBuffers,
    filter: BlitFilter,
  ) {
    let draw = target.map_or(0, |fb| fb.handle);
    blit(&self.state, self.handle, draw, src, dst, mask, filter);
  }

  /// Copy a region of the default framebuffer into this one.
  pub fn blit_from_default(&self, src: Rect, dst: Rect, mask: ClearBuffers, filter: BlitFilter) {
    blit(&self.state, 0, self.handle, src, dst, mask, filter);
  }

  /// Read back color pixels; the image is flipped so that row 0 is the top.
  pub fn read_pixels(&self, rect: Rect) -> Image {
    read_pixels(&self.state, self.handle, rect)
  }
}

fn blit(
  state: &Rc<RefCell<GLState>>,
  read: GLuint,
  draw: GLuint,
  src: Rect,
  dst: Rect,
  mask: ClearBuffers,
  filter: BlitFilter,
) {
  let filter = match filter {
    BlitFilter::Nearest => gl::NEAREST,
    BlitFilter::Linear => gl::LINEAR,
  };

  unsafe {
    let mut state = state.borrow_mut();
    state.bind_framebuffer(gl::READ_FRAMEBUFFER, read);
    state.bind_framebuffer(gl::DRAW_FRAMEBUFFER, draw);

    gl::BlitFramebuffer(
      src.x,
      src.y,
      src.x + src.w as GLint,
      src.y + src.h as GLint,
      dst.x,
      dst.y,
      dst.x + dst.w as GLint,
      dst.y + dst.h as GLint,
      mask.to_glbits(),
      filter,
    );
  }
}

fn read_pixels(state: &Rc<RefCell<GLState>>, handle: GLuint, rect: Rect) -> Image {
  let mut data = vec![0u8; rect.w as usize * rect.h as usize * 4];

  unsafe {
    state
      .borrow_mut()
      .bind_framebuffer(gl::READ_FRAMEBUFFER, handle);
    gl::PixelStorei(gl::PACK_ALIGNMENT, 4);
    gl::ReadPixels(
      rect.x,
      rect.y,
      rect.w as GLsizei,
      rect.h as GLsizei,
      gl::RGBA,
      gl::UNSIGNED_BYTE,
      data.as_mut_ptr() as _,
    );
  }

  let mut image = Image::from_raw(rect.w, rect.h, 4, &data).unwrap_or_default();
  image.vertical_flip();
  image
}

/// Read back color pixels of the default framebuffer.
pub fn read_default_pixels(ctx: &Context, rect: Rect) -> Image {
  read_pixels(&ctx.state, 0, rect)
}

fn max_color_attachments() -> u32 {
  let mut max: GLint = 0;
  unsafe { gl::GetIntegerv(gl::MAX_COLOR_ATTACHMENTS, &mut max) };
  max.max(1) as u32
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn attachments() {
    assert_eq!(
      attachment_to_glenum(Attachment::Color(2), 8),
      Ok(gl::COLOR_ATTACHMENT0 + 2)
    );
    assert_eq!(
      attachment_to_glenum(Attachment::Color(8), 8),
      Err(FramebufferError::ColorAttachmentOutOfRange { index: 8, max: 8 })
    );
    assert_eq!(
      attachment_to_glenum(Attachment::DepthStencil, 0),
      Ok(gl::DEPTH_STENCIL_ATTACHMENT)
    );
  }

  #[test]
  fn draw_buffers_keep_color_attachments_once() {
    let mut buffers = Vec::new();

    record_draw_buffer(&mut buffers, gl::COLOR_ATTACHMENT1);
    record_draw_buffer(&mut buffers, gl::DEPTH_ATTACHMENT);
    record_draw_buffer(&mut buffers, gl::COLOR_ATTACHMENT0);
    record_draw_buffer(&mut buffers, gl::COLOR_ATTACHMENT1);

    assert_eq!(buffers, vec![gl::COLOR_ATTACHMENT1, gl::COLOR_ATTACHMENT0]);
  }

  #[test]
  fn status() {
    assert_eq!(status_to_result(gl::FRAMEBUFFER_COMPLETE), Ok(()));
    assert_eq!(
      status_to_result(gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT),
      Err(IncompleteReason::MissingAttachment)
    );
    assert_eq!(status_to_result(0x1234), Err(IncompleteReason::Unknown(0x1234)));
    assert_eq!(
      FramebufferError::from(IncompleteReason::Unsupported).to_string(),
      "incomplete framebuffer: unsupported"
    );
    assert_eq!(
      IncompleteReason::Undefined.to_string(),
      "default framebuffer does not exist"
    );
  }
}
