//! Textures.
//!
//! A single [`Texture`] type covers every dimensionality; the [`TextureTarget`] decides how the
//! storage is laid out. Empty textures get nearest filtering, textures loaded from images get
//! linear filtering and mipmaps. Both clamp to edge.

use gl::types::*;
use std::cell::RefCell;
use std::error;
use std::fmt;
use std::ptr;
use std::rc::Rc;

use crate::buffer::MapAccess;
use crate::context::Context;
use crate::image::{Image, ImageError};
use crate::state::GLState;

/// Texture layout.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TextureTarget {
  /// 1D texture.
  Tex1D,
  /// Array of 1D textures.
  Tex1DArray,
  /// 2D texture.
  Tex2D,
  /// Array of 2D textures.
  Tex2DArray,
  /// 3D texture.
  Tex3D,
  /// Six 2D faces.
  Cubemap,
}

pub(crate) fn opengl_target(t: TextureTarget) -> GLenum {
  match t {
    TextureTarget::Tex1D => gl::TEXTURE_1D,
    TextureTarget::Tex1DArray => gl::TEXTURE_1D_ARRAY,
    TextureTarget::Tex2D => gl::TEXTURE_2D,
    TextureTarget::Tex2DArray => gl::TEXTURE_2D_ARRAY,
    TextureTarget::Tex3D => gl::TEXTURE_3D,
    TextureTarget::Cubemap => gl::TEXTURE_CUBE_MAP,
  }
}

/// How to wrap texture coordinates outside of [0, 1].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Wrap {
  /// Clamp to the edge texel.
  ClampToEdge,
  /// Repeat the texture.
  Repeat,
  /// Repeat the texture, mirroring every other copy.
  MirroredRepeat,
}

/// Minification filter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MinFilter {
  /// Nearest texel.
  Nearest,
  /// Linear interpolation of the nearest texels.
  Linear,
  /// Nearest texel of the nearest mipmap.
  NearestMipmapNearest,
  /// Nearest texel, interpolated between mipmaps.
  NearestMipmapLinear,
  /// Linear interpolation in the nearest mipmap.
  LinearMipmapNearest,
  /// Linear interpolation, also between mipmaps.
  LinearMipmapLinear,
}

/// Magnification filter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MagFilter {
  /// Nearest texel.
  Nearest,
  /// Linear interpolation of the nearest texels.
  Linear,
}

/// Sampling parameters.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Sampler {
  /// Wrap along r.
  pub wrap_r: Wrap,
  /// Wrap along s.
  pub wrap_s: Wrap,
  /// Wrap along t.
  pub wrap_t: Wrap,
  /// Minification filter.
  pub min_filter: MinFilter,
  /// Magnification filter.
  pub mag_filter: MagFilter,
}

impl Default for Sampler {
  /// Defaults:
  ///
  /// - `wrap_r`, `wrap_s` and `wrap_t` set to `Wrap::ClampToEdge`.
  /// - `min_filter` set to `MinFilter::Nearest`.
  /// - `mag_filter` set to `MagFilter::Nearest`.
  fn default() -> Self {
    Sampler {
      wrap_r: Wrap::ClampToEdge,
      wrap_s: Wrap::ClampToEdge,
      wrap_t: Wrap::ClampToEdge,
      min_filter: MinFilter::Nearest,
      mag_filter: MagFilter::Nearest,
    }
  }
}

impl Sampler {
  /// Clamped, linear filtering; used for textures loaded from images.
  pub fn linear() -> Self {
    Sampler {
      min_filter: MinFilter::Linear,
      mag_filter: MagFilter::Linear,
      ..Sampler::default()
    }
  }
}

fn opengl_wrap(wrap: Wrap) -> GLenum {
  match wrap {
    Wrap::ClampToEdge => gl::CLAMP_TO_EDGE,
    Wrap::Repeat => gl::REPEAT,
    Wrap::MirroredRepeat => gl::MIRRORED_REPEAT,
  }
}

fn opengl_min_filter(filter: MinFilter) -> GLenum {
  match filter {
    MinFilter::Nearest => gl::NEAREST,
    MinFilter::Linear => gl::LINEAR,
    MinFilter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
    MinFilter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
    MinFilter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
    MinFilter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
  }
}

fn opengl_mag_filter(filter: MagFilter) -> GLenum {
  match filter {
    MagFilter::Nearest => gl::NEAREST,
    MagFilter::Linear => gl::LINEAR,
  }
}

/// Internal format, pixel format and pixel type of a texture's storage.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TexelFormat {
  /// Internal format, e.g. `GL_RGBA8`.
  pub internal_format: GLenum,
  /// Format of the client data, e.g. `GL_RGBA`.
  pub format: GLenum,
  /// Type of the client data, e.g. `GL_UNSIGNED_BYTE`.
  pub ty: GLenum,
}

impl TexelFormat {
  /// Normalized RGBA, 8 bits per channel.
  pub const RGBA8: TexelFormat = TexelFormat::new(gl::RGBA8, gl::RGBA, gl::UNSIGNED_BYTE);
  /// Normalized RGB, 8 bits per channel.
  pub const RGB8: TexelFormat = TexelFormat::new(gl::RGB8, gl::RGB, gl::UNSIGNED_BYTE);
  /// Single 32-bit float channel.
  pub const R32F: TexelFormat = TexelFormat::new(gl::R32F, gl::RED, gl::FLOAT);
  /// Half float RGBA.
  pub const RGBA16F: TexelFormat = TexelFormat::new(gl::RGBA16F, gl::RGBA, gl::FLOAT);
  /// Float RGBA.
  pub const RGBA32F: TexelFormat = TexelFormat::new(gl::RGBA32F, gl::RGBA, gl::FLOAT);
  /// 24-bit depth.
  pub const DEPTH24: TexelFormat =
    TexelFormat::new(gl::DEPTH_COMPONENT24, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT);
  /// 32-bit float depth.
  pub const DEPTH32F: TexelFormat =
    TexelFormat::new(gl::DEPTH_COMPONENT32F, gl::DEPTH_COMPONENT, gl::FLOAT);
  /// Packed 24-bit depth and 8-bit stencil.
  pub const DEPTH24_STENCIL8: TexelFormat =
    TexelFormat::new(gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8);

  /// Build a format from raw GL enums.
  pub const fn new(internal_format: GLenum, format: GLenum, ty: GLenum) -> Self {
    TexelFormat {
      internal_format,
      format,
      ty,
    }
  }

  /// Whether the format holds depth (and possibly stencil).
  pub fn is_depth(&self) -> bool {
    self.format == gl::DEPTH_COMPONENT || self.format == gl::DEPTH_STENCIL
  }
}

/// Value of a texture parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum TextureParameter {
  /// `glTexParameteri`.
  Int(i32),
  /// `glTexParameterf`.
  Float(f32),
  /// `glTexParameterfv`, e.g. a border color.
  Floats(Vec<f32>),
}

/// Texture error.
#[non_exhaustive]
#[derive(Debug)]
pub enum TextureError {
  /// Images that must share a size don't.
  SizeMismatch {
    /// Size of the first image.
    expected: (u32, u32),
    /// Size of the offending image.
    got: (u32, u32),
  },
  /// No image, or an empty one, was given.
  EmptyImage,
  /// Loading an image failed.
  ImageError(ImageError),
}

impl fmt::Display for TextureError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      TextureError::SizeMismatch { expected, got } => write!(
        f,
        "texture size mismatch: expected {}×{}, got {}×{}",
        expected.0, expected.1, got.0, got.1
      ),
      TextureError::EmptyImage => f.write_str("empty texture image"),
      TextureError::ImageError(ref e) => write!(f, "texture image error: {}", e),
    }
  }
}

impl error::Error for TextureError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      TextureError::ImageError(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ImageError> for TextureError {
  fn from(e: ImageError) -> Self {
    TextureError::ImageError(e)
  }
}

/// Check that every image is non-empty and has the size of the first one.
///
/// With `compare_height` unset only widths must match (1D arrays).
pub(crate) fn common_size(
  images: &[&Image],
  compare_height: bool) -> Result<(u32,
  u32,
), TextureError> {
  let first = images.first().ok_or(TextureError::EmptyImage)?;
  let expected = (first.width(), first.height());

  for img in images {
    if img.is_empty() {
      return Err(TextureError::EmptyImage);
    }

    let got = (img.width(), img.height());
    if got.0 != expected.0 || (compare_height && got.1 != expected.1) {
      return Err(TextureError::SizeMismatch { expected, got });
    }
  }

  Ok(expected)
}

/// An OpenGL texture.
#[derive(Debug)]
pub struct Texture {
  handle: GLuint,
  target: TextureTarget,
  width: u32,
  height: u32,
  num_layers: u32,
  state: Rc<RefCell<GLState>>,
}

impl Drop for Texture {
  fn drop(&mut self) {
    self.state.borrow_mut().unbind_texture(self.handle);
    unsafe { gl::DeleteTextures(1, &self.handle) };
  }
}

impl Texture {
  // Allocate a name and bind it on the current unit.
  fn create(ctx: &Context, target: TextureTarget, size: (u32, u32, u32)) -> Self {
    let mut handle: GLuint = 0;

    unsafe {
      gl::GenTextures(1, &mut handle);
      ctx
        .state
        .borrow_mut()
        .bind_texture(opengl_target(target), handle);
    }

    Texture {
      handle,
      target,
      width: size.0,
      height: size.1,
      num_layers: size.2,
      state: ctx.state.clone(),
    }
  }

  /// Add a directory to the search paths used to load texture images.
  pub fn add_path(path: &str) {
    Image::add_path(path);
  }

  /// Empty 1D texture.
  pub fn new_1d(ctx: &Context, width: u32, format: TexelFormat) -> Self {
    let tex = Self::create(ctx, TextureTarget::Tex1D, (width, 1, 1));

    unsafe {
      gl::TexImage1D(
        gl::TEXTURE_1D,
        0,
        format.internal_format as GLint,
        width as GLsizei,
        0,
        format.format,
        format.ty,
        ptr::null(),
      );
    }

    tex.finish_empty()
  }

  /// Empty array of `layers` 1D textures.
  pub fn new_1d_array(ctx: &Context, width: u32, layers: u32, format: TexelFormat) -> Self {
    let tex = Self::create(ctx, TextureTarget::Tex1DArray, (width, 1, layers));
    unsafe { tex_image_2d(gl::TEXTURE_1D_ARRAY, format, width, layers, ptr::null()) };
    tex.finish_empty()
  }

  /// Empty 2D texture.
  pub fn new_2d(ctx: &Context, width: u32, height: u32, format: TexelFormat) -> Self {
    let tex = Self::create(ctx, TextureTarget::Tex2D, (width, height, 1));
    unsafe { tex_image_2d(gl::TEXTURE_2D, format, width, height, ptr::null()) };
    tex.finish_empty()
  }

  /// Empty array of `layers` 2D textures.
  pub fn new_2d_array(
    ctx: &Context,
    width: u32,
    height: u32,
    layers: u32,
    format: TexelFormat,
  ) -> Self {
    let tex = Self::create(ctx, TextureTarget::Tex2DArray, (width, height, layers));
    unsafe { tex_image_3d(gl::TEXTURE_2D_ARRAY, format, (width, height, layers), ptr::null()) };
    tex.finish_empty()
  }

  /// Empty 3D texture.
  pub fn new_3d(ctx: &Context, width: u32, height: u32, depth: u32, format: TexelFormat) -> Self {
    let tex = Self::create(ctx, TextureTarget::Tex3D, (width, height, depth));
    unsafe { tex_image_3d(gl::TEXTURE_3D, format, (width, height, depth), ptr::null()) };
    tex.finish_empty()
  }

  /// Empty cubemap with six `width` × `height` faces.
  pub fn new_cubemap(ctx: &Context, width: u32, height: u32, format: TexelFormat) -> Self {
    let tex = Self::create(ctx, TextureTarget::Cubemap, (width, height, 6));

    for face in 0..6 {
      unsafe {
        tex_image_2d(
          gl::TEXTURE_CUBE_MAP_POSITIVE_X + face,
          format,
          width,
          height,
          ptr::null(),
        )
      };
    }

    tex.finish_empty()
  }

  fn finish_empty(self) -> Self {
    self.set_sampler(Sampler::default());
    self
  }

  fn finish_loaded(self) -> Self {
    self.set_sampler(Sampler::linear());
    unsafe { gl::GenerateMipmap(opengl_target(self.target)) };
    self
  }

  /// 2D texture from an image.
  pub fn from_image_2d(ctx: &Context, image: &Image) -> Result<Self, TextureError> {
    let (w, h) = common_size(&[image], true)?;
    let tex = Self::create(ctx, TextureTarget::Tex2D, (w, h, 1));

    set_rgba_unpack_alignment();
    unsafe { tex_image_2d(gl::TEXTURE_2D, TexelFormat::RGBA8, w, h, image.as_raw().as_ptr() as _) };

    Ok(tex.finish_loaded())
  }

  /// 2D texture from the image file `name`, found through the image search paths.
  pub fn from_path_2d(ctx: &Context, name: &str) -> Result<Self, TextureError> {
    let mut image = Image::new();
    image.load(name)?;
    Self::from_image_2d(ctx, &image)
  }

  /// 1D texture from the first row of an image.
  pub fn from_image_1d(ctx: &Context, image: &Image) -> Result<Self, TextureError> {
    let (w, _) = common_size(&[image], false)?;
    let tex = Self::create(ctx, TextureTarget::Tex1D, (w, 1, 1));
    let row = &image.as_raw()[..w as usize * 4];

    set_rgba_unpack_alignment();
    unsafe {
      gl::TexImage1D(
        gl::TEXTURE_1D,
        0,
        gl::RGBA8 as GLint,
        w as GLsizei,
        0,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        row.as_ptr() as _,
      );
    }

    Ok(tex.finish_loaded())
  }

  /// 1D array from the first row of each image; widths must match.
  pub fn from_images_1d_array(ctx: &Context, images: &[&Image]) -> Result<Self, TextureError> {
    let (w, _) = common_size(images, false)?;
    let layers = images.len() as u32;
    let row_len = w as usize * 4;

    let mut texels = Vec::with_capacity(row_len * images.len());
    for img in images {
      texels.extend_from_slice(&img.as_raw()[..row_len]);
    }

    let tex = Self::create(ctx, TextureTarget::Tex1DArray, (w, 1, layers));

    set_rgba_unpack_alignment();
    unsafe {
      tex_image_2d(
        gl::TEXTURE_1D_ARRAY,
        TexelFormat::RGBA8,
        w,
        layers,
        texels.as_ptr() as _,
      )
    };

    Ok(tex.finish_loaded())
  }

  /// 2D array, one layer per image; sizes must match.
  pub fn from_images_2d_array(ctx: &Context, images: &[&Image]) -> Result<Self, TextureError> {
    Self::from_image_stack(ctx, TextureTarget::Tex2DArray, images)
  }

  /// 3D texture, one slice per image; sizes must match.
  pub fn from_images_3d(ctx: &Context, images: &[&Image]) -> Result<Self, TextureError> {
    Self::from_image_stack(ctx, TextureTarget::Tex3D, images)
  }

  fn from_image_stack(
    ctx: &Context,
    target: TextureTarget,
    images: &[&Image],
  ) -> Result<Self, TextureError> {
    let (w, h) = common_size(images, true)?;
    let depth = images.len() as u32;
    let texels: Vec<u8> = images.iter().flat_map(|img| img.as_raw().iter().copied()).collect();

    let tex = Self::create(ctx, target, (w, h, depth));

    set_rgba_unpack_alignment();
    unsafe {
      tex_image_3d(
        opengl_target(target),
        TexelFormat::RGBA8,
        (w, h, depth),
        texels.as_ptr() as _,
      )
    };

    Ok(tex.finish_loaded())
  }

  /// Cubemap from six images ordered +X, −X, +Y, −Y, +Z, −Z; sizes must match.
  pub fn cubemap_from_images(ctx: &Context, faces: [&Image; 6]) -> Result<Self, TextureError> {
    let (w, h) = common_size(&faces, true)?;
    let tex = Self::create(ctx, TextureTarget::Cubemap, (w, h, 6));

    set_rgba_unpack_alignment();
    for (i, face) in faces.iter().enumerate() {
      unsafe {
        tex_image_2d(
          gl::TEXTURE_CUBE_MAP_POSITIVE_X + i as GLenum,
          TexelFormat::RGBA8,
          w,
          h,
          face.as_raw().as_ptr() as _,
        )
      };
    }

    Ok(tex.finish_loaded())
  }

  /// Cubemap from six image files, found through the image search paths.
  pub fn cubemap_from_paths(ctx: &Context, names: [&str; 6]) -> Result<Self, TextureError> {
    let mut images = Vec::with_capacity(6);

    for name in &names {
      let mut img = Image::new();
      img.load(name)?;
      images.push(img);
    }

    let faces = [
      &images[0], &images[1], &images[2], &images[3], &images[4], &images[5],
    ];
    Self::cubemap_from_images(ctx, faces)
  }

  pub(crate) fn handle(&self) -> GLuint {
    self.handle
  }

  /// Layout of the texture.
  pub fn target(&self) -> TextureTarget {
    self.target
  }

  /// Width in texels.
  pub fn width(&self) -> u32 {
    self.width
  }

  /// Height in texels; 1 for 1D textures.
  pub fn height(&self) -> u32 {
    self.height
  }

  /// Layers of an array, depth of a 3D texture, 6 for cubemaps, else 1.
  pub fn num_layers(&self) -> u32 {
    self.num_layers
  }

  /// Set a raw texture parameter, e.g. `gl::TEXTURE_MAX_ANISOTROPY`.
  pub fn set_parameter(&self, name: GLenum, value: &TextureParameter) {
    let target = self.bind_current();

    unsafe {
      match value {
        TextureParameter::Int(v) => gl::TexParameteri(target, name, *v),
        TextureParameter::Float(v) => gl::TexParameterf(target, name, *v),
        TextureParameter::Floats(v) => gl::TexParameterfv(target, name, v.as_ptr()),
      }
    }
  }

  /// Apply wrapping and filtering.
  pub fn set_sampler(&self, sampler: Sampler) {
    let target = self.bind_current();
    apply_sampler_to_texture(target, sampler);
  }

  // bind on whatever unit is active
  fn bind_current(&self) -> GLenum {
    let target = opengl_target(self.target);
    unsafe { self.state.borrow_mut().bind_texture(target, self.handle) };
    target
  }

  /// Bind to texture unit `unit`.
  pub fn bind(&self, unit: u32) {
    let mut state = self.state.borrow_mut();

    unsafe {
      state.set_texture_unit(unit);
      state.bind_texture(opengl_target(self.target), self.handle);
    }
  }

  /// Unbind whatever is bound to this target on unit `unit`.
  pub fn unbind(&self, unit: u32) {
    let mut state = self.state.borrow_mut();

    unsafe {
      state.set_texture_unit(unit);
      state.bind_texture(opengl_target(self.target), 0);
    }
  }

  /// Bind a level to an image unit for load / store access from shaders.
  pub fn bind_image(
    &self,
    unit: u32,
    level: u32,
    layered: bool,
    layer: u32,
    access: MapAccess,
    format: GLenum,
  ) {
    let access = match access {
      MapAccess::Read => gl::READ_ONLY,
      MapAccess::Write => gl::WRITE_ONLY,
      MapAccess::ReadWrite => gl::READ_WRITE,
    };

    unsafe {
      gl::BindImageTexture(
        unit,
        self.handle,
        level as GLint,
        if layered { gl::TRUE } else { gl::FALSE },
        layer as GLint,
        access,
        format,
      )
    };
  }
}

unsafe fn tex_image_2d(target: GLenum, format: TexelFormat, w: u32, h: u32, data: *const GLvoid) {
  gl::TexImage2D(
    target,
    0,
    format.internal_format as GLint,
    w as GLsizei,
    h as GLsizei,
    0,
    format.format,
    format.ty,
    data,
  );
}

unsafe fn tex_image_3d(
  target: GLenum,
  format: TexelFormat,
  size: (u32, u32, u32),
  data: *const GLvoid,
) {
  gl::TexImage3D(
    target,
    0,
    format.internal_format as GLint,
    size.0 as GLsizei,
    size.1 as GLsizei,
    size.2 as GLsizei,
    0,
    format.format,
    format.ty,
    data,
  );
}

fn apply_sampler_to_texture(target: GLenum, sampler: Sampler) {
  unsafe {
    gl::TexParameteri(
      target,
      gl::TEXTURE_WRAP_R,
      opengl_wrap(sampler.wrap_r) as GLint,
    );
    gl::TexParameteri(
      target,
      gl::TEXTURE_WRAP_S,
      opengl_wrap(sampler.wrap_s) as GLint,
    );
    gl::TexParameteri(
      target,
      gl::TEXTURE_WRAP_T,
      opengl_wrap(sampler.wrap_t) as GLint,
    );
    gl::TexParameteri(
      target,
      gl::TEXTURE_MIN_FILTER,
      opengl_min_filter(sampler.min_filter) as GLint,
    );
    gl::TexParameteri(
      target,
      gl::TEXTURE_MAG_FILTER,
      opengl_mag_filter(sampler.mag_filter) as GLint,
    );
  }
}

// RGBA8 rows are always 4-byte aligned.
fn set_rgba_unpack_alignment() {
  unsafe { gl::PixelStorei(gl::UNPACK_ALIGNMENT, 4) };
}

#[cfg(test)]
mod tests {
  use super::*;

  fn image(w: u32, h: u32) -> Image {
    let mut img = Image::new();
    img.create_empty(w, h);
    img
  }

  #[test]
  fn image_stacks_must_agree() {
    let a = image(4, 4);
    let b = image(4, 4);
    let c = image(4, 2);

    assert_eq!(common_size(&[&a, &b], true).unwrap(), (4, 4));
    assert!(matches!(
      common_size(&[&a, &c], true),
      Err(TextureError::SizeMismatch {
        expected: (4, 4),
        got: (4, 2)
      })
    ));

    // 1D arrays only look at widths
    assert_eq!(common_size(&[&a, &c], false).unwrap(), (4, 4));
    assert!(matches!(common_size(&[], true), Err(TextureError::EmptyImage)));
    assert!(matches!(
      common_size(&[&a, &Image::new()], false),
      Err(TextureError::EmptyImage)
    ));
  }

  #[test]
  fn samplers() {
    let s = Sampler::default();
    assert_eq!(s.min_filter, MinFilter::Nearest);
    assert_eq!(s.wrap_r, Wrap::ClampToEdge);

    let s = Sampler::linear();
    assert_eq!(s.mag_filter, MagFilter::Linear);
    assert_eq!(s.wrap_t, Wrap::ClampToEdge);
  }

  #[test]
  fn depth_formats() {
    assert!(TexelFormat::DEPTH24.is_depth());
    assert!(TexelFormat::DEPTH24_STENCIL8.is_depth());
    assert!(!TexelFormat::RGBA16F.is_depth());
  }
}
