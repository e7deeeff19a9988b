//! OpenGL buffer objects.

use gl::types::*;
use std::{
  cell::RefCell,
  error, fmt,
  marker::PhantomData,
  mem,
  ops::{Deref, DerefMut},
  ptr,
  rc::Rc,
  slice,
};

use crate::context::Context;
use crate::state::{Bind, GLState};

/// What a buffer is bound as.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BufferTarget {
  /// Vertex attributes.
  Array,
  /// Vertex indices.
  ElementArray,
  /// Source of buffer copies.
  CopyRead,
  /// Destination of buffer copies.
  CopyWrite,
  /// Pixel read-back.
  PixelPack,
  /// Pixel upload.
  PixelUnpack,
  /// Texture buffer.
  Texture,
  /// Transform feedback output.
  TransformFeedback,
  /// Uniform block storage.
  Uniform,
  /// Atomic counter storage.
  AtomicCounter,
  /// Shader storage block.
  ShaderStorage,
  /// Indirect draw commands.
  DrawIndirect,
}

impl BufferTarget {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      BufferTarget::Array => gl::ARRAY_BUFFER,
      BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
      BufferTarget::CopyRead => gl::COPY_READ_BUFFER,
      BufferTarget::CopyWrite => gl::COPY_WRITE_BUFFER,
      BufferTarget::PixelPack => gl::PIXEL_PACK_BUFFER,
      BufferTarget::PixelUnpack => gl::PIXEL_UNPACK_BUFFER,
      BufferTarget::Texture => gl::TEXTURE_BUFFER,
      BufferTarget::TransformFeedback => gl::TRANSFORM_FEEDBACK_BUFFER,
      BufferTarget::Uniform => gl::UNIFORM_BUFFER,
      BufferTarget::AtomicCounter => gl::ATOMIC_COUNTER_BUFFER,
      BufferTarget::ShaderStorage => gl::SHADER_STORAGE_BUFFER,
      BufferTarget::DrawIndirect => gl::DRAW_INDIRECT_BUFFER,
    }
  }

  /// Whether the target has indexed binding points.
  pub fn is_indexed(self) -> bool {
    matches!(
      self,
      BufferTarget::AtomicCounter
        | BufferTarget::TransformFeedback
        | BufferTarget::Uniform
        | BufferTarget::ShaderStorage
    )
  }
}

/// Expected usage pattern of the buffer data.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Usage {
  /// Set once, drawn a few times.
  StreamDraw,
  /// Set once, read back a few times.
  StreamRead,
  /// Set once, copied a few times.
  StreamCopy,
  /// Set once, drawn many times.
  StaticDraw,
  /// Set once, read back many times.
  StaticRead,
  /// Set once, copied many times.
  StaticCopy,
  /// Modified repeatedly, drawn many times.
  DynamicDraw,
  /// Modified repeatedly, read back many times.
  DynamicRead,
  /// Modified repeatedly, copied many times.
  DynamicCopy,
}

impl Usage {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      Usage::StreamDraw => gl::STREAM_DRAW,
      Usage::StreamRead => gl::STREAM_READ,
      Usage::StreamCopy => gl::STREAM_COPY,
      Usage::StaticDraw => gl::STATIC_DRAW,
      Usage::StaticRead => gl::STATIC_READ,
      Usage::StaticCopy => gl::STATIC_COPY,
      Usage::DynamicDraw => gl::DYNAMIC_DRAW,
      Usage::DynamicRead => gl::DYNAMIC_READ,
      Usage::DynamicCopy => gl::DYNAMIC_COPY,
    }
  }
}

/// Access requested when mapping a buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MapAccess {
  /// Read only.
  Read,
  /// Write only.
  Write,
  /// Read and write.
  ReadWrite,
}

impl MapAccess {
  fn to_glenum(self) -> GLenum {
    match self {
      MapAccess::Read => gl::READ_ONLY,
      MapAccess::Write => gl::WRITE_ONLY,
      MapAccess::ReadWrite => gl::READ_WRITE,
    }
  }
}

/// Buffer error.
#[non_exhaustive]
#[derive(Debug, Eq, PartialEq)]
pub enum BufferError {
  /// A byte range goes past the end of the buffer.
  OutOfRange {
    /// Start of the range, in bytes.
    offset: usize,
    /// Length of the range, in bytes.
    len: usize,
    /// Size of the buffer, in bytes.
    size: usize,
  },
  /// Buffer mapping failed.
  MapFailed,
}

impl fmt::Display for BufferError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      BufferError::OutOfRange { offset, len, size } => write!(
        f,
        "byte range {}..{} is out of a buffer of {} bytes",
        offset,
        offset.saturating_add(len),
        size
      ),
      BufferError::MapFailed => f.write_str("buffer mapping failed"),
    }
  }
}

impl error::Error for BufferError {}

/// Check that `len` bytes starting at `offset` fit in `size` bytes.
pub(crate) fn check_range(offset: usize, len: usize, size: usize) -> Result<(), BufferError> {
  match offset.checked_add(len) {
    Some(end) if end <= size => Ok(()),
    _ => Err(BufferError::OutOfRange { offset, len, size }),
  }
}

/// An OpenGL buffer.
///
/// The buffer remembers its default target, the usage it was last allocated with and its size in
/// bytes, which is what makes partial updates and read-backs checkable.
#[derive(Debug)]
pub struct Buffer {
  handle: GLuint,
  target: BufferTarget,
  usage: Usage,
  size: usize,
  num_elements: usize,
  state: Rc<RefCell<GLState>>,
}

impl Drop for Buffer {
  fn drop(&mut self) {
    unsafe {
      self.state.borrow_mut().unbind_buffer(self.handle);
      gl::DeleteBuffers(1, &self.handle);
    }
  }
}

impl Buffer {
  /// Create an empty buffer with a default target.
  pub fn new(ctx: &Context, target: BufferTarget) -> Self {
    Self::with_state(ctx.state.clone(), target)
  }

  pub(crate) fn with_state(state: Rc<RefCell<GLState>>, target: BufferTarget) -> Self {
    let mut handle: GLuint = 0;
    unsafe { gl::GenBuffers(1, &mut handle) };

    Buffer {
      handle,
      target,
      usage: Usage::StaticDraw,
      size: 0,
      num_elements: 0,
      state,
    }
  }

  /// Create a buffer and upload `data` into it.
  pub fn from_slice<T: Copy>(
    ctx: &Context,
    target: BufferTarget,
    data: &[T],
    usage: Usage,
  ) -> Self {
    let mut buffer = Self::new(ctx, target);
    buffer.load(data, usage);
    buffer
  }

  pub(crate) fn handle(&self) -> GLuint {
    self.handle
  }

  /// Default target.
  pub fn target(&self) -> BufferTarget {
    self.target
  }

  /// Usage given at the last allocation.
  pub fn usage(&self) -> Usage {
    self.usage
  }

  /// Size in bytes.
  pub fn size(&self) -> usize {
    self.size
  }

  /// Number of elements of the last upload.
  pub fn num_elements(&self) -> usize {
    self.num_elements
  }

  /// Bind to the default target.
  pub fn bind(&self) {
    self.bind_to(self.target);
  }

  /// Bind to `target`.
  pub fn bind_to(&self, target: BufferTarget) {
    unsafe {
      self
        .state
        .borrow_mut()
        .bind_buffer(target.to_glenum(), self.handle, Bind::Cached)
    };
  }

  /// Bind to the binding point `index` of `target`.
  ///
  /// Targets without indexed binding points fall back to a regular bind.
  pub fn bind_base(&self, target: BufferTarget, index: u32) {
    if target.is_indexed() {
      unsafe {
        self
          .state
          .borrow_mut()
          .bind_buffer_base(target.to_glenum(), index, self.handle)
      };
    } else {
      self.bind_to(target);
    }
  }

  /// Bind zero to the default target.
  pub fn unbind(&self) {
    unsafe {
      self
        .state
        .borrow_mut()
        .bind_buffer(self.target.to_glenum(), 0, Bind::Cached)
    };
  }

  /// Allocate room for `num_elements` values of `T` without initializing it.
  pub fn create_empty<T>(&mut self, num_elements: usize, usage: Usage) {
    let bytes = num_elements * mem::size_of::<T>();
    self.allocate(bytes, ptr::null(), usage);
    self.num_elements = num_elements;
  }

  /// Upload `data`, replacing the whole storage.
  pub fn load<T: Copy>(&mut self, data: &[T], usage: Usage) {
    self.allocate(mem::size_of_val(data), data.as_ptr() as _, usage);
    self.num_elements = data.len();
  }

  fn allocate(&mut self, bytes: usize, data: *const GLvoid, usage: Usage) {
    self.bind();

    unsafe {
      gl::BufferData(
        self.target.to_glenum(),
        bytes as GLsizeiptr,
        data,
        usage.to_glenum(),
      );
    }

    self.usage = usage;
    self.size = bytes;
  }

  /// Replace the content with `data`.
  ///
  /// If the byte size is unchanged the storage is updated in place; otherwise it is reallocated
  /// with the current usage.
  pub fn replace_data<T: Copy>(&mut self, data: &[T]) {
    let bytes = mem::size_of_val(data);

    if bytes == self.size {
      self.bind();
      unsafe {
        gl::BufferSubData(
          self.target.to_glenum(),
          0,
          bytes as GLsizeiptr,
          data.as_ptr() as _,
        )
      };
      self.num_elements = data.len();
    } else {
      let usage = self.usage;
      self.load(data, usage);
    }
  }

  /// Overwrite part of the buffer, starting `offset` bytes in.
  pub fn replace_partial_data<T: Copy>(
    &mut self,
    offset: usize,
    data: &[T]) -> Result<(), BufferError> {
    let bytes = mem::size_of_val(data);
    check_range(offset, bytes, self.size)?;

    self.bind();
    unsafe {
      gl::BufferSubData(
        self.target.to_glenum(),
        offset as GLintptr,
        bytes as GLsizeiptr,
        data.as_ptr() as _,
      )
    };

    Ok(())
  }

  /// Read `out.len()` values back, starting `offset` bytes in.
  pub fn store<T: Copy>(&self, offset: usize, out: &mut [T]) -> Result<(), BufferError> {
    let bytes = mem::size_of_val(out);
    check_range(offset, bytes, self.size)?;

    self.bind_to(BufferTarget::CopyRead);
    unsafe {
      gl::GetBufferSubData(
        gl::COPY_READ_BUFFER,
        offset as GLintptr,
        bytes as GLsizeiptr,
        out.as_mut_ptr() as _,
      )
    };

    Ok(())
  }

  /// Copy `size` bytes from `src` into this buffer on the GPU.
  pub fn copy_from(
    &mut self,
    src: &Buffer,
    read_offset: usize,
    write_offset: usize,
    size: usize,
  ) -> Result<(), BufferError> {
    check_range(read_offset, size, src.size)?;
    check_range(write_offset, size, self.size)?;

    src.bind_to(BufferTarget::CopyRead);
    self.bind_to(BufferTarget::CopyWrite);

    unsafe {
      gl::CopyBufferSubData(
        gl::COPY_READ_BUFFER,
        gl::COPY_WRITE_BUFFER,
        read_offset as GLintptr,
        write_offset as GLintptr,
        size as GLsizeiptr,
      )
    };

    Ok(())
  }

  /// Map the whole buffer as a slice of `T`; it is unmapped when the guard drops.
  pub fn map<T: Copy>(&mut self, access: MapAccess) -> Result<MappedBuffer<'_, T>, BufferError> {
    self.bind();

    let target = self.target.to_glenum();
    let ptr = unsafe { gl::MapBuffer(target, access.to_glenum()) } as *mut T;

    if ptr.is_null() {
      Err(BufferError::MapFailed)
    } else {
      let len = self.size / mem::size_of::<T>().max(1);

      Ok(MappedBuffer {
        buffer: self,
        len,
        ptr,
        _t: PhantomData,
      })
    }
  }
}

/// A mapped buffer, seen as a slice.
pub struct MappedBuffer<'a, T> {
  buffer: &'a Buffer,
  len: usize,
  ptr: *mut T,
  _t: PhantomData<&'a mut [T]>,
}

impl<T> Deref for MappedBuffer<'_, T> {
  type Target = [T];

  fn deref(&self) -> &Self::Target {
    unsafe { slice::from_raw_parts(self.ptr as *const _, self.len) }
  }
}

impl<T> DerefMut for MappedBuffer<'_, T> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
  }
}

impl<T> Drop for MappedBuffer<'_, T> {
  fn drop(&mut self) {
    self.buffer.bind();
    unsafe { gl::UnmapBuffer(self.buffer.target.to_glenum()) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn range_checks() {
    assert_eq!(check_range(0, 16, 16), Ok(()));
    assert_eq!(check_range(8, 8, 16), Ok(()));
    assert_eq!(
      check_range(12, 8, 16),
      Err(BufferError::OutOfRange {
        offset: 12,
        len: 8,
        size: 16
      })
    );
    assert!(check_range(17, 0, 16).is_err());
    assert!(check_range(usize::MAX, 2, 16).is_err());
  }

  #[test]
  fn out_of_range_display_does_not_overflow() {
    let e = check_range(usize::MAX, 2, 16).unwrap_err();
    assert_eq!(
      e.to_string(),
      format!("byte range {}..{} is out of a buffer of 16 bytes", usize::MAX, usize::MAX)
    );
  }

  #[test]
  fn indexed_targets() {
    assert!(BufferTarget::Uniform.is_indexed());
    assert!(BufferTarget::ShaderStorage.is_indexed());
    assert!(BufferTarget::TransformFeedback.is_indexed());
    assert!(BufferTarget::AtomicCounter.is_indexed());
    assert!(!BufferTarget::Array.is_indexed());
    assert!(!BufferTarget::ElementArray.is_indexed());
  }
}
