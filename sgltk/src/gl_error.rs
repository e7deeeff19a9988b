//! OpenGL error polling.

use gl::types::*;
use std::error;
use std::fmt;

/// An error reported by `glGetError`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GlError {
  /// `GL_INVALID_ENUM`.
  InvalidEnum,
  /// `GL_INVALID_VALUE`.
  InvalidValue,
  /// `GL_INVALID_OPERATION`.
  InvalidOperation,
  /// `GL_INVALID_FRAMEBUFFER_OPERATION`.
  InvalidFramebufferOperation,
  /// `GL_OUT_OF_MEMORY`.
  OutOfMemory,
  /// `GL_STACK_UNDERFLOW`.
  StackUnderflow,
  /// `GL_STACK_OVERFLOW`.
  StackOverflow,
  /// Any other code.
  Unknown(GLenum),
}

impl GlError {
  /// Map a non-zero `glGetError` code.
  pub fn from_code(code: GLenum) -> Self {
    match code {
      gl::INVALID_ENUM => GlError::InvalidEnum,
      gl::INVALID_VALUE => GlError::InvalidValue,
      gl::INVALID_OPERATION => GlError::InvalidOperation,
      gl::INVALID_FRAMEBUFFER_OPERATION => GlError::InvalidFramebufferOperation,
      gl::OUT_OF_MEMORY => GlError::OutOfMemory,
      gl::STACK_UNDERFLOW => GlError::StackUnderflow,
      gl::STACK_OVERFLOW => GlError::StackOverflow,
      _ => GlError::Unknown(code),
    }
  }
}

impl fmt::Display for GlError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      GlError::InvalidEnum => f.write_str("invalid enum"),
      GlError::InvalidValue => f.write_str("invalid value"),
      GlError::InvalidOperation => f.write_str("invalid operation"),
      GlError::InvalidFramebufferOperation => f.write_str("invalid framebuffer operation"),
      GlError::OutOfMemory => f.write_str("out of memory"),
      GlError::StackUnderflow => f.write_str("stack underflow"),
      GlError::StackOverflow => f.write_str("stack overflow"),
      GlError::Unknown(code) => write!(f, "unknown error {:#x}", code),
    }
  }
}

impl error::Error for GlError {}

/// Drain the GL error queue, logging every error with its origin.
///
/// Prefer the [`check_gl_error!`](crate::check_gl_error) macro, which fills in the location.
pub fn drain_gl_errors(message: &str, file: &str, line: u32) -> Vec<GlError> {
  let mut errors = Vec::new();

  loop {
    let code = unsafe { gl::GetError() };

    if code == gl::NO_ERROR {
      break;
    }

    let error = GlError::from_code(code);
    log::error!("{}: OpenGL error: {} ({}:{})", message, error, file, line);
    errors.push(error);
  }

  errors
}

/// Check for pending OpenGL errors; returns them as a `Vec<GlError>`.
///
/// ```ignore
/// if !sgltk::check_gl_error!("uploading vertices").is_empty() {
///   // …
/// }
/// ```
#[macro_export]
macro_rules! check_gl_error {
  ($msg:expr) => {
    $crate::gl_error::drain_gl_errors($msg, file!(), line!())
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_codes() {
    assert_eq!(GlError::from_code(gl::INVALID_VALUE), GlError::InvalidValue);
    assert_eq!(GlError::from_code(0xdead), GlError::Unknown(0xdead));
    assert_eq!(GlError::OutOfMemory.to_string(), "out of memory");
  }
}
