//! Shader programs and uniform uploads.

use cgmath::{Matrix, Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};
use gl::types::*;
use std::{
  cell::{Cell, RefCell},
  error,
  ffi::CString,
  fmt, fs, io,
  path::{Path, PathBuf},
  ptr::{null, null_mut},
  rc::Rc,
};

use crate::context::Context;
use crate::paths::{self, Family};
use crate::state::GLState;

/// A shader stage type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StageType {
  /// Vertex shader.
  Vertex,
  /// Tessellation control shader.
  TessellationControl,
  /// Tessellation evaluation shader.
  TessellationEvaluation,
  /// Geometry shader.
  Geometry,
  /// Fragment shader.
  Fragment,
  /// Compute shader.
  Compute,
}

impl fmt::Display for StageType {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      StageType::Vertex => f.write_str("vertex shader"),
      StageType::TessellationControl => f.write_str("tessellation control shader"),
      StageType::TessellationEvaluation => f.write_str("tessellation evaluation shader"),
      StageType::Geometry => f.write_str("geometry shader"),
      StageType::Fragment => f.write_str("fragment shader"),
      StageType::Compute => f.write_str("compute shader"),
    }
  }
}

fn opengl_shader_type(t: StageType) -> GLenum {
  match t {
    StageType::Vertex => gl::VERTEX_SHADER,
    StageType::TessellationControl => gl::TESS_CONTROL_SHADER,
    StageType::TessellationEvaluation => gl::TESS_EVALUATION_SHADER,
    StageType::Geometry => gl::GEOMETRY_SHADER,
    StageType::Fragment => gl::FRAGMENT_SHADER,
    StageType::Compute => gl::COMPUTE_SHADER,
  }
}

/// Errors that shader stages can emit.
#[non_exhaustive]
#[derive(Debug)]
pub enum StageError {
  /// Occurs when a shader fails to compile.
  CompilationFailed(StageType, String),
  /// The stage object could not be created.
  CreationFailed(StageType),
  /// The source contains a nul byte.
  InvalidSource(StageType),
  /// No search path contains the file.
  FileNotFound(String),
  /// The file exists but could not be read.
  ReadFailed(PathBuf, io::Error),
}

impl fmt::Display for StageError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      StageError::CompilationFailed(ref ty, ref r) => write!(f, "{} compilation error: {}", ty, r),
      StageError::CreationFailed(ty) => write!(f, "cannot create {}", ty),
      StageError::InvalidSource(ty) => write!(f, "{} source contains a nul byte", ty),
      StageError::FileNotFound(ref name) => write!(f, "shader file not found: {}", name),
      StageError::ReadFailed(ref path, ref e) => {
        write!(f, "cannot read shader file {}: {}", path.display(), e)
      }
    }
  }
}

impl error::Error for StageError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      StageError::ReadFailed(_, e) => Some(e),
      _ => None,
    }
  }
}

impl From<StageError> for ProgramError {
  fn from(e: StageError) -> Self {
    ProgramError::StageError(e)
  }
}

/// Errors that a program can emit.
#[non_exhaustive]
#[derive(Debug)]
pub enum ProgramError {
  /// A shader stage failed to compile.
  StageError(StageError),
  /// Program link failed. You can inspect the reason by looking at the contained `String`.
  LinkFailed(String),
  /// A transform feedback varying name contains a nul byte.
  InvalidVarying(String),
}

impl fmt::Display for ProgramError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ProgramError::StageError(ref e) => write!(f, "shader program has stage error: {}", e),
      ProgramError::LinkFailed(ref s) => write!(f, "shader program failed to link: {}", s),
      ProgramError::InvalidVarying(ref s) => write!(f, "invalid transform feedback varying: {}", s),
    }
  }
}

impl error::Error for ProgramError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      ProgramError::StageError(e) => Some(e),
      _ => None,
    }
  }
}

/// How transform feedback varyings are written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransformFeedbackMode {
  /// All varyings in a single buffer.
  Interleaved,
  /// One buffer per varying.
  Separate,
}

#[derive(Clone, Debug)]
enum Source {
  File(PathBuf),
  Inline(String),
}

/// A shader program.
///
/// Stages are compiled as they are attached and remembered, so that the program can be rebuilt
/// from the same files later with [`Shader::recompile`].
#[derive(Debug)]
pub struct Shader {
  program: Cell<GLuint>,
  sources: Vec<(Source, StageType)>,
  varyings: Option<(Vec<String>, TransformFeedbackMode)>,
  state: Rc<RefCell<GLState>>,
}

impl Drop for Shader {
  fn drop(&mut self) {
    let program = self.program.get();
    let mut state = self.state.borrow_mut();

    if state.current_program() == program {
      state.invalidate_shader_program();
    }

    unsafe { gl::DeleteProgram(program) };
  }
}

impl Shader {
  /// Create an empty program.
  pub fn new(ctx: &Context) -> Self {
    let program = unsafe { gl::CreateProgram() };

    Shader {
      program: Cell::new(program),
      sources: Vec::new(),
      varyings: None,
      state: ctx.state.clone(),
    }
  }

  /// Add a directory to the shader search paths.
  pub fn add_path(path: &str) {
    paths::with_paths(Family::Shader, |p| p.add_path(path));
  }

  /// Raw program name.
  pub fn handle(&self) -> GLuint {
    self.program.get()
  }

  /// Compile the file `name`, found through the search paths, and attach it.
  pub fn attach_file(&mut self, name: &str, ty: StageType) -> Result<(), StageError> {
    let path = paths::resolve(Family::Shader, name).ok_or_else(|| {
      log::error!("cannot find {} file {}", ty, name);
      StageError::FileNotFound(name.to_owned())
    })?;

    let src = read_source(&path)?;
    let stage = compile_stage(ty, &src).map_err(|e| {
      log::error!("{}: {}", path.display(), e);
      e
    })?;

    unsafe { attach_stage(self.program.get(), stage) };
    self.sources.push((Source::File(path), ty));

    Ok(())
  }

  /// Compile `src` and attach it.
  pub fn attach_string(&mut self, src: &str, ty: StageType) -> Result<(), StageError> {
    let stage = compile_stage(ty, src).map_err(|e| {
      log::error!("{}", e);
      e
    })?;

    unsafe { attach_stage(self.program.get(), stage) };
    self.sources.push((Source::Inline(src.to_owned()), ty));

    Ok(())
  }

  /// Declare the varyings captured by transform feedback. Takes effect at the next link.
  pub fn set_transform_feedback_variables(
    &mut self,
    varyings: &[&str],
    mode: TransformFeedbackMode,
  ) -> Result<(), ProgramError> {
    let varyings: Vec<String> = varyings.iter().map(|v| (*v).to_owned()).collect();
    unsafe { apply_varyings(self.program.get(), &varyings, mode)? };
    self.varyings = Some((varyings, mode));

    Ok(())
  }

  /// Link the program.
  pub fn link(&self) -> Result<(), ProgramError> {
    unsafe { link_program(self.program.get()) }.map_err(|e| {
      log::error!("{}", e);
      e
    })
  }

  /// Rebuild the program from the attached sources.
  ///
  /// Files are read again. If anything fails, the current program is kept and the error is
  /// returned.
  pub fn recompile(&self) -> Result<(), ProgramError> {
    let program = unsafe { gl::CreateProgram() };

    match unsafe { self.build_into(program) } {
      Ok(()) => {
        let old = self.program.replace(program);
        let mut state = self.state.borrow_mut();

        if state.current_program() == old {
          state.invalidate_shader_program();
        }

        unsafe { gl::DeleteProgram(old) };
        log::info!("shader program {} recompiled as {}", old, program);

        Ok(())
      }

      Err(e) => {
        unsafe { gl::DeleteProgram(program) };
        log::error!("cannot recompile shader program: {}", e);

        Err(e)
      }
    }
  }

  unsafe fn build_into(&self, program: GLuint) -> Result<(), ProgramError> {
    for (source, ty) in &self.sources {
      let stage = match source {
        Source::File(path) => compile_stage(*ty, &read_source(path)?)?,
        Source::Inline(src) => compile_stage(*ty, src)?,
      };

      attach_stage(program, stage);
    }

    if let Some((ref varyings, mode)) = self.varyings {
      apply_varyings(program, varyings, mode)?;
    }

    link_program(program)
  }

  /// Make this program current.
  pub fn bind(&self) {
    unsafe { self.state.borrow_mut().use_program(self.program.get()) };
  }

  /// Make no program current.
  pub fn unbind(&self) {
    unsafe { self.state.borrow_mut().use_program(0) };
  }

  /// Location of a vertex attribute, if it is active.
  pub fn get_attribute_location(&self, name: &str) -> Option<u32> {
    let c_name = CString::new(name.as_bytes()).ok()?;
    let location =
      unsafe { gl::GetAttribLocation(self.program.get(), c_name.as_ptr() as *const GLchar) };

    if location < 0 {
      None
    } else {
      Some(location as u32)
    }
  }

  /// Location of a uniform, if it is active.
  pub fn get_uniform_location(&self, name: &str) -> Option<i32> {
    let c_name = CString::new(name.as_bytes()).ok()?;
    let location =
      unsafe { gl::GetUniformLocation(self.program.get(), c_name.as_ptr() as *const GLchar) };

    if location < 0 {
      None
    } else {
      Some(location)
    }
  }

  /// Upload a uniform value at `location`. The program is bound first.
  pub fn set_uniform<U>(&self, location: i32, value: U)
  where
    U: Uniform,
  {
    self.bind();
    unsafe { value.update(location) };
  }

  /// Upload a uniform value by name.
  ///
  /// Returns `false` if the program has no active uniform called `name`.
  pub fn set_uniform_by_name<U>(&self, name: &str, value: U) -> bool
  where
    U: Uniform,
  {
    match self.get_uniform_location(name) {
      Some(location) => {
        self.set_uniform(location, value);
        true
      }

      None => false,
    }
  }

  /// Upload matrices at `location`, optionally transposing them.
  pub fn set_uniform_matrix<M>(&self, location: i32, transpose: bool, values: &[M])
  where
    M: UniformMatrix,
  {
    self.bind();
    unsafe { M::update_matrices(values, location, transpose) };
  }

  /// Upload matrices by name, optionally transposing them.
  pub fn set_uniform_matrix_by_name<M>(&self, name: &str, transpose: bool, values: &[M]) -> bool
  where
    M: UniformMatrix,
  {
    match self.get_uniform_location(name) {
      Some(location) => {
        self.set_uniform_matrix(location, transpose, values);
        true
      }

      None => false,
    }
  }
}

fn read_source(path: &Path) -> Result<String, StageError> {
  fs::read_to_string(path).map_err(|e| StageError::ReadFailed(path.to_path_buf(), e))
}

fn compile_stage(ty: StageType, src: &str) -> Result<GLuint, StageError> {
  let c_src = CString::new(src.as_bytes()).map_err(|_| StageError::InvalidSource(ty))?;

  unsafe {
    let handle = gl::CreateShader(opengl_shader_type(ty));

    if handle == 0 {
      return Err(StageError::CreationFailed(ty));
    }

    gl::ShaderSource(handle, 1, [c_src.as_ptr()].as_ptr(), null());
    gl::CompileShader(handle);

    let mut compiled: GLint = gl::FALSE.into();
    gl::GetShaderiv(handle, gl::COMPILE_STATUS, &mut compiled);

    if compiled == gl::TRUE.into() {
      Ok(handle)
    } else {
      let mut log_len: GLint = 0;
      gl::GetShaderiv(handle, gl::INFO_LOG_LENGTH, &mut log_len);

      let mut log: Vec<u8> = Vec::with_capacity(log_len as usize);
      gl::GetShaderInfoLog(handle, log_len, null_mut(), log.as_mut_ptr() as *mut GLchar);

      gl::DeleteShader(handle);

      log.set_len(log_len as usize);

      Err(StageError::CompilationFailed(ty, info_log_to_string(log)))
    }
  }
}

// the stage is flagged for deletion and goes away with the program
unsafe fn attach_stage(program: GLuint, stage: GLuint) {
  gl::AttachShader(program, stage);
  gl::DeleteShader(stage);
}

unsafe fn apply_varyings(
  program: GLuint,
  varyings: &[String],
  mode: TransformFeedbackMode,
) -> Result<(), ProgramError> {
  let c_varyings = varyings
    .iter()
    .map(|v| CString::new(v.as_bytes()).map_err(|_| ProgramError::InvalidVarying(v.clone())))
    .collect::<Result<Vec<_>, _>>()?;
  let ptrs: Vec<*const GLchar> = c_varyings.iter().map(|v| v.as_ptr()).collect();

  let mode = match mode {
    TransformFeedbackMode::Interleaved => gl::INTERLEAVED_ATTRIBS,
    TransformFeedbackMode::Separate => gl::SEPARATE_ATTRIBS,
  };

  gl::TransformFeedbackVaryings(program, ptrs.len() as GLsizei, ptrs.as_ptr(), mode);

  Ok(())
}

unsafe fn link_program(handle: GLuint) -> Result<(), ProgramError> {
  gl::LinkProgram(handle);

  let mut linked: GLint = gl::FALSE.into();
  gl::GetProgramiv(handle, gl::LINK_STATUS, &mut linked);

  if linked == gl::TRUE.into() {
    Ok(())
  } else {
    let mut log_len: GLint = 0;
    gl::GetProgramiv(handle, gl::INFO_LOG_LENGTH, &mut log_len);

    let mut log: Vec<u8> = Vec::with_capacity(log_len as usize);
    gl::GetProgramInfoLog(handle, log_len, null_mut(), log.as_mut_ptr() as *mut GLchar);

    log.set_len(log_len as usize);

    Err(ProgramError::LinkFailed(info_log_to_string(log)))
  }
}

// info logs are nul terminated
fn info_log_to_string(mut log: Vec<u8>) -> String {
  while log.last() == Some(&0) {
    log.pop();
  }

  String::from_utf8_lossy(&log).into_owned()
}

/// Values that can be uploaded as a uniform.
pub trait Uniform {
  /// Upload to `location` of the current program.
  ///
  /// # Safety
  ///
  /// A program must be bound on the current GL context.
  unsafe fn update(self, location: GLint);
}

/// Matrices that can be uploaded with an explicit transpose flag.
pub trait UniformMatrix: Sized {
  /// Upload `values` to `location` of the current program.
  ///
  /// # Safety
  ///
  /// A program must be bound on the current GL context.
  unsafe fn update_matrices(values: &[Self], location: GLint, transpose: bool);
}

macro_rules! impl_Uniform {
  ($t:ty, $f:tt, $fv:tt) => {
    impl Uniform for $t {
      unsafe fn update(self, location: GLint) {
        gl::$f(location, self);
      }
    }

    impl Uniform for &[$t] {
      unsafe fn update(self, location: GLint) {
        gl::$fv(location, self.len() as GLsizei, self.as_ptr());
      }
    }
  };

  // vectors, as plain arrays and as cgmath vectors
  (vec $t:ty, $n:tt, $v:ident, $f:tt) => {
    impl Uniform for [$t; $n] {
      unsafe fn update(self, location: GLint) {
        gl::$f(location, 1, self.as_ptr());
      }
    }

    impl Uniform for $v<$t> {
      unsafe fn update(self, location: GLint) {
        let a: &[$t; $n] = self.as_ref();
        gl::$f(location, 1, a.as_ptr());
      }
    }

    impl Uniform for &[[$t; $n]] {
      unsafe fn update(self, location: GLint) {
        gl::$f(location, self.len() as GLsizei, self.as_ptr() as _);
      }
    }

    impl Uniform for &[$v<$t>] {
      unsafe fn update(self, location: GLint) {
        gl::$f(location, self.len() as GLsizei, self.as_ptr() as _);
      }
    }
  };

  // matrix notation
  (mat $m:ident<$t:ty>, $f:tt) => {
    impl UniformMatrix for $m<$t> {
      unsafe fn update_matrices(values: &[Self], location: GLint, transpose: bool) {
        let transpose = if transpose { gl::TRUE } else { gl::FALSE };
        gl::$f(location, values.len() as GLsizei, transpose, values.as_ptr() as _);
      }
    }

    impl Uniform for $m<$t> {
      unsafe fn update(self, location: GLint) {
        gl::$f(location, 1, gl::FALSE, self.as_ptr());
      }
    }

    impl Uniform for &[$m<$t>] {
      unsafe fn update(self, location: GLint) {
        <$m<$t> as UniformMatrix>::update_matrices(self, location, false);
      }
    }
  };
}

impl_Uniform!(i32, Uniform1i, Uniform1iv);
impl_Uniform!(vec i32, 2, Vector2, Uniform2iv);
impl_Uniform!(vec i32, 3, Vector3, Uniform3iv);
impl_Uniform!(vec i32, 4, Vector4, Uniform4iv);

impl_Uniform!(u32, Uniform1ui, Uniform1uiv);
impl_Uniform!(vec u32, 2, Vector2, Uniform2uiv);
impl_Uniform!(vec u32, 3, Vector3, Uniform3uiv);
impl_Uniform!(vec u32, 4, Vector4, Uniform4uiv);

impl_Uniform!(f32, Uniform1f, Uniform1fv);
impl_Uniform!(vec f32, 2, Vector2, Uniform2fv);
impl_Uniform!(vec f32, 3, Vector3, Uniform3fv);
impl_Uniform!(vec f32, 4, Vector4, Uniform4fv);

#[cfg(feature = "GL_ARB_gpu_shader_fp64")]
impl_Uniform!(f64, Uniform1d, Uniform1dv);
#[cfg(feature = "GL_ARB_gpu_shader_fp64")]
impl_Uniform!(vec f64, 2, Vector2, Uniform2dv);
#[cfg(feature = "GL_ARB_gpu_shader_fp64")]
impl_Uniform!(vec f64, 3, Vector3, Uniform3dv);
#[cfg(feature = "GL_ARB_gpu_shader_fp64")]
impl_Uniform!(vec f64, 4, Vector4, Uniform4dv);

impl_Uniform!(mat Matrix2<f32>, UniformMatrix2fv);
impl_Uniform!(mat Matrix3<f32>, UniformMatrix3fv);
impl_Uniform!(mat Matrix4<f32>, UniformMatrix4fv);

#[cfg(feature = "GL_ARB_gpu_shader_fp64")]
impl_Uniform!(mat Matrix2<f64>, UniformMatrix2dv);
#[cfg(feature = "GL_ARB_gpu_shader_fp64")]
impl_Uniform!(mat Matrix3<f64>, UniformMatrix3dv);
#[cfg(feature = "GL_ARB_gpu_shader_fp64")]
impl_Uniform!(mat Matrix4<f64>, UniformMatrix4dv);

impl Uniform for bool {
  unsafe fn update(self, location: GLint) {
    gl::Uniform1i(location, self as GLint);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn info_log_strips_nul() {
    let log = b"0:12(3): error: syntax error\n\0".to_vec();
    assert_eq!(info_log_to_string(log), "0:12(3): error: syntax error\n");
    assert_eq!(info_log_to_string(Vec::new()), "");
  }

  #[test]
  fn stage_display() {
    let e = StageError::CompilationFailed(StageType::Fragment, "oops".to_owned());
    assert_eq!(e.to_string(), "fragment shader compilation error: oops");

    let e = ProgramError::from(StageError::FileNotFound("a.vs".to_owned()));
    assert_eq!(
      e.to_string(),
      "shader program has stage error: shader file not found: a.vs"
    );
  }
}
