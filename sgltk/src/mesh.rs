//! Meshes: a vertex array object with its vertex, index and auxiliary buffers.
//!
//! A [`Mesh`] owns any number of vertex buffers and index buffers. Vertex attributes are mapped
//! onto those buffers by name (resolved through the attached [`Shader`]) or by location. When
//! drawn, the mesh uploads the usual transformation matrices and its [`Material`] to the shader,
//! binds its textures on consecutive units and issues an indexed draw call.

use cgmath::{Matrix, Matrix3, Matrix4, Point3, SquareMatrix, Vector3, Vector4};
use gl::types::*;
use std::{
  cell::RefCell,
  error,
  ffi::c_void,
  fmt, mem, ptr,
  rc::Rc,
};

use crate::buffer::{Buffer, BufferError, BufferTarget, Usage};
use crate::camera::{Camera, Projection};
use crate::context::Context;
use crate::shader::Shader;
use crate::state::{Bind, GLState, PolygonMode};
use crate::texture::Texture;

/// The vertex layout used by models.
///
/// The layout is `#[repr(C)]` and tightly packed; the `OFFSET_*` constants give the byte offset
/// of every field for use with [`Mesh::set_vertex_attribute`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
  pub position: Vector4<f32>,
  pub normal: Vector3<f32>,
  pub tangent: Vector4<f32>,
  pub bitangent: Vector4<f32>,
  pub color: Vector4<f32>,
  pub tex_coord: Vector3<f32>,
}

impl Vertex {
  pub const OFFSET_POSITION: usize = 0;
  pub const OFFSET_NORMAL: usize = 16;
  pub const OFFSET_TANGENT: usize = 28;
  pub const OFFSET_BITANGENT: usize = 44;
  pub const OFFSET_COLOR: usize = 60;
  pub const OFFSET_TEX_COORD: usize = 76;

  /// A vertex with default tangent, color and texture coordinates.
  pub fn new(position: Vector3<f32>, normal: Vector3<f32>) -> Self {
    Self::with_color(
      position,
      normal,
      Vector3::new(0., 0., 0.),
      Vector4::new(0., 0., 0., 0.),
      Vector3::new(0., 0., 0.),
    )
  }

  /// A vertex with texture coordinates.
  pub fn with_tex_coord(
    position: Vector3<f32>,
    normal: Vector3<f32>,
    tex_coord: Vector3<f32>,
  ) -> Self {
    Self::with_color(
      position,
      normal,
      Vector3::new(0., 0., 0.),
      Vector4::new(0., 0., 0., 0.),
      tex_coord,
    )
  }

  /// A vertex with a tangent and texture coordinates.
  pub fn with_tangent(
    position: Vector3<f32>,
    normal: Vector3<f32>,
    tangent: Vector3<f32>,
    tex_coord: Vector3<f32>,
  ) -> Self {
    Self::with_color(position, normal, tangent, Vector4::new(0., 0., 0., 0.), tex_coord)
  }

  /// The bitangent is derived as `cross(normal, tangent)`.
  pub fn with_color(
    position: Vector3<f32>,
    normal: Vector3<f32>,
    tangent: Vector3<f32>,
    color: Vector4<f32>,
    tex_coord: Vector3<f32>,
  ) -> Self {
    Vertex {
      position: position.extend(1.),
      normal,
      tangent: tangent.extend(1.),
      bitangent: normal.cross(tangent).extend(1.),
      color,
      tex_coord,
    }
  }
}

impl Default for Vertex {
  fn default() -> Self {
    Self::new(Vector3::new(0., 0., 0.), Vector3::new(0., 0., 0.))
  }
}

/// Surface material uploaded with every draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
  pub color_ambient: Vector4<f32>,
  pub color_diffuse: Vector4<f32>,
  pub color_specular: Vector4<f32>,
  pub shininess: f32,
  pub shininess_strength: f32,
}

impl Default for Material {
  fn default() -> Self {
    Material {
      color_ambient: Vector4::new(0., 0., 0., 1.),
      color_diffuse: Vector4::new(0., 0., 0., 1.),
      color_specular: Vector4::new(0., 0., 0., 1.),
      shininess: 0.,
      shininess_strength: 1.,
    }
  }
}

/// Names of the uniforms a mesh uploads when drawn.
///
/// Uniforms the shader does not declare are silently skipped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniformNames {
  pub model_matrix: String,
  pub view_matrix: String,
  pub projection_matrix: String,
  pub model_view_matrix: String,
  pub view_proj_matrix: String,
  pub model_view_proj_matrix: String,
  pub normal_matrix: String,
  pub ambient_color: String,
  pub diffuse_color: String,
  pub specular_color: String,
  pub shininess: String,
  pub shininess_strength: String,
}

impl Default for UniformNames {
  fn default() -> Self {
    UniformNames {
      model_matrix: "model_matrix".to_owned(),
      view_matrix: "view_matrix".to_owned(),
      projection_matrix: "proj_matrix".to_owned(),
      model_view_matrix: "model_view_matrix".to_owned(),
      view_proj_matrix: "view_proj_matrix".to_owned(),
      model_view_proj_matrix: "model_view_proj_matrix".to_owned(),
      normal_matrix: "normal_matrix".to_owned(),
      ambient_color: "material.color_ambient".to_owned(),
      diffuse_color: "material.color_diffuse".to_owned(),
      specular_color: "material.color_specular".to_owned(),
      shininess: "material.shininess".to_owned(),
      shininess_strength: "material.shininess_strength".to_owned(),
    }
  }
}

/// Every matrix derived from a model, view and projection matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixSet {
  pub model: Matrix4<f32>,
  pub view: Matrix4<f32>,
  pub projection: Matrix4<f32>,
  pub model_view: Matrix4<f32>,
  pub view_proj: Matrix4<f32>,
  pub model_view_proj: Matrix4<f32>,
  pub normal: Matrix3<f32>,
}

impl MatrixSet {
  /// Derive every matrix a shader may ask for.
  ///
  /// A singular model-view matrix gives an identity normal matrix.
  pub fn compute(model: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
    let model_view = view * model;
    let view_proj = projection * view;

    MatrixSet {
      model,
      view,
      projection,
      model_view,
      view_proj,
      model_view_proj: view_proj * model,
      normal: normal_matrix(&model_view),
    }
  }
}

/// Upper 3×3 block of the inverse transpose of `m`; identity if `m` is singular.
pub fn normal_matrix(m: &Matrix4<f32>) -> Matrix3<f32> {
  match m.invert() {
    Some(inv) => {
      let t = inv.transpose();
      Matrix3::from_cols(t.x.truncate(), t.y.truncate(), t.z.truncate())
    }

    None => Matrix3::identity(),
  }
}

/// Primitive mode used to connect vertices.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Mode {
  Point,
  Line,
  LineStrip,
  LineLoop,
  Triangle,
  TriangleFan,
  TriangleStrip,
  LineAdjacency,
  TriangleAdjacency,
  /// Tessellation patches of the given number of vertices.
  Patch(usize),
}

impl Mode {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      Mode::Point => gl::POINTS,
      Mode::Line => gl::LINES,
      Mode::LineStrip => gl::LINE_STRIP,
      Mode::LineLoop => gl::LINE_LOOP,
      Mode::Triangle => gl::TRIANGLES,
      Mode::TriangleFan => gl::TRIANGLE_FAN,
      Mode::TriangleStrip => gl::TRIANGLE_STRIP,
      Mode::LineAdjacency => gl::LINES_ADJACENCY,
      Mode::TriangleAdjacency => gl::TRIANGLES_ADJACENCY,
      Mode::Patch(_) => gl::PATCHES,
    }
  }

  /// Primitive captured by transform feedback for this mode.
  pub(crate) fn feedback_primitive(self) -> GLenum {
    match self {
      Mode::Point => gl::POINTS,
      Mode::Line | Mode::LineStrip | Mode::LineLoop | Mode::LineAdjacency => gl::LINES,
      _ => gl::TRIANGLES,
    }
  }
}

/// Type of the components of a vertex attribute.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttribType {
  Byte,
  UnsignedByte,
  Short,
  UnsignedShort,
  Int,
  UnsignedInt,
  HalfFloat,
  Float,
  Double,
}

impl AttribType {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      AttribType::Byte => gl::BYTE,
      AttribType::UnsignedByte => gl::UNSIGNED_BYTE,
      AttribType::Short => gl::SHORT,
      AttribType::UnsignedShort => gl::UNSIGNED_SHORT,
      AttribType::Int => gl::INT,
      AttribType::UnsignedInt => gl::UNSIGNED_INT,
      AttribType::HalfFloat => gl::HALF_FLOAT,
      AttribType::Float => gl::FLOAT,
      AttribType::Double => gl::DOUBLE,
    }
  }

  /// Integer attributes are passed to the shader without conversion to float.
  pub fn is_integer(self) -> bool {
    matches!(
      self,
      AttribType::Byte
        | AttribType::UnsignedByte
        | AttribType::Short
        | AttribType::UnsignedShort
        | AttribType::Int
        | AttribType::UnsignedInt
    )
  }
}

/// Type of the indices of an index buffer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IndexType {
  U8,
  U16,
  U32,
}

impl IndexType {
  pub(crate) fn to_glenum(self) -> GLenum {
    match self {
      IndexType::U8 => gl::UNSIGNED_BYTE,
      IndexType::U16 => gl::UNSIGNED_SHORT,
      IndexType::U32 => gl::UNSIGNED_INT,
    }
  }
}

/// Integers usable as indices.
pub trait Index: Copy {
  const TYPE: IndexType;
}

impl Index for u8 {
  const TYPE: IndexType = IndexType::U8;
}

impl Index for u16 {
  const TYPE: IndexType = IndexType::U16;
}

impl Index for u32 {
  const TYPE: IndexType = IndexType::U32;
}

/// Errors that can happen while setting up or drawing a mesh.
#[non_exhaustive]
#[derive(Debug)]
pub enum MeshError {
  /// No shader was attached with [`Mesh::setup_shader`].
  NoShader,
  /// Buffer index out of range.
  NoSuchBuffer(usize),
  /// The shader has no active attribute with that name.
  UnknownAttribute(String),
  /// The position offset does not fit in the vertex type.
  InvalidOffset { offset: usize, size: usize },
  /// Buffer update failed.
  BufferError(BufferError),
}

impl fmt::Display for MeshError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      MeshError::NoShader => f.write_str("no shader specified"),
      MeshError::NoSuchBuffer(index) => write!(f, "no buffer at index {}", index),
      MeshError::UnknownAttribute(ref name) => write!(f, "unknown vertex attribute: {}", name),
      MeshError::InvalidOffset { offset, size } => write!(
        f,
        "position offset {} does not fit a vertex of {} bytes",
        offset, size
      ),
      MeshError::BufferError(ref e) => write!(f, "buffer error: {}", e),
    }
  }
}

impl error::Error for MeshError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      MeshError::BufferError(e) => Some(e),
      _ => None,
    }
  }
}

impl From<BufferError> for MeshError {
  fn from(e: BufferError) -> Self {
    MeshError::BufferError(e)
  }
}

/// A texture bound by a mesh: sampler uniform name, texture and array index.
pub type MeshTexture = (String, Rc<Texture>, u32);

#[derive(Debug)]
struct IndexBuffer {
  buffer: Buffer,
  ty: IndexType,
  count: usize,
}

#[derive(Debug)]
struct AttachedBuffer {
  buffer: Rc<Buffer>,
  target: BufferTarget,
  index: u32,
}

/// A drawable mesh.
#[derive(Debug)]
pub struct Mesh {
  vao: GLuint,
  shader: Option<Rc<Shader>>,
  view_matrix: Matrix4<f32>,
  projection_matrix: Matrix4<f32>,
  vertex_buffers: Vec<Buffer>,
  index_buffers: Vec<IndexBuffer>,
  attached_buffers: Vec<AttachedBuffer>,
  tf_mode: Option<Mode>,
  tf_buffers: Vec<Buffer>,
  names: UniformNames,
  bounding_box: [Point3<f32>; 2],
  state: Rc<RefCell<GLState>>,
  /// Model matrix used when [`Mesh::draw`] is not given one.
  pub model_matrix: Matrix4<f32>,
  pub material: Material,
  /// Textures attached by a loader; bound before the user textures.
  pub auto_textures: Vec<MeshTexture>,
  pub textures: Vec<MeshTexture>,
  /// Draw in line polygon mode.
  pub wireframe: bool,
  /// Disable back-face culling.
  pub twosided: bool,
}

impl Drop for Mesh {
  fn drop(&mut self) {
    unsafe {
      self.state.borrow_mut().unbind_vertex_array();
      gl::DeleteVertexArrays(1, &self.vao);
    }
  }
}

impl Mesh {
  /// Create an empty mesh.
  pub fn new(ctx: &Context) -> Self {
    let mut vao: GLuint = 0;
    unsafe { gl::GenVertexArrays(1, &mut vao) };

    Mesh {
      vao,
      shader: None,
      view_matrix: Matrix4::identity(),
      projection_matrix: Matrix4::identity(),
      vertex_buffers: Vec::new(),
      index_buffers: Vec::new(),
      attached_buffers: Vec::new(),
      tf_mode: None,
      tf_buffers: Vec::new(),
      names: UniformNames::default(),
      bounding_box: [Point3::new(0., 0., 0.); 2],
      state: ctx.state.clone(),
      model_matrix: Matrix4::identity(),
      material: Material::default(),
      auto_textures: Vec::new(),
      textures: Vec::new(),
      wireframe: false,
      twosided: true,
    }
  }

  /// Use `shader` for drawing and attribute lookups.
  pub fn setup_shader(&mut self, shader: Rc<Shader>) {
    self.shader = Some(shader);
  }

  /// Shader used for drawing.
  pub fn shader(&self) -> Option<&Rc<Shader>> {
    self.shader.as_ref()
  }

  /// Set the view and projection matrices used by subsequent draws.
  pub fn setup_camera(&mut self, view: Matrix4<f32>, projection: Matrix4<f32>) {
    self.view_matrix = view;
    self.projection_matrix = projection;
  }

  /// Copy the current matrices of `camera`.
  pub fn setup_camera_from<P>(&mut self, camera: &Camera<P>)
  where
    P: Projection,
  {
    self.setup_camera(camera.view_matrix, camera.projection_matrix);
  }

  /// View matrix used at draw time.
  pub fn view_matrix(&self) -> Matrix4<f32> {
    self.view_matrix
  }

  /// Projection matrix used at draw time.
  pub fn projection_matrix(&self) -> Matrix4<f32> {
    self.projection_matrix
  }

  /// Names of the matrix and material uniforms.
  pub fn uniform_names(&self) -> &UniformNames {
    &self.names
  }

  /// Name of the model matrix uniform.
  pub fn set_model_matrix_name(&mut self, name: &str) {
    self.names.model_matrix = name.to_owned();
  }

  /// Name of the view matrix uniform.
  pub fn set_view_matrix_name(&mut self, name: &str) {
    self.names.view_matrix = name.to_owned();
  }

  /// Name of the projection matrix uniform.
  pub fn set_projection_matrix_name(&mut self, name: &str) {
    self.names.projection_matrix = name.to_owned();
  }

  /// Name of the model-view matrix uniform.
  pub fn set_model_view_matrix_name(&mut self, name: &str) {
    self.names.model_view_matrix = name.to_owned();
  }

  /// Name of the view-projection matrix uniform.
  pub fn set_view_proj_matrix_name(&mut self, name: &str) {
    self.names.view_proj_matrix = name.to_owned();
  }

  /// Name of the model-view-projection matrix uniform.
  pub fn set_model_view_proj_name(&mut self, name: &str) {
    self.names.model_view_proj_matrix = name.to_owned();
  }

  /// Name of the normal matrix uniform.
  pub fn set_normal_matrix_name(&mut self, name: &str) {
    self.names.normal_matrix = name.to_owned();
  }

  /// Name of the ambient color uniform.
  pub fn set_ambient_color_name(&mut self, name: &str) {
    self.names.ambient_color = name.to_owned();
  }

  /// Name of the diffuse color uniform.
  pub fn set_diffuse_color_name(&mut self, name: &str) {
    self.names.diffuse_color = name.to_owned();
  }

  /// Name of the specular color uniform.
  pub fn set_specular_color_name(&mut self, name: &str) {
    self.names.specular_color = name.to_owned();
  }

  /// Name of the shininess uniform.
  pub fn set_shininess_name(&mut self, name: &str) {
    self.names.shininess = name.to_owned();
  }

  /// Name of the shininess strength uniform.
  pub fn set_shininess_strength_name(&mut self, name: &str) {
    self.names.shininess_strength = name.to_owned();
  }

  /// Upload `data` into a new vertex buffer and return its index.
  pub fn attach_vertex_buffer<T: Copy>(&mut self, data: &[T], usage: Usage) -> usize {
    let mut buffer = Buffer::with_state(self.state.clone(), BufferTarget::Array);
    buffer.load(data, usage);
    self.vertex_buffers.push(buffer);
    self.vertex_buffers.len() - 1
  }

  /// Vertex buffer at `index`.
  pub fn vertex_buffer(&self, index: usize) -> Option<&Buffer> {
    self.vertex_buffers.get(index)
  }

  /// Number of attached vertex buffers.
  pub fn num_vertex_buffers(&self) -> usize {
    self.vertex_buffers.len()
  }

  /// Replace the content of a vertex buffer.
  pub fn replace_buffer_data<T: Copy>(
    &mut self,
    index: usize,
    data: &[T]) -> Result<(), MeshError> {
    let buffer = self
      .vertex_buffers
      .get_mut(index)
      .ok_or(MeshError::NoSuchBuffer(index))?;

    buffer.replace_data(data);
    Ok(())
  }

  /// Overwrite part of a vertex buffer, `offset` bytes in.
  pub fn replace_partial_data<T: Copy>(
    &mut self,
    index: usize,
    offset: usize,
    data: &[T],
  ) -> Result<(), MeshError> {
    let buffer = self
      .vertex_buffers
      .get_mut(index)
      .ok_or(MeshError::NoSuchBuffer(index))?;

    buffer.replace_partial_data(offset, data)?;
    Ok(())
  }

  /// Point the attribute `name` at a vertex buffer.
  ///
  /// `stride` and `offset` are in bytes; `divisor` is the instancing divisor (0 for per-vertex
  /// data).
  #[allow(clippy::too_many_arguments)]
  pub fn set_vertex_attribute(
    &mut self,
    name: &str,
    buffer_index: usize,
    components: i32,
    ty: AttribType,
    stride: usize,
    offset: usize,
    divisor: u32,
  ) -> Result<(), MeshError> {
    let location = self.attribute_location(name)?;
    self.set_vertex_attribute_at(location, buffer_index, components, ty, stride, offset, divisor)
  }

  /// Same as [`Mesh::set_vertex_attribute`], with an explicit attribute location.
  #[allow(clippy::too_many_arguments)]
  pub fn set_vertex_attribute_at(
    &mut self,
    location: u32,
    buffer_index: usize,
    components: i32,
    ty: AttribType,
    stride: usize,
    offset: usize,
    divisor: u32,
  ) -> Result<(), MeshError> {
    let buffer = self
      .vertex_buffers
      .get(buffer_index)
      .ok_or(MeshError::NoSuchBuffer(buffer_index))?;

    self.bind_vao();
    buffer.bind_to(BufferTarget::Array);
    set_attrib_pointer(location, components, ty, stride, offset, divisor);

    Ok(())
  }

  /// Attach `data` as a new vertex buffer and point the attribute `name` at it.
  pub fn add_vertex_attribute<T: Copy>(
    &mut self,
    name: &str,
    components: i32,
    ty: AttribType,
    data: &[T],
    usage: Usage,
  ) -> Result<usize, MeshError> {
    let location = self.attribute_location(name)?;
    let index = self.attach_vertex_buffer(data, usage);
    self.set_vertex_attribute_at(location, index, components, ty, 0, 0, 0)?;

    Ok(index)
  }

  /// Point the attribute `name` at a buffer the mesh does not own.
  #[allow(clippy::too_many_arguments)]
  pub fn set_buffer_vertex_attribute(
    &mut self,
    name: &str,
    buffer: &Buffer,
    components: i32,
    ty: AttribType,
    stride: usize,
    offset: usize,
    divisor: u32,
  ) -> Result<(), MeshError> {
    let location = self.attribute_location(name)?;
    self.set_buffer_vertex_attribute_at(location, buffer, components, ty, stride, offset, divisor);

    Ok(())
  }

  /// Same as [`Mesh::set_buffer_vertex_attribute`], with an explicit attribute location.
  #[allow(clippy::too_many_arguments)]
  pub fn set_buffer_vertex_attribute_at(
    &mut self,
    location: u32,
    buffer: &Buffer,
    components: i32,
    ty: AttribType,
    stride: usize,
    offset: usize,
    divisor: u32,
  ) {
    self.bind_vao();
    buffer.bind_to(BufferTarget::Array);
    set_attrib_pointer(location, components, ty, stride, offset, divisor);
  }

  /// Upload an index buffer and return its index.
  pub fn attach_index_buffer<I: Index>(&mut self, indices: &[I]) -> usize {
    let mut buffer = Buffer::with_state(self.state.clone(), BufferTarget::ElementArray);

    self.bind_vao();
    buffer.load(indices, Usage::StaticDraw);

    self.index_buffers.push(IndexBuffer {
      buffer,
      ty: I::TYPE,
      count: indices.len(),
    });

    self.index_buffers.len() - 1
  }

  /// Number of attached index buffers.
  pub fn num_index_buffers(&self) -> usize {
    self.index_buffers.len()
  }

  /// Bind an extra buffer, such as a uniform block, to `target` binding point `index` at draw.
  pub fn attach_buffer(&mut self, buffer: Rc<Buffer>, target: BufferTarget, index: u32) {
    self.attached_buffers.push(AttachedBuffer {
      buffer,
      target,
      index,
    });
  }

  /// Capture the output of subsequent draws with transform feedback, or stop capturing.
  pub fn set_transform_feedback_mode(&mut self, mode: Option<Mode>) {
    self.tf_mode = mode;
  }

  /// Allocate a `size` bytes transform feedback buffer and return its index.
  ///
  /// Buffers are bound to consecutive transform feedback binding points, in attach order.
  pub fn attach_tf_buffer(&mut self, size: usize, usage: Usage) -> usize {
    let mut buffer = Buffer::with_state(self.state.clone(), BufferTarget::TransformFeedback);
    buffer.create_empty::<u8>(size, usage);
    self.tf_buffers.push(buffer);
    self.tf_buffers.len() - 1
  }

  /// Transform feedback buffer at `index`.
  pub fn tf_buffer(&self, index: usize) -> Option<&Buffer> {
    self.tf_buffers.get(index)
  }

  /// Add a user texture sampled through the uniform `name`; `index` selects an element of a
  /// sampler array.
  pub fn attach_texture(&mut self, name: &str, texture: Rc<Texture>, index: u32) {
    self.textures.push((name.to_owned(), texture, index));
  }

  /// Compute the bounding box from the vertex positions found `position_offset` bytes into each
  /// element of `data`.
  pub fn compute_bounding_box<T: Copy>(
    &mut self,
    data: &[T],
    position_offset: usize,
  ) -> Result<(), MeshError> {
    if let Some(bb) = bounding_box(data, position_offset)? {
      self.bounding_box = bb;
    }

    Ok(())
  }

  /// Minimum and maximum corners.
  pub fn bounding_box(&self) -> [Point3<f32>; 2] {
    self.bounding_box
  }

  /// Override the computed bounding box.
  pub fn set_bounding_box(&mut self, bb: [Point3<f32>; 2]) {
    self.bounding_box = bb;
  }

  /// Draw with the index buffer `index_buffer`.
  ///
  /// When `model_matrix` is `None`, the mesh's own model matrix is used.
  pub fn draw(
    &self,
    mode: Mode,
    index_buffer: usize,
    model_matrix: Option<&Matrix4<f32>>,
  ) -> Result<(), MeshError> {
    let model = model_matrix.copied().unwrap_or(self.model_matrix);
    let ib = self.prepare(mode, index_buffer, model)?;

    unsafe {
      gl::DrawElements(
        mode.to_glenum(),
        ib.count as GLsizei,
        ib.ty.to_glenum(),
        ptr::null(),
      );
    }

    self.finish();
    Ok(())
  }

  /// Draw `instances` instances with the index buffer `index_buffer`.
  pub fn draw_instanced(
    &self,
    mode: Mode,
    index_buffer: usize,
    instances: usize,
  ) -> Result<(), MeshError> {
    let ib = self.prepare(mode, index_buffer, self.model_matrix)?;

    unsafe {
      gl::DrawElementsInstanced(
        mode.to_glenum(),
        ib.count as GLsizei,
        ib.ty.to_glenum(),
        ptr::null(),
        instances as GLsizei,
      );
    }

    self.finish();
    Ok(())
  }

  fn attribute_location(&self, name: &str) -> Result<u32, MeshError> {
    let shader = self.shader.as_ref().ok_or(MeshError::NoShader)?;

    shader
      .get_attribute_location(name)
      .ok_or_else(|| MeshError::UnknownAttribute(name.to_owned()))
  }

  fn bind_vao(&self) {
    unsafe { self.state.borrow_mut().bind_vertex_array(self.vao, Bind::Cached) };
  }

  // Everything a draw call needs, up to the call itself.
  fn prepare(
    &self,
    mode: Mode,
    index_buffer: usize,
    model: Matrix4<f32>,
  ) -> Result<&IndexBuffer, MeshError> {
    let shader = self.shader.as_ref().ok_or(MeshError::NoShader)?;
    let ib = self
      .index_buffers
      .get(index_buffer)
      .ok_or(MeshError::NoSuchBuffer(index_buffer))?;

    shader.bind();
    self.upload_uniforms(shader, model);
    self.bind_textures(shader);

    {
      let mut state = self.state.borrow_mut();

      unsafe {
        state.set_polygon_mode(if self.wireframe {
          PolygonMode::Line
        } else {
          PolygonMode::Fill
        });
        state.set_face_culling(!self.twosided);
      }
    }

    self.bind_vao();
    ib.buffer.bind_to(BufferTarget::ElementArray);

    for attached in &self.attached_buffers {
      attached.buffer.bind_base(attached.target, attached.index);
    }

    if let Mode::Patch(n) = mode {
      unsafe { gl::PatchParameteri(gl::PATCH_VERTICES, n as GLint) };
    }

    if let Some(tf_mode) = self.tf_mode {
      for (i, buffer) in self.tf_buffers.iter().enumerate() {
        buffer.bind_base(BufferTarget::TransformFeedback, i as u32);
      }

      unsafe { gl::BeginTransformFeedback(tf_mode.feedback_primitive()) };
    }

    Ok(ib)
  }

  fn finish(&self) {
    if self.tf_mode.is_some() {
      unsafe { gl::EndTransformFeedback() };
    }
  }

  fn upload_uniforms(&self, shader: &Shader, model: Matrix4<f32>) {
    let m = MatrixSet::compute(model, self.view_matrix, self.projection_matrix);
    let names = &self.names;

    shader.set_uniform_by_name(&names.model_matrix, m.model);
    shader.set_uniform_by_name(&names.view_matrix, m.view);
    shader.set_uniform_by_name(&names.projection_matrix, m.projection);
    shader.set_uniform_by_name(&names.model_view_matrix, m.model_view);
    shader.set_uniform_by_name(&names.view_proj_matrix, m.view_proj);
    shader.set_uniform_by_name(&names.model_view_proj_matrix, m.model_view_proj);
    shader.set_uniform_by_name(&names.normal_matrix, m.normal);

    let material = &self.material;
    shader.set_uniform_by_name(&names.ambient_color, material.color_ambient);
    shader.set_uniform_by_name(&names.diffuse_color, material.color_diffuse);
    shader.set_uniform_by_name(&names.specular_color, material.color_specular);
    shader.set_uniform_by_name(&names.shininess, material.shininess);
    shader.set_uniform_by_name(&names.shininess_strength, material.shininess_strength);
  }

  fn bind_textures(&self, shader: &Shader) {
    let all = self.auto_textures.iter().chain(self.textures.iter());

    for (unit, (name, texture, index)) in all.enumerate() {
      texture.bind(unit as u32);
      shader.set_uniform_by_name(&sampler_uniform_name(name, *index), unit as i32);
    }
  }
}

/// Name of the sampler uniform for element `index` of `name`.
pub(crate) fn sampler_uniform_name(name: &str, index: u32) -> String {
  if index == 0 {
    name.to_owned()
  } else {
    format!("{}[{}]", name, index)
  }
}

// Point `location` at the buffer currently bound to GL_ARRAY_BUFFER.
fn set_attrib_pointer(
  location: u32,
  components: i32,
  ty: AttribType,
  stride: usize,
  offset: usize,
  divisor: u32,
) {
  let pointer = offset as *const c_void;
  let stride = stride as GLsizei;

  unsafe {
    gl::EnableVertexAttribArray(location);

    match ty {
      AttribType::Double => {
        gl::VertexAttribLPointer(location, components, ty.to_glenum(), stride, pointer);
      }

      _ if ty.is_integer() => {
        gl::VertexAttribIPointer(location, components, ty.to_glenum(), stride, pointer);
      }

      _ => {
        gl::VertexAttribPointer(location, components, ty.to_glenum(), gl::FALSE, stride, pointer);
      }
    }

    gl::VertexAttribDivisor(location, divisor);
  }
}

/// Bounding box of the `vec3` positions found `offset` bytes into each element of `data`.
///
/// Returns `None` for empty data.
pub fn bounding_box<T: Copy>(
  data: &[T],
  offset: usize,
) -> Result<Option<[Point3<f32>; 2]>, MeshError> {
  let size = mem::size_of::<T>();

  if offset
    .checked_add(mem::size_of::<[f32; 3]>())
    .map_or(true, |end| end > size)
  {
    return Err(MeshError::InvalidOffset { offset, size });
  }

  let positions = data.iter().map(|v| {
    let p: [f32; 3] =
      unsafe { ptr::read_unaligned((v as *const T as *const u8).add(offset) as *const _) };
    Point3::from(p)
  });

  Ok(bounding_box_of(positions))
}

/// Bounding box of a set of points.
pub fn bounding_box_of<I>(points: I) -> Option<[Point3<f32>; 2]>
where
  I: IntoIterator<Item = Point3<f32>>,
{
  let mut points = points.into_iter();
  let first = points.next()?;

  Some(points.fold([first, first], |[mut min, mut max], p| {
    for i in 0..3 {
      min[i] = min[i].min(p[i]);
      max[i] = max[i].max(p[i]);
    }

    [min, max]
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use cgmath::{Deg, InnerSpace, Matrix4, Vector3};

  #[test]
  fn vertex_layout() {
    assert_eq!(mem::size_of::<Vertex>(), 88);

    let v = Vertex::default();
    let base = &v as *const Vertex as usize;
    assert_eq!(&v.normal as *const _ as usize - base, Vertex::OFFSET_NORMAL);
    assert_eq!(&v.tangent as *const _ as usize - base, Vertex::OFFSET_TANGENT);
    assert_eq!(&v.bitangent as *const _ as usize - base, Vertex::OFFSET_BITANGENT);
    assert_eq!(&v.color as *const _ as usize - base, Vertex::OFFSET_COLOR);
    assert_eq!(&v.tex_coord as *const _ as usize - base, Vertex::OFFSET_TEX_COORD);
  }

  #[test]
  fn vertex_defaults() {
    let v = Vertex::new(Vector3::new(1., 2., 3.), Vector3::new(0., 0., 1.));

    assert_eq!(v.position, Vector4::new(1., 2., 3., 1.));
    assert_eq!(v.tangent, Vector4::new(0., 0., 0., 1.));
    assert_eq!(v.bitangent, Vector4::new(0., 0., 0., 1.));
    assert_eq!(v.color, Vector4::new(0., 0., 0., 0.));
  }

  #[test]
  fn vertex_bitangent() {
    let v = Vertex::with_tangent(
      Vector3::new(0., 0., 0.),
      Vector3::new(0., 0., 1.),
      Vector3::new(1., 0., 0.),
      Vector3::new(0.5, 0.5, 0.),
    );

    assert_eq!(v.bitangent, Vector4::new(0., 1., 0., 1.));
    assert_eq!(v.tex_coord, Vector3::new(0.5, 0.5, 0.));
  }

  #[test]
  fn material_defaults() {
    let m = Material::default();

    assert_eq!(m.color_diffuse, Vector4::new(0., 0., 0., 1.));
    assert_eq!(m.shininess, 0.);
    assert_eq!(m.shininess_strength, 1.);
  }

  #[test]
  fn matrix_set() {
    let model = Matrix4::from_translation(Vector3::new(1., 0., 0.));
    let view = Matrix4::from_angle_y(Deg(90.));
    let proj = Matrix4::from_scale(2.);
    let m = MatrixSet::compute(model, view, proj);

    assert_eq!(m.model_view, view * model);
    assert_eq!(m.view_proj, proj * view);
    assert_eq!(m.model_view_proj, proj * view * model);

    // rigid transforms keep their rotation as normal matrix
    let r = Matrix3::from_angle_y(Deg(90.));
    for i in 0..3 {
      assert!((m.normal[i] - r[i]).magnitude() < 1e-5);
    }
  }

  #[test]
  fn normal_matrix_of_scale() {
    let n = normal_matrix(&Matrix4::from_nonuniform_scale(2., 4., 1.));

    assert!((n.x.x - 0.5).abs() < 1e-6);
    assert!((n.y.y - 0.25).abs() < 1e-6);
    assert!((n.z.z - 1.).abs() < 1e-6);
  }

  #[test]
  fn singular_normal_matrix_is_identity() {
    let n = normal_matrix(&Matrix4::from_scale(0.));
    assert_eq!(n, Matrix3::identity());
  }

  #[test]
  fn sampler_names() {
    assert_eq!(sampler_uniform_name("texture_diffuse", 0), "texture_diffuse");
    assert_eq!(sampler_uniform_name("shadow_map", 2), "shadow_map[2]");
  }

  #[test]
  fn attrib_types() {
    assert!(AttribType::UnsignedInt.is_integer());
    assert!(AttribType::Byte.is_integer());
    assert!(!AttribType::Float.is_integer());
    assert!(!AttribType::Double.is_integer());
    assert_eq!(<u16 as Index>::TYPE, IndexType::U16);
  }

  #[test]
  fn feedback_primitives() {
    assert_eq!(Mode::Point.feedback_primitive(), gl::POINTS);
    assert_eq!(Mode::LineStrip.feedback_primitive(), gl::LINES);
    assert_eq!(Mode::TriangleFan.feedback_primitive(), gl::TRIANGLES);
  }

  #[test]
  fn bounding_box_from_vertices() {
    let vertices = [
      Vertex::new(Vector3::new(1., -2., 0.), Vector3::new(0., 0., 1.)),
      Vertex::new(Vector3::new(-3., 5., 2.), Vector3::new(0., 0., 1.)),
      Vertex::new(Vector3::new(0., 0., -7.), Vector3::new(0., 0., 1.)),
    ];

    let bb = bounding_box(&vertices, Vertex::OFFSET_POSITION).unwrap().unwrap();
    assert_eq!(bb, [Point3::new(-3., -2., -7.), Point3::new(1., 5., 2.)]);

    let by_tex = bounding_box(&vertices, Vertex::OFFSET_TEX_COORD).unwrap().unwrap();
    assert_eq!(by_tex, [Point3::new(0., 0., 0.); 2]);
  }

  #[test]
  fn bounding_box_edge_cases() {
    let empty: [Vertex; 0] = [];
    assert_eq!(bounding_box(&empty, 0).unwrap(), None);

    let floats = [[1f32, 2., 3.]];
    assert!(matches!(
      bounding_box(&floats, 4),
      Err(MeshError::InvalidOffset { offset: 4, size: 12 })
    ));
  }

  #[test]
  fn bounding_box_rejects_wrapping_offset() {
    let floats = [[0f32; 4]; 2];
    assert!(matches!(
      bounding_box(&floats, usize::MAX - 5),
      Err(MeshError::InvalidOffset { size: 16, .. })
    ));
  }
}
