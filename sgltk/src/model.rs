//! Wavefront OBJ models.
//!
//! A [`Model`] is a list of [`Mesh`]es, one per object of the OBJ file, sharing a shader, a
//! camera and a set of vertex attribute names. Every mesh gets the following vertex buffers:
//!
//! | index | content | attribute |
//! |-------|---------|-----------|
//! | 0 | position, `vec4` | `pos_in` |
//! | 1 | normal, `vec3` | `norm_in` |
//! | 2 | tangent, `vec4` | `tang_in` |
//! | 3 | texture coordinates, `vec3` | `tex_coord_in0` |
//! | 4 | colour, `vec4`, only when the file has vertex colours | `col_in0` |
//!
//! Materials found in the MTL library are copied into the mesh [`Material`] and their textures
//! become auto textures of the mesh.

use cgmath::{InnerSpace, Matrix4, Point3, SquareMatrix, Vector2, Vector3, Vector4, Zero};
use gl::types::GLenum;
use log::{debug, warn};
use std::{collections::HashMap, error, fmt, mem, path::Path, rc::Rc};

use crate::buffer::Usage;
use crate::camera::{Camera, Projection};
use crate::context::Context;
use crate::mesh::{bounding_box_of, normal_matrix, AttribType, Material, Mesh, MeshError, Mode};
use crate::paths::{self, Family};
use crate::shader::Shader;
use crate::texture::{Texture, TextureError, TextureParameter};

const POSITION_BUF: usize = 0;
const NORMAL_BUF: usize = 1;
const TANGENT_BUF: usize = 2;
const TEX_COORD_BUF: usize = 3;
const COLOR_BUF: usize = 4;

/// Errors happening while loading or drawing a model.
#[non_exhaustive]
#[derive(Debug)]
pub enum ModelError {
  /// The file was not found in the model search paths.
  NotFound(String),
  /// The OBJ file could not be parsed.
  LoadError(tobj::LoadError),
  /// The file contains no geometry.
  Empty,
  /// No shader was set up.
  NoShader,
  /// A mesh operation failed.
  MeshError(MeshError),
}

impl fmt::Display for ModelError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      ModelError::NotFound(ref name) => write!(f, "model not found: {}", name),
      ModelError::LoadError(ref e) => write!(f, "cannot load model: {}", e),
      ModelError::Empty => f.write_str("model contains no mesh"),
      ModelError::NoShader => f.write_str("no shader specified"),
      ModelError::MeshError(ref e) => write!(f, "mesh error: {}", e),
    }
  }
}

impl error::Error for ModelError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      ModelError::LoadError(e) => Some(e),
      ModelError::MeshError(e) => Some(e),
      _ => None,
    }
  }
}

impl From<tobj::LoadError> for ModelError {
  fn from(e: tobj::LoadError) -> Self {
    ModelError::LoadError(e)
  }
}

impl From<MeshError> for ModelError {
  fn from(e: MeshError) -> Self {
    match e {
      MeshError::NoShader => ModelError::NoShader,
      e => ModelError::MeshError(e),
    }
  }
}

/// Names of the vertex attributes a model feeds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeNames {
  pub position: String,
  pub normal: String,
  pub tangent: String,
  /// Suffixed with the colour set index.
  pub color: String,
  /// Suffixed with the texture coordinate set index.
  pub tex_coord: String,
}

impl Default for AttributeNames {
  fn default() -> Self {
    AttributeNames {
      position: "pos_in".to_owned(),
      normal: "norm_in".to_owned(),
      tangent: "tang_in".to_owned(),
      color: "col_in".to_owned(),
      tex_coord: "tex_coord_in".to_owned(),
    }
  }
}

/// CPU-side vertex data of one OBJ object, ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
  pub positions: Vec<Vector4<f32>>,
  pub normals: Vec<Vector3<f32>>,
  pub tangents: Vec<Vector4<f32>>,
  pub tex_coords: Vec<Vector3<f32>>,
  pub colors: Option<Vec<Vector4<f32>>>,
  pub indices: Vec<u32>,
}

impl MeshData {
  /// Convert a single-indexed, triangulated tobj mesh.
  pub fn from_obj(mesh: &tobj::Mesh) -> Self {
    let positions: Vec<Vector3<f32>> = mesh
      .positions
      .chunks_exact(3)
      .map(|p| Vector3::new(p[0], p[1], p[2]))
      .collect();
    let n = positions.len();

    let normals = if mesh.normals.len() == n * 3 && n > 0 {
      mesh
        .normals
        .chunks_exact(3)
        .map(|v| Vector3::new(v[0], v[1], v[2]))
        .collect()
    } else {
      smooth_normals(&positions, &mesh.indices)
    };

    let uvs: Option<Vec<Vector2<f32>>> = if mesh.texcoords.len() == n * 2 && n > 0 {
      Some(
        mesh
          .texcoords
          .chunks_exact(2)
          .map(|t| Vector2::new(t[0], 1. - t[1]))
          .collect(),
      )
    } else {
      None
    };

    let tangents = match uvs {
      Some(ref uvs) => compute_tangents(&positions, &normals, uvs, &mesh.indices),
      None => vec![Vector4::new(0., 0., 0., 1.); n],
    };

    let tex_coords = match uvs {
      Some(uvs) => uvs.into_iter().map(|t| t.extend(0.)).collect(),
      None => vec![Vector3::zero(); n],
    };

    let colors = if mesh.vertex_color.len() == n * 3 && n > 0 {
      Some(
        mesh
          .vertex_color
          .chunks_exact(3)
          .map(|c| Vector4::new(c[0], c[1], c[2], 1.))
          .collect(),
      )
    } else {
      None
    };

    MeshData {
      positions: positions.into_iter().map(|p| p.extend(1.)).collect(),
      normals,
      tangents,
      tex_coords,
      colors,
      indices: mesh.indices.clone(),
    }
  }

  /// Bounding box of the mesh positions.
  pub fn bounding_box(&self) -> Option<[Point3<f32>; 2]> {
    bounding_box_of(self.positions.iter().map(|p| Point3::new(p.x, p.y, p.z)))
  }
}

/// Mesh material from an OBJ material.
pub fn material_from_obj(mat: &tobj::Material) -> Material {
  let rgba = |c: Option<[f32; 3]>, a: f32| c.map(|c| Vector4::new(c[0], c[1], c[2], a));
  let alpha = mat.dissolve.unwrap_or(1.);
  let default = Material::default();

  Material {
    color_ambient: rgba(mat.ambient, 1.).unwrap_or(default.color_ambient),
    color_diffuse: rgba(mat.diffuse, alpha).unwrap_or(default.color_diffuse),
    color_specular: rgba(mat.specular, 1.).unwrap_or(default.color_specular),
    shininess: mat.shininess.unwrap_or(default.shininess),
    shininess_strength: default.shininess_strength,
  }
}

/// Sampler names and file names of the textures an OBJ material references.
pub fn material_textures(mat: &tobj::Material) -> Vec<(&'static str, &str)> {
  let slots = [
    ("texture_ambient", &mat.ambient_texture),
    ("texture_diffuse", &mat.diffuse_texture),
    ("texture_specular", &mat.specular_texture),
    ("texture_normals", &mat.normal_texture),
    ("texture_shininess", &mat.shininess_texture),
  ];

  slots
    .iter()
    .filter_map(|&(name, file)| file.as_deref().map(|file| (name, file)))
    .collect()
}

/// Area-weighted vertex normals of an indexed triangle list.
pub fn smooth_normals(positions: &[Vector3<f32>], indices: &[u32]) -> Vec<Vector3<f32>> {
  let mut normals = vec![Vector3::zero(); positions.len()];

  for tri in indices.chunks_exact(3) {
    let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];

    if a.max(b).max(c) >= positions.len() {
      continue;
    }

    // not normalized: larger faces weigh more
    let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
    normals[a] += n;
    normals[b] += n;
    normals[c] += n;
  }

  normals
    .into_iter()
    .map(|n| {
      if n.magnitude2() > 0. {
        n.normalize()
      } else {
        n
      }
    })
    .collect()
}

/// Per-vertex tangents from texture coordinates.
///
/// The `w` component carries the handedness of the tangent frame. Vertices without usable
/// texture coordinates get `(0, 0, 0, 1)`.
pub fn compute_tangents(
  positions: &[Vector3<f32>],
  normals: &[Vector3<f32>],
  uvs: &[Vector2<f32>],
  indices: &[u32],
) -> Vec<Vector4<f32>> {
  let n = positions.len();
  let mut tan = vec![Vector3::zero(); n];
  let mut bitan = vec![Vector3::zero(); n];

  for tri in indices.chunks_exact(3) {
    let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];

    if a.max(b).max(c) >= n.min(uvs.len()) {
      continue;
    }

    let e1 = positions[b] - positions[a];
    let e2 = positions[c] - positions[a];
    let d1 = uvs[b] - uvs[a];
    let d2 = uvs[c] - uvs[a];

    let det = d1.x * d2.y - d2.x * d1.y;
    if det.abs() <= f32::EPSILON {
      continue;
    }

    let r = 1. / det;
    let t = (e1 * d2.y - e2 * d1.y) * r;
    let bt = (e2 * d1.x - e1 * d2.x) * r;

    for &i in &[a, b, c] {
      tan[i] += t;
      bitan[i] += bt;
    }
  }

  (0..n)
    .map(|i| {
      let normal = normals.get(i).copied().unwrap_or_else(Vector3::zero);
      let t = tan[i] - normal * normal.dot(tan[i]);

      if t.magnitude2() <= f32::EPSILON {
        return Vector4::new(0., 0., 0., 1.);
      }

      let w = if normal.cross(t).dot(bitan[i]) < 0. { -1. } else { 1. };
      t.normalize().extend(w)
    })
    .collect()
}

#[derive(Clone, Copy, Debug, Default)]
struct MeshLayout {
  has_colors: bool,
  // vertex buffer indices of the instanced model and normal matrices
  instance_buffers: Option<(usize, usize)>,
}

/// A model made of several meshes.
#[derive(Debug)]
pub struct Model {
  ctx: Context,
  meshes: Vec<Mesh>,
  layouts: Vec<MeshLayout>,
  mesh_map: HashMap<String, usize>,
  shader: Option<Rc<Shader>>,
  view_matrix: Matrix4<f32>,
  projection_matrix: Matrix4<f32>,
  names: AttributeNames,
  bounding_box: [Point3<f32>; 2],
}

impl Model {
  /// An empty model.
  pub fn new(ctx: &Context) -> Self {
    Model {
      ctx: ctx.clone(),
      meshes: Vec::new(),
      layouts: Vec::new(),
      mesh_map: HashMap::new(),
      shader: None,
      view_matrix: Matrix4::identity(),
      projection_matrix: Matrix4::identity(),
      names: AttributeNames::default(),
      bounding_box: [Point3::new(0., 0., 0.); 2],
    }
  }

  /// Add a directory to the model search paths.
  pub fn add_path(path: &str) {
    paths::with_paths(Family::Model, |p| p.add_path(path));
  }

  /// Load the OBJ file `name`, found through the model search paths, replacing the current
  /// meshes.
  pub fn load(&mut self, name: &str) -> Result<(), ModelError> {
    let path =
      paths::resolve(Family::Model, name).ok_or_else(|| ModelError::NotFound(name.to_owned()))?;

    let options = tobj::LoadOptions {
      triangulate: true,
      single_index: true,
      ..Default::default()
    };

    let (models, materials) = tobj::load_obj(&path, &options)?;

    let materials = materials.unwrap_or_else(|e| {
      warn!("cannot load materials of {}: {}", path.display(), e);
      Vec::new()
    });

    if models.is_empty() {
      return Err(ModelError::Empty);
    }

    let dir = paths::parent_dir(&path);

    self.meshes.clear();
    self.layouts.clear();
    self.mesh_map.clear();

    for (i, model) in models.iter().enumerate() {
      let data = MeshData::from_obj(&model.mesh);
      let material = model.mesh.material_id.and_then(|id| materials.get(id));
      let mesh = self.create_mesh(&data, material, &dir);

      let mesh_name = if model.name.is_empty() {
        format!("mesh_{}", i)
      } else {
        model.name.clone()
      };

      debug!(
        "loaded mesh {} ({} vertices, {} indices)",
        mesh_name,
        data.positions.len(),
        data.indices.len()
      );

      self.mesh_map.insert(mesh_name, self.meshes.len());
      self.layouts.push(MeshLayout {
        has_colors: data.colors.is_some(),
        instance_buffers: None,
      });
      self.meshes.push(mesh);
    }

    self.compute_bounding_box();

    if self.shader.is_some() {
      for i in 0..self.meshes.len() {
        self.set_vertex_attributes(i);
      }
    }

    Ok(())
  }

  fn create_mesh(&self, data: &MeshData, material: Option<&tobj::Material>, dir: &str) -> Mesh {
    let mut mesh = Mesh::new(&self.ctx);

    mesh.attach_vertex_buffer(&data.positions, Usage::StaticDraw);
    mesh.attach_vertex_buffer(&data.normals, Usage::StaticDraw);
    mesh.attach_vertex_buffer(&data.tangents, Usage::StaticDraw);
    mesh.attach_vertex_buffer(&data.tex_coords, Usage::StaticDraw);

    if let Some(ref colors) = data.colors {
      mesh.attach_vertex_buffer(colors, Usage::StaticDraw);
    }

    mesh.attach_index_buffer(&data.indices);

    if let Some(bb) = data.bounding_box() {
      mesh.set_bounding_box(bb);
    }

    if let Some(shader) = &self.shader {
      mesh.setup_shader(shader.clone());
    }
    mesh.setup_camera(self.view_matrix, self.projection_matrix);

    if let Some(mat) = material {
      mesh.material = material_from_obj(mat);

      for (sampler, file) in material_textures(mat) {
        match self.load_texture(dir, file) {
          Ok(texture) => mesh.auto_textures.push((sampler.to_owned(), texture, 0)),
          Err(e) => warn!("cannot load texture {}: {}", file, e),
        }
      }
    }

    mesh
  }

  // Textures are shared through the context registry, keyed by path.
  fn load_texture(&self, dir: &str, file: &str) -> Result<Rc<Texture>, TextureError> {
    let relative = format!("{}{}", dir, file);
    let key = if Path::new(&relative).exists() {
      relative
    } else {
      file.to_owned()
    };

    if let Some(texture) = self.ctx.find_texture(&key) {
      return Ok(texture);
    }

    let texture = Rc::new(Texture::from_path_2d(&self.ctx, &key)?);
    self.ctx.store_texture(key, texture.clone());

    Ok(texture)
  }

  /// Name of the position attribute.
  pub fn set_position_name(&mut self, name: &str) {
    self.names.position = name.to_owned();
  }

  /// Name of the normal attribute.
  pub fn set_normal_name(&mut self, name: &str) {
    self.names.normal = name.to_owned();
  }

  /// Name of the tangent attribute.
  pub fn set_tangent_name(&mut self, name: &str) {
    self.names.tangent = name.to_owned();
  }

  /// Name of the color attribute.
  pub fn set_color_name(&mut self, name: &str) {
    self.names.color = name.to_owned();
  }

  /// Name of the texture coordinates attribute.
  pub fn set_texture_coordinates_name(&mut self, name: &str) {
    self.names.tex_coord = name.to_owned();
  }

  /// Vertex attribute names used by [`Model::setup_shader`].
  pub fn attribute_names(&self) -> &AttributeNames {
    &self.names
  }

  /// Use `shader` for every mesh and map the vertex attributes onto it.
  pub fn setup_shader(&mut self, shader: Rc<Shader>) {
    for i in 0..self.meshes.len() {
      self.meshes[i].setup_shader(shader.clone());
      self.set_vertex_attributes(i);
    }

    self.shader = Some(shader);
  }

  // Attributes the shader does not use are skipped.
  fn set_vertex_attributes(&mut self, i: usize) {
    let names = &self.names;
    let mesh = &mut self.meshes[i];

    let mut attributes = vec![
      (names.position.clone(), POSITION_BUF, 4),
      (names.normal.clone(), NORMAL_BUF, 3),
      (names.tangent.clone(), TANGENT_BUF, 4),
      (format!("{}0", names.tex_coord), TEX_COORD_BUF, 3),
    ];

    if self.layouts[i].has_colors {
      attributes.push((format!("{}0", names.color), COLOR_BUF, 4));
    }

    for (name, buffer, components) in attributes {
      let set = mesh.set_vertex_attribute(&name, buffer, components, AttribType::Float, 0, 0, 0);

      if let Err(e) = set {
        debug!("model attribute skipped: {}", e);
      }
    }
  }

  /// Copy the view and projection matrices into every mesh.
  pub fn setup_camera(&mut self, view: Matrix4<f32>, projection: Matrix4<f32>) {
    self.view_matrix = view;
    self.projection_matrix = projection;

    for mesh in &mut self.meshes {
      mesh.setup_camera(view, projection);
    }
  }

  /// Copy the camera matrices into every mesh.
  pub fn setup_camera_from<P>(&mut self, camera: &Camera<P>)
  where
    P: Projection,
  {
    self.setup_camera(camera.view_matrix, camera.projection_matrix);
  }

  /// Attach a user texture to every mesh.
  pub fn attach_texture(&mut self, name: &str, texture: Rc<Texture>, index: u32) {
    for mesh in &mut self.meshes {
      mesh.attach_texture(name, texture.clone(), index);
    }
  }

  /// Set a parameter on every texture loaded from the materials.
  pub fn set_texture_parameter(&self, name: GLenum, value: &TextureParameter) {
    for mesh in &self.meshes {
      for (_, texture, _) in &mesh.auto_textures {
        texture.set_parameter(name, value);
      }
    }
  }

  /// Upload one model matrix per instance, with the matching normal matrices.
  ///
  /// They feed the attributes named after the meshes' model and normal matrix uniform names, as
  /// four `vec4` (resp. three `vec3`) consecutive locations with a divisor of 1.
  pub fn setup_instanced_matrix(
    &mut self,
    matrices: &[Matrix4<f32>],
    usage: Usage) -> Result<(), ModelError> {
    if self.shader.is_none() {
      return Err(ModelError::NoShader);
    }

    let normals: Vec<_> = matrices.iter().map(normal_matrix).collect();

    for (mesh, layout) in self.meshes.iter_mut().zip(&mut self.layouts) {
      let buffers = match layout.instance_buffers {
        Some((model_buf, normal_buf)) => {
          mesh.replace_buffer_data(model_buf, matrices)?;
          mesh.replace_buffer_data(normal_buf, &normals)?;
          (model_buf, normal_buf)
        }

        None => (
          mesh.attach_vertex_buffer(matrices, usage),
          mesh.attach_vertex_buffer(&normals, usage),
        ),
      };

      layout.instance_buffers = Some(buffers);
    }

    self.set_instanced_matrix_attributes()
  }

  /// Map the instanced matrix attributes again, e.g. after a shader change.
  pub fn set_instanced_matrix_attributes(&mut self) -> Result<(), ModelError> {
    let shader = self.shader.clone().ok_or(ModelError::NoShader)?;
    let vec4 = mem::size_of::<Vector4<f32>>();
    let vec3 = mem::size_of::<Vector3<f32>>();

    for (mesh, layout) in self.meshes.iter_mut().zip(&self.layouts) {
      let (model_buf, normal_buf) = match layout.instance_buffers {
        Some(buffers) => buffers,
        None => continue,
      };

      let names = mesh.uniform_names().clone();

      if let Some(loc) = shader.get_attribute_location(&names.model_matrix) {
        for i in 0..4 {
          mesh.set_vertex_attribute_at(
            loc + i as u32,
            model_buf,
            4,
            AttribType::Float,
            4 * vec4,
            i * vec4,
            1,
          )?;
        }
      }

      if let Some(loc) = shader.get_attribute_location(&names.normal_matrix) {
        for i in 0..3 {
          mesh.set_vertex_attribute_at(
            loc + i as u32,
            normal_buf,
            3,
            AttribType::Float,
            3 * vec3,
            i * vec3,
            1,
          )?;
        }
      }
    }

    Ok(())
  }

  /// Draw every mesh; `model_matrix` is applied on top of each mesh's own model matrix.
  pub fn draw(&self, model_matrix: Option<&Matrix4<f32>>) -> Result<(), ModelError> {
    for mesh in &self.meshes {
      let matrix = model_matrix.map(|m| m * mesh.model_matrix);
      mesh.draw(Mode::Triangle, 0, matrix.as_ref())?;
    }

    Ok(())
  }

  /// Draw `instances` copies of every mesh.
  pub fn draw_instanced(&self, instances: usize) -> Result<(), ModelError> {
    if instances == 0 {
      return Ok(());
    }

    for mesh in &self.meshes {
      mesh.draw_instanced(Mode::Triangle, 0, instances)?;
    }

    Ok(())
  }

  fn compute_bounding_box(&mut self) {
    let corners = self.meshes.iter().flat_map(|m| m.bounding_box().to_vec());

    if let Some(bb) = bounding_box_of(corners) {
      self.bounding_box = bb;
    }
  }

  /// Minimum and maximum corners enclosing every mesh.
  pub fn bounding_box(&self) -> [Point3<f32>; 2] {
    self.bounding_box
  }

  /// Meshes, in load order.
  pub fn meshes(&self) -> &[Mesh] {
    &self.meshes
  }

  /// Meshes, in load order.
  pub fn meshes_mut(&mut self) -> &mut [Mesh] {
    &mut self.meshes
  }

  /// Index of every mesh by OBJ object name; unnamed objects are called `mesh_<n>`.
  pub fn mesh_map(&self) -> &HashMap<String, usize> {
    &self.mesh_map
  }

  /// Mesh built from the OBJ object `name`.
  pub fn mesh(&self, name: &str) -> Option<&Mesh> {
    self.mesh_map.get(name).and_then(|&i| self.meshes.get(i))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  fn parse(obj: &str) -> Vec<tobj::Model> {
    let options = tobj::LoadOptions {
      triangulate: true,
      single_index: true,
      ..Default::default()
    };

    let (models, _) = tobj::load_obj_buf(&mut Cursor::new(obj), &options, |_| {
      Ok((Vec::new(), Default::default()))
    })
    .unwrap();

    models
  }

  const QUAD: &str = "o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

  fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
    (a - b).magnitude() < 1e-5
  }

  #[test]
  fn quad_is_triangulated() {
    let models = parse(QUAD);
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "quad");

    let data = MeshData::from_obj(&models[0].mesh);
    assert_eq!(data.positions.len(), 4);
    assert_eq!(data.indices.len(), 6);
    assert_eq!(data.positions[2], Vector4::new(1., 1., 0., 1.));
    assert!(data.colors.is_none());
  }

  #[test]
  fn missing_normals_are_generated() {
    let data = MeshData::from_obj(&parse(QUAD)[0].mesh);

    for n in &data.normals {
      assert!(close(*n, Vector3::new(0., 0., 1.)));
    }
  }

  #[test]
  fn tex_coords_are_flipped() {
    let data = MeshData::from_obj(&parse(QUAD)[0].mesh);

    assert_eq!(data.tex_coords[0], Vector3::new(0., 1., 0.));
    assert_eq!(data.tex_coords[2], Vector3::new(1., 0., 0.));
  }

  #[test]
  fn tangents_follow_u() {
    let positions = [
      Vector3::new(0., 0., 0.),
      Vector3::new(1., 0., 0.),
      Vector3::new(0., 1., 0.),
    ];
    let normals = [Vector3::new(0., 0., 1.); 3];
    let uvs = [Vector2::new(0., 0.), Vector2::new(1., 0.), Vector2::new(0., 1.)];

    let tangents = compute_tangents(&positions, &normals, &uvs, &[0, 1, 2]);
    for t in tangents {
      assert!(close(t.truncate(), Vector3::new(1., 0., 0.)));
      assert_eq!(t.w, 1.);
    }

    // mirrored texture space
    let mirrored = [Vector2::new(0., 0.), Vector2::new(1., 0.), Vector2::new(0., -1.)];
    let tangents = compute_tangents(&positions, &normals, &mirrored, &[0, 1, 2]);
    assert_eq!(tangents[0].w, -1.);
  }

  #[test]
  fn degenerate_uvs_give_default_tangent() {
    let positions = [Vector3::new(0., 0., 0.), Vector3::new(1., 0., 0.), Vector3::new(0., 1., 0.)];
    let normals = [Vector3::new(0., 0., 1.); 3];
    let uvs = [Vector2::new(0.5, 0.5); 3];

    let tangents = compute_tangents(&positions, &normals, &uvs, &[0, 1, 2]);
    assert_eq!(tangents[1], Vector4::new(0., 0., 0., 1.));
  }

  #[test]
  fn smooth_normals_average_faces() {
    // two faces folded along the x axis
    let positions = [
      Vector3::new(0., 0., 0.),
      Vector3::new(1., 0., 0.),
      Vector3::new(0., 1., 0.),
      Vector3::new(0., 0., 1.),
    ];
    let normals = smooth_normals(&positions, &[0, 1, 2, 0, 3, 1]);

    assert!(close(normals[2], Vector3::new(0., 0., 1.)));
    assert!(close(normals[3], Vector3::new(0., 1., 0.)));
    let shared = Vector3::new(0., 1., 1.).normalize();
    assert!(close(normals[0], shared));
    assert!(close(normals[1], shared));
  }

  #[test]
  fn out_of_range_indices_are_ignored() {
    let positions = [Vector3::new(0., 0., 0.)];
    let normals = smooth_normals(&positions, &[0, 1, 2]);

    assert_eq!(normals, vec![Vector3::zero()]);
  }

  #[test]
  fn vertex_colors() {
    let obj = "v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nf 1 2 3\n";
    let data = MeshData::from_obj(&parse(obj)[0].mesh);

    let colors = data.colors.unwrap();
    assert_eq!(colors[1], Vector4::new(0., 1., 0., 1.));
  }

  #[test]
  fn bounding_box_of_data() {
    let data = MeshData::from_obj(&parse(QUAD)[0].mesh);

    assert_eq!(
      data.bounding_box(),
      Some([Point3::new(0., 0., 0.), Point3::new(1., 1., 0.)])
    );
  }

  #[test]
  fn materials() {
    let mat = tobj::Material {
      diffuse: Some([1., 0.5, 0.]),
      dissolve: Some(0.5),
      shininess: Some(32.),
      diffuse_texture: Some("wood.png".to_owned()),
      normal_texture: Some("wood_n.png".to_owned()),
      ..Default::default()
    };

    let m = material_from_obj(&mat);
    assert_eq!(m.color_diffuse, Vector4::new(1., 0.5, 0., 0.5));
    assert_eq!(m.color_ambient, Vector4::new(0., 0., 0., 1.));
    assert_eq!(m.shininess, 32.);

    assert_eq!(
      material_textures(&mat),
      vec![("texture_diffuse", "wood.png"), ("texture_normals", "wood_n.png")]
    );
  }
}
