//! Cameras and projections.
//!
//! A [`Camera`] is an orientation (position, direction, up and right vectors) paired with a
//! [`Projection`]. Three projections are provided:
//!
//! - [`Perspective`], a classic finite perspective frustum;
//! - [`Orthographic`], a box;
//! - [`InfinitePerspective`], a perspective frustum without far plane.
//!
//! The view and projection matrices are cached on the camera and only recomputed when
//! [`Camera::update_view_matrix`] or [`Camera::update_projection_matrix`] is called.

use cgmath::{
  ortho, perspective, EuclideanSpace, InnerSpace, Matrix3, Matrix4, Point3, Rad, SquareMatrix,
  Vector3, Vector4,
};
use std::f32::consts::PI;

/// Projection parameters a [`Camera`] can turn into a matrix.
pub trait Projection {
  /// Projection matrix for the current parameters.
  fn matrix(&self) -> Matrix4<f32>;

  /// Change the viewport size the projection is computed for.
  fn set_size(&mut self, width: f32, height: f32);

  /// Distance to the near plane.
  fn near(&self) -> f32;

  /// Distance to the far plane; `None` when the projection has none.
  fn far(&self) -> Option<f32>;
}

/// Perspective projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perspective {
  /// Vertical field of view, in radians.
  pub fovy: f32,
  pub width: f32,
  pub height: f32,
  pub near: f32,
  pub far: f32,
}

impl Default for Perspective {
  /// Defaults:
  ///
  /// - `fovy`: 70°.
  /// - `width`, `height`: `1`.
  /// - `near`: `0.1`.
  /// - `far`: `800`.
  fn default() -> Self {
    Perspective {
      fovy: 70. * PI / 180.,
      width: 1.,
      height: 1.,
      near: 0.1,
      far: 800.,
    }
  }
}

impl Projection for Perspective {
  fn matrix(&self) -> Matrix4<f32> {
    perspective(Rad(self.fovy), self.width / self.height, self.near, self.far)
  }

  fn set_size(&mut self, width: f32, height: f32) {
    self.width = width;
    self.height = height;
  }

  fn near(&self) -> f32 {
    self.near
  }

  fn far(&self) -> Option<f32> {
    Some(self.far)
  }
}

/// Orthographic projection centred on the view axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orthographic {
  pub width: f32,
  pub height: f32,
  pub near: f32,
  pub far: f32,
}

impl Default for Orthographic {
  /// Defaults:
  ///
  /// - `width`, `height`: `1`.
  /// - `near`: `0.1`.
  /// - `far`: `800`.
  fn default() -> Self {
    Orthographic {
      width: 1.,
      height: 1.,
      near: 0.1,
      far: 800.,
    }
  }
}

impl Projection for Orthographic {
  fn matrix(&self) -> Matrix4<f32> {
    let hw = 0.5 * self.width;
    let hh = 0.5 * self.height;
    ortho(-hw, hw, -hh, hh, self.near, self.far)
  }

  fn set_size(&mut self, width: f32, height: f32) {
    self.width = width;
    self.height = height;
  }

  fn near(&self) -> f32 {
    self.near
  }

  fn far(&self) -> Option<f32> {
    Some(self.far)
  }
}

/// Perspective projection with the far plane at infinity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InfinitePerspective {
  /// Vertical field of view, in radians.
  pub fovy: f32,
  pub width: f32,
  pub height: f32,
  pub near: f32,
}

impl Default for InfinitePerspective {
  /// Same defaults as [`Perspective`], without the far plane.
  fn default() -> Self {
    let p = Perspective::default();

    InfinitePerspective {
      fovy: p.fovy,
      width: p.width,
      height: p.height,
      near: p.near,
    }
  }
}

impl Projection for InfinitePerspective {
  fn matrix(&self) -> Matrix4<f32> {
    let range = (0.5 * self.fovy).tan() * self.near;
    let aspect = self.width / self.height;
    let (left, right) = (-range * aspect, range * aspect);
    let (bottom, top) = (-range, range);

    #[rustfmt::skip]
    let m = Matrix4::new(
      2. * self.near / (right - left), 0., 0., 0.,
      0., 2. * self.near / (top - bottom), 0., 0.,
      0., 0., -1., -1.,
      0., 0., -2. * self.near, 0.,
    );

    m
  }

  fn set_size(&mut self, width: f32, height: f32) {
    self.width = width;
    self.height = height;
  }

  fn near(&self) -> f32 {
    self.near
  }

  fn far(&self) -> Option<f32> {
    None
  }
}

/// A camera with a projection of type `P`.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera<P> {
  pub position: Point3<f32>,
  pub direction: Vector3<f32>,
  pub up: Vector3<f32>,
  /// Always `cross(direction, up)` after construction; rotations keep it in sync.
  pub right: Vector3<f32>,
  pub view_matrix: Matrix4<f32>,
  pub projection_matrix: Matrix4<f32>,
  pub projection: P,
}

pub type PerspectiveCamera = Camera<Perspective>;
pub type OrthographicCamera = Camera<Orthographic>;
pub type InfinitePerspectiveCamera = Camera<InfinitePerspective>;

impl<P> Default for Camera<P>
where
  P: Projection + Default,
{
  fn default() -> Self {
    Camera::new(P::default())
  }
}

impl<P> Camera<P>
where
  P: Projection,
{
  /// Camera at the origin, looking down −Z with +Y up.
  pub fn new(projection: P) -> Self {
    Self::with_orientation(
      Point3::new(0., 0., 0.),
      Vector3::new(0., 0., -1.),
      Vector3::new(0., 1., 0.),
      projection,
    )
  }

  /// Camera at `position`, looking along `direction`.
  pub fn with_orientation(
    position: Point3<f32>,
    direction: Vector3<f32>,
    up: Vector3<f32>,
    projection: P,
  ) -> Self {
    let mut camera = Camera {
      position,
      direction,
      up,
      right: direction.cross(up),
      view_matrix: Matrix4::identity(),
      projection_matrix: Matrix4::identity(),
      projection,
    };

    camera.update_view_matrix();
    camera.update_projection_matrix();
    camera
  }

  /// Move along the up vector.
  pub fn move_up(&mut self, delta: f32) {
    self.position += self.up.normalize() * delta;
  }

  /// Move along the right vector.
  pub fn move_right(&mut self, delta: f32) {
    self.position += self.right.normalize() * delta;
  }

  /// Move along the view direction.
  pub fn move_forward(&mut self, delta: f32) {
    self.position += self.direction.normalize() * delta;
  }

  /// Translate the camera.
  pub fn move_by(&mut self, v: Vector3<f32>) {
    self.position += v;
  }

  /// Rotate around the up vector.
  pub fn yaw(&mut self, angle: f32) {
    let rot = Matrix3::from_axis_angle(self.up.normalize(), Rad(angle));
    self.direction = rot * self.direction;
    self.right = rot * self.right;
  }

  /// Rotate around the view direction.
  pub fn roll(&mut self, angle: f32) {
    let rot = Matrix3::from_axis_angle(self.direction.normalize(), Rad(angle));
    self.up = rot * self.up;
    self.right = rot * self.right;
  }

  /// Rotate around the right vector.
  pub fn pitch(&mut self, angle: f32) {
    let rot = Matrix3::from_axis_angle(self.right.normalize(), Rad(angle));
    self.direction = rot * self.direction;
    self.up = rot * self.up;
  }

  /// Recompute the view matrix from position, direction and up.
  pub fn update_view_matrix(&mut self) {
    self.view_matrix = Matrix4::look_at_rh(self.position, self.position + self.direction, self.up);
  }

  /// Recompute the projection matrix from the projection parameters.
  pub fn update_projection_matrix(&mut self) {
    self.projection_matrix = self.projection.matrix();
  }

  /// Change the viewport size and recompute the projection matrix.
  pub fn set_size(&mut self, width: f32, height: f32) {
    self.projection.set_size(width, height);
    self.update_projection_matrix();
  }

  /// World-space corners of the view frustum.
  ///
  /// The order is near bottom-left, near bottom-right, near top-right, near top-left, then the
  /// same four on the far plane. Projections without a far plane only yield the near corners.
  pub fn calculate_frustum_points(&self) -> Vec<Point3<f32>> {
    let inv = self.inverse_view_projection();
    let mut points: Vec<_> = NDC_CORNERS.iter().map(|&(x, y)| unproject(&inv, x, y, -1.)).collect();

    if self.projection.far().is_some() {
      points.extend(NDC_CORNERS.iter().map(|&(x, y)| unproject(&inv, x, y, 1.)));
    }

    points
  }

  /// Signed distances from `point` to every plane of the frustum; positive values are outside.
  pub fn calculate_frustum_distance(&self, point: Point3<f32>) -> FrustumDistance {
    let inv = self.inverse_view_projection();
    let dir = self.direction.normalize();

    // near corners plus a second set halfway through NDC depth; both exist for every projection
    let near: Vec<_> = NDC_CORNERS.iter().map(|&(x, y)| unproject(&inv, x, y, -1.)).collect();
    let mid: Vec<_> = NDC_CORNERS.iter().map(|&(x, y)| unproject(&inv, x, y, 0.)).collect();
    let inside = unproject(&inv, 0., 0., 0.);

    let side = |a: usize, b: usize| {
      // plane through near[a], near[b] and mid[b]
      let normal = (mid[b] - near[b]).cross(near[a] - near[b]);
      plane_distance(point, near[b], normal, inside)
    };

    let near_center = self.position + dir * self.projection.near();
    let far = self.projection.far().map(|far| {
      let far_center = self.position + dir * far;
      (point - far_center).dot(dir)
    });

    FrustumDistance {
      far,
      near: (point - near_center).dot(-dir),
      left: side(0, 3),
      right: side(1, 2),
      top: side(2, 3),
      bottom: side(0, 1),
    }
  }

  fn inverse_view_projection(&self) -> Matrix4<f32> {
    (self.projection_matrix * self.view_matrix)
      .invert()
      .unwrap_or_else(Matrix4::identity)
  }
}

impl OrthographicCamera {
  /// Turn this camera into the tightest box, seen along `direction`, that contains the frustum
  /// of `camera`, grown by `offset` on every side.
  ///
  /// This is typically used to fit a shadow map to the view frustum.
  pub fn calculate_bounding_frustum<P>(
    &mut self,
    camera: &Camera<P>,
    direction: Vector3<f32>,
    offset: f32,
  ) where
    P: Projection,
  {
    let forward = direction.normalize();
    let mut right = forward.cross(Vector3::unit_y());
    if right.magnitude2() <= f32::EPSILON {
      right = forward.cross(Vector3::unit_z());
    }
    let right = right.normalize();
    let up = right.cross(forward).normalize();

    let look = Matrix4::look_at_rh(Point3::origin(), Point3::from_vec(forward), up);
    let look_inv = look.invert().unwrap_or_else(Matrix4::identity);

    let points = camera.calculate_frustum_points();
    let mut min = Vector3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
    let mut max = Vector3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);

    for p in points {
      let p = look * p.to_homogeneous();

      for i in 0..3 {
        min[i] = min[i].min(p[i]);
        max[i] = max[i].max(p[i]);
      }
    }

    let width = (max.x - min.x).abs();
    let height = (max.y - min.y).abs();
    let depth = (max.z - min.z).abs();
    let center = (min + max) * 0.5;

    self.position = Point3::from_homogeneous(look_inv * center.extend(1.));
    self.direction = forward;
    self.up = up;
    self.right = forward.cross(up);

    self.projection = Orthographic {
      width: width + 2. * offset,
      height: height + 2. * offset,
      near: -0.5 * depth - offset,
      far: 0.5 * depth + offset,
    };

    self.update_view_matrix();
    self.update_projection_matrix();
  }
}

/// Signed distances of a point to the planes of a camera frustum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrustumDistance {
  /// `None` for projections without a far plane.
  pub far: Option<f32>,
  pub near: f32,
  pub left: f32,
  pub right: f32,
  pub top: f32,
  pub bottom: f32,
}

impl FrustumDistance {
  /// Whether the point lies inside the frustum or on its boundary.
  pub fn contains(&self) -> bool {
    self.far.map_or(true, |d| d <= 0.)
      && self.near <= 0.
      && self.left <= 0.
      && self.right <= 0.
      && self.top <= 0.
      && self.bottom <= 0.
  }
}

const NDC_CORNERS: [(f32, f32); 4] = [(-1., -1.), (1., -1.), (1., 1.), (-1., 1.)];

fn unproject(inv: &Matrix4<f32>, x: f32, y: f32, z: f32) -> Point3<f32> {
  let p = inv * Vector4::new(x, y, z, 1.);
  Point3::from_homogeneous(p)
}

/// Distance of `p` to the plane through `origin` with `normal`, oriented away from `inside`.
fn plane_distance(
  p: Point3<f32>,
  origin: Point3<f32>,
  normal: Vector3<f32>,
  inside: Point3<f32>,
) -> f32 {
  let mut n = normal.normalize();

  if (inside - origin).dot(n) > 0. {
    n = -n;
  }

  (p - origin).dot(n)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::f32::consts::FRAC_PI_2;

  fn approx_v(a: Vector3<f32>, b: Vector3<f32>) -> bool {
    (a - b).magnitude() < 1e-4
  }

  fn approx_p(a: Point3<f32>, b: Point3<f32>, eps: f32) -> bool {
    (a - b).magnitude() < eps
  }

  fn square_camera() -> PerspectiveCamera {
    Camera::new(Perspective {
      fovy: FRAC_PI_2,
      width: 1.,
      height: 1.,
      near: 1.,
      far: 100.,
    })
  }

  #[test]
  fn default_orientation() {
    let cam = PerspectiveCamera::default();

    assert_eq!(cam.position, Point3::new(0., 0., 0.));
    assert_eq!(cam.direction, Vector3::new(0., 0., -1.));
    assert_eq!(cam.up, Vector3::new(0., 1., 0.));
    assert_eq!(cam.right, Vector3::new(1., 0., 0.));
    assert_eq!(cam.view_matrix, Matrix4::identity());
  }

  #[test]
  fn moves_along_axes() {
    let mut cam = PerspectiveCamera::default();

    cam.move_forward(5.);
    cam.move_right(2.);
    cam.move_up(-1.);
    cam.move_by(Vector3::new(0., 0., 1.));

    assert!(approx_p(cam.position, Point3::new(2., -1., -4.), 1e-5));
  }

  #[test]
  fn yaw_turns_left() {
    let mut cam = PerspectiveCamera::default();
    cam.yaw(FRAC_PI_2);

    assert!(approx_v(cam.direction, Vector3::new(-1., 0., 0.)));
    assert!(approx_v(cam.right, Vector3::new(0., 0., -1.)));
    assert!(approx_v(cam.up, Vector3::new(0., 1., 0.)));
  }

  #[test]
  fn pitch_and_roll_keep_frame_orthogonal() {
    let mut cam = PerspectiveCamera::default();
    cam.pitch(0.3);
    cam.roll(-1.1);
    cam.yaw(0.7);

    assert!(cam.direction.dot(cam.up).abs() < 1e-5);
    assert!(cam.direction.dot(cam.right).abs() < 1e-5);
    assert!(cam.up.dot(cam.right).abs() < 1e-5);
    assert!(approx_v(cam.right, cam.direction.cross(cam.up)));
  }

  #[test]
  fn pitch_up() {
    let mut cam = PerspectiveCamera::default();
    cam.pitch(FRAC_PI_2);

    assert!(approx_v(cam.direction, Vector3::new(0., 1., 0.)));
    assert!(approx_v(cam.up, Vector3::new(0., 0., 1.)));
  }

  #[test]
  fn set_size_updates_projection() {
    let mut cam = PerspectiveCamera::default();
    let before = cam.projection_matrix;

    cam.set_size(1920., 1080.);

    assert_eq!(cam.projection.width, 1920.);
    assert_eq!(cam.projection.height, 1080.);
    assert_ne!(cam.projection_matrix, before);
    assert_eq!(cam.projection_matrix, cam.projection.matrix());
  }

  #[test]
  fn perspective_frustum_points() {
    let cam = square_camera();
    let points = cam.calculate_frustum_points();

    assert_eq!(points.len(), 8);
    assert!(approx_p(points[0], Point3::new(-1., -1., -1.), 1e-3));
    assert!(approx_p(points[2], Point3::new(1., 1., -1.), 1e-3));
    assert!(approx_p(points[4], Point3::new(-100., -100., -100.), 0.1));
    assert!(approx_p(points[6], Point3::new(100., 100., -100.), 0.1));
  }

  #[test]
  fn infinite_frustum_has_no_far_plane() {
    let cam = InfinitePerspectiveCamera::new(InfinitePerspective {
      fovy: FRAC_PI_2,
      width: 1.,
      height: 1.,
      near: 1.,
    });

    let points = cam.calculate_frustum_points();
    assert_eq!(points.len(), 4);
    assert!(approx_p(points[1], Point3::new(1., -1., -1.), 1e-3));

    let far_away = cam.calculate_frustum_distance(Point3::new(0., 0., -1e5));
    assert_eq!(far_away.far, None);
    assert!(far_away.contains());
  }

  #[test]
  fn frustum_distance_inside_and_outside() {
    let cam = square_camera();

    let d = cam.calculate_frustum_distance(Point3::new(0., 0., -10.));
    assert!(d.contains());
    assert!((d.near - -9.).abs() < 1e-3);
    assert!((d.far.unwrap() - -90.).abs() < 1e-3);

    let behind = cam.calculate_frustum_distance(Point3::new(0., 0., 10.));
    assert!(behind.near > 0.);
    assert!(!behind.contains());

    let beyond = cam.calculate_frustum_distance(Point3::new(0., 0., -150.));
    assert!(beyond.far.unwrap() > 0.);
    assert!(!beyond.contains());

    let right = cam.calculate_frustum_distance(Point3::new(20., 0., -10.));
    assert!(right.right > 0.);
    assert!(right.left < 0.);
    assert!(!right.contains());

    let below = cam.calculate_frustum_distance(Point3::new(0., -20., -10.));
    assert!(below.bottom > 0.);
    assert!(below.top < 0.);
  }

  #[test]
  fn frustum_distance_follows_camera() {
    let mut cam = square_camera();
    cam.position = Point3::new(0., 0., 50.);
    cam.update_view_matrix();

    assert!(cam.calculate_frustum_distance(Point3::new(0., 0., 40.)).contains());
    assert!(!cam.calculate_frustum_distance(Point3::new(0., 0., -60.)).contains());
  }

  #[test]
  fn side_plane_distance_is_euclidean() {
    let cam = square_camera();
    // right plane of a 90° frustum is x = -z
    let d = cam.calculate_frustum_distance(Point3::new(20., 0., -10.));
    let expected = (20. - 10.) / 2f32.sqrt();

    assert!((d.right - expected).abs() < 1e-2);
  }

  #[test]
  fn bounding_frustum_of_orthographic_box() {
    let source = OrthographicCamera::new(Orthographic {
      width: 2.,
      height: 2.,
      near: 0.,
      far: 10.,
    });

    let mut bound = OrthographicCamera::default();
    bound.calculate_bounding_frustum(&source, Vector3::new(0., 0., -1.), 0.);

    assert!((bound.projection.width - 2.).abs() < 1e-3);
    assert!((bound.projection.height - 2.).abs() < 1e-3);
    assert!((bound.projection.far - 5.).abs() < 1e-3);
    assert!((bound.projection.near - -5.).abs() < 1e-3);
    assert!(approx_p(bound.position, Point3::new(0., 0., -5.), 1e-3));
    assert!(approx_v(bound.direction, Vector3::new(0., 0., -1.)));
  }

  #[test]
  fn bounding_frustum_offset_and_contents() {
    let source = square_camera();
    let mut bound = OrthographicCamera::default();
    bound.calculate_bounding_frustum(&source, Vector3::new(1., -1., 0.), 1.);

    for p in source.calculate_frustum_points() {
      assert!(bound.calculate_frustum_distance(p).contains());
    }
  }
}
