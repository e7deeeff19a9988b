//! # A small, stateful OpenGL toolkit
//!
//! sgltk wraps the OpenGL 3.0+ objects a small interactive 3D program needs into owned Rust
//! types, and adds the bits of math and asset loading that usually come with them. It does not
//! open windows by itself: see the `sgltk-sdl2` crate for that.
//!
//! # What’s included?
//!
//! - **Context**: the per-thread graphics state. Every GL object is created from a [`Context`]
//!   and keeps a handle on its state cache, so redundant binds are elided.
//! - **Buffers**: typed uploads, partial updates, read-backs, GPU copies and mapping.
//! - **Shaders**: stages compiled from files found through search paths or from strings,
//!   transform feedback varyings, hot recompilation and typed uniform uploads.
//! - **Images and textures**: RGBA8 images with blending and flipping; 1D, 2D, 3D, array and
//!   cube map textures with samplers.
//! - **Framebuffers and renderbuffers**: off-screen rendering, blitting and pixel read-back.
//! - **Cameras**: perspective, orthographic and infinite perspective cameras with frustum
//!   queries.
//! - **Meshes and models**: vertex arrays with named attributes, materials and textures;
//!   Wavefront OBJ loading.
//! - **Particles**: a point-sprite particle system animated in the vertex shader.
//!
//! # Feature flags
//!
//! - `GL_ARB_gpu_shader_fp64`: double-precision uniforms.
//!
//! # Threading
//!
//! OpenGL contexts are bound to a thread, and so is sgltk: [`Context::new`] only succeeds once
//! per thread and every type holding GL state is `!Send`.

pub mod buffer;
pub mod camera;
pub mod context;
pub mod framebuffer;
pub mod gl_error;
pub mod image;
pub mod mesh;
pub mod model;
pub mod particles;
pub mod paths;
pub mod renderbuffer;
pub mod shader;
pub mod state;
pub mod texture;
pub mod timer;

pub use cgmath;
pub use gl;

pub use crate::buffer::{Buffer, BufferError, BufferTarget, MapAccess, Usage};
pub use crate::camera::{
  Camera, InfinitePerspective, InfinitePerspectiveCamera, Orthographic, OrthographicCamera,
  Perspective, PerspectiveCamera, Projection,
};
pub use crate::context::{ClearBuffers, Context};
pub use crate::framebuffer::{Attachment, Framebuffer, FramebufferError, FramebufferTarget};
pub use crate::gl_error::GlError;
pub use crate::image::{Image, ImageError, Rect};
pub use crate::mesh::{AttribType, Material, Mesh, MeshError, Mode, Vertex};
pub use crate::model::{Model, ModelError};
pub use crate::particles::{Particles, ParticlesError};
pub use crate::paths::SearchPaths;
pub use crate::renderbuffer::Renderbuffer;
pub use crate::shader::{ProgramError, Shader, StageError, StageType};
pub use crate::state::{PolygonMode, StateQueryError};
pub use crate::texture::{Sampler, TexelFormat, Texture, TextureError, TextureTarget};
pub use crate::timer::Timer;
