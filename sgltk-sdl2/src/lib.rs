//! [SDL2](https://crates.io/crates/sdl2) windowing for [sgltk](https://crates.io/crates/sgltk).
//!
//! A [`Window`] owns the SDL context, the OpenGL context and the input devices. Implement
//! [`Handler`] to react to events and draw, then hand it to [`Window::run`].
//!
//! # Feature flags
//!
//! - `bundled` (default): build SDL2 from source.
//! - `ttf`: text rendering with SDL2_ttf, see [`text`].

pub mod input;
#[cfg(feature = "ttf")]
pub mod text;
pub mod window;

pub use sdl2;

pub use crate::input::{DeviceIds, Gamepad, HatState, Joystick, KeyTracker};
#[cfg(feature = "ttf")]
pub use crate::text::{render_text, TextError};
pub use crate::window::{Handler, Window, WindowError, WindowMode, WindowOpt};
