//! Window, GL context and event loop.

use log::{error, info, warn};
use sdl2::controller::{Axis, Button};
use sdl2::event::{Event, WindowEvent};
use sdl2::mouse::MouseButton;
use sdl2::pixels::PixelFormatEnum;
use sdl2::surface::Surface;
use sdl2::video::{DisplayMode, FullscreenType, GLContext, GLProfile, SwapInterval};
use sdl2::{EventPump, GameControllerSubsystem, HapticSubsystem, JoystickSubsystem, VideoSubsystem};
use sgltk::framebuffer::read_default_pixels;
use sgltk::{ClearBuffers, Context, Image, ImageError, Rect, StateQueryError, Timer};
use std::error;
use std::fmt;
use std::os::raw::c_void;
use std::thread;
use std::time::Duration;

use crate::input::{DeviceIds, Gamepad, HatState, Joystick, KeyTracker, GAMEPAD_AXES};

/// Oldest OpenGL version the toolkit runs on.
pub const MIN_GL_VERSION: (u8, u8) = (3, 0);

/// How the window occupies the screen.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WindowMode {
  /// Regular window.
  Windowed,
  /// Fullscreen, changing the display mode.
  Fullscreen,
  /// Borderless window covering the desktop.
  FakeFullscreen,
}

impl WindowMode {
  fn to_fullscreen_type(self) -> FullscreenType {
    match self {
      WindowMode::Windowed => FullscreenType::Off,
      WindowMode::Fullscreen => FullscreenType::True,
      WindowMode::FakeFullscreen => FullscreenType::Desktop,
    }
  }
}

/// Window creation options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WindowOpt {
  title: String,
  width: u32,
  height: u32,
  position: Option<(i32, i32)>,
  gl_version: (u8, u8),
  num_samples: Option<u32>,
  depth_size: u8,
  stencil_size: u8,
  resizable: bool,
  mode: WindowMode,
}

impl Default for WindowOpt {
  /// Defaults:
  ///
  /// - `title` set to `"sgltk"`.
  /// - `width` × `height` set to 800 × 600.
  /// - `position` set to `None` (centered).
  /// - `gl_version` set to 3.3.
  /// - `num_samples` set to `None`.
  /// - `depth_size` set to 24 and `stencil_size` to 8.
  /// - `resizable` set to `true`.
  /// - `mode` set to `WindowMode::Windowed`.
  fn default() -> Self {
    WindowOpt {
      title: "sgltk".to_owned(),
      width: 800,
      height: 600,
      position: None,
      gl_version: (3, 3),
      num_samples: None,
      depth_size: 24,
      stencil_size: 8,
      resizable: true,
      mode: WindowMode::Windowed,
    }
  }
}

impl WindowOpt {
  /// Window title.
  #[inline]
  pub fn set_title(self, title: impl Into<String>) -> Self {
    WindowOpt {
      title: title.into(),
      ..self
    }
  }

  /// Window title.
  #[inline]
  pub fn title(&self) -> &str {
    &self.title
  }

  /// Size of the drawable area, in pixels.
  #[inline]
  pub fn set_size(self, width: u32, height: u32) -> Self {
    WindowOpt {
      width,
      height,
      ..self
    }
  }

  /// Requested size, in pixels.
  #[inline]
  pub fn size(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  /// Position of the top left corner on screen. `None` centers the window.
  #[inline]
  pub fn set_position<P>(self, position: P) -> Self
  where
    P: Into<Option<(i32, i32)>>,
  {
    WindowOpt {
      position: position.into(),
      ..self
    }
  }

  /// Requested position; `None` centers the window.
  #[inline]
  pub fn position(&self) -> Option<(i32, i32)> {
    self.position
  }

  /// Requested OpenGL version. Versions older than 3.0 are raised to 3.0 when the window opens.
  #[inline]
  pub fn set_gl_version(self, major: u8, minor: u8) -> Self {
    WindowOpt {
      gl_version: (major, minor),
      ..self
    }
  }

  /// Requested OpenGL version.
  #[inline]
  pub fn gl_version(&self) -> (u8, u8) {
    self.gl_version
  }

  /// Set the number of samples to use for multisampling.
  ///
  /// Pass `None` to disable multisampling.
  #[inline]
  pub fn set_num_samples<S>(self, samples: S) -> Self
  where
    S: Into<Option<u32>>,
  {
    WindowOpt {
      num_samples: samples.into(),
      ..self
    }
  }

  /// Number of MSAA samples, if any.
  #[inline]
  pub fn num_samples(&self) -> Option<u32> {
    self.num_samples
  }

  /// Bits of the depth buffer.
  #[inline]
  pub fn set_depth_size(self, depth_size: u8) -> Self {
    WindowOpt { depth_size, ..self }
  }

  /// Depth buffer bits.
  #[inline]
  pub fn depth_size(&self) -> u8 {
    self.depth_size
  }

  /// Bits of the stencil buffer.
  #[inline]
  pub fn set_stencil_size(self, stencil_size: u8) -> Self {
    WindowOpt {
      stencil_size,
      ..self
    }
  }

  /// Stencil buffer bits.
  #[inline]
  pub fn stencil_size(&self) -> u8 {
    self.stencil_size
  }

  /// Whether the window can be resized.
  #[inline]
  pub fn set_resizable(self, resizable: bool) -> Self {
    WindowOpt { resizable, ..self }
  }

  /// Whether the window can be resized.
  #[inline]
  pub fn resizable(&self) -> bool {
    self.resizable
  }

  /// Windowed or fullscreen mode.
  #[inline]
  pub fn set_mode(self, mode: WindowMode) -> Self {
    WindowOpt { mode, ..self }
  }

  /// Windowed or fullscreen mode.
  #[inline]
  pub fn mode(&self) -> WindowMode {
    self.mode
  }
}

// Raise versions below the supported minimum; `true` if clamped.
fn clamp_gl_version(version: (u8, u8)) -> ((u8, u8), bool) {
  if version < MIN_GL_VERSION {
    (MIN_GL_VERSION, true)
  } else {
    (version, false)
  }
}

/// Error that can be risen while creating or driving a window.
#[non_exhaustive]
#[derive(Debug)]
pub enum WindowError {
  /// Initialization of SDL went wrong.
  InitError(String),
  /// No available video mode.
  VideoInitError(String),
  /// The game controller or joystick subsystem failed to start.
  InputInitError(String),
  /// Window creation failed.
  WindowCreationFailed(sdl2::video::WindowBuildError),
  /// Failed to create an OpenGL context.
  GlContextInitFailed(String),
  /// The graphics state is not available.
  ///
  /// This error is generated when a window is opened on a thread on which the graphics state
  /// has already been acquired.
  GraphicsStateError(StateQueryError),
  /// An SDL call failed.
  SdlError(String),
  /// An image could not be used.
  ImageError(ImageError),
}

impl fmt::Display for WindowError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      WindowError::InitError(ref e) => write!(f, "initialization error: {}", e),
      WindowError::VideoInitError(ref e) => {
        write!(f, "failed to initialize video system: {}", e)
      }
      WindowError::InputInitError(ref e) => {
        write!(f, "failed to initialize input devices: {}", e)
      }
      WindowError::WindowCreationFailed(ref e) => write!(f, "failed to create window: {}", e),
      WindowError::GlContextInitFailed(ref e) => {
        write!(f, "failed to create OpenGL context: {}", e)
      }
      WindowError::GraphicsStateError(ref e) => {
        write!(f, "failed to get graphics state: {}", e)
      }
      WindowError::SdlError(ref e) => write!(f, "SDL error: {}", e),
      WindowError::ImageError(ref e) => write!(f, "image error: {}", e),
    }
  }
}

impl error::Error for WindowError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      WindowError::WindowCreationFailed(e) => Some(e),
      WindowError::GraphicsStateError(e) => Some(e),
      WindowError::ImageError(e) => Some(e),
      _ => None,
    }
  }
}

impl From<ImageError> for WindowError {
  fn from(e: ImageError) -> Self {
    WindowError::ImageError(e)
  }
}

/// Callbacks driven by [`Window::poll_events`] and [`Window::run`].
///
/// Every method does nothing by default, except [`Handler::handle_exit`], which stops the
/// window, and [`Handler::display`], which clears the screen to black.
#[allow(unused_variables)]
pub trait Handler {
  /// Draw a frame. The buffers are swapped afterwards.
  fn display(&mut self, window: &mut Window) {
    window.ctx().set_clear_color([0., 0., 0., 1.]);
    window.ctx().clear(ClearBuffers::COLOR_DEPTH);
  }

  /// The user asked to quit or closed the window.
  fn handle_exit(&mut self, window: &mut Window) {
    window.stop();
  }

  /// The window was resized; the viewport is already updated.
  fn handle_resize(&mut self, window: &mut Window, width: u32, height: u32) {}

  /// A key went down (`pressed`) or up.
  fn handle_key_press(&mut self, window: &mut Window, key: &str, pressed: bool) {}

  /// Called once per frame for every held key.
  fn handle_keyboard(&mut self, window: &mut Window, key: &str) {}

  /// Mouse position, or motion since the last event in relative mode.
  fn handle_mouse_motion(&mut self, window: &mut Window, x: i32, y: i32) {}

  /// Called on mouse wheel motion.
  fn handle_mouse_wheel(&mut self, window: &mut Window, x: i32, y: i32) {}

  /// A mouse button changed. `x` and `y` are 0 in relative mode.
  fn handle_mouse_button(
    &mut self,
    window: &mut Window,
    x: i32,
    y: i32,
    button: MouseButton,
    down: bool,
    clicks: u8,
  ) {
  }

  /// Called once a gamepad is opened.
  fn handle_gamepad_added(&mut self, window: &mut Window, id: u32) {}

  /// Called after a gamepad is unplugged.
  fn handle_gamepad_removed(&mut self, window: &mut Window, id: u32) {}

  /// Called when a gamepad button changes state.
  fn handle_gamepad_button_press(
    &mut self,
    window: &mut Window,
    id: u32,
    button: Button,
    pressed: bool,
  ) {
  }

  /// Called once per frame for every held gamepad button.
  fn handle_gamepad_button(&mut self, window: &mut Window, id: u32, button: Button) {}

  /// Called when a gamepad axis moves.
  fn handle_gamepad_axis_change(&mut self, window: &mut Window, id: u32, axis: Axis, value: i32) {}

  /// Called once per frame for every gamepad axis.
  fn handle_gamepad_axis(&mut self, window: &mut Window, id: u32, axis: Axis, value: i32) {}

  /// Called once a joystick is opened.
  fn handle_joystick_added(&mut self, window: &mut Window, id: u32) {}

  /// Called after a joystick is unplugged.
  fn handle_joystick_removed(&mut self, window: &mut Window, id: u32) {}

  /// Called when a joystick button changes state.
  fn handle_joystick_button_press(
    &mut self,
    window: &mut Window,
    id: u32,
    button: u8,
    pressed: bool,
  ) {
  }

  /// Called once per frame for every held joystick button.
  fn handle_joystick_button(&mut self, window: &mut Window, id: u32, button: u8) {}

  /// Called when a joystick axis moves.
  fn handle_joystick_axis_change(&mut self, window: &mut Window, id: u32, axis: u8, value: i32) {}

  /// Called once per frame for every joystick axis.
  fn handle_joystick_axis(&mut self, window: &mut Window, id: u32, axis: u8, value: i32) {}

  /// Called when a joystick hat moves.
  fn handle_joystick_hat_change(
    &mut self,
    window: &mut Window,
    id: u32,
    hat: u8,
    value: HatState,
  ) {
  }

  /// Called once per frame for every joystick hat.
  fn handle_joystick_hat(&mut self, window: &mut Window, id: u32, hat: u8, value: HatState) {}

  /// Called on trackball motion.
  fn handle_joystick_ball_motion(
    &mut self,
    window: &mut Window,
    id: u32,
    ball: u8,
    xrel: i16,
    yrel: i16,
  ) {
  }
}

/// An SDL2 window with an OpenGL context and its input devices.
///
/// ```ignore
/// use sgltk_sdl2::{Handler, Window, WindowOpt};
///
/// struct App;
/// impl Handler for App {}
///
/// let mut window = Window::new(WindowOpt::default().set_title("My app"))
///   .expect("failed to open window");
/// window.run(&mut App, 60);
/// ```
pub struct Window {
  ctx: Context,
  gamepads: Vec<Gamepad>,
  joysticks: Vec<Joystick>,
  // This needs to stay alive until we are done with OpenGL stuff.
  _gl_context: GLContext,
  window: sdl2::video::Window,
  event_pump: EventPump,
  haptic: Option<HapticSubsystem>,
  joystick: JoystickSubsystem,
  controller: GameControllerSubsystem,
  video: VideoSubsystem,
  sdl: sdl2::Sdl,
  gl_version: (u8, u8),
  width: u32,
  height: u32,
  delta_time: f64,
  running: bool,
  mouse_relative: bool,
  keys: KeyTracker,
  gamepad_ids: DeviceIds,
  joystick_ids: DeviceIds,
}

impl Window {
  /// Open a window and make its OpenGL context current.
  pub fn new(opt: WindowOpt) -> Result<Self, WindowError> {
    let sdl = sdl2::init().map_err(WindowError::InitError)?;
    let video = sdl.video().map_err(WindowError::VideoInitError)?;
    let controller = sdl.game_controller().map_err(WindowError::InputInitError)?;
    let joystick = sdl.joystick().map_err(WindowError::InputInitError)?;
    let haptic = match sdl.haptic() {
      Ok(haptic) => Some(haptic),
      Err(e) => {
        warn!("haptic feedback unavailable: {}", e);
        None
      }
    };

    video.disable_screen_saver();

    let (version, clamped) = clamp_gl_version(opt.gl_version);
    if clamped {
      warn!(
        "OpenGL {}.{} requested but at least {}.{} is required; using {}.{}",
        opt.gl_version.0, opt.gl_version.1, version.0, version.1, version.0, version.1
      );
    }

    let gl_attr = video.gl_attr();
    gl_attr.set_context_major_version(version.0);
    gl_attr.set_context_minor_version(version.1);
    if version >= (3, 2) {
      gl_attr.set_context_profile(GLProfile::Core);
    }
    gl_attr.set_double_buffer(true);
    gl_attr.set_depth_size(opt.depth_size);
    gl_attr.set_stencil_size(opt.stencil_size);

    if let Some(samples) = opt.num_samples.filter(|&s| s > 0) {
      gl_attr.set_multisample_buffers(1);
      gl_attr.set_multisample_samples(samples.min(u32::from(u8::MAX)) as u8);
    }

    let mut builder = video.window(&opt.title, opt.width, opt.height);
    builder.opengl();

    match opt.position {
      Some((x, y)) => builder.position(x, y),
      None => builder.position_centered(),
    };

    if opt.resizable {
      builder.resizable();
    }

    match opt.mode {
      WindowMode::Windowed => (),
      WindowMode::Fullscreen => {
        builder.fullscreen();
      }
      WindowMode::FakeFullscreen => {
        builder.fullscreen_desktop();
      }
    }

    let window = builder.build().map_err(WindowError::WindowCreationFailed)?;

    let _gl_context = window
      .gl_create_context()
      .map_err(WindowError::GlContextInitFailed)?;

    gl::load_with(|s| video.gl_get_proc_address(s) as *const c_void);

    let ctx = Context::new().map_err(WindowError::GraphicsStateError)?;
    let (width, height) = window.drawable_size();
    ctx.set_viewport(0, 0, width, height);

    let gl_version = gl_attr.context_version();
    info!("OpenGL {}.{} context created", gl_version.0, gl_version.1);

    let event_pump = sdl.event_pump().map_err(WindowError::InitError)?;

    Ok(Window {
      ctx,
      gamepads: Vec::new(),
      joysticks: Vec::new(),
      _gl_context,
      window,
      event_pump,
      haptic,
      joystick,
      controller,
      video,
      sdl,
      gl_version,
      width,
      height,
      delta_time: 0.,
      running: true,
      mouse_relative: false,
      keys: KeyTracker::new(),
      gamepad_ids: DeviceIds::new(),
      joystick_ids: DeviceIds::new(),
    })
  }

  /// Graphics context of this window.
  pub fn ctx(&self) -> &Context {
    &self.ctx
  }

  /// The entry point to most of the SDL2 API.
  pub fn sdl(&self) -> &sdl2::Sdl {
    &self.sdl
  }

  /// The SDL video subsystem.
  pub fn video(&self) -> &VideoSubsystem {
    &self.video
  }

  /// Borrow the underlying SDL2 window.
  pub fn window(&self) -> &sdl2::video::Window {
    &self.window
  }

  /// Mutably borrow the underlying SDL2 window.
  pub fn window_mut(&mut self) -> &mut sdl2::video::Window {
    &mut self.window
  }

  /// Current drawable width.
  pub fn width(&self) -> u32 {
    self.width
  }

  /// Current drawable height.
  pub fn height(&self) -> u32 {
    self.height
  }

  /// Duration of the last frame in milliseconds.
  pub fn delta_time(&self) -> f64 {
    self.delta_time
  }

  /// OpenGL version of the context, as `(major, minor)`.
  pub fn gl_version(&self) -> (u8, u8) {
    self.gl_version
  }

  /// `false` once [`Window::stop`] was called.
  pub fn is_running(&self) -> bool {
    self.running
  }

  /// Whether the key called `key` is held down, e.g. `"W"` or `"Left Shift"`.
  pub fn key_pressed(&self, key: &str) -> bool {
    self.keys.is_pressed(key)
  }

  /// Gamepad opened under `id`.
  pub fn gamepad(&self, id: u32) -> Option<&Gamepad> {
    self.gamepads.iter().find(|g| g.id() == id)
  }

  /// Gamepad opened under `id`.
  pub fn gamepad_mut(&mut self, id: u32) -> Option<&mut Gamepad> {
    self.gamepads.iter_mut().find(|g| g.id() == id)
  }

  /// Every opened gamepad.
  pub fn gamepads(&self) -> &[Gamepad] {
    &self.gamepads
  }

  /// Joystick opened under `id`.
  pub fn joystick(&self, id: u32) -> Option<&Joystick> {
    self.joysticks.iter().find(|j| j.id() == id)
  }

  /// Joystick opened under `id`.
  pub fn joystick_mut(&mut self, id: u32) -> Option<&mut Joystick> {
    self.joysticks.iter_mut().find(|j| j.id() == id)
  }

  /// Every opened joystick.
  pub fn joysticks(&self) -> &[Joystick] {
    &self.joysticks
  }

  /// Use `icon` as the window icon.
  pub fn set_icon(&mut self, icon: &Image) -> Result<(), WindowError> {
    if icon.is_empty() {
      return Err(WindowError::ImageError(ImageError::Empty));
    }

    // RGBA bytes in memory order
    let format = if cfg!(target_endian = "big") {
      PixelFormatEnum::RGBA8888
    } else {
      PixelFormatEnum::ABGR8888
    };

    let (width, height) = (icon.width(), icon.height());
    let mut pixels = icon.as_raw().to_vec();
    let surface = Surface::from_data(&mut pixels, width, height, width * 4, format)
      .map_err(WindowError::SdlError)?;

    self.window.set_icon(surface);
    Ok(())
  }

  /// Load `name` through the image search paths and use it as icon.
  pub fn set_icon_from_file(&mut self, name: &str) -> Result<(), WindowError> {
    let mut icon = Image::new();
    icon.load(name)?;
    self.set_icon(&icon)
  }

  pub fn set_title(&mut self, title: &str) -> Result<(), WindowError> {
    self
      .window
      .set_title(title)
      .map_err(|e| WindowError::SdlError(e.to_string()))
  }

  pub fn set_resizable(&mut self, on: bool) {
    let on = if on {
      sdl2::sys::SDL_bool::SDL_TRUE
    } else {
      sdl2::sys::SDL_bool::SDL_FALSE
    };

    unsafe { sdl2::sys::SDL_SetWindowResizable(self.window.raw(), on) };
  }

  /// Read the back buffer, top row first.
  pub fn take_screenshot(&self) -> Image {
    let (width, height) = self.window.drawable_size();
    read_default_pixels(&self.ctx, Rect::new(0, 0, width, height))
  }

  /// Confine the mouse to the window.
  pub fn grab_mouse(&mut self, on: bool) {
    self.window.set_grab(on);
  }

  /// Index of the display showing the window.
  pub fn get_display_index(&self) -> Result<i32, WindowError> {
    self.window.display_index().map_err(WindowError::SdlError)
  }

  /// Display mode used in fullscreen.
  pub fn set_display_mode(&mut self, mode: DisplayMode) -> Result<(), WindowError> {
    self
      .window
      .set_display_mode(mode)
      .map_err(WindowError::SdlError)
  }

  /// Switch between windowed and fullscreen modes.
  pub fn fullscreen_mode(&mut self, mode: WindowMode) -> Result<(), WindowError> {
    self
      .window
      .set_fullscreen(mode.to_fullscreen_type())
      .map_err(WindowError::SdlError)
  }

  /// Hide the cursor and report relative mouse motion.
  pub fn set_relative_mode(&mut self, on: bool) {
    self.sdl.mouse().set_relative_mouse_mode(on);
    self.mouse_relative = on;
  }

  /// Whether relative mouse mode is on.
  pub fn relative_mode(&self) -> bool {
    self.mouse_relative
  }

  /// Move the cursor to `(x, y)` inside the window.
  pub fn set_mouse_position(&mut self, x: i32, y: i32) {
    self.sdl.mouse().warp_mouse_in_window(&self.window, x, y);
  }

  /// Show or hide the cursor.
  pub fn set_cursor_visibility(&mut self, visible: bool) {
    self.sdl.mouse().show_cursor(visible);
  }

  /// Whether the cursor is shown.
  pub fn get_cursor_visibility(&self) -> bool {
    self.sdl.mouse().is_cursor_showing()
  }

  /// Turn vertical synchronization on or off.
  ///
  /// Adaptive vsync is tried first. Returns `false` if the driver refused.
  pub fn enable_vsync(&mut self, on: bool) -> bool {
    if on {
      self
        .video
        .gl_set_swap_interval(SwapInterval::LateSwapTearing)
        .or_else(|_| self.video.gl_set_swap_interval(SwapInterval::VSync))
        .is_ok()
    } else {
      self
        .video
        .gl_set_swap_interval(SwapInterval::Immediate)
        .is_ok()
    }
  }

  /// Make [`Window::run`] return after the current frame.
  pub fn stop(&mut self) {
    self.running = false;
  }

  /// Drain pending events into `handler`, then report held keys, buttons and axis states.
  pub fn poll_events<H>(&mut self, handler: &mut H)
  where
    H: Handler,
  {
    let events: Vec<Event> = self.event_pump.poll_iter().collect();

    for event in events {
      self.dispatch(handler, event);
    }

    let held: Vec<String> = self.keys.iter().map(str::to_owned).collect();
    for key in &held {
      handler.handle_keyboard(self, key);
    }

    self.report_devices(handler);
  }

  fn dispatch<H>(&mut self, handler: &mut H, event: Event)
  where
    H: Handler,
  {
    match event {
      Event::Quit { .. }
      | Event::Window {
        win_event: WindowEvent::Close,
        ..
      } => handler.handle_exit(self),

      Event::Window {
        win_event: WindowEvent::Resized(w, h),
        ..
      } => {
        let (width, height) = (w.max(0) as u32, h.max(0) as u32);
        self.width = width;
        self.height = height;
        self.ctx.set_viewport(0, 0, width, height);
        handler.handle_resize(self, width, height);
      }

      Event::KeyDown {
        keycode: Some(key),
        repeat: false,
        ..
      } => {
        let name = key.name();
        if self.keys.press(&name) {
          handler.handle_key_press(self, &name, true);
        }
      }

      Event::KeyUp {
        keycode: Some(key), ..
      } => {
        let name = key.name();
        if self.keys.release(&name) {
          handler.handle_key_press(self, &name, false);
        }
      }

      Event::MouseWheel { x, y, .. } => handler.handle_mouse_wheel(self, x, y),

      Event::MouseButtonDown {
        mouse_btn,
        clicks,
        x,
        y,
        ..
      } => {
        let (x, y) = if self.mouse_relative { (0, 0) } else { (x, y) };
        handler.handle_mouse_button(self, x, y, mouse_btn, true, clicks);
      }

      Event::MouseButtonUp {
        mouse_btn,
        clicks,
        x,
        y,
        ..
      } => {
        let (x, y) = if self.mouse_relative { (0, 0) } else { (x, y) };
        handler.handle_mouse_button(self, x, y, mouse_btn, false, clicks);
      }

      Event::MouseMotion {
        x, y, xrel, yrel, ..
      } => {
        if self.mouse_relative {
          handler.handle_mouse_motion(self, xrel, yrel);
        } else {
          handler.handle_mouse_motion(self, x, y);
        }
      }

      Event::ControllerDeviceAdded { which, .. } => self.add_gamepad(handler, which),

      Event::ControllerDeviceRemoved { which, .. } => {
        if let Some(pos) = self.gamepads.iter().position(|g| g.instance_id() == which) {
          let id = self.gamepads.remove(pos).id();
          self.gamepad_ids.release(id);
          info!("gamepad {} removed", id);
          handler.handle_gamepad_removed(self, id);
        }
      }

      Event::ControllerButtonDown { which, button, .. } => {
        self.gamepad_button(handler, which, button, true)
      }

      Event::ControllerButtonUp { which, button, .. } => {
        self.gamepad_button(handler, which, button, false)
      }

      Event::ControllerAxisMotion {
        which, axis, value, ..
      } => {
        let pad = self.gamepads.iter().find(|g| g.instance_id() == which);
        if let Some((id, value)) = pad.map(|g| (g.id(), g.filter_axis(value))) {
          handler.handle_gamepad_axis_change(self, id, axis, value);
        }
      }

      Event::JoyDeviceAdded { which, .. } => self.add_joystick(handler, which),

      Event::JoyDeviceRemoved { which, .. } => {
        if let Some(pos) = self.joysticks.iter().position(|j| j.instance_id() == which) {
          let id = self.joysticks.remove(pos).id();
          self.joystick_ids.release(id);
          info!("joystick {} removed", id);
          handler.handle_joystick_removed(self, id);
        }
      }

      Event::JoyButtonDown {
        which, button_idx, ..
      } => self.joystick_button(handler, which, button_idx, true),

      Event::JoyButtonUp {
        which, button_idx, ..
      } => self.joystick_button(handler, which, button_idx, false),

      Event::JoyAxisMotion {
        which,
        axis_idx,
        value,
        ..
      } => {
        let stick = self.joysticks.iter().find(|j| j.instance_id() == which);
        if let Some((id, value)) = stick.map(|j| (j.id(), j.filter_axis(value))) {
          handler.handle_joystick_axis_change(self, id, axis_idx, value);
        }
      }

      Event::JoyHatMotion {
        which,
        hat_idx,
        state,
        ..
      } => {
        if let Some(id) = self.joystick_id(which) {
          handler.handle_joystick_hat_change(self, id, hat_idx, state);
        }
      }

      Event::JoyBallMotion {
        which,
        ball_idx,
        xrel,
        yrel,
        ..
      } => {
        if let Some(id) = self.joystick_id(which) {
          handler.handle_joystick_ball_motion(self, id, ball_idx, xrel, yrel);
        }
      }

      _ => (),
    }
  }

  fn add_gamepad<H>(&mut self, handler: &mut H, device_index: u32)
  where
    H: Handler,
  {
    let id = self.gamepad_ids.acquire();

    match Gamepad::open(&self.controller, self.haptic.as_ref(), device_index, id) {
      Ok(pad) => {
        info!("gamepad {} added: {}", id, pad.name());
        self.gamepads.push(pad);
        handler.handle_gamepad_added(self, id);
      }

      Err(e) => {
        self.gamepad_ids.release(id);
        error!("cannot open gamepad {}: {}", device_index, e);
      }
    }
  }

  fn add_joystick<H>(&mut self, handler: &mut H, device_index: u32)
  where
    H: Handler,
  {
    // game controllers also show up as joysticks
    if self.controller.is_game_controller(device_index) {
      return;
    }

    let id = self.joystick_ids.acquire();

    match Joystick::open(&self.joystick, device_index, id) {
      Ok(stick) => {
        info!("joystick {} added: {}", id, stick.name());
        self.joysticks.push(stick);
        handler.handle_joystick_added(self, id);
      }

      Err(e) => {
        self.joystick_ids.release(id);
        error!("cannot open joystick {}: {}", device_index, e);
      }
    }
  }

  fn gamepad_button<H>(&mut self, handler: &mut H, which: u32, button: Button, pressed: bool)
  where
    H: Handler,
  {
    if let Some(pad) = self.gamepads.iter_mut().find(|g| g.instance_id() == which) {
      pad.set_button_state(button, pressed);
      let id = pad.id();
      handler.handle_gamepad_button_press(self, id, button, pressed);
    }
  }

  fn joystick_button<H>(&mut self, handler: &mut H, which: u32, button: u8, pressed: bool)
  where
    H: Handler,
  {
    if let Some(stick) = self.joysticks.iter_mut().find(|j| j.instance_id() == which) {
      stick.set_button_state(button, pressed);
      let id = stick.id();
      handler.handle_joystick_button_press(self, id, button, pressed);
    }
  }

  fn joystick_id(&self, instance_id: u32) -> Option<u32> {
    self
      .joysticks
      .iter()
      .find(|j| j.instance_id() == instance_id)
      .map(Joystick::id)
  }

  fn report_devices<H>(&mut self, handler: &mut H)
  where
    H: Handler,
  {
    let mut pad_buttons = Vec::new();
    let mut pad_axes = Vec::new();

    for pad in &self.gamepads {
      pad_buttons.extend(pad.buttons_pressed().iter().map(|&b| (pad.id(), b)));
      pad_axes.extend(
        GAMEPAD_AXES
          .iter()
          .map(|&axis| (pad.id(), axis, pad.get_axis_value(axis))),
      );
    }

    let mut stick_buttons = Vec::new();
    let mut stick_axes = Vec::new();
    let mut stick_hats = Vec::new();

    for stick in &self.joysticks {
      stick_buttons.extend(stick.buttons_pressed().iter().map(|&b| (stick.id(), b)));
      stick_axes.extend(
        (0..stick.num_axes()).map(|axis| (stick.id(), axis as u8, stick.get_axis_value(axis))),
      );
      stick_hats.extend(
        (0..stick.num_hats()).map(|hat| (stick.id(), hat as u8, stick.get_hat_value(hat))),
      );
    }

    for (id, button) in pad_buttons {
      handler.handle_gamepad_button(self, id, button);
    }

    for (id, axis, value) in pad_axes {
      handler.handle_gamepad_axis(self, id, axis, value);
    }

    for (id, button) in stick_buttons {
      handler.handle_joystick_button(self, id, button);
    }

    for (id, axis, value) in stick_axes {
      handler.handle_joystick_axis(self, id, axis, value);
    }

    for (id, hat, value) in stick_hats {
      handler.handle_joystick_hat(self, id, hat, value);
    }
  }

  /// Run the frame loop until [`Window::stop`] is called.
  ///
  /// With `fps > 0`, each frame is padded with sleep to last at least `1000 / fps` milliseconds.
  pub fn run<H>(&mut self, handler: &mut H, fps: u32)
  where
    H: Handler,
  {
    let frame_time = if fps > 0 {
      Some(1000. / f64::from(fps))
    } else {
      None
    };

    let mut frame_timer = Timer::new();
    self.running = true;

    while self.running {
      frame_timer.start();

      self.poll_events(handler);
      if !self.running {
        break;
      }

      handler.display(self);

      if let Some(frame_time) = frame_time {
        let elapsed = frame_timer.get_time();
        if elapsed < frame_time {
          thread::sleep(Duration::from_secs_f64((frame_time - elapsed) / 1000.));
        }
      }

      self.delta_time = frame_timer.get_time();
      self.window.gl_swap_window();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_options() {
    let opt = WindowOpt::default();

    assert_eq!(opt.size(), (800, 600));
    assert_eq!(opt.position(), None);
    assert_eq!(opt.depth_size(), 24);
    assert_eq!(opt.stencil_size(), 8);
    assert_eq!(opt.num_samples(), None);
    assert!(opt.resizable());
    assert_eq!(opt.mode(), WindowMode::Windowed);
  }

  #[test]
  fn builder() {
    let opt = WindowOpt::default()
      .set_title("test")
      .set_size(1024, 768)
      .set_position((10, 20))
      .set_num_samples(4)
      .set_resizable(false)
      .set_mode(WindowMode::FakeFullscreen);

    assert_eq!(opt.title(), "test");
    assert_eq!(opt.size(), (1024, 768));
    assert_eq!(opt.position(), Some((10, 20)));
    assert_eq!(opt.num_samples(), Some(4));
    assert!(!opt.resizable());
    assert_eq!(opt.mode(), WindowMode::FakeFullscreen);
    assert_eq!(opt.set_position(None).position(), None);
  }

  #[test]
  fn gl_version_is_clamped() {
    assert_eq!(clamp_gl_version((2, 1)), ((3, 0), true));
    assert_eq!(clamp_gl_version((3, 0)), ((3, 0), false));
    assert_eq!(clamp_gl_version((4, 5)), ((4, 5), false));
  }

  #[test]
  fn fullscreen_types() {
    assert_eq!(WindowMode::Windowed.to_fullscreen_type(), FullscreenType::Off);
    assert_eq!(WindowMode::Fullscreen.to_fullscreen_type(), FullscreenType::True);
    assert_eq!(
      WindowMode::FakeFullscreen.to_fullscreen_type(),
      FullscreenType::Desktop
    );
  }
}
