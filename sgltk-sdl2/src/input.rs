//! Keyboard state, gamepads and joysticks.
//!
//! Devices are opened by the [`Window`](crate::Window) when SDL reports them and are identified
//! by a small id, allocated first-free, that stays valid until the device is unplugged.

use log::debug;
use sdl2::controller::{Axis, Button, GameController};
use sdl2::haptic::Haptic;
pub use sdl2::joystick::HatState;
use sdl2::{GameControllerSubsystem, HapticSubsystem, IntegerOrSdlError, JoystickSubsystem};
use std::collections::BTreeSet;

/// Every gamepad axis, in SDL order.
pub const GAMEPAD_AXES: [Axis; 6] = [
  Axis::LeftX,
  Axis::LeftY,
  Axis::RightX,
  Axis::RightY,
  Axis::TriggerLeft,
  Axis::TriggerRight,
];

/// Number of buttons of a standard gamepad.
pub const GAMEPAD_BUTTONS: u32 = 15;

/// First-free id allocator.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeviceIds {
  taken: BTreeSet<u32>,
}

impl DeviceIds {
  /// Create an empty set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Take the smallest free id.
  pub fn acquire(&mut self) -> u32 {
    let id = (0..)
      .zip(self.taken.iter())
      .find(|&(expected, &taken)| expected != taken)
      .map_or(self.taken.len() as u32, |(expected, _)| expected);

    self.taken.insert(id);
    id
  }

  /// Give `id` back. Returns `false` if it was not taken.
  pub fn release(&mut self, id: u32) -> bool {
    self.taken.remove(&id)
  }

  /// Whether `id` is currently taken.
  pub fn contains(&self, id: u32) -> bool {
    self.taken.contains(&id)
  }
}

/// Names of the keys currently held down.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyTracker {
  keys: Vec<String>,
}

impl KeyTracker {
  /// Create an empty set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a key press; `true` if the key was not held already.
  pub fn press(&mut self, key: &str) -> bool {
    if self.is_pressed(key) {
      false
    } else {
      self.keys.push(key.to_owned());
      true
    }
  }

  /// Record a key release; `true` if the key was held.
  pub fn release(&mut self, key: &str) -> bool {
    let len = self.keys.len();
    self.keys.retain(|k| k != key);
    self.keys.len() != len
  }

  /// Whether `key` is held down.
  pub fn is_pressed(&self, key: &str) -> bool {
    self.keys.iter().any(|k| k == key)
  }

  /// Held keys, oldest press first.
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.keys.iter().map(String::as_str)
  }

  /// Forget every held key.
  pub fn clear(&mut self) {
    self.keys.clear();
  }
}

fn set_pressed<B>(pressed: &mut Vec<B>, button: B, down: bool)
where
  B: PartialEq,
{
  if down {
    if !pressed.contains(&button) {
      pressed.push(button);
    }
  } else {
    pressed.retain(|b| *b != button);
  }
}

fn apply_deadzone(value: i16, deadzone: u32) -> i32 {
  let value = i32::from(value);

  if value.unsigned_abs() > deadzone {
    value
  } else {
    0
  }
}

/// A game controller with an optional rumble device.
pub struct Gamepad {
  id: u32,
  controller: GameController,
  haptic: Option<Haptic>,
  deadzone: u32,
  buttons_pressed: Vec<Button>,
}

impl Gamepad {
  /// Open the controller at `device_index` under the id `id`.
  pub fn open(
    subsystem: &GameControllerSubsystem,
    haptic: Option<&HapticSubsystem>,
    device_index: u32,
    id: u32,
  ) -> Result<Self, IntegerOrSdlError> {
    let controller = subsystem.open(device_index)?;

    let haptic = haptic.and_then(|h| match h.open_from_joystick_id(device_index) {
      Ok(haptic) => Some(haptic),
      Err(e) => {
        debug!("gamepad {} has no rumble: {}", id, e);
        None
      }
    });

    Ok(Gamepad {
      id,
      controller,
      haptic,
      deadzone: 0,
      buttons_pressed: Vec::new(),
    })
  }

  /// Id handed out when the device was opened.
  pub fn id(&self) -> u32 {
    self.id
  }

  /// SDL instance id, as found in events.
  pub fn instance_id(&self) -> u32 {
    self.controller.instance_id()
  }

  /// Name reported by the driver.
  pub fn name(&self) -> String {
    self.controller.name()
  }

  /// Number of axes.
  pub fn num_axes(&self) -> usize {
    GAMEPAD_AXES.len()
  }

  /// Number of buttons.
  pub fn num_buttons(&self) -> u32 {
    GAMEPAD_BUTTONS
  }

  /// Current deadzone.
  pub fn deadzone(&self) -> u32 {
    self.deadzone
  }

  /// Axis values whose magnitude does not exceed `deadzone` read as 0.
  pub fn set_deadzone(&mut self, deadzone: u32) {
    self.deadzone = deadzone;
  }

  /// Record a button press or release.
  pub fn set_button_state(&mut self, button: Button, pressed: bool) {
    set_pressed(&mut self.buttons_pressed, button, pressed);
  }

  /// Buttons currently held down.
  pub fn buttons_pressed(&self) -> &[Button] {
    &self.buttons_pressed
  }

  /// Deadzone-filtered value of `axis`.
  pub fn get_axis_value(&self, axis: Axis) -> i32 {
    self.filter_axis(self.controller.axis(axis))
  }

  pub(crate) fn filter_axis(&self, value: i16) -> i32 {
    apply_deadzone(value, self.deadzone)
  }

  /// Whether a haptic device was found.
  pub fn has_rumble(&self) -> bool {
    self.haptic.is_some()
  }

  /// Rumble with `magnitude` in `[0; 1]` for `duration` milliseconds.
  ///
  /// Returns `false` if the gamepad cannot rumble.
  pub fn play_rumble(&mut self, magnitude: f32, duration: u32) -> bool {
    match self.haptic {
      Some(ref mut haptic) => {
        haptic.rumble_play(magnitude.max(0.).min(1.), duration);
        true
      }
      None => false,
    }
  }

  /// Stop rumbling. Returns `false` if the gamepad cannot rumble.
  pub fn stop_rumble(&mut self) -> bool {
    match self.haptic {
      Some(ref mut haptic) => {
        haptic.rumble_stop();
        true
      }
      None => false,
    }
  }
}

/// A joystick that is not a game controller.
pub struct Joystick {
  id: u32,
  joystick: sdl2::joystick::Joystick,
  deadzone: u32,
  buttons_pressed: Vec<u8>,
  switches: Vec<u8>,
}

impl Joystick {
  /// Open the joystick at `device_index` under the id `id`.
  pub fn open(
    subsystem: &JoystickSubsystem,
    device_index: u32,
    id: u32,
  ) -> Result<Self, IntegerOrSdlError> {
    let joystick = subsystem.open(device_index)?;

    Ok(Joystick {
      id,
      joystick,
      deadzone: 0,
      buttons_pressed: Vec::new(),
      switches: Vec::new(),
    })
  }

  /// Id handed out when the device was opened.
  pub fn id(&self) -> u32 {
    self.id
  }

  /// SDL instance id, as found in events.
  pub fn instance_id(&self) -> u32 {
    self.joystick.instance_id()
  }

  /// Name reported by the driver.
  pub fn name(&self) -> String {
    self.joystick.name()
  }

  /// Number of axes.
  pub fn num_axes(&self) -> u32 {
    self.joystick.num_axes()
  }

  /// Number of buttons.
  pub fn num_buttons(&self) -> u32 {
    self.joystick.num_buttons()
  }

  /// Number of hats.
  pub fn num_hats(&self) -> u32 {
    self.joystick.num_hats()
  }

  /// Number of trackballs.
  pub fn num_balls(&self) -> u32 {
    self.joystick.num_balls()
  }

  /// Current deadzone.
  pub fn deadzone(&self) -> u32 {
    self.deadzone
  }

  /// Axis values whose magnitude does not exceed `deadzone` read as 0.
  pub fn set_deadzone(&mut self, deadzone: u32) {
    self.deadzone = deadzone;
  }

  /// Mark `button` as a switch: its presses are reported but it is never considered held.
  pub fn mark_switch(&mut self, button: u8, mark: bool) {
    set_pressed(&mut self.switches, button, mark);

    if mark {
      set_pressed(&mut self.buttons_pressed, button, false);
    }
  }

  /// Whether `button` was marked as a switch.
  pub fn is_switch(&self, button: u8) -> bool {
    self.switches.contains(&button)
  }

  /// Record a button press or release.
  pub fn set_button_state(&mut self, button: u8, pressed: bool) {
    if !self.is_switch(button) {
      set_pressed(&mut self.buttons_pressed, button, pressed);
    }
  }

  /// Buttons currently held down.
  pub fn buttons_pressed(&self) -> &[u8] {
    &self.buttons_pressed
  }

  /// Deadzone-filtered value of `axis`; 0 for an unknown axis.
  pub fn get_axis_value(&self, axis: u32) -> i32 {
    self.joystick.axis(axis).map_or(0, |v| self.filter_axis(v))
  }

  pub(crate) fn filter_axis(&self, value: i16) -> i32 {
    apply_deadzone(value, self.deadzone)
  }

  /// Position of `hat`; centered for an unknown hat.
  pub fn get_hat_value(&self, hat: u32) -> HatState {
    self.joystick.hat(hat).unwrap_or(HatState::Centered)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_are_first_free() {
    let mut ids = DeviceIds::new();

    assert_eq!(ids.acquire(), 0);
    assert_eq!(ids.acquire(), 1);
    assert_eq!(ids.acquire(), 2);

    assert!(ids.release(1));
    assert!(!ids.release(1));
    assert_eq!(ids.acquire(), 1);
    assert_eq!(ids.acquire(), 3);
  }

  #[test]
  fn ids_reuse_zero() {
    let mut ids = DeviceIds::new();
    ids.acquire();
    ids.acquire();
    ids.release(0);

    assert!(!ids.contains(0));
    assert_eq!(ids.acquire(), 0);
    assert!(ids.contains(0));
  }

  #[test]
  fn key_tracker() {
    let mut keys = KeyTracker::new();

    assert!(keys.press("W"));
    assert!(!keys.press("W"));
    assert!(keys.press("Left Shift"));
    assert!(keys.is_pressed("W"));
    assert_eq!(keys.iter().collect::<Vec<_>>(), vec!["W", "Left Shift"]);

    assert!(keys.release("W"));
    assert!(!keys.release("W"));
    assert!(!keys.is_pressed("W"));
    assert_eq!(keys.iter().count(), 1);
  }

  #[test]
  fn pressed_buttons() {
    let mut pressed = Vec::new();

    set_pressed(&mut pressed, 3u8, true);
    set_pressed(&mut pressed, 3, true);
    set_pressed(&mut pressed, 1, true);
    assert_eq!(pressed, vec![3, 1]);

    set_pressed(&mut pressed, 3, false);
    set_pressed(&mut pressed, 7, false);
    assert_eq!(pressed, vec![1]);
  }

  #[test]
  fn deadzone() {
    assert_eq!(apply_deadzone(100, 0), 100);
    assert_eq!(apply_deadzone(0, 0), 0);
    assert_eq!(apply_deadzone(100, 100), 0);
    assert_eq!(apply_deadzone(-101, 100), -101);
    assert_eq!(apply_deadzone(i16::MIN, 1000), i32::from(i16::MIN));
  }
}
