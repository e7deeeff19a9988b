//! Millisecond timer.

use std::time::Instant;

/// A restartable stopwatch.
#[derive(Clone, Copy, Debug)]
pub struct Timer {
  start: Instant,
}

impl Default for Timer {
  fn default() -> Self {
    Self::new()
  }
}

impl Timer {
  /// Create a timer; it starts immediately.
  pub fn new() -> Self {
    Timer {
      start: Instant::now(),
    }
  }

  /// Restart the timer.
  pub fn start(&mut self) {
    self.start = Instant::now();
  }

  /// Milliseconds elapsed since the last start.
  pub fn get_time(&self) -> f64 {
    self.start.elapsed().as_secs_f64() * 1000.
  }

  /// Seconds elapsed since the last start.
  pub fn get_time_s(&self) -> f64 {
    self.start.elapsed().as_secs_f64()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn elapsed_time_grows_and_restarts() {
    let mut timer = Timer::new();
    thread::sleep(Duration::from_millis(20));

    let t = timer.get_time();
    assert!(t >= 20.);
    assert!((timer.get_time_s() * 1000. - t).abs() < 100.);

    timer.start();
    assert!(timer.get_time() < t);
  }
}
