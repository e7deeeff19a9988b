//! TrueType text rendering.

use sdl2::pixels::{Color, PixelFormatEnum};
use sdl2::ttf::Sdl2TtfContext;
use sgltk::{Image, ImageError};
use std::error;
use std::fmt;

/// Error that can be risen while rendering text.
#[non_exhaustive]
#[derive(Debug)]
pub enum TextError {
  /// The font file is not in the image search paths.
  FontNotFound(String),
  /// The font file could not be opened.
  FontLoadFailed(String),
  /// SDL_ttf failed to render.
  RenderFailed(String),
  /// The rendered pixels could not be turned into an image.
  ImageError(ImageError),
}

impl fmt::Display for TextError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      TextError::FontNotFound(ref name) => write!(f, "cannot find font {}", name),
      TextError::FontLoadFailed(ref e) => write!(f, "cannot load font: {}", e),
      TextError::RenderFailed(ref e) => write!(f, "cannot render text: {}", e),
      TextError::ImageError(ref e) => write!(f, "image error: {}", e),
    }
  }
}

impl error::Error for TextError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      TextError::ImageError(e) => Some(e),
      _ => None,
    }
  }
}

/// Render `text` with antialiasing into a new image.
///
/// `font_name` is resolved through the image search paths; `color` is RGBA.
pub fn render_text(
  ttf: &Sdl2TtfContext,
  text: &str,
  font_name: &str,
  size: u16,
  color: [u8; 4],
) -> Result<Image, TextError> {
  let path = Image::find(font_name).ok_or_else(|| {
    log::error!("cannot find font {}", font_name);
    TextError::FontNotFound(font_name.to_owned())
  })?;

  let font = ttf
    .load_font(&path, size)
    .map_err(TextError::FontLoadFailed)?;

  let [r, g, b, a] = color;
  let surface = font
    .render(text)
    .blended(Color::RGBA(r, g, b, a))
    .map_err(|e| TextError::RenderFailed(e.to_string()))?;

  // RGBA bytes in memory order
  let format = if cfg!(target_endian = "big") {
    PixelFormatEnum::RGBA8888
  } else {
    PixelFormatEnum::ABGR8888
  };

  let surface = surface
    .convert_format(format)
    .map_err(TextError::RenderFailed)?;

  let (width, height) = (surface.width(), surface.height());
  let pitch = surface.pitch() as usize;
  let row = width as usize * 4;

  let pixels = surface.with_lock(|data| pack_rows(data, pitch, row, height as usize));

  Image::from_raw(width, height, 4, &pixels).map_err(TextError::ImageError)
}

// Drop the padding at the end of each row.
fn pack_rows(data: &[u8], pitch: usize, row: usize, rows: usize) -> Vec<u8> {
  data
    .chunks(pitch)
    .take(rows)
    .flat_map(|line| &line[..row.min(line.len())])
    .copied()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rows_are_packed() {
    let data = [1, 2, 0, 3, 4, 0];
    assert_eq!(pack_rows(&data, 3, 2, 2), vec![1, 2, 3, 4]);
  }

  #[test]
  fn tight_rows_are_untouched() {
    let data = [1, 2, 3, 4];
    assert_eq!(pack_rows(&data, 2, 2, 2), data.to_vec());
  }
}
