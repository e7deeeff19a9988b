//! CPU side RGBA images.

use image::{imageops, DynamicImage, GrayAlphaImage, GrayImage, RgbImage, Rgba, RgbaImage};
use std::error;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::paths::{self, Family};

/// Image error.
#[non_exhaustive]
#[derive(Debug)]
pub enum ImageError {
  /// No search path contains the file.
  NotFound(String),
  /// Decoding or encoding failed.
  Codec(image::ImageError),
  /// The operation needs pixels but the image is empty.
  Empty,
  /// Raw data is too short for the requested size.
  InvalidData {
    /// Expected number of bytes.
    expected: usize,
    /// Provided number of bytes.
    got: usize,
  },
  /// Unsupported number of bytes per pixel.
  UnsupportedBytesPerPixel(u32),
}

impl fmt::Display for ImageError {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    match *self {
      ImageError::NotFound(ref name) => write!(f, "image not found: {}", name),
      ImageError::Codec(ref e) => write!(f, "image codec error: {}", e),
      ImageError::Empty => f.write_str("empty image"),
      ImageError::InvalidData { expected, got } => {
        write!(f, "expected {} bytes of pixel data, got {}", expected, got)
      }
      ImageError::UnsupportedBytesPerPixel(bpp) => {
        write!(f, "unsupported bytes per pixel: {}", bpp)
      }
    }
  }
}

impl error::Error for ImageError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      ImageError::Codec(e) => Some(e),
      _ => None,
    }
  }
}

impl From<image::ImageError> for ImageError {
  fn from(e: image::ImageError) -> Self {
    ImageError::Codec(e)
  }
}

/// A rectangle in pixels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rect {
  /// Left edge.
  pub x: i32,
  /// Top edge.
  pub y: i32,
  /// Width.
  pub w: u32,
  /// Height.
  pub h: u32,
}

impl Rect {
  /// Create a rectangle.
  pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
    Rect { x, y, w, h }
  }
}

/// An RGBA8 image, possibly empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
  img: Option<RgbaImage>,
}

impl From<RgbaImage> for Image {
  fn from(img: RgbaImage) -> Self {
    Image { img: Some(img) }
  }
}

impl Image {
  /// An empty image.
  pub fn new() -> Self {
    Image { img: None }
  }

  /// Add a directory to the image search paths.
  pub fn add_path(path: &str) {
    paths::with_paths(Family::Image, |p| p.add_path(path));
  }

  /// Resolve `name` through the image search paths.
  pub fn find(name: &str) -> Option<PathBuf> {
    paths::resolve(Family::Image, name)
  }

  /// Replace the content with a fully transparent `width` × `height` image.
  pub fn create_empty(&mut self, width: u32, height: u32) {
    self.img = Some(RgbaImage::new(width, height));
  }

  /// Load and decode `name`, found through the image search paths.
  pub fn load(&mut self, name: &str) -> Result<(), ImageError> {
    let path = paths::resolve(Family::Image, name).ok_or_else(|| {
      log::error!("cannot find image {}", name);
      ImageError::NotFound(name.to_owned())
    })?;

    self.load_path(&path)
  }

  /// Load and decode the file at `path`.
  pub fn load_path(&mut self, path: &Path) -> Result<(), ImageError> {
    let img = image::open(path).map_err(|e| {
      log::error!("cannot decode image {}: {}", path.display(), e);
      e
    })?;

    self.img = Some(img.to_rgba8());
    Ok(())
  }

  /// Build an image from raw pixels with 1 (grey), 2 (grey, alpha), 3 (RGB) or 4 (RGBA) bytes per
  /// pixel.
  pub fn from_raw(
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    data: &[u8],
  ) -> Result<Self, ImageError> {
    if bytes_per_pixel == 0 || bytes_per_pixel > 4 {
      return Err(ImageError::UnsupportedBytesPerPixel(bytes_per_pixel));
    }

    let expected = width as usize * height as usize * bytes_per_pixel as usize;
    if data.len() < expected {
      return Err(ImageError::InvalidData {
        expected,
        got: data.len(),
      });
    }

    let data = data[..expected].to_vec();
    let dynamic = match bytes_per_pixel {
      1 => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
      2 => GrayAlphaImage::from_raw(width, height, data).map(DynamicImage::ImageLumaA8),
      3 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
      _ => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
    };

    dynamic
      .map(|i| Image::from(i.to_rgba8()))
      .ok_or(ImageError::InvalidData {
        expected,
        got: expected,
      })
  }

  /// Encode to `path`; the format follows the extension.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let img = self.img.as_ref().ok_or(ImageError::Empty)?;
    img.save(path.as_ref())?;
    Ok(())
  }

  /// Width in pixels; zero when empty.
  pub fn width(&self) -> u32 {
    self.img.as_ref().map_or(0, |i| i.width())
  }

  /// Height in pixels; zero when empty.
  pub fn height(&self) -> u32 {
    self.img.as_ref().map_or(0, |i| i.height())
  }

  /// Whether the image holds no pixels.
  pub fn is_empty(&self) -> bool {
    self.img.is_none()
  }

  /// Raw RGBA8 bytes, row by row from the top.
  pub fn as_raw(&self) -> &[u8] {
    self.img.as_ref().map_or(&[][..], |i| i.as_raw().as_slice())
  }

  /// Underlying buffer.
  pub fn as_rgba(&self) -> Option<&RgbaImage> {
    self.img.as_ref()
  }

  /// Pixel at `(x, y)`, if inside the image.
  pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
    let img = self.img.as_ref()?;

    if x < img.width() && y < img.height() {
      Some(img.get_pixel(x, y).0)
    } else {
      None
    }
  }

  /// Alpha blend `src` onto this image with its top left corner at `(x, y)`.
  ///
  /// Pixels falling outside are clipped. An empty destination first becomes a copy of `src`.
  pub fn copy_from(&mut self, src: &Image, x: i32, y: i32) -> Result<(), ImageError> {
    let src_rect = Rect::new(0, 0, src.width(), src.height());
    self.copy_rect(src, Rect::new(x, y, src.width(), src.height()), src_rect)
  }

  /// Alpha blend the `src_rect` part of `src` into `dst_rect`; no scaling happens, the copied
  /// area is the intersection of both rectangle sizes.
  pub fn copy_rect(
    &mut self,
    src: &Image,
    dst_rect: Rect,
    src_rect: Rect) -> Result<(), ImageError> {
    let src_img = src.img.as_ref().ok_or(ImageError::Empty)?;

    if self.img.is_none() {
      self.img = Some(src_img.clone());

      // the region already sits in place
      if (dst_rect.x, dst_rect.y) == (src_rect.x, src_rect.y) {
        return Ok(());
      }
    }

    let dst = match self.img.as_mut() {
      Some(dst) => dst,
      None => return Err(ImageError::Empty),
    };

    let w = dst_rect.w.min(src_rect.w) as i64;
    let h = dst_rect.h.min(src_rect.h) as i64;

    for j in 0..h {
      for i in 0..w {
        let (sx, sy) = (src_rect.x as i64 + i, src_rect.y as i64 + j);
        let (dx, dy) = (dst_rect.x as i64 + i, dst_rect.y as i64 + j);

        if !inside(sx, sy, src_img.width(), src_img.height())
          || !inside(dx, dy, dst.width(), dst.height())
        {
          continue;
        }

        let s = *src_img.get_pixel(sx as u32, sy as u32);
        let d = dst.get_pixel_mut(dx as u32, dy as u32);
        *d = blend(s, *d);
      }
    }

    Ok(())
  }

  /// Mirror the rows.
  pub fn vertical_flip(&mut self) {
    if let Some(img) = self.img.as_mut() {
      *img = imageops::flip_vertical(&*img);
    }
  }

  /// Mirror the columns.
  pub fn horizontal_flip(&mut self) {
    if let Some(img) = self.img.as_mut() {
      *img = imageops::flip_horizontal(&*img);
    }
  }

  /// Make every pixel of color `(r, g, b)` fully transparent.
  pub fn set_color_key(&mut self, r: u8, g: u8, b: u8) {
    if let Some(img) = self.img.as_mut() {
      for p in img.pixels_mut().filter(|p| p.0[..3] == [r, g, b]) {
        p.0[3] = 0;
      }
    }
  }
}

fn inside(x: i64, y: i64, w: u32, h: u32) -> bool {
  x >= 0 && y >= 0 && x < w as i64 && y < h as i64
}

// source over destination
fn blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
  let sa = src.0[3] as u32;
  let mix = |s: u8, d: u8| ((s as u32 * sa + d as u32 * (255 - sa) + 127) / 255) as u8;
  let alpha = sa + (dst.0[3] as u32 * (255 - sa) + 127) / 255;

  Rgba([
    mix(src.0[0], dst.0[0]),
    mix(src.0[1], dst.0[1]),
    mix(src.0[2], dst.0[2]),
    alpha as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn solid(w: u32, h: u32, color: [u8; 4]) -> Image {
    Image::from(RgbaImage::from_pixel(w, h, Rgba(color)))
  }

  #[test]
  fn empty_image() {
    let mut img = Image::new();
    assert!(img.is_empty());
    assert_eq!(img.width(), 0);
    assert!(img.as_raw().is_empty());

    img.create_empty(3, 2);
    assert_eq!((img.width(), img.height()), (3, 2));
    assert_eq!(img.pixel(2, 1), Some([0, 0, 0, 0]));
    assert_eq!(img.pixel(3, 0), None);
  }

  #[test]
  fn raw_pixel_layouts() {
    let grey = Image::from_raw(2, 1, 1, &[10, 200]).unwrap();
    assert_eq!(grey.pixel(1, 0), Some([200, 200, 200, 255]));

    let grey_alpha = Image::from_raw(1, 1, 2, &[10, 20]).unwrap();
    assert_eq!(grey_alpha.pixel(0, 0), Some([10, 10, 10, 20]));

    let rgb = Image::from_raw(1, 1, 3, &[1, 2, 3]).unwrap();
    assert_eq!(rgb.pixel(0, 0), Some([1, 2, 3, 255]));

    let rgba = Image::from_raw(1, 1, 4, &[1, 2, 3, 4]).unwrap();
    assert_eq!(rgba.pixel(0, 0), Some([1, 2, 3, 4]));

    assert!(matches!(
      Image::from_raw(2, 2, 3, &[0; 5]),
      Err(ImageError::InvalidData { expected: 12, got: 5 })
    ));
    assert!(matches!(
      Image::from_raw(1, 1, 5, &[0; 5]),
      Err(ImageError::UnsupportedBytesPerPixel(5))
    ));
  }

  #[test]
  fn copy_blends_and_clips() {
    let mut dst = solid(4, 4, [0, 0, 255, 255]);
    let src = solid(2, 2, [255, 0, 0, 255]);

    // only the bottom right pixel of src lands inside
    dst.copy_from(&src, -1, -1).unwrap();
    assert_eq!(dst.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(dst.pixel(1, 0), Some([0, 0, 255, 255]));
    assert_eq!(dst.pixel(0, 1), Some([0, 0, 255, 255]));

    // half transparent red over blue
    let src = solid(1, 1, [255, 0, 0, 128]);
    dst.copy_from(&src, 3, 3).unwrap();
    assert_eq!(dst.pixel(3, 3), Some([128, 0, 127, 255]));

    // fully transparent does nothing
    let src = solid(4, 4, [9, 9, 9, 0]);
    dst.copy_from(&src, 0, 0).unwrap();
    assert_eq!(dst.pixel(2, 2), Some([0, 0, 255, 255]));
  }

  #[test]
  fn copy_into_empty_creates_destination() {
    let mut dst = Image::new();
    let src = solid(2, 3, [1, 2, 3, 255]);

    dst.copy_from(&src, 0, 0).unwrap();
    assert_eq!((dst.width(), dst.height()), (2, 3));
    assert_eq!(dst.pixel(1, 2), Some([1, 2, 3, 255]));

    assert!(matches!(
      Image::new().copy_from(&Image::new(), 0, 0),
      Err(ImageError::Empty)
    ));
  }

  #[test]
  fn copy_into_empty_keeps_translucent_pixels() {
    let mut dst = Image::new();
    dst.copy_from(&solid(1, 1, [200, 100, 50, 128]), 0, 0).unwrap();
    assert_eq!(dst.pixel(0, 0), Some([200, 100, 50, 128]));
  }

  #[test]
  fn copy_rect_uses_source_region() {
    let mut src = solid(4, 1, [0, 0, 0, 255]);
    src.img.as_mut().unwrap().put_pixel(2, 0, Rgba([7, 7, 7, 255]));

    let mut dst = solid(2, 2, [255, 255, 255, 255]);
    dst
      .copy_rect(&src, Rect::new(1, 1, 1, 1), Rect::new(2, 0, 2, 1))
      .unwrap();

    assert_eq!(dst.pixel(1, 1), Some([7, 7, 7, 255]));
    assert_eq!(dst.pixel(0, 1), Some([255, 255, 255, 255]));
  }

  #[test]
  fn flips() {
    let mut img = Image::from_raw(2, 2, 1, &[1, 2, 3, 4]).unwrap();

    img.vertical_flip();
    assert_eq!(img.pixel(0, 0).unwrap()[0], 3);

    img.horizontal_flip();
    assert_eq!(img.pixel(0, 0).unwrap()[0], 4);
    assert_eq!(img.pixel(1, 1).unwrap()[0], 1);
  }

  #[test]
  fn color_key() {
    let mut img = Image::from_raw(2, 1, 3, &[255, 0, 255, 1, 2, 3]).unwrap();
    img.set_color_key(255, 0, 255);

    assert_eq!(img.pixel(0, 0), Some([255, 0, 255, 0]));
    assert_eq!(img.pixel(1, 0), Some([1, 2, 3, 255]));
  }

  #[test]
  fn save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shot.png");

    let img = solid(3, 2, [10, 20, 30, 255]);
    img.save(&path).unwrap();

    let mut loaded = Image::new();
    loaded.load(path.to_str().unwrap()).unwrap();
    assert_eq!(loaded, img);

    assert!(matches!(
      Image::new().load("definitely/not/here.png"),
      Err(ImageError::NotFound(_))
    ));
    assert!(matches!(Image::new().save(&path), Err(ImageError::Empty)));
  }
}
