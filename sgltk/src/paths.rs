//! File search paths.
//!
//! Images, shaders and models are looked up through ordered lists of directories. Each family has
//! its own thread-local list, always starting with `./`.

use std::cell::RefCell;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// An ordered, de-duplicated list of directories.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SearchPaths {
  paths: Vec<String>,
}

impl Default for SearchPaths {
  fn default() -> Self {
    Self::new()
  }
}

impl SearchPaths {
  /// A list containing only the current directory.
  pub fn new() -> Self {
    SearchPaths {
      paths: vec!["./".to_owned()],
    }
  }

  /// Append a directory; a trailing `/` is added when missing. Duplicates are ignored.
  pub fn add_path(&mut self, path: &str) {
    let mut path = path.to_owned();

    if !path.ends_with('/') {
      path.push('/');
    }

    if !self.paths.contains(&path) {
      self.paths.push(path);
    }
  }

  /// Registered directories, in lookup order.
  pub fn paths(&self) -> &[String] {
    &self.paths
  }

  /// Find the first existing file called `name`.
  ///
  /// Absolute names are checked as is; relative ones are tried against every directory in order.
  pub fn resolve(&self, name: &str) -> Option<PathBuf> {
    if is_absolute(name) {
      let path = PathBuf::from(name);
      return if path.exists() { Some(path) } else { None };
    }

    self
      .paths
      .iter()
      .map(|dir| PathBuf::from(format!("{}{}", dir, name)))
      .find(|path| path.exists())
  }
}

/// Whether `name` is absolute: it starts with `/` or carries a drive letter (`C:`).
pub fn is_absolute(name: &str) -> bool {
  name.starts_with('/') || name.as_bytes().get(1) == Some(&b':')
}

/// Change the working directory to the directory of the running executable.
pub fn chdir_to_bin() -> io::Result<()> {
  let exe = env::current_exe()?;

  match exe.parent() {
    Some(dir) => env::set_current_dir(dir),
    None => Ok(()),
  }
}

/// Search path families.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Family {
  Image,
  Shader,
  Model,
}

thread_local! {
  static IMAGE_PATHS: RefCell<SearchPaths> = RefCell::new(SearchPaths::new());
  static SHADER_PATHS: RefCell<SearchPaths> = RefCell::new(SearchPaths::new());
  static MODEL_PATHS: RefCell<SearchPaths> = RefCell::new(SearchPaths::new());
}

pub(crate) fn with_paths<R>(family: Family, f: impl FnOnce(&mut SearchPaths) -> R) -> R {
  match family {
    Family::Image => IMAGE_PATHS.with(|p| f(&mut p.borrow_mut())),
    Family::Shader => SHADER_PATHS.with(|p| f(&mut p.borrow_mut())),
    Family::Model => MODEL_PATHS.with(|p| f(&mut p.borrow_mut())),
  }
}

pub(crate) fn resolve(family: Family, name: &str) -> Option<PathBuf> {
  with_paths(family, |paths| paths.resolve(name))
}

/// Directory part of `path` with a trailing `/`, or `./`.
pub(crate) fn parent_dir(path: &Path) -> String {
  match path.parent().and_then(Path::to_str) {
    Some(dir) if !dir.is_empty() => format!("{}/", dir.trim_end_matches('/')),
    _ => "./".to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  #[test]
  fn add_path_normalizes_and_dedups() {
    let mut paths = SearchPaths::new();
    paths.add_path("data/shaders");
    paths.add_path("data/shaders/");
    paths.add_path("./");

    assert_eq!(paths.paths(), &["./", "data/shaders/"]);
  }

  #[test]
  fn absolute_names() {
    assert!(is_absolute("/usr/share/fonts/a.ttf"));
    assert!(is_absolute("C:\\textures\\a.png"));
    assert!(!is_absolute("textures/a.png"));
    assert!(!is_absolute(""));
  }

  #[test]
  fn resolve_tries_directories_in_order() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    fs::write(second.path().join("tex.png"), b"x").unwrap();

    let mut paths = SearchPaths::new();
    paths.add_path(first.path().to_str().unwrap());
    paths.add_path(second.path().to_str().unwrap());

    let found = paths.resolve("tex.png").unwrap();
    assert_eq!(
      fs::canonicalize(found).unwrap(),
      fs::canonicalize(second.path().join("tex.png")).unwrap()
    );

    fs::write(first.path().join("tex.png"), b"y").unwrap();
    let found = paths.resolve("tex.png").unwrap();
    assert_eq!(fs::read(found).unwrap(), b"y");

    assert!(paths.resolve("missing.png").is_none());
  }

  #[test]
  fn resolve_absolute() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.obj");
    fs::write(&file, b"v 0 0 0").unwrap();

    let paths = SearchPaths::new();
    assert_eq!(paths.resolve(file.to_str().unwrap()), Some(file.clone()));
    assert!(paths.resolve(dir.path().join("b.obj").to_str().unwrap()).is_none());
  }

  #[test]
  fn parent_dirs() {
    assert_eq!(parent_dir(Path::new("models/cube.obj")), "models/");
    assert_eq!(parent_dir(Path::new("cube.obj")), "./");
  }
}
