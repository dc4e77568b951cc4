use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use milepost_core::blob::{Container, ObjectMetadata};
use tokio::fs;

use crate::error::{Error, Result};

const META_DIR: &str = ".meta";

/// Container rooted at one directory.
#[derive(Clone)]
pub struct FsContainer {
  root: PathBuf,
}

impl FsContainer {
  /// Opens the container at `root`, creating it (and its metadata
  /// directory) if needed.
  pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
    let root = root.into();
    fs::create_dir_all(root.join(META_DIR)).await?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Object names are bare file names; anything that could escape the
  /// container root is rejected.
  fn object_path(&self, name: &str) -> Result<PathBuf> {
    let bare = !name.is_empty()
      && !name.starts_with('.')
      && !name.contains(['/', '\\']);
    if bare {
      Ok(self.root.join(name))
    } else {
      Err(Error::InvalidName(name.to_string()))
    }
  }

  /// Validated path of an object that must already exist.
  async fn require_object(&self, name: &str) -> Result<PathBuf> {
    let path = self.object_path(name)?;
    match fs::metadata(&path).await {
      Ok(_) => Ok(path),
      Err(e) if e.kind() == ErrorKind::NotFound => {
        Err(Error::NotFound(name.to_string()))
      }
      Err(e) => Err(e.into()),
    }
  }

  fn meta_path(&self, name: &str) -> PathBuf {
    self.root.join(META_DIR).join(format!("{name}.json"))
  }

  async fn read_metadata(&self, name: &str) -> Result<ObjectMetadata> {
    match fs::read(self.meta_path(name)).await {
      Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(ObjectMetadata::new()),
      Err(e) => Err(e.into()),
    }
  }
}

impl Container for FsContainer {
  type Error = Error;

  async fn list_objects(&self) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      if !entry.file_type().await?.is_file() {
        continue;
      }
      let Ok(name) = entry.file_name().into_string() else {
        continue;
      };
      if name.starts_with('.') {
        continue;
      }
      names.push(name);
    }
    names.sort();
    Ok(names)
  }

  async fn read_object(&self, name: String) -> Result<Vec<u8>> {
    let path = self.object_path(&name)?;
    match fs::read(path).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(name)),
      Err(e) => Err(e.into()),
    }
  }

  async fn object_metadata(&self, name: String) -> Result<ObjectMetadata> {
    self.require_object(&name).await?;
    self.read_metadata(&name).await
  }

  async fn set_object_metadata(
    &self,
    name: String,
    key: String,
    value: String,
  ) -> Result<()> {
    self.require_object(&name).await?;
    let mut metadata = self.read_metadata(&name).await?;
    metadata.insert(key, value);
    let bytes = serde_json::to_vec_pretty(&metadata)?;
    fs::write(self.meta_path(&name), bytes).await?;
    Ok(())
  }
}
