//! Texture loading and caching.
//!
//! [`TextureStore`] decodes PNG/JPEG files with the `image` crate, uploads
//! them as RGBA8 and caches the result by path. Loading the same path twice
//! returns the same [`TextureId`]. A 1x1 white texture is always available
//! as the fallback for materials that have not been given an image yet.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{GraphicsError, TextureError};

use super::device::{GraphicsDevice, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
pub struct TextureStore {
    white: TextureInfo,
    by_path: HashMap<PathBuf, TextureInfo>,
    paths: HashMap<TextureId, PathBuf>,
}

impl TextureStore {
    /// Create the store and its white fallback texture.
    pub fn new(device: &mut dyn GraphicsDevice) -> Result<Self, GraphicsError> {
        let id = device.create_texture(1, 1, &[255, 255, 255, 255])?;
        Ok(Self {
            white: TextureInfo {
                id,
                width: 1,
                height: 1,
            },
            by_path: HashMap::new(),
            paths: HashMap::new(),
        })
    }

    pub fn white(&self) -> TextureId {
        self.white.id
    }

    /// Decode and upload `path`, or return the cached texture.
    pub fn load(
        &mut self,
        device: &mut dyn GraphicsDevice,
        path: impl AsRef<Path>,
    ) -> Result<TextureInfo, TextureError> {
        let path = path.as_ref();
        if let Some(info) = self.by_path.get(path) {
            return Ok(*info);
        }
        let image = image::open(path).map_err(|e| TextureError::Decode {
            path: path.display().to_string(),
            source: e,
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let info = self.insert(device, path, width, height, rgba.as_raw())?;
        log::info!("loaded texture {} ({width}x{height})", path.display());
        Ok(info)
    }

    /// Upload already-decoded RGBA8 pixels and cache them under `key`.
    /// Replaces (and deletes) whatever was cached under the same key.
    pub fn insert(
        &mut self,
        device: &mut dyn GraphicsDevice,
        key: impl AsRef<Path>,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureInfo, TextureError> {
        let key = key.as_ref();
        let id = device.create_texture(width, height, rgba)?;
        self.remove(device, key);
        let info = TextureInfo { id, width, height };
        self.by_path.insert(key.to_path_buf(), info);
        self.paths.insert(id, key.to_path_buf());
        Ok(info)
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<TextureInfo> {
        self.by_path.get(path.as_ref()).copied()
    }

    /// The path a texture was loaded from.
    pub fn path_of(&self, id: TextureId) -> Option<&Path> {
        self.paths.get(&id).map(PathBuf::as_path)
    }

    /// Move a cached texture to a new key. Returns `false` if nothing is
    /// cached under `old`.
    pub fn rekey(&mut self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> bool {
        let Some(info) = self.by_path.remove(old.as_ref()) else {
            return false;
        };
        let new = new.as_ref().to_path_buf();
        self.paths.insert(info.id, new.clone());
        self.by_path.insert(new, info);
        true
    }

    /// Drop a cached texture and delete it on the device.
    pub fn remove(&mut self, device: &mut dyn GraphicsDevice, path: impl AsRef<Path>) -> bool {
        let Some(info) = self.by_path.remove(path.as_ref()) else {
            return false;
        };
        self.paths.remove(&info.id);
        device.delete_texture(info.id);
        true
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Delete every texture, including the white fallback.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, info) in self.by_path.drain() {
            device.delete_texture(info.id);
        }
        self.paths.clear();
        device.delete_texture(self.white.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    #[test]
    fn white_fallback_exists() {
        let mut device = HeadlessDevice::new();
        let store = TextureStore::new(&mut device).unwrap();
        assert_eq!(device.live_textures(), 1);
        assert!(store.path_of(store.white()).is_none());
    }

    #[test]
    fn cache_rekey_and_remove() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new(&mut device).unwrap();
        let a = store.insert(&mut device, "a.png", 2, 1, &[0; 8]).unwrap();
        assert_eq!(store.get("a.png"), Some(a));
        assert_eq!(store.path_of(a.id), Some(Path::new("a.png")));

        assert!(store.rekey("a.png", "b.png"));
        assert!(store.get("a.png").is_none());
        assert_eq!(store.path_of(a.id), Some(Path::new("b.png")));
        assert!(!store.rekey("a.png", "c.png"));

        assert!(store.remove(&mut device, "b.png"));
        assert!(!store.remove(&mut device, "b.png"));
        assert!(store.is_empty());
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn insert_replaces_existing_key() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new(&mut device).unwrap();
        store.insert(&mut device, "x", 1, 1, &[0; 4]).unwrap();
        let second = store.insert(&mut device, "x", 1, 1, &[9; 4]).unwrap();
        assert_eq!(store.get("x"), Some(second));
        assert_eq!(device.live_textures(), 2);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let mut device = HeadlessDevice::new();
        let mut store = TextureStore::new(&mut device).unwrap();
        let err = store.load(&mut device, "does/not/exist.png").unwrap_err();
        assert!(matches!(err, TextureError::Decode { .. }));
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.downcast_ref::<image::ImageError>().is_some());
        assert!(err.to_string().contains("does/not/exist.png"));
    }
}
