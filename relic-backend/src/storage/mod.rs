//! Media file storage.
//!
//! Writes uploaded image bytes under MEDIA_ROOT at the storage-relative
//! path computed by the ordering policy, and derives the public URL served
//! back to clients. Only the path layout is interesting here; the bytes
//! are opaque.

use std::fs;
use std::io;
use std::path::PathBuf;

pub struct MediaStore {
    root: PathBuf,
    base_url: String,
}

impl MediaStore {
    pub fn new(root: &str, base_url: &str) -> Self {
        MediaStore {
            root: PathBuf::from(root),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Write one file, creating parent directories as needed, and return
    /// its public URL.
    pub fn save(&self, relative_path: &str, bytes: &[u8]) -> io::Result<String> {
        let target = self.root.join(relative_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        Ok(self.url_for(relative_path))
    }

    /// Public URL for a storage-relative path. Relative paths always use
    /// forward slashes, so this is pure string assembly.
    pub fn url_for(&self, relative_path: &str) -> String {
        format!("{}/{}", self.base_url, relative_path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_creates_directories_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_str().unwrap(), "/media/");

        let url = store
            .save("feeds/f1/image_0_vase.jpg", b"jpegbytes")
            .unwrap();
        assert_eq!(url, "/media/feeds/f1/image_0_vase.jpg");

        let written = std::fs::read(dir.path().join("feeds/f1/image_0_vase.jpg")).unwrap();
        assert_eq!(written, b"jpegbytes");
    }

    #[test]
    fn test_url_join_is_slash_safe() {
        let store = MediaStore::new("/tmp/media", "/media");
        assert_eq!(store.url_for("a/b.jpg"), "/media/a/b.jpg");
        assert_eq!(store.url_for("/a/b.jpg"), "/media/a/b.jpg");
    }
}
