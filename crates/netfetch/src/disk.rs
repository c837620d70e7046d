//! On-disk cache tier
//!
//! Layout: one file per downloaded URI directly under the base directory,
//! named by the lowercase-hex MD5 of the URI's canonical string. No index
//! file is kept; a correctly named file is a hit.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use bytes::Bytes;
use md5::{Digest, Md5};
use tracing::debug;
use url::Url;

/// Suffix of files still being written
const TMP_SUFFIX: &str = "tmp";

/// Content-hash addressed file store
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Base directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name used for `uri`
    pub fn key_for(uri: &Url) -> String {
        format!("{:x}", Md5::digest(uri.as_str().as_bytes()))
    }

    /// Full path of the file for `uri`
    pub fn path_for(&self, uri: &Url) -> PathBuf {
        self.dir.join(Self::key_for(uri))
    }

    /// Read the cached bytes for `uri`, if present
    pub fn load(&self, uri: &Url) -> io::Result<Option<Bytes>> {
        match fs::read(self.path_for(uri)) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist `data` for `uri`
    ///
    /// Writes a sibling temp file and renames it over the target, so readers
    /// never see a partial file.
    pub fn store(&self, uri: &Url, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(uri);
        let tmp = path.with_extension(TMP_SUFFIX);

        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        debug!(%uri, path = %path.display(), bytes = data.len(), "Stored on disk");
        Ok(path)
    }

    /// Delete the cached file for `uri`
    pub fn remove(&self, uri: &Url) -> io::Result<bool> {
        match fs::remove_file(self.path_for(uri)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete every cached file, returning how many were removed
    pub fn clear(&self) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_key_is_md5_hex() {
        // md5("http://example.com/")
        let key = DiskCache::key_for(&uri("http://example.com"));
        assert_eq!(key, "a6bf1757fff057f266b697df9cf176fd");
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_store_and_load() {
        let dir = TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path().join("nested")).unwrap();
        let u = uri("https://example.com/a.png");

        assert_eq!(disk.load(&u).unwrap(), None);

        let path = disk.store(&u, b"payload").unwrap();
        assert!(path.ends_with(DiskCache::key_for(&u)));
        assert_eq!(disk.load(&u).unwrap().unwrap(), Bytes::from_static(b"payload"));
        assert!(!path.with_extension(TMP_SUFFIX).exists());
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path()).unwrap();
        let a = uri("https://example.com/a");
        let b = uri("https://example.com/b");

        disk.store(&a, b"a").unwrap();
        disk.store(&b, b"b").unwrap();

        assert!(disk.remove(&a).unwrap());
        assert!(!disk.remove(&a).unwrap());
        assert_eq!(disk.clear().unwrap(), 1);
        assert_eq!(disk.load(&b).unwrap(), None);
    }
}
