use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::ObjectInfo;

/// A read surface over one directory tree. The process-wide
/// [`root_bucket`] scopes disk access for every [`DiskSource`].
///
/// [`DiskSource`]: super::DiskSource
#[derive(Debug)]
pub struct Bucket {
    root: PathBuf,
}

impl Bucket {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Bucket> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "`root` cannot be empty",
            ));
        }
        Ok(Bucket { root })
    }

    /// The root this bucket is scoped to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stat(&self, path: &Path) -> io::Result<ObjectInfo> {
        let local = self.resolve(path);
        let meta = std::fs::metadata(&local)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a file: {}", local.display()),
            ));
        }
        Ok(self.object_info(local))
    }

    pub fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn object_info(&self, local: PathBuf) -> ObjectInfo {
        let path = local
            .strip_prefix(&self.root)
            .unwrap_or(&local)
            .to_string_lossy()
            .replace('\\', "/");
        ObjectInfo {
            path,
            local_path: local,
        }
    }
}

/// The process root bucket. Scoped by `BUF_LSP_ROOT_PATH` when set,
/// otherwise the filesystem root (first volume root on Windows).
pub fn root_bucket() -> &'static Bucket {
    static ROOT: OnceLock<Bucket> = OnceLock::new();
    ROOT.get_or_init(|| {
        let root = match std::env::var("BUF_LSP_ROOT_PATH") {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => default_root(),
        };
        // the fallback roots are never empty, so this cannot fail
        Bucket::new(root).unwrap_or_else(|_| Bucket {
            root: default_root(),
        })
    })
}

#[cfg(windows)]
fn default_root() -> PathBuf {
    PathBuf::from("C:\\")
}

#[cfg(not(windows))]
fn default_root() -> PathBuf {
    PathBuf::from("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_root_is_rejected() {
        assert!(Bucket::new("").is_err());
    }

    #[test]
    fn stat_and_read_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.proto");
        let mut f = std::fs::File::create(&file).unwrap();
        f.write_all(b"syntax = \"proto3\";").unwrap();

        let bucket = Bucket::new(dir.path()).unwrap();
        let info = bucket.stat(&file).unwrap();
        assert_eq!(info.path, "a.proto");
        assert_eq!(info.local_path, file);
        assert_eq!(bucket.read(&file).unwrap(), b"syntax = \"proto3\";");
    }

    #[test]
    fn stat_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = Bucket::new(dir.path()).unwrap();
        assert!(bucket.stat(&dir.path().join("gone.proto")).is_err());
    }

    #[test]
    fn stat_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = Bucket::new(dir.path()).unwrap();
        assert!(bucket.stat(dir.path()).is_err());
    }
}
