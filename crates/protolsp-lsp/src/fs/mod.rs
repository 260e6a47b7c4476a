//! The three-layer virtual file system: editor overlays over
//! module-provided sources over the local disk, all behind one uniform
//! read/stat/close surface.

mod bucket;
mod disk;
mod facade;
mod module;
mod multi;
mod overlay;
mod uri;

pub use bucket::{root_bucket, Bucket};
pub use disk::DiskSource;
pub use facade::{Filesystem, Folder, FsResolver};
pub use module::ModuleSource;
pub use multi::MultiSource;
pub use overlay::{Overlay, OverlayFs};
pub use uri::{relative_path, Uri};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Metadata for one file of a source: where it sits in its module and
/// where it sits on the local machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub path: String,
    pub local_path: PathBuf,
}

/// A read-only view of a file's bytes at a specific version. Disk and
/// module handles report version `-1`; overlay handles report the
/// client-supplied version.
pub trait Handle: Send + Sync {
    fn uri(&self) -> Uri;

    fn version(&self) -> i32;

    fn content(&self) -> Result<Arc<[u8]>, FsError>;

    /// Module-relative path, for handles that know one.
    fn path(&self) -> Option<Uri> {
        None
    }
}

impl fmt::Debug for dyn Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("uri", &self.uri())
            .field("version", &self.version())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidUriReason {
    OnlyAcceptRelativeUri,
    OnlyAcceptDocumentUri,
}

impl fmt::Display for InvalidUriReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidUriReason::OnlyAcceptRelativeUri => f.write_str("only accept RelativeURI"),
            InvalidUriReason::OnlyAcceptDocumentUri => f.write_str("only accept DocumentURI"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FsError {
    #[error("invalid URI: `{uri}`, {reason}")]
    InvalidUri { uri: Uri, reason: InvalidUriReason },

    #[error("file does not exist: `{0}`")]
    NotExist(Uri),

    #[error("empty DocumentURI")]
    EmptyUri,

    #[error("overlay `{uri}` is outside root `{root}`")]
    OutsideRoot { uri: Uri, root: PathBuf },

    #[error("read `{uri}`: {message}")]
    Read { uri: Uri, message: String },

    #[error("workspace for folder `{folder}`: {message}")]
    Workspace { folder: String, message: String },
}

impl FsError {
    pub fn is_not_exist(&self) -> bool {
        matches!(self, FsError::NotExist(_))
    }
}

/// The tagged source variants. `Multi` composes the others in order
/// with first-hit semantics; `Overlay` shadows whatever sits below it.
#[derive(Clone)]
pub enum Source {
    Disk(Arc<DiskSource>),
    Module(Arc<ModuleSource>),
    Overlay(Arc<OverlayFs>),
    Multi(Arc<MultiSource>),
}

impl Source {
    pub fn read_file(&self, uri: &Uri) -> Result<Arc<dyn Handle>, FsError> {
        match self {
            Source::Disk(s) => s.read_file(uri),
            Source::Module(s) => s.read_file(uri),
            Source::Overlay(s) => s.read_file(uri),
            Source::Multi(s) => s.read_file(uri),
        }
    }

    pub fn stat(&self, uri: &Uri) -> Result<ObjectInfo, FsError> {
        match self {
            Source::Disk(s) => s.stat(uri),
            Source::Module(s) => s.stat(uri),
            Source::Overlay(s) => s.stat(uri),
            Source::Multi(s) => s.stat(uri),
        }
    }

    pub fn close(&self, uri: &Uri) {
        match self {
            Source::Disk(s) => s.close(uri),
            Source::Module(s) => s.close(uri),
            Source::Overlay(s) => s.close(uri),
            Source::Multi(s) => s.close(uri),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Disk(_) => f.write_str("Source::Disk"),
            Source::Module(_) => f.write_str("Source::Module"),
            Source::Overlay(_) => f.write_str("Source::Overlay"),
            Source::Multi(s) => write!(f, "Source::Multi({})", s.sources().len()),
        }
    }
}
