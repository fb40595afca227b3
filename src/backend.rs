//! The low-level container readers, and dispatch between them by file signature.
//!
//! Readers for each container generation register themselves through [`inventory`]:
//!
//! ```ignore
//! inventory::submit! {
//!     BackendPlugin::new(ContainerKind::Modern, "my-reader", MyReader::create)
//! }
//! ```
use std::{fmt, fs::File, io::Read, path::Path};

use bytes::Bytes;
use log::debug;

use crate::metadata::{Attributes, CoordInfo, ExperimentLoop, VoxelSize};

/// Signature of current (V3 chunk map) ND2 files.
pub const MODERN_MAGIC: [u8; 4] = [0xda, 0xce, 0xbe, 0x0a];
/// Signature of legacy (JPEG2000) ND2 files.
pub const LEGACY_MAGIC: [u8; 4] = [0x00, 0x00, 0x00, 0x0c];

/// Container generation, identified by the first four bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Modern,
    Legacy,
}

impl ContainerKind {
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        if magic == MODERN_MAGIC {
            Some(Self::Modern)
        } else if magic == LEGACY_MAGIC {
            Some(Self::Legacy)
        } else {
            None
        }
    }

    pub fn magic(self) -> [u8; 4] {
        match self {
            Self::Modern => MODERN_MAGIC,
            Self::Legacy => LEGACY_MAGIC,
        }
    }

    /// Read the signature of the file at `path`.
    pub fn detect(path: &Path) -> crate::Result<Self> {
        let magic = read_magic(path)?;
        Self::from_magic(&magic).ok_or_else(|| crate::Error::UnrecognizedSignature {
            path: path.to_path_buf(),
            magic,
        })
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modern => f.write_str("modern"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// Up to the first four bytes of a file.
fn read_magic(path: &Path) -> crate::Result<Vec<u8>> {
    let mut magic = Vec::with_capacity(4);
    File::open(path)?.take(4).read_to_end(&mut magic)?;
    Ok(magic)
}

/// Whether the file at `path` carries a recognised ND2 signature.
pub fn is_supported_file(path: impl AsRef<Path>) -> crate::Result<bool> {
    let magic = read_magic(path.as_ref())?;
    Ok(ContainerKind::from_magic(&magic).is_some())
}

/// A reader for one container generation.
///
/// Readers are shared between threads by lazy arrays,
/// so [`Backend::read_frame`] must be safe to call concurrently.
pub trait Backend: Send + Sync {
    /// Re-open the underlying file after [`Backend::close`].
    fn open(&mut self) -> crate::Result<()>;

    fn close(&mut self) -> crate::Result<()>;

    fn attributes(&self) -> crate::Result<Attributes>;

    /// Miscellaneous text metadata; the `description` entry may name the dimensions.
    fn text_info(&self) -> crate::Result<serde_json::Map<String, serde_json::Value>>;

    /// Experiment loops in declaration order.
    fn experiment(&self) -> crate::Result<Vec<ExperimentLoop>>;

    fn metadata(&self) -> crate::Result<serde_json::Value>;

    fn voxel_size(&self) -> crate::Result<VoxelSize>;

    fn channel_names(&self) -> crate::Result<Vec<String>>;

    fn custom_data(&self) -> crate::Result<serde_json::Map<String, serde_json::Value>>;

    fn coord_info(&self) -> crate::Result<Vec<CoordInfo>>;

    /// Raw little-endian pixel bytes of frame `index`, in `(Y, X, C, S)` order.
    fn read_frame(&self, index: usize) -> crate::Result<Bytes>;
}

/// Constructor for an opened backend.
pub type CreateBackendFn = fn(&Path) -> crate::Result<Box<dyn Backend>>;

/// A backend registered for one container generation.
pub struct BackendPlugin {
    kind: ContainerKind,
    identifier: &'static str,
    create_fn: CreateBackendFn,
}
inventory::collect!(BackendPlugin);

impl BackendPlugin {
    pub const fn new(kind: ContainerKind, identifier: &'static str, create_fn: CreateBackendFn) -> Self {
        Self {
            kind,
            identifier,
            create_fn,
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn identifier(&self) -> &'static str {
        self.identifier
    }

    pub fn create(&self, path: &Path) -> crate::Result<Box<dyn Backend>> {
        (self.create_fn)(path)
    }
}

/// Open the file at `path` with the backend registered for its signature.
pub fn open_backend(path: &Path) -> crate::Result<(ContainerKind, Box<dyn Backend>)> {
    let kind = ContainerKind::detect(path)?;
    let plugin = inventory::iter::<BackendPlugin>
        .into_iter()
        .find(|p| p.kind == kind)
        .ok_or(crate::Error::BackendUnavailable(kind))?;
    debug!(
        "opening {} as {kind} ND2 with {}",
        path.display(),
        plugin.identifier
    );
    Ok((kind, plugin.create(path)?))
}
