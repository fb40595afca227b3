use std::path::PathBuf;

use crate::{backend::ContainerKind, metadata::PixelType};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    #[error("file {} not recognized as ND2. First 4 bytes: {magic:?}", .path.display())]
    UnrecognizedSignature { path: PathBuf, magic: Vec<u8> },
    #[error("no backend registered for {0} ND2 files")]
    BackendUnavailable(ContainerKind),
    #[error("{0:?} is not a valid position name")]
    InvalidPositionName(String),
    #[error("position {position} is out of range. Only {available} position(s) available")]
    PositionOutOfRange { position: usize, available: usize },
    #[error("cannot get chunk {0:?}")]
    InvalidBlock(Vec<u64>),
    #[error("frame {index} is out of range for {count} frame(s)")]
    FrameOutOfRange { index: usize, count: usize },
    #[error("frame buffer has {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("unsupported pixel data type {kind:?} with {bits} bits per component")]
    UnsupportedPixelType { kind: String, bits: u32 },
    #[error("requested {requested} elements but the file holds {actual}")]
    PixelTypeMismatch {
        requested: PixelType,
        actual: PixelType,
    },
    #[error("file {} is closed", .0.display())]
    Closed(PathBuf),
    #[error("file handle backing this store has been dropped")]
    FileDropped,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(error))
    }
}
