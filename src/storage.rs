use std::sync::{Arc, Weak};

use bytes::Bytes;
use log::trace;
use zarrs::{
    metadata::v3::NodeMetadataV3,
    storage::{
        MaybeBytes, MaybeBytesIterator, ReadableStorageTraits, StorageError, StoreKey,
        byte_range::{ByteRange, ByteRangeIterator},
    },
};

use crate::{
    axis::Axis,
    file::Nd2File,
    index::index_from_coords,
    metadata::frame_array_metadata,
};

#[cfg(feature = "async")]
mod asynch;

const METADATA_KEY: &str = "zarr.json";
const CHUNK_PREFIX: &str = "c/";

/// Where the value of one coordinate axis comes from when resolving a chunk.
#[derive(Debug, Clone, Copy)]
enum CoordSource {
    /// The chunk index along this array dimension.
    Block(usize),
    Fixed(usize),
}

/// Which dimensions a [`FrameStore`] exposes.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreView {
    /// Restrict the position axis to a single position.
    pub position: Option<usize>,
    /// Drop the restricted position dimension rather than keeping it with extent 1.
    pub squeeze_position: bool,
    /// Unit dimensions prepended to the array.
    pub leading: Vec<Axis>,
}

/// A read-only Zarr V3 store presenting an ND2 file as a single array at the root.
///
/// Every chunk is one frame: extent 1 along each non-frame dimension and the
/// full extent along the frame dimensions. Chunks are read from the file
/// only when requested.
///
/// The store holds a weak reference to its [`Nd2File`], re-opening it if it
/// has been closed.
pub struct FrameStore {
    file: Weak<Nd2File>,
    copy: bool,
    dims: Vec<Axis>,
    shape: Vec<u64>,
    /// Number of chunks along each dimension.
    grid_shape: Vec<u64>,
    coord_sources: Vec<CoordSource>,
    coord_shape: Vec<usize>,
    chunk_bytes: u64,
    metadata: Bytes,
}

impl FrameStore {
    /// Create a store over every frame of `file`.
    ///
    /// With `copy`, each chunk is copied out of the backend's buffer;
    /// otherwise chunks share the backend's buffer where possible, which avoids
    /// a copy per frame but keeps that buffer alive for as long as the chunk is.
    pub fn new(file: &Arc<Nd2File>, copy: bool) -> crate::Result<Self> {
        Self::with_view(file, copy, &StoreView::default())
    }

    pub(crate) fn with_view(file: &Arc<Nd2File>, copy: bool, view: &StoreView) -> crate::Result<Self> {
        let sizes = file.sizes()?;
        let pixel_type = file.pixel_type()?;

        let mut dims = Vec::new();
        let mut shape = Vec::new();
        let mut grid_shape = Vec::new();
        for &axis in &view.leading {
            dims.push(axis);
            shape.push(1);
            grid_shape.push(1);
        }

        let mut coord_sources = Vec::new();
        let mut coord_shape = Vec::new();
        for (axis, n) in sizes.iter().filter(|(a, _)| !a.is_frame_axis()) {
            coord_shape.push(n);
            match (axis, view.position) {
                (Axis::Position, Some(p)) => {
                    coord_sources.push(CoordSource::Fixed(p));
                    if !view.squeeze_position {
                        dims.push(axis);
                        shape.push(1);
                        grid_shape.push(1);
                    }
                }
                _ => {
                    coord_sources.push(CoordSource::Block(dims.len()));
                    dims.push(axis);
                    shape.push(n as u64);
                    grid_shape.push(n as u64);
                }
            }
        }

        let mut chunk_shape: Vec<u64> = vec![1; dims.len()];
        for (axis, n) in sizes.iter().filter(|(a, _)| a.is_frame_axis()) {
            dims.push(axis);
            shape.push(n as u64);
            grid_shape.push(1);
            chunk_shape.push(n as u64);
        }
        let chunk_bytes = chunk_shape.iter().product::<u64>() * pixel_type.size() as u64;

        let attributes = match file.metadata_bundle()? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let array_metadata =
            frame_array_metadata(shape.clone(), &chunk_shape, pixel_type, &dims, attributes)?;
        let metadata = serde_json::to_vec(&NodeMetadataV3::Array(array_metadata))?;

        Ok(Self {
            file: Arc::downgrade(file),
            copy,
            dims,
            shape,
            grid_shape,
            coord_sources,
            coord_shape,
            chunk_bytes,
            metadata: Bytes::from(metadata),
        })
    }

    /// Axis of each array dimension.
    pub fn dims(&self) -> &[Axis] {
        &self.dims
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Whether chunks are copied out of the backend's buffer.
    pub fn copies(&self) -> bool {
        self.copy
    }

    /// Read the frame backing chunk `block`.
    ///
    /// An empty `block` is a shape probe and returns `None` without reading anything.
    pub fn block(&self, block: &[u64]) -> crate::Result<Option<Bytes>> {
        if block.is_empty() {
            return Ok(None);
        }
        if block.len() != self.grid_shape.len()
            || (self.coord_shape.is_empty() && block.iter().any(|&b| b != 0))
            || block.iter().zip(&self.grid_shape).any(|(b, g)| b >= g)
        {
            return Err(crate::Error::InvalidBlock(block.to_vec()));
        }

        let coords: Vec<usize> = self
            .coord_sources
            .iter()
            .map(|source| match *source {
                CoordSource::Block(dim) => block[dim] as usize,
                CoordSource::Fixed(value) => value,
            })
            .collect();
        let index = index_from_coords(&coords, &self.coord_shape).unwrap_or(0);

        let file = self.file.upgrade().ok_or(crate::Error::FileDropped)?;
        file.reopen()?;
        trace!("reading frame {index} for chunk {block:?}");
        let data = file.read_frame(index)?.into_bytes();
        Ok(Some(if self.copy {
            Bytes::copy_from_slice(&data)
        } else {
            data
        }))
    }

    /// Parse a chunk key of the form `c/<i>/<j>/...`.
    ///
    /// Returns None if the key does not name a chunk.
    fn chunk_indices(key: &StoreKey) -> Option<Vec<u64>> {
        let rest = key.as_str().strip_prefix(CHUNK_PREFIX)?;
        rest.split('/').map(|s| s.parse().ok()).collect()
    }

    fn is_valid_chunk(&self, indices: &[u64]) -> bool {
        indices.len() == self.grid_shape.len()
            && indices.iter().zip(&self.grid_shape).all(|(i, g)| i < g)
    }

    fn get_key(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        if key.as_str() == METADATA_KEY {
            return Ok(Some(self.metadata.clone()));
        }
        let Some(indices) = Self::chunk_indices(key) else {
            return Ok(None);
        };
        self.block(&indices)
            .map_err(|e| StorageError::Other(format!("could not read chunk {}: {e}", key.as_str())))
    }

    fn size_of_key(&self, key: &StoreKey) -> Option<u64> {
        if key.as_str() == METADATA_KEY {
            return Some(self.metadata.len() as u64);
        }
        Self::chunk_indices(key)
            .filter(|indices| self.is_valid_chunk(indices))
            .map(|_| self.chunk_bytes)
    }
}

impl ReadableStorageTraits for FrameStore {
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.size_of_key(key))
    }

    fn supports_get_partial(&self) -> bool {
        false
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        self.get_key(key)
    }

    fn get_partial_many<'a>(
        &'a self,
        _key: &StoreKey,
        _byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<MaybeBytesIterator<'a>, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial_many not supported".into(),
        ))
    }

    fn get_partial(
        &self,
        _key: &StoreKey,
        _byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial not supported".into(),
        ))
    }
}
