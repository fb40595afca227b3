use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, warn};
use ndarray::{ArrayD, Axis as NdAxis, IxDyn};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zarrs::array::Array;

use crate::{
    axis::{Axis, Sizes},
    backend::{Backend, ContainerKind, is_supported_file, open_backend},
    element::{Pixel, check_pixel_type, decode_pixels},
    frame::{Frame, FrameLayout},
    labels::{LabelInputs, LabeledArray, Labels, build_labels},
    metadata::{Attributes, ExperimentLoop, PixelType, VoxelSize},
    position::{Position, Selection, position_names, resolve_position, select},
    sizes::resolve_sizes,
    storage::{FrameStore, StoreView},
};

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Properties derived from the backend, computed at most once per handle.
#[derive(Default)]
struct Cache {
    attributes: OnceLock<Attributes>,
    /// `attributes` with the frame width resolved.
    frame_attributes: OnceLock<Attributes>,
    text_info: OnceLock<JsonMap>,
    experiment: OnceLock<Vec<ExperimentLoop>>,
    metadata: OnceLock<serde_json::Value>,
    custom_data: OnceLock<JsonMap>,
    sizes: OnceLock<Sizes>,
    layout: OnceLock<FrameLayout>,
}

fn cached<T>(cell: &OnceLock<T>, init: impl FnOnce() -> crate::Result<T>) -> crate::Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

/// The persisted form of an [`Nd2File`]: the backend itself is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nd2FileState {
    pub path: PathBuf,
    pub closed: bool,
}

/// An open ND2 file, presented as an N-dimensional array.
///
/// The dimension order is given by [`Nd2File::sizes`]: the axes which vary
/// between frames (e.g. time, position, Z) followed by the frame axes
/// (channel, Y, X and the RGB component).
///
/// Wrap the file in an [`Arc`] to create lazy arrays with
/// [`Nd2File::to_zarr`] and [`Nd2File::to_labeled_lazy`].
pub struct Nd2File {
    path: PathBuf,
    kind: ContainerKind,
    backend: RwLock<Box<dyn Backend>>,
    closed: AtomicBool,
    cache: Cache,
}

impl Nd2File {
    /// Open the file at `path` with the backend registered for its signature.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let (kind, backend) = open_backend(path)?;
        Ok(Self::from_backend(path, kind, backend))
    }

    /// Wrap an already opened backend.
    pub fn from_backend(path: impl Into<PathBuf>, kind: ContainerKind, backend: Box<dyn Backend>) -> Self {
        Self {
            path: path.into(),
            kind,
            backend: RwLock::new(backend),
            closed: AtomicBool::new(false),
            cache: Cache::default(),
        }
    }

    /// Whether the file at `path` carries a recognised ND2 signature.
    pub fn is_supported_file(path: impl AsRef<Path>) -> crate::Result<bool> {
        is_supported_file(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Whether this is a legacy (JPEG2000) file.
    pub fn is_legacy(&self) -> bool {
        self.kind == ContainerKind::Legacy
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Re-open the backend if the file has been closed.
    pub fn reopen(&self) -> crate::Result<()> {
        if !self.is_closed() {
            return Ok(());
        }
        let mut backend = self.backend.write();
        if self.is_closed() {
            backend.open()?;
            self.closed.store(false, Ordering::Release);
            debug!("re-opened {}", self.path.display());
        }
        Ok(())
    }

    pub fn close(&self) -> crate::Result<()> {
        let mut backend = self.backend.write();
        if !self.is_closed() {
            backend.close()?;
            self.closed.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn with_backend<T>(&self, f: impl FnOnce(&dyn Backend) -> crate::Result<T>) -> crate::Result<T> {
        let backend = self.backend.read();
        if self.is_closed() {
            return Err(crate::Error::Closed(self.path.clone()));
        }
        f(backend.as_ref())
    }

    /// Core image attributes.
    pub fn attributes(&self) -> crate::Result<&Attributes> {
        cached(&self.cache.attributes, || {
            self.with_backend(|b| b.attributes())
        })
    }

    /// Attributes with a known frame width.
    ///
    /// Files which record neither the pixel width nor the row stride have
    /// their width taken from the length of the first frame.
    fn frame_attributes(&self) -> crate::Result<&Attributes> {
        cached(&self.cache.frame_attributes, || {
            let mut attributes = self.attributes()?.clone();
            if attributes.width().is_none() {
                let raw = self.with_backend(|b| b.read_frame(0))?;
                let pixel_bytes = attributes.height_px as usize
                    * attributes.component_count as usize
                    * attributes.pixel_type()?.size();
                if pixel_bytes == 0 || raw.is_empty() || raw.len() % pixel_bytes != 0 {
                    return Err(crate::Error::FrameSize {
                        expected: pixel_bytes,
                        actual: raw.len(),
                    });
                }
                let width = raw.len() / pixel_bytes;
                debug!("inferred width {width} of {}", self.path.display());
                attributes.width_px = Some(u32::try_from(width).map_err(crate::Error::wrap)?);
            }
            Ok(attributes)
        })
    }

    /// Miscellaneous text info.
    pub fn text_info(&self) -> crate::Result<&JsonMap> {
        cached(&self.cache.text_info, || self.with_backend(|b| b.text_info()))
    }

    /// Loop information for each non-frame axis, in declaration order.
    pub fn experiment(&self) -> crate::Result<&[ExperimentLoop]> {
        cached(&self.cache.experiment, || {
            self.with_backend(|b| b.experiment())
        })
        .map(Vec::as_slice)
    }

    pub fn metadata(&self) -> crate::Result<&serde_json::Value> {
        cached(&self.cache.metadata, || self.with_backend(|b| b.metadata()))
    }

    /// Unstructured custom metadata.
    pub fn custom_data(&self) -> crate::Result<&JsonMap> {
        cached(&self.cache.custom_data, || {
            self.with_backend(|b| b.custom_data())
        })
    }

    pub fn voxel_size(&self) -> crate::Result<VoxelSize> {
        self.with_backend(|b| b.voxel_size())
    }

    pub fn channel_names(&self) -> crate::Result<Vec<String>> {
        self.with_backend(|b| b.channel_names())
    }

    /// Names and extents of each axis, in dimension order.
    pub fn sizes(&self) -> crate::Result<&Sizes> {
        cached(&self.cache.sizes, || {
            let attributes = self.frame_attributes()?;
            let description = self
                .text_info()?
                .get("description")
                .and_then(serde_json::Value::as_str);
            let coord_info = self.with_backend(|b| b.coord_info())?;
            Ok(resolve_sizes(attributes, description, &coord_info))
        })
    }

    fn layout(&self) -> crate::Result<&FrameLayout> {
        cached(&self.cache.layout, || {
            FrameLayout::from_attributes(self.frame_attributes()?)
        })
    }

    pub fn pixel_type(&self) -> crate::Result<PixelType> {
        Ok(self.layout()?.pixel_type)
    }

    pub fn shape(&self) -> crate::Result<Vec<usize>> {
        Ok(self.sizes()?.shape())
    }

    pub fn ndim(&self) -> crate::Result<usize> {
        Ok(self.sizes()?.len())
    }

    /// Total number of pixels.
    pub fn size(&self) -> crate::Result<usize> {
        Ok(self.shape()?.iter().product())
    }

    /// Total number of bytes of image data.
    pub fn nbytes(&self) -> crate::Result<usize> {
        Ok(self.size()? * self.pixel_type()?.size())
    }

    /// Extents of the axes which vary between frames.
    pub fn coord_shape(&self) -> crate::Result<Vec<usize>> {
        Ok(self.sizes()?.coord_shape())
    }

    /// Extents of each frame, after reshaping and squeezing.
    pub fn frame_shape(&self) -> crate::Result<Vec<usize>> {
        Ok(self.sizes()?.frame_shape())
    }

    pub fn frame_count(&self) -> crate::Result<usize> {
        Ok(self.sizes()?.frame_count())
    }

    /// Number of components per channel (e.g. 3 for RGB).
    pub fn components_per_channel(&self) -> crate::Result<usize> {
        Ok(self.attributes()?.components_per_channel())
    }

    pub fn is_rgb(&self) -> crate::Result<bool> {
        Ok(matches!(self.components_per_channel()?, 3 | 4))
    }

    pub fn position_names(&self) -> crate::Result<Vec<String>> {
        Ok(position_names(self.experiment()?))
    }

    /// Read frame `index`, in `(C, Y, X, S)` order with unit axes removed.
    pub fn read_frame(&self, index: usize) -> crate::Result<Frame> {
        let count = self.frame_count()?;
        if index >= count {
            return Err(crate::Error::FrameOutOfRange { index, count });
        }
        let layout = *self.layout()?;
        let raw = self.with_backend(|b| b.read_frame(index))?;
        layout.materialize(raw)
    }

    /// The shape and frame sequence of a read restricted to `position`.
    pub fn select(&self, position: Option<&Position>) -> crate::Result<Selection> {
        select(self.sizes()?, &self.position_names()?, position)
    }

    /// Read the image into memory, optionally restricted to one position.
    ///
    /// A selected position keeps its dimension, with extent 1.
    pub fn asarray<T: Pixel>(&self, position: Option<Position>) -> crate::Result<ArrayD<T>> {
        check_pixel_type::<T>(self.pixel_type()?)?;
        let selection = self.select(position.as_ref())?;
        let frame_len: usize = self.frame_shape()?.iter().product();
        let mut data = Vec::with_capacity(selection.frames.len() * frame_len);
        for &index in &selection.frames {
            let frame = self.read_frame(index)?;
            data.extend(decode_pixels::<T>(frame.as_bytes())?);
        }
        Ok(ArrayD::from_shape_vec(IxDyn(&selection.shape), data)?)
    }

    /// A lazily evaluated store with one frame per chunk.
    pub fn to_store(self: &Arc<Self>, copy: bool) -> crate::Result<FrameStore> {
        FrameStore::new(self, copy)
    }

    /// A lazily evaluated zarrs array with one frame per chunk.
    pub fn to_zarr(self: &Arc<Self>, copy: bool) -> crate::Result<Array<FrameStore>> {
        open_store(self.to_store(copy)?)
    }

    /// Physical coordinate labels for each axis.
    pub fn labels(&self, squeeze: bool) -> crate::Result<BTreeMap<Axis, Labels>> {
        let channel_names = self.channel_names()?;
        let inputs = LabelInputs {
            sizes: self.sizes()?,
            attributes: self.frame_attributes()?,
            voxel_size: self.voxel_size()?,
            channel_names: &channel_names,
            experiment: self.experiment()?,
        };
        Ok(build_labels(&inputs, squeeze))
    }

    /// File-level metadata attached to labeled and lazy arrays.
    pub fn metadata_bundle(&self) -> crate::Result<serde_json::Value> {
        let mut bundle = JsonMap::new();
        bundle.insert("metadata".to_string(), self.metadata()?.clone());
        bundle.insert(
            "experiment".to_string(),
            serde_json::to_value(self.experiment()?)?,
        );
        bundle.insert(
            "attributes".to_string(),
            serde_json::to_value(self.attributes()?)?,
        );
        bundle.insert(
            "text_info".to_string(),
            serde_json::Value::Object(self.text_info()?.clone()),
        );
        let mut out = JsonMap::new();
        out.insert("metadata".to_string(), serde_json::Value::Object(bundle));
        Ok(serde_json::Value::Object(out))
    }

    /// Labeled axes which `Sizes` does not contain, in the order they are prepended.
    fn missing_dims(coords: &BTreeMap<Axis, Labels>, dims: &[Axis]) -> Vec<Axis> {
        coords
            .keys()
            .filter(|a| !dims.contains(a))
            .rev()
            .copied()
            .collect()
    }

    fn select_position_label(
        &self,
        coords: &mut BTreeMap<Axis, Labels>,
        position: Option<usize>,
    ) {
        if let (Some(p), Some(labels)) = (position, coords.get_mut(&Axis::Position)) {
            *labels = labels.select(p);
        }
    }

    /// Read the image into memory with labeled dimensions.
    ///
    /// With `squeeze`, dimensions of extent 1 are dropped; otherwise every
    /// labeled axis is present, with unit dimensions prepended as needed.
    pub fn to_labeled<T: Pixel>(
        &self,
        squeeze: bool,
        position: Option<Position>,
    ) -> crate::Result<LabeledArray<ArrayD<T>>> {
        let sizes = self.sizes()?;
        let position_index = position
            .as_ref()
            .map(|p| resolve_position(sizes, &self.position_names()?, p))
            .transpose()?;
        let mut data = self.asarray::<T>(position)?;
        let mut dims = sizes.axes();
        let mut coords = self.labels(squeeze)?;

        if squeeze {
            for i in (0..dims.len()).rev() {
                if data.shape()[i] == 1 {
                    data.index_axis_inplace(NdAxis(i), 0);
                    dims.remove(i);
                }
            }
            coords.retain(|axis, _| dims.contains(axis));
        } else {
            for axis in Self::missing_dims(&coords, &dims) {
                dims.insert(0, axis);
                data.insert_axis_inplace(NdAxis(0));
            }
        }
        self.select_position_label(&mut coords, position_index);

        Ok(LabeledArray {
            data,
            dims,
            coords,
            attrs: self.metadata_bundle()?,
        })
    }

    /// A lazily evaluated zarrs array with labeled dimensions.
    ///
    /// Dimensions are squeezed or expanded as in [`Nd2File::to_labeled`].
    pub fn to_labeled_lazy(
        self: &Arc<Self>,
        squeeze: bool,
        position: Option<Position>,
        copy: bool,
    ) -> crate::Result<LabeledArray<Array<FrameStore>>> {
        let sizes = self.sizes()?;
        let position_index = position
            .as_ref()
            .map(|p| resolve_position(sizes, &self.position_names()?, p))
            .transpose()?;
        let mut coords = self.labels(squeeze)?;
        let leading = if squeeze {
            Vec::new()
        } else {
            Self::missing_dims(&coords, &sizes.axes())
                .into_iter()
                .rev()
                .collect()
        };
        let view = StoreView {
            position: position_index.filter(|_| sizes.contains(Axis::Position)),
            squeeze_position: squeeze,
            leading,
        };
        let store = FrameStore::with_view(self, copy, &view)?;
        let dims = store.dims().to_vec();
        if squeeze {
            coords.retain(|axis, _| dims.contains(axis));
        }
        self.select_position_label(&mut coords, position_index);

        Ok(LabeledArray {
            data: open_store(store)?,
            dims,
            coords,
            attrs: self.metadata_bundle()?,
        })
    }

    pub fn state(&self) -> Nd2FileState {
        Nd2FileState {
            path: self.path.clone(),
            closed: self.is_closed(),
        }
    }

    /// Reconstruct a file from its persisted state, re-opening the backend.
    pub fn from_state(state: Nd2FileState) -> crate::Result<Self> {
        let (kind, backend) = open_backend(&state.path)?;
        let file = Self::from_backend(state.path, kind, backend);
        if state.closed {
            file.close()?;
        }
        Ok(file)
    }

    /// Replace the backend with a freshly opened one and forget every derived property.
    ///
    /// The open/closed state is preserved.
    pub fn reload(&mut self) -> crate::Result<()> {
        let was_closed = self.is_closed();
        let (kind, mut backend) = open_backend(&self.path)?;
        if was_closed {
            backend.close()?;
        }
        let mut old = std::mem::replace(self.backend.get_mut(), backend);
        if !was_closed {
            old.close()?;
        }
        self.kind = kind;
        self.cache = Cache::default();
        debug!("reloaded {}", self.path.display());
        Ok(())
    }
}

fn open_store(store: FrameStore) -> crate::Result<Array<FrameStore>> {
    Array::open(Arc::new(store), "/")
        .map_err(|e| crate::Error::general(format!("could not open frame array: {e}")))
}

impl Drop for Nd2File {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.backend.get_mut().close() {
            warn!("failed to close {}: {e}", self.path.display());
        }
    }
}

impl fmt::Debug for Nd2File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if self.is_closed() {
            return write!(f, "<Nd2File {name:?} (closed)>");
        }
        match (self.pixel_type(), self.sizes()) {
            (Ok(pixel_type), Ok(sizes)) => write!(f, "<Nd2File {name:?} {pixel_type}: {sizes}>"),
            _ => write!(f, "<Nd2File {name:?}>"),
        }
    }
}

impl Serialize for Nd2File {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.state().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Nd2File {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let state = Nd2FileState::deserialize(deserializer)?;
        Nd2File::from_state(state).map_err(serde::de::Error::custom)
    }
}

/// Read a whole ND2 file into memory.
pub fn imread<T: Pixel>(path: impl AsRef<Path>) -> crate::Result<ArrayD<T>> {
    let file = Nd2File::open(path)?;
    let out = file.asarray(None);
    file.close()?;
    out
}

/// Read a whole ND2 file into memory with labeled dimensions.
pub fn imread_labeled<T: Pixel>(
    path: impl AsRef<Path>,
    squeeze: bool,
) -> crate::Result<LabeledArray<ArrayD<T>>> {
    let file = Nd2File::open(path)?;
    let out = file.to_labeled(squeeze, None);
    file.close()?;
    out
}

/// Open an ND2 file as a lazily evaluated zarrs array.
///
/// The array only holds a weak reference to the file,
/// so keep the returned [`Nd2File`] alive for as long as the array is read.
pub fn imread_lazy(
    path: impl AsRef<Path>,
    copy: bool,
) -> crate::Result<(Arc<Nd2File>, Array<FrameStore>)> {
    let file = Arc::new(Nd2File::open(path)?);
    let array = file.to_zarr(copy)?;
    Ok((file, array))
}
