//! Reshaping raw frame buffers into `(C, Y, X, S)` order.
use bytes::Bytes;
use ndarray::{ArrayD, ArrayView4, IxDyn};

use crate::{
    element::{Pixel, check_pixel_type, decode_pixels},
    metadata::{Attributes, PixelType},
};

/// Byte layout of a single frame as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub height: usize,
    /// `None` if the file does not record it; inferred from the buffer length on read.
    pub width: Option<usize>,
    pub channels: usize,
    pub components: usize,
    pub pixel_type: PixelType,
}

impl FrameLayout {
    /// Components of non-RGB frames are folded into the channel axis, which is
    /// the same storage order with the last two axes merged.
    pub fn from_attributes(attributes: &Attributes) -> crate::Result<Self> {
        let (channels, components) = match attributes.components_per_channel() {
            3 => (attributes.channels(), 3),
            _ => ((attributes.component_count as usize).max(1), 1),
        };
        Ok(Self {
            height: attributes.height_px as usize,
            width: attributes.width(),
            channels,
            components,
            pixel_type: attributes.pixel_type()?,
        })
    }

    /// Storage order `(Y, X, C, S)` for a buffer of `byte_len` bytes.
    pub fn raw_shape(&self, byte_len: usize) -> crate::Result<[usize; 4]> {
        let per_column = self.height * self.channels * self.components * self.pixel_type.size();
        let width = match self.width {
            Some(w) => w,
            None if per_column > 0 => byte_len / per_column,
            None => 0,
        };
        let expected = per_column * width;
        if expected != byte_len {
            return Err(crate::Error::FrameSize {
                expected,
                actual: byte_len,
            });
        }
        Ok([self.height, width, self.channels, self.components])
    }

    /// Reshape, transpose to `(C, Y, X, S)` and squeeze a raw frame buffer.
    ///
    /// With a single channel the transpose does not move any bytes,
    /// so the buffer is passed through without copying.
    pub fn materialize(&self, raw: Bytes) -> crate::Result<Frame> {
        let [height, width, channels, components] = self.raw_shape(raw.len())?;
        let data = if channels == 1 {
            raw
        } else {
            let item = self.pixel_type.size();
            let view =
                ArrayView4::from_shape((height, width, channels, components * item), &raw[..])?;
            let transposed: Vec<u8> = view.permuted_axes([2, 0, 1, 3]).iter().copied().collect();
            Bytes::from(transposed)
        };
        let shape = [channels, height, width, components]
            .into_iter()
            .filter(|&n| n != 1)
            .collect();
        Ok(Frame {
            data,
            shape,
            pixel_type: self.pixel_type,
        })
    }
}

/// A single materialized frame, in `(C, Y, X, S)` order with unit axes removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Bytes,
    shape: Vec<usize>,
    pixel_type: PixelType,
}

impl Frame {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// Little-endian element bytes in C order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Decode into a typed array.
    pub fn to_ndarray<T: Pixel>(&self) -> crate::Result<ArrayD<T>> {
        check_pixel_type::<T>(self.pixel_type)?;
        let data = decode_pixels::<T>(&self.data)?;
        Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), data)?)
    }
}
