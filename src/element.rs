//! Primitive element types which frames can be decoded into.

use std::io::{self, Read};
use std::mem::size_of;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::metadata::PixelType;

/// An element type stored in ND2 frames.
pub trait Pixel: Copy + Default + Send + Sync + 'static {
    /// The pixel type this Rust type represents.
    const PIXEL_TYPE: PixelType;

    /// Fill `out` from little-endian elements read from `reader`.
    fn read_le_into<R: Read>(reader: R, out: &mut [Self]) -> io::Result<()>;
}

macro_rules! impl_pixel_one_byte {
    ($elem:ty, $variant:ident, $read_into:ident) => {
        impl Pixel for $elem {
            const PIXEL_TYPE: PixelType = PixelType::$variant;

            fn read_le_into<R: Read>(mut reader: R, out: &mut [Self]) -> io::Result<()> {
                reader.$read_into(out)
            }
        }
    };
}

macro_rules! impl_pixel_multi_byte {
    ($elem:ty, $variant:ident, $read_into:ident) => {
        impl Pixel for $elem {
            const PIXEL_TYPE: PixelType = PixelType::$variant;

            fn read_le_into<R: Read>(mut reader: R, out: &mut [Self]) -> io::Result<()> {
                reader.$read_into::<LittleEndian>(out)
            }
        }
    };
}

impl_pixel_one_byte!(u8, UInt8, read_exact);
impl_pixel_one_byte!(i8, Int8, read_i8_into);
impl_pixel_multi_byte!(u16, UInt16, read_u16_into);
impl_pixel_multi_byte!(u32, UInt32, read_u32_into);
impl_pixel_multi_byte!(u64, UInt64, read_u64_into);
impl_pixel_multi_byte!(i16, Int16, read_i16_into);
impl_pixel_multi_byte!(i32, Int32, read_i32_into);
impl_pixel_multi_byte!(i64, Int64, read_i64_into);
impl_pixel_multi_byte!(f32, Float32, read_f32_into);
impl_pixel_multi_byte!(f64, Float64, read_f64_into);

/// Decode a little-endian byte buffer into elements.
///
/// Trailing bytes which do not form a whole element are ignored.
pub fn decode_pixels<T: Pixel>(bytes: &[u8]) -> crate::Result<Vec<T>> {
    let len = bytes.len() / size_of::<T>();
    let mut out = vec![T::default(); len];
    T::read_le_into(&bytes[..len * size_of::<T>()], &mut out)?;
    Ok(out)
}

/// Returns `Ok(())` iff `T` is the element type of `actual`.
pub(crate) fn check_pixel_type<T: Pixel>(actual: PixelType) -> crate::Result<()> {
    if T::PIXEL_TYPE == actual {
        Ok(())
    } else {
        Err(crate::Error::PixelTypeMismatch {
            requested: T::PIXEL_TYPE,
            actual,
        })
    }
}
