use zarrs_nd2::element::{Pixel, decode_pixels};
use zarrs_nd2::metadata::PixelType;

#[test]
fn test_decode_little_endian() {
    let bytes = [0x01, 0x02, 0xff, 0xff, 0x00];
    assert_eq!(decode_pixels::<u16>(&bytes).unwrap(), vec![0x0201, 0xffff]);
    assert_eq!(decode_pixels::<i16>(&bytes).unwrap(), vec![0x0201, -1]);
    assert_eq!(
        decode_pixels::<u8>(&bytes).unwrap(),
        vec![0x01, 0x02, 0xff, 0xff, 0x00]
    );
    assert_eq!(decode_pixels::<i8>(&bytes).unwrap(), vec![1, 2, -1, -1, 0]);
}

#[test]
fn test_decode_floats() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1.5f32.to_le_bytes());
    bytes.extend_from_slice(&(-2.25f32).to_le_bytes());
    assert_eq!(decode_pixels::<f32>(&bytes).unwrap(), vec![1.5, -2.25]);
    assert_eq!(decode_pixels::<f64>(&bytes).unwrap().len(), 1);
}

#[test]
fn test_trailing_bytes_ignored() {
    assert_eq!(decode_pixels::<u32>(&[1, 0, 0, 0, 9, 9]).unwrap(), vec![1]);
    assert!(decode_pixels::<u64>(&[1, 2, 3]).unwrap().is_empty());
}

#[test]
fn test_pixel_types() {
    assert_eq!(<u16 as Pixel>::PIXEL_TYPE, PixelType::UInt16);
    assert_eq!(<i64 as Pixel>::PIXEL_TYPE, PixelType::Int64);
    assert_eq!(<f64 as Pixel>::PIXEL_TYPE.size(), 8);
}
