//! Big-endian byte conversion for FITS data.
//!
//! FITS stores all binary data big-endian. The functions here convert a
//! byte buffer between big-endian and native order in place, one fixed
//! width unit at a time. Byte swapping only depends on the unit width, not
//! on signedness or on integer vs IEEE float, so three widths cover every
//! FITS data type. On big-endian hosts all of these compile to copies of
//! identical bytes.

/// Convert a buffer of big-endian 16-bit units to native order in place.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of 2.
pub fn be_to_native_16(buf: &mut [u8]) {
    assert!(
        buf.len().is_multiple_of(2),
        "buffer length must be a multiple of 2"
    );
    for chunk in buf.chunks_exact_mut(2) {
        let v = u16::from_be_bytes([chunk[0], chunk[1]]);
        chunk.copy_from_slice(&v.to_ne_bytes());
    }
}

/// Convert a buffer of native-order 16-bit units to big-endian in place.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of 2.
pub fn native_to_be_16(buf: &mut [u8]) {
    assert!(
        buf.len().is_multiple_of(2),
        "buffer length must be a multiple of 2"
    );
    for chunk in buf.chunks_exact_mut(2) {
        let v = u16::from_ne_bytes([chunk[0], chunk[1]]);
        chunk.copy_from_slice(&v.to_be_bytes());
    }
}

/// Convert a buffer of big-endian 32-bit units to native order in place.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of 4.
pub fn be_to_native_32(buf: &mut [u8]) {
    assert!(
        buf.len().is_multiple_of(4),
        "buffer length must be a multiple of 4"
    );
    for chunk in buf.chunks_exact_mut(4) {
        let v = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&v.to_ne_bytes());
    }
}

/// Convert a buffer of native-order 32-bit units to big-endian in place.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of 4.
pub fn native_to_be_32(buf: &mut [u8]) {
    assert!(
        buf.len().is_multiple_of(4),
        "buffer length must be a multiple of 4"
    );
    for chunk in buf.chunks_exact_mut(4) {
        let v = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&v.to_be_bytes());
    }
}

/// Convert a buffer of big-endian 64-bit units to native order in place.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of 8.
pub fn be_to_native_64(buf: &mut [u8]) {
    assert!(
        buf.len().is_multiple_of(8),
        "buffer length must be a multiple of 8"
    );
    for chunk in buf.chunks_exact_mut(8) {
        let v = u64::from_be_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        chunk.copy_from_slice(&v.to_ne_bytes());
    }
}

/// Convert a buffer of native-order 64-bit units to big-endian in place.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of 8.
pub fn native_to_be_64(buf: &mut [u8]) {
    assert!(
        buf.len().is_multiple_of(8),
        "buffer length must be a multiple of 8"
    );
    for chunk in buf.chunks_exact_mut(8) {
        let v = u64::from_ne_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        chunk.copy_from_slice(&v.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_16() {
        let values: [i16; 4] = [1, -1, i16::MIN, i16::MAX];
        let mut buf = [0u8; 8];
        for (i, &v) in values.iter().enumerate() {
            buf[i * 2..i * 2 + 2].copy_from_slice(&v.to_be_bytes());
        }
        let original = buf;

        be_to_native_16(&mut buf);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(i16::from_ne_bytes([buf[i * 2], buf[i * 2 + 1]]), v);
        }

        native_to_be_16(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn roundtrip_32() {
        let values: [i32; 3] = [1, -1, i32::MAX];
        let mut buf = [0u8; 12];
        for (i, &v) in values.iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&v.to_be_bytes());
        }
        let original = buf;

        be_to_native_32(&mut buf);
        native_to_be_32(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn roundtrip_64() {
        let values: [f64; 2] = [core::f64::consts::PI, -1.5];
        let mut buf = [0u8; 16];
        for (i, &v) in values.iter().enumerate() {
            buf[i * 8..i * 8 + 8].copy_from_slice(&v.to_be_bytes());
        }
        let original = buf;

        be_to_native_64(&mut buf);
        for (i, &v) in values.iter().enumerate() {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[i * 8..i * 8 + 8]);
            assert_eq!(f64::from_ne_bytes(b), v);
        }

        native_to_be_64(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn float_32_known_bytes() {
        // IEEE 754: 1.0f32 = 0x3F800000
        let mut buf = [0x3F, 0x80, 0x00, 0x00];
        be_to_native_32(&mut buf);
        assert_eq!(f32::from_ne_bytes(buf), 1.0_f32);
    }

    #[test]
    fn empty_buffers_are_fine() {
        let mut empty: [u8; 0] = [];
        be_to_native_16(&mut empty);
        be_to_native_32(&mut empty);
        be_to_native_64(&mut empty);
    }

    #[test]
    #[should_panic(expected = "buffer length must be a multiple of 2")]
    fn odd_length_panics() {
        let mut buf = [0u8; 3];
        be_to_native_16(&mut buf);
    }

    #[test]
    #[should_panic(expected = "buffer length must be a multiple of 8")]
    fn bad_length_64_panics() {
        let mut buf = [0u8; 12];
        native_to_be_64(&mut buf);
    }
}
