//! Component B: the `IMB` container, a 36-byte header wrapping one JPEG body.

use thiserror::Error;

/// Fixed `IMB` header length in bytes.
pub const IMB_HEADER_LEN: u32 = 36;
const FORMAT_TAG: u8 = 11;

/// Errors returned while building an `IMB` header.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ImbError {
    /// `jpeg_length + 36` overflowed the header's 32-bit total-size field.
    #[error("jpeg length {jpeg_length} is too large to fit the IMB total-size field")]
    JpegTooLarge { jpeg_length: u64 },
}

/// Builds and validates `IMB` container headers (spec §3, §4.2).
pub struct ImbBuilder;

impl ImbBuilder {
    /// Builds a 36-byte `IMB` header for a JPEG of `jpeg_length` bytes at
    /// `width`x`height`.
    ///
    /// # Errors
    ///
    /// Returns an error if `jpeg_length + 36` does not fit in 32 bits.
    ///
    /// ```
    /// use idm::ImbBuilder;
    ///
    /// let header = ImbBuilder::build(1024, 64, 32)?;
    /// assert_eq!(36, header.len());
    /// assert_eq!(b"IMB", &header[0..3]);
    /// # Ok::<(), idm::ImbError>(())
    /// ```
    pub fn build(jpeg_length: u32, width: u16, height: u16) -> Result<[u8; 36], ImbError> {
        let total_size =
            u32::try_from(u64::from(jpeg_length) + u64::from(IMB_HEADER_LEN)).map_err(|_| {
                ImbError::JpegTooLarge {
                    jpeg_length: u64::from(jpeg_length),
                }
            })?;

        let mut header = [0u8; 36];
        header[0..3].copy_from_slice(b"IMB");
        header[3] = 0x00;
        header[4..8].copy_from_slice(&IMB_HEADER_LEN.to_le_bytes());
        header[8..12].copy_from_slice(&total_size.to_le_bytes());
        header[12] = FORMAT_TAG;
        header[13] = 0x00;
        header[14..16].copy_from_slice(&[0x00, 0x00]);
        header[16..18].copy_from_slice(&width.to_le_bytes());
        header[18..20].copy_from_slice(&height.to_le_bytes());
        header[20..24].copy_from_slice(&IMB_HEADER_LEN.to_le_bytes());
        header[24..28].copy_from_slice(&jpeg_length.to_le_bytes());
        header[28..36].copy_from_slice(&[0u8; 8]);
        Ok(header)
    }

    /// Validates the `IMB` signature, reserved byte, and duplicated
    /// header-size fields.
    ///
    /// ```
    /// use idm::ImbBuilder;
    ///
    /// let header = ImbBuilder::build(1024, 64, 32)?;
    /// assert!(ImbBuilder::validate(&header));
    /// assert!(!ImbBuilder::validate(&[0u8; 36]));
    /// # Ok::<(), idm::ImbError>(())
    /// ```
    #[must_use]
    pub fn validate(bytes: &[u8]) -> bool {
        if bytes.len() < 36 {
            return false;
        }
        if &bytes[0..3] != b"IMB" || bytes[3] != 0x00 {
            return false;
        }
        let header_size_a = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let header_size_b = u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        header_size_a == IMB_HEADER_LEN && header_size_b == IMB_HEADER_LEN
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[rstest]
    #[case(0, 1, 1)]
    #[case(1024, 64, 32)]
    #[case(100, 128, 64)]
    #[case(u32::from(u16::MAX), u16::MAX, u16::MAX)]
    fn build_satisfies_invariants(#[case] jpeg_length: u32, #[case] width: u16, #[case] height: u16) {
        let header = ImbBuilder::build(jpeg_length, width, height).expect("should build");
        assert!(ImbBuilder::validate(&header));
        assert_eq!(36, header.len());
        assert_eq!(jpeg_length + 36, read_u32_le(&header, 8));
        assert_eq!(jpeg_length, read_u32_le(&header, 24));
        assert_eq!((width, height), (read_u16_le(&header, 16), read_u16_le(&header, 18)));
    }

    #[test]
    fn imb_for_1024_byte_jpeg_64x32_matches_literal_bytes() {
        let header = ImbBuilder::build(1024, 64, 32).expect("should build");
        assert_eq!(
            [
                0x49, 0x4D, 0x42, 0x00, 0x24, 0x00, 0x00, 0x00, 0x24, 0x04, 0x00, 0x00, 0x0B, 0x00,
                0x00, 0x00, 0x40, 0x00, 0x20, 0x00, 0x24, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ],
            header
        );
    }

    #[test]
    fn imb_for_100_byte_jpeg_128x64_matches_literal_bytes() {
        let header = ImbBuilder::build(100, 128, 64).expect("should build");
        assert_eq!(
            [
                0x49, 0x4D, 0x42, 0x00, 0x24, 0x00, 0x00, 0x00, 0x88, 0x00, 0x00, 0x00, 0x0B, 0x00,
                0x00, 0x00, 0x80, 0x00, 0x40, 0x00, 0x24, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            ],
            header
        );
    }

    #[test]
    fn validate_rejects_wrong_signature_and_mismatched_header_size() {
        let mut header = ImbBuilder::build(16, 8, 8).expect("should build");
        header[0] = b'X';
        assert!(!ImbBuilder::validate(&header));

        let mut header = ImbBuilder::build(16, 8, 8).expect("should build");
        header[20] = 0xFF;
        assert!(!ImbBuilder::validate(&header));
    }

    #[test]
    fn build_rejects_jpeg_length_overflowing_total_size() {
        let result = ImbBuilder::build(u32::MAX, 1, 1);
        assert!(matches!(result, Err(ImbError::JpegTooLarge { .. })));
    }
}
