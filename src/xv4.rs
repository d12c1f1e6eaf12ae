//! Component C: the `xV4` animation container (spec §3, §4.3).
//!
//! Layout: a 32-byte fixed header, a 16-byte-per-frame frame table, then the
//! per-frame region (32-byte metadata block + JPEG bytes) repeated in order.
//! The final frame's "next" metadata pointer wraps back to the first frame,
//! forming a cyclic linked list the device uses to loop playback.

use thiserror::Error;

const FIXED_HEADER_LEN: u32 = 32;
const FRAME_TABLE_ENTRY_LEN: u32 = 16;
const FRAME_METADATA_LEN: u32 = 32;
const NAME_FIELD_LEN: usize = 12;
const INTERVAL_FIELD: &[u8] = b"output/";
const INTERVAL_SUFFIX: &[u8] = b"ms";
const MIN_INTERVAL_MS: u32 = 50;
const MAX_INTERVAL_MS: u32 = 99;

/// Errors returned while building an `xV4` container.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum XvFourError {
    /// `build` was called with zero frames.
    #[error("xV4 animation requires at least one frame")]
    EmptyAnimation,
    /// A frame's JPEG body is too large for the container's 32-bit offsets.
    #[error("frame {frame_index} JPEG length {jpeg_length} overflows the container offset width")]
    FrameTooLarge { frame_index: usize, jpeg_length: u64 },
}

/// One input frame: a display name and its encoded JPEG bytes.
#[derive(Debug, Clone)]
pub struct AnimationFrame<'a> {
    name: &'a str,
    jpeg: &'a [u8],
}

impl<'a> AnimationFrame<'a> {
    /// Creates an animation frame from a name and JPEG bytes.
    #[must_use]
    pub fn new(name: &'a str, jpeg: &'a [u8]) -> Self {
        Self { name, jpeg }
    }
}

/// Builds and validates `xV4` animation containers.
pub struct XvFourBuilder;

impl XvFourBuilder {
    /// Builds an `xV4` container from an ordered, non-empty sequence of
    /// frames, an interval in milliseconds (clamped to `[50, 99]`), and the
    /// panel dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`XvFourError::EmptyAnimation`] if `frames` is empty, or
    /// [`XvFourError::FrameTooLarge`] if a frame's JPEG body does not fit the
    /// container's 32-bit offset fields.
    ///
    /// ```
    /// use idm::{AnimationFrame, XvFourBuilder};
    ///
    /// let frames = [AnimationFrame::new("frame_00001", &[0xFF, 0xD8, 0xFF, 0xE0])];
    /// let container = XvFourBuilder::build(&frames, 50, (360, 360))?;
    /// assert_eq!(b"xV4", &container[0..3]);
    /// # Ok::<(), idm::XvFourError>(())
    /// ```
    pub fn build(
        frames: &[AnimationFrame<'_>],
        interval_ms: u32,
        dimensions: (u16, u16),
    ) -> Result<Vec<u8>, XvFourError> {
        if frames.is_empty() {
            return Err(XvFourError::EmptyAnimation);
        }

        let frame_count = frames.len() as u32;
        let frame_table_end = FIXED_HEADER_LEN + FRAME_TABLE_ENTRY_LEN * frame_count;

        // One forward pass computing each frame's metadata offset before any
        // bytes are written, so the cyclic next-pointer needs no back-patching.
        let mut metadata_offsets = Vec::with_capacity(frames.len());
        let mut cursor = frame_table_end;
        for (index, frame) in frames.iter().enumerate() {
            metadata_offsets.push(cursor);
            let jpeg_len = u32::try_from(frame.jpeg.len()).map_err(|_| XvFourError::FrameTooLarge {
                frame_index: index,
                jpeg_length: frame.jpeg.len() as u64,
            })?;
            cursor = cursor
                .checked_add(FRAME_METADATA_LEN)
                .and_then(|value| value.checked_add(jpeg_len))
                .ok_or(XvFourError::FrameTooLarge {
                    frame_index: index,
                    jpeg_length: frame.jpeg.len() as u64,
                })?;
        }
        let per_frame_region_len = cursor - frame_table_end;

        let clamped_interval = interval_ms.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS);

        let mut container = Vec::with_capacity(cursor as usize);
        container.extend_from_slice(&encode_fixed_header(
            frame_count,
            frame_table_end,
            clamped_interval,
            per_frame_region_len,
        ));

        for (index, frame) in frames.iter().enumerate() {
            container.extend_from_slice(&encode_frame_table_entry(
                frame.name,
                metadata_offsets[index],
            ));
        }

        for (index, frame) in frames.iter().enumerate() {
            let next_index = (index + 1) % frames.len();
            let jpeg_offset = metadata_offsets[index] + FRAME_METADATA_LEN;
            container.extend_from_slice(&encode_frame_metadata(
                metadata_offsets[index],
                metadata_offsets[next_index],
                frame_count,
                dimensions,
                jpeg_offset,
                frame.jpeg.len() as u32,
            ));
            container.extend_from_slice(frame.jpeg);
        }

        Ok(container)
    }

    /// Validates the `xV4` signature, version byte, and minimum header length.
    ///
    /// ```
    /// use idm::{AnimationFrame, XvFourBuilder};
    ///
    /// let frames = [AnimationFrame::new("frame_00001", &[0xFF, 0xD8])];
    /// let container = XvFourBuilder::build(&frames, 60, (360, 360))?;
    /// assert!(XvFourBuilder::validate(&container));
    /// # Ok::<(), idm::XvFourError>(())
    /// ```
    #[must_use]
    pub fn validate(bytes: &[u8]) -> bool {
        bytes.len() >= FIXED_HEADER_LEN as usize && &bytes[0..3] == b"xV4" && bytes[3] == 0x12
    }
}

fn encode_fixed_header(
    frame_count: u32,
    frame_table_end: u32,
    interval_ms: u32,
    per_frame_region_len: u32,
) -> [u8; 32] {
    let mut header = [0u8; 32];
    header[0..3].copy_from_slice(b"xV4");
    header[3] = 0x12;
    header[4..8].copy_from_slice(&(frame_table_end - 8).to_le_bytes());
    header[8..12].copy_from_slice(&frame_count.to_le_bytes());
    header[12..16].copy_from_slice(&(frame_count * 10 + 10).to_le_bytes());
    header[16..28].copy_from_slice(&encode_interval_field(interval_ms));
    header[28..32].copy_from_slice(&per_frame_region_len.to_le_bytes());
    header
}

fn encode_interval_field(interval_ms: u32) -> [u8; 12] {
    let mut field = [0u8; 12];
    let text = format!(
        "{prefix}{interval_ms:02}{suffix}",
        prefix = String::from_utf8_lossy(INTERVAL_FIELD),
        suffix = String::from_utf8_lossy(INTERVAL_SUFFIX)
    );
    let bytes = text.as_bytes();
    let copy_len = bytes.len().min(field.len());
    field[..copy_len].copy_from_slice(&bytes[..copy_len]);
    field
}

fn encode_frame_table_entry(name: &str, metadata_offset: u32) -> [u8; 16] {
    let mut entry = [0u8; 16];
    let padded_name = pad_frame_name(name);
    entry[0..NAME_FIELD_LEN].copy_from_slice(&padded_name);
    entry[12..16].copy_from_slice(&metadata_offset.to_le_bytes());
    entry
}

fn pad_frame_name(name: &str) -> [u8; NAME_FIELD_LEN] {
    let with_dot = format!("{name}.");
    let bytes = with_dot.as_bytes();
    let mut field = [0u8; NAME_FIELD_LEN];
    let copy_len = bytes.len().min(NAME_FIELD_LEN);
    field[..copy_len].copy_from_slice(&bytes[..copy_len]);
    field
}

#[allow(clippy::too_many_arguments)]
fn encode_frame_metadata(
    current_offset: u32,
    next_offset: u32,
    frame_count: u32,
    dimensions: (u16, u16),
    jpeg_offset: u32,
    jpeg_len: u32,
) -> [u8; 32] {
    let mut metadata = [0u8; 32];
    metadata[0..4].copy_from_slice(&current_offset.to_le_bytes());
    metadata[4..8].copy_from_slice(&next_offset.to_le_bytes());
    metadata[8..12].copy_from_slice(&frame_count.saturating_sub(3).to_le_bytes());
    metadata[12..14].copy_from_slice(&dimensions.0.to_le_bytes());
    metadata[14..16].copy_from_slice(&dimensions.1.to_le_bytes());
    metadata[16..20].copy_from_slice(&jpeg_offset.to_le_bytes());
    metadata[20..24].copy_from_slice(&jpeg_len.to_le_bytes());
    metadata[24..32].copy_from_slice(&[0u8; 8]);
    metadata
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn build_rejects_empty_frame_list() {
        let result = XvFourBuilder::build(&[], 50, (360, 360));
        assert!(matches!(result, Err(XvFourError::EmptyAnimation)));
    }

    #[rstest]
    #[case(49, 50)]
    #[case(50, 50)]
    #[case(75, 75)]
    #[case(99, 99)]
    #[case(150, 99)]
    #[case(0, 50)]
    fn interval_is_clamped_to_50_99(#[case] requested: u32, #[case] expected: u32) {
        let frames = [AnimationFrame::new("frame_00001", &[0xFF, 0xD8])];
        let container =
            XvFourBuilder::build(&frames, requested, (360, 360)).expect("should build");
        let timing = &container[16..28];
        let text = std::str::from_utf8(timing)
            .unwrap()
            .trim_end_matches('\0');
        assert_eq!(format!("output/{expected:02}ms"), text);
    }

    #[test]
    fn single_frame_xv4_matches_spec_literal_example() {
        let frames = [AnimationFrame::new("frame_00001", &[0xFF, 0xD8, 0xFF, 0xE0])];
        let container = XvFourBuilder::build(&frames, 50, (360, 360)).expect("should build");

        assert_eq!(
            [
                0x78, 0x56, 0x34, 0x12, 0x28, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x14, 0x00,
                0x00, 0x00, 0x6F, 0x75, 0x74, 0x70,
            ],
            container[0..20]
        );

        let table_entry = &container[32..48];
        assert_eq!(b"frame_00001.", &table_entry[0..12]);
        assert_eq!(48, read_u32_le(table_entry, 12));

        let metadata = &container[48..80];
        assert_eq!(48, read_u32_le(metadata, 0));
        assert_eq!(48, read_u32_le(metadata, 4));
        assert_eq!(0, read_u32_le(metadata, 8));
        assert_eq!(360, u16::from_le_bytes([metadata[12], metadata[13]]));
        assert_eq!(360, u16::from_le_bytes([metadata[14], metadata[15]]));
        assert_eq!(80, read_u32_le(metadata, 16));
        assert_eq!(4, read_u32_le(metadata, 20));
    }

    #[test]
    fn multi_frame_offsets_and_cyclic_next_pointer() {
        let jpeg_a = vec![0xAA; 10];
        let jpeg_b = vec![0xBB; 20];
        let jpeg_c = vec![0xCC; 5];
        let frames = [
            AnimationFrame::new("frame_00001", &jpeg_a),
            AnimationFrame::new("frame_00002", &jpeg_b),
            AnimationFrame::new("frame_00003", &jpeg_c),
        ];
        let container = XvFourBuilder::build(&frames, 60, (8, 8)).expect("should build");

        let frame_count = 3u32;
        let table_end = FIXED_HEADER_LEN + FRAME_TABLE_ENTRY_LEN * frame_count;
        assert_eq!(frame_count, read_u32_le(&container, 8));

        let mut expected_offset = table_end;
        let mut offsets = Vec::new();
        for jpeg in [&jpeg_a, &jpeg_b, &jpeg_c] {
            offsets.push(expected_offset);
            expected_offset += FRAME_METADATA_LEN + jpeg.len() as u32;
        }

        for (index, offset) in offsets.iter().enumerate() {
            let entry = &container[(32 + 16 * index)..(32 + 16 * index + 16)];
            assert_eq!(*offset, read_u32_le(entry, 12));

            let metadata = &container[*offset as usize..(*offset as usize + 32)];
            assert_eq!(*offset, read_u32_le(metadata, 0));
        }

        // The last frame's next pointer must wrap back to the first frame.
        let last_metadata_offset = offsets[2];
        let last_metadata = &container[last_metadata_offset as usize..(last_metadata_offset as usize + 32)];
        assert_eq!(offsets[0], read_u32_le(last_metadata, 4));
    }

    #[test]
    fn validate_rejects_wrong_signature_or_version() {
        let frames = [AnimationFrame::new("frame_00001", &[0xFF, 0xD8])];
        let mut container = XvFourBuilder::build(&frames, 50, (8, 8)).expect("should build");
        assert!(XvFourBuilder::validate(&container));

        container[3] = 0x00;
        assert!(!XvFourBuilder::validate(&container));

        container[0] = b'y';
        assert!(!XvFourBuilder::validate(&container));
    }
}
