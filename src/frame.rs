//! Component A: the framed-packet layer (spec §3, §4.1).
//!
//! A frame is an 8-byte header, the payload, and a single trailing checksum
//! byte chosen so the sum of every byte in the frame reduces to zero modulo
//! 256.

use thiserror::Error;

use crate::protocol::COMMAND_TYPE;

const HEADER_LEN: usize = 8;
const MIN_FRAME_LEN: usize = HEADER_LEN + 1;

/// Errors returned while verifying an inbound frame.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameError {
    /// The frame is shorter than the mandatory 8-byte header plus checksum.
    #[error("frame is too short: expected at least {MIN_FRAME_LEN} bytes, got {actual}")]
    TooShort { actual: usize },
    /// Byte 0 was not the constant command-type byte.
    #[error("unexpected command type byte 0x{actual:02X}, expected 0x{COMMAND_TYPE:02X}")]
    WrongCommandType { actual: u8 },
    /// The declared payload-length field disagrees with the frame's actual size.
    #[error("payload length mismatch: header declares {declared} bytes but frame has {actual}")]
    PayloadLengthMismatch { declared: usize, actual: usize },
    /// The checksum byte does not make the whole frame sum to zero mod 256.
    #[error("checksum mismatch: frame sums to {sum} mod 256, expected 0")]
    ChecksumMismatch { sum: u8 },
}

/// Fields recovered from a verified frame.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DecodedFrame {
    subtype: u8,
    total: u16,
    remaining: u16,
    payload: Vec<u8>,
}

impl DecodedFrame {
    /// Returns the command subtype (frame header byte 1).
    #[must_use]
    pub fn subtype(&self) -> u8 {
        self.subtype
    }

    /// Returns the total-packets-in-transmission field.
    #[must_use]
    pub fn total(&self) -> u16 {
        self.total
    }

    /// Returns the packets-remaining-after-this-one field.
    #[must_use]
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Builds and verifies framed packets (spec §4.1).
pub struct Framer;

impl Framer {
    /// Builds one framed packet.
    ///
    /// `total` and `remaining` are truncated modulo 65536 to match observed
    /// device behavior (spec §4.1): callers splitting large payloads must
    /// honor this width themselves.
    ///
    /// ```
    /// use idm::Framer;
    ///
    /// let frame = Framer::build(0x06, 0, 0, &[]);
    /// assert_eq!(vec![0xF1, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09], frame);
    /// ```
    #[must_use]
    pub fn build(subtype: u8, total: u32, remaining: u32, payload: &[u8]) -> Vec<u8> {
        let total = (total % 0x1_0000) as u16;
        let remaining = (remaining % 0x1_0000) as u16;
        let payload_len = (payload.len() % 0x1_0000) as u16;

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
        frame.push(COMMAND_TYPE);
        frame.push(subtype);
        frame.extend_from_slice(&total.to_be_bytes());
        frame.extend_from_slice(&remaining.to_be_bytes());
        frame.extend_from_slice(&payload_len.to_be_bytes());
        frame.extend_from_slice(payload);

        let sum: u32 = frame.iter().map(|&byte| u32::from(byte)).sum();
        let checksum = ((256 - (sum % 256)) % 256) as u8;
        frame.push(checksum);
        frame
    }

    /// Verifies a frame's checksum and structural fields, returning its
    /// decoded contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is too short, declares the wrong command
    /// type, disagrees with its own payload-length field, or fails the
    /// checksum invariant.
    ///
    /// ```
    /// use idm::Framer;
    ///
    /// let frame = Framer::build(0x06, 1, 0, &[0xAA]);
    /// let decoded = Framer::verify(&frame)?;
    /// assert_eq!(0x06, decoded.subtype());
    /// assert_eq!(&[0xAA], decoded.payload());
    /// # Ok::<(), idm::FrameError>(())
    /// ```
    pub fn verify(frame: &[u8]) -> Result<DecodedFrame, FrameError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(FrameError::TooShort {
                actual: frame.len(),
            });
        }

        let sum: u32 = frame.iter().map(|&byte| u32::from(byte)).sum();
        let reduced = (sum % 256) as u8;
        if reduced != 0 {
            return Err(FrameError::ChecksumMismatch { sum: reduced });
        }

        if frame[0] != COMMAND_TYPE {
            return Err(FrameError::WrongCommandType { actual: frame[0] });
        }

        let subtype = frame[1];
        let total = u16::from_be_bytes([frame[2], frame[3]]);
        let remaining = u16::from_be_bytes([frame[4], frame[5]]);
        let declared_payload_len = usize::from(u16::from_be_bytes([frame[6], frame[7]]));
        let actual_payload_len = frame.len() - MIN_FRAME_LEN;
        if declared_payload_len != actual_payload_len {
            return Err(FrameError::PayloadLengthMismatch {
                declared: declared_payload_len,
                actual: actual_payload_len,
            });
        }

        let payload = frame[HEADER_LEN..frame.len() - 1].to_vec();
        Ok(DecodedFrame {
            subtype,
            total,
            remaining,
            payload,
        })
    }

    /// Splits `payload` into fixed-size chunks and frames each one, yielding
    /// `total = ceil(len(payload) / chunk_size)` frames whose `remaining`
    /// values count down from `total - 1` to `0` (spec §4.1, §8 scenario 6).
    ///
    /// A zero-length payload still produces exactly one frame.
    #[must_use]
    pub fn build_sequence(subtype: u8, payload: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
        assert!(chunk_size > 0, "chunk_size must be non-zero");
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![&[][..]]
        } else {
            payload.chunks(chunk_size).collect()
        };
        let total = chunks.len() as u32;

        chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| {
                let remaining = total - 1 - index as u32;
                Self::build(subtype, total, remaining, chunk)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn build_and_verify_round_trip_matches_property() {
        for subtype in [0x05u8, 0x06, 0x0D] {
            for (total, remaining) in [(0u32, 0u32), (1, 0), (65535, 12345), (2, 1)] {
                for payload_len in [0usize, 1, 496, 65535] {
                    let payload = vec![0xAB; payload_len];
                    let frame = Framer::build(subtype, total, remaining, &payload);
                    let decoded = Framer::verify(&frame).expect("well-formed frame should verify");
                    assert_eq!(subtype, decoded.subtype());
                    assert_eq!(total as u16, decoded.total());
                    assert_eq!(remaining as u16, decoded.remaining());
                    assert_eq!(payload, decoded.payload());
                }
            }
        }
    }

    #[test]
    fn every_emitted_frame_sums_to_zero_mod_256() {
        let frame = Framer::build(0x06, 3, 1, b"hello badge");
        let sum: u32 = frame.iter().map(|&byte| u32::from(byte)).sum();
        assert_eq!(0, sum % 256);
    }

    #[test]
    fn zero_length_payload_produces_nine_byte_frame() {
        let frame = Framer::build(0x06, 0, 0, &[]);
        assert_eq!(9, frame.len());
    }

    #[test]
    fn info_frame_scenario_matches_literal_bytes() {
        let payload = br#"{"type":6,"number":1}"#;
        assert_eq!(21, payload.len());
        let frame = Framer::build(0x06, 0, 0, payload);

        assert_eq!(30, frame.len());
        assert_eq!(
            [0xF1, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x15],
            frame[0..8]
        );
        assert_eq!(payload, &frame[8..29]);
        let sum: u32 = frame.iter().map(|&byte| u32::from(byte)).sum();
        assert_eq!(0, sum % 256);
    }

    #[test]
    fn streaming_1000_bytes_at_512_produces_two_frames_scenario() {
        let payload = vec![0x42; 1000];
        let frames = Framer::build_sequence(0x06, &payload, 512);

        assert_eq!(2, frames.len());
        let first = Framer::verify(&frames[0]).expect("frame 1 should verify");
        let second = Framer::verify(&frames[1]).expect("frame 2 should verify");

        assert_eq!(2, first.total());
        assert_eq!(1, first.remaining());
        assert_eq!(512, first.payload().len());

        assert_eq!(2, second.total());
        assert_eq!(0, second.remaining());
        assert_eq!(488, second.payload().len());

        let mut reassembled = first.payload().to_vec();
        reassembled.extend_from_slice(second.payload());
        assert_eq!(payload, reassembled);
    }

    #[rstest]
    #[case(&[0x00; 4], FrameError::TooShort { actual: 4 })]
    fn verify_rejects_undersized_frames(#[case] frame: &[u8], #[case] expected: FrameError) {
        let result = Framer::verify(frame);
        assert_matches!(result, Err(error) if error == expected);
    }

    #[test]
    fn verify_rejects_bad_command_type() {
        let mut frame = Framer::build(0x06, 0, 0, &[0x01]);
        frame[0] = 0xF2;
        // Recompute nothing: corrupting byte 0 without fixing checksum will also
        // fail the checksum check first, so fix the checksum to isolate the
        // command-type check.
        let sum: u32 = frame[..frame.len() - 1]
            .iter()
            .map(|&byte| u32::from(byte))
            .sum();
        let last = frame.len() - 1;
        frame[last] = ((256 - (sum % 256)) % 256) as u8;

        assert_matches!(
            Framer::verify(&frame),
            Err(FrameError::WrongCommandType { actual: 0xF2 })
        );
    }

    #[test]
    fn verify_rejects_payload_length_mismatch() {
        let mut frame = Framer::build(0x06, 1, 0, &[0x01, 0x02]);
        frame[6] = 0x00;
        frame[7] = 0x05;
        let last = frame.len() - 1;
        let sum: u32 = frame[..last].iter().map(|&byte| u32::from(byte)).sum();
        frame[last] = ((256 - (sum % 256)) % 256) as u8;

        assert_matches!(
            Framer::verify(&frame),
            Err(FrameError::PayloadLengthMismatch {
                declared: 5,
                actual: 2
            })
        );
    }

    #[test]
    fn verify_rejects_bad_checksum() {
        let mut frame = Framer::build(0x06, 0, 0, &[0x01]);
        let last = frame.len() - 1;
        frame[last] = frame[last].wrapping_add(1);

        assert_matches!(Framer::verify(&frame), Err(FrameError::ChecksumMismatch { .. }));
    }
}
