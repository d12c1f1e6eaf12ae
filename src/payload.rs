//! Component D: the payload composer (spec §4.4).
//!
//! Wraps an `IMB` or `xV4` container in a binary-in-JSON envelope. The envelope
//! is only JSON-shaped for its textual prefix and suffix; the `data` value is
//! raw binary. Composing it with a general-purpose JSON serializer would
//! corrupt the transmission, so the prefix, body, and suffix are emitted as
//! literal byte sequences instead.

use thiserror::Error;

use crate::imb::{ImbBuilder, ImbError};
use crate::protocol::PacketType;
use crate::xv4::{AnimationFrame, XvFourBuilder, XvFourError};

/// Errors returned while composing a payload.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum PayloadError {
    /// The `IMB` container could not be built.
    #[error(transparent)]
    Imb(#[from] ImbError),
    /// The `xV4` container could not be built.
    #[error(transparent)]
    XvFour(#[from] XvFourError),
}

/// Composes info announcements and image/animation data payloads.
pub struct PayloadComposer;

impl PayloadComposer {
    /// Builds the compact ASCII JSON info announcement, `{"type":<subtype>,"number":<count>}`,
    /// with no whitespace and `type` before `number`.
    ///
    /// ```
    /// use idm::{PacketType, PayloadComposer};
    ///
    /// let info = PayloadComposer::image_info(PacketType::Image, 1);
    /// assert_eq!(br#"{"type":6,"number":1}"#, info.as_slice());
    /// ```
    #[must_use]
    pub fn image_info(subtype: PacketType, count: u32) -> Vec<u8> {
        format!(r#"{{"type":{},"number":{count}}}"#, subtype.as_u8()).into_bytes()
    }

    /// Builds the envelope `{"type":<subtype>,"data":<IMB header><JPEG bytes>}`
    /// for a single still image.
    ///
    /// # Errors
    ///
    /// Returns an error if the `IMB` header cannot be built for `jpeg`.
    pub fn image_data(
        jpeg: &[u8],
        dimensions: (u16, u16),
        subtype: PacketType,
    ) -> Result<Vec<u8>, PayloadError> {
        let jpeg_len = u32::try_from(jpeg.len()).map_err(|_| {
            PayloadError::Imb(ImbError::JpegTooLarge {
                jpeg_length: jpeg.len() as u64,
            })
        })?;
        let header = ImbBuilder::build(jpeg_len, dimensions.0, dimensions.1)?;

        let mut envelope = envelope_prefix(subtype);
        envelope.extend_from_slice(&header);
        envelope.extend_from_slice(jpeg);
        envelope.push(b'}');
        Ok(envelope)
    }

    /// Builds the envelope `{"type":<DYNAMIC_AMBIENCE>,"data":<xV4 container>}`
    /// for an animation.
    ///
    /// # Errors
    ///
    /// Returns an error if the `xV4` container cannot be built (empty frame
    /// list, or a frame too large for the container's offset fields).
    pub fn animation_data(
        frames: &[AnimationFrame<'_>],
        interval_ms: u32,
        dimensions: (u16, u16),
    ) -> Result<Vec<u8>, PayloadError> {
        let container = XvFourBuilder::build(frames, interval_ms, dimensions)?;

        let mut envelope = envelope_prefix(PacketType::DynamicAmbience);
        envelope.extend_from_slice(&container);
        envelope.push(b'}');
        Ok(envelope)
    }
}

fn envelope_prefix(subtype: PacketType) -> Vec<u8> {
    format!(r#"{{"type":{},"data":"#, subtype.as_u8()).into_bytes()
}
