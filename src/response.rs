//! Component E: the response parser (spec §4.5).
//!
//! Normalizes inbound notification bytes into a status tag, optional loosely
//! parsed JSON, and — when the JSON names the device-status packet type — a
//! typed [`DeviceStatus`] record.

use serde_json::Value;

use crate::protocol::{sentinel, PacketType};

/// Device-status fields reported by the badge (spec §3, §8 scenario 5).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// Total storage, in kilobytes.
    pub total_space_kb: u64,
    /// Free storage, in kilobytes.
    pub free_space_kb: u64,
    /// Advertised device name.
    pub device_name: String,
    /// Panel size as reported by the device, e.g. `"64x32"`.
    pub size: String,
    /// Brand identifier.
    pub brand: i64,
}

/// A status tag recognized in a cleaned notification's text.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StatusTag {
    /// Cleaned text contained `"GetPacketSuccess"`.
    Success,
    /// Cleaned text contained `"PacketFail"`.
    Fail,
    /// Cleaned text contained `"1111111111"`.
    Error,
}

/// One parsed inbound notification (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    text: String,
    status: Option<StatusTag>,
    json: Option<Value>,
    device_status: Option<DeviceStatus>,
}

impl ParsedResponse {
    /// Returns the cleaned text (no `0x00`/`0xD1` bytes, trimmed).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the recognized status tag, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusTag> {
        self.status
    }

    /// Returns the loosely parsed JSON value, if any.
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Returns the typed device-status record, if the JSON named the
    /// device-status packet type.
    #[must_use]
    pub fn device_status(&self) -> Option<&DeviceStatus> {
        self.device_status.as_ref()
    }

    /// Returns whether the status tag is [`StatusTag::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Some(StatusTag::Success)
    }

    /// Returns whether the status tag is [`StatusTag::Fail`].
    #[must_use]
    pub fn is_fail(&self) -> bool {
        self.status == Some(StatusTag::Fail)
    }

    /// Returns whether the status tag is [`StatusTag::Error`].
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == Some(StatusTag::Error)
    }
}

/// Parses raw inbound notification bytes into a [`ParsedResponse`] (spec §4.5).
pub struct ResponseParser;

impl ResponseParser {
    /// Cleans `raw`, detects a status sentinel, attempts lenient JSON
    /// decoding, and extracts a device-status record when applicable.
    ///
    /// ```
    /// use idm::{ResponseParser, StatusTag};
    ///
    /// let parsed = ResponseParser::parse(b"\xD1GetPacketSuccess\x00");
    /// assert!(parsed.is_success());
    /// assert_eq!(Some(StatusTag::Success), parsed.status());
    /// ```
    #[must_use]
    #[tracing::instrument(skip(raw), fields(raw_len = raw.len()))]
    pub fn parse(raw: &[u8]) -> ParsedResponse {
        let cleaned: Vec<u8> = raw
            .iter()
            .copied()
            .filter(|&byte| byte != 0x00 && byte != 0xD1)
            .collect();
        let text = String::from_utf8_lossy(&cleaned).trim().to_string();

        let status = if text.contains(sentinel::SUCCESS) {
            Some(StatusTag::Success)
        } else if text.contains(sentinel::FAIL) {
            Some(StatusTag::Fail)
        } else if text.contains(sentinel::ERROR) {
            Some(StatusTag::Error)
        } else {
            None
        };

        let json = parse_json_leniently(&text);
        let device_status = json.as_ref().and_then(extract_device_status);

        ParsedResponse {
            text,
            status,
            json,
            device_status,
        }
    }
}

fn parse_json_leniently(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn extract_device_status(json: &Value) -> Option<DeviceStatus> {
    let type_value = json.get("type")?;
    let type_code = coerce_u8(type_value)?;
    if type_code != PacketType::DeviceStatus.as_u8() {
        return None;
    }

    Some(DeviceStatus {
        total_space_kb: json.get("allspace").and_then(coerce_u64).unwrap_or(0),
        free_space_kb: json.get("freespace").and_then(coerce_u64).unwrap_or(0),
        device_name: json
            .get("devname")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        size: json
            .get("size")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        brand: json.get("brand").and_then(coerce_i64).unwrap_or(0),
    })
}

fn coerce_u8(value: &Value) -> Option<u8> {
    coerce_i64(value).and_then(|number| u8::try_from(number).ok())
}

fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b"GetPacketSuccess".as_slice(), StatusTag::Success)]
    #[case(b"\xD1\x00PacketFail".as_slice(), StatusTag::Fail)]
    #[case(b"  1111111111  ".as_slice(), StatusTag::Error)]
    fn recognizes_each_sentinel(#[case] raw: &[u8], #[case] expected: StatusTag) {
        let parsed = ResponseParser::parse(raw);
        assert_eq!(Some(expected), parsed.status());
    }

    #[test]
    fn cleaning_strips_0x00_and_0xd1_and_trims_whitespace() {
        let raw = b"\xD1\x00  GetPacketSuccess \x00\xD1";
        let parsed = ResponseParser::parse(raw);
        assert!(!parsed.text().as_bytes().contains(&0x00));
        assert!(!parsed.text().as_bytes().contains(&0xD1));
        assert_eq!("GetPacketSuccess", parsed.text());
    }

    #[test]
    fn no_sentinel_present_yields_no_status() {
        let parsed = ResponseParser::parse(b"hello badge");
        assert_eq!(None, parsed.status());
    }

    #[test]
    fn device_status_parses_spec_literal_example() {
        let raw: &[u8] = &[
            0x7B, 0x22, 0x74, 0x79, 0x70, 0x65, 0x22, 0x3A, 0x31, 0x33, 0x2C, 0x22, 0x61, 0x6C,
            0x6C, 0x73, 0x70, 0x61, 0x63, 0x65, 0x22, 0x3A, 0x31, 0x36, 0x33, 0x38, 0x34, 0x2C,
            0x22, 0x66, 0x72, 0x65, 0x65, 0x73, 0x70, 0x61, 0x63, 0x65, 0x22, 0x3A, 0x31, 0x33,
            0x38, 0x39, 0x32, 0x2C, 0x22, 0x64, 0x65, 0x76, 0x6E, 0x61, 0x6D, 0x65, 0x22, 0x3A,
            0x22, 0x42, 0x65, 0x61, 0x6D, 0x42, 0x6F, 0x78, 0x22, 0x2C, 0x22, 0x73, 0x69, 0x7A,
            0x65, 0x22, 0x3A, 0x22, 0x36, 0x34, 0x78, 0x33, 0x32, 0x22, 0x2C, 0x22, 0x62, 0x72,
            0x61, 0x6E, 0x64, 0x22, 0x3A, 0x31, 0x7D,
        ];
        let parsed = ResponseParser::parse(raw);
        let status = parsed.device_status().expect("should extract device status");
        assert_eq!(16384, status.total_space_kb);
        assert_eq!(13892, status.free_space_kb);
        assert_eq!("BeamBox", status.device_name);
        assert_eq!("64x32", status.size);
        assert_eq!(1, status.brand);
    }

    #[test]
    fn device_status_type_field_accepts_integer_as_string() {
        let raw = br#"{"type":"13","allspace":"100","freespace":"50","devname":"B","size":"8x8","brand":"2"}"#;
        let parsed = ResponseParser::parse(raw);
        let status = parsed.device_status().expect("should extract device status");
        assert_eq!(100, status.total_space_kb);
        assert_eq!(50, status.free_space_kb);
        assert_eq!(2, status.brand);
    }

    #[test]
    fn non_device_status_json_yields_no_device_status_record() {
        let parsed = ResponseParser::parse(br#"{"type":6,"number":1}"#);
        assert!(parsed.json().is_some());
        assert!(parsed.device_status().is_none());
    }

    #[test]
    fn malformed_json_falls_back_to_brace_extraction() {
        let parsed = ResponseParser::parse(b"garbage-prefix{\"type\":13,\"allspace\":1,\"freespace\":1,\"devname\":\"x\",\"size\":\"1x1\",\"brand\":1}trailing-noise");
        assert!(parsed.device_status().is_some());
    }

    #[test]
    fn unparsable_text_yields_no_json() {
        let parsed = ResponseParser::parse(b"not json at all");
        assert!(parsed.json().is_none());
        assert!(parsed.device_status().is_none());
    }
}
