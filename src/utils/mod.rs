//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use regex::Regex;
use std::sync::OnceLock;

use self::error::FetchError;

/// Decode a response body into a string
///
/// This method tries multiple strategies:
/// 1. Check Content-Type header for charset
/// 2. Check the XML declaration's `encoding` attribute
/// 3. Try UTF-8 decoding
/// 4. Fallback to Windows-1252
pub fn decode_body(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
    if let Some(encoding) = charset_from_content_type(content_type) {
        return decode_with(encoding, bytes);
    }

    if let Some(encoding) = charset_from_declaration(bytes) {
        return decode_with(encoding, bytes);
    }

    if let Ok(text) = decode_with(UTF_8, bytes) {
        return Ok(text);
    }

    decode_with(WINDOWS_1252, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, FetchError> {
    let (cow, _encoding, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(FetchError::Decode(format!(
            "{} decoding errors",
            encoding.name()
        )));
    }

    Ok(cow.into_owned())
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let lower = content_type.to_ascii_lowercase();
    let (_, charset) = lower.split_once("charset=")?;
    let label = charset.split(';').next()?.trim().trim_matches('"');

    Encoding::for_label(label.as_bytes())
}

fn charset_from_declaration(bytes: &[u8]) -> Option<&'static Encoding> {
    static DECLARATION_RE: OnceLock<Regex> = OnceLock::new();

    let re = DECLARATION_RE.get_or_init(|| {
        Regex::new(r#"^\s*<\?xml[^>]*encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#)
            .expect("Invalid regex pattern")
    });

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(200)]);
    let label = re.captures(&head)?.get(1)?.as_str().to_string();

    Encoding::for_label(label.as_bytes())
}

/// Hex-encode the UTF-8 bytes of a string
pub fn hex(input: &str) -> String {
    input.bytes().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_by_default() {
        let text = "<VpMobil>Größe</VpMobil>";
        assert_eq!(decode_body(text.as_bytes(), "").unwrap(), text);
    }

    #[test]
    fn test_decode_content_type_charset() {
        // "Mär" in ISO-8859-1
        let bytes: &[u8] = &[0x4d, 0xe4, 0x72];
        let decoded = decode_body(bytes, "text/xml; charset=ISO-8859-1").unwrap();
        assert_eq!(decoded, "Mär");
    }

    #[test]
    fn test_decode_declaration_charset() {
        let mut bytes = br#"<?xml version="1.0" encoding="iso-8859-1"?><a>"#.to_vec();
        bytes.push(0xfc);
        bytes.extend_from_slice(b"</a>");

        let decoded = decode_body(&bytes, "text/xml").unwrap();
        assert!(decoded.ends_with("<a>ü</a>"));
    }

    #[test]
    fn test_decode_latin_fallback() {
        let bytes: &[u8] = &[0x4d, 0xe4, 0x72, 0x7a];
        assert_eq!(decode_body(bytes, "").unwrap(), "März");
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex("5a"), "3561");
        assert_eq!(hex(""), "");
    }
}
