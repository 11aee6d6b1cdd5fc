use std::borrow::Cow;

use encoding_rs::{mem::decode_latin1, UTF_8};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode uploaded bytes as UTF-8, falling back to Latin-1.
///
/// Never fails: every byte maps to the code point of the same value, so
/// 0x80..=0x9F stay C1 controls rather than windows-1252 punctuation.
pub fn decode_upload(bytes: &[u8]) -> Cow<'_, str> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        return text;
    }

    tracing::debug!(len = bytes.len(), "Upload is not valid UTF-8, decoding as Latin-1");
    decode_latin1(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8() {
        assert_eq!(decode_upload("héllo 你好".as_bytes()), "héllo 你好");
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"text");
        assert_eq!(decode_upload(&bytes), "text");
    }

    #[test]
    fn falls_back_to_latin1() {
        assert_eq!(decode_upload(b"caf\xe9 cr\xe8me"), "café crème");
    }

    #[test]
    fn latin1_keeps_c1_controls() {
        assert_eq!(
            decode_upload(b"price \x80 \x93q\x94"),
            "price \u{80} \u{93}q\u{94}"
        );
    }

    #[test]
    fn empty_upload_is_empty_text() {
        assert_eq!(decode_upload(b""), "");
    }
}
