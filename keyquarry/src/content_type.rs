//! Content-type sniffer used when `Set` is called without an explicit
//! content-type: inspects the first bytes of the value and returns the
//! best-matching MIME type. Same detect-and-score shape as the teacher's
//! `encoding::format_detector::FormatDetector`, generalized from encoding
//! formats (Base64/Hex/JSON-string) to MIME sniffing over magic bytes.

use mime::Mime;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

struct Signature {
    magic: &'static [u8],
    mime: &'static str,
}

const SIGNATURES: &[Signature] = &[
    Signature { magic: b"\x89PNG\r\n\x1a\n", mime: "image/png" },
    Signature { magic: b"\xff\xd8\xff", mime: "image/jpeg" },
    Signature { magic: b"GIF87a", mime: "image/gif" },
    Signature { magic: b"GIF89a", mime: "image/gif" },
    Signature { magic: b"%PDF-", mime: "application/pdf" },
    Signature { magic: b"PK\x03\x04", mime: "application/zip" },
    Signature { magic: b"\x1f\x8b", mime: "application/gzip" },
];

/// Sniff a MIME type from the leading bytes of `value`. Falls back to
/// `text/plain; charset=utf-8` for valid UTF-8 text, and to
/// `application/octet-stream` otherwise.
pub fn sniff(value: &[u8]) -> String {
    if let Some(mime) = detect_best(value) {
        return mime;
    }
    DEFAULT_CONTENT_TYPE.to_string()
}

fn detect_best(value: &[u8]) -> Option<String> {
    for sig in SIGNATURES {
        if value.starts_with(sig.magic) {
            return Some(sig.mime.to_string());
        }
    }
    if looks_like_json(value) {
        return Some(mime::APPLICATION_JSON.to_string());
    }
    if let Ok(text) = std::str::from_utf8(value) {
        if !text.is_empty() {
            let plain: Mime = mime::TEXT_PLAIN_UTF_8;
            return Some(plain.to_string());
        }
    }
    None
}

fn looks_like_json(value: &[u8]) -> bool {
    let trimmed = trim_leading_ws(value);
    match trimmed.first() {
        Some(b'{') | Some(b'[') => serde_json::from_slice::<serde_json::Value>(value).is_ok(),
        _ => false,
    }
}

fn trim_leading_ws(value: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < value.len() && value[i].is_ascii_whitespace() {
        i += 1;
    }
    &value[i..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_signature() {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(b"rest");
        assert_eq!(sniff(&bytes), "image/png");
    }

    #[test]
    fn sniffs_json_object() {
        assert_eq!(sniff(br#"{"a":1}"#), mime::APPLICATION_JSON.to_string());
    }

    #[test]
    fn sniffs_plain_text() {
        assert_eq!(sniff(b"hello world"), mime::TEXT_PLAIN_UTF_8.to_string());
    }

    #[test]
    fn falls_back_to_octet_stream_for_binary_garbage() {
        let garbage = [0xffu8, 0xfe, 0x00, 0x01, 0xd8, 0xff];
        assert_eq!(sniff(&garbage), DEFAULT_CONTENT_TYPE);
    }
}
