//! Encoding normalization for downloaded text.
//!
//! Archived pages frequently carry legacy encodings or stray invalid bytes.
//! `tidy_bytes` turns them into valid UTF-8 without ever failing.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Encoding, EUC_KR, GB18030, SHIFT_JIS, UTF_8, WINDOWS_1251, WINDOWS_1252};
use regex::{bytes, Regex};

/// Legacy encodings tried, in order, when nothing declares one.
fn fallback_encodings() -> [&'static Encoding; 5] {
    [WINDOWS_1251, GB18030, SHIFT_JIS, EUC_KR, WINDOWS_1252]
}

/// How far into a document a charset declaration is looked for.
const PRESCAN_LEN: usize = 1024;

static DECLARED_CHARSET: LazyLock<bytes::Regex> = LazyLock::new(|| {
    bytes::Regex::new(r#"(?i)(?:@charset\s+["']|charset\s*=\s*["']?)([a-z0-9_.:\-]+)"#).unwrap()
});

static DECLARED_CHARSET_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:@charset\s+["']|charset\s*=\s*["']?)([a-z0-9_.:\-]+)"#).unwrap()
});

/// Returns true if the data looks binary (contains NUL bytes).
pub fn is_binary_data(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}

/// Convert bytes of unknown encoding into valid UTF-8.
///
/// - Valid UTF-8 and binary data (NUL bytes present) are returned unchanged.
/// - A charset from `content_type`, or declared in the first bytes of the
///   document (`<meta charset>`, `http-equiv`, `@charset`), is used when it
///   decodes cleanly. A declaration inside the document is updated to `utf-8`.
/// - Otherwise Windows-1251, GB18030, Shift_JIS, EUC-KR and Windows-1252 are
///   tried in turn; the first that decodes without errors wins.
/// - Failing all of those, invalid sequences become U+FFFD.
pub fn tidy_bytes(bytes: &[u8], content_type: Option<&str>) -> Vec<u8> {
    if std::str::from_utf8(bytes).is_ok() || is_binary_data(bytes) {
        return bytes.to_vec();
    }

    if let Some(encoding) = content_type.and_then(header_charset) {
        if let Some(text) = decode_strict(encoding, bytes) {
            return mark_utf8(text.into_owned()).into_bytes();
        }
    }

    if let Some(encoding) = document_charset(bytes) {
        if let Some(text) = decode_strict(encoding, bytes) {
            return mark_utf8(text.into_owned()).into_bytes();
        }
    }

    fallback_encodings()
        .into_iter()
        .find_map(|encoding| decode_strict(encoding, bytes))
        .unwrap_or_else(|| String::from_utf8_lossy(bytes))
        .into_owned()
        .into_bytes()
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    if encoding == UTF_8 {
        return None;
    }
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches(['"', '\'']).as_bytes())
    })
}

fn document_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(PRESCAN_LEN)];
    let caps = DECLARED_CHARSET.captures(head)?;
    Encoding::for_label(&caps[1])
}

/// Point an in-document charset declaration at UTF-8 after transcoding.
fn mark_utf8(text: String) -> String {
    let label = DECLARED_CHARSET_TEXT
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
        .filter(|range| range.start < PRESCAN_LEN);
    match label {
        Some(range) => format!("{}utf-8{}", &text[..range.start], &text[range.end..]),
        None => text,
    }
}
