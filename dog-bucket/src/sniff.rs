//! Content type detection for writers opened without a declared media type.

pub(crate) const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

/// Exact byte prefixes and the media type they identify
const PREFIXES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"fLaC", "audio/flac"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"Rar!\x1A\x07", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// Markup openers, matched case-insensitively after leading whitespace.
/// Each must be followed by a space or `>` to count.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Infer a media type from the first bytes of an object.
///
/// Binary signatures win, then the extension of `key`, then a text/binary
/// split on the bytes themselves.
pub fn detect_content_type(prefix: &[u8], key: &str) -> String {
    if let Some(found) = sniff_signature(prefix) {
        return found.to_string();
    }

    if let Some(guess) = mime_guess::from_path(key).first_raw() {
        return guess.to_string();
    }

    if prefix.iter().any(|b| is_binary(*b)) {
        OCTET_STREAM.to_string()
    } else {
        TEXT_PLAIN.to_string()
    }
}

fn sniff_signature(data: &[u8]) -> Option<&'static str> {
    let trimmed = trim_leading_whitespace(data);
    if HTML_TAGS.iter().any(|tag| matches_html_tag(trimmed, tag)) {
        return Some("text/html; charset=utf-8");
    }
    if trimmed.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }

    if let Some(media_type) = PREFIXES
        .iter()
        .find(|(sig, _)| data.starts_with(sig))
        .map(|(_, media_type)| *media_type)
    {
        return Some(media_type);
    }

    if data.len() >= 12 && &data[..4] == b"RIFF" {
        match &data[8..12] {
            b"WAVE" => return Some("audio/wave"),
            b"AVI " => return Some("video/avi"),
            b"WEBP" => return Some("image/webp"),
            _ => {}
        }
    }

    // ISO base media: big-endian box size, then "ftyp"
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if box_size % 4 == 0 && box_size <= data.len() {
            return Some("video/mp4");
        }
    }

    None
}

fn matches_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(data[tag.len()], b' ' | b'>')
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
