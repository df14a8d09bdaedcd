//! `multipart/form-data` body splitting.
//!
//! The body is scanned for `--boundary` markers; everything between two
//! consecutive markers is one part. Parts without a `filename=` field are
//! form fields, not files, and are skipped. Malformed parts are skipped
//! silently rather than failing the whole upload.

use crate::server::scan;

/// One file carried by a multipart body, borrowing the body buffer.
#[derive(Debug, PartialEq)]
pub struct FilePart<'a> {
    pub filename: String,
    pub data: &'a [u8],
}

/// Extract the `boundary=` parameter from a `Content-Type` header value.
pub fn boundary_from_content_type(value: &str) -> Option<String> {
    let rest = &value[scan::find(value.as_bytes(), b"boundary=")? + "boundary=".len()..];
    let token = rest.split(';').next().unwrap_or(rest).trim();
    let token = token.trim_matches('"');
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Split a multipart body into its file parts.
pub fn parse_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<FilePart<'a>> {
    let marker = format!("--{boundary}");
    let marker = marker.as_bytes();

    let mut parts = Vec::new();
    let Some(mut pos) = scan::find(body, marker) else {
        return parts;
    };

    loop {
        let content_start = pos + marker.len();

        // Terminal marker: "--boundary--" ends the body.
        if body[content_start..].starts_with(b"--") {
            break;
        }

        let Some(next) = scan::find_from(body, marker, content_start) else {
            break;
        };

        // Skip the CRLF after the boundary line, trim the CRLF that
        // precedes the next boundary.
        let start = content_start + 2;
        let end = next.saturating_sub(2);
        if start <= end && end <= body.len() {
            if let Some(part) = file_part(&body[start..end]) {
                parts.push(part);
            }
        }

        pos = next;
    }

    parts
}

/// Interpret one part's bytes as a file: part headers, blank line, payload.
/// Returns `None` for non-file parts and malformed parts.
fn file_part(part: &[u8]) -> Option<FilePart<'_>> {
    let sep = scan::find(part, b"\r\n\r\n")?;
    let filename = filename_in(&part[..sep])?;
    if filename.is_empty() {
        return None;
    }

    let data = &part[sep + 4..];
    if data.is_empty() {
        return None;
    }

    Some(FilePart { filename, data })
}

/// First quoted `filename="…"` value in a raw byte block, if any.
///
/// Also used for the early best-effort display name, scanning whatever body
/// bytes have arrived so far.
pub fn filename_in(block: &[u8]) -> Option<String> {
    let token = b"filename=\"";
    let start = scan::find(block, token)? + token.len();
    let end = scan::find_from(block, b"\"", start)?;
    Some(String::from_utf8_lossy(&block[start..end]).to_string())
}

/// Minimal percent-decoding for the `X-Filename` request header.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = |b: u8| (b as char).to_digit(16);
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).to_string()
}
