//! Content-based type detection for uploaded files.
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Bytes inspected from the start of a file.
const SNIFF_LEN: u64 = 8192;

/// Compound File (Word 97, Excel 97) and ZIP (OOXML) signatures. These
/// containers are told apart by their directory, not their first bytes.
const OLE_MAGIC: &[u8] = &[0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

pub const EMPTY: &str = "application/x-empty";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

/// Detect the content type of the file at `path` from its leading bytes.
/// Container formats are read whole; uploads are bounded by the intake
/// limits.
pub fn sniff_path(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    (&mut file).take(SNIFF_LEN).read_to_end(&mut head)?;
    if head.starts_with(OLE_MAGIC) || head.starts_with(ZIP_MAGIC) {
        file.read_to_end(&mut head)?;
    }
    Ok(sniff_bytes(&head).to_string())
}

/// Detect the content type of `head`, the leading bytes of a file.
pub fn sniff_bytes(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return EMPTY;
    }
    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }
    if looks_like_text(head) {
        TEXT_PLAIN
    } else {
        OCTET_STREAM
    }
}

fn looks_like_text(head: &[u8]) -> bool {
    let printable = head.iter().all(|&b| {
        (b >= 0x20 && b != 0x7f) || matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)
    });
    if !printable {
        return false;
    }

    // The window may cut a multi-byte sequence in half.
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    }
}
