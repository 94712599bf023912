//! Content inspection: image vs. video by file signature, never by extension

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::models::MediaKind;

/// Bytes read from the start of a file for signature checks
const HEADER_LEN: usize = 512;

/// MPEG transport stream packet size
const TS_PACKET_LEN: usize = 188;

/// What a file's content turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub kind: MediaKind,
    pub mime_type: String,
    /// Canonical extension for the managed copy, without dot
    pub extension: String,
}

impl Inspection {
    fn new(kind: MediaKind, mime_type: &str, extension: &str) -> Self {
        Self {
            kind,
            mime_type: mime_type.to_string(),
            extension: extension.to_string(),
        }
    }
}

/// Inspect the file at `path`. `Ok(None)` means the content is neither a
/// supported image nor a supported video.
pub fn inspect_file(path: &Path) -> std::io::Result<Option<Inspection>> {
    let mut file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.by_ref().take(HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok(inspect_bytes(&header))
}

/// Inspect the leading bytes of a file
pub fn inspect_bytes(header: &[u8]) -> Option<Inspection> {
    if let Ok(format) = image::guess_format(header) {
        let extension = format.extensions_str().first().copied().unwrap_or("img");
        return Some(Inspection::new(
            MediaKind::Image,
            format.to_mime_type(),
            extension,
        ));
    }
    inspect_video(header)
}

fn inspect_video(header: &[u8]) -> Option<Inspection> {
    // ISO base media (mp4, mov, m4v, 3gp): size, "ftyp", major brand
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        let brand = &header[8..12];
        return match brand {
            b"qt  " => Some(Inspection::new(MediaKind::Video, "video/quicktime", "mov")),
            b"M4V " | b"M4VH" | b"M4VP" => {
                Some(Inspection::new(MediaKind::Video, "video/x-m4v", "m4v"))
            }
            b"3gp4" | b"3gp5" | b"3gp6" | b"3ge6" | b"3gg6" => {
                Some(Inspection::new(MediaKind::Video, "video/3gpp", "3gp"))
            }
            // Still-image containers sharing the box layout
            b"heic" | b"heix" | b"mif1" | b"msf1" | b"avif" | b"avis" => None,
            // Audio-only containers
            b"M4A " | b"M4B " => None,
            _ => Some(Inspection::new(MediaKind::Video, "video/mp4", "mp4")),
        };
    }

    // Matroska / WebM (EBML header, doctype follows shortly after)
    if header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        let is_webm = header.windows(4).any(|w| w == b"webm");
        return Some(if is_webm {
            Inspection::new(MediaKind::Video, "video/webm", "webm")
        } else {
            Inspection::new(MediaKind::Video, "video/x-matroska", "mkv")
        });
    }

    if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"AVI " {
        return Some(Inspection::new(MediaKind::Video, "video/x-msvideo", "avi"));
    }

    if header.starts_with(b"FLV\x01") {
        return Some(Inspection::new(MediaKind::Video, "video/x-flv", "flv"));
    }

    // ASF container (wmv)
    if header.starts_with(&[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11]) {
        return Some(Inspection::new(MediaKind::Video, "video/x-ms-wmv", "wmv"));
    }

    // MPEG program stream
    if header.starts_with(&[0x00, 0x00, 0x01, 0xBA]) {
        return Some(Inspection::new(MediaKind::Video, "video/mpeg", "mpg"));
    }

    // MPEG transport stream: sync byte at the start of two consecutive packets
    if header.len() > TS_PACKET_LEN && header[0] == 0x47 && header[TS_PACKET_LEN] == 0x47 {
        return Some(Inspection::new(MediaKind::Video, "video/mp2t", "ts"));
    }

    None
}
