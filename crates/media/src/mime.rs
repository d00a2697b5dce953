//! MIME type to file-extension mapping for downloaded attachments.

use murmur_common::MediaKind;

/// File extension (with leading dot) for a downloaded attachment.
///
/// Audio defaults to `.ogg` (voice notes are Opus in Ogg); images default to
/// `.jpg`.
pub fn extension_for(kind: MediaKind, mime: &str) -> &'static str {
    let mime = mime.to_ascii_lowercase();
    match kind {
        MediaKind::Audio => {
            if mime.contains("mpeg") || mime.contains("mp3") {
                ".mp3"
            } else if mime.contains("mp4") || mime.contains("aac") || mime.contains("m4a") {
                ".m4a"
            } else if mime.contains("wav") {
                ".wav"
            } else {
                ".ogg"
            }
        },
        MediaKind::Image => {
            if mime.contains("png") {
                ".png"
            } else if mime.contains("gif") {
                ".gif"
            } else if mime.contains("webp") {
                ".webp"
            } else {
                ".jpg"
            }
        },
        MediaKind::Video => {
            if mime.contains("3gpp") {
                ".3gp"
            } else {
                ".mp4"
            }
        },
        MediaKind::Document => {
            if mime.contains("pdf") {
                ".pdf"
            } else {
                ".bin"
            }
        },
    }
}

/// Canonical MIME type for an image extension, falling back to JPEG.
pub fn image_mime_for_extension(ext: &str) -> &'static str {
    match ext.trim_start_matches('.') {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
