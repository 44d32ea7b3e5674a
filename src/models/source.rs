use std::path::Path;

use crate::config::ALLOWED_EXTENSIONS;
use crate::error::GalleryError;

/// A file the user picked for upload. Owned by the caller for the span of
/// one upload attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    /// Declared media type, e.g. `image/png`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: &str, media_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: sanitize_filename(name),
            media_type: media_type.to_ascii_lowercase(),
            bytes,
        }
    }

    /// Load a file from disk, detecting its media type from magic bytes
    /// and falling back to the extension.
    pub fn read(path: &Path) -> Result<Self, GalleryError> {
        let bytes = std::fs::read(path)
            .map_err(|e| GalleryError::FileRead(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image");

        let media_type = match sniff_image_type(&bytes) {
            Some(mime) => mime.to_string(),
            None => mime_guess::from_path(path)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        };

        Ok(Self::new(name, &media_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Declared media type is some `image/*`.
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// Extension is on the server's allow-list.
    pub fn has_allowed_extension(&self) -> bool {
        extension_of(&self.name)
            .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Transmit-ready payload derived from one `SourceFile`. Consumed by exactly
/// one upload request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitUnit {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    /// Encoder quality used, `None` when the source went out untouched.
    pub quality: Option<u8>,
    /// Output dimensions when the image was re-encoded.
    pub dimensions: Option<(u32, u32)>,
}

impl TransmitUnit {
    /// Send the source as-is.
    pub fn passthrough(file: SourceFile) -> Self {
        Self {
            file_name: file.name,
            media_type: file.media_type,
            bytes: file.bytes,
            quality: None,
            dimensions: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_reencoded(&self) -> bool {
        self.quality.is_some()
    }
}

/// Identify common image containers from their magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'B', b'M', ..] => Some("image/bmp"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// Strip any directory components and separators from a user-supplied name.
pub fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let clean: String = name
        .chars()
        .filter(|c| *c != '\0' && !c.is_control())
        .take(255)
        .collect();

    if clean.trim().is_empty() {
        "image".to_string()
    } else {
        clean
    }
}

/// Replace (or add) the extension of a filename.
pub fn with_extension(name: &str, ext: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{ext}"),
        _ => format!("{name}.{ext}"),
    }
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_media_types_are_detected() {
        assert!(SourceFile::new("a.png", "image/png", vec![]).is_image());
        assert!(SourceFile::new("a.png", "IMAGE/PNG", vec![]).is_image());
        assert!(!SourceFile::new("a.pdf", "application/pdf", vec![]).is_image());
        assert!(!SourceFile::new("a.txt", "", vec![]).is_image());
    }

    #[test]
    fn sniff_detects_containers() {
        assert_eq!(sniff_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D]), Some("image/png"));
        assert_eq!(sniff_image_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_image_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_image_type(b"%PDF-1.7"), None);
    }

    #[test]
    fn read_uses_magic_bytes_over_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mislabelled.txt");
        std::fs::write(&path, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();

        let file = SourceFile::read(&path).unwrap();
        assert_eq!(file.media_type, "image/png");
        assert_eq!(file.name, "mislabelled.txt");
        assert_eq!(file.size(), 8);
    }

    #[test]
    fn read_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let file = SourceFile::read(&path).unwrap();
        assert_eq!(file.media_type, "text/plain");
        assert!(!file.is_image());
    }

    #[test]
    fn read_missing_file_is_error() {
        let err = SourceFile::read(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, GalleryError::FileRead(_)));
    }

    #[test]
    fn sanitize_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\pic.png"), "pic.png");
        assert_eq!(sanitize_filename("dir/"), "image");
    }

    #[test]
    fn extension_rewrite() {
        assert_eq!(with_extension("scan.PNG", "jpg"), "scan.jpg");
        assert_eq!(with_extension("archive.tar.gz", "jpg"), "archive.tar.jpg");
        assert_eq!(with_extension("noext", "jpg"), "noext.jpg");
        assert_eq!(with_extension(".hidden", "jpg"), ".hidden.jpg");
    }

    #[test]
    fn allowed_extensions_follow_server_list() {
        assert!(SourceFile::new("a.JPEG", "image/jpeg", vec![]).has_allowed_extension());
        assert!(SourceFile::new("a.webp", "image/webp", vec![]).has_allowed_extension());
        assert!(!SourceFile::new("a.tiff", "image/tiff", vec![]).has_allowed_extension());
        assert!(!SourceFile::new("png", "image/png", vec![]).has_allowed_extension());
    }
}
