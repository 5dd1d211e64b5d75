//! Known image formats and the three ways the crate infers one: from a
//! filename extension, from a media type, or from magic bytes.

/// How many leading bytes a magic-byte check needs.
pub const DETECT_READ_LENGTH: u64 = 64;

/// Image formats the source layer can recognize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Jpeg,
    Png,
    Gif,
    Tiff,
    Webp,
    Bmp,
}

impl Format {
    /// Preferred filename extension, without the dot.
    pub fn preferred_extension(&self) -> &'static str {
        match self {
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Tiff => "tif",
            Format::Webp => "webp",
            Format::Bmp => "bmp",
        }
    }

    /// Preferred media type.
    pub fn media_type(&self) -> &'static str {
        match self {
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
            Format::Gif => "image/gif",
            Format::Tiff => "image/tiff",
            Format::Webp => "image/webp",
            Format::Bmp => "image/bmp",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Format> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Format::Jpeg),
            "png" => Some(Format::Png),
            "gif" => Some(Format::Gif),
            "tif" | "tiff" => Some(Format::Tiff),
            "webp" => Some(Format::Webp),
            "bmp" => Some(Format::Bmp),
            _ => None,
        }
    }

    /// Infers a format from the extension of a path-like name, if any.
    pub fn from_path_extension(name: &str) -> Option<Format> {
        let (_, extension) = name.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    /// Infers a format from a `Content-Type` value. Generic types such as
    /// `application/octet-stream` are not specific enough to count.
    pub fn from_media_type(media_type: &str) -> Option<Format> {
        let essence = media_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Format::Jpeg),
            "image/png" => Some(Format::Png),
            "image/gif" => Some(Format::Gif),
            "image/tiff" => Some(Format::Tiff),
            "image/webp" => Some(Format::Webp),
            "image/bmp" | "image/x-ms-bmp" => Some(Format::Bmp),
            _ => None,
        }
    }

    /// Infers a format from leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Format> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Format::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Format::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Format::Gif)
        } else if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00])
            || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            Some(Format::Tiff)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Format::Webp)
        } else if bytes.starts_with(b"BM") {
            Some(Format::Bmp)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_round_trip() {
        for format in [
            Format::Jpeg,
            Format::Png,
            Format::Gif,
            Format::Tiff,
            Format::Webp,
            Format::Bmp,
        ] {
            assert_eq!(Format::from_extension(format.preferred_extension()), Some(format));
            assert_eq!(Format::from_media_type(format.media_type()), Some(format));
        }
    }

    #[test]
    fn path_extension_is_case_insensitive() {
        assert_eq!(Format::from_path_extension("photos/cat.JPG"), Some(Format::Jpeg));
        assert_eq!(Format::from_path_extension("no-extension"), None);
    }

    #[test]
    fn octet_stream_is_not_specific_enough() {
        assert_eq!(Format::from_media_type("application/octet-stream"), None);
        assert_eq!(Format::from_media_type("image/png; charset=binary"), Some(Format::Png));
    }

    #[test]
    fn magic_bytes() {
        assert_eq!(Format::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(Format::Jpeg));
        assert_eq!(
            Format::detect(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            Some(Format::Png)
        );
        assert_eq!(Format::detect(b"GIF89a..."), Some(Format::Gif));
        assert_eq!(Format::detect(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(Format::Webp));
        assert_eq!(Format::detect(b"not an image"), None);
        assert_eq!(Format::detect(&[]), None);
    }
}
