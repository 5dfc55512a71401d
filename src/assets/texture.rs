//! Diffuse texture decoding

use std::path::Path;

/// Alpha values below this mark a texture as translucent
const OPAQUE_ALPHA: u8 = 250;

/// Decoded RGBA8 texture
#[derive(Debug, Clone, PartialEq)]
pub struct DiffuseImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub has_alpha: bool,
}

impl DiffuseImage {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        let has_alpha = rgba.chunks_exact(4).any(|px| px[3] < OPAQUE_ALPHA);
        Self {
            width,
            height,
            rgba,
            has_alpha,
        }
    }

    /// Decode an image file, forcing four channels
    pub fn load(path: &Path) -> Result<Self, image::ImageError> {
        let decoded = image::open(path)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self::from_rgba(width, height, decoded.into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_detection() {
        let opaque = DiffuseImage::from_rgba(2, 1, vec![0, 0, 0, 255, 9, 9, 9, 250]);
        assert!(!opaque.has_alpha);
        let cutout = DiffuseImage::from_rgba(2, 1, vec![0, 0, 0, 255, 9, 9, 9, 249]);
        assert!(cutout.has_alpha);
    }

    #[test]
    fn test_load_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        let img = image::RgbaImage::from_raw(2, 2, vec![
            255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 0,
        ])
        .unwrap();
        img.save(&path).unwrap();

        let loaded = DiffuseImage::load(&path).unwrap();
        assert_eq!((loaded.width, loaded.height), (2, 2));
        assert_eq!(loaded.rgba.len(), 16);
        assert!(loaded.has_alpha);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DiffuseImage::load(Path::new("definitely/not/here.png")).is_err());
    }
}
