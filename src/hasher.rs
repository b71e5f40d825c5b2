//! Content and pixel hashing for a single file
//!
//! The content hash covers the raw bytes on disk. The pixel hash covers the
//! decoded pixel buffer, so an edit that only touches metadata changes the
//! first but not the second.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::config::DEFAULT_BLOCK_SIZE;
use crate::error::{PintError, Result};
use crate::models::HexDigest;

/// Decodes an image file into its canonical pixel buffer
pub trait PixelDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Decoder backed by the `image` crate.
///
/// The format is sniffed from the file content. No EXIF orientation is
/// applied, the buffer is the pixels as stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl PixelDecoder for ImageDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<u8>> {
        let reader = image::ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| PintError::io(path.to_path_buf(), "pixel hash", e))?;

        let img = reader.decode().map_err(|e| match e {
            image::ImageError::IoError(io) => PintError::io(path.to_path_buf(), "pixel hash", io),
            other => PintError::decode(path.to_path_buf(), format!("pixel hash: {}", other)),
        })?;

        Ok(img.into_bytes())
    }
}

/// Computes content and pixel digests
pub struct FileHasher {
    block_size: usize,
    decoder: Box<dyn PixelDecoder>,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

impl FileHasher {
    /// Create a hasher using the `image` crate decoder
    pub fn new(block_size: usize) -> Self {
        Self::with_decoder(block_size, Box::new(ImageDecoder))
    }

    /// Create a hasher with a custom pixel decoder
    pub fn with_decoder(block_size: usize, decoder: Box<dyn PixelDecoder>) -> Self {
        Self {
            block_size: block_size.max(1),
            decoder,
        }
    }

    /// Hash the raw file bytes, streaming in `block_size` chunks
    pub fn content_hash(&self, path: &Path) -> Result<HexDigest> {
        let mut file =
            File::open(path).map_err(|e| PintError::io(path.to_path_buf(), "content hash", e))?;

        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; self.block_size];
        loop {
            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(PintError::io(path.to_path_buf(), "content hash", e)),
            };
            hasher.update(&buffer[..n]);
        }

        Ok(finish(hasher))
    }

    /// Hash the decoded pixel buffer
    pub fn pixel_hash(&self, path: &Path) -> Result<HexDigest> {
        let pixels = self.decoder.decode(path)?;
        let mut hasher = Md5::new();
        hasher.update(&pixels);
        Ok(finish(hasher))
    }
}

fn finish(hasher: Md5) -> HexDigest {
    HexDigest::from_lower_hex(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PintErrorKind;
    use crate::test_support::{edit_metadata, write_jpeg};

    #[test]
    fn test_content_hash_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();

        let hasher = FileHasher::default();
        assert_eq!(
            hasher.content_hash(&path).unwrap().as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_content_hash_independent_of_block_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jpg");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let small = FileHasher::new(7).content_hash(&path).unwrap();
        let large = FileHasher::new(1 << 20).content_hash(&path).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_content_hash_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileHasher::default()
            .content_hash(&dir.path().join("gone.jpg"))
            .unwrap_err();
        assert_eq!(err.kind, PintErrorKind::NotFound);
        assert!(err.message.contains("content hash"));
    }

    #[test]
    fn test_metadata_edit_keeps_pixel_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path, [200, 30, 30]);

        let hasher = FileHasher::default();
        let content_before = hasher.content_hash(&path).unwrap();
        let pixels_before = hasher.pixel_hash(&path).unwrap();

        edit_metadata(&path, "edited by a photo manager");

        assert_ne!(hasher.content_hash(&path).unwrap(), content_before);
        assert_eq!(hasher.pixel_hash(&path).unwrap(), pixels_before);
    }

    #[test]
    fn test_pixel_edit_changes_pixel_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        let hasher = FileHasher::default();

        write_jpeg(&path, [10, 10, 10]);
        let before = hasher.pixel_hash(&path).unwrap();
        write_jpeg(&path, [240, 240, 240]);
        assert_ne!(hasher.pixel_hash(&path).unwrap(), before);
    }

    #[test]
    fn test_undecodable_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.jpg");
        std::fs::write(&path, b"this is not an image").unwrap();

        let err = FileHasher::default().pixel_hash(&path).unwrap_err();
        assert_eq!(err.kind, PintErrorKind::Decode);
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_custom_decoder() {
        struct RawBytes;
        impl PixelDecoder for RawBytes {
            fn decode(&self, path: &Path) -> Result<Vec<u8>> {
                std::fs::read(path).map_err(|e| PintError::io(path.to_path_buf(), "pixel hash", e))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.jpg");
        std::fs::write(&path, b"abc").unwrap();

        let hasher = FileHasher::with_decoder(4, Box::new(RawBytes));
        assert_eq!(
            hasher.pixel_hash(&path).unwrap(),
            hasher.content_hash(&path).unwrap()
        );
    }
}
