//! JPEG fixtures shared by the unit tests

use std::path::Path;

/// Write a small solid-colour JPEG
pub fn write_jpeg(path: &Path, rgb: [u8; 3]) {
    let img = image::RgbImage::from_pixel(16, 16, image::Rgb(rgb));
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}

/// Insert a COM segment after SOI: bytes change, decoded pixels do not
pub fn edit_metadata(path: &Path, comment: &str) {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    let len = (comment.len() + 2) as u16;

    let mut out = Vec::with_capacity(bytes.len() + comment.len() + 4);
    out.extend_from_slice(&bytes[..2]);
    out.extend_from_slice(&[0xFF, 0xFE]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(comment.as_bytes());
    out.extend_from_slice(&bytes[2..]);
    std::fs::write(path, out).unwrap();
}
