/// Tests for ImageData

use super::*;

#[test]
fn test_accepts_exact_pixel_count() {
    let image = ImageData::new(2, 3, TextureFormat::RGBA8, vec![0; 24]).unwrap();
    assert_eq!((image.width(), image.height()), (2, 3));
    assert_eq!(image.pixels().len(), 24);
}

#[test]
fn test_rejects_truncated_pixels() {
    let result = ImageData::new(4, 4, TextureFormat::RGBA16F, vec![0; 64]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}
