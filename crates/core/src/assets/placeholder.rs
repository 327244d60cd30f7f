use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};

use crate::types::{BackgroundAsset, Dimensions};

/// Dark slate used when no stock media could be fetched.
pub const PLACEHOLDER_COLOR: [u8; 3] = [20, 25, 38];

/// Write a solid-colour PNG at exactly `dimensions` and describe it as an
/// image background.
pub fn write_placeholder(
    path: &Path,
    dimensions: Dimensions,
) -> Result<BackgroundAsset, image::ImageError> {
    let canvas = RgbImage::from_pixel(
        dimensions.width,
        dimensions.height,
        Rgb(PLACEHOLDER_COLOR),
    );
    canvas.save_with_format(path, ImageFormat::Png)?;

    Ok(BackgroundAsset::Image {
        path: path.to_path_buf(),
        dimensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_matches_target_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("background.png");
        let asset = write_placeholder(&path, Dimensions::new(720, 1280)).unwrap();

        assert_eq!(asset.dimensions(), Dimensions::new(720, 1280));
        assert_eq!(image::image_dimensions(&path).unwrap(), (720, 1280));

        let pixel = image::open(&path).unwrap().to_rgb8().get_pixel(360, 640).0;
        assert_eq!(pixel, PLACEHOLDER_COLOR);
    }
}
