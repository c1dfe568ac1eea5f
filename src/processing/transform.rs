use image::{DynamicImage, RgbaImage, imageops};

use crate::events::Transforms;

/// Apply the display transforms in fixed order: greyscale, then horizontal
/// mirror, then vertical mirror.
pub fn apply_transforms(image: RgbaImage, transforms: Transforms) -> RgbaImage {
    let mut image = if transforms.greyscale {
        DynamicImage::ImageRgba8(image).grayscale().to_rgba8()
    } else {
        image
    };
    if transforms.flip_h {
        imageops::flip_horizontal_in_place(&mut image);
    }
    if transforms.flip_v {
        imageops::flip_vertical_in_place(&mut image);
    }
    image
}
