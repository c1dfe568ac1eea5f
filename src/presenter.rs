//! Turns a catalog entry into a displayable bitmap.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{RgbaImage, imageops};
use tracing::debug;

use crate::error::Error;
use crate::events::{RenderRequest, RenderedImage};
use crate::processing::layout::{resize_rgba, resize_to_contain};
use crate::processing::transform::apply_transforms;

/// Produces the bitmap for one render request.
///
/// Implementations run on a blocking worker thread.
pub trait Presenter: Send + Sync + 'static {
    fn render(&self, request: &RenderRequest) -> Result<RenderedImage, Error>;
}

/// Decodes with the `image` crate, honours EXIF orientation, scales to fit the
/// viewport and then applies the display transforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagePresenter;

impl Presenter for ImagePresenter {
    fn render(&self, request: &RenderRequest) -> Result<RenderedImage, Error> {
        let decoded = decode_rgba8_apply_exif(&request.path).map_err(|err| Error::Render {
            path: request.path.clone(),
            reason: format!("{err:#}"),
        })?;
        let (w, h) = resize_to_contain(
            request.viewport.width,
            request.viewport.height,
            decoded.width(),
            decoded.height(),
        );
        let scaled = resize_rgba(&decoded, w, h).map_err(|err| Error::Render {
            path: request.path.clone(),
            reason: format!("{err:#}"),
        })?;
        let image = apply_transforms(scaled, request.transforms);
        let (width, height) = image.dimensions();
        Ok(RenderedImage {
            width,
            height,
            pixels: image.into_raw(),
        })
    }
}

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// Missing or unreadable metadata leaves the decoded orientation as-is.
fn decode_rgba8_apply_exif(path: &Path) -> anyhow::Result<RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()? // sniff based on content/extension
        .decode()?;
    let img = img.to_rgba8();

    let orientation: u16 = read_orientation(path).unwrap_or(1);
    Ok(match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        // transpose: rotate90 + flip_horizontal
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        // transverse: rotate270 + flip_horizontal
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    })
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!("exif orientation {} for {}", o, path.display());
    Some(o)
}
