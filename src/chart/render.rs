use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageResult, RgbImage};

pub const JPEG_QUALITY: u8 = 80;

/// Tiles covers row-major into a `cols` x `rows` grid. Tile size is taken from
/// the first cover; covers of any other size are scaled to fit.
pub fn tile(covers: &[RgbImage], cols: u32, rows: u32) -> RgbImage {
    let (tile_w, tile_h) = covers.first().map(|c| c.dimensions()).unwrap_or((0, 0));
    let mut canvas = RgbImage::new(tile_w * cols, tile_h * rows);

    for (i, cover) in covers.iter().enumerate().take((cols * rows) as usize) {
        let x = (i as u32 % cols) * tile_w;
        let y = (i as u32 / cols) * tile_h;
        if cover.dimensions() == (tile_w, tile_h) {
            imageops::replace(&mut canvas, cover, x.into(), y.into());
        } else {
            let scaled = imageops::resize(cover, tile_w, tile_h, FilterType::Triangle);
            imageops::replace(&mut canvas, &scaled, x.into(), y.into());
        }
    }
    canvas
}

pub fn encode_jpeg(img: &RgbImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(img)?;
    Ok(buffer)
}
