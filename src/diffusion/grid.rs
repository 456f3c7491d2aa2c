//! Grid tiling of generated images into one postable picture.

use image::{DynamicImage, ImageFormat, RgbaImage};
use mastodiff_core::error::BotError;
use std::io::Cursor;

/// Columns and rows of one composed grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
}

/// Layout for a chunk of `chunk_len` images under a `(columns, rows)` tile.
///
/// A short chunk falls back to `columns % chunk_len` columns. When the
/// largest square that fits the tile unit holds more cells than that, its
/// cell count becomes the column count. Zero tile edges count as one.
pub fn layout_for(chunk_len: usize, tile: (u32, u32)) -> GridLayout {
    let (tile_columns, tile_rows) = (tile.0.max(1), tile.1.max(1));
    let len = u32::try_from(chunk_len).unwrap_or(u32::MAX).max(1);

    let mut columns = if len >= tile_columns {
        tile_columns
    } else {
        match tile_columns % len {
            0 => len,
            rest => rest,
        }
    };
    let rows = len.div_ceil(tile_columns);

    let unit = tile_columns.saturating_mul(tile_rows);
    let side = (f64::from(unit)).sqrt().floor() as u32;
    let fitting_square = side.saturating_mul(side);
    if fitting_square > columns.saturating_mul(rows) {
        columns = fitting_square;
    }

    GridLayout { columns, rows }
}

/// Paste `images` row-major into uniform cells sized to the largest image.
///
/// Unused cells stay transparent black. Rows grow when the layout has fewer
/// cells than images so nothing is clipped.
pub fn compose(images: &[DynamicImage], layout: GridLayout) -> RgbaImage {
    let cell_w = images.iter().map(|img| img.width()).max().unwrap_or(0);
    let cell_h = images.iter().map(|img| img.height()).max().unwrap_or(0);
    let columns = layout.columns.max(1);
    let rows = layout.rows.max((images.len() as u32).div_ceil(columns));

    let mut canvas = RgbaImage::new(columns * cell_w, rows * cell_h);
    for (idx, img) in images.iter().enumerate() {
        let idx = idx as u32;
        let x = (idx % columns) * cell_w;
        let y = (idx / columns) * cell_h;
        image::imageops::replace(&mut canvas, &img.to_rgba8(), i64::from(x), i64::from(y));
    }
    canvas
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, BotError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| BotError::Image(format!("png encode failed: {e}")))?;
    Ok(buf.into_inner())
}
