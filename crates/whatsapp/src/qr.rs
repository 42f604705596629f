//! QR code rendering for the pairing handshake.

use {
    anyhow::{Context, Result},
    image::{GrayImage, Luma},
    qrcode::{Color, QrCode},
};

/// Pixels per QR module in the raster rendering.
const SCALE: u32 = 8;
/// Quiet-zone width in modules, per the QR spec.
const MARGIN: u32 = 4;

/// Render the QR payload as a PNG with a quiet margin.
pub fn render_qr_png(data: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(data.as_bytes()).context("failed to encode QR payload")?;
    let width = code.width() as u32;
    let side = (width + 2 * MARGIN) * SCALE;

    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));
    for y in 0..width {
        for x in 0..width {
            if code[(x as usize, y as usize)] == Color::Dark {
                let px = (x + MARGIN) * SCALE;
                let py = (y + MARGIN) * SCALE;
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        img.put_pixel(px + dx, py + dy, Luma([0u8]));
                    }
                }
            }
        }
    }

    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .context("failed to encode QR PNG")?;
    Ok(bytes)
}

/// Render the QR payload as terminal glyphs (two modules per character row).
pub fn render_qr_terminal(data: &str) -> Result<String> {
    let code = QrCode::new(data.as_bytes()).context("failed to encode QR payload")?;
    Ok(code
        .render::<qrcode::render::unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}
