/// QR code rendering for token redemption URLs.
use crate::error::{Error, Result};
use qrcode::QrCode;
use std::path::Path;

/// Render `url` as a PNG QR code at `out`. The image is scaled up to at
/// least 256x256 so it stays scannable when printed.
pub fn write_qr(url: &str, out: &Path) -> Result<()> {
    let code = QrCode::new(url.as_bytes())
        .map_err(|e| Error::Internal(format!("QR encoding failed: {e}")))?;

    let image = code
        .render::<image::Luma<u8>>()
        .min_dimensions(256, 256)
        .build();

    image
        .save(out)
        .map_err(|e| Error::Internal(format!("failed to write QR image: {e}")))?;

    Ok(())
}
