//! Image file helpers for front ends. The engine itself only sees decoded
//! [`RasterBuffer`]s.

use std::io::Cursor;
use std::path::Path;
use crate::error::{Result, RecolorError};
use crate::raster::RasterBuffer;

/// Decode an image file into an RGBA raster
pub fn load_image(path: &Path) -> Result<RasterBuffer> {
    let img = image::open(path)
        .map_err(|e| RecolorError::Processing(format!("Failed to load {}: {}", path.display(), e)))?;
    Ok(RasterBuffer::from_rgba_image(img.to_rgba8()))
}

/// Save a raster; the format follows the file extension
pub fn save_image(buffer: &RasterBuffer, path: &Path) -> Result<()> {
    // Ensure output directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    buffer.clone().into_rgba_image()?.save(path)?;
    Ok(())
}

/// Encode as PNG bytes (for preview/transfer without file I/O)
pub fn encode_png(buffer: &RasterBuffer) -> Result<Vec<u8>> {
    let img = buffer.clone().into_rgba_image()?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| RecolorError::Processing(format!("Failed to encode PNG: {}", e)))?;
    Ok(out.into_inner())
}
