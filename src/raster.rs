//! In-memory RGBA raster and pixel coordinates.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::error::{Result, RecolorError};

/// A pixel position, `x` to the right, `y` down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Offset of the pixel's red byte in an RGBA buffer of the given width
    #[inline]
    pub fn byte_offset(self, width: u32) -> usize {
        (self.y as usize * width as usize + self.x as usize) * 4
    }
}

/// Decoded image: `width * height` pixels of interleaved R, G, B, A bytes,
/// row-major. Cloning copies the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(RecolorError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Buffer filled with a single RGBA color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let data = rgba.iter().copied().cycle().take(pixels * 4).collect();
        Self { width, height, data }
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    pub fn into_rgba_image(self) -> Result<RgbaImage> {
        let (width, height) = (self.width, self.height);
        RgbaImage::from_raw(width, height, self.data).ok_or_else(|| {
            RecolorError::Processing(format!("failed to build {}x{} RGBA image", width, height))
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Byte offset of a pixel; asserts bounds in debug builds
    #[inline]
    pub fn offset_of(&self, coord: Coord) -> usize {
        debug_assert!(
            coord.x < self.width && coord.y < self.height,
            "pixel ({}, {}) outside {}x{} buffer",
            coord.x,
            coord.y,
            self.width,
            self.height
        );
        coord.byte_offset(self.width)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset_of(Coord::new(x, y));
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// SHA-256 of the dimensions and pixel bytes, as lowercase hex
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl From<RgbaImage> for RasterBuffer {
    fn from(img: RgbaImage) -> Self {
        Self::from_rgba_image(img)
    }
}
