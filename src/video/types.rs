use image::{ImageBuffer, Rgb, RgbImage, RgbaImage};

/// A single decoded video frame
///
/// Simple wrapper around an RGB image buffer; one is produced per decode step and
/// dropped as soon as it has been composited.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    /// Create a frame from packed rgb24 bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }
}

/// A frame with its alpha channel filled in, ready to be written to disk
#[derive(Clone, Debug)]
pub struct CompositedFrame {
    buffer: RgbaImage,
}

impl CompositedFrame {
    pub fn new(buffer: RgbaImage) -> Self {
        Self { buffer }
    }

    /// Alpha value at the given coordinates
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.buffer.get_pixel(x, y)[3]
    }

    /// Iterate over every alpha value in row-major order
    pub fn alpha_values(&self) -> impl Iterator<Item = u8> + '_ {
        self.buffer.pixels().map(|p| p[3])
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.buffer
    }
}
