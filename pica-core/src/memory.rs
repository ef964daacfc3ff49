//! Views over caller-owned GPU memory regions
//!
//! The core never owns framebuffer or texture memory. Callers hand in byte slices that have
//! already been translated from physical addresses, and these wrappers validate their sizes once
//! so that per-pixel accesses can index without further checks.

use crate::api::{PicaError, PicaResult};
use crate::rasterizer::Color;

pub const COLOR_BYTES_PER_PIXEL: usize = 4;
pub const DEPTH_BYTES_PER_PIXEL: usize = 2;

/// RGBA8 color buffer and 16-bit depth buffer. Rows are `stride` pixels apart in both buffers.
#[derive(Debug)]
pub struct Framebuffer<'a> {
    color: &'a mut [u8],
    depth: &'a mut [u8],
    width: u32,
    height: u32,
    stride: u32,
}

impl<'a> Framebuffer<'a> {
    /// Framebuffer with tightly packed rows.
    ///
    /// # Errors
    ///
    /// Returns an error if either buffer is too small for a `width` x `height` framebuffer.
    pub fn new(color: &'a mut [u8], depth: &'a mut [u8], width: u32, height: u32) -> PicaResult<Self> {
        Self::with_stride(color, depth, width, height, width)
    }

    /// # Errors
    ///
    /// Returns an error if `stride` is less than `width` or if either buffer is too small to hold
    /// `height` rows of `stride` pixels. The last row only needs `width` pixels.
    pub fn with_stride(
        color: &'a mut [u8],
        depth: &'a mut [u8],
        width: u32,
        height: u32,
        stride: u32,
    ) -> PicaResult<Self> {
        if stride < width {
            return Err(PicaError::InvalidStride { width, stride });
        }

        let pixels = match height {
            0 => 0,
            _ => (height as usize - 1) * stride as usize + width as usize,
        };

        let required = pixels * COLOR_BYTES_PER_PIXEL;
        if color.len() < required {
            return Err(PicaError::ColorBufferTooSmall { len: color.len(), required });
        }

        let required = pixels * DEPTH_BYTES_PER_PIXEL;
        if depth.len() < required {
            return Err(PicaError::DepthBufferTooSmall { len: depth.len(), required });
        }

        Ok(Self { color, depth, width, height, stride })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Distance between the starts of consecutive rows, in pixels.
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    fn pixel_index(&self, x: u32, y: u32) -> usize {
        x as usize + y as usize * self.stride as usize
    }

    /// Stored as a little-endian word with alpha in the high byte and blue in the low byte.
    pub fn write_color(&mut self, x: u32, y: u32, color: Color) {
        let address = COLOR_BYTES_PER_PIXEL * self.pixel_index(x, y);
        self.color[address..address + COLOR_BYTES_PER_PIXEL]
            .copy_from_slice(&color.to_argb8888().to_le_bytes());
    }

    pub fn write_depth(&mut self, x: u32, y: u32, depth: u16) {
        let address = DEPTH_BYTES_PER_PIXEL * self.pixel_index(x, y);
        self.depth[address..address + DEPTH_BYTES_PER_PIXEL].copy_from_slice(&depth.to_le_bytes());
    }

    #[must_use]
    pub fn read_color(&self, x: u32, y: u32) -> Color {
        let address = COLOR_BYTES_PER_PIXEL * self.pixel_index(x, y);
        let bytes: [u8; COLOR_BYTES_PER_PIXEL] = [
            self.color[address],
            self.color[address + 1],
            self.color[address + 2],
            self.color[address + 3],
        ];
        Color::from_argb8888(u32::from_le_bytes(bytes))
    }

    #[must_use]
    pub fn read_depth(&self, x: u32, y: u32) -> u16 {
        let address = DEPTH_BYTES_PER_PIXEL * self.pixel_index(x, y);
        u16::from_le_bytes([self.depth[address], self.depth[address + 1]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizes_are_validated() {
        let mut color = vec![0; 4 * 8 * 8];
        let mut depth = vec![0; 2 * 8 * 8 - 1];

        assert!(matches!(
            Framebuffer::new(&mut color, &mut depth, 8, 8),
            Err(PicaError::DepthBufferTooSmall { len: 127, required: 128 })
        ));
        assert!(matches!(
            Framebuffer::new(&mut color, &mut depth, 9, 8),
            Err(PicaError::ColorBufferTooSmall { len: 256, required: 288 })
        ));
        assert!(Framebuffer::new(&mut color, &mut depth, 8, 7).is_ok());
    }

    #[test]
    fn pixel_layout() {
        let mut color = vec![0; 4 * 4 * 2];
        let mut depth = vec![0; 2 * 4 * 2];

        let mut framebuffer = Framebuffer::new(&mut color, &mut depth, 4, 2).unwrap();
        framebuffer.write_color(1, 1, Color::rgba(0x11, 0x22, 0x33, 0x44));
        framebuffer.write_depth(3, 0, 0xABCD);
        assert_eq!(framebuffer.read_color(1, 1), Color::rgba(0x11, 0x22, 0x33, 0x44));
        assert_eq!(framebuffer.read_depth(3, 0), 0xABCD);

        assert_eq!(color[20..24], [0x33, 0x22, 0x11, 0x44]);
        assert_eq!(depth[6..8], [0xCD, 0xAB]);
    }

    #[test]
    fn padded_rows() {
        // 3x3 pixels in rows of 5; the last row is not padded
        let mut color = vec![0xEE; 4 * (5 * 2 + 3)];
        let mut depth = vec![0xEE; 2 * (5 * 2 + 3)];

        assert!(matches!(
            Framebuffer::with_stride(&mut color, &mut depth, 4, 3, 3),
            Err(PicaError::InvalidStride { width: 4, stride: 3 })
        ));
        assert!(matches!(
            Framebuffer::with_stride(&mut color, &mut depth, 3, 3, 6),
            Err(PicaError::ColorBufferTooSmall { len: 52, required: 60 })
        ));

        let mut framebuffer = Framebuffer::with_stride(&mut color, &mut depth, 3, 3, 5).unwrap();
        assert_eq!(framebuffer.stride(), 5);
        for y in 0..3 {
            for x in 0..3 {
                framebuffer.write_color(x, y, Color::rgba(x as u8, y as u8, 0, 0xFF));
                framebuffer.write_depth(x, y, 0x1000 * (y as u16) + x as u16);
            }
        }
        assert_eq!(framebuffer.read_color(2, 2), Color::rgba(2, 2, 0, 0xFF));
        assert_eq!(framebuffer.read_depth(1, 2), 0x2001);

        // Pixel (1, 1) starts at 5 + 1 pixels in
        assert_eq!(color[24..28], [0x00, 0x01, 0x01, 0xFF]);
        assert_eq!(depth[12..14], [0x01, 0x10]);
        for row in 0..2 {
            let padding = 4 * (5 * row + 3)..4 * (5 * row + 5);
            assert!(color[padding].iter().all(|&byte| byte == 0xEE), "color row {row}");
            let padding = 2 * (5 * row + 3)..2 * (5 * row + 5);
            assert!(depth[padding].iter().all(|&byte| byte == 0xEE), "depth row {row}");
        }
    }
}
